use std::collections::{HashMap, HashSet};

use anyhow::Context;
use bytes::Bytes;
use time::{Date, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::receipts::dto::ReceiptResponse;
use crate::receipts::repo::{Item, Receipt};
use crate::receipts::validate;
use crate::state::AppState;
use crate::tags::repo::Tag;

pub struct NewUpload {
    pub file_name: String,
    pub content_type: String,
    pub body: Bytes,
}

pub struct ReceiptMeta {
    pub date: Date,
    pub items: Vec<String>,
    pub tags: Vec<String>,
}

/// Validate the upload, persist the file, and create the receipt row with
/// its items and tag links in one transaction. The file write sits outside
/// the transaction; a crash in between can orphan the file on disk, which
/// is an accepted, recoverable inconsistency.
pub async fn create_receipt(
    state: &AppState,
    user_id: Uuid,
    upload: NewUpload,
    meta: ReceiptMeta,
) -> Result<ReceiptResponse, ApiError> {
    validate::validate(&upload.file_name, &upload.content_type, &upload.body)
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    validate::validate_items(&meta.items).map_err(ApiError::Validation)?;
    validate::validate_tags(&meta.tags).map_err(ApiError::Validation)?;

    let stored_name =
        validate::safe_file_name(&upload.file_name, OffsetDateTime::now_utc(), Uuid::new_v4());
    state
        .files
        .save(&stored_name, upload.body)
        .await
        .context("persist upload")?;
    let file_url = format!("/uploads/{stored_name}");

    let mut tx = state.db.begin().await.context("begin tx")?;
    let receipt = Receipt::create_tx(&mut tx, user_id, &file_url, meta.date).await?;
    let items = Item::insert_tx(&mut tx, receipt.id, &meta.items).await?;

    let mut tags = Vec::with_capacity(meta.tags.len());
    let mut seen = HashSet::new();
    for name in &meta.tags {
        if !seen.insert(name.as_str()) {
            continue;
        }
        let tag = Tag::upsert_tx(&mut tx, user_id, name).await?;
        Tag::link_tx(&mut tx, receipt.id, tag.id).await?;
        tags.push(tag);
    }
    tx.commit().await.context("commit tx")?;

    info!(user_id = %user_id, receipt_id = %receipt.id, file = %stored_name, "receipt created");
    Ok(ReceiptResponse::from_parts(receipt, items, tags))
}

/// All of the user's receipts, newest first, with items and tags loaded in
/// two batched queries.
pub async fn list_receipts(
    state: &AppState,
    user_id: Uuid,
) -> Result<Vec<ReceiptResponse>, ApiError> {
    let receipts = Receipt::list_by_user(&state.db, user_id).await?;
    let ids: Vec<Uuid> = receipts.iter().map(|r| r.id).collect();

    let mut items_by: HashMap<Uuid, Vec<Item>> = HashMap::new();
    for item in Item::for_receipts(&state.db, &ids).await? {
        items_by.entry(item.receipt_id).or_default().push(item);
    }

    let mut tags_by: HashMap<Uuid, Vec<Tag>> = HashMap::new();
    for row in Tag::for_receipts(&state.db, &ids).await? {
        tags_by.entry(row.receipt_id).or_default().push(row.into());
    }

    Ok(receipts
        .into_iter()
        .map(|receipt| {
            let items = items_by.remove(&receipt.id).unwrap_or_default();
            let tags = tags_by.remove(&receipt.id).unwrap_or_default();
            ReceiptResponse::from_parts(receipt, items, tags)
        })
        .collect())
}

/// Delete a receipt the caller owns. Tag detachment and the row delete
/// share a transaction; items cascade with the row. The disk file is
/// removed best-effort afterwards, the row being the source of truth.
pub async fn delete_receipt(
    state: &AppState,
    user_id: Uuid,
    receipt_id: Uuid,
) -> Result<(), ApiError> {
    let receipt = Receipt::find_by_id(&state.db, receipt_id)
        .await?
        .ok_or(ApiError::NotFound("Receipt not found"))?;

    if receipt.user_id != user_id {
        warn!(user_id = %user_id, receipt_id = %receipt_id, "delete attempt on foreign receipt");
        return Err(ApiError::Forbidden(
            "You do not have permission to delete this receipt",
        ));
    }

    let mut tx = state.db.begin().await.context("begin tx")?;
    Tag::detach_all_tx(&mut tx, receipt.id).await?;
    Receipt::delete_tx(&mut tx, receipt.id).await?;
    tx.commit().await.context("commit tx")?;

    if let Some(name) = receipt.file_url.strip_prefix("/uploads/") {
        if let Err(e) = state.files.delete(name).await {
            warn!(error = %e, receipt_id = %receipt.id, "failed to remove receipt file from disk");
        }
    }

    info!(user_id = %user_id, receipt_id = %receipt.id, "receipt deleted");
    Ok(())
}
