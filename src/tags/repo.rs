use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Tag names are unique per owner; detaching a tag from a receipt never
/// deletes the tag itself.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Tag {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub name: String,
}

/// Join row used when loading the tags of several receipts at once.
#[derive(Debug, Clone, FromRow)]
pub struct ReceiptTag {
    pub receipt_id: Uuid,
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
}

impl Tag {
    pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Tag>> {
        let rows = sqlx::query_as::<_, Tag>(
            r#"
            SELECT id, user_id, name
            FROM tags
            WHERE user_id = $1
            ORDER BY name ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Get-or-create a tag for this user.
    pub async fn upsert_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        name: &str,
    ) -> anyhow::Result<Tag> {
        let tag = sqlx::query_as::<_, Tag>(
            r#"
            INSERT INTO tags (user_id, name)
            VALUES ($1, $2)
            ON CONFLICT (user_id, name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, user_id, name
            "#,
        )
        .bind(user_id)
        .bind(name)
        .fetch_one(&mut **tx)
        .await?;
        Ok(tag)
    }

    pub async fn link_tx(
        tx: &mut Transaction<'_, Postgres>,
        receipt_id: Uuid,
        tag_id: Uuid,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO receipt_tags (receipt_id, tag_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(receipt_id)
        .bind(tag_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Detach every tag from a receipt without deleting the tags.
    pub async fn detach_all_tx(
        tx: &mut Transaction<'_, Postgres>,
        receipt_id: Uuid,
    ) -> anyhow::Result<()> {
        sqlx::query(r#"DELETE FROM receipt_tags WHERE receipt_id = $1"#)
            .bind(receipt_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    pub async fn for_receipts(
        db: &PgPool,
        receipt_ids: &[Uuid],
    ) -> anyhow::Result<Vec<ReceiptTag>> {
        let rows = sqlx::query_as::<_, ReceiptTag>(
            r#"
            SELECT rt.receipt_id, t.id, t.user_id, t.name
            FROM receipt_tags rt
            JOIN tags t ON t.id = rt.tag_id
            WHERE rt.receipt_id = ANY($1)
            ORDER BY t.name ASC
            "#,
        )
        .bind(receipt_ids)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }
}

impl From<ReceiptTag> for Tag {
    fn from(row: ReceiptTag) -> Self {
        Tag {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
        }
    }
}
