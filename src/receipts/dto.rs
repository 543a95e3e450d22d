use serde::Serialize;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::receipts::repo::{Item, Receipt};
use crate::tags::repo::Tag;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptResponse {
    pub id: Uuid,
    pub file_url: String,
    pub date: Date,
    pub created_at: OffsetDateTime,
    pub warranty_until: Date,
    pub items: Vec<Item>,
    pub tags: Vec<Tag>,
}

impl ReceiptResponse {
    pub fn from_parts(receipt: Receipt, items: Vec<Item>, tags: Vec<Tag>) -> Self {
        let warranty_until = receipt.warranty_until();
        Self {
            id: receipt.id,
            file_url: receipt.file_url,
            date: receipt.purchase_date,
            created_at: receipt.created_at,
            warranty_until,
            items,
            tags,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub receipts: Vec<ReceiptResponse>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub receipt: ReceiptResponse,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn receipt_response_matches_the_wire_format() {
        let receipt = Receipt {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            file_url: "/uploads/1700000000-abc-scan.png".into(),
            purchase_date: date!(2025 - 06 - 01),
            created_at: datetime!(2025 - 06 - 02 10:00 UTC),
        };
        let response = ReceiptResponse::from_parts(
            receipt,
            vec![Item {
                id: Uuid::new_v4(),
                receipt_id: Uuid::new_v4(),
                name: "milk".into(),
            }],
            vec![Tag {
                id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                name: "groceries".into(),
            }],
        );

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("fileUrl").is_some());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("warrantyUntil").is_some());
        // Row-only fields never reach the client.
        assert!(json.get("userId").is_none());
        assert!(json["items"][0].get("receipt_id").is_none());
        assert!(json["tags"][0].get("user_id").is_none());
        assert_eq!(json["items"][0]["name"], "milk");
        assert_eq!(json["tags"][0]["name"], "groceries");
    }
}
