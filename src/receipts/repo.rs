use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::{Date, Month, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct Receipt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_url: String,
    pub purchase_date: Date,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Item {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub receipt_id: Uuid,
    pub name: String,
}

impl Receipt {
    /// Warranty runs for two calendar years from the purchase date;
    /// Feb 29 purchases clamp to Feb 28.
    pub fn warranty_until(&self) -> Date {
        let d = self.purchase_date;
        d.replace_year(d.year() + 2).unwrap_or_else(|_| {
            Date::from_calendar_date(d.year() + 2, Month::February, 28).expect("valid date")
        })
    }

    pub async fn create_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        file_url: &str,
        purchase_date: Date,
    ) -> anyhow::Result<Receipt> {
        let receipt = sqlx::query_as::<_, Receipt>(
            r#"
            INSERT INTO receipts (user_id, file_url, purchase_date)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, file_url, purchase_date, created_at
            "#,
        )
        .bind(user_id)
        .bind(file_url)
        .bind(purchase_date)
        .fetch_one(&mut **tx)
        .await?;
        Ok(receipt)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Receipt>> {
        let receipt = sqlx::query_as::<_, Receipt>(
            r#"
            SELECT id, user_id, file_url, purchase_date, created_at
            FROM receipts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(receipt)
    }

    pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Receipt>> {
        let rows = sqlx::query_as::<_, Receipt>(
            r#"
            SELECT id, user_id, file_url, purchase_date, created_at
            FROM receipts
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Items go with the row via the store's cascade.
    pub async fn delete_tx(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> anyhow::Result<()> {
        sqlx::query(r#"DELETE FROM receipts WHERE id = $1"#)
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

impl Item {
    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        receipt_id: Uuid,
        names: &[String],
    ) -> anyhow::Result<Vec<Item>> {
        let mut items = Vec::with_capacity(names.len());
        for name in names {
            let item = sqlx::query_as::<_, Item>(
                r#"
                INSERT INTO items (receipt_id, name)
                VALUES ($1, $2)
                RETURNING id, receipt_id, name
                "#,
            )
            .bind(receipt_id)
            .bind(name)
            .fetch_one(&mut **tx)
            .await?;
            items.push(item);
        }
        Ok(items)
    }

    pub async fn for_receipts(db: &PgPool, receipt_ids: &[Uuid]) -> anyhow::Result<Vec<Item>> {
        let rows = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, receipt_id, name
            FROM items
            WHERE receipt_id = ANY($1)
            "#,
        )
        .bind(receipt_ids)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod warranty_tests {
    use super::*;
    use time::macros::{date, datetime};

    fn receipt_bought_on(purchase_date: Date) -> Receipt {
        Receipt {
            id: Uuid::nil(),
            user_id: Uuid::nil(),
            file_url: "/uploads/x.png".into(),
            purchase_date,
            created_at: datetime!(2026-01-01 0:00 UTC),
        }
    }

    #[test]
    fn warranty_is_two_calendar_years() {
        let receipt = receipt_bought_on(date!(2024 - 05 - 17));
        assert_eq!(receipt.warranty_until(), date!(2026 - 05 - 17));
    }

    #[test]
    fn leap_day_purchase_clamps_to_feb_28() {
        let receipt = receipt_bought_on(date!(2024 - 02 - 29));
        assert_eq!(receipt.warranty_until(), date!(2026 - 02 - 28));
    }
}
