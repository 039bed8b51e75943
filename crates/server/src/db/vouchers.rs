//! Voucher and redemption repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use gamelink_core::{GoodsEntry, RedemptionId, UserId, VoucherCode, VoucherId};

use super::RepositoryError;
use super::catalog::{ContentRow, group_contents};
use crate::models::{NewVoucher, RedemptionRecord, Voucher};
use crate::store::{RedemptionOutcome, VoucherStore};

/// Internal row type for voucher queries.
#[derive(Debug, sqlx::FromRow)]
struct VoucherRow {
    id: i32,
    code: String,
    max_total_redemptions: Option<i32>,
    active: bool,
}

impl VoucherRow {
    fn into_voucher(self, contents: Vec<GoodsEntry>) -> Result<Voucher, RepositoryError> {
        let code = VoucherCode::parse(&self.code).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid voucher code in database: {e}"))
        })?;

        Ok(Voucher {
            id: VoucherId::new(self.id),
            code,
            max_total_redemptions: self.max_total_redemptions,
            active: self.active,
            contents,
        })
    }
}

/// Internal row type for redemption queries.
#[derive(Debug, sqlx::FromRow)]
struct RedemptionRow {
    id: i32,
    user_id: Uuid,
    voucher_id: i32,
    created_at: DateTime<Utc>,
}

impl From<RedemptionRow> for RedemptionRecord {
    fn from(row: RedemptionRow) -> Self {
        Self {
            id: RedemptionId::new(row.id),
            user_id: UserId::new(row.user_id),
            voucher_id: VoucherId::new(row.voucher_id),
            created_at: row.created_at,
        }
    }
}

async fn load_contents(
    conn: &mut PgConnection,
    voucher_id: i32,
) -> Result<Vec<GoodsEntry>, RepositoryError> {
    let rows = sqlx::query_as::<_, ContentRow>(
        r"
        SELECT voucher_id AS owner_id, goods_id, quantity
        FROM gamelink.voucher_content
        WHERE voucher_id = $1
        ORDER BY position
        ",
    )
    .bind(voucher_id)
    .fetch_all(conn)
    .await?;

    Ok(group_contents(&rows)?.remove(&voucher_id).unwrap_or_default())
}

async fn count_redemptions(
    conn: &mut PgConnection,
    voucher_id: i32,
) -> Result<i64, RepositoryError> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM gamelink.voucher_redemption WHERE voucher_id = $1")
            .bind(voucher_id)
            .fetch_one(conn)
            .await?;
    Ok(count)
}

async fn redeemed_by(
    conn: &mut PgConnection,
    user: UserId,
    voucher_id: i32,
) -> Result<bool, RepositoryError> {
    let (exists,): (bool,) = sqlx::query_as(
        r"
        SELECT EXISTS (
            SELECT 1 FROM gamelink.voucher_redemption
            WHERE user_id = $1 AND voucher_id = $2
        )
        ",
    )
    .bind(user.as_uuid())
    .bind(voucher_id)
    .fetch_one(conn)
    .await?;
    Ok(exists)
}

/// Repository for voucher database operations.
#[derive(Clone)]
pub struct PgVoucherRepository {
    pool: PgPool,
}

impl PgVoucherRepository {
    /// Create a new voucher repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VoucherStore for PgVoucherRepository {
    async fn find_by_code(&self, code: &VoucherCode) -> Result<Option<Voucher>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let row = sqlx::query_as::<_, VoucherRow>(
            r"
            SELECT id, code, max_total_redemptions, active
            FROM gamelink.voucher
            WHERE code = $1 AND active
            ",
        )
        .bind(code.as_str())
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let contents = load_contents(&mut conn, row.id).await?;
        row.into_voucher(contents).map(Some)
    }

    async fn has_redeemed(
        &self,
        user: UserId,
        voucher: VoucherId,
    ) -> Result<bool, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        redeemed_by(&mut conn, user, voucher.as_i32()).await
    }

    async fn redemption_count(&self, voucher: VoucherId) -> Result<i64, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        count_redemptions(&mut conn, voucher.as_i32()).await
    }

    async fn record_redemption(
        &self,
        user: UserId,
        voucher: &Voucher,
    ) -> Result<RedemptionOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Serializes redemptions of this voucher so the cap check and the
        // insert see the same count.
        let locked: Option<(Option<i32>,)> = sqlx::query_as(
            "SELECT max_total_redemptions FROM gamelink.voucher WHERE id = $1 FOR UPDATE",
        )
        .bind(voucher.id.as_i32())
        .fetch_optional(&mut *tx)
        .await?;

        let Some((cap,)) = locked else {
            tx.rollback().await?;
            return Err(RepositoryError::NotFound);
        };

        if redeemed_by(&mut *tx, user, voucher.id.as_i32()).await? {
            tx.rollback().await?;
            return Ok(RedemptionOutcome::AlreadyRedeemed);
        }

        if let Some(cap) = cap
            && count_redemptions(&mut *tx, voucher.id.as_i32()).await? >= i64::from(cap)
        {
            tx.rollback().await?;
            return Ok(RedemptionOutcome::Exhausted);
        }

        let inserted = sqlx::query_as::<_, RedemptionRow>(
            r"
            INSERT INTO gamelink.voucher_redemption (user_id, voucher_id)
            VALUES ($1, $2)
            RETURNING id, user_id, voucher_id, created_at
            ",
        )
        .bind(user.as_uuid())
        .bind(voucher.id.as_i32())
        .fetch_one(&mut *tx)
        .await;

        let row = match inserted {
            Ok(row) => row,
            Err(sqlx::Error::Database(ref db_err)) if db_err.is_unique_violation() => {
                tx.rollback().await?;
                return Ok(RedemptionOutcome::AlreadyRedeemed);
            }
            Err(e) => return Err(e.into()),
        };

        tx.commit().await?;
        Ok(RedemptionOutcome::Recorded(row.into()))
    }

    async fn upsert_voucher(&self, voucher: &NewVoucher) -> Result<Voucher, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, VoucherRow>(
            r"
            INSERT INTO gamelink.voucher (code, max_total_redemptions, active)
            VALUES ($1, $2, $3)
            ON CONFLICT (code) DO UPDATE
            SET max_total_redemptions = EXCLUDED.max_total_redemptions,
                active = EXCLUDED.active,
                updated_at = NOW()
            RETURNING id, code, max_total_redemptions, active
            ",
        )
        .bind(voucher.code.as_str())
        .bind(voucher.max_total_redemptions)
        .bind(voucher.active)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM gamelink.voucher_content WHERE voucher_id = $1")
            .bind(row.id)
            .execute(&mut *tx)
            .await?;

        for (position, entry) in (0_i32..).zip(&voucher.contents) {
            sqlx::query(
                r"
                INSERT INTO gamelink.voucher_content (voucher_id, position, goods_id, quantity)
                VALUES ($1, $2, $3, $4)
                ",
            )
            .bind(row.id)
            .bind(position)
            .bind(entry.goods_id.as_i32())
            .bind(entry.quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        row.into_voucher(voucher.contents.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_code_in_database_is_normalized() {
        let row = VoucherRow {
            id: 3,
            code: "welcome".to_string(),
            max_total_redemptions: Some(2),
            active: true,
        };
        let voucher = row.into_voucher(Vec::new()).unwrap();
        assert_eq!(voucher.code.as_str(), "WELCOME");
        assert_eq!(voucher.max_total_redemptions, Some(2));
    }
}
