//! Shop catalog repository.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};

use gamelink_core::{CatalogItemId, Coins, GoodsEntry, GoodsId};

use super::RepositoryError;
use crate::models::{CatalogItem, NewCatalogItem};
use crate::store::CatalogStore;

/// Internal row type for catalog item queries.
#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: i32,
    name: String,
    description: Option<String>,
    price: i64,
    active: bool,
}

/// Internal row type for item content queries.
#[derive(Debug, sqlx::FromRow)]
pub(super) struct ContentRow {
    pub(super) owner_id: i32,
    pub(super) goods_id: i32,
    pub(super) quantity: i32,
}

impl TryFrom<&ContentRow> for GoodsEntry {
    type Error = RepositoryError;

    fn try_from(row: &ContentRow) -> Result<Self, Self::Error> {
        Self::new(GoodsId::new(row.goods_id), row.quantity).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid content of {}: {e}", row.owner_id))
        })
    }
}

/// Group content rows (already ordered by position) by owner.
pub(super) fn group_contents(
    rows: &[ContentRow],
) -> Result<HashMap<i32, Vec<GoodsEntry>>, RepositoryError> {
    let mut grouped: HashMap<i32, Vec<GoodsEntry>> = HashMap::new();
    for row in rows {
        grouped.entry(row.owner_id).or_default().push(row.try_into()?);
    }
    Ok(grouped)
}

fn build_item(row: ItemRow, contents: Vec<GoodsEntry>) -> Result<CatalogItem, RepositoryError> {
    let price = Coins::new(row.price).map_err(|e| {
        RepositoryError::DataCorruption(format!("invalid price for item {}: {e}", row.id))
    })?;

    Ok(CatalogItem {
        id: CatalogItemId::new(row.id),
        name: row.name,
        description: row.description,
        price,
        active: row.active,
        contents,
    })
}

async fn load_contents(
    conn: &mut PgConnection,
    item_ids: &[i32],
) -> Result<HashMap<i32, Vec<GoodsEntry>>, RepositoryError> {
    let rows = sqlx::query_as::<_, ContentRow>(
        r"
        SELECT item_id AS owner_id, goods_id, quantity
        FROM gamelink.catalog_item_content
        WHERE item_id = ANY($1)
        ORDER BY item_id, position
        ",
    )
    .bind(item_ids)
    .fetch_all(conn)
    .await?;

    group_contents(&rows)
}

/// Repository for catalog database operations.
#[derive(Clone)]
pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    /// Create a new catalog repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PgCatalogRepository {
    async fn get_item(&self, id: CatalogItemId) -> Result<Option<CatalogItem>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let row = sqlx::query_as::<_, ItemRow>(
            r"
            SELECT id, name, description, price, active
            FROM gamelink.catalog_item
            WHERE id = $1 AND active
            ",
        )
        .bind(id.as_i32())
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut contents = load_contents(&mut conn, &[row.id]).await?;
        let contents = contents.remove(&row.id).unwrap_or_default();
        build_item(row, contents).map(Some)
    }

    async fn list_items(&self) -> Result<Vec<CatalogItem>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let rows = sqlx::query_as::<_, ItemRow>(
            r"
            SELECT id, name, description, price, active
            FROM gamelink.catalog_item
            WHERE active
            ORDER BY id
            ",
        )
        .fetch_all(&mut *conn)
        .await?;

        let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
        let mut contents = load_contents(&mut conn, &ids).await?;

        rows.into_iter()
            .map(|row| {
                let entries = contents.remove(&row.id).unwrap_or_default();
                build_item(row, entries)
            })
            .collect()
    }

    async fn upsert_item(&self, item: &NewCatalogItem) -> Result<CatalogItem, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ItemRow>(
            r"
            INSERT INTO gamelink.catalog_item (id, name, description, price, active)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                description = EXCLUDED.description,
                price = EXCLUDED.price,
                active = EXCLUDED.active,
                updated_at = NOW()
            RETURNING id, name, description, price, active
            ",
        )
        .bind(item.id.as_i32())
        .bind(&item.name)
        .bind(item.description.as_deref())
        .bind(item.price.amount())
        .bind(item.active)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM gamelink.catalog_item_content WHERE item_id = $1")
            .bind(row.id)
            .execute(&mut *tx)
            .await?;

        for (position, entry) in (0_i32..).zip(&item.contents) {
            sqlx::query(
                r"
                INSERT INTO gamelink.catalog_item_content (item_id, position, goods_id, quantity)
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

        build_item(row, item.contents.clone())
    }
}
