//! Public shop catalog.

use axum::{Json, extract::State};

use crate::error::Result;
use crate::models::CatalogItem;
use crate::services::CommerceService;
use crate::state::AppState;

/// `GET /shop/items`: active items with their contents.
///
/// # Errors
///
/// 500 if the catalog cannot be read.
pub async fn items(State(state): State<AppState>) -> Result<Json<Vec<CatalogItem>>> {
    let items = CommerceService::new(state.users(), state.catalog(), state.gateway())
        .list_items()
        .await?;
    Ok(Json(items))
}
