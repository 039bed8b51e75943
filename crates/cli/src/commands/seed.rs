//! Seed the shop catalog and vouchers from a YAML file.
//!
//! ```yaml
//! items:
//!   - id: 1
//!     name: Starter Pack
//!     price: 300
//!     contents:
//!       - { goods_id: 5, quantity: 2 }
//! vouchers:
//!   - code: WELCOME
//!     max_total_redemptions: 100
//!     contents:
//!       - { goods_id: 9, quantity: 1 }
//! ```
//!
//! Items are keyed by ID and vouchers by code, so reseeding the same file
//! updates rows in place.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use gamelink_core::GoodsEntry;
use gamelink_server::config::get_database_url;
use gamelink_server::db::{self, PgCatalogRepository, PgVoucherRepository};
use gamelink_server::models::{NewCatalogItem, NewVoucher};
use gamelink_server::store::{CatalogStore, VoucherStore};

/// Contents of a seed file.
#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    /// Shop items.
    #[serde(default)]
    pub items: Vec<NewCatalogItem>,
    /// Voucher definitions.
    #[serde(default)]
    pub vouchers: Vec<NewVoucher>,
}

/// Check a seed file, returning every problem found.
#[must_use]
pub fn validate(seed: &SeedFile) -> Vec<String> {
    let mut errors = Vec::new();

    let mut item_ids = HashSet::new();
    for item in &seed.items {
        let label = format!("item {}", item.id);
        if !item_ids.insert(item.id) {
            errors.push(format!("{label}: duplicate id"));
        }
        if item.name.trim().is_empty() {
            errors.push(format!("{label}: name is empty"));
        }
        check_contents(&label, &item.contents, &mut errors);
    }

    let mut codes = HashSet::new();
    for voucher in &seed.vouchers {
        let label = format!("voucher {}", voucher.code);
        if !codes.insert(voucher.code.clone()) {
            errors.push(format!("{label}: duplicate code"));
        }
        if let Some(cap) = voucher.max_total_redemptions
            && cap < 0
        {
            errors.push(format!("{label}: max_total_redemptions cannot be negative"));
        }
        check_contents(&label, &voucher.contents, &mut errors);
    }

    errors
}

fn check_contents(label: &str, contents: &[GoodsEntry], errors: &mut Vec<String>) {
    if contents.is_empty() {
        errors.push(format!("{label}: contents are empty"));
    }
    for entry in contents {
        if let Err(e) = GoodsEntry::new(entry.goods_id, entry.quantity) {
            errors.push(format!("{label}: goods {}: {e}", entry.goods_id));
        }
    }
}

/// Load and upsert every item and voucher in `file_path`.
///
/// The file is parsed and validated before connecting to the database.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, validation fails,
/// or a database write fails.
pub async fn run(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let database_url = get_database_url("GAMELINK_DATABASE_URL")?;

    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading seed file");

    let content = tokio::fs::read_to_string(path).await?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;

    info!(
        items = seed.items.len(),
        vouchers = seed.vouchers.len(),
        "Parsed seed file"
    );

    let errors = validate(&seed);
    if !errors.is_empty() {
        error!("Seed file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let catalog = PgCatalogRepository::new(pool.clone());
    for item in &seed.items {
        let saved = catalog.upsert_item(item).await?;
        info!(item_id = %saved.id, name = %saved.name, "Item saved");
    }

    let vouchers = PgVoucherRepository::new(pool.clone());
    for voucher in &seed.vouchers {
        let saved = vouchers.upsert_voucher(voucher).await?;
        info!(voucher_id = %saved.id, code = %saved.code, "Voucher saved");
    }

    pool.close().await;
    info!(
        items = seed.items.len(),
        vouchers = seed.vouchers.len(),
        "Seeding complete"
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const VALID: &str = r"
items:
  - id: 1
    name: Starter Pack
    price: 300
    contents:
      - { goods_id: 5, quantity: 2 }
vouchers:
  - code: welcome
    max_total_redemptions: 2
    contents:
      - { goods_id: 9, quantity: 1 }
";

    #[test]
    fn test_valid_file_parses_and_passes() {
        let seed: SeedFile = serde_yaml::from_str(VALID).unwrap();
        assert_eq!(seed.items.len(), 1);
        assert!(seed.items[0].active);
        assert_eq!(seed.vouchers[0].code.as_str(), "WELCOME");
        assert!(validate(&seed).is_empty());
    }

    #[test]
    fn test_negative_price_is_a_parse_error() {
        let yaml = "items:\n  - id: 1\n    name: X\n    price: -5\n    contents: []\n";
        assert!(serde_yaml::from_str::<SeedFile>(yaml).is_err());
    }

    #[test]
    fn test_validation_collects_every_problem() {
        let yaml = r"
items:
  - id: 1
    name: ''
    price: 10
    contents: []
  - id: 1
    name: Dup
    price: 10
    contents:
      - { goods_id: 3, quantity: 0 }
vouchers:
  - code: GIFT
    max_total_redemptions: -1
    contents:
      - { goods_id: 3, quantity: 1 }
";
        let seed: SeedFile = serde_yaml::from_str(yaml).unwrap();
        let errors = validate(&seed);
        assert_eq!(errors.len(), 5, "{errors:?}");
        assert!(errors.iter().any(|e| e.contains("duplicate id")));
        assert!(errors.iter().any(|e| e.contains("contents are empty")));
        assert!(errors.iter().any(|e| e.contains("must be positive")));
        assert!(errors.iter().any(|e| e.contains("cannot be negative")));
    }

    #[test]
    fn test_empty_file_is_valid() {
        let seed: SeedFile = serde_yaml::from_str("{}").unwrap();
        assert!(validate(&seed).is_empty());
    }
}
