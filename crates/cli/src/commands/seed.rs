//! Seed the catalog from a YAML file.
//!
//! Each entry is validated like an admin submission. Products whose name is
//! already in the catalog are skipped, so the command can be re-run.
//!
//! ```yaml
//! products:
//!   - name: Ceramic Mug
//!     price: "12.50"
//!     description: Stoneware, 350 ml
//!     image: uploads/mug.jpg
//! ```

use std::path::Path;

use serde::Deserialize;
use sqlx::PgPool;
use tracing::{error, info};

use shopfront_core::ProductDraft;
use shopfront_storefront::db::ProductRepository;

/// Catalog seed file.
#[derive(Debug, Deserialize)]
pub struct CatalogFile {
    pub products: Vec<ProductDraft>,
}

/// Counts from a seeding run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedResult {
    pub inserted: usize,
    pub skipped: usize,
}

/// Validate every entry, collecting messages for the ones that fail.
///
/// # Errors
///
/// Returns one message per invalid product.
pub fn validate_catalog(file: CatalogFile) -> Result<Vec<ProductDraft>, Vec<String>> {
    let mut drafts = Vec::with_capacity(file.products.len());
    let mut errors = Vec::new();

    for (i, draft) in file.products.into_iter().enumerate() {
        let label = format!("#{} ({})", i + 1, draft.name.trim());
        match draft.validate() {
            Ok(draft) => drafts.push(draft),
            Err(e) => errors.push(format!("{label}: {e}")),
        }
    }

    if errors.is_empty() { Ok(drafts) } else { Err(errors) }
}

/// Seed products from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, any entry is
/// invalid, or database operations fail.
pub async fn catalog(pool: &PgPool, file_path: &str) -> Result<SeedResult, Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog from file");
    let content = tokio::fs::read_to_string(path).await?;
    let file: CatalogFile = serde_yaml::from_str(&content)?;
    info!(products = file.products.len(), "Parsed catalog");

    let drafts = validate_catalog(file).map_err(|errors| {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        format!("{} validation errors found", errors.len())
    })?;

    let repo = ProductRepository::new(pool);
    let mut result = SeedResult::default();
    for draft in &drafts {
        if repo.get_by_name(&draft.name).await?.is_some() {
            result.skipped += 1;
            continue;
        }
        let product = repo.create(draft).await?;
        info!(product_id = %product.id, name = %product.name, price = %product.price, "Product added");
        result.inserted += 1;
    }

    info!("Seeding complete!");
    info!("  Products inserted: {}", result.inserted);
    info!("  Products skipped (already exist): {}", result.skipped);
    Ok(result)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_validate_catalog() {
        let yaml = r#"
products:
  - name: "  Ceramic Mug  "
    price: "12.50"
    description: Stoneware
  - name: Tea Sampler
    price: "8"
"#;
        let file: CatalogFile = serde_yaml::from_str(yaml).unwrap();
        let drafts = validate_catalog(file).unwrap();

        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].name, "Ceramic Mug");
        assert_eq!(drafts[1].description, None);
        assert_eq!(drafts[1].price.to_string(), "$8.00");
    }

    #[test]
    fn test_invalid_entries_are_all_reported() {
        let yaml = r#"
products:
  - name: ""
    price: "1.00"
  - name: Fine
    price: "2.00"
  - name: "   "
    price: "3.00"
"#;
        let file: CatalogFile = serde_yaml::from_str(yaml).unwrap();
        let errors = validate_catalog(file).unwrap_err();

        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("#1"));
        assert!(errors[1].starts_with("#3"));
    }

    #[test]
    fn test_negative_price_is_rejected_on_parse() {
        let yaml = "products:\n  - name: Refund\n    price: \"-1.00\"\n";
        assert!(serde_yaml::from_str::<CatalogFile>(yaml).is_err());
    }
}
