//! Catalog products.

use serde::{Deserialize, Serialize};

use crate::types::{Price, ProductId};

/// Maximum product name length, matching the `products.name` column.
pub const MAX_NAME_LENGTH: usize = 100;

/// Maximum description length, matching the `products.description` column.
pub const MAX_DESCRIPTION_LENGTH: usize = 200;

/// Errors raised when validating admin product input.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProductError {
    #[error("product name cannot be empty")]
    EmptyName,
    #[error("product name must be at most {MAX_NAME_LENGTH} characters")]
    NameTooLong,
    #[error("product description must be at most {MAX_DESCRIPTION_LENGTH} characters")]
    DescriptionTooLong,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Catalog ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Current unit price.
    pub price: Price,
    /// Long description.
    pub description: Option<String>,
    /// Image reference (path or URL), if any.
    pub image: Option<String>,
}

/// Admin input for creating or replacing a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl ProductDraft {
    /// Trim fields and check them against the column limits.
    ///
    /// Blank descriptions and image references become `None`.
    ///
    /// # Errors
    ///
    /// Returns a `ProductError` describing the first invalid field.
    pub fn validate(self) -> Result<Self, ProductError> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err(ProductError::EmptyName);
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(ProductError::NameTooLong);
        }

        let description = non_blank(self.description);
        if description
            .as_deref()
            .is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LENGTH)
        {
            return Err(ProductError::DescriptionTooLong);
        }

        Ok(Self {
            name,
            price: self.price,
            description,
            image: non_blank(self.image),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}
