//! Featured-product selection payloads and results.

use super::not_blank;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Maximum number of products that may be featured at once.
pub const MAX_FEATURED: usize = 3;

/// Desired featured state for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FeaturedChange {
    #[validate(custom(function = "not_blank"))]
    pub id: String,
    pub should_be_featured: bool,
}

/// Body of `PATCH /api/products/featured/batch`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FeaturedSelectionRequest {
    #[validate(
        length(min = 1, message = "products must contain at least one entry"),
        nested
    )]
    pub products: Vec<FeaturedChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub id: String,
    pub reason: String,
}

/// Aggregated outcome of a batch featured update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturedSelectionResult {
    pub updated_count: usize,
    pub failed_count: usize,
    pub updated_ids: Vec<String>,
    pub failures: Vec<ItemFailure>,
    /// Products featured after the batch, store-wide.
    pub featured_count: i64,
}

impl FeaturedSelectionResult {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Response body of a single toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturedToggle {
    pub id: String,
    pub name: String,
    pub is_featured: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::validation_messages;
    use serde_json::json;

    #[test]
    fn selection_request_validates_length_and_entries() {
        let empty: FeaturedSelectionRequest =
            serde_json::from_value(json!({ "products": [] })).unwrap();
        assert!(empty.validate().is_err());

        let blank: FeaturedSelectionRequest = serde_json::from_value(json!({
            "products": [{ "id": " ", "shouldBeFeatured": true }]
        }))
        .unwrap();
        let errors = validation_messages(&blank.validate().unwrap_err());
        assert_eq!(errors.len(), 1);

        let ok: FeaturedSelectionRequest = serde_json::from_value(json!({
            "products": [{ "id": "p1", "shouldBeFeatured": false }]
        }))
        .unwrap();
        assert!(ok.validate().is_ok());
    }
}
