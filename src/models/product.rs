//! Products, the payloads that create and change them, and query parameters.

use super::{field_error, not_blank, present};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidateUrl, ValidationErrors};

/// A sellable catalog entry.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct Product {
    /// Caller- or store-assigned identifier. Immutable after creation.
    pub id: String,

    pub name: String,

    /// Price in Rupiah (no minor unit).
    pub price: i64,

    /// Open set of categories, e.g. "Stand", "Microphone", "Power Amplifier".
    pub category: String,

    pub description: String,

    /// External marketplace URL.
    pub link: Option<String>,

    /// Public URL of the product image in object storage.
    pub image: Option<String>,

    /// Units sold. Only ever increased.
    pub sold: i64,

    /// Whether the product shows in the promoted storefront section.
    pub is_featured: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /api/products`.
///
/// `is_featured` is not accepted here; featuring goes through the featured
/// endpoints so the cap is always checked.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProduct {
    #[validate(
        length(max = 100, message = "Product ID must be at most 100 characters"),
        custom(function = "not_blank")
    )]
    pub id: Option<String>,

    #[validate(
        length(max = 200, message = "Product name must be at most 200 characters"),
        custom(function = "not_blank")
    )]
    pub name: String,

    #[validate(range(min = 0, message = "Product price must be a non-negative number"))]
    pub price: i64,

    #[validate(custom(function = "not_blank"))]
    pub category: String,

    #[serde(default)]
    pub description: String,

    #[validate(url(message = "Product link must be a valid URL"))]
    pub link: Option<String>,

    #[validate(url(message = "Product image must be a valid URL"))]
    pub image: Option<String>,

    #[serde(default)]
    #[validate(range(min = 0, message = "Product sold must be a non-negative integer"))]
    pub sold: i64,

    /// Base64 data URL (`data:image/png;base64,...`) uploaded before insert.
    #[serde(default, rename = "imageData", alias = "image_data")]
    pub image_data: Option<String>,
}

/// Body of `PUT|PATCH /api/products/{id}`. Every field is optional; fields
/// that may not be patched are captured only so they can be rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProduct {
    #[serde(default, deserialize_with = "present")]
    pub id: Option<serde_json::Value>,

    #[serde(default, deserialize_with = "present")]
    pub sold: Option<serde_json::Value>,

    #[serde(default, deserialize_with = "present")]
    pub is_featured: Option<serde_json::Value>,

    pub name: Option<String>,
    pub price: Option<i64>,
    pub category: Option<String>,
    pub description: Option<String>,

    #[serde(default, deserialize_with = "present")]
    pub link: Option<Option<String>>,

    /// `null` clears the image; a string replaces it.
    #[serde(default, deserialize_with = "present")]
    pub image: Option<Option<String>>,

    #[serde(default, rename = "imageData", alias = "image_data")]
    pub image_data: Option<String>,
}

impl UpdateProduct {
    fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.sold.is_none()
            && self.is_featured.is_none()
            && self.name.is_none()
            && self.price.is_none()
            && self.category.is_none()
            && self.description.is_none()
            && self.link.is_none()
            && self.image.is_none()
            && self.image_data.is_none()
    }

    /// The persistable part of the patch.
    pub fn changes(&self) -> ProductChanges {
        ProductChanges {
            name: self.name.clone(),
            price: self.price,
            category: self.category.clone(),
            description: self.description.clone(),
            link: self.link.clone(),
            image: self.image.clone(),
        }
    }
}

impl Validate for UpdateProduct {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.is_empty() {
            errors.add(
                "__all__",
                field_error("empty", "At least one field must be provided for update"),
            );
        }
        if self.id.is_some() {
            errors.add("id", field_error("immutable", "Product ID cannot be updated"));
        }
        if self.sold.is_some() {
            errors.add(
                "sold",
                field_error("managed", "Sold count can only be changed by incrementing it"),
            );
        }
        if self.is_featured.is_some() {
            errors.add(
                "is_featured",
                field_error("managed", "Featured status is changed through the featured endpoints"),
            );
        }
        if let Some(name) = &self.name {
            if name.trim().is_empty() || name.chars().count() > 200 {
                errors.add(
                    "name",
                    field_error("invalid", "Product name must be a non-empty string of at most 200 characters"),
                );
            }
        }
        if self.price.is_some_and(|price| price < 0) {
            errors.add(
                "price",
                field_error("range", "Product price must be a non-negative number"),
            );
        }
        if let Some(category) = &self.category {
            if not_blank(category).is_err() {
                errors.add(
                    "category",
                    field_error("blank", "Product category must be a non-empty string"),
                );
            }
        }
        if let Some(Some(link)) = &self.link {
            if !link.validate_url() {
                errors.add("link", field_error("url", "Product link must be a valid URL"));
            }
        }
        if let Some(Some(image)) = &self.image {
            if !image.validate_url() {
                errors.add("image", field_error("url", "Product image must be a valid URL"));
            }
        }
        if self.image_data.is_some() && self.image.is_some() {
            errors.add(
                "imageData",
                field_error("conflict", "Provide either image or imageData, not both"),
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Field changes persisted by the repository. `None` leaves a column as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub price: Option<i64>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub link: Option<Option<String>>,
    pub image: Option<Option<String>>,
}

/// A fully-formed row ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub id: String,
    pub name: String,
    pub price: i64,
    pub category: String,
    pub description: String,
    pub link: Option<String>,
    pub image: Option<String>,
    pub sold: i64,
}

/// One entry of `PATCH /api/products/bulk`.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkUpdateItem {
    pub id: Option<String>,
    #[serde(flatten)]
    pub update: UpdateProduct,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkUpdateRequest {
    pub updates: Vec<BulkUpdateItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkCreateRequest {
    pub products: Vec<CreateProduct>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BulkDeleteRequest {
    #[validate(length(min = 1, message = "ids must contain at least one product ID"))]
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PriceUpdate {
    #[validate(range(min = 0, message = "Price must be a non-negative number"))]
    pub price: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SoldIncrement {
    #[serde(default = "default_quantity")]
    #[validate(range(
        min = 1,
        max = 1_000_000,
        message = "Quantity must be between 1 and 1000000"
    ))]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

/// Columns products can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Name,
    Price,
    Sold,
    Category,
    #[serde(alias = "createdAt")]
    CreatedAt,
    #[serde(alias = "updatedAt")]
    UpdatedAt,
    Id,
}

impl SortField {
    pub fn column(self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::Price => "price",
            SortField::Sold => "sold",
            SortField::Category => "category",
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::Id => "id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProductSort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl ProductSort {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }
}

/// Row filters shared by queries and filtered deletes. `search` matches
/// name or description, case-insensitively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_sold: Option<i64>,
    pub max_sold: Option<i64>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    pub fn has_more(&self, total: i64) -> bool {
        total > self.offset.saturating_add(self.limit)
    }
}

#[derive(Debug, Clone)]
pub struct ProductPage {
    pub items: Vec<Product>,
    pub total: i64,
}

/// `?sortBy=&order=`
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SortQuery {
    #[serde(rename = "sortBy", default)]
    pub sort_by: SortField,
    #[serde(default)]
    pub order: SortDirection,
}

impl SortQuery {
    pub fn sort(&self) -> ProductSort {
        ProductSort::new(self.sort_by, self.order)
    }
}

/// Query string of `GET /api/products/filter`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FilterQuery {
    pub category: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_sold: Option<i64>,
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: i64,
    #[serde(default)]
    #[validate(range(min = 0, max = 1_000_000, message = "offset must be between 0 and 1000000"))]
    pub offset: i64,
    #[serde(default)]
    pub sort_by: SortField,
    #[serde(default)]
    pub order: SortDirection,
}

fn default_limit() -> i64 {
    10
}

impl FilterQuery {
    pub fn filter(&self) -> ProductFilter {
        ProductFilter {
            category: self.category.clone().filter(|c| !c.is_empty()),
            min_price: self.min_price,
            max_price: self.max_price,
            min_sold: self.min_sold,
            max_sold: None,
            search: self.search.clone().filter(|s| !s.is_empty()),
        }
    }

    pub fn pagination(&self) -> Pagination {
        Pagination {
            limit: self.limit,
            offset: self.offset,
        }
    }

    pub fn sort(&self) -> ProductSort {
        ProductSort::new(self.sort_by, self.order)
    }
}

/// Query string of `GET /api/products/category/{category}`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CategoryQuery {
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: Option<i64>,
    #[serde(default)]
    #[validate(range(min = 0, max = 1_000_000, message = "offset must be between 0 and 1000000"))]
    pub offset: i64,
    #[serde(default)]
    pub sort_by: SortField,
    #[serde(default)]
    pub order: SortDirection,
}

/// Query string of `GET /api/products/top-selling`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TopSellingQuery {
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: i64,
    pub category: Option<String>,
}

/// Body of `DELETE /api/products/filter`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFilterRequest {
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_sold: Option<i64>,
    pub max_sold: Option<i64>,
    #[serde(default)]
    pub confirm: bool,
}

impl DeleteFilterRequest {
    pub fn filter(&self) -> ProductFilter {
        ProductFilter {
            min_price: self.min_price,
            max_price: self.max_price,
            min_sold: self.min_sold,
            max_sold: self.max_sold,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow, PartialEq, Eq)]
pub struct CategoryCount {
    pub category: String,
    #[serde(rename = "productCount")]
    pub product_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductStats {
    pub total_products: i64,
    pub total_categories: i64,
    pub total_sold: i64,
    pub average_price: f64,
    pub most_expensive: Option<Product>,
    pub cheapest: Option<Product>,
    pub top_seller: Option<Product>,
}
