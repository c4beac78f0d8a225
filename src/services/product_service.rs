//! Product lifecycle: record mutations and the image assets coupled to them.
//!
//! Every write path that touches `image` keeps storage in step with the row.
//! New images are uploaded before the row is written, superseded images are
//! deleted best-effort, and a cleanup that fails becomes a `warning` on the
//! result instead of an error.

use crate::{
    errors::{ShopError, ShopResult},
    models::{
        featured::ItemFailure,
        product::{
            BulkUpdateItem, CategoryCount, CreateProduct, DeleteFilterRequest, NewProduct,
            Pagination, Product, ProductChanges, ProductFilter, ProductPage, ProductSort,
            ProductStats, UpdateProduct,
        },
        validation_messages,
    },
    services::{
        image_service::{ImageService, ImageUpload, StoredImage},
        product_repository::ProductRepository,
    },
};
use std::{collections::HashSet, sync::Arc};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// A single changed or removed product, plus any image cleanup warning.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductMutation {
    pub product: Product,
    pub warning: Option<String>,
}

/// Products removed by a batch delete, with the image cleanups that failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchDeletion {
    pub products: Vec<Product>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkUpdateResult {
    pub updated: Vec<Product>,
    pub failures: Vec<ItemFailure>,
    pub warnings: Vec<String>,
}

impl BulkUpdateResult {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

pub struct ProductService {
    repo: Arc<dyn ProductRepository>,
    images: ImageService,
}

impl ProductService {
    pub fn new(repo: Arc<dyn ProductRepository>, images: ImageService) -> Self {
        Self { repo, images }
    }

    pub async fn list_products(&self, sort: ProductSort) -> ShopResult<Vec<Product>> {
        self.repo.get_all(sort).await
    }

    pub async fn get_product(&self, id: &str) -> ShopResult<Product> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ShopError::product_not_found(id))
    }

    pub async fn query_products(
        &self,
        filter: &ProductFilter,
        page: Pagination,
        sort: ProductSort,
    ) -> ShopResult<ProductPage> {
        self.repo.query(filter, page, sort).await
    }

    /// Products of one category; unpaged when `page` is `None`.
    pub async fn products_by_category(
        &self,
        category: &str,
        page: Option<Pagination>,
        sort: ProductSort,
    ) -> ShopResult<ProductPage> {
        let filter = ProductFilter {
            category: Some(category.to_string()),
            ..Default::default()
        };
        match page {
            Some(page) => self.repo.query(&filter, page, sort).await,
            None => {
                let items = self.repo.find(&filter, sort).await?;
                let total = items.len() as i64;
                Ok(ProductPage { items, total })
            }
        }
    }

    pub async fn categories(&self) -> ShopResult<Vec<CategoryCount>> {
        self.repo.categories().await
    }

    pub async fn top_selling(
        &self,
        limit: i64,
        category: Option<String>,
    ) -> ShopResult<Vec<Product>> {
        self.repo.top_selling(limit, category).await
    }

    pub async fn stats(&self) -> ShopResult<ProductStats> {
        self.repo.stats().await
    }

    /// Insert one product. An `imageData` payload is uploaded first and its
    /// URL stored as `image`; the upload is discarded if the insert fails.
    #[instrument(skip(self, input), fields(id = ?input.id, name = %input.name))]
    pub async fn create_product(&self, input: CreateProduct) -> ShopResult<Product> {
        check_create(&input)?;
        if let Some(id) = &input.id {
            if self.repo.get_by_id(id).await?.is_some() {
                return Err(ShopError::Conflict(format!(
                    "Product with ID `{id}` already exists"
                )));
            }
        }
        self.insert(input).await
    }

    /// Insert a batch. Every item is validated, and ids checked for clashes,
    /// before anything is written.
    #[instrument(skip(self, inputs), fields(count = inputs.len()))]
    pub async fn create_products(&self, inputs: Vec<CreateProduct>) -> ShopResult<Vec<Product>> {
        if inputs.is_empty() {
            return Err(ShopError::validation(
                "products must contain at least one product",
            ));
        }

        let mut errors = Vec::new();
        let mut seen = HashSet::new();
        for (index, input) in inputs.iter().enumerate() {
            if let Err(ShopError::Validation(messages)) = check_create(input) {
                errors.extend(
                    messages
                        .into_iter()
                        .map(|message| format!("products[{index}].{message}")),
                );
            }
            if let Some(id) = &input.id {
                if !seen.insert(id.clone()) {
                    errors.push(format!("products[{index}].id: duplicate ID `{id}` in batch"));
                }
            }
        }
        if !errors.is_empty() {
            return Err(ShopError::Validation(errors));
        }

        for id in inputs.iter().filter_map(|input| input.id.as_deref()) {
            if self.repo.get_by_id(id).await?.is_some() {
                return Err(ShopError::Conflict(format!(
                    "Product with ID `{id}` already exists"
                )));
            }
        }

        let mut created = Vec::with_capacity(inputs.len());
        for input in inputs {
            created.push(self.insert(input).await?);
        }
        info!(count = created.len(), "products created");
        Ok(created)
    }

    async fn insert(&self, input: CreateProduct) -> ShopResult<Product> {
        let uploaded = match &input.image_data {
            Some(data) => Some(self.images.upload(ImageUpload::from_data_url(data)?).await?),
            None => None,
        };

        let product = NewProduct {
            id: input.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            name: input.name.trim().to_string(),
            price: input.price,
            category: input.category.trim().to_string(),
            description: input.description,
            link: input.link,
            image: uploaded
                .as_ref()
                .map(|stored| stored.public_url.clone())
                .or(input.image),
            sold: input.sold,
        };

        match self.repo.create(product).await {
            Ok(created) => {
                info!(id = %created.id, "product created");
                Ok(created)
            }
            Err(err) => {
                self.discard_upload(uploaded.as_ref()).await;
                Err(err)
            }
        }
    }

    /// Patch one product.
    ///
    /// The patch is validated before any side effect, so a payload carrying
    /// `id` never reaches storage. When the image changes the old object is
    /// deleted before the row is written.
    #[instrument(skip(self, patch))]
    pub async fn update_product(
        &self,
        id: &str,
        patch: UpdateProduct,
    ) -> ShopResult<ProductMutation> {
        patch.validate()?;

        let current = self.get_product(id).await?;
        let mut changes = patch.changes();

        let uploaded = match &patch.image_data {
            Some(data) => {
                let stored = self.images.upload(ImageUpload::from_data_url(data)?).await?;
                changes.image = Some(Some(stored.public_url.clone()));
                Some(stored)
            }
            None => None,
        };

        let warning = self.release_replaced_image(&current, &changes).await;

        match self.repo.update(id, &changes).await {
            Ok(product) => {
                info!(id, "product updated");
                Ok(ProductMutation { product, warning })
            }
            Err(err) => {
                self.discard_upload(uploaded.as_ref()).await;
                Err(err)
            }
        }
    }

    /// Apply each entry through [`Self::update_product`], collecting failures.
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn update_products(&self, items: Vec<BulkUpdateItem>) -> ShopResult<BulkUpdateResult> {
        if items.is_empty() {
            return Err(ShopError::validation(
                "updates must contain at least one entry",
            ));
        }

        let mut result = BulkUpdateResult::default();
        for item in items {
            let Some(id) = item.id.filter(|id| !id.trim().is_empty()) else {
                result.failures.push(ItemFailure {
                    id: String::new(),
                    reason: "Product ID is required".into(),
                });
                continue;
            };
            match self.update_product(&id, item.update).await {
                Ok(mutation) => {
                    result.warnings.extend(mutation.warning);
                    result.updated.push(mutation.product);
                }
                Err(err) => {
                    warn!(id = %id, error = %err, "bulk update entry failed");
                    result.failures.push(ItemFailure {
                        id,
                        reason: err.detail(),
                    });
                }
            }
        }
        Ok(result)
    }

    pub async fn update_price(&self, id: &str, price: i64) -> ShopResult<Product> {
        if price < 0 {
            return Err(ShopError::validation(
                "price: Price must be a non-negative number",
            ));
        }
        let changes = ProductChanges {
            price: Some(price),
            ..Default::default()
        };
        self.repo.update(id, &changes).await
    }

    /// Add `quantity` units to `sold` as a single store-level increment.
    #[instrument(skip(self))]
    pub async fn increment_sold(&self, id: &str, quantity: i64) -> ShopResult<Product> {
        if quantity < 1 {
            return Err(ShopError::validation(
                "quantity: Quantity must be at least 1",
            ));
        }
        self.repo.increment_sold(id, quantity).await
    }

    /// Delete the row, then its image.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: &str) -> ShopResult<ProductMutation> {
        let product = self.repo.delete(id).await?;
        let warning = self.release_image(&product).await;
        info!(id, "product deleted");
        Ok(ProductMutation { product, warning })
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn delete_products(&self, ids: &[String]) -> ShopResult<BatchDeletion> {
        if ids.is_empty() {
            return Err(ShopError::validation(
                "ids: ids must contain at least one product ID",
            ));
        }
        let deleted = self.repo.delete_many(ids).await?;
        if deleted.is_empty() {
            return Err(ShopError::NotFound(
                "No products found with the given IDs".into(),
            ));
        }
        Ok(self.cascade(deleted).await)
    }

    #[instrument(skip(self))]
    pub async fn delete_by_category(&self, category: &str) -> ShopResult<BatchDeletion> {
        let deleted = self.repo.delete_by_category(category).await?;
        if deleted.is_empty() {
            return Err(ShopError::NotFound(format!(
                "No products found in category `{category}`"
            )));
        }
        Ok(self.cascade(deleted).await)
    }

    /// Delete everything matching price/sold bounds. Requires `confirm` and at
    /// least one bound.
    #[instrument(skip(self, request))]
    pub async fn delete_by_filter(&self, request: &DeleteFilterRequest) -> ShopResult<BatchDeletion> {
        if !request.confirm {
            return Err(ShopError::validation(
                "confirm: Deleting by filter requires confirm: true",
            ));
        }
        let filter = request.filter();
        if filter == ProductFilter::default() {
            return Err(ShopError::validation(
                "At least one of minPrice, maxPrice, minSold or maxSold is required",
            ));
        }

        let deleted = self.repo.delete_by_filter(&filter).await?;
        if deleted.is_empty() {
            return Err(ShopError::NotFound(
                "No products match the given filter".into(),
            ));
        }
        Ok(self.cascade(deleted).await)
    }

    async fn cascade(&self, deleted: Vec<Product>) -> BatchDeletion {
        let mut warnings = Vec::new();
        for product in &deleted {
            warnings.extend(self.release_image(product).await);
        }
        info!(count = deleted.len(), "products deleted");
        BatchDeletion {
            products: deleted,
            warnings,
        }
    }

    async fn release_image(&self, product: &Product) -> Option<String> {
        let url = product.image.as_deref()?;
        self.images
            .delete_by_url(url)
            .await
            .warning(&format!("Image of product `{}`", product.id))
    }

    async fn release_replaced_image(
        &self,
        current: &Product,
        changes: &ProductChanges,
    ) -> Option<String> {
        let new_image = changes.image.as_ref()?;
        let old = current.image.as_deref()?;
        if new_image.as_deref() == Some(old) {
            return None;
        }
        self.images.delete_by_url(old).await.warning("Old image")
    }

    async fn discard_upload(&self, uploaded: Option<&StoredImage>) {
        if let Some(stored) = uploaded {
            self.images.discard(stored).await;
        }
    }
}

fn check_create(input: &CreateProduct) -> ShopResult<()> {
    let mut errors = match input.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => validation_messages(&errors),
    };
    if input.image.is_some() && input.image_data.is_some() {
        errors.push("imageData: Provide either image or imageData, not both".into());
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ShopError::Validation(errors))
    }
}
