//! Featured-product curation.
//!
//! At most [`MAX_FEATURED`] products may carry `is_featured = true`. Batch
//! selections and single toggles both read the current featured set, check the
//! cap and then write, so the whole sequence runs behind one async mutex.

use crate::{
    errors::{ShopError, ShopResult},
    models::{
        featured::{
            FeaturedChange, FeaturedSelectionResult, FeaturedToggle, ItemFailure, MAX_FEATURED,
        },
        product::Product,
    },
    services::product_repository::ProductRepository,
};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

pub struct FeaturedService {
    repo: Arc<dyn ProductRepository>,
    gate: Mutex<()>,
}

impl FeaturedService {
    pub fn new(repo: Arc<dyn ProductRepository>) -> Self {
        Self {
            repo,
            gate: Mutex::new(()),
        }
    }

    /// Apply a batch of featured/unfeatured transitions.
    ///
    /// Duplicate ids collapse to their last entry. The batch is rejected
    /// without any write when it asks for more than [`MAX_FEATURED`] products
    /// or when applying it would leave more than that many featured. Ids not
    /// mentioned keep their flag. Per-id failures are collected, not raised.
    #[instrument(skip(self, changes), fields(entries = changes.len()))]
    pub async fn apply_featured_selection(
        &self,
        changes: Vec<FeaturedChange>,
    ) -> ShopResult<FeaturedSelectionResult> {
        let changes = collapse_duplicates(changes);

        let requested = changes.iter().filter(|c| c.should_be_featured).count();
        if requested > MAX_FEATURED {
            warn!(requested, "featured selection over the limit");
            return Err(ShopError::LimitExceeded {
                requested,
                limit: MAX_FEATURED,
            });
        }

        let _guard = self.gate.lock().await;

        let current: HashSet<String> = self.repo.featured_ids().await?.into_iter().collect();
        let mut projected = current.clone();
        for change in &changes {
            if change.should_be_featured {
                projected.insert(change.id.clone());
            } else {
                projected.remove(&change.id);
            }
        }
        if projected.len() > MAX_FEATURED {
            warn!(
                projected = projected.len(),
                "featured selection would exceed the limit"
            );
            return Err(ShopError::LimitExceeded {
                requested: projected.len(),
                limit: MAX_FEATURED,
            });
        }

        let mut confirmed = current;
        let mut updated_ids = Vec::new();
        let mut failures = Vec::new();
        for change in changes {
            match self
                .repo
                .set_featured(&change.id, change.should_be_featured)
                .await
            {
                Ok(product) => {
                    if product.is_featured {
                        confirmed.insert(product.id.clone());
                    } else {
                        confirmed.remove(&product.id);
                    }
                    updated_ids.push(product.id);
                }
                Err(err) => {
                    warn!(id = %change.id, error = %err, "featured update failed");
                    failures.push(ItemFailure {
                        id: change.id,
                        reason: err.detail(),
                    });
                }
            }
        }

        // Writes are already applied; a failed recount must not hide them.
        let featured_count = match self.repo.count_featured().await {
            Ok(count) => count,
            Err(err) => {
                warn!(error = %err, "featured recount failed, using confirmed writes");
                i64::try_from(confirmed.len()).unwrap_or(i64::MAX)
            }
        };
        info!(
            updated = updated_ids.len(),
            failed = failures.len(),
            featured_count,
            "featured selection applied"
        );

        Ok(FeaturedSelectionResult {
            updated_count: updated_ids.len(),
            failed_count: failures.len(),
            updated_ids,
            failures,
            featured_count,
        })
    }

    /// Flip one product's featured flag. Turning a product on fails once the
    /// cap is reached.
    #[instrument(skip(self))]
    pub async fn toggle_featured(&self, id: &str) -> ShopResult<FeaturedToggle> {
        let _guard = self.gate.lock().await;

        let product = self
            .repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ShopError::product_not_found(id))?;

        if !product.is_featured {
            let current = usize::try_from(self.repo.count_featured().await?).unwrap_or(0);
            if current >= MAX_FEATURED {
                return Err(ShopError::LimitExceeded {
                    requested: current + 1,
                    limit: MAX_FEATURED,
                });
            }
        }

        let updated = self.repo.set_featured(id, !product.is_featured).await?;
        info!(id, is_featured = updated.is_featured, "featured flag toggled");

        Ok(FeaturedToggle {
            id: updated.id,
            name: updated.name,
            is_featured: updated.is_featured,
        })
    }

    pub async fn list_featured(&self) -> ShopResult<Vec<Product>> {
        self.repo.list_featured().await
    }
}

/// Keep the first position of each id and the value of its last entry.
fn collapse_duplicates(changes: Vec<FeaturedChange>) -> Vec<FeaturedChange> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut collapsed: Vec<FeaturedChange> = Vec::with_capacity(changes.len());
    for change in changes {
        match positions.get(&change.id) {
            Some(&index) => collapsed[index].should_be_featured = change.should_be_featured,
            None => {
                positions.insert(change.id.clone(), collapsed.len());
                collapsed.push(change);
            }
        }
    }
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::connect_in_memory,
        models::product::{NewProduct, ProductSort},
        services::product_repository::{MockProductRepository, SqliteProductRepository},
    };

    fn change(id: &str, should_be_featured: bool) -> FeaturedChange {
        FeaturedChange {
            id: id.to_string(),
            should_be_featured,
        }
    }

    fn sample_product(id: &str, is_featured: bool) -> Product {
        let now = chrono::Utc::now();
        Product {
            id: id.to_string(),
            name: format!("Product {id}"),
            price: 100_000,
            category: "Stand".into(),
            description: String::new(),
            link: None,
            image: None,
            sold: 0,
            is_featured,
            created_at: now,
            updated_at: now,
        }
    }

    async fn service_with(ids: &[&str]) -> (FeaturedService, Arc<SqliteProductRepository>) {
        let repo = Arc::new(SqliteProductRepository::new(
            connect_in_memory().await.unwrap(),
        ));
        for id in ids {
            repo.create(NewProduct {
                id: id.to_string(),
                name: format!("Product {id}"),
                price: 100_000,
                category: "Stand".into(),
                description: String::new(),
                link: None,
                image: None,
                sold: 0,
            })
            .await
            .unwrap();
        }
        (FeaturedService::new(repo.clone()), repo)
    }

    async fn featured(repo: &SqliteProductRepository) -> Vec<String> {
        repo.featured_ids().await.unwrap()
    }

    #[tokio::test]
    async fn four_requested_is_rejected_without_writes() {
        let (service, repo) = service_with(&["a", "b", "c", "d", "e"]).await;
        repo.set_featured("e", true).await.unwrap();

        let err = service
            .apply_featured_selection(vec![
                change("a", true),
                change("b", true),
                change("c", true),
                change("d", true),
            ])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ShopError::LimitExceeded {
                requested: 4,
                limit: 3
            }
        ));
        assert_eq!(featured(&repo).await, vec!["e"]);
    }

    #[tokio::test]
    async fn unmentioned_products_keep_their_flag() {
        let (service, repo) = service_with(&["a", "b", "c"]).await;
        repo.set_featured("c", true).await.unwrap();

        let result = service
            .apply_featured_selection(vec![change("a", true), change("b", false)])
            .await
            .unwrap();

        assert_eq!(result.updated_ids, vec!["a", "b"]);
        assert_eq!(result.featured_count, 2);
        assert_eq!(featured(&repo).await, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn delta_that_would_exceed_the_cap_is_rejected() {
        let (service, repo) = service_with(&["a", "b", "c", "d"]).await;
        for id in ["a", "b", "c"] {
            repo.set_featured(id, true).await.unwrap();
        }

        let err = service
            .apply_featured_selection(vec![change("d", true)])
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::LimitExceeded { .. }));
        assert_eq!(featured(&repo).await, vec!["a", "b", "c"]);

        let swapped = service
            .apply_featured_selection(vec![change("a", false), change("d", true)])
            .await
            .unwrap();
        assert_eq!(swapped.featured_count, 3);
        assert_eq!(featured(&repo).await, vec!["b", "c", "d"]);
    }

    #[tokio::test]
    async fn duplicate_ids_collapse_to_last_entry() {
        let (service, repo) = service_with(&["a", "b", "c", "d"]).await;

        let result = service
            .apply_featured_selection(vec![
                change("a", true),
                change("b", true),
                change("c", true),
                change("a", false),
                change("d", true),
            ])
            .await
            .unwrap();

        assert_eq!(result.updated_ids, vec!["a", "b", "c", "d"]);
        assert_eq!(featured(&repo).await, vec!["b", "c", "d"]);
    }

    #[tokio::test]
    async fn unknown_ids_are_reported_as_failures() {
        let (service, repo) = service_with(&["a"]).await;

        let result = service
            .apply_featured_selection(vec![change("a", true), change("ghost", true)])
            .await
            .unwrap();

        assert!(result.is_partial());
        assert_eq!(result.updated_count, 1);
        assert_eq!(result.failed_count, 1);
        assert_eq!(result.failures[0].id, "ghost");
        assert_eq!(featured(&repo).await, vec!["a"]);
    }

    #[tokio::test]
    async fn toggle_respects_the_cap() {
        let (service, repo) = service_with(&["a", "b", "c", "d"]).await;
        for id in ["a", "b", "c"] {
            service.toggle_featured(id).await.unwrap();
        }

        let err = service.toggle_featured("d").await.unwrap_err();
        assert!(matches!(err, ShopError::LimitExceeded { .. }));

        let off = service.toggle_featured("a").await.unwrap();
        assert!(!off.is_featured);
        let on = service.toggle_featured("d").await.unwrap();
        assert!(on.is_featured);
        assert_eq!(featured(&repo).await, vec!["b", "c", "d"]);

        assert!(matches!(
            service.toggle_featured("ghost").await.unwrap_err(),
            ShopError::NotFound(_)
        ));
        let listed = service.list_featured().await.unwrap();
        assert_eq!(listed.len(), 3);
        assert!(repo
            .get_all(ProductSort::default())
            .await
            .unwrap()
            .iter()
            .all(|p| p.is_featured == (p.id != "a")));
    }

    #[tokio::test]
    async fn store_failures_during_writes_are_collected() {
        let mut repo = MockProductRepository::new();
        repo.expect_featured_ids().returning(|| Ok(Vec::new()));
        repo.expect_set_featured()
            .returning(|_, _| Err(ShopError::Database(sqlx::Error::PoolTimedOut)));
        repo.expect_count_featured().returning(|| Ok(0));

        let service = FeaturedService::new(Arc::new(repo));
        let result = service
            .apply_featured_selection(vec![change("a", true)])
            .await
            .unwrap();

        assert_eq!(result.updated_count, 0);
        assert_eq!(result.failures[0].reason, "Internal server error");
    }

    #[tokio::test]
    async fn failed_recount_still_reports_applied_writes() {
        let mut repo = MockProductRepository::new();
        repo.expect_featured_ids()
            .returning(|| Ok(vec!["a".to_string()]));
        repo.expect_set_featured()
            .returning(|id, flag| Ok(sample_product(id, flag)));
        repo.expect_count_featured()
            .returning(|| Err(ShopError::Database(sqlx::Error::PoolTimedOut)));

        let service = FeaturedService::new(Arc::new(repo));
        let result = service
            .apply_featured_selection(vec![change("a", false), change("b", true), change("c", true)])
            .await
            .unwrap();

        assert_eq!(result.updated_count, 3);
        assert!(!result.is_partial());
        assert_eq!(result.featured_count, 2);
    }
}
