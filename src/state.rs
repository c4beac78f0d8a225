//! Shared application state handed to every handler.

use crate::services::{
    featured_service::FeaturedService,
    hero_service::HeroService,
    image_service::ImageService,
    privacy_policy_service::PrivacyPolicyService,
    product_repository::{ProductRepository, SqliteProductRepository},
    product_service::ProductService,
    storage_service::ObjectStore,
};
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub store: Arc<dyn ObjectStore>,
    pub products: Arc<ProductService>,
    pub featured: Arc<FeaturedService>,
    /// Images in the `product-images` bucket, used by the standalone upload routes.
    pub images: ImageService,
    pub hero: Arc<HeroService>,
    pub privacy_policy: Arc<PrivacyPolicyService>,
}

impl AppState {
    /// Wire every service over one pool and one object store.
    pub fn new(db: SqlitePool, store: Arc<dyn ObjectStore>) -> Self {
        let repo: Arc<dyn ProductRepository> = Arc::new(SqliteProductRepository::new(db.clone()));
        let images = ImageService::products(store.clone());

        Self {
            products: Arc::new(ProductService::new(repo.clone(), images.clone())),
            featured: Arc::new(FeaturedService::new(repo)),
            hero: Arc::new(HeroService::new(db.clone(), ImageService::hero(store.clone()))),
            privacy_policy: Arc::new(PrivacyPolicyService::new(db.clone())),
            images,
            store,
            db,
        }
    }
}
