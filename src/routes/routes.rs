//! Defines routes for the catalog API.
//!
//! ## Structure
//! - **Health** (root): `GET /healthz`, `GET /readyz`
//! - **Public objects** (root): `GET /storage/v1/object/public/{bucket}/{*path}`
//! - **API** (under `/api`)
//!   - products: list, filter, by category, top-selling, stats, CRUD, bulk
//!     create/update/delete, price and sold updates, delete by category or filter
//!   - featured: list, batch selection, single toggle
//!   - images: `POST /upload-image`, `DELETE /delete-image`
//!   - content: `/hero`, `/hero/upload-banner`, `/privacy-policy`
//!
//! Static segments such as `/products/filter` take precedence over
//! `/products/{id}`.

use crate::{
    handlers::{
        content_handlers::{
            delete_privacy_policy, get_hero, get_privacy_policy, save_privacy_policy,
            update_hero, upload_banner,
        },
        featured_handlers::{apply_featured_selection, list_featured, toggle_featured},
        health_handlers::{healthz, readyz},
        object_handlers::get_public_object,
        product_handlers::{
            create_product, create_products, delete_by_category, delete_by_filter,
            delete_product, delete_products, filter_products, get_product, increment_sold,
            list_categories, list_products, product_stats, products_by_category, top_selling,
            update_price, update_product, update_products,
        },
        upload_handlers::{delete_image, upload_image},
    },
    services::storage_service::PUBLIC_OBJECT_ROUTE,
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Request body cap. Leaves room for a 5 MiB image sent as base64 JSON.
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Build the full application router with shared state attached.
pub fn app(state: AppState) -> Router {
    routes()
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Build and return every route as a `Router<AppState>`.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            &format!("{PUBLIC_OBJECT_ROUTE}/{{bucket}}/{{*path}}"),
            get(get_public_object),
        )
        .nest("/api", api_routes())
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/bulk",
            post(create_products)
                .patch(update_products)
                .delete(delete_products),
        )
        .route("/products/filter", get(filter_products).delete(delete_by_filter))
        .route("/products/top-selling", get(top_selling))
        .route("/products/stats", get(product_stats))
        .route("/products/featured", get(list_featured))
        .route("/products/featured/batch", patch(apply_featured_selection))
        .route(
            "/products/category/{category}",
            get(products_by_category).delete(delete_by_category),
        )
        .route(
            "/products/{id}",
            get(get_product)
                .put(update_product)
                .patch(update_product)
                .delete(delete_product),
        )
        .route("/products/{id}/price", patch(update_price))
        .route("/products/{id}/sold", patch(increment_sold))
        .route("/products/{id}/featured", patch(toggle_featured))
        .route("/upload-image", post(upload_image))
        .route("/delete-image", delete(delete_image))
        .route("/hero", get(get_hero).put(update_hero))
        .route("/hero/upload-banner", post(upload_banner))
        .route("/privacy-policy", get(get_privacy_policy).post(save_privacy_policy))
        .route("/privacy-policy/{id}", delete(delete_privacy_policy))
}
