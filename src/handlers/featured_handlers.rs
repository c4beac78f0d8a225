//! Featured-product curation endpoints.

use crate::{
    errors::AppError, handlers::extract::ValidatedJson,
    models::featured::FeaturedSelectionRequest, state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

/// `GET /api/products/featured`
pub async fn list_featured(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let products = state.featured.list_featured().await?;
    Ok(Json(json!({
        "success": true,
        "count": products.len(),
        "data": products,
    })))
}

/// `PATCH /api/products/featured/batch`
///
/// 200 when every entry applied, 207 when some ids failed, 400 when the
/// selection would break the featured cap.
pub async fn apply_featured_selection(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<FeaturedSelectionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = state
        .featured
        .apply_featured_selection(request.products)
        .await?;

    let (status, message) = if result.is_partial() {
        (
            StatusCode::MULTI_STATUS,
            format!(
                "{} products updated, {} failed",
                result.updated_count, result.failed_count
            ),
        )
    } else {
        (
            StatusCode::OK,
            format!("{} products updated successfully", result.updated_count),
        )
    };

    Ok((
        status,
        Json(json!({
            "success": !result.is_partial(),
            "message": message,
            "data": result,
        })),
    ))
}

/// `PATCH /api/products/{id}/featured`
pub async fn toggle_featured(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let toggled = state.featured.toggle_featured(&id).await?;
    let message = if toggled.is_featured {
        "Product added to featured"
    } else {
        "Product removed from featured"
    };
    Ok(Json(json!({
        "success": true,
        "message": message,
        "data": toggled,
    })))
}
