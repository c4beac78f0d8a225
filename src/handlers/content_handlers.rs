//! Hero banner and privacy policy endpoints.

use crate::{
    errors::AppError,
    handlers::{
        extract::{ApiJson, ValidatedJson},
        product_handlers::with_warning,
        upload_handlers::read_file_part,
    },
    models::{hero::HeroUpdate, privacy_policy::PrivacyPolicyInput},
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, Path, State},
    response::IntoResponse,
};
use serde_json::json;

/// `GET /api/hero`
pub async fn get_hero(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let hero = state.hero.get().await?;
    Ok(Json(json!({ "success": true, "data": hero })))
}

/// `PUT /api/hero`
pub async fn update_hero(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<HeroUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let mutation = state.hero.update(input).await?;
    Ok(Json(with_warning(
        json!({
            "success": true,
            "message": "Hero section updated successfully",
            "data": mutation.hero,
        }),
        mutation.warning,
    )))
}

/// `POST /api/hero/upload-banner` with a multipart `banner` file.
pub async fn upload_banner(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (upload, _) = read_file_part(multipart, "banner").await?;
    let banner = state.hero.upload_banner(upload).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Banner uploaded successfully",
        "data": banner,
    })))
}

/// `GET /api/privacy-policy`
pub async fn get_privacy_policy(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let policy = state.privacy_policy.get().await?;
    Ok(Json(json!({ "success": true, "data": policy })))
}

/// `POST /api/privacy-policy`
pub async fn save_privacy_policy(
    State(state): State<AppState>,
    ValidatedJson(input): ValidatedJson<PrivacyPolicyInput>,
) -> Result<impl IntoResponse, AppError> {
    let policy = state.privacy_policy.save(&input.content).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Privacy policy saved successfully",
        "data": policy,
    })))
}

/// `DELETE /api/privacy-policy/{id}`
pub async fn delete_privacy_policy(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id: i64 = id
        .parse()
        .map_err(|_| AppError::bad_request("Privacy policy id must be an integer"))?;
    state.privacy_policy.delete(id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Privacy policy deleted successfully",
    })))
}
