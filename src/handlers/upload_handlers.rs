//! Standalone image upload and delete endpoints for the admin dashboard.
//!
//! `POST /api/upload-image` accepts either a multipart form with an `image`
//! file part or a JSON body carrying a base64 data URL.

use crate::{
    errors::{AppError, ShopError},
    handlers::{extract::ApiJson, product_handlers::with_warning},
    services::image_service::{ImageUpload, MAX_IMAGE_BYTES},
    state::AppState,
};
use axum::{
    Json,
    extract::{FromRequest, Multipart, Request, State},
    http::header,
    response::IntoResponse,
};
use bytes::BytesMut;
use futures::TryStreamExt;
use serde::Deserialize;
use serde_json::json;

/// JSON variant of an image upload.
#[derive(Debug, Deserialize)]
pub struct DataUrlUpload {
    pub image: String,
    #[serde(rename = "oldImagePath", alias = "old_image_path")]
    pub old_image_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteImageRequest {
    #[serde(rename = "filePath", alias = "file_path")]
    pub file_path: Option<String>,
}

/// Read the named file part of a multipart form, plus any text fields.
pub(crate) async fn read_file_part(
    mut multipart: Multipart,
    field_name: &str,
) -> Result<(ImageUpload, Option<String>), AppError> {
    let mut upload = None;
    let mut old_path = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(err.body_text()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(name) if name == field_name => {
                let content_type = field.content_type().map(str::to_string);
                let file_name = field.file_name().map(str::to_string);
                let mut data = BytesMut::new();
                while let Some(chunk) = field
                    .try_next()
                    .await
                    .map_err(|err| AppError::bad_request(err.body_text()))?
                {
                    if data.len() + chunk.len() > MAX_IMAGE_BYTES {
                        return Err(ShopError::Upload(format!(
                            "Image exceeds the {} MB limit",
                            MAX_IMAGE_BYTES / (1024 * 1024)
                        ))
                        .into());
                    }
                    data.extend_from_slice(&chunk);
                }
                upload = Some(ImageUpload::from_file(
                    data.freeze(),
                    content_type.as_deref(),
                    file_name.as_deref(),
                ));
            }
            Some("oldImagePath") => {
                let text = field
                    .text()
                    .await
                    .map_err(|err| AppError::bad_request(err.body_text()))?;
                old_path = Some(text).filter(|t| !t.trim().is_empty());
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| {
        AppError::bad_request(format!("No file provided in field `{field_name}`"))
    })?;
    Ok((upload, old_path))
}

/// `POST /api/upload-image`
pub async fn upload_image(
    State(state): State<AppState>,
    request: Request,
) -> Result<impl IntoResponse, AppError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let (upload, old_path) = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
        read_file_part(multipart, "image").await?
    } else {
        let ApiJson(body) = ApiJson::<DataUrlUpload>::from_request(request, &state).await?;
        (ImageUpload::from_data_url(&body.image)?, body.old_image_path)
    };

    let stored = state.images.upload(upload).await?;
    let warning = match old_path {
        Some(path) => state.images.delete_by_path(&path).await.warning("Old image"),
        None => None,
    };

    Ok(Json(with_warning(
        json!({
            "success": true,
            "message": "Image uploaded successfully",
            "data": stored,
        }),
        warning,
    )))
}

/// `DELETE /api/delete-image`
pub async fn delete_image(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<DeleteImageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let path = request
        .file_path
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("filePath is required"))?;

    let outcome = state.images.delete_by_path(&path).await;
    if !outcome.success {
        let reason = outcome
            .reason
            .unwrap_or_else(|| "Image could not be deleted".into());
        return Err(ShopError::Upload(reason).into());
    }

    Ok(Json(json!({
        "success": true,
        "message": "Image deleted successfully",
    })))
}
