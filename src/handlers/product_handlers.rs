//! HTTP handlers for the product catalog.

use crate::{
    errors::AppError,
    handlers::extract::{ApiJson, ValidatedJson, ValidatedQuery},
    models::{
        product::{
            BulkCreateRequest, BulkDeleteRequest, BulkUpdateRequest, CategoryQuery, CreateProduct,
            DeleteFilterRequest, FilterQuery, Pagination, PriceUpdate, ProductSort, SoldIncrement,
            SortQuery, TopSellingQuery, UpdateProduct,
        },
        validation_messages,
    },
    services::product_service::BatchDeletion,
    state::AppState,
};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::{Value, json};
use validator::Validate;

/// Attach `warning` to a response body when present.
pub(crate) fn with_warning(mut body: Value, warning: Option<String>) -> Value {
    if let (Some(warning), Some(map)) = (warning, body.as_object_mut()) {
        map.insert("warning".into(), Value::String(warning));
    }
    body
}

fn deletion_body(message: String, deletion: BatchDeletion) -> Value {
    let mut body = json!({
        "success": true,
        "message": message,
        "count": deletion.products.len(),
        "data": deletion.products,
    });
    if !deletion.warnings.is_empty() {
        body["warnings"] = json!(deletion.warnings);
    }
    body
}

/// `GET /api/products`
pub async fn list_products(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<SortQuery>,
) -> Result<impl IntoResponse, AppError> {
    let products = state.products.list_products(query.sort()).await?;
    Ok(Json(json!({
        "success": true,
        "count": products.len(),
        "data": products,
    })))
}

/// `GET /api/products/{id}`
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let product = state.products.get_product(&id).await?;
    Ok(Json(json!({ "success": true, "data": product })))
}

/// `GET /api/products/filter`
pub async fn filter_products(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<FilterQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = query.pagination();
    let result = state
        .products
        .query_products(&query.filter(), page, query.sort())
        .await?;

    let total_pages = (result.total + page.limit - 1) / page.limit;
    Ok(Json(json!({
        "success": true,
        "count": result.items.len(),
        "total": result.total,
        "data": result.items,
        "pagination": {
            "limit": page.limit,
            "offset": page.offset,
            "currentPage": page.offset / page.limit + 1,
            "totalPages": total_pages,
            "hasMore": page.has_more(result.total),
        },
    })))
}

/// `GET /api/products/category/{category}`
pub async fn products_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
    ValidatedQuery(query): ValidatedQuery<CategoryQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = query.limit.map(|limit| Pagination {
        limit,
        offset: query.offset,
    });
    let sort = ProductSort::new(query.sort_by, query.order);
    let result = state
        .products
        .products_by_category(&category, page, sort)
        .await?;

    Ok(Json(json!({
        "success": true,
        "category": category,
        "count": result.items.len(),
        "total": result.total,
        "data": result.items,
    })))
}

/// `GET /api/products/top-selling`
pub async fn top_selling(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<TopSellingQuery>,
) -> Result<impl IntoResponse, AppError> {
    let category = query.category.filter(|c| !c.is_empty());
    let products = state.products.top_selling(query.limit, category).await?;
    Ok(Json(json!({
        "success": true,
        "count": products.len(),
        "data": products,
    })))
}

/// `GET /api/products/stats`
pub async fn product_stats(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let stats = state.products.stats().await?;
    Ok(Json(json!({ "success": true, "data": stats })))
}

/// `GET /api/categories`
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let categories = state.products.categories().await?;
    Ok(Json(json!({
        "success": true,
        "count": categories.len(),
        "data": categories,
    })))
}

/// `POST /api/products`
pub async fn create_product(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<CreateProduct>,
) -> Result<impl IntoResponse, AppError> {
    let product = state.products.create_product(input).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Product created successfully",
            "data": product,
        })),
    ))
}

/// `POST /api/products/bulk`
pub async fn create_products(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<BulkCreateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let products = state.products.create_products(request.products).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": format!("{} products created successfully", products.len()),
            "count": products.len(),
            "data": products,
        })),
    ))
}

/// `PUT|PATCH /api/products/{id}`
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<UpdateProduct>,
) -> Result<impl IntoResponse, AppError> {
    let mutation = state.products.update_product(&id, patch).await?;
    Ok(Json(with_warning(
        json!({
            "success": true,
            "message": "Product updated successfully",
            "data": mutation.product,
        }),
        mutation.warning,
    )))
}

/// `PATCH /api/products/bulk`
///
/// 200 when every entry applied, 207 when some failed.
pub async fn update_products(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<BulkUpdateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = state.products.update_products(request.updates).await?;
    let status = if result.is_partial() {
        StatusCode::MULTI_STATUS
    } else {
        StatusCode::OK
    };

    let mut body = json!({
        "success": !result.is_partial(),
        "message": format!(
            "{} products updated, {} failed",
            result.updated.len(),
            result.failures.len()
        ),
        "updatedCount": result.updated.len(),
        "failedCount": result.failures.len(),
        "data": result.updated,
        "failures": result.failures,
    });
    if !result.warnings.is_empty() {
        body["warnings"] = json!(result.warnings);
    }
    Ok((status, Json(body)))
}

/// `PATCH /api/products/{id}/price`
pub async fn update_price(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(update): ValidatedJson<PriceUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let product = state.products.update_price(&id, update.price).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Product price updated successfully",
        "data": product,
    })))
}

/// `PATCH /api/products/{id}/sold`
///
/// The body is optional; an empty one increments by 1.
pub async fn increment_sold(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let increment: SoldIncrement = if body.iter().all(u8::is_ascii_whitespace) {
        SoldIncrement { quantity: 1 }
    } else {
        serde_json::from_slice(&body).map_err(|err| AppError::bad_request(err.to_string()))?
    };
    increment
        .validate()
        .map_err(|errors| AppError::validation(validation_messages(&errors)))?;

    let product = state.products.increment_sold(&id, increment.quantity).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Product sold count updated successfully",
        "data": product,
    })))
}

/// `DELETE /api/products/{id}`
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mutation = state.products.delete_product(&id).await?;
    Ok(Json(with_warning(
        json!({
            "success": true,
            "message": "Product deleted successfully",
            "data": mutation.product,
        }),
        mutation.warning,
    )))
}

/// `DELETE /api/products/bulk`
pub async fn delete_products(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<BulkDeleteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let deletion = state.products.delete_products(&request.ids).await?;
    let message = format!("{} products deleted successfully", deletion.products.len());
    Ok(Json(deletion_body(message, deletion)))
}

/// `DELETE /api/products/category/{category}`
pub async fn delete_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let deletion = state.products.delete_by_category(&category).await?;
    let message = format!(
        "{} products in category `{}` deleted successfully",
        deletion.products.len(),
        category
    );
    Ok(Json(deletion_body(message, deletion)))
}

/// `DELETE /api/products/filter`
pub async fn delete_by_filter(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<DeleteFilterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let deletion = state.products.delete_by_filter(&request).await?;
    let message = format!("{} products deleted successfully", deletion.products.len());
    Ok(Json(deletion_body(message, deletion)))
}
