//! 目录处理器

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header::CONTENT_TYPE, HeaderMap},
    response::Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{model::CatalogDocument, model::Product, service::CatalogService};
use crate::core::error::CoreError;
use crate::core::response::ApiResponse;

#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogService,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductBody {
    pub product: Product,
}

#[derive(Debug, Serialize)]
pub struct DeletedBody {
    pub id: String,
}

/// GET /products
pub async fn list_products(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Json<CatalogDocument> {
    // 列表接口始终成功，无法解析的查询串按无过滤处理
    let category = match query {
        Ok(Query(query)) => query.category,
        Err(rejection) => {
            debug!(error = %rejection, "忽略无法解析的查询参数");
            None
        }
    };
    let document = match category.as_deref() {
        Some(category) if !category.is_empty() => state.catalog.list_by_category(category).await,
        _ => state.catalog.list().await,
    };
    Json(document)
}

/// GET /products/{id}
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProductBody>, CoreError> {
    let product = state.catalog.get(&id).await?;
    Ok(Json(ProductBody { product }))
}

/// POST /products
pub async fn create_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<ProductBody>>, CoreError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let product = state.catalog.add_multipart(content_type, body).await?;
    Ok(Json(ApiResponse::success(
        ProductBody { product },
        "Product added successfully",
    )))
}

/// DELETE /products?id=
pub async fn delete_product(
    State(state): State<AppState>,
    query: Result<Query<DeleteQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<DeletedBody>>, CoreError> {
    let Query(query) = query.map_err(|rejection| CoreError::BadRequest(rejection.body_text()))?;
    let id = query
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| CoreError::BadRequest("Product ID is required".to_string()))?;

    let removed = state.catalog.remove(&id).await?;
    Ok(Json(ApiResponse::success(
        DeletedBody { id: removed.id },
        "Product deleted successfully",
    )))
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "storage": state.catalog.repository_name(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
