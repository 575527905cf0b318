//! 应用层：路由与启动装配

pub mod catalog;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::core::middleware::request_logging_middleware;
use crate::infrastructure::config::{HttpConfig, StorageBackend, StorageConfig};
use crate::infrastructure::store::{HttpObjectStore, ObjectStore, StoreError};
use catalog::handler::{self, AppState};
use catalog::{
    AssetPublisher, CatalogRepository, CatalogService, Clock, DurableCatalogRepository,
    FallbackCatalogRepository, MemoryCatalogRepository, SystemClock,
};

/// 按存储配置装配目录服务，后端只在这里选定一次
pub fn build_catalog(config: &StorageConfig) -> Result<CatalogService, StoreError> {
    let store: Option<Arc<dyn ObjectStore>> = match config.backend {
        StorageBackend::Durable => Some(Arc::new(HttpObjectStore::from_config(config)?)),
        StorageBackend::Memory => None,
    };
    Ok(assemble_catalog(config, store, Arc::new(SystemClock)))
}

/// 用给定的对象存储与时钟装配目录服务；`store` 为 `None` 时只使用内存仓库
pub fn assemble_catalog(
    config: &StorageConfig,
    store: Option<Arc<dyn ObjectStore>>,
    clock: Arc<dyn Clock>,
) -> CatalogService {
    let repository: Arc<dyn CatalogRepository> = match &store {
        Some(store) => {
            let durable = Arc::new(DurableCatalogRepository::new(
                store.clone(),
                config.document_key.clone(),
            ));
            if config.fallback_on_error {
                Arc::new(FallbackCatalogRepository::new(
                    durable,
                    MemoryCatalogRepository::new(),
                ))
            } else {
                durable
            }
        }
        None => Arc::new(MemoryCatalogRepository::new()),
    };

    info!(
        repository = repository.name(),
        store = ?store.as_ref().map(|s| s.backend_name()),
        policy = ?config.write_policy,
        "目录存储已选定"
    );

    let publisher = AssetPublisher::new(store, &config.asset_prefix, clock.clone());
    CatalogService::new(repository, publisher, clock)
        .with_write_policy(config.write_policy, config.max_write_attempts)
}

/// 创建路由
pub fn router(state: AppState, http: &HttpConfig) -> Router {
    Router::new()
        .route(
            "/products",
            get(handler::list_products)
                .post(handler::create_product)
                .delete(handler::delete_product),
        )
        .route("/products/{id}", get(handler::get_product))
        .route("/health", get(handler::health_check))
        .layer(DefaultBodyLimit::max(http.max_body_bytes))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TimeoutLayer::new(Duration::from_secs(http.timeout_seconds)))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
