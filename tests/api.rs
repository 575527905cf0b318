//! HTTP 接口测试：直接驱动路由，不监听端口

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use nautics_catalog::app::{assemble_catalog, catalog::handler::AppState, router};
use nautics_catalog::app::catalog::FixedClock;
use nautics_catalog::infrastructure::config::{HttpConfig, StorageConfig};
use nautics_catalog::infrastructure::store::{MemoryObjectStore, ObjectStore};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "api-test-boundary";

fn app_with(store: Option<Arc<MemoryObjectStore>>, http: HttpConfig) -> Router {
    let catalog = assemble_catalog(
        &StorageConfig::default(),
        store.map(|s| s as Arc<dyn ObjectStore>),
        Arc::new(FixedClock::from_millis(1_700_000_000_000)),
    );
    router(AppState { catalog }, &http)
}

fn app() -> Router {
    app_with(None, HttpConfig::default())
}

fn product_form(category: &str, with_image: bool) -> Body {
    let mut body = String::new();
    for (name, value) in [
        ("category", category),
        ("name", "Gyrocompass"),
        ("description", "Fibre optic"),
        ("link", "/products/navigation"),
    ] {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    if with_image {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"gyro.png\"\r\nContent-Type: image/png\r\n\r\nPNG\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    Body::from(body)
}

fn post_product(body: Body) -> Request<Body> {
    Request::post("/products")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(body)
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::delete(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn empty_catalog_lists_no_products() {
    let (status, json) = send(&app(), get("/products")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!({ "products": [] }));
}

#[tokio::test]
async fn create_list_get_and_delete() {
    let app = app();

    let (status, json) = send(&app, post_product(product_form("navigation", true))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Product added successfully");
    let id = json["product"]["id"].as_str().unwrap().to_string();
    assert_eq!(id, "navigation-1700000000000");
    assert_eq!(json["product"]["createdAt"], "2023-11-14T22:13:20Z");
    assert!(json["product"]["image"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));

    let (status, json) = send(&app, get("/products")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["products"].as_array().unwrap().len(), 1);

    let (status, json) = send(&app, get(&format!("/products/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["product"]["name"], "Gyrocompass");

    let (status, json) = send(&app, delete(&format!("/products?id={id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Product deleted successfully");
    assert_eq!(json["id"], id.as_str());

    let (_, json) = send(&app, get("/products")).await;
    assert!(json["products"].as_array().unwrap().is_empty());

    let (status, json) = send(&app, delete(&format!("/products?id={id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Product not found");
}

#[tokio::test]
async fn category_query_filters_listing() {
    let app = app();
    send(&app, post_product(product_form("navigation", true))).await;
    send(&app, post_product(product_form("safety", true))).await;

    let (_, json) = send(&app, get("/products?category=safety")).await;
    let products = json["products"].as_array().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["category"], "safety");
}

#[tokio::test]
async fn create_with_durable_store_returns_public_url() {
    let store = Arc::new(MemoryObjectStore::with_base_url("https://cdn.example.com"));
    let app = app_with(Some(store.clone()), HttpConfig::default());

    let (status, json) = send(&app, post_product(product_form("navigation", true))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json["product"]["image"],
        "https://cdn.example.com/products/1700000000000-gyro.png"
    );
    assert_eq!(json["product"]["imageKey"], "products/1700000000000-gyro.png");
    assert!(store.contains("data/products.json"));
}

#[tokio::test]
async fn create_without_image_is_bad_request() {
    let (status, json) = send(&app(), post_product(product_form("navigation", false))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "At least one image is required");
    assert_eq!(json["code"], 400);
}

#[tokio::test]
async fn create_with_missing_field_names_it() {
    let (status, json) = send(&app(), post_product(product_form("", true))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Missing required fields: category");
}

#[tokio::test]
async fn non_multipart_body_is_bad_request() {
    let request = Request::post("/products")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"name":"PLC"}"#))
        .unwrap();
    let (status, _) = send(&app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unparsable_list_query_falls_back_to_full_listing() {
    let app = app();
    send(&app, post_product(product_form("navigation", true))).await;
    send(&app, post_product(product_form("safety", true))).await;

    let (status, json) = send(&app, get("/products?category=a&category=b")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["products"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn unparsable_delete_query_is_json_bad_request() {
    let (status, json) = send(&app(), delete("/products?id=a&id=b")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], 400);
    assert!(json["error"].as_str().unwrap().contains("id"));
}

#[tokio::test]
async fn delete_without_id_is_bad_request() {
    let app = app();
    for uri in ["/products", "/products?id="] {
        let (status, json) = send(&app, delete(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Product ID is required");
    }
}

#[tokio::test]
async fn unknown_product_is_not_found() {
    let (status, json) = send(&app(), get("/products/navigation-1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Product not found");
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let http = HttpConfig {
        max_body_bytes: 64,
        ..HttpConfig::default()
    };
    let response = app_with(None, http)
        .oneshot(post_product(product_form("navigation", true)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn health_reports_repository() {
    let (status, json) = send(&app(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["storage"], "memory");
}
