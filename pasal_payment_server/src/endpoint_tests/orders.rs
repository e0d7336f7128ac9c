use actix_web::http::StatusCode;
use serde_json::json;

use super::helpers::{checkout_body, TestServer};

#[actix_web::test]
async fn health_is_ok() {
    let server = TestServer::new().await;
    let (status, body) = server.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_str().unwrap().contains("👍️"));
}

#[actix_web::test]
async fn cod_checkout_is_priced_on_the_server() {
    let server = TestServer::new().await;
    let product = server.seed_default_product().await;
    let (status, body) = server.post("/checkout", checkout_body(product, "cod")).await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    // Rs 1000 + 13% VAT + Rs 150 delivery.
    assert_eq!(body["final_amount"], 128_000);
    assert_eq!(body["status"], "Pending");
    assert_eq!(body["payment_status"], "Pending");
    assert_eq!(body["payment"]["type"], "none");
    assert!(body["invoice"].as_str().unwrap().starts_with("PSL-"));
}

#[actix_web::test]
async fn checkout_with_unknown_gateway_is_rejected() {
    let server = TestServer::new().await;
    let product = server.seed_default_product().await;
    let (status, _) = server.post("/checkout", checkout_body(product, "paypal")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn checkout_with_unknown_product_is_rejected() {
    let server = TestServer::new().await;
    let (status, _) = server.post("/checkout", checkout_body(9999, "cod")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn empty_cart_is_rejected() {
    let server = TestServer::new().await;
    let mut body = checkout_body(1, "cod");
    body["items"] = json!([]);
    let (status, _) = server.post("/checkout", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
