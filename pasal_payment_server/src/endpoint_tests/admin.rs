use actix_web::http::StatusCode;
use serde_json::json;

use super::helpers::{checkout_body, TestServer, ADMIN_KEY};

#[actix_web::test]
async fn admin_surface_requires_the_api_key() {
    let server = TestServer::new().await;
    let (status, _) = server.get("/admin/orders/1").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = server.get_with_key("/admin/orders/1", "not-the-key").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    // With the right key the request reaches the handler (and 404s, since nothing exists yet).
    let (status, _) = server.get_with_key("/admin/orders/1", ADMIN_KEY).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn admin_walks_an_order_to_delivery() {
    let server = TestServer::new().await;
    let product = server.seed_default_product().await;
    let (_, order) = server.post("/checkout", checkout_body(product, "cod")).await;
    let order_id = order["order_id"].as_i64().unwrap();
    let path = format!("/admin/orders/{order_id}/status");

    for body in [
        json!({ "status": "Confirmed", "payment_status": "Paid" }),
        json!({ "status": "Processing" }),
        json!({ "status": "Shipped" }),
        json!({ "status": "Delivered", "courier_confirmed": true }),
    ] {
        let (status, response) = server.post_with_key(&path, body, ADMIN_KEY).await;
        assert_eq!(status, StatusCode::OK, "response: {response}");
    }

    let (_, snapshot) = server.get_with_key(&format!("/admin/orders/{order_id}"), ADMIN_KEY).await;
    assert_eq!(snapshot["order"]["status"], "Delivered");
    assert_eq!(snapshot["order"]["payment_status"], "Paid");
}

#[actix_web::test]
async fn illegal_transitions_are_conflicts() {
    let server = TestServer::new().await;
    let product = server.seed_default_product().await;
    let (_, order) = server.post("/checkout", checkout_body(product, "cod")).await;
    let order_id = order["order_id"].as_i64().unwrap();
    let path = format!("/admin/orders/{order_id}/status");

    // Fulfilment only ever moves forward.
    let (status, _) = server.post_with_key(&path, json!({ "status": "Confirmed" }), ADMIN_KEY).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = server.post_with_key(&path, json!({ "status": "Pending" }), ADMIN_KEY).await;
    assert_eq!(status, StatusCode::CONFLICT);
    // An empty request is a client error, not a no-op.
    let (status, _) = server.post_with_key(&path, json!({}), ADMIN_KEY).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn admin_creates_an_order_without_provider_initiation() {
    let server = TestServer::new().await;
    let product = server.seed_default_product().await;
    let (status, body) = server.post_with_key("/admin/orders", checkout_body(product, "bank_transfer"), ADMIN_KEY).await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["payment"]["type"], "none");

    let order_id = body["order_id"].as_i64().unwrap();
    let (_, snapshot) = server.get_with_key(&format!("/admin/orders/{order_id}"), ADMIN_KEY).await;
    assert_eq!(snapshot["order"]["created_by_admin"], true);
    assert_eq!(snapshot["order"]["source"], "Admin");
}
