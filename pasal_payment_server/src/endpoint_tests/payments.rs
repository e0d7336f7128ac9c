use actix_web::http::StatusCode;
use pasal_gateways::sign_fields;
use serde_json::{json, Value};

use super::helpers::{checkout_body, TestServer, ADMIN_KEY, ESEWA_SECRET};

fn form_field(payment: &Value, name: &str) -> String {
    payment["fields"]
        .as_array()
        .expect("payment action is not a form")
        .iter()
        .find(|f| f[0] == name)
        .and_then(|f| f[1].as_str())
        .unwrap_or_else(|| panic!("missing form field {name}"))
        .to_string()
}

/// A COMPLETE status document signed the way eSewa signs its success callbacks.
fn signed_complete_doc(transaction_uuid: &str, total_amount: &str) -> Value {
    let doc = json!({
        "transaction_code": "000AWEO",
        "status": "COMPLETE",
        "total_amount": total_amount,
        "transaction_uuid": transaction_uuid,
        "product_code": "EPAYTEST",
        "signed_field_names": "transaction_code,status,total_amount,transaction_uuid,product_code",
    });
    let lookup = |name: &str| doc[name].as_str().map(|s| s.to_string());
    let signature =
        sign_fields(ESEWA_SECRET, "transaction_code,status,total_amount,transaction_uuid,product_code", lookup);
    let mut doc = doc;
    doc["signature"] = json!(signature);
    doc
}

#[actix_web::test]
async fn esewa_checkout_returns_a_signed_form() {
    let server = TestServer::new().await;
    let product = server.seed_default_product().await;
    let (status, body) = server.post("/checkout", checkout_body(product, "esewa")).await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["payment"]["type"], "form");
    assert_eq!(form_field(&body["payment"], "total_amount"), "1280.00");
    assert!(!form_field(&body["payment"], "signature").is_empty());
    assert_eq!(body["payment_status"], "Pending");
}

#[actix_web::test]
async fn signed_esewa_webhook_confirms_payment() {
    let server = TestServer::new().await;
    let product = server.seed_default_product().await;
    let (_, order) = server.post("/checkout", checkout_body(product, "esewa")).await;
    let uuid = form_field(&order["payment"], "transaction_uuid");
    let total = form_field(&order["payment"], "total_amount");

    let (status, body) = server.post("/payment/esewa/webhook", signed_complete_doc(&uuid, &total)).await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["success"], true);

    let order_id = order["order_id"].as_i64().unwrap();
    let (status, snapshot) = server.get_with_key(&format!("/admin/orders/{order_id}"), ADMIN_KEY).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["order"]["status"], "Confirmed");
    assert_eq!(snapshot["order"]["payment_status"], "Paid");
    // The initiation and the webhook are both in the ledger.
    assert!(snapshot["ledger"].as_array().unwrap().len() >= 2);
}

#[actix_web::test]
async fn tampered_webhook_is_recorded_but_never_applied() {
    let server = TestServer::new().await;
    let product = server.seed_default_product().await;
    let (_, order) = server.post("/checkout", checkout_body(product, "esewa")).await;
    let uuid = form_field(&order["payment"], "transaction_uuid");

    let mut doc = signed_complete_doc(&uuid, "1280.00");
    doc["total_amount"] = json!("1.00");
    let (status, _) = server.post("/payment/esewa/webhook", doc).await;
    assert_eq!(status, StatusCode::OK);

    let order_id = order["order_id"].as_i64().unwrap();
    let (_, snapshot) = server.get_with_key(&format!("/admin/orders/{order_id}"), ADMIN_KEY).await;
    assert_eq!(snapshot["order"]["payment_status"], "Pending");
    let last = snapshot["ledger"].as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["normalized_status"], "unverified");
}

#[actix_web::test]
async fn unsigned_completion_claim_waits_for_the_provider() {
    let server = TestServer::new().await;
    let product = server.seed_default_product().await;
    // Khalti order without provider initiation, as the admin surface creates them.
    let (status, order) = server.post_with_key("/admin/orders", checkout_body(product, "khalti"), ADMIN_KEY).await;
    assert_eq!(status, StatusCode::OK, "body: {order}");
    let order_id = order["order_id"].as_i64().unwrap();
    let invoice = order["invoice"].as_str().unwrap();

    // Khalti webhooks are unsigned, so a "Completed" claim only holds if the lookup endpoint agrees. The
    // lookup cannot be reached here, so the claim is recorded and nothing settles.
    let payload = json!({
        "pidx": "Fr2GqkYmil",
        "status": "Completed",
        "total_amount": order["final_amount"],
        "purchase_order_id": invoice,
    });
    let (status, body) = server.post("/payment/khalti/webhook", payload).await;
    assert_eq!(status, StatusCode::OK, "body: {body}");

    let (_, snapshot) = server.get_with_key(&format!("/admin/orders/{order_id}"), ADMIN_KEY).await;
    assert_eq!(snapshot["order"]["payment_status"], "Pending");
    assert_eq!(snapshot["order"]["status"], "Pending");
    let last = snapshot["ledger"].as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["normalized_status"], "unverified");
}

#[actix_web::test]
async fn webhook_for_an_unknown_order_is_rejected() {
    let server = TestServer::new().await;
    let doc = signed_complete_doc("ORDER-PSL-0-0-1700000000", "1280.00");
    let (status, _) = server.post("/payment/esewa/webhook", doc).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn abandoned_checkout_is_cancelled_by_the_failure_return() {
    let server = TestServer::new().await;
    let product = server.seed_default_product().await;
    let (_, order) = server.post("/checkout", checkout_body(product, "esewa")).await;
    let invoice = order["invoice"].as_str().unwrap();

    let (status, body) = server.get(&format!("/payment/esewa/failure/{invoice}")).await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["status"], "Cancelled");
    assert_eq!(body["payment_status"], "Failed");

    // The return is idempotent; a second bounce changes nothing.
    let (status, body) = server.get(&format!("/payment/esewa/failure/{invoice}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Cancelled");
}
