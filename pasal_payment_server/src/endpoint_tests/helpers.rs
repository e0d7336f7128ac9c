use actix_http::Request;
use actix_web::{http::StatusCode, test, web, App};
use pasal_common::{Rupee, Secret};
use pasal_gateways::{EsewaConfig, GatewayConfig, GatewayRegistry, KhaltiConfig};
use pasal_payment_engine::{
    events::EventProducers,
    test_utils::{prepare_test_env, random_db_path, seed_product},
    EngineConfig,
    OrderFlowApi,
    SqliteDatabase,
};
use serde_json::{json, Value};

use crate::{
    middleware::AdminAuthMiddlewareFactory,
    routes::{
        admin_create_order,
        admin_order,
        admin_transition,
        admin_withdrawal,
        checkout,
        health,
        payment_failure,
        payment_status,
        payment_success,
        payment_webhook,
    },
};

pub const ADMIN_KEY: &str = "test-admin-key";
// The public eSewa sandbox secret.
pub const ESEWA_SECRET: &str = "8gBm/:&EnhH.1/q";
// Provider lookups point at a closed local port, so a test that reaches one gets an immediate connection
// error instead of a real network call.
pub const DEAD_PROVIDER: &str = "http://127.0.0.1:9";

pub struct TestServer {
    pub db: SqliteDatabase,
}

impl TestServer {
    pub async fn new() -> Self {
        let db = prepare_test_env(&random_db_path()).await;
        Self { db }
    }

    /// A Rs 1000 product with stock, sold by seller #77.
    pub async fn seed_default_product(&self) -> i64 {
        seed_product(&self.db, "Dhaka topi", Rupee::from_rupees(1000), 10, Some(77), None).await
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.call(test::TestRequest::get().uri(path).to_request()).await
    }

    pub async fn get_with_key(&self, path: &str, key: &str) -> (StatusCode, Value) {
        self.call(test::TestRequest::get().uri(path).insert_header(("X-Admin-Api-Key", key)).to_request()).await
    }

    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.call(test::TestRequest::post().uri(path).set_json(body).to_request()).await
    }

    pub async fn post_with_key(&self, path: &str, body: Value, key: &str) -> (StatusCode, Value) {
        let req =
            test::TestRequest::post().uri(path).insert_header(("X-Admin-Api-Key", key)).set_json(body).to_request();
        self.call(req).await
    }

    /// Builds the app fresh for every request, exactly as the server wires it, and returns the response
    /// status with the body parsed as JSON (or wrapped as a JSON string for plain-text bodies).
    async fn call(&self, req: Request) -> (StatusCode, Value) {
        let api = OrderFlowApi::new(self.db.clone(), EventProducers::default(), EngineConfig::default());
        let config = GatewayConfig {
            khalti: KhaltiConfig {
                secret_key: Secret::new("test-khalti-key".to_string()),
                test_mode: true,
                api_base_override: Some(DEAD_PROVIDER.to_string()),
            },
            esewa: EsewaConfig {
                secret_key: Secret::new(ESEWA_SECRET.to_string()),
                product_code: "EPAYTEST".to_string(),
                test_mode: true,
                status_url_override: Some(DEAD_PROVIDER.to_string()),
            },
            ..GatewayConfig::default()
        };
        let registry = GatewayRegistry::from_config(&config).expect("Error building gateway registry");
        let admin_scope = web::scope("/admin")
            .wrap(AdminAuthMiddlewareFactory::new(Secret::new(ADMIN_KEY.to_string())))
            .service(admin_create_order)
            .service(admin_order)
            .service(admin_transition)
            .service(admin_withdrawal);
        let app = App::new()
            .app_data(web::Data::new(api))
            .app_data(web::Data::new(registry))
            .service(health)
            .service(checkout)
            .service(payment_status)
            .service(payment_success)
            .service(payment_failure)
            .service(payment_webhook)
            .service(admin_scope);
        let service = test::init_service(app).await;
        match test::try_call_service(&service, req).await {
            Ok(res) => {
                let status = res.status();
                let body = test::read_body(res).await;
                let value = serde_json::from_slice(&body)
                    .unwrap_or_else(|_| json!(String::from_utf8_lossy(&body).into_owned()));
                (status, value)
            },
            Err(e) => (e.as_response_error().status_code(), json!({ "error": e.to_string() })),
        }
    }
}

/// A one-line COD-style checkout for the given product. Delivery fee Rs 150.
pub fn checkout_body(product_id: i64, gateway: &str) -> Value {
    json!({
        "user_id": 42,
        "items": [{ "product_id": product_id, "quantity": 1 }],
        "recipient_name": "Sita Sharma",
        "phone": "9841000000",
        "address": "Baneshwor",
        "city": "Kathmandu",
        "gateway": gateway,
        "delivery_fee": 15_000,
    })
}
