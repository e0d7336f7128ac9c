//! Khalti ePayment adapter.
//!
//! Khalti's KPG-2 flow: an authenticated `initiate` call returns a `pidx` and a hosted payment URL; the
//! customer pays there and is bounced back to our return URL with `pidx` and a claimed status in the query
//! string. Return/webhook payloads carry no signature, so a `Completed` claim is never applied from the
//! payload alone; the `lookup` endpoint is the authoritative source and is always consulted first.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    config::KhaltiConfig,
    data_objects::{GatewayResult, InitiateRequest, InitiateResponse, NormalizedStatus, PaymentAction},
    GatewayAdapter,
    GatewayError,
};

const KHALTI_LIVE_BASE: &str = "https://khalti.com/api/v2";
const KHALTI_TEST_BASE: &str = "https://dev.khalti.com/api/v2";

#[derive(Clone)]
pub struct KhaltiApi {
    config: KhaltiConfig,
    client: Arc<Client>,
    return_base: String,
}

impl KhaltiApi {
    pub fn new(config: KhaltiConfig, return_base: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::with_capacity(2);
        let auth = HeaderValue::from_str(&format!("Key {}", config.secret_key.reveal()))
            .map_err(|e| GatewayError::Initialization(e.to_string()))?;
        headers.insert("Authorization", auth);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client), return_base: return_base.trim_end_matches('/').to_string() })
    }

    fn api_base(&self) -> &str {
        match &self.config.api_base_override {
            Some(base) => base.as_str(),
            None if self.config.test_mode => KHALTI_TEST_BASE,
            None => KHALTI_LIVE_BASE,
        }
    }

    async fn post<T: for<'a> Deserialize<'a>>(&self, path: &str, body: Value) -> Result<T, GatewayError> {
        let url = format!("{}{path}", self.api_base());
        trace!("🏔️ POST {url}");
        let response =
            self.client.post(&url).json(&body).send().await.map_err(|e| GatewayError::RequestError(e.to_string()))?;
        if response.status().is_success() {
            response.json::<T>().await.map_err(|e| GatewayError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| GatewayError::RequestError(e.to_string()))?;
            Err(GatewayError::ProviderError { status, message })
        }
    }
}

/// Khalti's status vocabulary, per the ePayment lookup documentation.
pub fn normalize_khalti_status(status: &str) -> NormalizedStatus {
    match status.to_ascii_lowercase().as_str() {
        "completed" => NormalizedStatus::Completed,
        "pending" | "initiated" => NormalizedStatus::Pending,
        "expired" | "user canceled" | "user cancelled" | "canceled" | "cancelled" => NormalizedStatus::Cancelled,
        "refunded" | "partially refunded" | "failed" => NormalizedStatus::Failed,
        other => {
            warn!("🏔️ Unrecognised Khalti status '{other}'. Treating as unverified.");
            NormalizedStatus::Unverified
        },
    }
}

#[derive(Debug, Deserialize)]
struct InitiatePayload {
    pidx: String,
    payment_url: String,
}

#[async_trait]
impl GatewayAdapter for KhaltiApi {
    fn slug(&self) -> &'static str {
        "khalti"
    }

    fn is_digital(&self) -> bool {
        true
    }

    async fn initiate(&self, req: &InitiateRequest) -> Result<InitiateResponse, GatewayError> {
        let body = json!({
            "return_url": format!("{}/payment/khalti/success/{}", self.return_base, req.invoice),
            "website_url": self.return_base,
            // Khalti expects the amount in paisa, which is exactly our internal representation.
            "amount": req.amount.value(),
            "purchase_order_id": req.invoice,
            "purchase_order_name": format!("Order #{}", req.invoice),
            "customer_info": req.customer,
        });
        let payload: InitiatePayload = self.post("/epayment/initiate/", body).await?;
        debug!("🏔️ Initiated Khalti payment for invoice {}. pidx: {}", req.invoice, payload.pidx);
        Ok(InitiateResponse {
            reference: payload.pidx,
            action: PaymentAction::Redirect { url: payload.payment_url },
        })
    }

    async fn verify(&self, reference: &str, _expected: pasal_common::Rupee) -> Result<GatewayResult, GatewayError> {
        let raw: Value = self.post("/epayment/lookup/", json!({ "pidx": reference })).await?;
        let status = raw["status"].as_str().map(normalize_khalti_status).unwrap_or(NormalizedStatus::Unverified);
        let amount = raw["total_amount"].as_i64().map(pasal_common::Rupee::from);
        debug!("🏔️ Khalti lookup for {reference}: {status}");
        Ok(GatewayResult { provider: "khalti".to_string(), reference: reference.to_string(), status, amount, raw })
    }

    fn handle_webhook(&self, raw: &Value) -> Result<GatewayResult, GatewayError> {
        let pidx = raw["pidx"]
            .as_str()
            .ok_or_else(|| GatewayError::MalformedPayload("Khalti payload is missing pidx".to_string()))?
            .to_string();
        let claimed = raw["status"].as_str().unwrap_or("");
        // The payload is unsigned, so a "Completed" claim cannot be taken at face value. Failure and
        // cancellation claims are safe to act on (they can only ever release stock back to the shelf);
        // anything that would move money requires the lookup endpoint to agree.
        let status = match normalize_khalti_status(claimed) {
            NormalizedStatus::Completed => NormalizedStatus::Unverified,
            other => other,
        };
        let amount = raw["total_amount"].as_i64().map(pasal_common::Rupee::from);
        Ok(GatewayResult { provider: "khalti".to_string(), reference: pidx, status, amount, raw: raw.clone() })
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    fn api() -> KhaltiApi {
        KhaltiApi::new(KhaltiConfig::default(), "https://shop.example.com", std::time::Duration::from_secs(5))
            .unwrap()
    }

    #[test]
    fn status_normalization() {
        assert_eq!(normalize_khalti_status("Completed"), NormalizedStatus::Completed);
        assert_eq!(normalize_khalti_status("Pending"), NormalizedStatus::Pending);
        assert_eq!(normalize_khalti_status("User canceled"), NormalizedStatus::Cancelled);
        assert_eq!(normalize_khalti_status("Expired"), NormalizedStatus::Cancelled);
        assert_eq!(normalize_khalti_status("Refunded"), NormalizedStatus::Failed);
        assert_eq!(normalize_khalti_status("wat"), NormalizedStatus::Unverified);
    }

    #[test]
    fn completed_claim_from_unsigned_payload_is_unverified() {
        let payload = json!({ "pidx": "Fr2GqkYmil", "status": "Completed", "total_amount": 128000 });
        let result = api().handle_webhook(&payload).unwrap();
        assert_eq!(result.status, NormalizedStatus::Unverified);
        assert_eq!(result.reference, "Fr2GqkYmil");
    }

    #[test]
    fn cancellation_claim_is_accepted() {
        let payload = json!({ "pidx": "Fr2GqkYmil", "status": "User canceled" });
        let result = api().handle_webhook(&payload).unwrap();
        assert_eq!(result.status, NormalizedStatus::Cancelled);
    }

    #[test]
    fn missing_pidx_is_rejected() {
        let payload = json!({ "status": "Completed" });
        assert!(api().handle_webhook(&payload).is_err());
    }
}
