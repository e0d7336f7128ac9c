//! eSewa ePay v2 adapter.
//!
//! eSewa is form-driven: `initiate` builds a signed set of form fields the browser posts to the eSewa payment
//! page. The success callback delivers a base64-encoded JSON document whose signed fields must re-verify
//! under the merchant secret before any claim in it is believed. The transaction status API is the
//! authoritative lookup and needs the product code, transaction uuid and total amount to answer.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use log::*;
use pasal_common::Rupee;
use reqwest::Client;
use serde_json::Value;

use crate::{
    config::EsewaConfig,
    data_objects::{GatewayResult, InitiateRequest, InitiateResponse, NormalizedStatus, PaymentAction},
    signature::{sign_fields, verify_signed_fields},
    GatewayAdapter,
    GatewayError,
};

const ESEWA_LIVE_FORM_URL: &str = "https://epay.esewa.com.np/api/epay/main/v2/form";
const ESEWA_TEST_FORM_URL: &str = "https://rc-epay.esewa.com.np/api/epay/main/v2/form";
const ESEWA_LIVE_STATUS_URL: &str = "https://epay.esewa.com.np/api/epay/transaction/status/";
const ESEWA_TEST_STATUS_URL: &str = "https://rc.esewa.com.np/api/epay/transaction/status/";

#[derive(Clone)]
pub struct EsewaApi {
    config: EsewaConfig,
    client: Arc<Client>,
    return_base: String,
}

impl EsewaApi {
    pub fn new(config: EsewaConfig, return_base: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| GatewayError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client), return_base: return_base.trim_end_matches('/').to_string() })
    }

    fn form_url(&self) -> &'static str {
        if self.config.test_mode {
            ESEWA_TEST_FORM_URL
        } else {
            ESEWA_LIVE_FORM_URL
        }
    }

    fn status_url(&self) -> &str {
        match &self.config.status_url_override {
            Some(url) => url.as_str(),
            None if self.config.test_mode => ESEWA_TEST_STATUS_URL,
            None => ESEWA_LIVE_STATUS_URL,
        }
    }
}

/// eSewa's transaction status vocabulary.
pub fn normalize_esewa_status(status: &str) -> NormalizedStatus {
    match status.to_ascii_uppercase().as_str() {
        "COMPLETE" => NormalizedStatus::Completed,
        "PENDING" | "AMBIGUOUS" => NormalizedStatus::Pending,
        "CANCELED" | "CANCELLED" | "NOT_FOUND" => NormalizedStatus::Cancelled,
        "FULL_REFUND" | "PARTIAL_REFUND" | "FAILURE" => NormalizedStatus::Failed,
        other => {
            warn!("💸️ Unrecognised eSewa status '{other}'. Treating as unverified.");
            NormalizedStatus::Unverified
        },
    }
}

/// eSewa reports amounts either as JSON numbers or as strings with thousands separators ("1,280.0").
fn parse_esewa_amount(value: &Value) -> Option<Rupee> {
    match value {
        Value::Number(n) => {
            // Whole-rupee numbers; fractional paisa go through the string path.
            n.as_f64().map(|f| Rupee::from((f * 100.0).round() as i64))
        },
        Value::String(s) => s.replace(',', "").parse::<Rupee>().ok(),
        _ => None,
    }
}

/// The success callback arrives as `?data=<base64 json>`; webhooks may also post the document directly.
fn decode_callback_document(raw: &Value) -> Result<Value, GatewayError> {
    match raw.get("data") {
        Some(Value::String(b64)) => {
            let bytes =
                base64::decode(b64).map_err(|e| GatewayError::MalformedPayload(format!("Invalid base64 data: {e}")))?;
            serde_json::from_slice(&bytes).map_err(|e| GatewayError::MalformedPayload(format!("Invalid JSON data: {e}")))
        },
        _ => Ok(raw.clone()),
    }
}

#[async_trait]
impl GatewayAdapter for EsewaApi {
    fn slug(&self) -> &'static str {
        "esewa"
    }

    fn is_digital(&self) -> bool {
        true
    }

    async fn initiate(&self, req: &InitiateRequest) -> Result<InitiateResponse, GatewayError> {
        let transaction_uuid = format!("ORDER-{}-{}", req.invoice, Utc::now().timestamp());
        let goods_amount = req.amount - req.tax_amount - req.delivery_fee;
        let fields = vec![
            ("amount".to_string(), goods_amount.to_decimal_string()),
            ("tax_amount".to_string(), req.tax_amount.to_decimal_string()),
            ("total_amount".to_string(), req.amount.to_decimal_string()),
            ("transaction_uuid".to_string(), transaction_uuid.clone()),
            ("product_code".to_string(), self.config.product_code.clone()),
            ("product_service_charge".to_string(), "0.00".to_string()),
            ("product_delivery_charge".to_string(), req.delivery_fee.to_decimal_string()),
            ("success_url".to_string(), format!("{}/payment/esewa/success/{}", self.return_base, req.invoice)),
            ("failure_url".to_string(), format!("{}/payment/esewa/failure/{}", self.return_base, req.invoice)),
            ("signed_field_names".to_string(), "total_amount,transaction_uuid,product_code".to_string()),
        ];
        let lookup = |name: &str| fields.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone());
        let signature =
            sign_fields(self.config.secret_key.reveal(), "total_amount,transaction_uuid,product_code", lookup);
        let mut fields = fields;
        fields.push(("signature".to_string(), signature));
        debug!("💸️ Prepared eSewa form for invoice {}. transaction_uuid: {transaction_uuid}", req.invoice);
        Ok(InitiateResponse {
            reference: transaction_uuid,
            action: PaymentAction::Form { url: self.form_url().to_string(), fields },
        })
    }

    async fn verify(&self, reference: &str, expected: Rupee) -> Result<GatewayResult, GatewayError> {
        let url = self.status_url();
        trace!("💸️ GET {url} for {reference}");
        let response = self
            .client
            .get(url)
            .query(&[
                ("product_code", self.config.product_code.as_str()),
                ("total_amount", expected.to_decimal_string().as_str()),
                ("transaction_uuid", reference),
            ])
            .send()
            .await
            .map_err(|e| GatewayError::RequestError(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| GatewayError::RequestError(e.to_string()))?;
            return Err(GatewayError::ProviderError { status, message });
        }
        let raw: Value = response.json().await.map_err(|e| GatewayError::JsonError(e.to_string()))?;
        let status = raw["status"].as_str().map(normalize_esewa_status).unwrap_or(NormalizedStatus::Unverified);
        let amount = parse_esewa_amount(&raw["total_amount"]);
        debug!("💸️ eSewa status for {reference}: {status}");
        Ok(GatewayResult { provider: "esewa".to_string(), reference: reference.to_string(), status, amount, raw })
    }

    fn handle_webhook(&self, raw: &Value) -> Result<GatewayResult, GatewayError> {
        let doc = decode_callback_document(raw)?;
        let reference = doc["transaction_uuid"]
            .as_str()
            .ok_or_else(|| GatewayError::MalformedPayload("eSewa payload is missing transaction_uuid".to_string()))?
            .to_string();
        let amount = parse_esewa_amount(&doc["total_amount"]);
        let claimed = doc["status"].as_str().unwrap_or("");
        let signed_field_names = doc["signed_field_names"].as_str().unwrap_or("");
        let received_signature = doc["signature"].as_str().unwrap_or("");
        let lookup = |name: &str| match &doc[name] {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        };
        let verified = !signed_field_names.is_empty()
            && !received_signature.is_empty()
            && verify_signed_fields(self.config.secret_key.reveal(), signed_field_names, received_signature, lookup);
        let status = if verified {
            normalize_esewa_status(claimed)
        } else {
            warn!("💸️ eSewa callback for {reference} failed signature verification. Dropping claim.");
            NormalizedStatus::Unverified
        };
        Ok(GatewayResult { provider: "esewa".to_string(), reference, status, amount, raw: doc })
    }
}
