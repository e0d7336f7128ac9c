//! Manual settlement gateways: cash on delivery and direct bank transfer.
//!
//! These providers have no API. Payment settles out of band (cash handed to the courier, or a transfer the
//! merchant reconciles against a screenshot), so `initiate` is a no-op and status stays pending until an
//! admin marks the order paid.

use async_trait::async_trait;
use pasal_common::Rupee;
use serde_json::{json, Value};

use crate::{
    data_objects::{GatewayResult, InitiateRequest, InitiateResponse, NormalizedStatus, PaymentAction},
    GatewayAdapter,
    GatewayError,
};

#[derive(Clone)]
pub struct ManualGateway {
    slug: &'static str,
}

impl ManualGateway {
    pub fn cash_on_delivery() -> Self {
        Self { slug: "cod" }
    }

    pub fn bank_transfer() -> Self {
        Self { slug: "bank_transfer" }
    }
}

#[async_trait]
impl GatewayAdapter for ManualGateway {
    fn slug(&self) -> &'static str {
        self.slug
    }

    fn is_digital(&self) -> bool {
        false
    }

    async fn initiate(&self, req: &InitiateRequest) -> Result<InitiateResponse, GatewayError> {
        Ok(InitiateResponse {
            reference: format!("{}-{}", self.slug, req.invoice),
            action: PaymentAction::None,
        })
    }

    async fn verify(&self, reference: &str, _expected: Rupee) -> Result<GatewayResult, GatewayError> {
        // There is no provider to ask. The claim is always "still pending"; admins settle these.
        Ok(GatewayResult {
            provider: self.slug.to_string(),
            reference: reference.to_string(),
            status: NormalizedStatus::Pending,
            amount: None,
            raw: json!({}),
        })
    }

    fn handle_webhook(&self, _raw: &Value) -> Result<GatewayResult, GatewayError> {
        Err(GatewayError::MalformedPayload(format!("{} does not deliver webhooks", self.slug)))
    }
}
