use std::{fmt::Display, str::FromStr};

use pasal_common::Rupee;
use serde::{Deserialize, Serialize};
use thiserror::Error;

//--------------------------------------   NormalizedStatus   --------------------------------------------------------
/// The provider-agnostic payment status vocabulary.
///
/// Every provider's status strings (`Completed`, `COMPLETE`, `Pending`, `User canceled`, ...) are reduced to
/// one of these before anything downstream sees them. `Unverified` marks a claim that failed signature or
/// amount checks and must never drive a state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizedStatus {
    Initiated,
    Pending,
    Completed,
    Failed,
    Cancelled,
    Unverified,
}

impl Display for NormalizedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NormalizedStatus::Initiated => "initiated",
            NormalizedStatus::Pending => "pending",
            NormalizedStatus::Completed => "completed",
            NormalizedStatus::Failed => "failed",
            NormalizedStatus::Cancelled => "cancelled",
            NormalizedStatus::Unverified => "unverified",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid normalized status: {0}")]
pub struct NormalizedStatusParseError(String);

impl FromStr for NormalizedStatus {
    type Err = NormalizedStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiated" => Ok(Self::Initiated),
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "unverified" => Ok(Self::Unverified),
            s => Err(NormalizedStatusParseError(s.to_string())),
        }
    }
}

//--------------------------------------    GatewayResult     --------------------------------------------------------
/// The normalized outcome of a gateway interaction (verify call or webhook parse).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayResult {
    /// The provider slug this result came from.
    pub provider: String,
    /// The provider's payment reference (pidx / transaction_uuid / manual ref).
    pub reference: String,
    pub status: NormalizedStatus,
    /// The amount the provider claims was paid, when it reports one.
    pub amount: Option<Rupee>,
    /// The raw provider payload, retained for the ledger.
    pub raw: serde_json::Value,
}

//--------------------------------------   InitiateRequest    --------------------------------------------------------
#[derive(Debug, Clone)]
pub struct InitiateRequest {
    /// The externally visible invoice number of the order.
    pub invoice: String,
    /// The exact amount due, against which every later claim is checked.
    pub amount: Rupee,
    pub tax_amount: Rupee,
    pub delivery_fee: Rupee,
    pub customer: CustomerInfo,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
}

//--------------------------------------   InitiateResponse   --------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
pub struct InitiateResponse {
    /// The provider reference for this initiation. The latest reference per order is the live one.
    pub reference: String,
    pub action: PaymentAction,
}

/// What the client must do to complete the payment.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentAction {
    /// Send the customer to this URL (Khalti).
    Redirect { url: String },
    /// POST these fields to this URL from the browser (eSewa form flow).
    Form { url: String, fields: Vec<(String, String)> },
    /// Nothing to do now; payment settles out of band (COD, bank transfer).
    None,
}
