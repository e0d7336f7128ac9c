use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use pasal_gateways::GatewayError;
use pasal_payment_engine::OrderFlowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The requested change conflicts with the order's current state. {0}")]
    Conflict(String),
    #[error("The request was rejected. {0}")]
    Rejected(String),
    #[error("Unknown payment provider: {0}")]
    UnknownProvider(String),
    #[error("The payment provider could not be reached. {0}")]
    ProviderUnavailable(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::Rejected(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::UnknownProvider(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

/// Engine errors map onto HTTP codes without leaking backend detail. Validation failures are the client's
/// fault (400), state-machine violations are conflicts (409), and anything touching the database stays an
/// opaque 500 with the detail in the server log only.
impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::OrderNotFound(_) | OrderFlowError::InvoiceNotFound(_) | OrderFlowError::ProductNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
            OrderFlowError::EmptyOrder
            | OrderFlowError::InvalidQuantity(_)
            | OrderFlowError::CouponInvalid(_)
            | OrderFlowError::InvalidWithdrawalAmount => Self::Rejected(e.to_string()),
            OrderFlowError::InvalidTransition(_)
            | OrderFlowError::AmountMismatch { .. }
            | OrderFlowError::ProviderMismatch { .. }
            | OrderFlowError::InsufficientBalance { .. } => Self::Conflict(e.to_string()),
            OrderFlowError::DatabaseError(_) | OrderFlowError::SideEffectFailed { .. } => {
                log::error!("💻️ Backend error: {e}");
                Self::BackendError("Internal error".to_string())
            },
        }
    }
}

impl From<GatewayError> for ServerError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::UnknownGateway(slug) => Self::UnknownProvider(slug),
            GatewayError::MalformedPayload(_) | GatewayError::InvalidCurrencyAmount(_) => {
                Self::InvalidRequestBody(e.to_string())
            },
            GatewayError::SignatureInvalid => Self::Rejected("Payment notification could not be verified".to_string()),
            GatewayError::RequestError(_) | GatewayError::ProviderError { .. } => {
                log::warn!("🌐️ Provider error: {e}");
                Self::ProviderUnavailable("The payment provider did not respond as expected".to_string())
            },
            GatewayError::Initialization(_) | GatewayError::JsonError(_) => {
                log::error!("🌐️ Gateway error: {e}");
                Self::BackendError("Internal error".to_string())
            },
        }
    }
}
