use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Could not initialize gateway client: {0}")]
    Initialization(String),
    #[error("Gateway request failed: {0}")]
    RequestError(String),
    #[error("Provider returned an error. Status {status}. {message}")]
    ProviderError { status: u16, message: String },
    #[error("Could not deserialize provider response: {0}")]
    JsonError(String),
    #[error("Webhook payload failed signature verification")]
    SignatureInvalid,
    #[error("Webhook payload is malformed: {0}")]
    MalformedPayload(String),
    #[error("Unknown gateway slug: {0}")]
    UnknownGateway(String),
    #[error("Invalid currency amount: {0}")]
    InvalidCurrencyAmount(String),
}
