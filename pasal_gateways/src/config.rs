use log::*;
use pasal_common::Secret;

/// Configuration for all payment providers, loaded from the environment.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub khalti: KhaltiConfig,
    pub esewa: EsewaConfig,
    /// Base URL of this storefront, used to build provider return URLs.
    pub base_url: String,
    /// Outbound HTTP timeout for initiate/verify calls, in seconds.
    pub http_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            khalti: KhaltiConfig::default(),
            esewa: EsewaConfig::default(),
            base_url: "http://localhost:8360".to_string(),
            http_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KhaltiConfig {
    pub secret_key: Secret<String>,
    /// Test mode routes calls to dev.khalti.com.
    pub test_mode: bool,
    /// Points the ePayment API somewhere other than Khalti, e.g. a local stub.
    pub api_base_override: Option<String>,
}

impl Default for KhaltiConfig {
    fn default() -> Self {
        Self { secret_key: Secret::new(String::default()), test_mode: true, api_base_override: None }
    }
}

#[derive(Debug, Clone)]
pub struct EsewaConfig {
    pub secret_key: Secret<String>,
    /// The merchant product code, e.g. "EPAYTEST" in the sandbox.
    pub product_code: String,
    pub test_mode: bool,
    /// Points the transaction status API somewhere other than eSewa, e.g. a local stub.
    pub status_url_override: Option<String>,
}

impl Default for EsewaConfig {
    fn default() -> Self {
        Self {
            secret_key: Secret::new(String::default()),
            product_code: "EPAYTEST".to_string(),
            test_mode: true,
            status_url_override: None,
        }
    }
}

impl GatewayConfig {
    pub fn from_env_or_default() -> Self {
        let base_url = std::env::var("PPS_BASE_URL").unwrap_or_else(|_| {
            warn!("PPS_BASE_URL not set. Using http://localhost:8360 for provider return URLs.");
            "http://localhost:8360".to_string()
        });
        let http_timeout_secs = std::env::var("PPS_GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);
        let khalti = KhaltiConfig {
            secret_key: Secret::new(std::env::var("PPS_KHALTI_SECRET_KEY").unwrap_or_else(|_| {
                warn!("PPS_KHALTI_SECRET_KEY not set. Khalti payments will not verify.");
                String::default()
            })),
            test_mode: pasal_common::helpers::parse_boolean_flag(std::env::var("PPS_KHALTI_TEST_MODE").ok(), true),
            api_base_override: std::env::var("PPS_KHALTI_API_BASE").ok(),
        };
        let esewa = EsewaConfig {
            secret_key: Secret::new(std::env::var("PPS_ESEWA_SECRET_KEY").unwrap_or_else(|_| {
                warn!("PPS_ESEWA_SECRET_KEY not set. eSewa payments will not verify.");
                String::default()
            })),
            product_code: std::env::var("PPS_ESEWA_PRODUCT_CODE").unwrap_or_else(|_| "EPAYTEST".to_string()),
            test_mode: pasal_common::helpers::parse_boolean_flag(std::env::var("PPS_ESEWA_TEST_MODE").ok(), true),
            status_url_override: std::env::var("PPS_ESEWA_STATUS_URL").ok(),
        };
        Self { khalti, esewa, base_url, http_timeout_secs }
    }
}
