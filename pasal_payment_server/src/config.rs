use std::env;

use chrono::Duration;
use log::*;
use pasal_common::Secret;
use pasal_gateways::GatewayConfig;

const DEFAULT_PPS_HOST: &str = "127.0.0.1";
const DEFAULT_PPS_PORT: u16 = 8360;
const DEFAULT_PENDING_PAYMENT_TIMEOUT: Duration = Duration::hours(2);
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Shared secret for the admin surface, checked by the header middleware.
    pub admin_api_key: Secret<String>,
    /// The time a digital-payment order may sit with a pending payment before the sweep cancels it.
    pub pending_payment_timeout: Duration,
    /// How often the background sweeps run, in seconds.
    pub sweep_interval_secs: u64,
    /// Payment provider credentials and endpoints.
    pub gateways: GatewayConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_PPS_HOST.to_string(),
            port: DEFAULT_PPS_PORT,
            database_url: String::default(),
            admin_api_key: Secret::default(),
            pending_payment_timeout: DEFAULT_PENDING_PAYMENT_TIMEOUT,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            gateways: GatewayConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("PPS_HOST").ok().unwrap_or_else(|| DEFAULT_PPS_HOST.into());
        let port = env::var("PPS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for PPS_PORT. {e} Using the default, {DEFAULT_PPS_PORT}, instead."
                    );
                    DEFAULT_PPS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_PPS_PORT);
        let database_url = env::var("PPS_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ PPS_DATABASE_URL is not set. Please set it to the URL for the payments database.");
            String::default()
        });
        let admin_api_key = env::var("PPS_ADMIN_API_KEY").map(Secret::new).unwrap_or_else(|_| {
            warn!("🪛️ PPS_ADMIN_API_KEY is not set. The admin surface will reject every request.");
            Secret::default()
        });
        let pending_payment_timeout = env::var("PPS_PENDING_PAYMENT_TIMEOUT_HOURS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Duration::hours)
            .unwrap_or(DEFAULT_PENDING_PAYMENT_TIMEOUT);
        let sweep_interval_secs = env::var("PPS_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);
        let gateways = GatewayConfig::from_env_or_default();
        Self { host, port, database_url, admin_api_key, pending_payment_timeout, sweep_interval_secs, gateways }
    }
}
