use chrono::Duration;

/// Tunables for the order flow. The defaults match production behaviour; tests shrink the durations.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// VAT rate in whole percent.
    pub tax_rate_percent: u32,
    /// Referral commission applied to lines whose product does not set its own rate, in basis points.
    pub default_commission_bp: i64,
    /// How long after delivery a seller's balance stays held. Waived for courier-confirmed deliveries.
    pub seller_release_wait: Duration,
    /// Gateways that settle out of band. Orders on these never expire for non-payment.
    pub manual_gateways: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tax_rate_percent: 13,
            default_commission_bp: 500,
            seller_release_wait: Duration::hours(24),
            manual_gateways: vec!["cod".to_string(), "bank_transfer".to_string()],
        }
    }
}

impl EngineConfig {
    pub fn with_release_wait(mut self, wait: Duration) -> Self {
        self.seller_release_wait = wait;
        self
    }

    pub fn with_tax_rate(mut self, percent: u32) -> Self {
        self.tax_rate_percent = percent;
        self
    }

    pub fn with_default_commission_bp(mut self, bp: i64) -> Self {
        self.default_commission_bp = bp;
        self
    }
}
