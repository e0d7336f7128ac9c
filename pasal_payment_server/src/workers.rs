use chrono::Duration;
use log::*;
use pasal_payment_engine::{db_types::Order, events::EventProducers, EngineConfig, OrderFlowApi, SqliteDatabase};
use tokio::task::JoinHandle;

/// Starts the background sweep worker. Do not await the returned JoinHandle, as it runs indefinitely.
///
/// Each tick cancels digital-payment orders whose payment has been pending longer than
/// `pending_payment_timeout`, then re-evaluates the seller-balance release gate for delivered orders still
/// inside their hold period.
pub fn start_sweep_worker(
    db: SqliteDatabase,
    producers: EventProducers,
    engine_config: EngineConfig,
    pending_payment_timeout: Duration,
    interval_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        let api = OrderFlowApi::new(db, producers, engine_config);
        info!("🕰️ Background sweep worker started. Interval: {interval_secs}s");
        loop {
            timer.tick().await;
            trace!("🕰️ Running payment expiry sweep");
            match api.expire_stale_pending(pending_payment_timeout).await {
                Ok(result) if result.cancelled.is_empty() => {},
                Ok(result) => {
                    info!("🕰️ {} stale orders cancelled: {}", result.cancelled.len(), order_list(&result.cancelled));
                },
                Err(e) => error!("🕰️ Error running payment expiry sweep: {e}"),
            }
            trace!("🕰️ Running seller release sweep");
            match api.retry_pending_releases().await {
                Ok(result) => {
                    if !result.released.is_empty() {
                        info!("🕰️ Released seller balances for: {}", order_list(&result.released));
                    }
                    if result.still_waiting > 0 {
                        debug!("🕰️ {} delivered orders still inside the release hold", result.still_waiting);
                    }
                },
                Err(e) => error!("🕰️ Error running seller release sweep: {e}"),
            }
        }
    })
}

fn order_list(orders: &[Order]) -> String {
    orders.iter().map(|o| format!("#{} ({})", o.id, o.invoice)).collect::<Vec<String>>().join(", ")
}
