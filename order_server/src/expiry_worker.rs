use std::time::Duration;

use log::*;
use order_engine::{events::EventProducers, OrderFlowApi, SqliteDatabase};
use tokio::task::JoinHandle;

/// Starts the expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `period`, unpaid orders whose payment deadline has passed are expired. The sweep can also be triggered on
/// demand from the admin API; both paths use the same compare-and-set update, so they never expire an order twice.
pub fn start_expiry_worker(db: SqliteDatabase, producers: EventProducers, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        // Don't try to catch up on missed ticks if a sweep ran long
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let api = OrderFlowApi::new(db, producers);
        info!("🕰️ Unpaid order expiry worker started. Sweeping every {}s", period.as_secs());
        loop {
            timer.tick().await;
            debug!("🕰️ Running unpaid order expiry job");
            match api.sweep_expired_orders().await {
                Ok(result) if result.expired_count == 0 => {
                    debug!("🕰️ No orders expired");
                },
                Ok(result) => {
                    info!("🕰️ {} orders expired: {}", result.expired_count, result.expired_order_numbers.join(", "));
                    if result.skipped_count > 0 {
                        debug!("🕰️ {} orders changed state during the sweep and were left alone", result.skipped_count);
                    }
                    if result.failed_count > 0 {
                        warn!("🕰️ {} orders could not be expired. They will be retried next time", result.failed_count);
                    }
                },
                Err(e) => {
                    error!("🕰️ Error running unpaid order expiry job: {e}");
                },
            }
        }
    })
}
