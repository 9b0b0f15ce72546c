use log::*;
use tokio::task::JoinHandle;
use wallet_engine::{DepositFlowApi, SqliteDatabase};

use crate::{config::ReconcileConfig, integrations::paystack::PaystackGateway};

/// Starts the deposit reconciliation worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// `api` should be configured exactly like the one the HTTP server uses, since any wallet it provisions takes the
/// api's currency.
pub fn start_reconciliation_worker(
    api: DepositFlowApi<SqliteDatabase, PaystackGateway>,
    config: ReconcileConfig,
) -> JoinHandle<()> {
    let ReconcileConfig { interval, min_age, abandon_after } = config;
    let period = interval.to_std().unwrap_or(std::time::Duration::from_secs(300));
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        info!("🕰️ Deposit reconciliation worker started. Running every {} seconds", period.as_secs());
        loop {
            timer.tick().await;
            debug!("🕰️ Running deposit reconciliation job");
            match api.reconcile_pending(min_age, abandon_after).await {
                Ok(result) if result.total() == 0 => trace!("🕰️ No pending deposits needed attention"),
                Ok(result) => info!(
                    "🕰️ Reconciled {} pending deposits. {} credited, {} abandoned, {} left for later",
                    result.total(),
                    result.credited,
                    result.failed,
                    result.skipped
                ),
                Err(e) => error!("🕰️ Error running deposit reconciliation job: {e}"),
            }
        }
    })
}
