use chrono::Duration;
use serde::Serialize;
use tokio::time::{interval, Duration as StdDuration, MissedTickBehavior};
use tracing::{error, info};

use crate::error::LedgerResult;
use crate::use_cases::{AccountApproval, TransferOrchestrator};

#[derive(Debug, Clone)]
pub struct MaintenanceSettings {
    pub interval: StdDuration,
    pub pending_ttl: Duration,
    pub approve_after: Duration,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub failed_transfers: usize,
    pub approved_requests: usize,
}

/// Periodic housekeeping: fails stale pending transfers, then approves aged
/// account requests.
pub struct MaintenanceWorker {
    transfers: TransferOrchestrator,
    approvals: AccountApproval,
    settings: MaintenanceSettings,
}

impl MaintenanceWorker {
    pub fn new(
        transfers: TransferOrchestrator,
        approvals: AccountApproval,
        settings: MaintenanceSettings,
    ) -> Self {
        Self {
            transfers,
            approvals,
            settings,
        }
    }

    pub async fn run_once(&self) -> LedgerResult<SweepReport> {
        let failed_transfers = self.transfers.expire_stale(self.settings.pending_ttl).await?;
        let approved_requests = self
            .approvals
            .approve_pending_requests(self.settings.approve_after)
            .await?
            .len();

        Ok(SweepReport {
            failed_transfers,
            approved_requests,
        })
    }

    pub async fn run(self) {
        info!(
            interval_secs = self.settings.interval.as_secs(),
            "maintenance worker started"
        );

        let mut ticker = interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.run_once().await {
                Ok(report) if report.failed_transfers > 0 || report.approved_requests > 0 => {
                    info!(
                        failed_transfers = report.failed_transfers,
                        approved_requests = report.approved_requests,
                        "maintenance sweep finished"
                    );
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "maintenance sweep failed"),
            }
        }
    }
}
