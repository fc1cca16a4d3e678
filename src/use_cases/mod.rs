//! Use cases: the workflows exposed over HTTP and the command line.

pub mod account_approval;
pub mod admin;
pub mod transfer;

pub use account_approval::AccountApproval;
pub use admin::{AdminAdjustmentPath, ManualAdjustment};
pub use transfer::{OtpPolicy, RecipientRef, TransferOrchestrator, TransferReceipt, TransferRequest};

use chrono::Duration;
use std::sync::Arc;

use crate::domain::otp::DEFAULT_OTP_WINDOW_MINUTES;
use crate::ports::{CodeSender, LedgerBackend};
use crate::services::{
    EventBus, LedgerStore, NotificationDispatcher, OtpGate, TransactionJournal,
};

/// Knobs the core is assembled with.
#[derive(Debug, Clone)]
pub struct CoreSettings {
    pub otp_secret: String,
    pub otp_window: Duration,
    pub otp_policy: OtpPolicy,
    pub event_buffer: usize,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            otp_secret: "local-development-otp-secret".to_string(),
            otp_window: Duration::minutes(DEFAULT_OTP_WINDOW_MINUTES),
            otp_policy: OtpPolicy::default(),
            event_buffer: crate::services::events::DEFAULT_EVENT_BUFFER,
        }
    }
}

/// Every component wired against one store.
#[derive(Clone)]
pub struct Core {
    pub ledger: LedgerStore,
    pub journal: TransactionJournal,
    pub otp: OtpGate,
    pub notifications: NotificationDispatcher,
    pub transfers: TransferOrchestrator,
    pub admin: AdminAdjustmentPath,
    pub approvals: AccountApproval,
    pub events: EventBus,
}

impl Core {
    pub fn new<S>(store: Arc<S>, code_sender: Arc<dyn CodeSender>, settings: CoreSettings) -> Self
    where
        S: LedgerBackend + 'static,
    {
        let events = EventBus::new(settings.event_buffer);
        let ledger = LedgerStore::new(store.clone(), store.clone(), store.clone(), events.clone());
        let journal = TransactionJournal::new(store.clone(), events.clone());
        let otp = OtpGate::new(store.clone(), settings.otp_secret).with_window(settings.otp_window);
        let notifications = NotificationDispatcher::new(store.clone());

        let transfers = TransferOrchestrator::new(
            ledger.clone(),
            journal.clone(),
            otp.clone(),
            notifications.clone(),
            store.clone(),
            store.clone(),
            code_sender,
            settings.otp_policy,
        );
        let admin = AdminAdjustmentPath::new(
            ledger.clone(),
            journal.clone(),
            transfers.clone(),
            notifications.clone(),
            store.clone(),
            store.clone(),
        );
        let approvals = AccountApproval::new(ledger.clone(), store, notifications.clone());

        Self {
            ledger,
            journal,
            otp,
            notifications,
            transfers,
            admin,
            approvals,
            events,
        }
    }
}
