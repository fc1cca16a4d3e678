pub mod events;
pub mod journal;
pub mod ledger_store;
pub mod maintenance;
pub mod notifications;
pub mod otp_gate;

pub use events::{EventBus, TransactionCommitted};
pub use journal::{AccountSummary, BalancePoint, Page, TransactionJournal};
pub use ledger_store::{LedgerStore, Reconciliation};
pub use maintenance::{MaintenanceSettings, MaintenanceWorker, SweepReport};
pub use notifications::NotificationDispatcher;
pub use otp_gate::OtpGate;
