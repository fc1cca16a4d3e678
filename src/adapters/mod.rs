//! Adapters: concrete implementations of the ports.

pub mod mailer;
pub mod memory;
pub mod postgres;

pub use mailer::{HttpCodeSender, LogCodeSender};
pub use memory::MemoryStore;
pub use postgres::PgStore;
