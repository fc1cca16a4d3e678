use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use uuid::Uuid;

use crate::services::MaintenanceSettings;
use crate::use_cases::{CoreSettings, OtpPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: Option<String>,
    pub otp_window_minutes: i64,
    pub otp_secret: String,
    pub otp_required: bool,
    pub otp_exempt_accounts: Vec<Uuid>,
    pub code_delivery_url: Option<String>,
    pub pending_transfer_ttl_minutes: i64,
    pub auto_approve_after_minutes: i64,
    pub maintenance_interval_secs: u64,
    pub event_buffer: usize,
    pub log_format: LogFormat,
}

const DEV_OTP_SECRET: &str = "local-development-otp-secret";

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present

        let database_url = optional("DATABASE_URL");
        let otp_secret = match (optional("OTP_SECRET"), &database_url) {
            (Some(secret), _) => secret,
            (None, Some(_)) => anyhow::bail!("OTP_SECRET is required when DATABASE_URL is set"),
            (None, None) => DEV_OTP_SECRET.to_string(),
        };

        Ok(Config {
            server_port: parsed("SERVER_PORT", 3000)?,
            database_url,
            otp_window_minutes: parsed("OTP_WINDOW_MINUTES", 10)?,
            otp_secret,
            otp_required: parsed("OTP_REQUIRED", true)?,
            otp_exempt_accounts: parse_uuid_list(&env::var("OTP_EXEMPT_ACCOUNTS").unwrap_or_default())?,
            code_delivery_url: optional("CODE_DELIVERY_URL"),
            pending_transfer_ttl_minutes: parsed("PENDING_TRANSFER_TTL_MINUTES", 60)?,
            auto_approve_after_minutes: parsed("AUTO_APPROVE_AFTER_MINUTES", 30)?,
            maintenance_interval_secs: parsed("MAINTENANCE_INTERVAL_SECS", 60)?,
            event_buffer: parsed("EVENT_BUFFER", 256)?,
            log_format: match env::var("LOG_FORMAT").as_deref() {
                Ok("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        })
    }

    pub fn core_settings(&self) -> CoreSettings {
        CoreSettings {
            otp_secret: self.otp_secret.clone(),
            otp_window: chrono::Duration::minutes(self.otp_window_minutes),
            otp_policy: OtpPolicy::new(self.otp_required, self.otp_exempt_accounts.iter().copied()),
            event_buffer: self.event_buffer,
        }
    }

    pub fn maintenance_settings(&self) -> MaintenanceSettings {
        MaintenanceSettings {
            interval: std::time::Duration::from_secs(self.maintenance_interval_secs.max(1)),
            pending_ttl: chrono::Duration::minutes(self.pending_transfer_ttl_minutes),
            approve_after: chrono::Duration::minutes(self.auto_approve_after_minutes),
        }
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}

fn parse_uuid_list(raw: &str) -> Result<Vec<Uuid>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            Uuid::parse_str(entry)
                .with_context(|| format!("OTP_EXEMPT_ACCOUNTS entry '{}' is not a UUID", entry))
        })
        .collect()
}
