use crate::config::Config;
use anyhow::{Context, Result};
use sqlx::PgPool;
use std::time::Duration;

/// Preflight checks printed by the `config` command and run before `serve`.
pub struct ValidationReport {
    pub environment: bool,
    /// `None` when no database is configured (in-memory store).
    pub database: Option<bool>,
    /// `None` when codes are only logged.
    pub code_delivery: Option<bool>,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.database != Some(false) && self.code_delivery != Some(false)
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(Some(self.environment)));
        println!("Database Connectivity: {}", status(self.database));
        println!("Code Delivery:         {}", status(self.code_delivery));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!("\nOverall Status: {}", if self.is_valid() { "✅ PASS" } else { "❌ FAIL" });
        println!("=================================\n");
    }
}

fn status(ok: Option<bool>) -> &'static str {
    match ok {
        Some(true) => "✅ OK",
        Some(false) => "❌ FAIL",
        None => "➖ not configured",
    }
}

pub async fn validate_environment(config: &Config, pool: Option<&PgPool>) -> ValidationReport {
    let mut report = ValidationReport {
        environment: true,
        database: None,
        code_delivery: None,
        errors: Vec::new(),
    };

    if let Err(e) = validate_env_vars(config) {
        report.environment = false;
        report.errors.push(format!("Environment: {}", e));
    }

    if let Some(pool) = pool {
        let result = validate_database(pool).await;
        report.database = Some(result.is_ok());
        if let Err(e) = result {
            report.errors.push(format!("Database: {:#}", e));
        }
    }

    if let Some(url) = &config.code_delivery_url {
        let result = validate_code_delivery(url).await;
        report.code_delivery = Some(result.is_ok());
        if let Err(e) = result {
            report.errors.push(format!("Code delivery: {:#}", e));
        }
    }

    report
}

fn validate_env_vars(config: &Config) -> Result<()> {
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must be greater than 0");
    }
    if config.otp_window_minutes <= 0 {
        anyhow::bail!("OTP_WINDOW_MINUTES must be greater than 0");
    }
    if config.pending_transfer_ttl_minutes < config.otp_window_minutes {
        anyhow::bail!("PENDING_TRANSFER_TTL_MINUTES must not be shorter than the OTP window");
    }
    if config.event_buffer == 0 {
        anyhow::bail!("EVENT_BUFFER must be greater than 0");
    }
    if let Some(url) = &config.code_delivery_url {
        reqwest::Url::parse(url).context("CODE_DELIVERY_URL is not a valid URL")?;
    }

    Ok(())
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to connect to database")?;

    // Check if migrations are up to date
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("Failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("No migrations applied");
    }

    Ok(())
}

/// Any HTTP answer counts as reachable; the endpoint only accepts POST.
async fn validate_code_delivery(url: &str) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let response = client
        .head(url)
        .send()
        .await
        .context("Failed to reach code delivery endpoint")?;

    if response.status().is_server_error() {
        anyhow::bail!("Code delivery endpoint returned status: {}", response.status());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;

    fn config() -> Config {
        Config {
            server_port: 3000,
            database_url: None,
            otp_window_minutes: 10,
            otp_secret: "secret".to_string(),
            otp_required: true,
            otp_exempt_accounts: Vec::new(),
            code_delivery_url: None,
            pending_transfer_ttl_minutes: 60,
            auto_approve_after_minutes: 30,
            maintenance_interval_secs: 60,
            event_buffer: 256,
            log_format: LogFormat::Pretty,
        }
    }

    #[tokio::test]
    async fn test_memory_setup_is_valid() {
        let report = validate_environment(&config(), None).await;
        assert!(report.is_valid());
        assert_eq!(report.database, None);
        assert_eq!(report.code_delivery, None);
    }

    #[tokio::test]
    async fn test_ttl_shorter_than_window_is_rejected() {
        let mut cfg = config();
        cfg.pending_transfer_ttl_minutes = 5;
        let report = validate_environment(&cfg, None).await;
        assert!(!report.is_valid());
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn test_malformed_delivery_url_is_rejected() {
        let mut cfg = config();
        cfg.code_delivery_url = Some("not a url".to_string());
        assert!(validate_env_vars(&cfg).is_err());
    }
}
