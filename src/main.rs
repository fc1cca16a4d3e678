use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vaultbank_core::cli::{self, Cli, Commands, DbCommands, TxCommands};
use vaultbank_core::config::{Config, LogFormat};
use vaultbank_core::services::MaintenanceWorker;
use vaultbank_core::{create_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    match Cli::parse().command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Config => cli::handle_config_validate(&config).await,
        Commands::Sweep => {
            let state = AppState::from_config(&config).await?;
            cli::handle_sweep(&state.core, &config).await
        }
        Commands::Reconcile { account_id } => {
            let state = AppState::from_config(&config).await?;
            cli::handle_reconcile(&state.core, account_id).await
        }
        Commands::Tx(TxCommands::Fail {
            tx_id,
            reason,
            admin,
        }) => {
            let state = AppState::from_config(&config).await?;
            cli::handle_tx_fail(&state.core, tx_id, &reason, admin).await
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let state = AppState::from_config(&config).await?;

    let report = vaultbank_core::startup::validate_environment(&config, state.pool.as_ref()).await;
    if !report.environment || report.database == Some(false) {
        report.print();
        anyhow::bail!("Startup validation failed");
    }
    if report.code_delivery == Some(false) {
        tracing::warn!(errors = ?report.errors, "code delivery endpoint unreachable, continuing");
    }

    let worker = MaintenanceWorker::new(
        state.core.transfers.clone(),
        state.core.approvals.clone(),
        config.maintenance_settings(),
    );
    tokio::spawn(worker.run());

    let app = create_app(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
