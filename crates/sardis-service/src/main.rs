use clap::{Parser, ValueEnum};
use sardis_ledger::LedgerStorageConfig;
use sardis_service::config::{PanBoundaryMode, SardisConfig};
use sardis_service::{build_router, ServiceConfig, ServiceState};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LedgerStorageMode {
    Auto,
    Memory,
    Postgres,
}

#[derive(Debug, Parser)]
#[command(name = "sardisd", version, about = "Sardis payment control plane")]
struct Cli {
    /// Socket address to bind, e.g. 127.0.0.1:8080
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,
    /// Ledger persistence backend. `auto` picks postgres when a database url
    /// is configured.
    #[arg(long, value_enum, default_value_t = LedgerStorageMode::Auto, env = "SARDIS_LEDGER_STORAGE")]
    ledger_storage: LedgerStorageMode,
    /// PostgreSQL url for the audit ledger mirror.
    #[arg(long, env = "SARDIS_LEDGER_DATABASE_URL")]
    ledger_database_url: Option<String>,
    /// Max PostgreSQL pool connections for the ledger mirror.
    #[arg(long, default_value_t = 5, env = "SARDIS_LEDGER_PG_MAX_CONNECTIONS")]
    ledger_pg_max_connections: u32,
    /// Spool file for audit entries while the mirror is unavailable.
    #[arg(long, default_value = "sardis/data/audit.spool", env = "SARDIS_AUDIT_SPOOL")]
    audit_spool: PathBuf,
    /// policy.goal_drift_review_threshold — required, no default.
    #[arg(long, env = "SARDIS_GOAL_DRIFT_REVIEW_THRESHOLD")]
    goal_drift_review_threshold: f64,
    /// policy.goal_drift_block_threshold — required, no default.
    #[arg(long, env = "SARDIS_GOAL_DRIFT_BLOCK_THRESHOLD")]
    goal_drift_block_threshold: f64,
    /// funding.primary_adapter
    #[arg(long, default_value = "ach_treasury_primary", env = "SARDIS_FUNDING_PRIMARY")]
    funding_primary_adapter: String,
    /// funding.fallback_adapter
    #[arg(long, env = "SARDIS_FUNDING_FALLBACK")]
    funding_fallback_adapter: Option<String>,
    /// Explicit acknowledgement for running with memory-only stores.
    #[arg(long, default_value_t = false, env = "SARDIS_ALLOW_INMEMORY_STORES")]
    allow_inmemory_stores: bool,
    /// Webhook subscription as provider=secret; repeatable.
    #[arg(long = "webhook-secret", value_parser = parse_webhook_secret)]
    webhook_secrets: Vec<(String, String)>,
    /// Interval for the background sweep pool, seconds.
    #[arg(long, default_value_t = 30, env = "SARDIS_SWEEP_INTERVAL_SECS")]
    sweep_interval_secs: u64,
}

fn parse_webhook_secret(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(provider, secret)| (provider.to_string(), secret.to_string()))
        .ok_or_else(|| "expected provider=secret".to_string())
}

fn resolve_ledger_storage(cli: &Cli) -> anyhow::Result<LedgerStorageConfig> {
    let resolved_url = cli
        .ledger_database_url
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok());

    let storage = match cli.ledger_storage {
        LedgerStorageMode::Memory => LedgerStorageConfig::Memory,
        LedgerStorageMode::Postgres => {
            let database_url = resolved_url.ok_or_else(|| {
                anyhow::anyhow!(
                    "ledger_storage=postgres requires --ledger-database-url or DATABASE_URL"
                )
            })?;
            LedgerStorageConfig::postgres(
                database_url,
                cli.ledger_pg_max_connections,
                cli.audit_spool.clone(),
            )
        }
        LedgerStorageMode::Auto => match resolved_url {
            Some(database_url) => LedgerStorageConfig::postgres(
                database_url,
                cli.ledger_pg_max_connections,
                cli.audit_spool.clone(),
            ),
            None => LedgerStorageConfig::Memory,
        },
    };
    Ok(storage)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "sardis_service=info,info".to_string()),
        )
        .init();

    let cli = Cli::parse();
    let ledger_storage = resolve_ledger_storage(&cli)?;

    let mut sardis = SardisConfig {
        goal_drift_review_threshold: Some(cli.goal_drift_review_threshold),
        goal_drift_block_threshold: Some(cli.goal_drift_block_threshold),
        ..SardisConfig::default()
    };
    sardis.funding.primary_adapter = cli.funding_primary_adapter.clone();
    sardis.funding.fallback_adapter = cli.funding_fallback_adapter.clone();
    if cli.allow_inmemory_stores {
        sardis.checkout.allow_inmemory_secret_store = true;
        sardis.idempotency_allow_inmemory = true;
    }

    let config = ServiceConfig {
        sardis,
        ledger_storage,
        pan_boundary_profile: PanBoundaryMode::IssuerHostedIframeOnly,
        webhook_secrets: cli.webhook_secrets.clone(),
        ..ServiceConfig::default()
    };
    let state = ServiceState::bootstrap(config).await?;
    let app = build_router(state.clone());

    // Scheduled retry/reconciliation pool: expiry sweeps and drift detection.
    let sweep_state = state.clone();
    let sweep_interval = std::time::Duration::from_secs(cli.sweep_interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            if let Err(err) =
                sardis_service::handlers::ops_sweep(axum::extract::State(sweep_state.clone())).await
            {
                tracing::warn!(error = %err, "background sweep failed");
            }
        }
    });

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!("sardisd listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received; draining");
        })
        .await?;

    Ok(())
}
