use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clubgate::admin;
use clubgate::cli;
use clubgate::config::{self, Config, StoreBackend};
use clubgate::models::pass::mask_token;
use clubgate::store::memory::MemoryStore;
use clubgate::store::postgres::PgStore;
use clubgate::store::{PassStore, Store};
use clubgate::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // OTLP export is opt-in: only when a collector endpoint is configured.
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "clubgate"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .context("failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    // Load .env before the filter so RUST_LOG there takes effect.
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "clubgate=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry_layer)
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port, seed_passes }) => {
            let port = port.unwrap_or(cfg.port);
            let mut cfg = cfg;
            cfg.seed_passes.extend(seed_passes);
            run_server(cfg, port).await
        }
        Some(cli::Commands::Pass { command }) => {
            if cfg.store == StoreBackend::Memory {
                tracing::warn!("CLUBGATE_STORE=memory: passes created here vanish when this command exits; use serve --seed-pass instead");
            }
            let store = open_store(&cfg).await?;
            handle_pass_command(command, store.as_ref()).await
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn open_store(cfg: &Config) -> anyhow::Result<Arc<dyn Store>> {
    match cfg.store {
        StoreBackend::Postgres => {
            tracing::info!("Connecting to database...");
            let db = PgStore::connect(&cfg.database_url, cfg.db_max_connections)
                .await
                .context("failed to connect to database")?;

            tracing::info!("Running migrations...");
            db.migrate().await.context("failed to run migrations")?;
            Ok(Arc::new(db))
        }
        StoreBackend::Memory => {
            tracing::info!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn run_server(cfg: Config, port: u16) -> anyhow::Result<()> {
    let store = open_store(&cfg).await?;

    if !cfg.seed_passes.is_empty() {
        let minted = admin::seed_passes(store.as_ref(), &cfg.seed_passes, Utc::now()).await?;
        for pass in &minted {
            println!("Seeded access pass [{}]: {}", pass.scopes.join(","), pass.token);
        }
    } else if cfg.store == StoreBackend::Memory {
        tracing::warn!("in-memory store has no passes; start with --seed-pass or CLUBGATE_SEED_PASSES");
    }

    let state = AppState::new(store, cfg);
    let app = clubgate::api::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("clubgate listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

async fn handle_pass_command(cmd: cli::PassCommands, store: &dyn Store) -> anyhow::Result<()> {
    match cmd {
        cli::PassCommands::Create {
            scopes,
            label,
            ttl_hours,
        } => {
            let pass = admin::mint_pass(store, &scopes, label, ttl_hours, Utc::now()).await?;
            let expires = pass
                .expires_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string());
            println!(
                "Access pass created:\n  Token:   {}\n  Scopes:  {}\n  Expires: {}\n\nUse: Authorization: Bearer {}\n or: ?token={}",
                pass.token,
                pass.scopes.join(","),
                expires,
                pass.token,
                pass.token
            );
        }
        cli::PassCommands::List => {
            let passes = store.list_passes().await?;
            if passes.is_empty() {
                println!("No access passes found.");
            } else {
                print!("{}", admin::format_pass_table(&passes, Utc::now()));
            }
        }
        cli::PassCommands::Revoke { token } => {
            if store.deactivate_pass(&token).await? {
                println!("Access pass {} disabled.", mask_token(&token));
            } else {
                println!("Access pass not found.");
            }
        }
    }
    Ok(())
}
