use anyhow::Context;
use clap::{Parser, Subcommand};
use deskline::bootstrap;
use deskline::config::Config;
use deskline::infrastructure::http::router::build_router;
use deskline::infrastructure::observability;
use deskline::infrastructure::persistence::Database;

#[derive(Debug, Parser)]
#[command(name = "deskline", version, about = "Support ticket lifecycle and timeline service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Rebuild missing timeline events from tickets, attachments and sent messages
    Backfill,
    /// Restore missing status timestamps from the timeline and list what cannot be repaired
    Reconcile,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Serve);

    let config = Config::from_env().context("Invalid configuration")?;
    let _guard = observability::init(&config, matches!(command, Command::Serve))
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to initialise observability")?;
    tracing::info!("Configuration loaded");

    let db = Database::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    db.run_migrations()
        .await
        .context("Failed to apply migrations")?;
    tracing::info!("Database migrations applied");

    match command {
        Command::Serve => serve(db, &config).await,
        Command::Backfill => {
            let report = bootstrap::backfill_service(&db).await?.run().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Reconcile => {
            let report = bootstrap::integrity_service(&db).reconcile().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

async fn serve(db: Database, config: &Config) -> anyhow::Result<()> {
    let state = bootstrap::build_app_state(db, config).await?;
    let app = build_router(state);

    let addr = config.server_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
