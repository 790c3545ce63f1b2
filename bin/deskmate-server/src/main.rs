//! deskmate-server – entry point.
//!
//! Startup order:
//! 1. Parse the command line and configuration from environment variables.
//! 2. Initialise structured tracing (JSON in production, pretty in dev),
//!    optionally mirrored to a daily rolling file.
//! 3. Open the SQLite database and run pending migrations.
//! 4. Build the AI provider router and the shared application state.
//! 5. Seed the superadmin account when credentials are configured.
//! 6. Build the Axum router and start the HTTP server with graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use deskmate_core::ai::ProviderRouter;
use deskmate_core::entities::{Role, SqliteStore};
use deskmate_core::users::{CreateUserInput, UserService};
use deskmate_server::config::Config;
use deskmate_server::{build, AppState};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

#[derive(Debug, Parser)]
#[command(name = "deskmate-server", version, about = "Persona chat and report tooling server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve {
        /// Override `DESK_BIND`.
        #[arg(long)]
        bind: Option<String>,
        /// Override `DESK_DATABASE_URL`.
        #[arg(long)]
        database_url: Option<String>,
    },
    /// Create an account and exit.
    CreateUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "user")]
        role: Role,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cli = Cli::parse();
    let mut cfg = Config::from_env();
    if let Some(Command::Serve { bind, database_url }) = &cli.command {
        if let Some(bind) = bind {
            cfg.bind_address = bind.clone();
        }
        if let Some(url) = database_url {
            cfg.database_url = url.clone();
        }
    }

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let _guard = init_tracing(&cfg)?;
    info!(version = env!("CARGO_PKG_VERSION"), "deskmate-server starting");

    // ── 3. Database ────────────────────────────────────────────────────────────
    let store = SqliteStore::connect(&cfg.database_url)
        .await
        .with_context(|| format!("opening database {}", cfg.database_url))?;
    info!(database_url = %cfg.database_url, "database ready");

    if let Some(Command::CreateUser { name, email, password, role }) = cli.command {
        let user = UserService::new(store)
            .create(CreateUserInput { name, email, password, role })
            .await
            .map_err(|e| anyhow::anyhow!("create-user failed: {e}"))?;
        info!(user_id = user.id, email = %user.email, role = %user.role, "user created");
        return Ok(());
    }

    // ── 4. AI providers and shared state ───────────────────────────────────────
    tokio::fs::create_dir_all(&cfg.storage_dir)
        .await
        .with_context(|| format!("creating storage dir {}", cfg.storage_dir.display()))?;
    let ai = ProviderRouter::new(cfg.ai.clone())?;
    let state = Arc::new(AppState::new(cfg.clone(), store, Arc::new(ai))?);

    // ── 5. Superadmin seed ─────────────────────────────────────────────────────
    match (&cfg.admin_email, &cfg.admin_password) {
        (Some(email), Some(password)) => {
            state.users.seed_superadmin(&cfg.admin_name, email, password).await?;
        }
        _ => warn!("DESK_ADMIN_EMAIL/DESK_ADMIN_PASSWORD unset; no superadmin seeded"),
    }

    // ── 6. HTTP server with graceful shutdown ──────────────────────────────────
    let app = build(Arc::clone(&state));
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("deskmate-server stopped");
    Ok(())
}

/// Console logging plus an optional daily file in `log_dir`. The returned
/// guard flushes the file writer and must live until exit.
fn init_tracing(cfg: &Config) -> anyhow::Result<Option<WorkerGuard>> {
    // Warn loudly if the configured value is not a valid filter expression.
    let env_filter = || match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: DESK_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                EnvFilter::new("info")
            }
        },
    };

    let console = fmt::layer().with_target(true).with_thread_ids(true);
    let console = if cfg.log_json { console.json().boxed() } else { console.boxed() };

    let (file, guard) = match &cfg.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).with_context(|| format!("creating log dir {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "deskmate-server.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_writer(writer).with_filter(env_filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console.with_filter(env_filter()))
        .with(file)
        .init();
    Ok(guard)
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => { s.recv().await; }
            Err(e)    => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c   => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
