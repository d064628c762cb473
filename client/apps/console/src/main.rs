//! Admin Console Entry Point
//!
//! Headless front end to the session gate. Uses `anyhow` for startup errors;
//! gate errors are shown to the user as `kernel::error::AppError`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use gate::application::{AutoRefresh, GateConfig, SessionGate};
use gate::domain::repository::{AdminDirectory, AuthService, SessionStore};
use gate::infra::{BackendConfig, HttpBackend, KeyValueSessionStore};
use gate::{AdminFlag, AuthGuard, AuthView, GateState, GateWatcher};
use kernel::error::app_error::AppError;
use platform::storage::FileStorage;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long `status` waits for the admin check to finish
const ADMIN_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "admin-console", about = "Admin console session tools")]
struct Cli {
    #[arg(long, env = "BACKEND_URL")]
    backend_url: String,

    #[arg(long, env = "BACKEND_ANON_KEY", hide_env_values = true)]
    anon_key: String,

    #[arg(long, env = "ADMIN_TABLE", default_value = gate::infra::http::DEFAULT_ADMIN_TABLE)]
    admin_table: String,

    /// Seconds before a backend request is abandoned
    #[arg(long, env = "BACKEND_TIMEOUT_SECS", default_value_t = 10)]
    timeout_secs: u64,

    /// Where the session survives between runs
    #[arg(long, env = "CONSOLE_STATE_DIR", default_value = ".admin-console")]
    state_dir: PathBuf,

    /// Give a local backend longer to answer before falling back to guest
    #[arg(long)]
    dev: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show who is signed in and whether they are a confirmed admin
    Status,
    /// Sign in as an administrator
    SignIn {
        #[arg(long)]
        email: String,
        #[arg(long, env = "CONSOLE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Register a new account
    SignUp {
        #[arg(long)]
        email: String,
        #[arg(long, env = "CONSOLE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    SignOut,
    /// Decide whether a console route may be opened
    Open { path: String },
    /// Print every state change until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "console=info,gate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let backend_config = BackendConfig::new(cli.backend_url, cli.anon_key)?
        .with_admin_table(cli.admin_table)?
        .with_timeout(Duration::from_secs(cli.timeout_secs));
    let backend = Arc::new(HttpBackend::new(backend_config)?);

    let config = if cli.dev {
        GateConfig::development()
    } else {
        GateConfig::default()
    };
    let storage = Arc::new(FileStorage::new(&cli.state_dir));
    let store = Arc::new(KeyValueSessionStore::new(storage, config.storage_key.clone()));

    // The backend must know the stored session before the gate subscribes,
    // otherwise its first notification reports nobody signed in.
    let stored = store.load().await.unwrap_or_else(|e| {
        e.log();
        None
    });
    if let Err(e) = backend.recover(stored).await {
        e.log();
    }

    let keeper = AutoRefresh::spawn(Arc::clone(&backend), config.optimistic_margin);
    let gate = SessionGate::new(Arc::clone(&backend), backend, store, config);
    gate.bootstrap().await;
    tracing::debug!(state_dir = %cli.state_dir.display(), "Session gate started");

    let result = run(&gate, cli.command).await;
    gate.dispose().await;
    drop(keeper);
    result
}

async fn run<A, D, S>(gate: &SessionGate<A, D, S>, command: Command) -> anyhow::Result<()>
where
    A: AuthService + Send + Sync + 'static,
    D: AdminDirectory + Send + Sync + 'static,
    S: SessionStore + Send + Sync + 'static,
{
    match command {
        Command::Status => {
            let state = decided(gate.watch()).await;
            print_view(&AuthView::from(&state))?;
        }
        Command::SignIn { email, password } => {
            let session = gate.sign_in(&email, password).await.map_err(AppError::from)?;
            println!(
                "Signed in as {} (session expires at {})",
                session.user.email.as_deref().unwrap_or(session.subject().as_str()),
                session.expires_at
            );
        }
        Command::SignUp { email, password } => {
            let outcome = gate.sign_up(&email, password).await.map_err(AppError::from)?;
            if outcome.confirmation_required() {
                println!("Account created. Confirm your email, then ask for an admin record.");
            } else {
                println!("Account created. Ask an administrator for an admin record.");
            }
        }
        Command::SignOut => {
            gate.sign_out().await.map_err(AppError::from)?;
            let mut watcher = gate.watch();
            let _ = tokio::time::timeout(
                ADMIN_CHECK_TIMEOUT,
                watcher.wait_for(|s| s.user.is_none()),
            )
            .await;
            println!("Signed out");
        }
        Command::Open { path } => {
            let state = decided(gate.watch()).await;
            println!("{:?}", AuthGuard::check(&state, &path));
        }
        Command::Watch => {
            let mut watcher = gate.watch();
            print_view(&watcher.view())?;
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    changed = watcher.changed() => match changed {
                        Some(state) => print_view(&AuthView::from(&state))?,
                        None => break,
                    },
                }
            }
        }
    }
    Ok(())
}

/// State once loading is over and a signed-in user's admin check has come
/// back, or whatever it is when the check takes too long.
async fn decided(mut watcher: GateWatcher) -> GateState {
    let settled = tokio::time::timeout(
        ADMIN_CHECK_TIMEOUT,
        watcher.wait_for(|s| !s.loading && (s.user.is_none() || s.admin != AdminFlag::Unknown)),
    )
    .await;
    match settled {
        Ok(Some(state)) => state,
        _ => {
            tracing::warn!("Gate did not settle in time");
            watcher.snapshot()
        }
    }
}

fn print_view(view: &AuthView) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(view)?);
    Ok(())
}
