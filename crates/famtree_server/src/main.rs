use clap::Parser;
use famtree_core::{default_log_level, init_logging, open_db, StaticTokenVerifier};
use famtree_server::{router, AppState};
use log::{info, warn};
use std::error::Error;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "famtree-server", version, about = "Family tree HTTP backend")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "FAMTREE_BIND", default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// SQLite database file. Created and migrated on startup.
    #[arg(long, env = "FAMTREE_DB", default_value = "famtree.sqlite3")]
    db: PathBuf,

    /// Directory for rolling log files.
    #[arg(long, env = "FAMTREE_LOG_DIR", default_value = "logs")]
    log_dir: PathBuf,

    #[arg(long, env = "FAMTREE_LOG_LEVEL")]
    log_level: Option<String>,

    /// JSON object mapping accepted id tokens to verified identities.
    #[arg(long, env = "FAMTREE_IDENTITY_TOKENS")]
    identity_tokens: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("famtree-server: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let log_dir = absolute(&args.log_dir)?;
    let level = args.log_level.as_deref().unwrap_or(default_log_level());
    init_logging(level, &log_dir.to_string_lossy())?;

    let conn = open_db(&args.db)?;
    let verifier = match &args.identity_tokens {
        Some(path) => StaticTokenVerifier::from_file(path)?,
        None => StaticTokenVerifier::default(),
    };
    if verifier.is_empty() {
        warn!("event=server_start module=server status=degraded reason=no_identity_tokens");
    }

    let app = router(AppState::new(conn, Arc::new(verifier)));
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    info!(
        "event=server_start module=server status=ok addr={}",
        listener.local_addr()?
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("event=server_stop module=server status=ok");
    Ok(())
}

fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("event=server_stop module=server status=error reason=signal_handler error={err}");
        std::future::pending::<()>().await;
    }
    info!("event=server_stop module=server status=draining");
}
