//! Command-line entry point.
//!
//! # Responsibility
//! - Start the HTTP server with settings from flags or `REGISTRY_*` env vars.
//! - Bootstrap the first admin account.
//!
//! # Invariants
//! - Logging is initialized before any database work.
//! - Failures print one line to stderr and exit non-zero.

use clap::{Args, Parser, Subcommand};
use log::error;
use registry_core::db::open_db;
use registry_core::{
    core_version, default_log_level, init_logging, AdminBootstrap, AuthService, LogTarget,
    SqliteAccountRepository,
};
use registry_server::{serve, ServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

const MAX_SESSION_TTL_MINUTES: u64 = 365 * 24 * 60;

#[derive(Parser)]
#[command(name = "registry")]
#[command(about = "Namboodiri community registry: server and admin tools")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// trace|debug|info|warn|error; defaults by build mode.
    #[arg(long, global = true, env = "REGISTRY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Absolute directory for rolling log files; stderr when unset.
    #[arg(long, global = true, env = "REGISTRY_LOG_DIR")]
    log_dir: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP JSON API.
    Serve(ServeArgs),
    /// Create an admin account unless one with the email exists.
    CreateAdmin(CreateAdminArgs),
    /// Print the core version.
    Version,
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, env = "REGISTRY_BIND", default_value = "127.0.0.1:3000")]
    bind: SocketAddr,

    #[arg(long, env = "REGISTRY_DB", default_value = "registry.sqlite3")]
    db: PathBuf,

    /// Session lifetime in minutes, 1 to 525600 (one year).
    #[arg(
        long,
        env = "REGISTRY_SESSION_TTL_MINUTES",
        default_value_t = 24 * 60,
        value_parser = clap::value_parser!(u64).range(1..=MAX_SESSION_TTL_MINUTES)
    )]
    session_ttl_minutes: u64,
}

#[derive(Args)]
struct CreateAdminArgs {
    #[arg(long, env = "REGISTRY_ADMIN_EMAIL")]
    email: String,

    #[arg(long, env = "REGISTRY_ADMIN_PASSWORD", hide_env_values = true)]
    password: String,

    #[arg(long, env = "REGISTRY_ADMIN_NAME")]
    name: Option<String>,

    #[arg(long, env = "REGISTRY_DB", default_value = "registry.sqlite3")]
    db: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = cli.log_level.as_deref().unwrap_or(default_log_level());
    let logging = LogTarget::from_dir(cli.log_dir.as_deref())
        .and_then(|target| init_logging(level, target));
    if let Err(err) = logging {
        eprintln!("registry: {err}");
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Command::Serve(args) => run_serve(args),
        Command::CreateAdmin(args) => run_create_admin(args),
        Command::Version => {
            println!("registry {}", core_version());
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_exit module=cli status=error error={err}");
            eprintln!("registry: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ServerConfig::new(args.bind, args.db);
    config.session_ttl = Duration::from_secs(args.session_ttl_minutes.saturating_mul(60));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(config))
}

fn run_create_admin(args: CreateAdminArgs) -> Result<(), Box<dyn std::error::Error>> {
    let conn = open_db(&args.db)?;
    let auth = AuthService::new(
        SqliteAccountRepository::new(&conn),
        registry_core::DEFAULT_SESSION_TTL,
    );
    match auth.ensure_admin(&args.email, &args.password, args.name.as_deref())? {
        AdminBootstrap::Created(user) => {
            println!("created admin user {} (id {})", user.email, user.id)
        }
        AdminBootstrap::AlreadyExists(user) => {
            println!("admin user {} already exists", user.email)
        }
    }
    Ok(())
}
