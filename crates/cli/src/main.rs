mod login_commands;
mod password_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "warden", about = "Warden: check logins against configured credential checkers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery of ./warden.toml and ~/.config/warden/).
    #[arg(long, global = true, env = "WARDEN_CONFIG")]
    config: Option<PathBuf>,

    /// Extra checker, e.g. `memory:alice:secret`, `file:/etc/warden/passwd`
    /// or `anonymous`. Registered after the configured ones. Repeatable, and
    /// given before the subcommand.
    #[arg(long = "checker", value_name = "SPEC")]
    checkers: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Attempt a login and report the outcome. Exits non-zero on failure.
    Check(login_commands::CheckArgs),
    /// List the credential shapes the configured checkers accept.
    Shapes,
    /// Hash a password for an argon2 password file.
    HashPassword {
        /// Password to hash. Read from stdin when omitted.
        #[arg(long)]
        password: Option<String>,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    debug!(version = env!("CARGO_PKG_VERSION"), "warden starting");

    match cli.command {
        Commands::Check(ref args) => {
            let setup = login_commands::PortalSetup::load(cli.config.as_deref(), &cli.checkers)?;
            login_commands::check(&setup, args).await
        },
        Commands::Shapes => {
            let setup = login_commands::PortalSetup::load(cli.config.as_deref(), &cli.checkers)?;
            login_commands::shapes(&setup);
            Ok(())
        },
        Commands::HashPassword { password } => password_commands::hash(password).await,
    }
}
