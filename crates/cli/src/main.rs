mod db_commands;
mod functions_command;
mod run_command;
mod runs_commands;
mod watchlist_commands;

use std::path::{Path, PathBuf};

use {
    clap::{Parser, Subcommand},
    teleagent_config::TeleagentConfig,
    tracing::{debug, info},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "teleagent", about = "Telegram agent driven by an OpenAI assistant")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery in ./ and ~/.config/teleagent/).
    #[arg(long, global = true, env = "TELEAGENT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Telegram and serve commands (default when no subcommand is provided).
    Run,
    /// Cancel every active run on a completion thread.
    CancelRuns {
        /// Thread to clean up (defaults to `completion.thread_id`).
        #[arg(long)]
        thread: Option<String>,
    },
    /// Watchlist maintenance.
    Watchlist {
        #[command(subcommand)]
        action: watchlist_commands::WatchlistAction,
    },
    /// Print the function tools to register on the assistant.
    Functions,
    /// Database management.
    Db {
        #[command(subcommand)]
        action: db_commands::DbAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<TeleagentConfig> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "loading explicit config");
            teleagent_config::load_config(path)
        },
        None => teleagent_config::discover_and_load(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "teleagent starting");
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        None | Some(Commands::Run) => run_command::run(config).await,
        Some(Commands::CancelRuns { thread }) => runs_commands::cancel_runs(&config, thread).await,
        Some(Commands::Watchlist { action }) => {
            watchlist_commands::handle_watchlist(&config, action).await
        },
        Some(Commands::Functions) => functions_command::print_functions().await,
        Some(Commands::Db { action }) => db_commands::handle_db(&config, action).await,
    }
}
