//! oiot CLI - Poll OIOT metering devices.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod display;
mod settings;

use settings::{Overrides, Settings};

#[derive(Parser)]
#[command(name = "oiot")]
#[command(about = "Read water and gas counters from the OIOT metering service", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (warnings and errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file. Defaults to the platform config directory.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Client (user) id, overriding the configuration file
    #[arg(long, env = "OIOT_CLIENT_ID", global = true)]
    client_id: Option<String>,

    /// API token, overriding the configuration file
    #[arg(long, env = "OIOT_API_TOKEN", hide_env_values = true, global = true)]
    api_token: Option<String>,

    /// Device id, overriding the configuration file
    #[arg(long, env = "OIOT_DEVICE_ID", global = true)]
    device_id: Option<String>,

    /// Service endpoint
    #[arg(long, env = "OIOT_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value = "10", global = true)]
    timeout: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Enter credentials, verify them and save the configuration
    Setup,

    /// Verify the configured credentials
    Check,

    /// Fetch the current readings once
    Fetch {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Poll the device and print readings as they change
    Watch {
        /// Seconds between polls
        #[arg(short, long, default_value = "10")]
        interval: u64,

        /// Stop after this many updates
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Print JSON lines instead of text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    // Show help if no command provided
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let settings = Settings::new(
        cli.config,
        Overrides {
            client_id: cli.client_id,
            api_token: cli.api_token,
            device_id: cli.device_id,
        },
        cli.base_url,
        cli.timeout,
    );

    match command {
        Commands::Setup => commands::setup::setup(&settings).await,
        Commands::Check => commands::check::check(&settings).await,
        Commands::Fetch { json } => commands::fetch::fetch(&settings, json).await,
        Commands::Watch {
            interval,
            count,
            json,
        } => commands::watch::watch(&settings, interval, count, json).await,
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default_level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
