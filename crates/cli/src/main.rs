//! LwM2M Console CLI - Main Entry Point

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use lwm2m_console_cli::client::ConsoleClient;
use lwm2m_console_cli::commands::{bootstrap, clients, config, hex};
use lwm2m_console_cli::config::ConsoleConfig;
use lwm2m_console_cli::output;

/// LwM2M Console - bootstrap configurations and registered clients
#[derive(Parser)]
#[command(name = "lwm2m-console")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// LwM2M server REST API base URL
    #[arg(long, env = "LWM2M_SERVER_URL", global = true)]
    server_url: Option<String>,

    /// Bootstrap server REST API base URL
    #[arg(long, env = "LWM2M_BOOTSTRAP_URL", global = true)]
    bootstrap_url: Option<String>,

    /// Configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage bootstrap configurations
    #[command(subcommand)]
    Bootstrap(bootstrap::BootstrapCommands),

    /// Inspect registered clients
    #[command(subcommand)]
    Clients(clients::ClientCommands),

    /// Hex conversion of key material
    #[command(subcommand)]
    Hex(hex::HexCommands),

    /// Console configuration
    #[command(subcommand)]
    Config(config::ConfigCommands),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(lwm2m_console_common::default_config_path);
    let settings = ConsoleConfig::load(&config_path)?
        .with_overrides(cli.server_url.clone(), cli.bootstrap_url.clone());

    let client = ConsoleClient::new(
        &settings.server.url,
        &settings.bootstrap.url,
        settings.timeout(),
    );

    let result = match cli.command {
        Commands::Bootstrap(cmd) => bootstrap::execute(cmd, client?, cli.format).await,
        Commands::Clients(cmd) => clients::execute(cmd, client?, cli.format).await,
        Commands::Hex(cmd) => hex::execute(cmd),
        Commands::Config(cmd) => config::execute(cmd, &settings, &config_path),
        Commands::Version => {
            println!("LwM2M Console v{}", lwm2m_console_common::VERSION);
            println!("  Server API:    {}", settings.server.url);
            println!("  Bootstrap API: {}", settings.bootstrap.url);
            Ok(())
        }
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
