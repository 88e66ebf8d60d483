use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ht_cli::commands::{config, heartbeat, status, watch};
use ht_cli::{Cli, Commands, Config, TomlSettingsStore, default_config_file};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    // Updates go to the file named on the command line, else the default one.
    let config_file = cli.config.clone().or_else(default_config_file);
    let mut stdout = std::io::stdout().lock();

    match &cli.command {
        Some(Commands::Watch(args)) => {
            watch::run(&mut stdout, args, &config, config_file)?;
        }
        Some(Commands::Heartbeat(args)) => {
            heartbeat::run(&mut stdout, args, &config)?;
        }
        Some(Commands::Config(args)) => {
            let store = config_file.map(TomlSettingsStore::new);
            config::run(&mut stdout, args, &config, store)?;
        }
        Some(Commands::Status(args)) => {
            status::run(&mut stdout, args, &config)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
