//! Config command: show and update persisted configuration.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Args;
use ht_api::Client;
use ht_engine::Tracker;
use ht_engine::contract::{ConfigResponse, ConfigUpdate};

use crate::{Config, TomlSettingsStore};

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Set the API key. An empty value clears it.
    #[arg(long)]
    pub api_key: Option<String>,

    /// Set the heartbeat API base URL.
    #[arg(long)]
    pub api_url: Option<String>,

    /// Set a project name for all heartbeats. An empty value clears it.
    #[arg(long)]
    pub project: Option<String>,

    /// Set the editor name reported to the API.
    #[arg(long)]
    pub ide: Option<String>,

    /// Set the minimum seconds between heartbeats for one file.
    #[arg(long)]
    pub heartbeat_interval: Option<u64>,
}

impl ConfigArgs {
    pub fn update(&self) -> ConfigUpdate {
        ConfigUpdate {
            api_key: self.api_key.clone(),
            api_url: self.api_url.clone(),
            project: self.project.clone(),
            ide: self.ide.clone(),
            heartbeat_interval: self.heartbeat_interval,
        }
    }
}

/// Writes `config` in the human-readable layout.
pub fn render<W: Write>(writer: &mut W, config: &ConfigResponse) -> std::io::Result<()> {
    writeln!(writer, "Configuration:")?;
    writeln!(writer, "   API URL: {}", config.api_url)?;
    writeln!(
        writer,
        "   API Key Configured: {}",
        if config.api_key_configured { "Yes" } else { "No" }
    )?;
    writeln!(
        writer,
        "   Project: {}",
        config.project.as_deref().unwrap_or("Not set")
    )?;
    writeln!(writer, "   IDE: {}", config.ide)?;
    writeln!(writer, "   Heartbeat Interval: {} seconds", config.heartbeat_interval)?;
    match &config.config_file {
        Some(path) => writeln!(writer, "   Config File: {}", path.display()),
        None => writeln!(writer, "   Config File: Not set"),
    }
}

pub fn run<W: Write>(
    writer: &mut W,
    args: &ConfigArgs,
    config: &Config,
    store: Option<TomlSettingsStore>,
) -> Result<()> {
    let update = args.update();
    if !update.is_empty() && store.is_none() {
        bail!("no config file location available; pass --config <FILE>");
    }

    let client = Client::new().context("failed to create HTTP client")?;
    let mut builder = Tracker::builder(config.settings(), client);
    if let Some(store) = store {
        builder = builder.settings_store(Arc::new(store));
    }
    let tracker = builder.build();

    let response = if update.is_empty() {
        tracker.config()
    } else {
        let response = tracker.update_config(&update)?;
        writeln!(writer, "Configuration updated successfully")?;
        response
    };
    render(writer, &response)?;
    Ok(())
}
