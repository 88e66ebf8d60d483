//! Watch command: run the tracker in the foreground until interrupted.

use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Args;
use ht_api::{Client, HeartbeatTransport};
use ht_engine::contract::StatusResponse;
use ht_engine::{IntervalTicker, Ticker, Tracker};

use crate::commands::track_all;
use crate::{Config, TomlSettingsStore};

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Directories to watch. Defaults to `directories` from the config file.
    pub dirs: Vec<PathBuf>,
}

/// Tracks `dirs`, runs the dispatcher until `stop` resolves, then shuts the
/// tracker down and returns its final status.
pub async fn watch_until<T, W, K, F>(
    writer: &mut W,
    tracker: &Tracker<T>,
    dirs: &[PathBuf],
    ticker: K,
    stop: F,
) -> Result<StatusResponse>
where
    T: HeartbeatTransport,
    W: Write,
    K: Ticker + 'static,
    F: Future<Output = ()>,
{
    let tracked = track_all(writer, tracker, dirs)?;
    if tracked == 0 {
        bail!("none of the given directories could be tracked");
    }
    if !tracker.settings().api_key_configured() {
        writeln!(
            writer,
            "No API key configured; heartbeats will be discarded. \
             Set one with `ht config --api-key <KEY>`."
        )?;
    }

    // Tick outcomes are only logged here.
    drop(tracker.spawn_dispatcher(ticker));
    let noun = if tracked == 1 { "directory" } else { "directories" };
    writeln!(writer, "Watching {tracked} {noun}. Press Ctrl-C to stop.")?;
    writer.flush()?;

    stop.await;

    let status = tracker.status();
    tracker.shutdown().await;
    Ok(status)
}

pub fn run<W: Write>(
    writer: &mut W,
    args: &WatchArgs,
    config: &Config,
    config_file: Option<PathBuf>,
) -> Result<()> {
    let dirs = if args.dirs.is_empty() {
        config.directories.clone()
    } else {
        args.dirs.clone()
    };
    if dirs.is_empty() {
        bail!("no directories to watch; pass DIR or set `directories` in the config file");
    }

    let settings = config.settings();
    let ticker_period = settings.tick_interval();
    let client = Client::new().context("failed to create HTTP client")?;
    let mut builder = Tracker::builder(settings, client);
    if let Some(path) = config_file {
        builder = builder.settings_store(Arc::new(TomlSettingsStore::new(path)));
    }
    let tracker = builder.build();

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let status = runtime.block_on(async {
        let stop = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("failed to listen for Ctrl-C: {e}");
            }
        };
        watch_until(writer, &tracker, &dirs, IntervalTicker::new(ticker_period), stop).await
    })?;

    writeln!(writer, "{}", serde_json::to_string_pretty(&status)?)?;
    Ok(())
}
