//! Heartbeat command: build one write heartbeat for a file and send it now.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Args;
use ht_api::{Client, HeartbeatTransport};
use ht_core::Heartbeat;
use ht_engine::registry::normalize;
use ht_engine::{Clock, ManualBackend, SystemClock, TickOutcome, Tracker};

use crate::Config;

#[derive(Debug, Args)]
pub struct HeartbeatArgs {
    /// File the heartbeat is for.
    pub file: PathBuf,

    /// Print the heartbeat as JSON instead of sending it.
    #[arg(long)]
    pub dry_run: bool,
}

/// Builds a tracker that resolves projects for `file`.
///
/// Only configured directories containing `file` can name its project, so
/// the others are not tracked. Nothing is watched.
pub fn tracker_for<T: HeartbeatTransport>(
    config: &Config,
    file: &Path,
    transport: T,
    clock: Arc<dyn Clock>,
) -> Result<Tracker<T>> {
    let file = normalize(file)?;
    let tracker = Tracker::builder(config.settings(), transport)
        .watch_backend(Arc::new(ManualBackend::new()))
        .clock(clock)
        .build();

    for dir in &config.directories {
        let dir = normalize(dir)?;
        if file.starts_with(&dir) && dir.is_dir() {
            tracker
                .track(&dir)
                .with_context(|| format!("failed to track {}", dir.display()))?;
        }
    }
    Ok(tracker)
}

/// Queues a write heartbeat for `file` and returns it.
pub fn queue<T: HeartbeatTransport>(tracker: &Tracker<T>, file: &Path) -> Result<Heartbeat> {
    tracker.manual_heartbeat(file)?;
    tracker
        .pending()
        .pop()
        .context("no heartbeat was queued")
}

/// Sends the queued `heartbeat` with the tracker's credentials.
pub async fn send<T, W>(writer: &mut W, tracker: &Tracker<T>, heartbeat: &Heartbeat) -> Result<()>
where
    T: HeartbeatTransport,
    W: Write,
{
    match tracker.dispatcher().tick().await {
        TickOutcome::Sent { failed: 0, .. } => {}
        TickOutcome::NoApiKey { .. } => {
            bail!("no API key configured; set one with `ht config --api-key <KEY>`")
        }
        outcome => bail!(
            "failed to send heartbeat for {} ({outcome:?})",
            heartbeat.entity()
        ),
    }

    writeln!(writer, "Heartbeat sent for: {}", heartbeat.entity())?;
    Ok(())
}

pub fn run<W: Write>(writer: &mut W, args: &HeartbeatArgs, config: &Config) -> Result<()> {
    let client = Client::new().context("failed to create HTTP client")?;
    let tracker = tracker_for(config, &args.file, client, Arc::new(SystemClock))?;
    let heartbeat = queue(&tracker, &args.file)?;

    if args.dry_run {
        writeln!(writer, "{}", serde_json::to_string_pretty(&heartbeat)?)?;
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(send(writer, &tracker, &heartbeat))
}
