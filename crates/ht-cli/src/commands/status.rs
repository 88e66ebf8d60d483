//! Status command: what `ht watch` would track with the current config.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use ht_api::Client;
use ht_engine::{ManualBackend, Tracker};
use ht_engine::contract::StatusResponse;

use crate::Config;

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Print the status as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Writes `status` in the human-readable layout.
pub fn render<W: Write>(writer: &mut W, status: &StatusResponse) -> std::io::Result<()> {
    let yes_no = |b: bool| if b { "Yes" } else { "No" };

    writeln!(writer, "Tracker Status:")?;
    writeln!(writer, "   Status: {}", status.status)?;
    writeln!(writer, "   API Key Configured: {}", yes_no(status.api_key_configured))?;
    writeln!(writer, "   API URL: {}", status.api_url)?;
    writeln!(writer, "   Heartbeat Interval: {} seconds", status.heartbeat_interval)?;
    writeln!(writer, "   Activity Timeout: {} seconds", status.activity_timeout)?;

    let stats = &status.stats;
    writeln!(writer)?;
    writeln!(writer, "Tracking Statistics:")?;
    writeln!(writer, "   Tracked Directories: {}", stats.tracked_directories.len())?;
    for dir in &stats.tracked_directories {
        writeln!(writer, "     - {}", dir.display())?;
    }
    writeln!(writer, "   Tracked Files: {}", stats.tracked_files)?;
    writeln!(writer, "   Pending Heartbeats: {}", stats.pending_heartbeats)?;
    let activity = if stats.is_tracking_active { "Active" } else { "Inactive" };
    writeln!(writer, "   Activity Status: {activity}")?;
    if stats.time_since_last_activity > 0.0 {
        writeln!(
            writer,
            "   Time Since Last Activity: {} seconds",
            stats.time_since_last_activity
        )?;
    }
    Ok(())
}

pub fn run<W: Write>(writer: &mut W, args: &StatusArgs, config: &Config) -> Result<()> {
    let client = Client::new().context("failed to create HTTP client")?;
    // A one-shot scan; nothing needs to be watched.
    let tracker = Tracker::builder(config.settings(), client)
        .watch_backend(Arc::new(ManualBackend::new()))
        .build();

    for dir in &config.directories {
        if let Err(e) = tracker.track(dir) {
            tracing::warn!(dir = %dir.display(), "cannot track directory: {e}");
            writeln!(writer, "Skipping {}: {e}", dir.display())?;
        }
    }

    let status = tracker.status();
    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&status)?)?;
    } else {
        render(writer, &status)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;
    use std::path::PathBuf;

    use ht_engine::contract::TrackerStats;
    use insta::assert_snapshot;

    fn status(active: bool, idle: f64) -> StatusResponse {
        StatusResponse {
            status: "running".to_string(),
            api_key_configured: false,
            api_url: "https://hackatime.hackclub.com/api/v1".to_string(),
            heartbeat_interval: 30,
            activity_timeout: 120,
            stats: TrackerStats {
                tracked_directories: vec![
                    PathBuf::from("/home/dev/app"),
                    PathBuf::from("/home/dev/lib"),
                ],
                tracked_files: 12,
                pending_heartbeats: 2,
                last_heartbeats: BTreeMap::new(),
                is_tracking_active: active,
                time_since_last_activity: idle,
            },
        }
    }

    #[test]
    fn test_render_matches_layout() {
        let mut output = Vec::new();
        render(&mut output, &status(true, 12.5)).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Tracker Status:
           Status: running
           API Key Configured: No
           API URL: https://hackatime.hackclub.com/api/v1
           Heartbeat Interval: 30 seconds
           Activity Timeout: 120 seconds

        Tracking Statistics:
           Tracked Directories: 2
             - /home/dev/app
             - /home/dev/lib
           Tracked Files: 12
           Pending Heartbeats: 2
           Activity Status: Active
           Time Since Last Activity: 12.5 seconds
        ");
    }

    #[test]
    fn test_render_hides_idle_time_without_activity() {
        let mut output = Vec::new();
        render(&mut output, &status(false, 0.0)).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Activity Status: Inactive"));
        assert!(!output.contains("Time Since Last Activity"));
    }

    #[test]
    fn test_run_scans_configured_directories() {
        let temp = tempfile::Builder::new().prefix("ht-status").tempdir().unwrap();
        let app = temp.path().join("app");
        std::fs::create_dir_all(&app).unwrap();
        std::fs::write(app.join("main.py"), "print(1)").unwrap();
        std::fs::write(app.join("logo.png"), "png").unwrap();

        let config = Config {
            directories: vec![app.clone(), temp.path().join("missing")],
            ..Config::default()
        };
        let mut output = Vec::new();
        run(&mut output, &StatusArgs { json: true }, &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        let (skipped, json) = output.split_once('\n').unwrap();
        assert!(skipped.starts_with("Skipping "));
        let status: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(status["stats"]["tracked_files"], 1);
        assert_eq!(status["stats"]["tracked_directories"][0], app.to_string_lossy().as_ref());
    }
}
