//! CLI subcommand implementations.

use std::io::Write;
use std::path::PathBuf;

use ht_api::HeartbeatTransport;
use ht_engine::Tracker;
use ht_engine::contract::TrackRequest;

pub mod config;
pub mod heartbeat;
pub mod status;
pub mod watch;

/// Tracks each of `dirs`, reporting every result to `writer`.
///
/// Returns how many directories are tracked afterwards.
pub fn track_all<T, W>(
    writer: &mut W,
    tracker: &Tracker<T>,
    dirs: &[PathBuf],
) -> std::io::Result<usize>
where
    T: HeartbeatTransport,
    W: Write,
{
    for dir in dirs {
        let response = tracker.track_action(&TrackRequest { path: dir.clone() });
        match (response.message, response.error) {
            (Some(message), _) => writeln!(writer, "{message}")?,
            (None, Some(error)) => writeln!(writer, "Failed to track directory: {error}")?,
            (None, None) => {}
        }
    }
    Ok(tracker.tracked().len())
}
