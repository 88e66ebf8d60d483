//! Core domain logic for the heartbeat tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Heartbeats: the immutable activity record and its builder
//! - Classification: deciding which files are eligible for tracking
//! - Fingerprinting: content hashes used to detect no-op writes
//! - Metadata: project, branch, language and line count of a file
//! - Queueing: the last-write-wins buffer of pending heartbeats
//! - Activity: the active/inactive state machine gating dispatch

pub mod activity;
pub mod classify;
pub mod fingerprint;
mod heartbeat;
pub mod language;
pub mod metadata;
pub mod project;
pub mod queue;

pub use activity::ActivityState;
pub use classify::{Classifier, DEFAULT_MAX_FILE_SIZE};
pub use fingerprint::{ContentHash, FingerprintStore, fingerprint, scan_directory};
pub use heartbeat::{
    DEFAULT_IDE, Heartbeat, HeartbeatBuilder, plugin_tag, unix_seconds,
};
pub use metadata::{FileMetadata, line_count};
pub use queue::HeartbeatQueue;
