//! Shared types for RTDL
//!
//! This crate contains the data structures shared between the gateway core
//! and the server binary: engine job records, command outcomes and
//! retention reports. Everything here is plain data and serializes with serde.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Transport Types
// ============================================================================

/// The messaging transports a principal can reach the gateway through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Centralized chat platform (Telegram bot API)
    Telegram,
    /// Decentralized encrypted direct messages (Nostr)
    Nostr,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Telegram => "telegram",
            TransportKind::Nostr => "nostr",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Engine Types
// ============================================================================

/// Lifecycle state of a job as reported by the download engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Active,
    Waiting,
    Paused,
    Error,
    Complete,
    Removed,
    #[serde(other)]
    Unknown,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Active => "active",
            JobState::Waiting => "waiting",
            JobState::Paused => "paused",
            JobState::Error => "error",
            JobState::Complete => "complete",
            JobState::Removed => "removed",
            JobState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single file belonging to a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFile {
    pub path: String,
    pub length: u64,
    pub completed_length: u64,
}

/// Live status of a job, queried from the engine on every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub gid: String,
    pub status: JobState,
    pub completed_length: u64,
    pub total_length: u64,
    pub download_speed: u64,
    pub upload_speed: u64,
    #[serde(default)]
    pub files: Vec<JobFile>,
    /// Torrent name, when the engine knows one
    #[serde(default)]
    pub name: Option<String>,
}

impl JobStatus {
    /// Percentage complete, 0.0 when the total size is still unknown
    pub fn progress(&self) -> f64 {
        if self.total_length > 0 {
            (self.completed_length as f64 / self.total_length as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn completed_mb(&self) -> f64 {
        self.completed_length as f64 / 1024.0 / 1024.0
    }

    pub fn total_mb(&self) -> f64 {
        self.total_length as f64 / 1024.0 / 1024.0
    }

    /// Best human-facing name: first file's basename, then torrent name
    pub fn display_name(&self) -> String {
        self.files
            .first()
            .map(|f| f.path.as_str())
            .filter(|p| !p.is_empty())
            .and_then(|p| p.rsplit('/').next())
            .map(str::to_string)
            .or_else(|| self.name.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

/// Engine-wide transfer statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub download_speed: u64,
    pub upload_speed: u64,
    pub num_active: u64,
    pub num_waiting: u64,
    pub num_stopped: u64,
}

/// What kind of reference a download was started from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Magnet,
    Url,
}

// ============================================================================
// Command Outcome Types
// ============================================================================

/// One line of the help listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpEntry {
    pub command: String,
    pub description: String,
}

/// Information returned by the `start` command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub project_url: String,
    /// Short tag derived from the caller's principal id
    pub user_tag: String,
    pub used_space: u64,
    pub save_dir: PathBuf,
    pub webdav_port: u16,
    pub status_port: u16,
}

/// Public address information of the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpInfo {
    pub query: String,
    pub country: String,
    pub region_name: String,
    pub city: String,
    pub isp: String,
}

/// Server clock reading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerTime {
    pub timestamp_ms: i64,
    pub iso: String,
    pub human: String,
}

/// Result of evicting the single oldest stored file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionReport {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub pruned_dirs: usize,
}

impl EvictionReport {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Successful outcome of a command, one variant per handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandOutcome {
    Help { commands: Vec<HelpEntry> },
    Start(BotInfo),
    Stats(GlobalStats),
    DownloadStarted {
        gid: String,
        reference_kind: ReferenceKind,
        reference: String,
    },
    Status(JobStatus),
    Downloading { jobs: Vec<JobStatus> },
    Cancelled { gid: String },
    Evicted(EvictionReport),
    Ip(IpInfo),
    Time(ServerTime),
    Unknown { verb: String },
}

impl CommandOutcome {
    /// Name of the command that produced this outcome
    pub fn command(&self) -> &'static str {
        match self {
            CommandOutcome::Help { .. } => "help",
            CommandOutcome::Start(_) => "start",
            CommandOutcome::Stats(_) => "stats",
            CommandOutcome::DownloadStarted { .. } => "download",
            CommandOutcome::Status(_) => "status",
            CommandOutcome::Downloading { .. } => "downloading",
            CommandOutcome::Cancelled { .. } => "cancel",
            CommandOutcome::Evicted(_) => "clean",
            CommandOutcome::Ip(_) => "ip",
            CommandOutcome::Time(_) => "time",
            CommandOutcome::Unknown { .. } => "unknown",
        }
    }
}

/// Transport-independent command result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<CommandOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResponse {
    pub fn ok(outcome: CommandOutcome) -> Self {
        Self {
            success: true,
            command: outcome.command().to_string(),
            data: Some(outcome),
            error: None,
        }
    }

    pub fn failed(command: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            command: command.to_string(),
            data: None,
            error: Some(error.into()),
        }
    }
}

// ============================================================================
// Retention Types
// ============================================================================

/// How a retention sweep ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepOutcome {
    /// At least one file qualified for deletion
    Cleaned,
    /// The storage tree holds no files at all
    NoFiles,
    /// Files exist but none is older than the threshold
    NothingOldEnough,
}

/// Summary of a periodic retention sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub outcome: SweepOutcome,
    pub threshold_days: u64,
    pub scanned_count: usize,
    pub deleted_count: usize,
    pub failed_count: usize,
    pub bytes_freed: u64,
    pub pruned_dirs: usize,
}

impl SweepReport {
    pub fn nothing_to_do(outcome: SweepOutcome, threshold_days: u64, scanned_count: usize) -> Self {
        Self {
            outcome,
            threshold_days,
            scanned_count,
            deleted_count: 0,
            failed_count: 0,
            bytes_freed: 0,
            pruned_dirs: 0,
        }
    }
}
