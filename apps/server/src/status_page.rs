//! Read-only status dashboard
//!
//! Serves a single self-refreshing HTML page on GET `/`. Nothing here
//! mutates gateway, engine or storage state.

use askama::Template;
use askama_axum::IntoResponse;
use axum::{extract::State, routing::get, Router};
use chrono::Utc;
use rtdl_core::{
    format_bytes, format_speed, list_files, oldest, Aria2Client, DownloadEngine, Gateway,
    RetentionConfig, MILLIS_PER_DAY,
};
use rtdl_types::{GlobalStats, JobStatus, TransportKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Seconds between browser refreshes
const REFRESH_SECS: u64 = 10;
/// Upper bound on how long one engine query may hold up the page
const ENGINE_TIMEOUT: Duration = Duration::from_secs(3);

pub struct NostrInfo {
    pub npub: String,
    pub pubkey_hex: String,
}

/// Everything the dashboard reads from
pub struct StatusState {
    pub gateway: Arc<Gateway>,
    pub engine: Arc<Aria2Client>,
    pub save_dir: PathBuf,
    pub telegram_username: Option<String>,
    pub telegram_enabled: bool,
    pub nostr: Option<NostrInfo>,
    pub retention: RetentionConfig,
}

type SharedState = Arc<StatusState>;

/// Oldest stored file as shown on the page
#[derive(Debug, Clone, PartialEq)]
pub struct OldestFile {
    pub name: String,
    pub size_bytes: u64,
    pub age_days: i64,
}

/// Snapshot rendered into the page
#[derive(Debug, Clone)]
pub struct DashboardData {
    pub version: String,
    pub secret: String,
    pub npub: Option<String>,
    pub pubkey_hex: Option<String>,
    pub telegram_username: Option<String>,
    pub telegram_enabled: bool,
    pub nostr_enabled: bool,
    pub telegram_users: usize,
    pub nostr_users: usize,
    pub stats: Option<GlobalStats>,
    pub jobs: Vec<JobStatus>,
    pub storage_used: u64,
    pub save_dir: String,
    pub oldest: Option<OldestFile>,
    pub retention_days: u64,
    pub retention_interval_hours: u64,
}

/// Serve the dashboard on `listener` until `cancel` fires
pub async fn serve(listener: TcpListener, state: SharedState, cancel: CancellationToken) {
    let app = Router::new()
        .route("/", get(handle_index))
        .with_state(state);

    match listener.local_addr() {
        Ok(addr) => info!("Status page listening on http://{}", addr),
        Err(e) => error!("Status page listener has no address: {}", e),
    }

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
    {
        error!("Status page server failed: {}", e);
    }
}

async fn handle_index(State(state): State<SharedState>) -> askama_axum::Response {
    let data = collect(&state).await;
    StatusTemplate::from(&data).into_response()
}

async fn collect(state: &StatusState) -> DashboardData {
    let stats = match tokio::time::timeout(ENGINE_TIMEOUT, state.engine.global_stats()).await {
        Ok(Ok(stats)) => Some(stats),
        _ => None,
    };
    let jobs = match tokio::time::timeout(ENGINE_TIMEOUT, state.engine.active_jobs()).await {
        Ok(Ok(jobs)) => jobs,
        _ => Vec::new(),
    };

    let files = list_files(&state.save_dir).await;
    let storage_used = files.iter().map(|f| f.size_bytes).sum();
    let now_ms = Utc::now().timestamp_millis();
    let oldest = oldest(&files).map(|f| OldestFile {
        name: file_name(&f.path),
        size_bytes: f.size_bytes,
        age_days: (now_ms - f.mtime_ms).max(0) / MILLIS_PER_DAY,
    });

    let authorizer = state.gateway.authorizer();
    DashboardData {
        version: env!("CARGO_PKG_VERSION").to_string(),
        secret: authorizer.secret().as_str().to_string(),
        npub: state.nostr.as_ref().map(|n| n.npub.clone()),
        pubkey_hex: state.nostr.as_ref().map(|n| n.pubkey_hex.clone()),
        telegram_username: state.telegram_username.clone(),
        telegram_enabled: state.telegram_enabled,
        nostr_enabled: state.nostr.is_some(),
        telegram_users: authorizer.authorized_count(TransportKind::Telegram),
        nostr_users: authorizer.authorized_count(TransportKind::Nostr),
        stats,
        jobs,
        storage_used,
        save_dir: state.save_dir.display().to_string(),
        oldest,
        retention_days: state.retention.policy.age_threshold_days,
        retention_interval_hours: state.retention.interval.as_secs() / 3600,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}

/// Engine counters, already formatted for display
pub struct EngineView {
    pub download_speed: String,
    pub upload_speed: String,
    pub num_active: u64,
    pub num_waiting: u64,
    pub num_stopped: u64,
}

pub struct JobView {
    pub name: String,
    pub progress: String,
    pub speed: String,
}

#[derive(Template)]
#[template(path = "status.html")]
pub struct StatusTemplate {
    pub refresh_secs: u64,
    pub version: String,
    pub secret: String,
    pub telegram_state: &'static str,
    pub telegram_username: Option<String>,
    pub nostr_state: &'static str,
    pub npub: Option<String>,
    pub pubkey_hex: Option<String>,
    pub telegram_users: usize,
    pub nostr_users: usize,
    pub engine: Option<EngineView>,
    pub jobs: Vec<JobView>,
    pub save_dir: String,
    pub storage_used: String,
    pub oldest: String,
    pub retention_days: u64,
    pub retention_interval_hours: u64,
}

impl From<&DashboardData> for StatusTemplate {
    fn from(data: &DashboardData) -> Self {
        Self {
            refresh_secs: REFRESH_SECS,
            version: data.version.clone(),
            secret: data.secret.clone(),
            telegram_state: enabled(data.telegram_enabled),
            telegram_username: data.telegram_username.clone(),
            nostr_state: enabled(data.nostr_enabled),
            npub: data.npub.clone(),
            pubkey_hex: data.pubkey_hex.clone(),
            telegram_users: data.telegram_users,
            nostr_users: data.nostr_users,
            engine: data.stats.as_ref().map(|stats| EngineView {
                download_speed: format_speed(stats.download_speed),
                upload_speed: format_speed(stats.upload_speed),
                num_active: stats.num_active,
                num_waiting: stats.num_waiting,
                num_stopped: stats.num_stopped,
            }),
            jobs: data
                .jobs
                .iter()
                .map(|job| JobView {
                    name: job.display_name(),
                    progress: format!("{:.1}", job.progress()),
                    speed: format_speed(job.download_speed),
                })
                .collect(),
            save_dir: data.save_dir.clone(),
            storage_used: format_bytes(data.storage_used),
            oldest: match &data.oldest {
                Some(f) => format!(
                    "{} ({}, {} days old)",
                    f.name,
                    format_bytes(f.size_bytes),
                    f.age_days
                ),
                None => "none".to_string(),
            },
            retention_days: data.retention_days,
            retention_interval_hours: data.retention_interval_hours,
        }
    }
}
