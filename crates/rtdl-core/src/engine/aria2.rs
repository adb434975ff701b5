//! aria2 JSON-RPC client
//!
//! Talks to a local aria2c daemon over HTTP. Each call is a single JSON-RPC
//! 2.0 request with a fixed id; a response without `result` is a failure.

use super::DownloadEngine;
use crate::error::RtdlError;
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use reqwest::Client;
use rtdl_types::{GlobalStats, JobFile, JobState, JobStatus};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info};

/// Default RPC endpoint of the bundled aria2c daemon
pub const DEFAULT_RPC_URL: &str = "http://localhost:6398/jsonrpc";

/// Extra trackers attached to every job to find peers faster
pub const PUBLIC_TRACKERS: &[&str] = &[
    "udp://tracker.opentrackr.org:1337/announce",
    "udp://open.tracker.cl:1337/announce",
    "udp://tracker.torrent.eu.org:451/announce",
    "udp://open.stealth.si:80/announce",
    "udp://tracker.dler.org:6969/announce",
    "udp://exodus.desync.com:6969/announce",
    "udp://tracker.0x7c0.com:6969/announce",
    "udp://tracker.moeking.me:6969/announce",
    "udp://uploads.gamecoast.net:6969/announce",
    "udp://tracker.altrosky.nl:6969/announce",
    "udp://tracker.tiny-vps.com:6969/announce",
    "udp://tracker.theoks.net:6969/announce",
    "udp://bt.ktrackers.com:6666/announce",
    "udp://thouvenin.cloud:6969/announce",
    "udp://tracker.bittor.pw:1337/announce",
    "udp://tracker.swateam.org.uk:2710/announce",
    "http://tracker.openbittorrent.com:80/announce",
    "udp://opentracker.i2p.rocks:6969/announce",
];

/// Dated per-owner directory a new job downloads into
pub fn job_target_dir(save_dir: &Path, owner_hash: &str, date: NaiveDate) -> PathBuf {
    save_dir
        .join(owner_hash)
        .join(date.format("%Y%m%d").to_string())
}

/// Client for the aria2 JSON-RPC interface
#[derive(Debug, Clone)]
pub struct Aria2Client {
    client: Client,
    rpc_url: String,
    /// `--rpc-secret` of the daemon, if it was started with one
    secret: Option<String>,
    save_dir: PathBuf,
}

impl Aria2Client {
    /// Create a client with bounded connect and request timeouts
    pub fn new(
        rpc_url: impl Into<String>,
        secret: Option<String>,
        save_dir: PathBuf,
    ) -> Result<Self, RtdlError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| RtdlError::Config(e.to_string()))?;

        Ok(Self {
            client,
            rpc_url: rpc_url.into(),
            secret,
            save_dir,
        })
    }

    /// Daemon version string, useful as a health check
    pub async fn version(&self) -> Result<String, RtdlError> {
        #[derive(Deserialize)]
        struct Version {
            version: String,
        }
        let version: Version = self.call("aria2.getVersion", Vec::new()).await?;
        Ok(version.version)
    }

    pub async fn is_healthy(&self) -> bool {
        self.version().await.is_ok()
    }

    /// Issue one RPC call and decode its `result`
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T, RtdlError> {
        let body = build_request(method, self.secret.as_deref(), params);
        debug!(method, "aria2 RPC call");

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("aria2 {} error: {}", method, e);
                RtdlError::from(e)
            })?;

        // aria2 answers RPC errors with a 4xx status and a JSON body, so the
        // status code alone does not decide success
        let envelope: RpcResponse = response.json().await?;
        envelope.into_result(method)
    }

    /// Like [`call`](Self::call) but maps any RPC-level error to `NotFound(gid)`
    async fn call_for_gid<T: DeserializeOwned>(&self, method: &str, gid: &str) -> Result<T, RtdlError> {
        match self.call(method, vec![json!(gid)]).await {
            Err(RtdlError::Engine { message, .. }) => {
                debug!(gid, "aria2 rejected gid: {}", message);
                Err(RtdlError::NotFound(gid.to_string()))
            }
            other => other,
        }
    }
}

#[async_trait]
impl DownloadEngine for Aria2Client {
    async fn add_job(&self, owner_hash: &str, reference: &str) -> Result<String, RtdlError> {
        let dir = job_target_dir(&self.save_dir, owner_hash, Local::now().date_naive());
        let gid: String = self
            .call("aria2.addUri", add_uri_params(reference, &dir))
            .await?;
        info!(gid = %gid, dir = %dir.display(), "Job submitted to aria2");
        Ok(gid)
    }

    async fn job_status(&self, gid: &str) -> Result<JobStatus, RtdlError> {
        let raw: RawStatus = self.call_for_gid("aria2.tellStatus", gid).await?;
        Ok(raw.into())
    }

    async fn active_jobs(&self) -> Result<Vec<JobStatus>, RtdlError> {
        let raw: Vec<RawStatus> = self.call("aria2.tellActive", Vec::new()).await?;
        Ok(raw.into_iter().map(Into::into).collect())
    }

    async fn cancel_job(&self, gid: &str) -> Result<(), RtdlError> {
        let removed: String = self.call_for_gid("aria2.remove", gid).await?;
        info!(gid = %removed, "Job removed from aria2");
        Ok(())
    }

    async fn global_stats(&self) -> Result<GlobalStats, RtdlError> {
        let raw: RawGlobalStat = self.call("aria2.getGlobalStat", Vec::new()).await?;
        Ok(raw.into())
    }
}

// ============================================================================
// Wire format
// ============================================================================

fn build_request(method: &str, secret: Option<&str>, params: Vec<Value>) -> Value {
    let mut all_params = Vec::with_capacity(params.len() + 1);
    if let Some(secret) = secret {
        all_params.push(json!(format!("token:{}", secret)));
    }
    all_params.extend(params);

    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": all_params,
    })
}

/// `[[reference], {dir, bt-tracker}]` for `aria2.addUri`
fn add_uri_params(reference: &str, dir: &Path) -> Vec<Value> {
    vec![
        json!([reference]),
        json!({
            "dir": dir.to_string_lossy(),
            "bt-tracker": PUBLIC_TRACKERS.join(","),
        }),
    ]
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcResponse {
    fn into_result<T: DeserializeOwned>(self, method: &str) -> Result<T, RtdlError> {
        match (self.result, self.error) {
            (Some(result), _) => serde_json::from_value(result)
                .map_err(|e| RtdlError::Serialization(format!("{}: {}", method, e))),
            (None, Some(err)) => Err(RtdlError::Engine {
                code: err.code,
                message: err.message,
            }),
            (None, None) => Err(RtdlError::Engine {
                code: -1,
                message: format!("{} returned no result", method),
            }),
        }
    }
}

/// aria2 encodes every number as a decimal string
fn num(value: &str) -> u64 {
    value.parse().unwrap_or(0)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStatus {
    gid: String,
    status: JobState,
    #[serde(default)]
    total_length: String,
    #[serde(default)]
    completed_length: String,
    #[serde(default)]
    download_speed: String,
    #[serde(default)]
    upload_speed: String,
    #[serde(default)]
    files: Vec<RawFile>,
    #[serde(default)]
    bittorrent: Option<RawBittorrent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFile {
    #[serde(default)]
    path: String,
    #[serde(default)]
    length: String,
    #[serde(default)]
    completed_length: String,
}

#[derive(Debug, Deserialize)]
struct RawBittorrent {
    #[serde(default)]
    info: Option<RawTorrentInfo>,
}

#[derive(Debug, Deserialize)]
struct RawTorrentInfo {
    name: String,
}

impl From<RawStatus> for JobStatus {
    fn from(raw: RawStatus) -> Self {
        JobStatus {
            gid: raw.gid,
            status: raw.status,
            completed_length: num(&raw.completed_length),
            total_length: num(&raw.total_length),
            download_speed: num(&raw.download_speed),
            upload_speed: num(&raw.upload_speed),
            files: raw
                .files
                .into_iter()
                .map(|f| JobFile {
                    path: f.path,
                    length: num(&f.length),
                    completed_length: num(&f.completed_length),
                })
                .collect(),
            name: raw.bittorrent.and_then(|b| b.info).map(|i| i.name),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGlobalStat {
    download_speed: String,
    upload_speed: String,
    num_active: String,
    num_waiting: String,
    num_stopped: String,
}

impl From<RawGlobalStat> for GlobalStats {
    fn from(raw: RawGlobalStat) -> Self {
        GlobalStats {
            download_speed: num(&raw.download_speed),
            upload_speed: num(&raw.upload_speed),
            num_active: num(&raw.num_active),
            num_waiting: num(&raw.num_waiting),
            num_stopped: num(&raw.num_stopped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_dir_is_dated_per_owner() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        let dir = job_target_dir(Path::new("/srv/streambox"), "1234567890abcdef", date);
        assert_eq!(dir, PathBuf::from("/srv/streambox/1234567890abcdef/20240307"));
    }

    #[test]
    fn test_add_uri_params_shape() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let dir = job_target_dir(Path::new("/srv/streambox"), "555000111", date);
        let params = add_uri_params("magnet:?xt=urn:btih:ABCD123", &dir);

        assert_eq!(params.len(), 2);
        assert_eq!(params[0], json!(["magnet:?xt=urn:btih:ABCD123"]));
        let options = params[1].as_object().unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options["dir"], "/srv/streambox/555000111/20240601");
        let trackers = options["bt-tracker"].as_str().unwrap();
        assert_eq!(trackers.split(',').count(), PUBLIC_TRACKERS.len());
        assert!(trackers.starts_with(PUBLIC_TRACKERS[0]));

        let body = build_request("aria2.addUri", Some("tok"), params);
        assert_eq!(body["params"][0], "token:tok");
        assert_eq!(body["params"][1], json!(["magnet:?xt=urn:btih:ABCD123"]));
    }

    #[test]
    fn test_request_envelope() {
        let body = build_request("aria2.tellStatus", None, vec![json!("abc")]);
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["id"], 1);
        assert_eq!(body["method"], "aria2.tellStatus");
        assert_eq!(body["params"], json!(["abc"]));
    }

    #[test]
    fn test_request_prepends_secret_token() {
        let body = build_request("aria2.remove", Some("s3cret"), vec![json!("abc")]);
        assert_eq!(body["params"], json!(["token:s3cret", "abc"]));
    }

    #[test]
    fn test_error_response_is_engine_error() {
        let response: RpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": 1, "message": "GID ffff is not found"}
        }))
        .unwrap();
        let result: Result<Value, _> = response.into_result("aria2.tellStatus");
        assert!(matches!(result, Err(RtdlError::Engine { code: 1, .. })));
    }

    #[test]
    fn test_missing_result_is_failure() {
        let response: RpcResponse = serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1})).unwrap();
        let result: Result<Value, _> = response.into_result("aria2.getGlobalStat");
        assert!(result.is_err());
    }

    #[test]
    fn test_status_decoding() {
        let raw: RawStatus = serde_json::from_value(json!({
            "gid": "2089b05ecca3d829",
            "status": "active",
            "totalLength": "1048576",
            "completedLength": "524288",
            "downloadSpeed": "2048",
            "uploadSpeed": "not-a-number",
            "files": [{"index": "1", "path": "/srv/a/b/file.iso", "length": "1048576", "completedLength": "524288"}],
            "bittorrent": {"info": {"name": "file.iso"}}
        }))
        .unwrap();
        let status: JobStatus = raw.into();
        assert_eq!(status.status, JobState::Active);
        assert_eq!(status.completed_length, 524_288);
        assert_eq!(status.upload_speed, 0);
        assert_eq!(status.progress(), 50.0);
        assert_eq!(status.files.len(), 1);
        assert_eq!(status.name.as_deref(), Some("file.iso"));
    }

    #[tokio::test]
    async fn test_unreachable_daemon_is_engine_unavailable() {
        // port 9 (discard) on localhost is expected to refuse connections
        let client = Aria2Client::new("http://127.0.0.1:9/jsonrpc", None, PathBuf::from("/tmp")).unwrap();
        let result = client.global_stats().await;
        assert!(matches!(result, Err(RtdlError::EngineUnavailable(_))));
    }
}
