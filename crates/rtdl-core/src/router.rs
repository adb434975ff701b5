//! Command Router - dispatches parsed commands to their handlers
//!
//! Each handler talks to the download engine (or the storage tree) and
//! returns a structured outcome. Every failure is caught here and turned into
//! a `success: false` response; nothing escapes to the transport.

use crate::command::{extract_reference, magnet_from_hash, Command};
use crate::config::GatewayConfig;
use crate::engine::DownloadEngine;
use crate::error::RtdlError;
use crate::netinfo::IpLookup;
use crate::{retention, storage};
use chrono::{Local, Utc};
use rtdl_types::{BotInfo, CommandOutcome, CommandResponse, HelpEntry, ServerTime};
use std::sync::Arc;
use tracing::{info, warn};

pub const BOT_NAME: &str = "Remote-Torrent-Downloader Bot";
pub const BOT_DESCRIPTION: &str =
    "A Telegram/Nostr bot to control Remote-Torrent-Downloader. Download torrents and stream media easily.";
pub const PROJECT_URL: &str = "https://github.com/besoeasy/Remote-Torrent-Downloader";

const OWNER_HASH_LEN: usize = 16;
const USER_TAG_LEN: usize = 8;

/// Stable per-principal directory name for downloaded files
pub fn owner_hash(principal_id: &str) -> String {
    principal_id.chars().take(OWNER_HASH_LEN).collect()
}

/// Every verb with its description, in display order
pub fn help_entries() -> Vec<HelpEntry> {
    [
        ("help", "Show available commands"),
        ("start", "Get bot info and status"),
        ("stats", "Show global download stats"),
        ("download <url>", "Start downloading a file"),
        ("dl <url>", "Alias for download"),
        ("dl_<hash>", "Download a torrent by info-hash"),
        ("downloading", "View active downloads"),
        ("status_<gid>", "Check download status"),
        ("cancel_<gid>", "Cancel a download"),
        ("clean", "Delete oldest file"),
        ("ip", "Show server IP info"),
        ("time", "Show server time"),
    ]
    .into_iter()
    .map(|(command, description)| HelpEntry {
        command: command.to_string(),
        description: description.to_string(),
    })
    .collect()
}

/// Routes commands from authorized principals to handlers
pub struct CommandRouter {
    engine: Arc<dyn DownloadEngine>,
    ip_lookup: IpLookup,
    config: GatewayConfig,
}

impl CommandRouter {
    pub fn new(engine: Arc<dyn DownloadEngine>, config: GatewayConfig) -> Result<Self, RtdlError> {
        let ip_lookup = IpLookup::new(config.ip_api_url.clone())?;
        Ok(Self {
            engine,
            ip_lookup,
            config,
        })
    }

    /// Run `command` for `sender_id` and package the result
    pub async fn execute(&self, command: Command, sender_id: &str) -> CommandResponse {
        let name = command.name();
        match self.dispatch(command, sender_id).await {
            Ok(outcome) => CommandResponse::ok(outcome),
            Err(e) => {
                warn!(command = name, "Command failed: {}", e);
                CommandResponse::failed(name, e.to_string())
            }
        }
    }

    async fn dispatch(&self, command: Command, sender_id: &str) -> Result<CommandOutcome, RtdlError> {
        match command {
            Command::Help => Ok(CommandOutcome::Help {
                commands: help_entries(),
            }),
            Command::Start => self.start(sender_id).await,
            Command::Stats => Ok(CommandOutcome::Stats(self.engine.global_stats().await?)),
            Command::Download(None) => Err(RtdlError::MissingArgument(
                "Please provide a URL or magnet link.".to_string(),
            )),
            Command::Download(Some(input)) => self.download(sender_id, &input).await,
            Command::DownloadHash(hash) if hash.is_empty() => Err(RtdlError::MissingArgument(
                "Invalid download command. Hash missing.".to_string(),
            )),
            Command::DownloadHash(hash) => self.download(sender_id, &magnet_from_hash(&hash)).await,
            Command::Downloading => Ok(CommandOutcome::Downloading {
                jobs: self.engine.active_jobs().await?,
            }),
            Command::Status(gid) => {
                require_gid(&gid)?;
                Ok(CommandOutcome::Status(self.engine.job_status(&gid).await?))
            }
            Command::Cancel(gid) => {
                require_gid(&gid)?;
                self.engine.cancel_job(&gid).await?;
                info!(gid = %gid, "Download canceled");
                Ok(CommandOutcome::Cancelled { gid })
            }
            Command::Clean => Ok(CommandOutcome::Evicted(
                retention::delete_oldest(&self.config.save_dir).await?,
            )),
            Command::Ip => Ok(CommandOutcome::Ip(self.ip_lookup.lookup().await?)),
            Command::Time => Ok(CommandOutcome::Time(server_time())),
            Command::Unknown(verb) => Ok(CommandOutcome::Unknown { verb }),
        }
    }

    async fn start(&self, sender_id: &str) -> Result<CommandOutcome, RtdlError> {
        let used_space = storage::directory_size(&self.config.save_dir).await;
        Ok(CommandOutcome::Start(BotInfo {
            name: BOT_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: BOT_DESCRIPTION.to_string(),
            project_url: PROJECT_URL.to_string(),
            user_tag: sender_id.chars().take(USER_TAG_LEN).collect(),
            used_space,
            save_dir: self.config.save_dir.clone(),
            webdav_port: self.config.webdav_port,
            status_port: self.config.status_port,
        }))
    }

    async fn download(&self, sender_id: &str, input: &str) -> Result<CommandOutcome, RtdlError> {
        let (reference_kind, reference) = extract_reference(input)?;
        let gid = self.engine.add_job(&owner_hash(sender_id), &reference).await?;
        info!(gid = %gid, "Download started");
        Ok(CommandOutcome::DownloadStarted {
            gid,
            reference_kind,
            reference,
        })
    }
}

fn require_gid(gid: &str) -> Result<(), RtdlError> {
    if gid.is_empty() {
        return Err(RtdlError::MissingArgument("Download id missing.".to_string()));
    }
    Ok(())
}

fn server_time() -> ServerTime {
    let now = Utc::now();
    ServerTime {
        timestamp_ms: now.timestamp_millis(),
        iso: now.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        human: now.with_timezone(&Local).format("%a %b %d %Y %H:%M:%S %z").to_string(),
    }
}
