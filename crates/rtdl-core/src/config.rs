//! Gateway settings

use crate::netinfo::DEFAULT_IP_API_URL;
use std::path::PathBuf;

pub const DEFAULT_WEBDAV_PORT: u16 = 6799;
pub const DEFAULT_STATUS_PORT: u16 = 6798;
pub const DEFAULT_AUTO_CLEAN_DAYS: u64 = 30;

/// Default storage root: `<tmp>/streambox`
pub fn default_save_dir() -> PathBuf {
    std::env::temp_dir().join("streambox")
}

/// Settings the command handlers report or act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Root directory the engine downloads into
    pub save_dir: PathBuf,
    pub webdav_port: u16,
    pub status_port: u16,
    pub ip_api_url: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            save_dir: default_save_dir(),
            webdav_port: DEFAULT_WEBDAV_PORT,
            status_port: DEFAULT_STATUS_PORT,
            ip_api_url: DEFAULT_IP_API_URL.to_string(),
        }
    }
}
