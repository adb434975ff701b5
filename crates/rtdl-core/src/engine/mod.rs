//! Download engine proxy
//!
//! The gateway never transfers data itself. Every job operation is a call to
//! an external engine daemon; job state is re-queried on every request and
//! never cached here.

mod aria2;

pub use aria2::*;

use crate::error::RtdlError;
use async_trait::async_trait;
use rtdl_types::{GlobalStats, JobStatus};

/// Operations the command handlers need from the download engine
#[async_trait]
pub trait DownloadEngine: Send + Sync {
    /// Submit `reference` on behalf of `owner_hash`, returning the new gid
    async fn add_job(&self, owner_hash: &str, reference: &str) -> Result<String, RtdlError>;

    /// Live status of `gid`; `NotFound` when the engine does not know it
    async fn job_status(&self, gid: &str) -> Result<JobStatus, RtdlError>;

    /// Every job currently transferring
    async fn active_jobs(&self) -> Result<Vec<JobStatus>, RtdlError>;

    /// Remove `gid`; unknown and already finished jobs both yield `NotFound`
    async fn cancel_job(&self, gid: &str) -> Result<(), RtdlError>;

    async fn global_stats(&self) -> Result<GlobalStats, RtdlError>;
}
