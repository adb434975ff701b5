//! In-memory download engine for unit tests

use crate::engine::DownloadEngine;
use crate::error::RtdlError;
use async_trait::async_trait;
use parking_lot::Mutex;
use rtdl_types::{GlobalStats, JobState, JobStatus};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Default)]
struct State {
    jobs: HashMap<String, JobStatus>,
    added: Vec<(String, String)>,
    gids: Vec<String>,
}

pub struct MockEngine {
    state: Mutex<State>,
    calls: AtomicUsize,
    available: AtomicBool,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            calls: AtomicUsize::new(0),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of engine calls made so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `(owner_hash, reference)` of every submitted job
    pub fn added_jobs(&self) -> Vec<(String, String)> {
        self.state.lock().added.clone()
    }

    pub fn added_gids(&self) -> Vec<String> {
        self.state.lock().gids.clone()
    }

    fn enter(&self) -> Result<(), RtdlError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RtdlError::EngineUnavailable("connection refused".to_string()))
        }
    }
}

#[async_trait]
impl DownloadEngine for MockEngine {
    async fn add_job(&self, owner_hash: &str, reference: &str) -> Result<String, RtdlError> {
        self.enter()?;
        let mut state = self.state.lock();
        let gid = format!("{:016x}", state.gids.len() + 1);
        state.added.push((owner_hash.to_string(), reference.to_string()));
        state.gids.push(gid.clone());
        state.jobs.insert(
            gid.clone(),
            JobStatus {
                gid: gid.clone(),
                status: JobState::Active,
                completed_length: 0,
                total_length: 0,
                download_speed: 0,
                upload_speed: 0,
                files: Vec::new(),
                name: None,
            },
        );
        Ok(gid)
    }

    async fn job_status(&self, gid: &str) -> Result<JobStatus, RtdlError> {
        self.enter()?;
        self.state
            .lock()
            .jobs
            .get(gid)
            .cloned()
            .ok_or_else(|| RtdlError::NotFound(gid.to_string()))
    }

    async fn active_jobs(&self) -> Result<Vec<JobStatus>, RtdlError> {
        self.enter()?;
        Ok(self.state.lock().jobs.values().cloned().collect())
    }

    async fn cancel_job(&self, gid: &str) -> Result<(), RtdlError> {
        self.enter()?;
        self.state
            .lock()
            .jobs
            .remove(gid)
            .map(|_| ())
            .ok_or_else(|| RtdlError::NotFound(gid.to_string()))
    }

    async fn global_stats(&self) -> Result<GlobalStats, RtdlError> {
        self.enter()?;
        let active = self.state.lock().jobs.len() as u64;
        Ok(GlobalStats {
            num_active: active,
            ..GlobalStats::default()
        })
    }
}
