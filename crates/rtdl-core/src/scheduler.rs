//! Retention Scheduler - runs the age-based sweep on a timer
//!
//! Runs a background task that waits an initial delay, then sweeps the
//! storage root every interval until it is stopped or the process exits.

use crate::retention::{self, RetentionPolicy};
use rtdl_types::{SweepOutcome, SweepReport};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Timing of the periodic sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionConfig {
    pub policy: RetentionPolicy,
    /// Delay before the first sweep after startup
    pub initial_delay: Duration,
    pub interval: Duration,
}

impl RetentionConfig {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            policy,
            initial_delay: Duration::from_secs(60),
            interval: Duration::from_secs(10 * 60 * 60),
        }
    }
}

/// Handle to the periodic sweep task
pub struct RetentionDaemon {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RetentionDaemon {
    /// Start the sweep background task
    pub fn start(config: RetentionConfig) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        info!(
            "Automatic cleanup scheduled every {:.1} hours for files older than {} days",
            config.interval.as_secs_f64() / 3600.0,
            config.policy.age_threshold_days
        );

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + config.initial_delay, config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        info!("Retention scheduler stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        run_sweep(&config.policy).await;
                    }
                }
            }
        });

        Self { cancel, handle }
    }

    /// Stop the scheduler and wait for an in-flight sweep to finish
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            error!("Retention task ended abnormally: {}", e);
        }
    }
}

/// One sweep; failures are logged, never propagated
pub async fn run_sweep(policy: &RetentionPolicy) -> Option<SweepReport> {
    info!(
        "Running automatic cleanup (files older than {} days)...",
        policy.age_threshold_days
    );

    // Isolate the sweep so a panic inside it cannot take the timer loop down
    let owned = policy.clone();
    let result = tokio::spawn(async move { retention::auto_clean(&owned).await }).await;

    match result {
        Ok(Ok(report)) => {
            info!("{}", describe_sweep(&report));
            Some(report)
        }
        Ok(Err(e)) => {
            error!("Auto-cleanup error: {}", e);
            None
        }
        Err(e) => {
            error!("Auto-cleanup task failed: {}", e);
            None
        }
    }
}

/// One-line log summary of a sweep
pub fn describe_sweep(report: &SweepReport) -> String {
    match report.outcome {
        SweepOutcome::NoFiles => "No files found to auto-clean.".to_string(),
        SweepOutcome::NothingOldEnough => {
            format!("No files older than {} days found.", report.threshold_days)
        }
        SweepOutcome::Cleaned => format!(
            "Auto-clean completed: deleted {} files older than {} days, freed {}, {} failed, {} folders pruned",
            report.deleted_count,
            report.threshold_days,
            crate::format::format_bytes(report.bytes_freed),
            report.failed_count,
            report.pruned_dirs
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;
    use std::time::SystemTime;

    #[tokio::test]
    async fn test_daemon_sweeps_then_stops() {
        let tmp = tempfile::tempdir().unwrap();
        let old = tmp.path().join("user/20200101/old.bin");
        stdfs::create_dir_all(old.parent().unwrap()).unwrap();
        stdfs::write(&old, b"data").unwrap();
        stdfs::File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(90 * 86_400))
            .unwrap();

        let config = RetentionConfig {
            policy: RetentionPolicy::new(tmp.path(), 30),
            initial_delay: Duration::from_millis(10),
            interval: Duration::from_secs(3600),
        };
        let daemon = RetentionDaemon::start(config);

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while old.exists() && std::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        daemon.stop().await;

        assert!(!old.exists());
        assert!(!tmp.path().join("user").exists());
        assert!(tmp.path().exists());
    }

    #[tokio::test]
    async fn test_run_sweep_reports_nothing_to_do() {
        let tmp = tempfile::tempdir().unwrap();
        let report = run_sweep(&RetentionPolicy::new(tmp.path(), 30)).await.unwrap();
        assert_eq!(report.outcome, SweepOutcome::NoFiles);
        assert_eq!(describe_sweep(&report), "No files found to auto-clean.");
    }
}
