//! Reply formatting
//!
//! Turns structured command results into the chat text sent back over a
//! transport. Pure presentation: nothing here touches the engine or disk.

use rtdl_types::{CommandOutcome, CommandResponse, JobState, ReferenceKind};
use std::fmt::Write as _;

pub const AUTH_REQUIRED: &str = "🔐 Authorization required.\n\nPlease send the auth code to gain access.\n\nContact the bot owner for the code.";
pub const ACCESS_GRANTED: &str = "🔓 Access granted! You are now authorized.\n\nSend /help to see available commands.";
pub const GENERIC_FAILURE: &str = "An error occurred. Please try again later.";

/// Jobs listed in full by `downloading` before the remainder is summarized
const MAX_LISTED_JOBS: usize = 5;

/// Format bytes as human-readable
pub fn format_bytes(bytes: u64) -> String {
    human_bytes::human_bytes(bytes as f64)
}

/// Format speed as human-readable
pub fn format_speed(bytes_per_sec: u64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec))
}

/// Shorten an identifier for display: `abcdef...wxyz`
pub fn short(id: &str) -> String {
    const HEAD: usize = 6;
    const TAIL: usize = 4;
    let chars: Vec<char> = id.chars().collect();
    if chars.len() <= HEAD + TAIL + 3 {
        return id.to_string();
    }
    let head: String = chars[..HEAD].iter().collect();
    let tail: String = chars[chars.len() - TAIL..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Render a command result as reply text
pub fn render(response: &CommandResponse) -> String {
    if !response.success {
        let error = response.error.as_deref().unwrap_or("Unknown error");
        return format!("❌ Error: {}", error);
    }
    match &response.data {
        Some(outcome) => render_outcome(outcome),
        None => "No result returned from command.".to_string(),
    }
}

fn render_outcome(outcome: &CommandOutcome) -> String {
    let mut msg = String::new();

    match outcome {
        CommandOutcome::Help { commands } => {
            msg.push_str("🤖 Available Commands\n\n");
            for c in commands {
                let _ = writeln!(msg, "/{} - {}", c.command, c.description);
            }
        }
        CommandOutcome::Start(info) => {
            let _ = write!(
                msg,
                "🤖 {}\nVersion: {}\n\n{}\n\n📊 Status\nUser ID: {}\nUsed Space: {}\nWebDAV Port: {}\nStatus Page Port: {}\n\nGitHub: {}\n\nSend /help for commands.",
                info.name,
                info.version,
                info.description,
                info.user_tag,
                format_bytes(info.used_space),
                info.webdav_port,
                info.status_port,
                info.project_url
            );
        }
        CommandOutcome::Stats(stats) => {
            let _ = write!(
                msg,
                "📊 Global Statistics\n\n🔽 Download: {}\n🔼 Upload: {}\n📦 Active: {}\n⏳ Waiting: {}\n🛑 Stopped: {}",
                format_speed(stats.download_speed),
                format_speed(stats.upload_speed),
                stats.num_active,
                stats.num_waiting,
                stats.num_stopped
            );
        }
        CommandOutcome::DownloadStarted {
            gid,
            reference_kind,
            ..
        } => {
            let icon = match reference_kind {
                ReferenceKind::Magnet => "🧲",
                ReferenceKind::Url => "🔗",
            };
            let _ = write!(
                msg,
                "{} Download started\n\nTrack: /status_{}\nSee all: /downloading",
                icon, gid
            );
        }
        CommandOutcome::Status(job) => {
            let _ = writeln!(
                msg,
                "📊 Download Status\n\nName: {}\nStatus: {}\nProgress: {:.2} MB / {:.2} MB ({:.1}%)\nSpeed: {}",
                job.display_name(),
                job.status,
                job.completed_mb(),
                job.total_mb(),
                job.progress(),
                format_speed(job.download_speed)
            );
            if job.status == JobState::Active {
                let _ = write!(msg, "\nCancel: /cancel_{}", job.gid);
            }
        }
        CommandOutcome::Downloading { jobs } => {
            if jobs.is_empty() {
                msg.push_str("No ongoing downloads.");
            } else {
                msg.push_str("📥 Ongoing Downloads\n\n");
                for job in jobs.iter().take(MAX_LISTED_JOBS) {
                    let _ = write!(
                        msg,
                        "🆔 /status_{}\n📊 {} - {:.1}%\n💾 {:.2}/{:.2} MB\n\n",
                        job.gid,
                        job.status,
                        job.progress(),
                        job.completed_mb(),
                        job.total_mb()
                    );
                }
                if jobs.len() > MAX_LISTED_JOBS {
                    let _ = write!(msg, "... and {} more", jobs.len() - MAX_LISTED_JOBS);
                }
            }
        }
        CommandOutcome::Cancelled { gid } => {
            let _ = write!(msg, "❌ Download {} canceled", gid);
        }
        CommandOutcome::Evicted(report) => {
            let _ = write!(
                msg,
                "🗑️ Deleted: {} ({})",
                report.file_name(),
                format_bytes(report.size_bytes)
            );
        }
        CommandOutcome::Ip(ip) => {
            let _ = write!(
                msg,
                "🌐 Server IP Info\n\nIP: {}\nCountry: {}\nRegion: {}\nCity: {}\nISP: {}",
                ip.query, ip.country, ip.region_name, ip.city, ip.isp
            );
        }
        CommandOutcome::Time(time) => {
            let _ = write!(msg, "⏰ Server Time\n\n{}\n{}", time.iso, time.human);
        }
        CommandOutcome::Unknown { verb } => {
            let _ = write!(
                msg,
                "Unknown command: {}\n\nSend /help for available commands.",
                verb
            );
        }
    }

    msg.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtdl_types::{JobStatus, HelpEntry};

    fn job(gid: &str, status: JobState) -> JobStatus {
        JobStatus {
            gid: gid.to_string(),
            status,
            completed_length: 1024 * 1024,
            total_length: 4 * 1024 * 1024,
            download_speed: 0,
            upload_speed: 0,
            files: Vec::new(),
            name: None,
        }
    }

    #[test]
    fn test_short() {
        assert_eq!(short("abc"), "abc");
        assert_eq!(
            short("79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"),
            "79be66...1798"
        );
    }

    #[test]
    fn test_byte_units_are_binary() {
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_speed(3 * 512), "1.5 KiB/s");
    }

    #[test]
    fn test_render_failure() {
        let text = render(&CommandResponse::failed("status", "Download not found: abc"));
        assert_eq!(text, "❌ Error: Download not found: abc");
    }

    #[test]
    fn test_render_help_lists_commands() {
        let text = render(&CommandResponse::ok(CommandOutcome::Help {
            commands: vec![HelpEntry {
                command: "stats".into(),
                description: "Show global download stats".into(),
            }],
        }));
        assert!(text.contains("/stats - Show global download stats"));
    }

    #[test]
    fn test_render_status_offers_cancel_only_when_active() {
        let active = render(&CommandResponse::ok(CommandOutcome::Status(job("g1", JobState::Active))));
        assert!(active.contains("Progress: 1.00 MB / 4.00 MB (25.0%)"));
        assert!(active.contains("/cancel_g1"));

        let done = render(&CommandResponse::ok(CommandOutcome::Status(job("g2", JobState::Complete))));
        assert!(!done.contains("/cancel_"));
    }

    #[test]
    fn test_render_downloading_truncates() {
        let jobs = (0..7).map(|i| job(&format!("g{i}"), JobState::Active)).collect();
        let text = render(&CommandResponse::ok(CommandOutcome::Downloading { jobs }));
        assert!(text.contains("/status_g4"));
        assert!(!text.contains("/status_g5"));
        assert!(text.ends_with("... and 2 more"));

        let empty = render(&CommandResponse::ok(CommandOutcome::Downloading { jobs: Vec::new() }));
        assert_eq!(empty, "No ongoing downloads.");
    }

    #[test]
    fn test_render_download_started() {
        let text = render(&CommandResponse::ok(CommandOutcome::DownloadStarted {
            gid: "abc".into(),
            reference_kind: ReferenceKind::Magnet,
            reference: "magnet:?xt=urn:btih:ABCD".into(),
        }));
        assert!(text.starts_with("🧲 Download started"));
        assert!(text.contains("/status_abc"));
    }
}
