//! RTDL - Remote Torrent Downloader
//!
//! Runs the command gateway: a Telegram bot, a Nostr DM listener, the
//! storage retention daemon and a read-only status dashboard, all on one
//! tokio runtime.

mod nostr_dm;
mod status_page;
mod telegram;

use anyhow::{Context, Result};
use clap::Parser;
use rtdl_core::{
    default_save_dir, Aria2Client, AuthSecret, CommandRouter, Gateway, GatewayConfig,
    RetentionConfig, RetentionDaemon, RetentionPolicy, DEFAULT_AUTO_CLEAN_DAYS, DEFAULT_IP_API_URL,
    DEFAULT_RPC_URL, DEFAULT_WEBDAV_PORT,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Public relays used when none are configured
const DEFAULT_RELAYS: &[&str] = &[
    "wss://relay.damus.io",
    "wss://nos.lol",
    "wss://relay.snort.social",
    "wss://nostr-pub.wellorder.net",
    "wss://nostr.oxtr.dev",
    "wss://relay.nostr.band",
    "wss://nostr.wine",
    "wss://relay.primal.net",
    "wss://nostr.mom",
];

/// RTDL - control a download engine over Telegram and Nostr
#[derive(Parser, Debug)]
#[command(name = "rtdl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Shared secret users must send to gain access (generated if unset or too short)
    #[arg(long, env = "AUTHCODE", hide_env_values = true)]
    auth_code: Option<String>,

    /// Telegram bot token; the Telegram bot is disabled without one
    #[arg(long, env = "TELEGRAMBOT", hide_env_values = true)]
    telegram_token: Option<String>,

    /// Nostr secret key (nsec or hex); a new one is generated if unset
    #[arg(long, env = "NSEC", hide_env_values = true)]
    nsec: Option<String>,

    /// Nostr relays to listen on
    #[arg(long, env = "NOSTR_RELAYS", value_delimiter = ',')]
    relays: Vec<String>,

    /// Do not start the Nostr listener
    #[arg(long, env = "NOSTR_DISABLED")]
    no_nostr: bool,

    /// Root directory downloads are stored under
    #[arg(long, env = "SAVE_DIR")]
    save_dir: Option<PathBuf>,

    /// aria2 JSON-RPC endpoint
    #[arg(long, env = "ARIA2_RPC_URL", default_value = DEFAULT_RPC_URL)]
    aria2_url: String,

    /// aria2 RPC secret token
    #[arg(long, env = "ARIA2_SECRET", hide_env_values = true)]
    aria2_secret: Option<String>,

    /// Delete stored files older than this many days
    #[arg(
        long,
        env = "AUTO_CLEAN_DAYS",
        default_value_t = DEFAULT_AUTO_CLEAN_DAYS,
        value_parser = clap::value_parser!(u64).range(1..=36500)
    )]
    auto_clean_days: u64,

    /// Hours between automatic cleanups
    #[arg(long, env = "AUTO_CLEAN_INTERVAL_HOURS", default_value_t = 10)]
    auto_clean_interval_hours: u64,

    /// Address of the read-only status page
    #[arg(long, env = "STATUS_ADDR", default_value = "127.0.0.1:6798")]
    status_addr: SocketAddr,

    /// WebDAV port reported to users
    #[arg(long, env = "WEBDAV_PORT", default_value_t = DEFAULT_WEBDAV_PORT)]
    webdav_port: u16,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();
}

/// Configured bot token, ignoring a blank value
fn telegram_token(cli: &Cli) -> Option<&str> {
    cli.telegram_token.as_deref().map(str::trim).filter(|t| !t.is_empty())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    info!("Starting Remote-Torrent-Downloader v{}", env!("CARGO_PKG_VERSION"));

    let save_dir = cli.save_dir.clone().unwrap_or_else(default_save_dir);
    tokio::fs::create_dir_all(&save_dir)
        .await
        .with_context(|| format!("Failed to create save directory {}", save_dir.display()))?;

    let secret = AuthSecret::from_supplied_or_random(cli.auth_code.as_deref());
    if cli.auth_code.as_deref() != Some(secret.as_str()) {
        warn!("No usable AUTHCODE configured; generated auth code: {}", secret.as_str());
    }

    let engine = Arc::new(
        Aria2Client::new(cli.aria2_url.clone(), cli.aria2_secret.clone(), save_dir.clone())
            .context("Failed to build aria2 client")?,
    );
    if !engine.is_healthy().await {
        warn!("aria2 is not reachable at {}; commands will fail until it is", cli.aria2_url);
    }

    let config = GatewayConfig {
        save_dir: save_dir.clone(),
        webdav_port: cli.webdav_port,
        status_port: cli.status_addr.port(),
        ip_api_url: DEFAULT_IP_API_URL.to_string(),
    };
    let router = CommandRouter::new(engine.clone(), config).context("Failed to build command router")?;
    let gateway = Arc::new(Gateway::new(secret, router));

    let shutdown = CancellationToken::new();
    let mut tasks = Vec::new();

    // Telegram
    let bot_token = telegram_token(&cli);
    let mut telegram_username = None;
    match bot_token {
        Some(token) => {
            let adapter = telegram::TelegramAdapter::new(token, gateway.clone())
                .context("Failed to build Telegram client")?;
            telegram_username = adapter.fetch_username().await;
            tasks.push(tokio::spawn(adapter.run(shutdown.child_token())));
        }
        None => info!("Telegram bot disabled (no TELEGRAMBOT token)"),
    }

    // Nostr
    let mut nostr_identity = None;
    if cli.no_nostr {
        info!("Nostr listener disabled");
    } else {
        let identity = nostr_dm::NostrIdentity::load_or_generate(cli.nsec.as_deref())?;
        let relays: Vec<String> = if cli.relays.is_empty() {
            DEFAULT_RELAYS.iter().map(|r| r.to_string()).collect()
        } else {
            cli.relays.clone()
        };
        let adapter = nostr_dm::NostrAdapter::connect(&identity, &relays, gateway.clone()).await;
        tasks.push(tokio::spawn(adapter.run(shutdown.child_token())));
        nostr_identity = Some(identity);
    }

    // Retention
    let retention = RetentionConfig {
        interval: Duration::from_secs(cli.auto_clean_interval_hours.max(1) * 60 * 60),
        ..RetentionConfig::new(RetentionPolicy::new(save_dir.clone(), cli.auto_clean_days))
    };
    let retention_daemon = RetentionDaemon::start(retention.clone());

    // Status page
    let status_state = Arc::new(status_page::StatusState {
        gateway: gateway.clone(),
        engine: engine.clone(),
        save_dir,
        telegram_username,
        telegram_enabled: bot_token.is_some(),
        nostr: nostr_identity.map(|id| status_page::NostrInfo {
            npub: id.npub,
            pubkey_hex: id.pubkey_hex,
        }),
        retention,
    });
    let listener = tokio::net::TcpListener::bind(cli.status_addr)
        .await
        .with_context(|| format!("Failed to bind status page on {}", cli.status_addr))?;
    tasks.push(tokio::spawn(status_page::serve(
        listener,
        status_state,
        shutdown.child_token(),
    )));

    info!("Bot is ready!");

    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
    info!("Shutting down...");

    shutdown.cancel();
    retention_daemon.stop().await;
    for task in tasks {
        if let Err(e) = task.await {
            warn!("Task ended abnormally: {}", e);
        }
    }

    info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_telegram_token_disables_bot() {
        let cli = Cli::parse_from(["rtdl", "--telegram-token", "   "]);
        assert_eq!(telegram_token(&cli), None);

        let cli = Cli::parse_from(["rtdl", "--telegram-token", " 123:abc "]);
        assert_eq!(telegram_token(&cli), Some("123:abc"));
    }

    #[test]
    fn test_auto_clean_days_is_bounded() {
        assert!(Cli::try_parse_from(["rtdl", "--auto-clean-days", "18446744073709551615"]).is_err());
        assert!(Cli::try_parse_from(["rtdl", "--auto-clean-days", "0"]).is_err());
        let cli = Cli::try_parse_from(["rtdl", "--auto-clean-days", "7"]).unwrap();
        assert_eq!(cli.auto_clean_days, 7);
    }
}
