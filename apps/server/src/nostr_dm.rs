//! Nostr transport
//!
//! Listens for NIP-04 encrypted direct messages addressed to the bot key and
//! answers in kind. Relays redeliver the same event from several connections,
//! so every message carries its event id for the gateway's dedup cache.

use anyhow::{Context, Result};
use async_trait::async_trait;
use nostr_sdk::prelude::*;
use rtdl_core::{short, Gateway, InboundMessage, ReplySink, RtdlError};
use rtdl_types::TransportKind;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Bot key pair plus its display forms
pub struct NostrIdentity {
    pub keys: Keys,
    pub npub: String,
    pub pubkey_hex: String,
}

impl NostrIdentity {
    /// Parse `nsec` (bech32 or hex), or generate a fresh key pair
    pub fn load_or_generate(nsec: Option<&str>) -> Result<Self> {
        let supplied = nsec.map(str::trim).filter(|s| !s.is_empty());
        let keys = match supplied {
            Some(s) => Keys::parse(s).context("Invalid NSEC: expected nsec1... or 64-char hex")?,
            None => {
                let keys = Keys::generate();
                warn!(
                    "No NSEC configured; generated a new Nostr key. Set NSEC={} to keep this identity",
                    keys.secret_key().to_bech32().unwrap_or_default()
                );
                keys
            }
        };

        let public_key = keys.public_key();
        let npub = public_key.to_bech32().context("Failed to encode npub")?;
        info!("Nostr bot npub: {}", npub);

        Ok(Self {
            pubkey_hex: public_key.to_hex(),
            npub,
            keys,
        })
    }
}

/// Encrypts and publishes a reply to one sender
struct DirectReply {
    client: Client,
    keys: Keys,
    recipient: PublicKey,
}

#[async_trait]
impl ReplySink for DirectReply {
    async fn reply(&self, text: &str) -> Result<(), RtdlError> {
        let encrypted = nip04::encrypt(self.keys.secret_key(), &self.recipient, text)
            .map_err(|e| RtdlError::Network(format!("NIP-04 encryption failed: {}", e)))?;
        let builder = EventBuilder::new(Kind::EncryptedDirectMessage, encrypted)
            .tag(Tag::public_key(self.recipient));
        let output = self
            .client
            .send_event_builder(builder)
            .await
            .map_err(|e| RtdlError::Network(e.to_string()))?;
        debug!(
            "Reply {} accepted by {} relay(s)",
            short(&output.val.to_hex()),
            output.success.len()
        );
        Ok(())
    }
}

/// Feeds Nostr DMs into the gateway
pub struct NostrAdapter {
    client: Client,
    keys: Keys,
    gateway: Arc<Gateway>,
}

impl NostrAdapter {
    /// Create the client and connect to every relay that accepts us
    ///
    /// Relays that fail to register are logged and skipped.
    pub async fn connect(identity: &NostrIdentity, relays: &[String], gateway: Arc<Gateway>) -> Self {
        let client = Client::new(identity.keys.clone());
        let mut added = 0usize;
        for relay in relays {
            match client.add_relay(relay.as_str()).await {
                Ok(_) => added += 1,
                Err(e) => warn!("Failed to add relay {}: {}", relay, e),
            }
        }
        client.connect().await;
        info!("Connected to {} Nostr relay(s)", added);

        Self {
            client,
            keys: identity.keys.clone(),
            gateway,
        }
    }

    /// Receive DMs until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) {
        let filter = Filter::new()
            .kind(Kind::EncryptedDirectMessage)
            .pubkey(self.keys.public_key())
            .since(Timestamp::now());

        if let Err(e) = self.client.subscribe(filter, None).await {
            error!("Failed to subscribe to direct messages: {}", e);
            self.client.shutdown().await;
            return;
        }
        info!("Nostr bot listening for direct messages");

        let mut notifications = self.client.notifications();
        loop {
            let notification = tokio::select! {
                _ = cancel.cancelled() => break,
                n = notifications.recv() => n,
            };

            match notification {
                Ok(RelayPoolNotification::Event { event, .. }) => self.dispatch(*event),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!("Dropped {} relay notifications", skipped),
                Err(RecvError::Closed) => break,
            }
        }

        self.client.unsubscribe_all().await;
        self.client.shutdown().await;
        info!("Nostr bot stopped");
    }

    fn dispatch(&self, event: Event) {
        if event.kind != Kind::EncryptedDirectMessage || event.pubkey == self.keys.public_key() {
            return;
        }

        let text = match nip04::decrypt(self.keys.secret_key(), &event.pubkey, &event.content) {
            Ok(text) => text,
            Err(e) => {
                debug!("Could not decrypt event {}: {}", short(&event.id.to_hex()), e);
                return;
            }
        };

        let inbound = InboundMessage::new(TransportKind::Nostr, event.pubkey.to_hex(), text)
            .with_event_id(event.id.to_hex());
        let sink = Arc::new(DirectReply {
            client: self.client.clone(),
            keys: self.keys.clone(),
            recipient: event.pubkey,
        });
        tokio::spawn(self.gateway.clone().serve(inbound, sink));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_from_hex_and_bech32_agree() {
        let keys = Keys::generate();
        let hex = keys.secret_key().to_secret_hex();
        let nsec = keys.secret_key().to_bech32().unwrap();

        let a = NostrIdentity::load_or_generate(Some(&hex)).unwrap();
        let b = NostrIdentity::load_or_generate(Some(&format!("  {nsec} "))).unwrap();
        assert_eq!(a.pubkey_hex, keys.public_key().to_hex());
        assert_eq!(a.npub, b.npub);
        assert!(a.npub.starts_with("npub1"));
    }

    #[test]
    fn test_blank_nsec_generates_key() {
        let a = NostrIdentity::load_or_generate(Some("   ")).unwrap();
        let b = NostrIdentity::load_or_generate(None).unwrap();
        assert_ne!(a.pubkey_hex, b.pubkey_hex);
    }

    #[test]
    fn test_invalid_nsec_is_rejected() {
        assert!(NostrIdentity::load_or_generate(Some("nsec1notakey")).is_err());
    }

    #[test]
    fn test_dm_round_trip_between_keys() {
        let bot = Keys::generate();
        let user = Keys::generate();
        let encrypted = nip04::encrypt(user.secret_key(), &bot.public_key(), "status_abc").unwrap();
        let plain = nip04::decrypt(bot.secret_key(), &user.public_key(), &encrypted).unwrap();
        assert_eq!(plain, "status_abc");
    }
}
