//! Inbound message handling shared by every transport
//!
//! Adapters normalize platform messages into [`InboundMessage`] and hand them
//! to the [`Gateway`] together with a [`ReplySink`] for their platform. The
//! gateway suppresses redelivered Nostr events, enforces the shared secret and
//! only then parses the text as a command.

use crate::auth::{AuthSecret, Authorizer};
use crate::command::Command;
use crate::dedup::EventDedupCache;
use crate::error::RtdlError;
use crate::format::{self, short, ACCESS_GRANTED, AUTH_REQUIRED, GENERIC_FAILURE};
use crate::router::CommandRouter;
use async_trait::async_trait;
use rtdl_types::TransportKind;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A message received on any transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub transport: TransportKind,
    /// Chat id (Telegram) or hex public key (Nostr)
    pub sender_id: String,
    pub text: String,
    /// Transport event id, used for redelivery suppression on Nostr
    pub event_id: Option<String>,
}

impl InboundMessage {
    pub fn new(transport: TransportKind, sender_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            transport,
            sender_id: sender_id.into(),
            text: text.into(),
            event_id: None,
        }
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }
}

/// Sends reply text back to the sender of an inbound message
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn reply(&self, text: &str) -> Result<(), RtdlError>;
}

/// Process-wide gateway state: authorization, dedup and routing
pub struct Gateway {
    authorizer: Authorizer,
    dedup: EventDedupCache,
    router: CommandRouter,
}

impl Gateway {
    pub fn new(secret: AuthSecret, router: CommandRouter) -> Self {
        Self {
            authorizer: Authorizer::new(secret),
            dedup: EventDedupCache::new(),
            router,
        }
    }

    pub fn authorizer(&self) -> &Authorizer {
        &self.authorizer
    }

    pub fn dedup(&self) -> &EventDedupCache {
        &self.dedup
    }

    pub fn router(&self) -> &CommandRouter {
        &self.router
    }

    /// Compute the reply for `msg`; `None` means the message is dropped
    pub async fn handle(&self, msg: &InboundMessage) -> Option<String> {
        if msg.transport == TransportKind::Nostr {
            if let Some(event_id) = &msg.event_id {
                if !self.dedup.check_and_mark(event_id) {
                    debug!("Skipping duplicate event {}...", short(event_id));
                    return None;
                }
            }
        }

        let text = msg.text.trim();
        let sender = short(&msg.sender_id);

        if let Err(e) = self.authorizer.require(msg.transport, &msg.sender_id) {
            if self.authorizer.try_authorize(msg.transport, &msg.sender_id, text) {
                info!(transport = %msg.transport, "User {} authorized", sender);
                return Some(ACCESS_GRANTED.to_string());
            }
            debug!(transport = %msg.transport, "{} from {}", e, sender);
            return Some(AUTH_REQUIRED.to_string());
        }

        info!(transport = %msg.transport, "{}: {}", sender, text);
        let command = Command::parse(text);
        let response = self.router.execute(command, &msg.sender_id).await;
        Some(format::render(&response))
    }

    /// Handle `msg` in its own task and deliver the reply through `sink`
    ///
    /// A panic while handling turns into a generic apology instead of
    /// tearing down the adapter.
    pub async fn serve(self: Arc<Self>, msg: InboundMessage, sink: Arc<dyn ReplySink>) {
        let transport = msg.transport;
        let gateway = Arc::clone(&self);
        let reply = match tokio::spawn(async move { gateway.handle(&msg).await }).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(transport = %transport, "Error in message handler: {}", e);
                Some(GENERIC_FAILURE.to_string())
            }
        };

        if let Some(text) = reply {
            if let Err(e) = sink.reply(&text).await {
                warn!(transport = %transport, "Failed to send reply: {}", e);
            }
        }
    }
}
