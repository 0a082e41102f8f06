//! Notification bus.
//!
//! # Data Flow
//! ```text
//! orchestrator ── request("reload.<project>[.<field>]") ──→ bus
//!     bus ── Notification { subject, reply } ──→ subscriber stream
//!     subscriber ── publish(reply, "ok" | error text) ──→ orchestrator
//! ```
//!
//! # Design Decisions
//! - Subscriptions are plain streams; dropping the stream unsubscribes
//! - NATS in production, an in-process bus with the same subject rules for
//!   tests and embedding

pub mod memory;
pub mod nats;
pub mod subject;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use thiserror::Error;

pub use memory::MemoryBus;
pub use nats::NatsBus;

/// One delivered message.
#[derive(Debug, Clone)]
pub struct Notification {
    /// The concrete subject the message was published on.
    pub subject: String,
    /// Where the sender waits for an answer, if it does.
    pub reply: Option<String>,
    pub payload: Bytes,
}

/// Messages delivered to one subscription.
pub type NotificationStream = BoxStream<'static, Notification>;

/// Errors from the bus.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("failed to subscribe to {subject}: {reason}")]
    Subscribe { subject: String, reason: String },

    #[error("failed to publish to {subject}: {reason}")]
    Publish { subject: String, reason: String },

    #[error("request to {subject} failed: {reason}")]
    Request { subject: String, reason: String },

    #[error("no reply on {subject} within {timeout:?}")]
    Timeout { subject: String, timeout: Duration },
}

/// Publish/subscribe with request/reply.
#[async_trait]
pub trait NotificationBus: Send + Sync {
    /// Subscribe to `subject`, which may contain `*` / `>` wildcards.
    async fn subscribe(&self, subject: &str) -> Result<NotificationStream, BusError>;

    /// Fire-and-forget publish.
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BusError>;

    /// Publish with a private reply subject and wait for the first answer.
    async fn request(&self, subject: &str, payload: Bytes, timeout: Duration) -> Result<Bytes, BusError>;
}
