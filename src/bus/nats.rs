//! NATS-backed bus.
//!
//! # Responsibilities
//! - Connect with an optional connection name and reconnect logging
//! - Map NATS messages to `Notification`
//! - Bound requests with a deadline
//!
//! # Design Decisions
//! - The client reconnects on its own; disconnects are only logged
//! - Subscriptions unsubscribe when their stream is dropped

use std::time::Duration;

use async_nats::{Client, ConnectOptions, Event};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;

use crate::bus::{BusError, Notification, NotificationBus, NotificationStream};
use crate::resilience::timeouts::with_deadline;

/// Shared handle to a NATS connection. Cheap to clone.
#[derive(Clone)]
pub struct NatsBus {
    client: Client,
}

impl NatsBus {
    /// Connect to `url`, giving up after `timeout`.
    pub async fn connect(url: &str, name: Option<&str>, timeout: Duration) -> Result<Self, BusError> {
        let mut options = ConnectOptions::new().event_callback(|event| async move {
            match event {
                Event::Connected => tracing::info!("NATS connected"),
                Event::Disconnected => tracing::warn!("NATS disconnected"),
                other => tracing::warn!(event = %other, "NATS event"),
            }
        });
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            options = options.name(name);
        }

        tracing::debug!(url = %url, "Connecting to NATS");
        let connect_error = |reason: String| BusError::Connect {
            url: url.to_string(),
            reason,
        };
        let client = with_deadline(timeout, options.connect(url))
            .await
            .map_err(|e| connect_error(e.to_string()))?
            .map_err(|e| connect_error(e.to_string()))?;

        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Flush buffered publishes.
    pub async fn flush(&self) -> Result<(), BusError> {
        self.client.flush().await.map_err(|e| BusError::Publish {
            subject: "<flush>".to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl NotificationBus for NatsBus {
    async fn subscribe(&self, subject: &str) -> Result<NotificationStream, BusError> {
        let subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| BusError::Subscribe {
                subject: subject.to_string(),
                reason: e.to_string(),
            })?;

        let messages = subscriber.map(|message| Notification {
            subject: message.subject.to_string(),
            reply: message.reply.map(|reply| reply.to_string()),
            payload: message.payload,
        });
        Ok(messages.boxed())
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BusError> {
        self.client
            .publish(subject.to_string(), payload)
            .await
            .map_err(|e| BusError::Publish {
                subject: subject.to_string(),
                reason: e.to_string(),
            })
    }

    async fn request(&self, subject: &str, payload: Bytes, timeout: Duration) -> Result<Bytes, BusError> {
        let reply = with_deadline(timeout, self.client.request(subject.to_string(), payload))
            .await
            .map_err(|_| BusError::Timeout {
                subject: subject.to_string(),
                timeout,
            })?
            .map_err(|e| BusError::Request {
                subject: subject.to_string(),
                reason: e.to_string(),
            })?;
        Ok(reply.payload)
    }
}
