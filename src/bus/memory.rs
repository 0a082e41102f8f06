//! In-process bus.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use futures_util::stream::{self, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::bus::subject::subject_matches;
use crate::bus::{BusError, Notification, NotificationBus, NotificationStream};
use crate::resilience::timeouts::with_deadline;

/// A `NotificationBus` that delivers within the process.
///
/// Follows the NATS subject rules (`*`, `>`) and request/reply through
/// private `_INBOX.*` subjects. Clones share subscriptions.
#[derive(Clone, Default)]
pub struct MemoryBus {
    inner: Arc<Subscriptions>,
}

#[derive(Default)]
struct Subscriptions {
    by_id: DashMap<u64, (String, mpsc::UnboundedSender<Notification>)>,
    next_id: AtomicU64,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of subscriptions whose stream is still alive.
    pub fn subscription_count(&self) -> usize {
        self.inner
            .by_id
            .iter()
            .filter(|entry| !entry.value().1.is_closed())
            .count()
    }

    /// Deliver to every matching subscription; returns how many got it.
    ///
    /// Subscriptions whose stream was dropped are removed on the way,
    /// matching or not.
    fn deliver(&self, notification: Notification) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        for entry in self.inner.by_id.iter() {
            let (pattern, tx) = entry.value();
            if tx.is_closed() {
                closed.push(*entry.key());
                continue;
            }
            if !subject_matches(pattern, &notification.subject) {
                continue;
            }
            if tx.send(notification.clone()).is_ok() {
                delivered += 1;
            } else {
                closed.push(*entry.key());
            }
        }

        for id in closed {
            self.inner.by_id.remove(&id);
        }
        delivered
    }

    fn register(&self, subject: &str) -> (u64, NotificationStream) {
        self.inner.by_id.retain(|_, (_, tx)| !tx.is_closed());

        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.by_id.insert(id, (subject.to_string(), tx));

        let messages = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|message| (message, rx))
        });
        (id, messages.boxed())
    }

    async fn await_reply(
        &self,
        subject: &str,
        inbox: String,
        mut replies: NotificationStream,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<Bytes, BusError> {
        let delivered = self.deliver(Notification {
            subject: subject.to_string(),
            reply: Some(inbox),
            payload,
        });
        if delivered == 0 {
            return Err(BusError::Request {
                subject: subject.to_string(),
                reason: "no responders".to_string(),
            });
        }

        match with_deadline(timeout, replies.next()).await {
            Ok(Some(reply)) => Ok(reply.payload),
            Ok(None) => Err(BusError::Request {
                subject: subject.to_string(),
                reason: "reply subscription closed".to_string(),
            }),
            Err(_) => Err(BusError::Timeout {
                subject: subject.to_string(),
                timeout,
            }),
        }
    }
}

#[async_trait]
impl NotificationBus for MemoryBus {
    async fn subscribe(&self, subject: &str) -> Result<NotificationStream, BusError> {
        let (_, messages) = self.register(subject);
        Ok(messages)
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BusError> {
        self.deliver(Notification {
            subject: subject.to_string(),
            reply: None,
            payload,
        });
        Ok(())
    }

    async fn request(&self, subject: &str, payload: Bytes, timeout: Duration) -> Result<Bytes, BusError> {
        let inbox = format!("_INBOX.{}", Uuid::new_v4().simple());
        let (id, replies) = self.register(&inbox);
        let result = self.await_reply(subject, inbox, replies, payload, timeout).await;
        self.inner.by_id.remove(&id);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_matching_subscribers_only() {
        let bus = MemoryBus::new();
        let mut exact = bus.subscribe("reload.p").await.unwrap();
        let mut scoped = bus.subscribe("reload.p.>").await.unwrap();

        bus.publish("reload.p.a", Bytes::from_static(b"x")).await.unwrap();
        bus.publish("reload.p", Bytes::from_static(b"y")).await.unwrap();

        assert_eq!(scoped.next().await.unwrap().subject, "reload.p.a");
        assert_eq!(exact.next().await.unwrap().subject, "reload.p");
    }

    #[tokio::test]
    async fn test_request_reply() {
        let bus = MemoryBus::new();
        let mut requests = bus.subscribe("svc.echo").await.unwrap();
        let responder = bus.clone();
        tokio::spawn(async move {
            while let Some(msg) = requests.next().await {
                if let Some(reply) = msg.reply {
                    responder.publish(&reply, msg.payload).await.unwrap();
                }
            }
        });

        let answer = bus
            .request("svc.echo", Bytes::from_static(b"ping"), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(&answer[..], b"ping");
    }

    #[tokio::test]
    async fn test_request_without_responders() {
        let bus = MemoryBus::new();
        let err = bus
            .request("nobody.home", Bytes::new(), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::Request { .. }));
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let bus = MemoryBus::new();
        let _silent = bus.subscribe("svc.silent").await.unwrap();
        let err = bus
            .request("svc.silent", Bytes::new(), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_dropped_stream_unsubscribes() {
        let bus = MemoryBus::new();
        let stream = bus.subscribe("a.b").await.unwrap();
        assert_eq!(bus.subscription_count(), 1);
        drop(stream);
        assert_eq!(bus.subscription_count(), 0);

        let _other = bus.subscribe("c.d").await.unwrap();
        assert_eq!(bus.inner.by_id.len(), 1);
    }

    #[tokio::test]
    async fn test_request_inboxes_are_released() {
        let bus = MemoryBus::new();
        let mut requests = bus.subscribe("svc.echo").await.unwrap();
        let responder = bus.clone();
        tokio::spawn(async move {
            while let Some(msg) = requests.next().await {
                if let Some(reply) = msg.reply {
                    responder.publish(&reply, msg.payload).await.unwrap();
                }
            }
        });

        for _ in 0..1000 {
            bus.request("svc.echo", Bytes::from_static(b"ping"), Duration::from_secs(1))
                .await
                .unwrap();
        }
        let _ = bus
            .request("nobody.home", Bytes::new(), Duration::from_millis(10))
            .await;

        assert_eq!(bus.subscription_count(), 1);
        assert_eq!(bus.inner.by_id.len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_streams_are_pruned_on_publish() {
        let bus = MemoryBus::new();
        let kept = bus.subscribe("a.b").await.unwrap();
        drop(bus.subscribe("x.y").await.unwrap());

        bus.publish("a.b", Bytes::new()).await.unwrap();
        assert_eq!(bus.inner.by_id.len(), 1);
        drop(kept);
    }
}
