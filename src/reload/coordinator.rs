//! Bus-driven reloads.
//!
//! # Responsibilities
//! - Subscribe each project to its full and scoped reload subjects
//! - Refresh the live config for every message that targets it
//! - Answer the sender with `ok` or the error text
//!
//! # Design Decisions
//! - One task per bus subscription; messages on one subscription are
//!   handled in arrival order, the write lock orders the rest
//! - The coordinator never retries; whoever sent the request decides
//! - Replies are best effort, a lost reply never undoes an installed record
//! - Subscribing and replying are bounded by the fetch timeout

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashSet;
use futures_util::StreamExt;
use tokio::task::JoinHandle;

use crate::bus::subject::is_literal_token;
use crate::bus::{BusError, Notification, NotificationBus, NotificationStream};
use crate::env::EnvRecord;
use crate::error::Error;
use crate::observability::metrics;
use crate::reload::live::LiveConfig;
use crate::reload::loader::DEFAULT_FETCH_TIMEOUT;
use crate::reload::subject::{parse_reload_subject, project_subject, reload_subject, ReloadTarget};
use crate::reload::REPLY_OK;
use crate::remote::RemoteStore;
use crate::resilience::timeouts::with_deadline;

pub const DEFAULT_SUBJECT_ROOT: &str = "reload";

type Registry = Arc<DashSet<(String, String)>>;

/// Wires live configs to reload subjects on a bus.
pub struct ReloadCoordinator {
    bus: Arc<dyn NotificationBus>,
    store: Arc<dyn RemoteStore>,
    subject_root: String,
    fetch_timeout: Duration,
    active: Registry,
}

impl ReloadCoordinator {
    pub fn new(bus: Arc<dyn NotificationBus>, store: Arc<dyn RemoteStore>) -> Self {
        Self {
            bus,
            store,
            subject_root: DEFAULT_SUBJECT_ROOT.to_string(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            active: Arc::new(DashSet::new()),
        }
    }

    /// First subject token of every reload subject.
    pub fn with_subject_root(mut self, root: impl Into<String>) -> Self {
        self.subject_root = root.into();
        self
    }

    /// Deadline for each fetch triggered by a reload message.
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn subject_root(&self) -> &str {
        &self.subject_root
    }

    /// Start reloading `live` on messages for `project`.
    ///
    /// The subscription lasts until the returned handle is unsubscribed or
    /// dropped. A second subscription for the same project and key is
    /// rejected while the first one is alive.
    pub async fn subscribe<T: EnvRecord>(
        &self,
        project: &str,
        live: Arc<LiveConfig<T>>,
    ) -> Result<ReloadHandle, Error> {
        if !is_literal_token(project) {
            return Err(Error::InvalidProject(project.to_string()));
        }

        let registration = (project.to_string(), live.key().to_string());
        if !self.active.insert(registration.clone()) {
            return Err(Error::AlreadySubscribed {
                project: registration.0,
                key: registration.1,
            });
        }

        let prefix = project_subject(&self.subject_root, project);
        let scoped = format!("{}.>", prefix);
        let streams = match self.open(&[prefix.as_str(), scoped.as_str()]).await {
            Ok(streams) => streams,
            Err(e) => {
                self.active.remove(&registration);
                return Err(e.into());
            }
        };

        let subscription = ReloadSubscription {
            prefix: prefix.clone(),
            live,
            bus: self.bus.clone(),
            store: self.store.clone(),
            fetch_timeout: self.fetch_timeout,
        };
        let tasks = streams
            .into_iter()
            .map(|stream| tokio::spawn(subscription.clone().run(stream)))
            .collect();

        tracing::info!(
            project = %registration.0,
            key = %registration.1,
            exact = %prefix,
            scoped = %scoped,
            "Reload subscription started"
        );

        Ok(ReloadHandle {
            subjects: vec![prefix, scoped],
            tasks,
            registration,
            active: self.active.clone(),
        })
    }

    async fn open(&self, subjects: &[&str]) -> Result<Vec<NotificationStream>, BusError> {
        let mut streams = Vec::with_capacity(subjects.len());
        for subject in subjects {
            let stream = with_deadline(self.fetch_timeout, self.bus.subscribe(subject))
                .await
                .map_err(|_| BusError::Timeout {
                    subject: subject.to_string(),
                    timeout: self.fetch_timeout,
                })??;
            streams.push(stream);
        }
        Ok(streams)
    }
}

/// Ask whoever serves `project` to reload, and return the reply text.
pub async fn request_reload(
    bus: &dyn NotificationBus,
    subject_root: &str,
    project: &str,
    field: Option<&str>,
    timeout: Duration,
) -> Result<String, BusError> {
    let subject = reload_subject(subject_root, project, field);
    let reply = bus.request(&subject, Bytes::new(), timeout).await?;
    Ok(String::from_utf8_lossy(&reply).into_owned())
}

/// Keeps a reload subscription alive.
pub struct ReloadHandle {
    subjects: Vec<String>,
    tasks: Vec<JoinHandle<()>>,
    registration: (String, String),
    active: Registry,
}

impl ReloadHandle {
    /// The subjects this subscription listens on.
    pub fn subjects(&self) -> &[String] {
        &self.subjects
    }

    /// Stop handling reloads and wait until both bus subscriptions are gone.
    pub async fn unsubscribe(mut self) {
        for task in std::mem::take(&mut self.tasks) {
            task.abort();
            let _ = task.await;
        }
        tracing::info!(
            project = %self.registration.0,
            key = %self.registration.1,
            "Reload subscription stopped"
        );
    }
}

impl Drop for ReloadHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        self.active.remove(&self.registration);
    }
}

struct ReloadSubscription<T> {
    prefix: String,
    live: Arc<LiveConfig<T>>,
    bus: Arc<dyn NotificationBus>,
    store: Arc<dyn RemoteStore>,
    fetch_timeout: Duration,
}

impl<T> Clone for ReloadSubscription<T> {
    fn clone(&self) -> Self {
        Self {
            prefix: self.prefix.clone(),
            live: self.live.clone(),
            bus: self.bus.clone(),
            store: self.store.clone(),
            fetch_timeout: self.fetch_timeout,
        }
    }
}

impl<T: EnvRecord> ReloadSubscription<T> {
    async fn run(self, mut messages: NotificationStream) {
        while let Some(message) = messages.next().await {
            self.handle(message).await;
        }
        tracing::debug!(prefix = %self.prefix, "Reload stream closed");
    }

    async fn handle(&self, message: Notification) {
        let Some(target) = parse_reload_subject(&self.prefix, &message.subject) else {
            tracing::debug!(subject = %message.subject, prefix = %self.prefix, "Ignoring foreign subject");
            return;
        };

        let key = self.live.key();
        let store = self.store.as_ref();
        let (scope, field, result) = match &target {
            ReloadTarget::All => ("all", None, self.live.reload_all(store, self.fetch_timeout).await),
            ReloadTarget::Field(field) => (
                "field",
                Some(field.as_str()),
                self.live.reload_field(store, field, self.fetch_timeout).await,
            ),
        };

        let reply = match result {
            Ok(generation) => {
                tracing::info!(subject = %message.subject, key = %key, field = ?field, generation, "Configuration reloaded");
                metrics::record_reload(scope, "ok");
                Bytes::from_static(REPLY_OK.as_bytes())
            }
            Err(e) => {
                tracing::error!(
                    subject = %message.subject,
                    key = %key,
                    field = ?field,
                    error = %e,
                    "Reload failed, keeping current configuration"
                );
                metrics::record_reload(scope, e.outcome());
                Bytes::from(e.to_string())
            }
        };

        if let Some(reply_to) = message.reply {
            let sent = with_deadline(self.fetch_timeout, self.bus.publish(&reply_to, reply))
                .await
                .unwrap_or_else(|_| {
                    Err(BusError::Timeout {
                        subject: reply_to.clone(),
                        timeout: self.fetch_timeout,
                    })
                });
            if let Err(e) = sent {
                tracing::warn!(subject = %message.subject, reply = %reply_to, error = %e, "Failed to send reload reply");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryBus;
    use crate::env::{materialize, EnvMap, Field, MaterializeError};
    use crate::remote::MemoryStore;

    #[derive(Debug)]
    struct Record {
        a: String,
    }

    impl EnvRecord for Record {
        fn from_env(env: &EnvMap) -> Result<Self, MaterializeError> {
            Ok(Self {
                a: Field::new("a").required().read(env)?,
            })
        }
    }

    fn live(key: &str) -> Arc<LiveConfig<Record>> {
        let env: EnvMap = [("a".to_string(), "x".to_string())].into_iter().collect();
        let record = materialize(&env).unwrap();
        Arc::new(LiveConfig::new(key, EnvMap::new(), env, record))
    }

    fn coordinator(bus: &MemoryBus, store: &MemoryStore) -> ReloadCoordinator {
        ReloadCoordinator::new(Arc::new(bus.clone()), Arc::new(store.clone()))
    }

    /// Delegates to a `MemoryBus`, except that replies (and optionally
    /// subscriptions) hang forever.
    struct HangingBus {
        inner: MemoryBus,
        hang_subscribe: bool,
    }

    #[async_trait::async_trait]
    impl NotificationBus for HangingBus {
        async fn subscribe(&self, subject: &str) -> Result<NotificationStream, BusError> {
            if self.hang_subscribe {
                std::future::pending::<()>().await;
            }
            self.inner.subscribe(subject).await
        }

        async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BusError> {
            if subject.starts_with("_INBOX.") {
                std::future::pending::<()>().await;
            }
            self.inner.publish(subject, payload).await
        }

        async fn request(&self, subject: &str, payload: Bytes, timeout: Duration) -> Result<Bytes, BusError> {
            self.inner.request(subject, payload, timeout).await
        }
    }

    #[tokio::test]
    async fn test_subjects() {
        let bus = MemoryBus::new();
        let coordinator = coordinator(&bus, &MemoryStore::new()).with_subject_root("cfg");
        let handle = coordinator.subscribe("proj1", live("config")).await.unwrap();
        assert_eq!(handle.subjects(), ["cfg.proj1", "cfg.proj1.>"]);
        assert_eq!(bus.subscription_count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_project() {
        let coordinator = coordinator(&MemoryBus::new(), &MemoryStore::new());
        for project in ["", "a.b", "a/b", "*", ">", "a b"] {
            let err = coordinator.subscribe(project, live("config")).await.err().unwrap();
            assert!(matches!(err, Error::InvalidProject(_)), "{}", project);
        }
    }

    #[tokio::test]
    async fn test_duplicate_subscription_until_dropped() {
        let coordinator = coordinator(&MemoryBus::new(), &MemoryStore::new());
        let handle = coordinator.subscribe("proj1", live("config")).await.unwrap();

        let err = coordinator.subscribe("proj1", live("config")).await.err().unwrap();
        assert!(matches!(err, Error::AlreadySubscribed { .. }));

        let other_key = coordinator.subscribe("proj1", live("other")).await;
        assert!(other_key.is_ok());

        drop(handle);
        assert!(coordinator.subscribe("proj1", live("config")).await.is_ok());
    }

    #[tokio::test]
    async fn test_request_reload_round_trip() {
        let bus = MemoryBus::new();
        let store = MemoryStore::new();
        store.set_field("config", "a", "new");
        let live = live("config");
        let _handle = coordinator(&bus, &store).subscribe("proj1", live.clone()).await.unwrap();

        let reply = request_reload(&bus, DEFAULT_SUBJECT_ROOT, "proj1", Some("a"), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(reply, REPLY_OK);
        assert_eq!(live.load().a, "new");
    }

    #[tokio::test]
    async fn test_unsubscribe_releases_bus_subscriptions() {
        let bus = MemoryBus::new();
        let handle = coordinator(&bus, &MemoryStore::new()).subscribe("proj1", live("config")).await.unwrap();
        assert_eq!(bus.subscription_count(), 2);
        handle.unsubscribe().await;
        assert_eq!(bus.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_stuck_reply_does_not_block_later_reloads() {
        let bus = MemoryBus::new();
        let store = MemoryStore::new();
        store.set_field("config", "a", "first");
        let hanging = HangingBus {
            inner: bus.clone(),
            hang_subscribe: false,
        };
        let live = live("config");
        let coordinator = ReloadCoordinator::new(Arc::new(hanging), Arc::new(store.clone()))
            .fetch_timeout(Duration::from_millis(100));
        let _handle = coordinator.subscribe("proj1", live.clone()).await.unwrap();

        let err = request_reload(&bus, DEFAULT_SUBJECT_ROOT, "proj1", None, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::Timeout { .. }));
        assert_eq!(live.generation(), 1);

        let mut generations = live.watch_generation();
        generations.borrow_and_update();
        store.set_field("config", "a", "second");
        bus.publish("reload.proj1", Bytes::new()).await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), generations.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(live.load().a, "second");
        assert_eq!(live.generation(), 2);
    }

    #[tokio::test]
    async fn test_stuck_subscribe_times_out_and_releases_registration() {
        let hanging = HangingBus {
            inner: MemoryBus::new(),
            hang_subscribe: true,
        };
        let coordinator = ReloadCoordinator::new(Arc::new(hanging), Arc::new(MemoryStore::new()))
            .fetch_timeout(Duration::from_millis(50));

        let err = coordinator.subscribe("proj1", live("config")).await.err().unwrap();
        assert!(matches!(err, Error::Bus(BusError::Timeout { .. })));

        let err = coordinator.subscribe("proj1", live("config")).await.err().unwrap();
        assert!(matches!(err, Error::Bus(BusError::Timeout { .. })));
    }
}
