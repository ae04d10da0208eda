//! Change notifications for store collections.
//!
//! Services publish a [`ChangeEvent`] after each committed write. Consumers
//! hold a [`Subscription`] (or a [`WatchHandle`] driving a callback) for as
//! long as their session lives; dropping it unsubscribes.

use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Users,
    Families,
    Posts,
    Media,
    Notifications,
    FamilyRequests,
    AdminRequests,
    Config,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Families => "families",
            Self::Posts => "posts",
            Self::Media => "media",
            Self::Notifications => "notifications",
            Self::FamilyRequests => "family_requests",
            Self::AdminRequests => "admin_requests",
            Self::Config => "config",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub id: String,
    pub kind: ChangeKind,
    /// Family the document belongs to, when it is family scoped.
    pub family_id: Option<String>,
}

impl ChangeEvent {
    pub fn new(
        collection: Collection,
        id: impl Into<String>,
        kind: ChangeKind,
        family_id: Option<&str>,
    ) -> Self {
        Self {
            collection,
            id: id.into(),
            kind,
            family_id: family_id.map(str::to_string),
        }
    }
}

/// Field-equality filter applied on the receiving side.
#[derive(Debug, Clone, Default)]
pub struct ChangeFilter {
    pub collection: Option<Collection>,
    pub family_id: Option<String>,
    pub id: Option<String>,
}

impl ChangeFilter {
    pub fn collection(collection: Collection) -> Self {
        Self {
            collection: Some(collection),
            ..Self::default()
        }
    }

    pub fn family(family_id: impl Into<String>) -> Self {
        Self {
            family_id: Some(family_id.into()),
            ..Self::default()
        }
    }

    pub fn with_family(mut self, family_id: impl Into<String>) -> Self {
        self.family_id = Some(family_id.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if let Some(collection) = self.collection {
            if collection != event.collection {
                return false;
            }
        }
        if let Some(family_id) = &self.family_id {
            if event.family_id.as_deref() != Some(family_id.as_str()) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if id != &event.id {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event. Having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        tracing::trace!(
            collection = ?event.collection,
            id = %event.id,
            kind = ?event.kind,
            "change published"
        );
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self, filter: ChangeFilter) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            filter,
        }
    }

    /// Runs `callback` for every matching event on a background task until
    /// the returned handle is unsubscribed or dropped.
    pub fn watch<F, Fut>(&self, filter: ChangeFilter, mut callback: F) -> WatchHandle
    where
        F: FnMut(ChangeEvent) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut subscription = self.subscribe(filter);
        let task = tokio::spawn(async move {
            while let Some(event) = subscription.next().await {
                callback(event).await;
            }
        });
        WatchHandle { task: Some(task) }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

pub struct Subscription {
    receiver: broadcast::Receiver<ChangeEvent>,
    filter: ChangeFilter,
}

impl Subscription {
    /// Waits for the next matching event. Returns `None` once the feed is
    /// gone. Events missed because the subscriber lagged are skipped.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "change subscriber lagged; events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

pub struct WatchHandle {
    task: Option<JoinHandle<()>>,
}

impl WatchHandle {
    pub fn unsubscribe(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
