//! Cluster membership notifications
//!
//! Peer updates pushed by the master are forwarded to a single registered
//! observer. Delivery is synchronous: the observer runs on the receive
//! loop of the leader session, so a slow observer delays processing of
//! later stream messages.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::info;
use volroute_proto::master;

/// A node joining or leaving the cluster
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerUpdate {
    pub filer_group: String,
    pub node_type: String,
    pub address: String,
    pub is_add: bool,
    pub is_leader: bool,
}

impl From<master::ClusterNodeUpdate> for PeerUpdate {
    fn from(update: master::ClusterNodeUpdate) -> Self {
        Self {
            filer_group: update.filer_group,
            node_type: update.node_type,
            address: update.address,
            is_add: update.is_add,
            is_leader: update.is_leader,
        }
    }
}

/// Receiver of peer updates
pub trait PeerObserver: Send + Sync {
    fn on_peer_update(&self, update: &PeerUpdate, received_at: SystemTime);
}

impl<F> PeerObserver for F
where
    F: Fn(&PeerUpdate, SystemTime) + Send + Sync,
{
    fn on_peer_update(&self, update: &PeerUpdate, received_at: SystemTime) {
        self(update, received_at);
    }
}

/// Forwards updates for one filer group to the registered observer
pub struct PeerNotificationSink {
    filer_group: String,
    observer: RwLock<Option<Arc<dyn PeerObserver>>>,
}

impl PeerNotificationSink {
    pub fn new(filer_group: impl Into<String>) -> Self {
        Self {
            filer_group: filer_group.into(),
            observer: RwLock::new(None),
        }
    }

    /// Register the observer, replacing any previous one
    pub fn register(&self, observer: Arc<dyn PeerObserver>) {
        *self.observer.write() = Some(observer);
    }

    /// Remove the registered observer
    pub fn clear(&self) {
        *self.observer.write() = None;
    }

    #[must_use]
    pub fn has_observer(&self) -> bool {
        self.observer.read().is_some()
    }

    /// Deliver `update` if it belongs to our filer group and someone is
    /// listening. Returns true if the observer was invoked.
    pub fn deliver(&self, update: &PeerUpdate) -> bool {
        if update.filer_group != self.filer_group {
            return false;
        }
        // Clone out so the observer runs without the lock held
        let Some(observer) = self.observer.read().clone() else {
            return false;
        };

        info!(
            "{} {}.{} {} leader:{}",
            if update.is_add { "+" } else { "-" },
            update.filer_group,
            update.node_type,
            update.address,
            update.is_leader
        );
        observer.on_peer_update(update, SystemTime::now());
        true
    }
}

impl std::fmt::Debug for PeerNotificationSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerNotificationSink")
            .field("filer_group", &self.filer_group)
            .field("has_observer", &self.has_observer())
            .finish()
    }
}
