//! Keep-connected stream decoding
//!
//! Each message pushed by the master is decoded into [`MasterEvent`]s:
//! a leader redirect, a batch of volume location changes, or a peer
//! membership update. [`StreamEventProcessor`] applies them to the
//! routing table and peer sink.

use crate::metrics::{ConnectOutcome, ConnectionCounters};
use crate::peer::{PeerNotificationSink, PeerUpdate};
use crate::routing::RoutingTable;
use std::sync::Arc;
use tracing::debug;
use volroute_common::{ClientIdentity, Location, ServerAddress, VolumeId};
use volroute_proto::master::{KeepConnectedResponse, VolumeLocation};

/// Volume changes on one volume server
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VolumeLocationDelta {
    pub location: Location,
    pub new_vids: Vec<VolumeId>,
    pub deleted_vids: Vec<VolumeId>,
    pub new_ec_vids: Vec<VolumeId>,
    pub deleted_ec_vids: Vec<VolumeId>,
}

impl From<VolumeLocation> for VolumeLocationDelta {
    fn from(vl: VolumeLocation) -> Self {
        Self {
            location: Location {
                url: vl.url,
                public_url: vl.public_url,
                data_center: vl.data_center,
                grpc_port: vl.grpc_port,
            },
            new_vids: vl.new_vids,
            deleted_vids: vl.deleted_vids,
            new_ec_vids: vl.new_ec_vids,
            deleted_ec_vids: vl.deleted_ec_vids,
        }
    }
}

/// A decoded stream message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MasterEvent {
    /// The master names a different leader; the session must end
    Redirect(ServerAddress),
    LocationDelta(VolumeLocationDelta),
    PeerUpdate(PeerUpdate),
}

impl MasterEvent {
    /// Decode one response received on a session with `current_leader`.
    ///
    /// A redirect suppresses every other payload in the same message.
    #[must_use]
    pub fn decode(response: KeepConnectedResponse, current_leader: &ServerAddress) -> Vec<Self> {
        if let Some(leader) = redirect_target(&response, current_leader) {
            return vec![Self::Redirect(leader)];
        }

        let mut events = Vec::with_capacity(2);
        if let Some(vl) = response.volume_location {
            events.push(Self::LocationDelta(vl.into()));
        }
        if let Some(update) = response.cluster_node_update {
            events.push(Self::PeerUpdate(update.into()));
        }
        events
    }
}

/// The leader named by `response`, if it is not `current_leader`
#[must_use]
pub fn redirect_target(
    response: &KeepConnectedResponse,
    current_leader: &ServerAddress,
) -> Option<ServerAddress> {
    let leader = &response.volume_location.as_ref()?.leader;
    if leader.is_empty() || leader == current_leader.as_str() {
        return None;
    }
    Some(ServerAddress::new(leader.as_str()))
}

/// Applies decoded stream events for one client
pub struct StreamEventProcessor {
    identity: ClientIdentity,
    counters: Arc<ConnectionCounters>,
}

impl StreamEventProcessor {
    pub fn new(identity: ClientIdentity, counters: Arc<ConnectionCounters>) -> Self {
        Self { identity, counters }
    }

    /// Apply one event. Returns the new leader if the event is a redirect.
    pub fn handle(
        &self,
        event: MasterEvent,
        table: &RoutingTable,
        peers: &PeerNotificationSink,
    ) -> Option<ServerAddress> {
        match event {
            MasterEvent::Redirect(leader) => {
                self.counters.inc(ConnectOutcome::RedirectedToLeader);
                Some(leader)
            }
            MasterEvent::LocationDelta(delta) => {
                self.apply_delta(table, &delta);
                None
            }
            MasterEvent::PeerUpdate(update) => {
                if peers.deliver(&update) {
                    self.counters.inc(ConnectOutcome::OnPeerUpdate);
                }
                None
            }
        }
    }

    /// Apply additions and removals in order: regular adds, regular
    /// deletes, EC adds, EC deletes.
    pub fn apply_delta(&self, table: &RoutingTable, delta: &VolumeLocationDelta) {
        let loc = &delta.location;
        for &vid in &delta.new_vids {
            debug!("{}: {} masterClient adds volume {}", self.identity, loc.url, vid);
            table.add_location(vid, loc.clone());
        }
        for &vid in &delta.deleted_vids {
            debug!("{}: {} masterClient removes volume {}", self.identity, loc.url, vid);
            table.delete_location(vid, loc);
        }
        for &vid in &delta.new_ec_vids {
            debug!("{}: {} masterClient adds ec volume {}", self.identity, loc.url, vid);
            table.add_ec_location(vid, loc.clone());
        }
        for &vid in &delta.deleted_ec_vids {
            debug!("{}: {} masterClient removes ec volume {}", self.identity, loc.url, vid);
            table.delete_ec_location(vid, loc);
        }
    }
}
