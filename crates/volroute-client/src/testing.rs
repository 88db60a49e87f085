//! Scripted in-memory master transport for tests

use crate::transport::{MasterTransport, SessionStream};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;
use volroute_common::{Error, Result, ServerAddress};
use volroute_proto::master::{
    ClusterNodeUpdate, GetMasterConfigurationResponse, KeepConnectedRequest,
    KeepConnectedResponse, Location, LookupVolumeRequest, LookupVolumeResponse, VolumeIdLocation,
    VolumeLocation,
};

/// How a dialed master behaves for one session
pub enum Session {
    /// Connection attempt fails
    Refuse,
    /// Yields `messages`, then either ends or stays open forever
    Stream {
        messages: Vec<Result<KeepConnectedResponse>>,
        hold_open: bool,
    },
}

/// How a master answers a configuration query
pub enum ConfigAnswer {
    Leader(String),
    Fail,
    Hang,
}

#[derive(Default)]
pub struct FakeTransport {
    sessions: Mutex<HashMap<ServerAddress, VecDeque<Session>>>,
    configurations: Mutex<HashMap<ServerAddress, ConfigAnswer>>,
    lookups: Mutex<VecDeque<Result<LookupVolumeResponse>>>,
    lookup_gate: Mutex<Option<Arc<Notify>>>,
    pub dials: Mutex<Vec<ServerAddress>>,
    pub handshakes: Mutex<Vec<KeepConnectedRequest>>,
    pub lookup_calls: Mutex<Vec<(ServerAddress, LookupVolumeRequest)>>,
    pub config_calls: Mutex<Vec<ServerAddress>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a session for the next dial of `master`
    pub fn session(&self, master: &str, session: Session) -> &Self {
        self.sessions
            .lock()
            .entry(ServerAddress::new(master))
            .or_default()
            .push_back(session);
        self
    }

    pub fn configuration(&self, master: &str, answer: ConfigAnswer) -> &Self {
        self.configurations
            .lock()
            .insert(ServerAddress::new(master), answer);
        self
    }

    /// Queue the answer to the next lookup call
    pub fn lookup(&self, response: Result<LookupVolumeResponse>) -> &Self {
        self.lookups.lock().push_back(response);
        self
    }

    /// Hold every lookup answer until `gate` is notified
    pub fn gate_lookups(&self, gate: Arc<Notify>) -> &Self {
        *self.lookup_gate.lock() = Some(gate);
        self
    }

    pub fn dialed(&self) -> Vec<String> {
        self.dials.lock().iter().map(ToString::to_string).collect()
    }
}

#[async_trait]
impl MasterTransport for FakeTransport {
    async fn keep_connected(
        &self,
        master: &ServerAddress,
        handshake: KeepConnectedRequest,
    ) -> Result<SessionStream> {
        self.dials.lock().push(master.clone());
        let session = self
            .sessions
            .lock()
            .get_mut(master)
            .and_then(VecDeque::pop_front);

        match session {
            None | Some(Session::Refuse) => Err(Error::ConnectFailed(format!("{master}: refused"))),
            Some(Session::Stream { messages, hold_open }) => {
                self.handshakes.lock().push(handshake);
                let messages = stream::iter(messages);
                if hold_open {
                    Ok(messages.chain(stream::pending()).boxed())
                } else {
                    Ok(messages.boxed())
                }
            }
        }
    }

    async fn lookup_volume(
        &self,
        master: &ServerAddress,
        request: LookupVolumeRequest,
    ) -> Result<LookupVolumeResponse> {
        self.lookup_calls.lock().push((master.clone(), request));
        let gate = self.lookup_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.lookups
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Error::rpc("Unimplemented", "no scripted lookup")))
    }

    async fn get_master_configuration(
        &self,
        master: &ServerAddress,
    ) -> Result<GetMasterConfigurationResponse> {
        self.config_calls.lock().push(master.clone());
        let leader = match self.configurations.lock().get(master) {
            Some(ConfigAnswer::Leader(leader)) => Some(leader.clone()),
            Some(ConfigAnswer::Hang) => None,
            Some(ConfigAnswer::Fail) | None => {
                return Err(Error::ConnectFailed(format!("{master}: refused")));
            }
        };
        match leader {
            Some(leader) => Ok(GetMasterConfigurationResponse {
                leader,
                ..Default::default()
            }),
            None => futures::future::pending().await,
        }
    }
}

/// Handshake reply naming `leader` (empty = no leader field)
pub fn leader_message(leader: &str) -> KeepConnectedResponse {
    KeepConnectedResponse {
        volume_location: Some(VolumeLocation {
            leader: leader.to_string(),
            ..Default::default()
        }),
        cluster_node_update: None,
    }
}

/// Volume changes reported for the volume server at `url`
pub fn delta_message(url: &str, new_vids: Vec<u32>, deleted_vids: Vec<u32>) -> KeepConnectedResponse {
    KeepConnectedResponse {
        volume_location: Some(VolumeLocation {
            url: url.to_string(),
            public_url: url.to_string(),
            new_vids,
            deleted_vids,
            ..Default::default()
        }),
        cluster_node_update: None,
    }
}

pub fn peer_message(filer_group: &str, address: &str, is_add: bool) -> KeepConnectedResponse {
    KeepConnectedResponse {
        volume_location: None,
        cluster_node_update: Some(ClusterNodeUpdate {
            node_type: "filer".to_string(),
            address: address.to_string(),
            is_add,
            filer_group: filer_group.to_string(),
            ..Default::default()
        }),
    }
}

/// Lookup answer placing `id` on each of `urls`
pub fn lookup_response(id: &str, urls: &[&str]) -> LookupVolumeResponse {
    LookupVolumeResponse {
        volume_id_locations: vec![VolumeIdLocation {
            volume_or_file_id: id.to_string(),
            locations: urls
                .iter()
                .map(|url| Location {
                    url: (*url).to_string(),
                    public_url: (*url).to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }],
    }
}
