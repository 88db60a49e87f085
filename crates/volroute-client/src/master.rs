//! Master client
//!
//! Keeps a live keep-connected session with the leader among a fixed,
//! ordered list of master nodes and builds the local routing table from
//! the volume changes the leader pushes. Lookups are served from the
//! routing table and fall back to a `LookupVolume` RPC on a miss.
//!
//! One background task (see [`MasterClient::start`]) owns the session:
//! it is the only writer of the current master and the only task that
//! replaces or mutates the routing table from the stream. Any number of
//! callers may look up file ids concurrently.

use crate::event::{MasterEvent, StreamEventProcessor, redirect_target};
use crate::metrics::{ConnectOutcome, ConnectionCounters};
use crate::peer::{PeerNotificationSink, PeerObserver};
use crate::routing::{RoutingHandle, RoutingTable};
use crate::transport::{GrpcMasterTransport, MasterTransport, SessionStream};
use futures::StreamExt;
use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use volroute_common::{
    ClientConfig, ClientIdentity, Error, FileId, Location, Result, RetryPolicy, ServerAddress,
    parse_volume_or_file_id,
};
use volroute_proto::master::{KeepConnectedRequest, KeepConnectedResponse, LookupVolumeRequest};

/// Version reported to masters in the handshake
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A standalone file-id resolver, detached from the client that backs it
pub type LookupFileIdFunction =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<Vec<String>>> + Send + Sync>;

/// Client for the cluster's master nodes
pub struct MasterClient {
    identity: ClientIdentity,
    /// Masters in failover order
    masters: Vec<ServerAddress>,
    transport: Arc<dyn MasterTransport>,
    /// Master of the live session; `None` while disconnected
    current_master: watch::Sender<Option<ServerAddress>>,
    routing: RoutingHandle,
    peers: PeerNotificationSink,
    processor: StreamEventProcessor,
    counters: Arc<ConnectionCounters>,
    /// Held by the running supervisor loop
    supervisor: Mutex<()>,
    reconnect_pause: Duration,
    peer_query_timeout: Duration,
    retry: RetryPolicy,
}

impl MasterClient {
    /// Create a client using `transport` to reach the masters
    pub fn new(config: &ClientConfig, transport: Arc<dyn MasterTransport>) -> Result<Self> {
        config.validate()?;

        let identity = config.identity();
        let counters = Arc::new(ConnectionCounters::new());
        let (current_master, _) = watch::channel(None);

        Ok(Self {
            masters: config.master_addresses(),
            transport,
            current_master,
            routing: RoutingHandle::new(config.data_center.clone()),
            peers: PeerNotificationSink::new(identity.filer_group.clone()),
            processor: StreamEventProcessor::new(identity.clone(), Arc::clone(&counters)),
            counters,
            supervisor: Mutex::new(()),
            reconnect_pause: config.reconnect_pause(),
            peer_query_timeout: config.peer_query_timeout(),
            retry: RetryPolicy::from(&config.retry),
            identity,
        })
    }

    /// Create a client that talks gRPC to the configured masters
    pub fn with_grpc(config: &ClientConfig) -> Result<Self> {
        let transport = Arc::new(GrpcMasterTransport::new(config.connect_timeout()));
        Self::new(config, transport)
    }

    #[must_use]
    pub const fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    #[must_use]
    pub fn counters(&self) -> &ConnectionCounters {
        &self.counters
    }

    /// Snapshot of the live routing table
    #[must_use]
    pub fn routing_table(&self) -> Arc<RoutingTable> {
        self.routing.load()
    }

    /// Register the observer for peer updates in this client's filer group.
    ///
    /// The observer runs synchronously on the session's receive loop.
    pub fn on_peer_update(&self, observer: Arc<dyn PeerObserver>) {
        self.peers.register(observer);
    }

    /// Master of the live session, without waiting
    #[must_use]
    pub fn current_master(&self) -> Option<ServerAddress> {
        self.current_master.borrow().clone()
    }

    /// Master of the live session, waiting until there is one
    pub async fn get_master(&self) -> ServerAddress {
        self.wait_until_connected().await
    }

    /// Configured masters, once a session is established
    pub async fn get_masters(&self) -> &[ServerAddress] {
        self.wait_until_connected().await;
        &self.masters
    }

    /// Wait, without timeout, until a leader session is established
    pub async fn wait_until_connected(&self) -> ServerAddress {
        let mut rx = self.current_master.subscribe();
        loop {
            let current = rx.borrow_and_update().clone();
            if let Some(master) = current {
                return master;
            }
            // The sender lives in `self`, so this only errors after drop
            if rx.changed().await.is_err() {
                futures::future::pending::<()>().await;
            }
        }
    }

    fn set_current_master(&self, master: Option<ServerAddress>) {
        self.current_master.send_replace(master);
    }

    /// Spawn the connection supervisor on the current runtime
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let client = Arc::clone(self);
        tokio::spawn(async move { client.keep_connected_to_masters().await })
    }

    /// Cycle through the masters forever, following leader redirects.
    ///
    /// Returns immediately if another supervisor loop is already running.
    pub async fn keep_connected_to_masters(&self) {
        let Ok(_running) = self.supervisor.try_lock() else {
            warn!("{} masterClient is already connected", self.identity);
            return;
        };

        let masters: Vec<&str> = self.masters.iter().map(ServerAddress::as_str).collect();
        debug!("{} masterClient bootstraps with masters {:?}", self.identity, masters);

        loop {
            self.try_all_masters().await;
            tokio::time::sleep(self.reconnect_pause).await;
        }
    }

    /// One pass over the masters in order. Each hinted leader is tried
    /// next until an attempt ends without a redirect.
    pub(crate) async fn try_all_masters(&self) {
        for master in &self.masters {
            let mut next_hinted_leader = self.try_connect_to_master(master).await;
            while let Some(leader) = next_hinted_leader {
                next_hinted_leader = self.try_connect_to_master(&leader).await;
            }
            self.set_current_master(None);
        }
    }

    /// Run one session against `master`. Returns the leader it redirected to, if any.
    pub(crate) async fn try_connect_to_master(&self, master: &ServerAddress) -> Option<ServerAddress> {
        debug!("{} masterClient connecting to master {}", self.identity, master);
        self.counters.inc(ConnectOutcome::Total);

        match self.run_session(master).await {
            Ok(next_hinted_leader) => next_hinted_leader,
            Err(e) => {
                self.counters.inc(ConnectOutcome::Failed);
                warn!(
                    "{} masterClient failed to connect with master {}: {}",
                    self.identity, master, e
                );
                None
            }
        }
    }

    async fn run_session(&self, master: &ServerAddress) -> Result<Option<ServerAddress>> {
        let handshake = KeepConnectedRequest {
            filer_group: self.identity.filer_group.clone(),
            client_type: self.identity.client_type.clone(),
            client_address: self.identity.client_host.to_string(),
            version: VERSION.to_string(),
            ..Default::default()
        };

        let mut stream = match self.transport.keep_connected(master, handshake).await {
            Ok(stream) => stream,
            Err(e) => {
                let outcome = if matches!(e, Error::HandshakeSend(_)) {
                    ConnectOutcome::FailedToSend
                } else {
                    ConnectOutcome::FailedToKeepConnected
                };
                self.counters.inc(outcome);
                debug!(
                    "{} masterClient failed to keep connected to {}: {}",
                    self.identity, master, e
                );
                return Err(e);
            }
        };
        debug!("{} masterClient connected to {}", self.identity, master);

        // Only the leader field of the first message matters
        let first = self.receive(&mut stream, master).await?;
        if let Some(leader) = redirect_target(&first, master) {
            info!("master {} redirected to leader {}", master, leader);
            self.counters.inc(ConnectOutcome::RedirectedToLeader);
            return Ok(Some(leader));
        }

        // A new session is authoritative: start from an empty table
        let table = self.routing.reset();
        self.set_current_master(Some(master.clone()));
        self.counters.inc(ConnectOutcome::Connected);

        let result = self.receive_loop(&mut stream, master, &table).await;
        self.set_current_master(None);
        result
    }

    async fn receive_loop(
        &self,
        stream: &mut SessionStream,
        master: &ServerAddress,
        table: &RoutingTable,
    ) -> Result<Option<ServerAddress>> {
        loop {
            let response = self.receive(stream, master).await?;
            for event in MasterEvent::decode(response, master) {
                if let Some(leader) = self.processor.handle(event, table, &self.peers) {
                    info!("currentMaster {} redirected to leader {}", master, leader);
                    return Ok(Some(leader));
                }
            }
        }
    }

    async fn receive(
        &self,
        stream: &mut SessionStream,
        master: &ServerAddress,
    ) -> Result<KeepConnectedResponse> {
        let error = match stream.next().await {
            Some(Ok(response)) => return Ok(response),
            Some(Err(e)) => e,
            None => Error::StreamClosed(master.to_string()),
        };
        self.counters.inc(ConnectOutcome::FailedToReceive);
        info!(
            "{} masterClient failed to receive from {}: {}",
            self.identity, master, error
        );
        Err(error)
    }

    /// Resolve `file_id` to download URLs, asking the master on a cache miss.
    ///
    /// Locations learned from the master are added to the routing table
    /// of the session the request was sent on, before returning. If that
    /// session has since been replaced, they are dropped. Misses are not
    /// cached.
    pub async fn lookup_file_id_with_fallback(&self, file_id: &str) -> Result<Vec<String>> {
        match self.routing.load().lookup_file_id(file_id) {
            Ok(urls) => return Ok(urls),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        let requested_vid = FileId::parse(file_id)?.volume_id;

        let master = self.wait_until_connected().await;
        let table = self.routing.load();
        let response = self
            .transport
            .lookup_volume(
                &master,
                LookupVolumeRequest {
                    volume_or_file_ids: vec![file_id.to_string()],
                    ..Default::default()
                },
            )
            .await?;

        let mut full_urls = Vec::new();
        let mut lookup_error = None;
        for vid_location in response.volume_id_locations {
            if !vid_location.error.is_empty() {
                lookup_error = Some(vid_location.error);
                continue;
            }
            let vid = parse_volume_or_file_id(&vid_location.volume_or_file_id)
                .unwrap_or(requested_vid);
            for loc in vid_location.locations {
                let location = Location {
                    url: loc.url,
                    public_url: loc.public_url,
                    data_center: loc.data_center,
                    grpc_port: loc.grpc_port,
                };
                full_urls.push(location.file_url(file_id));
                table.add_location(vid, location);
            }
        }

        if full_urls.is_empty() {
            return Err(match lookup_error {
                Some(message) => Error::Lookup {
                    id: file_id.to_string(),
                    message,
                },
                None => Error::VolumeNotFound(requested_vid),
            });
        }
        Ok(full_urls)
    }

    /// [`Self::lookup_file_id_with_fallback`] as a standalone resolver
    #[must_use]
    pub fn lookup_function(self: &Arc<Self>) -> LookupFileIdFunction {
        let client = Arc::clone(self);
        Arc::new(move |file_id: String| {
            let client = Arc::clone(&client);
            async move { client.lookup_file_id_with_fallback(&file_id).await }.boxed()
        })
    }

    /// Ask every other master who the leader is; the first non-empty
    /// answer wins. Each query is bounded by the peer query timeout.
    pub async fn find_leader_from_other_peers(
        &self,
        my_master_address: &ServerAddress,
    ) -> Option<ServerAddress> {
        for master in &self.masters {
            if master == my_master_address {
                continue;
            }
            let query = self.transport.get_master_configuration(master);
            match tokio::time::timeout(self.peer_query_timeout, query).await {
                Ok(Ok(response)) if !response.leader.is_empty() => {
                    info!("existing leader is {}", response.leader);
                    return Some(ServerAddress::new(response.leader));
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => info!("connect to {}: {}", master, e),
                Err(_) => info!("connect to {}: {}", master, Error::Timeout),
            }
        }
        info!("No existing leader found!");
        None
    }

    /// Run `op` against the current master, waiting for one first, under
    /// the client's retry policy.
    pub async fn with_client<T, F, Fut>(&self, name: &str, op: F) -> Result<T>
    where
        F: Fn(ServerAddress, Arc<dyn MasterTransport>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let op = &op;
        self.retry
            .retry(name, || async move {
                let master = self.wait_until_connected().await;
                op(master, Arc::clone(&self.transport)).await
            })
            .await
    }
}

impl std::fmt::Debug for MasterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterClient")
            .field("identity", &self.identity)
            .field("masters", &self.masters)
            .field("current_master", &self.current_master())
            .finish_non_exhaustive()
    }
}
