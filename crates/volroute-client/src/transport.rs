//! Master transport
//!
//! [`MasterTransport`] is the boundary between the master client and the
//! network. [`GrpcMasterTransport`] implements it over tonic channels,
//! keeping one shared channel per master for unary calls and a dedicated
//! channel for each keep-connected stream.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Status};
use tracing::{debug, info};
use volroute_common::{Error, Result, ServerAddress};
use volroute_proto::master::seaweed_client::SeaweedClient;
use volroute_proto::master::{
    GetMasterConfigurationRequest, GetMasterConfigurationResponse, KeepConnectedRequest,
    KeepConnectedResponse, LookupVolumeRequest, LookupVolumeResponse,
};

/// Messages pushed by a master for the lifetime of one session
pub type SessionStream = BoxStream<'static, Result<KeepConnectedResponse>>;

/// Operations the master client needs from a master node
#[async_trait]
pub trait MasterTransport: Send + Sync {
    /// Open a keep-connected stream to `master`, sending `handshake` first
    async fn keep_connected(
        &self,
        master: &ServerAddress,
        handshake: KeepConnectedRequest,
    ) -> Result<SessionStream>;

    /// Resolve volume or file ids to their locations
    async fn lookup_volume(
        &self,
        master: &ServerAddress,
        request: LookupVolumeRequest,
    ) -> Result<LookupVolumeResponse>;

    /// Fetch the master's configuration, including who it thinks the leader is
    async fn get_master_configuration(
        &self,
        master: &ServerAddress,
    ) -> Result<GetMasterConfigurationResponse>;
}

/// gRPC transport to master nodes
pub struct GrpcMasterTransport {
    connect_timeout: Duration,
    /// Cached unary clients: master -> client
    clients: RwLock<HashMap<ServerAddress, SeaweedClient<Channel>>>,
}

impl GrpcMasterTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            clients: RwLock::new(HashMap::new()),
        }
    }

    async fn dial(&self, master: &ServerAddress) -> Result<SeaweedClient<Channel>> {
        let endpoint = Endpoint::from_shared(master.grpc_endpoint()?)
            .map_err(|e| Error::InvalidAddress(format!("{master}: {e}")))?
            .connect_timeout(self.connect_timeout);

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| Error::ConnectFailed(format!("{master}: {e}")))?;

        Ok(SeaweedClient::new(channel))
    }

    /// Get the cached client for `master`, connecting if necessary
    async fn get_or_connect(&self, master: &ServerAddress) -> Result<SeaweedClient<Channel>> {
        if let Some(client) = self.clients.read().await.get(master) {
            return Ok(client.clone());
        }

        let client = self.dial(master).await?;

        // Another task may have connected while we were dialing
        let mut clients = self.clients.write().await;
        let client = clients.entry(master.clone()).or_insert(client).clone();
        debug!("Connected to master {}", master);
        Ok(client)
    }

    /// Drop the cached client for `master`
    pub async fn disconnect(&self, master: &ServerAddress) {
        if self.clients.write().await.remove(master).is_some() {
            info!("Disconnected from master {}", master);
        }
    }

    async fn evict_on_unavailable(&self, master: &ServerAddress, status: &Status) {
        if status.code() == Code::Unavailable {
            self.disconnect(master).await;
        }
    }
}

#[async_trait]
impl MasterTransport for GrpcMasterTransport {
    async fn keep_connected(
        &self,
        master: &ServerAddress,
        handshake: KeepConnectedRequest,
    ) -> Result<SessionStream> {
        let mut client = self.dial(master).await?;

        // Keep the request half open; the master ends the session when it sees EOF
        let outbound = stream::once(futures::future::ready(handshake)).chain(stream::pending());

        let response = client
            .keep_connected(outbound)
            .await
            .map_err(|status| Error::HandshakeSend(format!("{master}: {}", status.message())))?;

        let inbound = response
            .into_inner()
            .map(|message| message.map_err(|status| Error::Receive(status.message().to_string())));

        Ok(inbound.boxed())
    }

    async fn lookup_volume(
        &self,
        master: &ServerAddress,
        request: LookupVolumeRequest,
    ) -> Result<LookupVolumeResponse> {
        let mut client = self.get_or_connect(master).await?;
        match client.lookup_volume(request).await {
            Ok(response) => Ok(response.into_inner()),
            Err(status) => {
                self.evict_on_unavailable(master, &status).await;
                Err(status_to_error(&status))
            }
        }
    }

    async fn get_master_configuration(
        &self,
        master: &ServerAddress,
    ) -> Result<GetMasterConfigurationResponse> {
        let mut client = self.get_or_connect(master).await?;
        match client
            .get_master_configuration(GetMasterConfigurationRequest {})
            .await
        {
            Ok(response) => Ok(response.into_inner()),
            Err(status) => {
                self.evict_on_unavailable(master, &status).await;
                Err(status_to_error(&status))
            }
        }
    }
}

/// Map a gRPC status onto the crate error
pub fn status_to_error(status: &Status) -> Error {
    match status.code() {
        Code::DeadlineExceeded => Error::Timeout,
        Code::Unavailable => Error::ConnectFailed(status.message().to_string()),
        code => Error::rpc(format!("{code:?}"), status.message()),
    }
}
