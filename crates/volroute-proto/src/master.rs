//! `master_pb` messages
//!
//! Field tags follow the master's published protocol so this client can
//! talk to existing master nodes.

/// Handshake sent once when opening the keep-connected stream
#[derive(Clone, PartialEq, prost::Message)]
pub struct KeepConnectedRequest {
    #[prost(string, tag = "1")]
    pub client_type: String,
    #[prost(string, tag = "3")]
    pub client_address: String,
    #[prost(string, tag = "4")]
    pub version: String,
    #[prost(string, tag = "5")]
    pub filer_group: String,
    #[prost(string, tag = "6")]
    pub data_center: String,
    #[prost(string, tag = "7")]
    pub rack: String,
}

/// One message pushed by the master on the keep-connected stream
#[derive(Clone, PartialEq, prost::Message)]
pub struct KeepConnectedResponse {
    #[prost(message, optional, tag = "1")]
    pub volume_location: Option<VolumeLocation>,
    #[prost(message, optional, tag = "2")]
    pub cluster_node_update: Option<ClusterNodeUpdate>,
}

/// Volume changes on one volume server, or a leader announcement
#[derive(Clone, PartialEq, prost::Message)]
pub struct VolumeLocation {
    #[prost(string, tag = "1")]
    pub url: String,
    #[prost(string, tag = "2")]
    pub public_url: String,
    #[prost(uint32, repeated, tag = "3")]
    pub new_vids: Vec<u32>,
    #[prost(uint32, repeated, tag = "4")]
    pub deleted_vids: Vec<u32>,
    #[prost(string, tag = "5")]
    pub leader: String,
    #[prost(string, tag = "6")]
    pub data_center: String,
    #[prost(uint32, tag = "7")]
    pub grpc_port: u32,
    #[prost(uint32, repeated, tag = "8")]
    pub new_ec_vids: Vec<u32>,
    #[prost(uint32, repeated, tag = "9")]
    pub deleted_ec_vids: Vec<u32>,
}

/// Cluster membership change
#[derive(Clone, PartialEq, prost::Message)]
pub struct ClusterNodeUpdate {
    #[prost(string, tag = "1")]
    pub node_type: String,
    #[prost(string, tag = "2")]
    pub address: String,
    #[prost(bool, tag = "3")]
    pub is_leader: bool,
    #[prost(bool, tag = "4")]
    pub is_add: bool,
    #[prost(string, tag = "5")]
    pub filer_group: String,
    #[prost(int64, tag = "6")]
    pub created_at_ns: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LookupVolumeRequest {
    /// Volume ids or file ids (`vid,needle`)
    #[prost(string, repeated, tag = "1")]
    pub volume_or_file_ids: Vec<String>,
    #[prost(string, tag = "2")]
    pub collection: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LookupVolumeResponse {
    #[prost(message, repeated, tag = "1")]
    pub volume_id_locations: Vec<VolumeIdLocation>,
}

/// Locations for one requested volume or file id
#[derive(Clone, PartialEq, prost::Message)]
pub struct VolumeIdLocation {
    #[prost(string, tag = "1")]
    pub volume_or_file_id: String,
    #[prost(message, repeated, tag = "2")]
    pub locations: Vec<Location>,
    #[prost(string, tag = "3")]
    pub error: String,
    #[prost(string, tag = "4")]
    pub auth: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Location {
    #[prost(string, tag = "1")]
    pub url: String,
    #[prost(string, tag = "2")]
    pub public_url: String,
    #[prost(uint32, tag = "3")]
    pub grpc_port: u32,
    #[prost(string, tag = "4")]
    pub data_center: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetMasterConfigurationRequest {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetMasterConfigurationResponse {
    #[prost(string, tag = "1")]
    pub metrics_address: String,
    #[prost(uint32, tag = "2")]
    pub metrics_interval_seconds: u32,
    #[prost(string, tag = "4")]
    pub default_replication: String,
    #[prost(string, tag = "5")]
    pub leader: String,
    #[prost(uint32, tag = "6")]
    pub volume_size_limit_m_b: u32,
    #[prost(bool, tag = "7")]
    pub volume_preallocate: bool,
}

include!(concat!(env!("OUT_DIR"), "/master_pb.Seaweed.rs"));
