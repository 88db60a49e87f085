//! Core value types for VolRoute
//!
//! Addresses, volume locations, file identifiers and the static client
//! identity sent to masters on every handshake.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-assigned volume identifier
pub type VolumeId = u32;

/// Offset between a server's HTTP port and its default gRPC port
pub const GRPC_PORT_OFFSET: u16 = 10_000;

/// Address of a master or volume server.
///
/// Written as `host:port`, or `host:port.grpcPort` when the gRPC port is
/// not the default `port + 10000`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerAddress(String);

impl ServerAddress {
    /// Create an address from its textual form
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// Create an address from an HTTP `host:port` and an explicit gRPC port.
    ///
    /// A zero or default gRPC port is left implicit.
    #[must_use]
    pub fn with_grpc_port(http_address: &str, grpc_port: u32) -> Self {
        if grpc_port == 0 {
            return Self::new(http_address);
        }
        match split_host_port(http_address) {
            Some((_, port)) if default_grpc_port(port).map(u32::from) == Some(grpc_port) => {
                Self::new(http_address)
            }
            _ => Self(format!("{http_address}.{grpc_port}")),
        }
    }

    /// Textual form, as configured
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the empty ("unknown") address
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The `host:port` part, without any explicit gRPC port suffix
    #[must_use]
    pub fn http_address(&self) -> &str {
        match split_host_port(&self.0) {
            Some((host, port)) => match port.split_once('.') {
                Some((http_port, _)) => &self.0[..host.len() + 1 + http_port.len()],
                None => &self.0,
            },
            None => &self.0,
        }
    }

    /// The `host:grpcPort` the master's gRPC service listens on
    pub fn grpc_address(&self) -> Result<String> {
        let (host, port) = split_host_port(&self.0)
            .ok_or_else(|| Error::InvalidAddress(self.0.clone()))?;

        let grpc_port = match port.split_once('.') {
            Some((_, grpc)) => grpc.parse::<u16>().ok(),
            None => default_grpc_port(port),
        }
        .ok_or_else(|| Error::InvalidAddress(self.0.clone()))?;

        Ok(format!("{host}:{grpc_port}"))
    }

    /// URI suitable for dialing with a gRPC channel
    pub fn grpc_endpoint(&self) -> Result<String> {
        Ok(format!("http://{}", self.grpc_address()?))
    }
}

/// `port + 10000`, if both are valid ports
fn default_grpc_port(http_port: &str) -> Option<u16> {
    http_port.parse::<u16>().ok()?.checked_add(GRPC_PORT_OFFSET)
}

fn split_host_port(addr: &str) -> Option<(&str, &str)> {
    let (host, port) = addr.rsplit_once(':')?;
    if host.is_empty() || port.is_empty() {
        return None;
    }
    Some((host, port))
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServerAddress {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ServerAddress {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One volume-server endpoint hosting a volume
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Internal `host:port` used for reads and writes
    pub url: String,
    /// Externally reachable `host:port`
    pub public_url: String,
    /// Data center the server lives in (may be empty)
    pub data_center: String,
    /// gRPC port, zero when the default applies
    pub grpc_port: u32,
}

impl Location {
    pub fn new(url: impl Into<String>, public_url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            public_url: public_url.into(),
            data_center: String::new(),
            grpc_port: 0,
        }
    }

    /// Set the data center
    #[must_use]
    pub fn with_data_center(mut self, data_center: impl Into<String>) -> Self {
        self.data_center = data_center.into();
        self
    }

    /// Set the gRPC port
    #[must_use]
    pub const fn with_grpc_port(mut self, grpc_port: u32) -> Self {
        self.grpc_port = grpc_port;
        self
    }

    /// Address of the volume server, including a non-default gRPC port
    #[must_use]
    pub fn server_address(&self) -> ServerAddress {
        ServerAddress::with_grpc_port(&self.url, self.grpc_port)
    }

    /// Download URL for a file stored on this server
    #[must_use]
    pub fn file_url(&self, file_id: &str) -> String {
        format!("http://{}/{}", self.url, file_id)
    }
}

/// A parsed `<volumeId>,<needleIdAndCookie>` file identifier
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileId<'a> {
    pub volume_id: VolumeId,
    pub needle: &'a str,
}

impl<'a> FileId<'a> {
    /// Parse a file id such as `3,01637037d6`
    pub fn parse(file_id: &'a str) -> Result<Self> {
        let (vid, needle) = file_id
            .split_once(',')
            .ok_or_else(|| Error::InvalidFileId(file_id.to_string()))?;
        let volume_id = vid
            .trim()
            .parse::<VolumeId>()
            .map_err(|_| Error::InvalidFileId(file_id.to_string()))?;
        Ok(Self { volume_id, needle })
    }
}

/// Extract the volume id from either a bare volume id or a file id
pub fn parse_volume_or_file_id(s: &str) -> Result<VolumeId> {
    let vid = s.split_once(',').map_or(s, |(vid, _)| vid);
    vid.trim()
        .parse::<VolumeId>()
        .map_err(|_| Error::InvalidFileId(s.to_string()))
}

/// Static identity a client presents to the master
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    /// Filer group scoping which peer updates this client observes
    pub filer_group: String,
    /// Client kind, e.g. "filer" or "shell"
    pub client_type: String,
    /// Address this client is reachable at
    pub client_host: ServerAddress,
}

impl ClientIdentity {
    pub fn new(
        filer_group: impl Into<String>,
        client_type: impl Into<String>,
        client_host: impl Into<ServerAddress>,
    ) -> Self {
        Self {
            filer_group: filer_group.into(),
            client_type: client_type.into(),
            client_host: client_host.into(),
        }
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.filer_group, self.client_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grpc_address_default_offset() {
        let addr = ServerAddress::new("localhost:9333");
        assert_eq!(addr.grpc_address().unwrap(), "localhost:19333");
        assert_eq!(addr.grpc_endpoint().unwrap(), "http://localhost:19333");
        assert_eq!(addr.http_address(), "localhost:9333");
    }

    #[test]
    fn test_grpc_address_explicit_port() {
        let addr = ServerAddress::new("10.0.0.1:9333.7777");
        assert_eq!(addr.grpc_address().unwrap(), "10.0.0.1:7777");
        assert_eq!(addr.http_address(), "10.0.0.1:9333");
    }

    #[test]
    fn test_grpc_address_invalid() {
        assert!(ServerAddress::new("no-port").grpc_address().is_err());
        assert!(ServerAddress::new("host:abc").grpc_address().is_err());
        assert!(ServerAddress::default().grpc_address().is_err());
    }

    #[test]
    fn test_grpc_address_port_out_of_range() {
        for addr in ["h:4294967295", "h:70000", "h:60000", "h:9333.70000"] {
            assert!(
                matches!(ServerAddress::new(addr).grpc_address(), Err(Error::InvalidAddress(_))),
                "{addr}"
            );
        }
        assert_eq!(ServerAddress::new("h:55535").grpc_address().unwrap(), "h:65535");
    }

    #[test]
    fn test_with_grpc_port() {
        assert_eq!(ServerAddress::with_grpc_port("h:8080", 0).as_str(), "h:8080");
        assert_eq!(ServerAddress::with_grpc_port("h:8080", 18080).as_str(), "h:8080");
        assert_eq!(ServerAddress::with_grpc_port("h:8080", 9000).as_str(), "h:8080.9000");
        assert_eq!(ServerAddress::with_grpc_port("h:4294967295", 9999).as_str(), "h:4294967295.9999");
    }

    #[test]
    fn test_file_id_parse() {
        let fid = FileId::parse("7,abc").unwrap();
        assert_eq!(fid.volume_id, 7);
        assert_eq!(fid.needle, "abc");

        assert!(matches!(FileId::parse("7abc"), Err(Error::InvalidFileId(_))));
        assert!(matches!(FileId::parse("x,abc"), Err(Error::InvalidFileId(_))));
    }

    #[test]
    fn test_parse_volume_or_file_id() {
        assert_eq!(parse_volume_or_file_id("12").unwrap(), 12);
        assert_eq!(parse_volume_or_file_id("12,01ab").unwrap(), 12);
        assert!(parse_volume_or_file_id("").is_err());
    }

    #[test]
    fn test_location_urls() {
        let loc = Location::new("vol1:8080", "pub1:8080").with_data_center("dc1");
        assert_eq!(loc.file_url("3,01ab"), "http://vol1:8080/3,01ab");
        assert_eq!(loc.server_address().as_str(), "vol1:8080");
    }

    #[test]
    fn test_client_identity_display() {
        let id = ClientIdentity::new("g1", "filer", "filer1:8888");
        assert_eq!(id.to_string(), "g1.filer");
    }
}
