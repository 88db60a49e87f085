//! VolRoute Client - Master client and volume routing
//!
//! This crate keeps a session with the leading master, mirrors the
//! volume locations it pushes into a local routing table, and resolves
//! file ids to volume server URLs.

pub mod event;
pub mod master;
pub mod metrics;
pub mod peer;
pub mod routing;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-exports
pub use master::{LookupFileIdFunction, MasterClient};
pub use metrics::{ConnectOutcome, ConnectionCounters};
pub use peer::{PeerObserver, PeerUpdate};
pub use routing::RoutingTable;
pub use transport::{GrpcMasterTransport, MasterTransport};
