//! VolRoute Protocol - master service definitions
//!
//! Wire messages exchanged with master nodes and the generated gRPC
//! client stub for the `master_pb.Seaweed` service.

/// Master service (leader stream, volume lookup, configuration)
pub mod master;
