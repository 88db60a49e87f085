//! Configuration types for VolRoute
//!
//! This module defines the master client configuration and its retry
//! policy settings.

use crate::error::{Error, Result};
use crate::types::{ClientIdentity, ServerAddress};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Master client configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Master addresses, tried in this order on every pass
    pub masters: Vec<String>,
    /// Filer group this client belongs to
    pub filer_group: String,
    /// Client kind reported in the handshake
    pub client_type: String,
    /// Address this client advertises
    pub client_host: String,
    /// Preferred data center for ordering lookup results (empty = none)
    pub data_center: String,
    /// Pause between full passes over the master list (milliseconds)
    pub reconnect_pause_ms: u64,
    /// Timeout for asking a peer master who the leader is (milliseconds)
    pub peer_query_timeout_ms: u64,
    /// Timeout for establishing a connection to a master (milliseconds)
    pub connect_timeout_ms: u64,
    /// Retry policy for master-directed RPCs
    pub retry: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            masters: vec!["localhost:9333".to_string()],
            filer_group: String::new(),
            client_type: "client".to_string(),
            client_host: String::new(),
            data_center: String::new(),
            reconnect_pause_ms: 1000,
            peer_query_timeout_ms: 120,
            connect_timeout_ms: 5000,
            retry: RetryConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Check that the configuration can be used to build a client
    pub fn validate(&self) -> Result<()> {
        if self.masters.is_empty() {
            return Err(Error::configuration("at least one master is required"));
        }
        for master in &self.masters {
            ServerAddress::new(master.as_str()).grpc_address()?;
        }
        self.retry.validate()
    }

    /// Configured masters, in order, with duplicates removed
    #[must_use]
    pub fn master_addresses(&self) -> Vec<ServerAddress> {
        let mut addresses: Vec<ServerAddress> = Vec::with_capacity(self.masters.len());
        for master in &self.masters {
            let addr = ServerAddress::new(master.trim());
            if !addresses.contains(&addr) {
                addresses.push(addr);
            }
        }
        addresses
    }

    /// Identity presented on every handshake
    #[must_use]
    pub fn identity(&self) -> ClientIdentity {
        ClientIdentity::new(
            self.filer_group.clone(),
            self.client_type.clone(),
            self.client_host.as_str(),
        )
    }

    #[must_use]
    pub const fn reconnect_pause(&self) -> Duration {
        Duration::from_millis(self.reconnect_pause_ms)
    }

    #[must_use]
    pub const fn peer_query_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_query_timeout_ms)
    }

    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Backoff settings for retried RPCs
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// First wait after a failed attempt (milliseconds)
    pub initial_backoff_ms: u64,
    /// Growth factor applied to the wait after each failure
    pub backoff_multiplier: f64,
    /// Attempts stop once the next wait would reach this (milliseconds)
    pub max_backoff_ms: u64,
}

impl RetryConfig {
    /// Check that the backoff grows towards a reachable limit
    pub fn validate(&self) -> Result<()> {
        if self.initial_backoff_ms == 0 {
            return Err(Error::configuration("retry.initial_backoff_ms must be > 0"));
        }
        if !(self.backoff_multiplier > 1.0 && self.backoff_multiplier.is_finite()) {
            return Err(Error::configuration("retry.backoff_multiplier must be > 1.0"));
        }
        if self.max_backoff_ms <= self.initial_backoff_ms {
            return Err(Error::configuration(
                "retry.max_backoff_ms must exceed retry.initial_backoff_ms",
            ));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 1000,
            backoff_multiplier: 1.5,
            max_backoff_ms: 6000,
        }
    }
}
