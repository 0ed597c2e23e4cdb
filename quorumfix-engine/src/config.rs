/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Engine configuration.
//!
//! Every deployment option in one place, deserializable from any serde
//! source. Config-file discovery and CLI parsing live with the embedding
//! application.

use quorumfix_cluster::ClusterConfig;
use quorumfix_core::types::CompId;
use quorumfix_session::SessionConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration validation failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Clustered gateways must log both directions; replication is the log.
    #[error("clustered deployments require log_inbound_messages and log_outbound_messages")]
    ClusterRequiresLogging,

    /// The election timeout range is empty or inverted.
    #[error("election timeout range invalid: min {min_ms} >= max {max_ms}")]
    ElectionTimeoutRange {
        /// Configured lower bound.
        min_ms: u64,
        /// Configured upper bound.
        max_ms: u64,
    },

    /// A retry bound of zero would drop messages without a single attempt.
    #[error("{what} must be at least 1")]
    ZeroRetryBound {
        /// The offending option.
        what: &'static str,
    },

    /// A comp id exceeded the wire limit.
    #[error("comp id too long: {value}")]
    CompIdTooLong {
        /// The rejected value.
        value: String,
    },
}

/// All engine options with their defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Local comp id stamped on outbound messages.
    pub sender_comp_id: String,
    /// FIX version BeginString.
    pub begin_string: String,
    /// Session liveness period in seconds.
    pub heartbeat_interval_seconds: u64,
    /// Maximum tolerated SendingTime skew.
    pub sending_time_window_ms: u64,
    /// Logon reply deadline.
    pub logon_timeout_ms: u64,
    /// Logout handshake deadline.
    pub logout_timeout_ms: u64,
    /// Whether inbound messages are written to the replicated log.
    pub log_inbound_messages: bool,
    /// Whether outbound messages are written to the replicated log.
    pub log_outbound_messages: bool,
    /// Claim retry bound for inbound publication.
    pub inbound_max_claim_attempts: u32,
    /// Claim retry bound for outbound publication.
    pub outbound_max_claim_attempts: u32,
    /// Archive mmap cache geometry: number of sets.
    pub logger_cache_num_sets: usize,
    /// Archive mmap cache geometry: ways per set.
    pub logger_cache_set_size: usize,
    /// Resend actions served per session poll.
    pub resend_batch: usize,
    /// Lower bound of the cluster election timeout.
    pub election_timeout_ms_min: u64,
    /// Upper bound of the cluster election timeout.
    pub election_timeout_ms_max: u64,
    /// Cluster leader heartbeat period.
    pub heartbeat_interval_ms: u64,
    /// This node's cluster id.
    pub node_id: u16,
    /// The other cluster members; empty means solo.
    pub peer_ids: Vec<u16>,
    /// Channel designator for the cluster transport.
    pub cluster_channel: String,
    /// Directory holding the registry, indices and hard state.
    pub data_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sender_comp_id: "GATEWAY".to_string(),
            begin_string: "FIX.4.4".to_string(),
            heartbeat_interval_seconds: 30,
            sending_time_window_ms: 120_000,
            logon_timeout_ms: 10_000,
            logout_timeout_ms: 10_000,
            log_inbound_messages: true,
            log_outbound_messages: true,
            inbound_max_claim_attempts: 10,
            outbound_max_claim_attempts: 10,
            logger_cache_num_sets: 8,
            logger_cache_set_size: 4,
            resend_batch: 16,
            election_timeout_ms_min: 150,
            election_timeout_ms_max: 300,
            heartbeat_interval_ms: 50,
            node_id: 1,
            peer_ids: Vec::new(),
            cluster_channel: "shm:cluster".to_string(),
            data_dir: PathBuf::from("quorumfix-data"),
        }
    }
}

impl EngineConfig {
    /// True when this gateway replicates through a cluster.
    #[must_use]
    pub fn is_clustered(&self) -> bool {
        !self.peer_ids.is_empty()
    }

    /// Checks cross-option invariants.
    ///
    /// # Errors
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.is_clustered() && !(self.log_inbound_messages && self.log_outbound_messages) {
            return Err(ConfigError::ClusterRequiresLogging);
        }
        if self.election_timeout_ms_min >= self.election_timeout_ms_max {
            return Err(ConfigError::ElectionTimeoutRange {
                min_ms: self.election_timeout_ms_min,
                max_ms: self.election_timeout_ms_max,
            });
        }
        if self.inbound_max_claim_attempts == 0 {
            return Err(ConfigError::ZeroRetryBound {
                what: "inbound_max_claim_attempts",
            });
        }
        if self.outbound_max_claim_attempts == 0 {
            return Err(ConfigError::ZeroRetryBound {
                what: "outbound_max_claim_attempts",
            });
        }
        CompId::new(&self.sender_comp_id).ok_or_else(|| ConfigError::CompIdTooLong {
            value: self.sender_comp_id.clone(),
        })?;
        Ok(())
    }

    /// Builds the per-session configuration for a counterparty.
    ///
    /// # Errors
    /// Returns `ConfigError::CompIdTooLong` when either comp id is invalid.
    pub fn session_config(&self, target_comp_id: &str) -> Result<SessionConfig, ConfigError> {
        let sender = CompId::new(&self.sender_comp_id).ok_or_else(|| ConfigError::CompIdTooLong {
            value: self.sender_comp_id.clone(),
        })?;
        let target = CompId::new(target_comp_id).ok_or_else(|| ConfigError::CompIdTooLong {
            value: target_comp_id.to_string(),
        })?;

        Ok(SessionConfig::new(sender, target, self.begin_string.clone())
            .with_heartbeat_interval(Duration::from_secs(self.heartbeat_interval_seconds))
            .with_sending_time_window_ms(self.sending_time_window_ms)
            .with_logon_timeout(Duration::from_millis(self.logon_timeout_ms))
            .with_logout_timeout(Duration::from_millis(self.logout_timeout_ms))
            .with_max_claim_attempts(self.inbound_max_claim_attempts)
            .with_resend_batch(self.resend_batch))
    }

    /// Builds the cluster node configuration.
    #[must_use]
    pub fn cluster_config(&self) -> ClusterConfig {
        let mut config = ClusterConfig::new(self.node_id, self.peer_ids.clone());
        config.election_timeout_min_ms = self.election_timeout_ms_min;
        config.election_timeout_max_ms = self.election_timeout_ms_max;
        config.heartbeat_interval_ms = self.heartbeat_interval_ms;
        config
    }
}
