//! Relay timing and capacity configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Per-connection and fleet timing for the relay
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Outbound messages buffered per client before new ones are dropped
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,

    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_secs: u64,

    /// Silence allowed from a client before it is dropped
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    #[serde(default = "default_client_record_ttl")]
    pub client_record_ttl_secs: u64,

    #[serde(default = "default_server_heartbeat")]
    pub server_heartbeat_secs: u64,

    #[serde(default = "default_server_ttl")]
    pub server_ttl_secs: u64,

    /// How long the pairing loop blocks on an empty queue
    #[serde(default = "default_queue_pop_timeout")]
    pub queue_pop_timeout_secs: u64,

    /// Pause after a failed pairing pass
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Time allowed to flush the close frame on teardown
    #[serde(default = "default_close_grace")]
    pub close_grace_ms: u64,
}

impl RelayConfig {
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn server_heartbeat(&self) -> Duration {
        Duration::from_secs(self.server_heartbeat_secs)
    }

    pub fn queue_pop_timeout(&self) -> Duration {
        Duration::from_secs(self.queue_pop_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }

    /// Validate relay configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.outbound_queue_capacity == 0 {
            return Err(ValidationError::InvalidQueueCapacity);
        }
        for (name, value) in [
            ("keepalive_interval_secs", self.keepalive_interval_secs),
            ("client_record_ttl_secs", self.client_record_ttl_secs),
            ("server_heartbeat_secs", self.server_heartbeat_secs),
            ("queue_pop_timeout_secs", self.queue_pop_timeout_secs),
        ] {
            if value == 0 {
                return Err(ValidationError::InvalidRelayTiming(name));
            }
        }
        if self.server_heartbeat_secs >= self.server_ttl_secs {
            return Err(ValidationError::HeartbeatNotBelowTtl);
        }
        if self.keepalive_interval_secs >= self.read_timeout_secs {
            return Err(ValidationError::KeepaliveNotBelowReadTimeout);
        }
        Ok(())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: default_outbound_queue_capacity(),
            keepalive_interval_secs: default_keepalive_interval(),
            read_timeout_secs: default_read_timeout(),
            client_record_ttl_secs: default_client_record_ttl(),
            server_heartbeat_secs: default_server_heartbeat(),
            server_ttl_secs: default_server_ttl(),
            queue_pop_timeout_secs: default_queue_pop_timeout(),
            retry_backoff_ms: default_retry_backoff(),
            close_grace_ms: default_close_grace(),
        }
    }
}

fn default_outbound_queue_capacity() -> usize {
    256
}

fn default_keepalive_interval() -> u64 {
    30
}

fn default_read_timeout() -> u64 {
    60
}

fn default_client_record_ttl() -> u64 {
    7200
}

fn default_server_heartbeat() -> u64 {
    55
}

fn default_server_ttl() -> u64 {
    60
}

fn default_queue_pop_timeout() -> u64 {
    1
}

fn default_retry_backoff() -> u64 {
    500
}

fn default_close_grace() -> u64 {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_config_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.outbound_queue_capacity, 256);
        assert_eq!(config.keepalive_interval(), Duration::from_secs(30));
        assert_eq!(config.read_timeout(), Duration::from_secs(60));
        assert_eq!(config.client_record_ttl_secs, 7200);
        assert_eq!(config.server_heartbeat(), Duration::from_secs(55));
        assert_eq!(config.server_ttl_secs, 60);
        assert_eq!(config.retry_backoff(), Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let config = RelayConfig {
            outbound_queue_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidQueueCapacity));
    }

    #[test]
    fn test_heartbeat_must_undercut_ttl() {
        let config = RelayConfig {
            server_heartbeat_secs: 60,
            server_ttl_secs: 60,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::HeartbeatNotBelowTtl));
    }

    #[test]
    fn test_keepalive_must_undercut_read_timeout() {
        let config = RelayConfig {
            keepalive_interval_secs: 90,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::KeepaliveNotBelowReadTimeout)
        );
    }

    #[test]
    fn test_zero_timing_is_rejected() {
        let config = RelayConfig {
            queue_pop_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidRelayTiming("queue_pop_timeout_secs"))
        );
    }
}
