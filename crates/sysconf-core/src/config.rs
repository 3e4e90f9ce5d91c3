//! Configuration types for the sysconf daemon
//!
//! This module defines the daemon's own settings. The managed `system`
//! configuration lives in [`crate::model`] and arrives through the
//! configuration store, never through this file.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main daemon configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SysconfConfig {
    /// Network link that resolver settings are scoped to
    pub link: LinkConfig,

    /// Local-time representation
    #[serde(default)]
    pub localtime: LocaltimeConfig,

    /// Where the running configuration is kept
    #[serde(default)]
    pub datastore: DatastoreConfig,

    /// Change pipeline settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// System bus connection settings
    #[serde(default)]
    pub bus: BusConfig,
}

impl SysconfConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.link.validate()?;
        self.localtime.validate()?;
        self.datastore.validate()?;
        self.pipeline.validate()?;
        self.bus.validate()?;
        Ok(())
    }
}

/// Resolver link scope
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Interface index of the link (see `ip link`)
    pub ifindex: i32,
}

impl LinkConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.ifindex <= 0 {
            return Err(crate::Error::config(format!(
                "Link ifindex must be > 0, got {}",
                self.ifindex
            )));
        }
        Ok(())
    }
}

/// Local-time settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaltimeConfig {
    /// Symbolic link that selects the system local time
    #[serde(default = "default_localtime_path")]
    pub path: String,

    /// Root of the zone database
    #[serde(default = "default_zoneinfo_dir")]
    pub zoneinfo_dir: String,
}

impl LocaltimeConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.path.is_empty() {
            return Err(crate::Error::config("Localtime path cannot be empty"));
        }
        if self.zoneinfo_dir.is_empty() {
            return Err(crate::Error::config("Zoneinfo directory cannot be empty"));
        }
        Ok(())
    }
}

impl Default for LocaltimeConfig {
    fn default() -> Self {
        Self {
            path: default_localtime_path(),
            zoneinfo_dir: default_zoneinfo_dir(),
        }
    }
}

fn default_localtime_path() -> String {
    "/etc/localtime".to_string()
}

fn default_zoneinfo_dir() -> String {
    "/usr/share/zoneinfo".to_string()
}

/// Datastore configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DatastoreConfig {
    /// JSON file with atomic writes and a backup copy
    File {
        /// Path to the datastore file
        path: String,
    },

    /// In-memory (not persistent)
    #[default]
    Memory,
}

impl DatastoreConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            DatastoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("Datastore file path cannot be empty"))
            }
            _ => Ok(()),
        }
    }
}

/// Change pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound for each external call, in milliseconds
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Capacity of the pipeline event channel
    ///
    /// When full, new events are dropped with a warning log.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Read live state back after each commit and report differences
    #[serde(default = "default_verify_readback")]
    pub verify_readback: bool,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !(100..=60_000).contains(&self.call_timeout_ms) {
            return Err(crate::Error::config(format!(
                "Call timeout must be between 100 and 60000 ms, got {}",
                self.call_timeout_ms
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: default_call_timeout_ms(),
            event_channel_capacity: default_event_channel_capacity(),
            verify_readback: default_verify_readback(),
        }
    }
}

fn default_call_timeout_ms() -> u64 {
    5000
}

fn default_event_channel_capacity() -> usize {
    256
}

fn default_verify_readback() -> bool {
    true
}

/// System bus connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Connection attempts before a call fails with `ServiceUnavailable`
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,

    /// Delay between connection attempts, in milliseconds
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

impl BusConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !(1..=10).contains(&self.reconnect_attempts) {
            return Err(crate::Error::config(format!(
                "Reconnect attempts must be between 1 and 10, got {}",
                self.reconnect_attempts
            )));
        }
        Ok(())
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            reconnect_attempts: default_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

fn default_reconnect_attempts() -> u32 {
    3
}

fn default_reconnect_delay_ms() -> u64 {
    200
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_need_a_link() {
        let mut config = SysconfConfig::default();
        assert!(config.validate().is_err());

        config.link.ifindex = 2;
        assert!(config.validate().is_ok());
        assert_eq!(config.localtime.path, "/etc/localtime");
        assert_eq!(config.pipeline.call_timeout(), Duration::from_secs(5));
        assert_eq!(config.datastore, DatastoreConfig::Memory);
    }

    #[test]
    fn parses_partial_json_with_defaults() {
        let config: SysconfConfig = serde_json::from_value(serde_json::json!({
            "link": { "ifindex": 3 },
            "datastore": { "type": "file", "path": "/var/lib/sysconf/running.json" },
            "pipeline": { "verify_readback": false }
        }))
        .unwrap();

        assert_eq!(config.link.ifindex, 3);
        assert_eq!(
            config.datastore,
            DatastoreConfig::File {
                path: "/var/lib/sysconf/running.json".to_string()
            }
        );
        assert!(!config.pipeline.verify_readback);
        assert_eq!(config.pipeline.call_timeout_ms, 5000);
        assert_eq!(config.bus.reconnect_attempts, 3);
    }

    #[test]
    fn rejects_out_of_range_knobs() {
        let pipeline = PipelineConfig {
            call_timeout_ms: 50,
            ..Default::default()
        };
        assert!(pipeline.validate().is_err());

        let bus = BusConfig {
            reconnect_attempts: 0,
            ..Default::default()
        };
        assert!(bus.validate().is_err());

        assert!(
            DatastoreConfig::File {
                path: String::new()
            }
            .validate()
            .is_err()
        );
    }
}
