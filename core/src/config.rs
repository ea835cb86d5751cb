//! Reflector configuration: loading, validation and the `Config`/`Device`
//! record described in spec.md §3.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::mac::MacAddr;

/// VLAN IDs are 12-bit; 0 and 4095 are reserved by 802.1Q.
pub const MIN_VLAN_ID: u16 = 1;
pub const MAX_VLAN_ID: u16 = 4094;

#[derive(Debug, Clone, Deserialize)]
pub struct Device {
    pub origin_pool: u16,
    #[serde(default)]
    pub shared_pools: Vec<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub net_interface: String,
    pub devices: HashMap<MacAddr, Device>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load and validate configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let builder = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Yaml))
            .add_source(config::Environment::default().separator("__"));
        let raw = builder.build()?;
        let cfg: Config = raw.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// First-found-wins search across the standard config locations
    /// (spec.md §6), then load and validate.
    pub fn discover() -> Result<Self, ConfigError> {
        let path = Self::discover_path().ok_or(ConfigError::NotFound)?;
        Self::from_file(path)
    }

    fn discover_path() -> Option<PathBuf> {
        let mut candidates = vec![PathBuf::from("/etc/multicast-proxy/config.yaml")];
        if let Ok(home) = std::env::var("HOME") {
            candidates.push(PathBuf::from(home).join(".multicast-proxy/config.yaml"));
        }
        candidates.push(PathBuf::from("./config.yaml"));
        candidates.into_iter().find(|p| p.exists())
    }

    /// Validate invariants from spec.md §3: VLAN IDs fit in 12 bits,
    /// an origin pool never appears in its own shared pools, and
    /// `net_interface` is non-empty. MAC key uniqueness is guaranteed by
    /// `HashMap`'s key semantics.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.net_interface.is_empty() {
            return Err(ConfigError::EmptyInterface);
        }

        for (mac, device) in &self.devices {
            validate_vlan(device.origin_pool)?;
            for &shared in &device.shared_pools {
                validate_vlan(shared)?;
                if shared == device.origin_pool {
                    return Err(ConfigError::OriginInSharedPools {
                        mac: mac.to_string(),
                        pool: shared,
                    });
                }
            }
        }

        Ok(())
    }
}

fn validate_vlan(id: u16) -> Result<(), ConfigError> {
    if id < MIN_VLAN_ID || id > MAX_VLAN_ID {
        return Err(ConfigError::InvalidVlan(id as u32));
    }
    Ok(())
}
