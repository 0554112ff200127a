use std::path::Path;
use std::time::Duration;

use janus_protocol::Settings;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub address: String,
    pub port: u16,
    pub motd: String,
    pub max_players: u32,
    pub compression_threshold: i32,
    pub keep_alive_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_owned(),
            port: 25565,
            motd: "A janus bridge".to_owned(),
            max_players: 20,
            compression_threshold: 256,
            keep_alive_timeout_secs: 20,
        }
    }
}

impl Config {
    /// Reads the config file, falling back to defaults when it is missing
    /// or unparsable.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let Ok(raw) = std::fs::read_to_string(path) else {
            warn!("no config at {}, using defaults", path.display());
            return Self::default();
        };
        match toml::from_str(&raw) {
            Ok(config) => config,
            Err(e) => {
                warn!("ignoring invalid config {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn gateway_settings(&self) -> Settings {
        Settings {
            compression_threshold: self.compression_threshold,
            max_players: self.max_players,
            keep_alive_timeout: Duration::from_secs(self.keep_alive_timeout_secs),
            brand: "janus".to_owned(),
        }
    }
}
