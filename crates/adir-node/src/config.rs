//! Layered configuration: a TOML file on disk, overlaid by environment
//! variables named after the same keys upper-cased. A bare
//! `toml`/`serde_json` read with no config-crate in between; the overlay
//! is hand-rolled rather than pulled in from `config`.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_listen_address() -> SocketAddr {
    "0.0.0.0:8980".parse().unwrap()
}

fn default_health_port() -> u16 {
    8081
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub ssl_mode: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 0,
            database: "adir.db".into(),
            username: String::new(),
            password: String::new(),
            ssl_mode: "disable".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerSectionConfig {
    pub listen_addr: String,
    pub bootstrap_peers: Vec<String>,
    pub default_max_hops: u32,
}

impl Default for PeerSectionConfig {
    fn default() -> Self {
        let defaults = adir_peer::PeerConfig::default();
        Self {
            listen_addr: defaults.listen_addr,
            bootstrap_peers: defaults.bootstrap_peers,
            default_max_hops: defaults.default_max_hops,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSectionConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for TaskSectionConfig {
    fn default() -> Self {
        Self { enabled: true, interval_secs: 60 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerSectionConfig {
    pub indexer: TaskSectionConfig,
    pub regsync: TaskSectionConfig,
    pub naming: NamingSectionConfig,
}

impl Default for ReconcilerSectionConfig {
    fn default() -> Self {
        Self {
            indexer: TaskSectionConfig { interval_secs: 30, ..Default::default() },
            regsync: TaskSectionConfig { interval_secs: 60, ..Default::default() },
            naming: NamingSectionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingSectionConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub ttl_secs: u64,
    pub allow_insecure: bool,
    pub record_timeout_secs: u64,
}

impl Default for NamingSectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
            ttl_secs: 3600,
            allow_insecure: false,
            record_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSectionConfig {
    pub allow_network: bool,
}

impl Default for ResolverSectionConfig {
    fn default() -> Self {
        Self { allow_network: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    #[serde(with = "socket_addr_as_string")]
    pub listen_address: SocketAddr,
    pub health_port: u16,
    pub data_dir: PathBuf,
    pub db: DbConfig,
    pub registry_url: String,
    pub peer: PeerSectionConfig,
    pub reconciler: ReconcilerSectionConfig,
    pub resolver: ResolverSectionConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            health_port: default_health_port(),
            data_dir: default_data_dir(),
            db: DbConfig::default(),
            registry_url: String::new(),
            peer: PeerSectionConfig::default(),
            reconciler: ReconcilerSectionConfig::default(),
            resolver: ResolverSectionConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load the base config from `path` if it exists (a missing file is
    /// not an error — every field just keeps its default), then overlay
    /// environment variables named after the flattened key, upper-cased
    /// and `_`-joined (e.g. `ADIR_HEALTH_PORT`, `ADIR_DB_HOST`).
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(path)?;
                toml::from_str(&raw)?
            }
            _ => NodeConfig::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ADIR_LISTEN_ADDRESS") {
            if let Ok(addr) = v.parse() {
                self.listen_address = addr;
            }
        }
        if let Some(v) = env_parsed("ADIR_HEALTH_PORT") {
            self.health_port = v;
        }
        if let Ok(v) = std::env::var("ADIR_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("ADIR_DB_HOST") {
            self.db.host = v;
        }
        if let Some(v) = env_parsed("ADIR_DB_PORT") {
            self.db.port = v;
        }
        if let Ok(v) = std::env::var("ADIR_DB_DATABASE") {
            self.db.database = v;
        }
        if let Ok(v) = std::env::var("ADIR_DB_USERNAME") {
            self.db.username = v;
        }
        if let Ok(v) = std::env::var("ADIR_DB_PASSWORD") {
            self.db.password = v;
        }
        if let Ok(v) = std::env::var("ADIR_DB_SSL_MODE") {
            self.db.ssl_mode = v;
        }
        if let Ok(v) = std::env::var("ADIR_REGISTRY_URL") {
            self.registry_url = v;
        }
        if let Ok(v) = std::env::var("ADIR_PEER_LISTEN_ADDR") {
            self.peer.listen_addr = v;
        }
        if let Ok(v) = std::env::var("ADIR_PEER_BOOTSTRAP_PEERS") {
            self.peer.bootstrap_peers = v.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect();
        }
        if let Some(v) = env_parsed("ADIR_NAMING_ENABLED") {
            self.reconciler.naming.enabled = v;
        }
        if let Some(v) = env_parsed("ADIR_NAMING_TTL_SECS") {
            self.reconciler.naming.ttl_secs = v;
        }
        if let Some(v) = env_parsed("ADIR_NAMING_ALLOW_INSECURE") {
            self.reconciler.naming.allow_insecure = v;
        }
        if let Some(v) = env_parsed("ADIR_RESOLVER_ALLOW_NETWORK") {
            self.resolver.allow_network = v;
        }
    }

    pub fn peer_config(&self) -> adir_peer::PeerConfig {
        adir_peer::PeerConfig {
            listen_addr: self.peer.listen_addr.clone(),
            bootstrap_peers: self.peer.bootstrap_peers.clone(),
            default_max_hops: self.peer.default_max_hops,
            ..Default::default()
        }
    }

    pub fn naming_interval(&self) -> Duration {
        Duration::from_secs(self.reconciler.naming.interval_secs)
    }

    pub fn naming_ttl(&self) -> Duration {
        Duration::from_secs(self.reconciler.naming.ttl_secs)
    }

    pub fn naming_record_timeout(&self) -> Duration {
        Duration::from_secs(self.reconciler.naming.record_timeout_secs)
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

mod socket_addr_as_string {
    use std::net::SocketAddr;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(addr: &SocketAddr, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&addr.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<SocketAddr, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_toml() {
        let config = NodeConfig::default();
        let rendered = toml::to_string_pretty(&config).unwrap();
        let parsed: NodeConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.listen_address, config.listen_address);
        assert_eq!(parsed.reconciler.naming.ttl_secs, config.reconciler.naming.ttl_secs);
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let config = NodeConfig::load(Some(Path::new("/nonexistent/adir.toml"))).unwrap();
        assert_eq!(config.health_port, default_health_port());
    }
}
