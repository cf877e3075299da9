use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_derive::{Serialize, Deserialize};

use super::error::ConfigError;

/// Which engine produces the outgoing packets. Chosen once at startup, not per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketSourceKind {
    Recorded,
    Constructed,
}

/// Recorded playback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub capture_file: PathBuf,
    pub realtime_pause_ms: u64,
    pub other_pause_ms: u64,
    pub restart_pause_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            capture_file: PathBuf::from("GripPacketsForSimulator.gpk"),
            realtime_pause_ms: 500,
            other_pause_ms: 20,
            restart_pause_ms: 10_000,
        }
    }
}

impl PlaybackConfig {
    pub fn realtime_pause(&self) -> Duration {
        Duration::from_millis(self.realtime_pause_ms)
    }

    pub fn other_pause(&self) -> Duration {
        Duration::from_millis(self.other_pause_ms)
    }

    pub fn restart_pause(&self) -> Duration {
        Duration::from_millis(self.restart_pause_ms)
    }
}

/// Constructed synthesis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub settle_ms: u64,
    pub cadence_ms: u64,
    pub packets_per_epoch: u64,
    pub epoch_pause_ms: u64,
    pub occlusion_probability: f64,
    pub min_dropout_slices: u32,
    pub max_dropout_slices: u32,
    pub seed: Option<u64>,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            settle_ms: 50,
            cadence_ms: 500,
            packets_per_epoch: 20,
            epoch_pause_ms: 5_000,
            occlusion_probability: 1000.0 / 32768.0,
            min_dropout_slices: 5,
            max_dropout_slices: 15,
            seed: None,
        }
    }
}

impl SynthesisConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn epoch_pause(&self) -> Duration {
        Duration::from_millis(self.epoch_pause_ms)
    }
}

/// Packet cache settings. Cache files are named {root}.rt.gpk, {root}.hk.gpk and {root}.any.gpk
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub root: PathBuf,
    pub max_open_retries: u32,
    pub retry_pause_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("GripPackets"),
            max_open_retries: 5,
            retry_pause_ms: 1_000,
            poll_interval_ms: 1_000,
        }
    }
}

impl CacheConfig {
    pub fn retry_pause(&self) -> Duration {
        Duration::from_millis(self.retry_pause_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// # Config
/// Structure representing the emulator configuration. Every field has a default, so a config
/// file only needs to name what it changes.
/// Configs are serializable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind_address: String,
    pub port: u16,
    pub packet_source: PacketSourceKind,
    pub alert_on_fatal: bool,
    pub playback: PlaybackConfig,
    pub synthesis: SynthesisConfig,
    pub cache: CacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: String::from("0.0.0.0"),
            port: 2345,
            packet_source: PacketSourceKind::Recorded,
            alert_on_fatal: false,
            playback: PlaybackConfig::default(),
            synthesis: SynthesisConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Config {

    /// Read the configuration in a YAML file
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Write the configuration to a YAML file
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        let mut conf_file = File::create(config_path)?;
        conf_file.write_all(yaml_str.as_bytes())?;
        Ok(())
    }

    /// Address the listening socket binds to
    pub fn get_listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}
