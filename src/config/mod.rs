//! # Configuration Management Module
//!
//! Receiver configuration is a TOML file with one section per concern:
//!
//! - [`DeviceConfig`] - serial port and polling behaviour
//! - [`FramerConfig`] - accumulation buffer and resynchronization rules
//! - [`ProfileBinding`] - which sender uses which EEP
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use enocean_rx::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Serial Port: {}", config.device.port);
//!
//!     Config::create_default("config.toml").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [device]
//! port = "/dev/ttyUSB0"
//! baud_rate = 57600
//! poll_interval_ms = 1
//! read_chunk_size = 8192
//!
//! [framer]
//! buffer_capacity = 40960
//! max_frame_len = 1024
//! verify_crc = false
//! on_type_mismatch = "skip-byte"   # or "discard-buffer"
//!
//! [[profiles]]
//! sender_id = "040189B8"
//! eep = "A5-09-04"
//!
//! [logging]
//! level = "info"
//! ```

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::enocean::esp3::{FRAME_OVERHEAD, MAX_FRAME_LEN};
use crate::enocean::framer::{DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_FRAME_LEN};
use crate::enocean::{FramerOptions, MismatchPolicy, SenderId};
use crate::profile::{self, ProfileRegistry, DEFAULT_SENDER};
use crate::receiver::ReceiverOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub device: DeviceConfig,
    #[serde(default)]
    pub framer: FramerConfig,
    #[serde(default = "default_profiles")]
    pub profiles: Vec<ProfileBinding>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Sleep between polls when no bytes are waiting (ms).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper bound for a single read from the port.
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,
}

fn default_baud_rate() -> u32 {
    57_600
}

fn default_poll_interval_ms() -> u64 {
    1
}

fn default_read_chunk_size() -> usize {
    8 * 1024
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FramerConfig {
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// Headers announcing larger frames are treated as false syncs.
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: usize,
    /// Drop frames whose header or data CRC8 does not match.
    #[serde(default)]
    pub verify_crc: bool,
    #[serde(default)]
    pub on_type_mismatch: MismatchPolicy,
}

fn default_buffer_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

fn default_max_frame_len() -> usize {
    DEFAULT_MAX_FRAME_LEN
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            verify_crc: false,
            on_type_mismatch: MismatchPolicy::SkipByte,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileBinding {
    pub sender_id: SenderId,
    pub eep: String,
}

fn default_profiles() -> Vec<ProfileBinding> {
    vec![ProfileBinding {
        sender_id: DEFAULT_SENDER,
        eep: profile::a50904::EEP.to_string(),
    }]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

impl Config {
    /// Load and validate a configuration file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config = Self::from_toml(&content)
            .map_err(|e| anyhow!("Failed to load config file {}: {}", path, e))?;

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let framer = &self.framer;
        if !(FRAME_OVERHEAD..=MAX_FRAME_LEN).contains(&framer.max_frame_len) {
            bail!(
                "framer.max_frame_len must be between {} and {} (got {})",
                FRAME_OVERHEAD,
                MAX_FRAME_LEN,
                framer.max_frame_len
            );
        }
        if self.device.read_chunk_size == 0 {
            bail!("device.read_chunk_size must be greater than zero");
        }
        // Room for a partial frame plus one full read, twice over.
        let required = 2 * framer.max_frame_len + self.device.read_chunk_size;
        if framer.buffer_capacity < required {
            bail!(
                "framer.buffer_capacity {} too small: need at least {} (2 × max_frame_len + read_chunk_size)",
                framer.buffer_capacity,
                required
            );
        }
        if self.device.baud_rate == 0 {
            bail!("device.baud_rate must be greater than zero");
        }
        for binding in &self.profiles {
            if profile::lookup_eep(&binding.eep).is_none() {
                bail!(
                    "profile for {} uses unsupported EEP {} (supported: {})",
                    binding.sender_id,
                    binding.eep,
                    profile::SUPPORTED_EEPS.join(", ")
                );
            }
        }
        Ok(())
    }

    pub fn framer_options(&self) -> FramerOptions {
        FramerOptions {
            capacity: self.framer.buffer_capacity,
            max_frame_len: self.framer.max_frame_len,
            verify_crc: self.framer.verify_crc,
            on_type_mismatch: self.framer.on_type_mismatch,
            ..FramerOptions::default()
        }
    }

    pub fn receiver_options(&self) -> ReceiverOptions {
        ReceiverOptions {
            poll_interval: Duration::from_millis(self.device.poll_interval_ms),
            read_chunk_size: self.device.read_chunk_size,
            stop_when_exhausted: false,
        }
    }

    pub fn registry(&self) -> Result<ProfileRegistry> {
        ProfileRegistry::from_bindings(
            self.profiles
                .iter()
                .map(|b| (b.sender_id, b.eep.as_str())),
        )
        .map_err(|e| anyhow!("Invalid profile configuration: {}", e))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            device: DeviceConfig {
                port: "/dev/ttyUSB0".to_string(),
                baud_rate: default_baud_rate(),
                poll_interval_ms: default_poll_interval_ms(),
                read_chunk_size: default_read_chunk_size(),
            },
            framer: FramerConfig::default(),
            profiles: default_profiles(),
            logging: LoggingConfig::default(),
        }
    }
}
