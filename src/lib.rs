//! # enocean-rx - EnOcean telemetry receiver
//!
//! enocean-rx reads the serial byte stream of an EnOcean USB gateway running
//! the ESP3 protocol, cuts it into frames, unpacks ERP2 radio telegrams and
//! turns the payloads of known senders into typed sensor readings.
//!
//! ## Features
//!
//! - **Stream Resynchronization**: Noise, truncated frames and foreign packet types are skipped without losing later frames.
//! - **ERP2 Decoding**: All originator address widths, optional destination and extended header fields, RSSI extraction.
//! - **Profile Registry**: Sender id to EEP bindings, configurable at runtime; A5-09-04 (CO2 / temperature / humidity) built in.
//! - **Dedicated Reader Thread**: Polling loop with prompt close, readings dispatched to a sink in arrival order.
//! - **Replay**: Hex captures run through the same pipeline as a live port.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use enocean_rx::config::Config;
//! use enocean_rx::pipeline::Pipeline;
//! use enocean_rx::receiver::Receiver;
//! use enocean_rx::source::ReplaySource;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let pipeline = Pipeline::new(config.framer_options(), config.registry()?);
//!     let source = ReplaySource::load("capture.hex").await?;
//!
//!     let (receiver, sink) = Receiver::start_with_sink(
//!         source,
//!         pipeline,
//!         |reading: enocean_rx::Reading| println!("{}", reading),
//!         config.receiver_options(),
//!     )?;
//!     receiver.shutdown()?;
//!     sink.await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`enocean`] - ESP3 framing and ERP2 telegram decoding
//! - [`profile`] - EEP decoders and the sender registry
//! - [`reading`] - decoded sensor values
//! - [`pipeline`] - framer to reading, one chunk at a time
//! - [`receiver`] - reader thread, sink dispatch and shutdown
//! - [`source`] - byte sources (serial port, replay)
//! - [`config`] - configuration management and validation
//! - [`error`] - error types shared across layers
//! - [`metrics`] - decode counters
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   ByteSource    │ ← serial port / replay
//! └─────────────────┘
//!          │ chunks
//! ┌─────────────────┐
//! │  StreamFramer   │ ← resync, whole ESP3 frames
//! └─────────────────┘
//!          │ frames
//! ┌─────────────────┐
//! │ ERP2 + Profile  │ ← telegram, sender lookup, EEP decode
//! └─────────────────┘
//!          │ readings
//! ┌─────────────────┐
//! │  ReadingSink    │ ← application callback
//! └─────────────────┘
//! ```

pub mod config;
pub mod enocean;
pub mod error;
pub mod logutil;
pub mod metrics;
pub mod pipeline;
pub mod profile;
pub mod reading;
pub mod receiver;
pub mod source;

pub use error::{DecodeError, FrameError, ProfileError, StreamError};
pub use reading::Reading;
