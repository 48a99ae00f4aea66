//! # EnOcean Serial Protocol Module
//!
//! Wire-level decoding for EnOcean USB dongles (USB 300 / TCM 310 class)
//! operating in ESP3 mode with ERP2 radio telegrams.
//!
//! ## Layers
//!
//! - [`framer`] - cuts the raw serial byte stream into whole ESP3 frames,
//!   resynchronizing on noise and stepping over unwanted packet types
//! - [`esp3`] - the outer transport frame: header fields, size computation,
//!   CRC8 checks and an encoder for building frames
//! - [`erp2`] - the inner radio telegram: address layout, canonical sender
//!   ids, payload extraction and signal strength
//!
//! ```rust
//! use enocean_rx::enocean::esp3::{build_frame, PACKET_TYPE_RADIO_ERP2};
//! use enocean_rx::enocean::framer::{FramerOptions, StreamFramer};
//! use enocean_rx::enocean::erp2::Telegram;
//!
//! let bytes = build_frame(
//!     PACKET_TYPE_RADIO_ERP2,
//!     &[0x22, 0x04, 0x01, 0x89, 0xB8, 0x32, 0x19, 0x80, 0x00],
//!     &[0x01, 0x4A],
//! );
//! let mut framer = StreamFramer::new(FramerOptions::default());
//! let frames = framer.feed(&bytes).unwrap();
//! let telegram = Telegram::decode(&frames[0]).unwrap();
//! assert_eq!(telegram.originator.to_string(), "040189B8");
//! assert_eq!(telegram.rssi_dbm, -74);
//! ```

pub mod erp2;
pub mod esp3;
pub mod framer;

pub use erp2::{SenderId, Telegram};
pub use esp3::RawFrame;
pub use framer::{FramerOptions, MismatchPolicy, StreamFramer};
