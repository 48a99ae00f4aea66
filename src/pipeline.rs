//! Framer → ESP3 → ERP2 → profile, one chunk at a time.
//!
//! Frame and profile failures come back as [`DecodeError`] values, are
//! counted, and never interrupt the stream. Only [`StreamError`] escapes
//! [`Pipeline::feed`].
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, trace};

use crate::enocean::{FramerOptions, RawFrame, StreamFramer, Telegram};
use crate::error::{DecodeError, ProfileError, StreamError};
use crate::metrics::DecodeStats;
use crate::profile::ProfileRegistry;
use crate::reading::Reading;

pub struct Pipeline {
    framer: StreamFramer,
    registry: ProfileRegistry,
    stats: Arc<DecodeStats>,
}

impl Pipeline {
    pub fn new(opts: FramerOptions, registry: ProfileRegistry) -> Self {
        let stats = Arc::new(DecodeStats::new());
        Self {
            framer: StreamFramer::with_stats(opts, Arc::clone(&stats)),
            registry,
            stats,
        }
    }

    pub fn stats(&self) -> Arc<DecodeStats> {
        Arc::clone(&self.stats)
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ProfileRegistry {
        &mut self.registry
    }

    pub fn capacity(&self) -> usize {
        self.framer.options().capacity
    }

    pub fn free_capacity(&self) -> usize {
        self.framer.free_capacity()
    }

    pub fn buffered(&self) -> usize {
        self.framer.buffered()
    }

    /// Feed a chunk, stamping readings with the current time.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Reading>, StreamError> {
        self.feed_at(chunk, Utc::now())
    }

    /// Feed a chunk, stamping readings with `at`.
    pub fn feed_at(
        &mut self,
        chunk: &[u8],
        at: DateTime<Utc>,
    ) -> Result<Vec<Reading>, StreamError> {
        let frames = self.framer.feed(chunk)?;
        let mut readings = Vec::with_capacity(frames.len());
        for frame in frames {
            match self.decode_frame(&frame, at) {
                Ok(reading) => {
                    self.stats.inc_readings();
                    readings.push(reading);
                }
                Err(e) => {
                    self.stats.record_drop(&e);
                    match e {
                        DecodeError::Profile(ProfileError::UnknownSender(id)) => {
                            trace!("ignoring telegram from unregistered sender {}", id)
                        }
                        other => debug!("dropping frame: {}", other),
                    }
                }
            }
        }
        Ok(readings)
    }

    /// Decode one complete frame without touching the stream state.
    pub fn decode_frame(
        &self,
        frame: &RawFrame,
        at: DateTime<Utc>,
    ) -> Result<Reading, DecodeError> {
        let telegram = Telegram::decode(frame)?;
        trace!(
            "telegram from {} type 0x{:X}, {} payload bytes, {} dBm",
            telegram.originator,
            telegram.header.telegram_type(),
            telegram.payload.len(),
            telegram.rssi_dbm
        );
        Ok(self.registry.decode(&telegram, at)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enocean::esp3::{build_frame, PACKET_TYPE_RADIO_ERP2};
    use crate::error::FrameError;

    fn co2_frame(sender: [u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut data = vec![0x22];
        data.extend_from_slice(&sender);
        data.extend_from_slice(payload);
        data.push(0x00);
        build_frame(PACKET_TYPE_RADIO_ERP2, &data, &[0x01, 0x4A])
    }

    #[test]
    fn decodes_known_sender() {
        let mut pipeline =
            Pipeline::new(FramerOptions::default(), ProfileRegistry::with_defaults());
        let at = Utc::now();
        let readings = pipeline
            .feed_at(&co2_frame([0x04, 0x01, 0x89, 0xB8], &[0x32, 0x19, 0x80]), at)
            .unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].timestamp(), at);
        assert_eq!(readings[0].rssi_dbm(), -74);
        assert_eq!(pipeline.stats().snapshot().readings, 1);
    }

    #[test]
    fn unknown_sender_yields_nothing() {
        let mut pipeline =
            Pipeline::new(FramerOptions::default(), ProfileRegistry::with_defaults());
        let readings = pipeline
            .feed(&co2_frame([0x01, 0x02, 0x03, 0x04], &[0x32, 0x19, 0x80]))
            .unwrap();
        assert!(readings.is_empty());
        let snap = pipeline.stats().snapshot();
        assert_eq!(snap.frames, 1);
        assert_eq!(snap.unknown_senders, 1);
    }

    #[test]
    fn decode_frame_reports_typed_failures() {
        let pipeline = Pipeline::new(FramerOptions::default(), ProfileRegistry::with_defaults());
        let short = RawFrame::new(build_frame(PACKET_TYPE_RADIO_ERP2, &[0x22, 0x04], &[])).unwrap();
        assert_eq!(
            pipeline.decode_frame(&short, Utc::now()),
            Err(DecodeError::Frame(FrameError::InvalidPayloadLength(-4)))
        );

        let wrong_len = RawFrame::new(co2_frame([0x04, 0x01, 0x89, 0xB8], &[0x32])).unwrap();
        assert!(matches!(
            pipeline.decode_frame(&wrong_len, Utc::now()),
            Err(DecodeError::Profile(ProfileError::PayloadLength { actual: 1, .. }))
        ));
    }
}
