//! Incremental ESP3 framer.
//!
//! The serial link delivers an unbounded byte stream with no alignment
//! guarantees: a frame may arrive split over several reads, several frames may
//! arrive in one read, and the first bytes after opening the port are usually
//! the tail of some earlier frame. The framer can be fed arbitrary chunks and
//! yields whole frames when available. Leading noise is shifted out up to the
//! next sync byte; headers that cannot belong to a wanted frame are stepped
//! over one byte at a time.
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use super::esp3::{
    Esp3Header, RawFrame, FRAME_OVERHEAD, HEADER_LEN, PACKET_TYPE_RADIO_ERP2, SYNC_BYTE,
};
use crate::error::StreamError;
use crate::logutil::hex_snippet;
use crate::metrics::DecodeStats;

/// Ten 4 KiB reads.
pub const DEFAULT_BUFFER_CAPACITY: usize = 40 * 1024;

/// ERP2 telegrams are tiny; anything announcing more is a false sync.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024;

/// What to do when a header announces a packet type other than ERP2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MismatchPolicy {
    /// Drop the sync byte and rescan from the next byte.
    #[default]
    SkipByte,
    /// Drop everything buffered so far and wait for fresh input.
    DiscardBuffer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramerOptions {
    pub capacity: usize,
    pub max_frame_len: usize,
    pub verify_crc: bool,
    pub on_type_mismatch: MismatchPolicy,
    pub packet_type: u8,
}

impl Default for FramerOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_BUFFER_CAPACITY,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            verify_crc: false,
            on_type_mismatch: MismatchPolicy::SkipByte,
            packet_type: PACKET_TYPE_RADIO_ERP2,
        }
    }
}

pub struct StreamFramer {
    buf: BytesMut,
    opts: FramerOptions,
    stats: Arc<DecodeStats>,
}

impl StreamFramer {
    pub fn new(opts: FramerOptions) -> Self {
        Self::with_stats(opts, Arc::new(DecodeStats::new()))
    }

    pub fn with_stats(opts: FramerOptions, stats: Arc<DecodeStats>) -> Self {
        Self {
            buf: BytesMut::with_capacity(opts.capacity),
            opts,
            stats,
        }
    }

    pub fn options(&self) -> &FramerOptions {
        &self.opts
    }

    pub fn stats(&self) -> &Arc<DecodeStats> {
        &self.stats
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn free_capacity(&self) -> usize {
        self.opts.capacity.saturating_sub(self.buf.len())
    }

    /// Append a chunk. Exceeding the configured capacity is fatal.
    pub fn push(&mut self, data: &[u8]) -> Result<(), StreamError> {
        if self.buf.len() + data.len() > self.opts.capacity {
            return Err(StreamError::BufferOverflow {
                buffered: self.buf.len(),
                incoming: data.len(),
                capacity: self.opts.capacity,
            });
        }
        self.stats.add_bytes(data.len());
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// Append a chunk and drain every frame that became complete.
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<RawFrame>, StreamError> {
        self.push(data)?;
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame() {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Attempt to extract the next complete frame. Returns None when more
    /// input is needed.
    pub fn next_frame(&mut self) -> Option<RawFrame> {
        loop {
            if self.buf.is_empty() {
                return None;
            }

            match self.buf.iter().position(|&b| b == SYNC_BYTE) {
                Some(0) => {}
                Some(pos) => {
                    trace!(
                        "dropping {} noise bytes: {}",
                        pos,
                        hex_snippet(&self.buf[..pos], 16)
                    );
                    self.stats.add_noise(pos);
                    self.buf.advance(pos);
                }
                None => {
                    trace!("no sync byte in {} buffered bytes", self.buf.len());
                    self.stats.add_noise(self.buf.len());
                    self.buf.clear();
                    return None;
                }
            }

            // Partial header: keep it and wait.
            if self.buf.len() < HEADER_LEN {
                return None;
            }

            let mut head = [0u8; HEADER_LEN];
            head.copy_from_slice(&self.buf[..HEADER_LEN]);
            let header = Esp3Header::from_bytes(&head);

            if self.opts.verify_crc {
                if let Err(e) = header.verify_crc() {
                    debug!("false sync: {}", e);
                    self.stats.inc_crc_failure();
                    self.skip_sync();
                    continue;
                }
            }

            if header.packet_type != self.opts.packet_type {
                self.stats.inc_type_mismatch();
                match self.opts.on_type_mismatch {
                    MismatchPolicy::SkipByte => {
                        debug!("skipping packet type 0x{:02X}", header.packet_type);
                        self.skip_sync();
                        continue;
                    }
                    MismatchPolicy::DiscardBuffer => {
                        debug!(
                            "packet type 0x{:02X}, discarding {} buffered bytes",
                            header.packet_type,
                            self.buf.len()
                        );
                        self.buf.clear();
                        return None;
                    }
                }
            }

            let frame_len = header.frame_len();
            if frame_len > self.opts.max_frame_len.max(FRAME_OVERHEAD) {
                debug!("header announces {} bytes, treating as false sync", frame_len);
                self.stats.inc_oversize();
                self.skip_sync();
                continue;
            }

            if self.buf.len() < frame_len {
                return None;
            }

            let bytes = self.buf.split_to(frame_len).freeze();
            let frame = RawFrame::from_parts(header, bytes);

            if self.opts.verify_crc {
                if let Err(e) = frame.verify_data_crc() {
                    debug!("{}, resynchronizing", e);
                    self.stats.inc_crc_failure();
                    // Put everything after the sync byte back in front of the
                    // remaining input so an embedded frame is not lost.
                    let mut rest = BytesMut::with_capacity(self.opts.capacity);
                    rest.extend_from_slice(&frame.as_bytes()[1..]);
                    rest.extend_from_slice(&self.buf);
                    self.buf = rest;
                    continue;
                }
            }

            self.stats.inc_frames();
            trace!("frame {} bytes: {}", frame.len(), hex_snippet(frame.as_bytes(), 48));
            return Some(frame);
        }
    }

    fn skip_sync(&mut self) {
        self.stats.add_noise(1);
        self.buf.advance(1);
    }
}
