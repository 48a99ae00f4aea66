//! Decode counters shared between the read thread and its owner.
//!
//! Every discarded byte, frame or telegram bumps one counter so that
//! non-fatal errors stay observable without propagating.
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{DecodeError, FrameError, ProfileError};

#[derive(Debug, Default)]
pub struct DecodeStats {
    bytes_received: AtomicU64,
    frames: AtomicU64,
    readings: AtomicU64,
    noise_bytes: AtomicU64,
    type_mismatches: AtomicU64,
    oversize_headers: AtomicU64,
    crc_failures: AtomicU64,
    malformed_telegrams: AtomicU64,
    unknown_senders: AtomicU64,
    profile_errors: AtomicU64,
    read_errors: AtomicU64,
}

impl DecodeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bytes(&self, n: usize) {
        self.bytes_received.fetch_add(n as u64, Ordering::Relaxed);
    }
    pub fn inc_frames(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_readings(&self) {
        self.readings.fetch_add(1, Ordering::Relaxed);
    }
    pub fn add_noise(&self, n: usize) {
        self.noise_bytes.fetch_add(n as u64, Ordering::Relaxed);
    }
    pub fn inc_type_mismatch(&self) {
        self.type_mismatches.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_oversize(&self) {
        self.oversize_headers.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_crc_failure(&self) {
        self.crc_failures.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_read_errors(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Classify a dropped frame or telegram.
    pub fn record_drop(&self, err: &DecodeError) {
        let counter = match err {
            DecodeError::Frame(FrameError::CrcMismatch { .. }) => &self.crc_failures,
            DecodeError::Frame(FrameError::WrongPacketType(_)) => &self.type_mismatches,
            DecodeError::Frame(_) => &self.malformed_telegrams,
            DecodeError::Profile(ProfileError::UnknownSender(_)) => &self.unknown_senders,
            DecodeError::Profile(_) => &self.profile_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            frames: self.frames.load(Ordering::Relaxed),
            readings: self.readings.load(Ordering::Relaxed),
            noise_bytes: self.noise_bytes.load(Ordering::Relaxed),
            type_mismatches: self.type_mismatches.load(Ordering::Relaxed),
            oversize_headers: self.oversize_headers.load(Ordering::Relaxed),
            crc_failures: self.crc_failures.load(Ordering::Relaxed),
            malformed_telegrams: self.malformed_telegrams.load(Ordering::Relaxed),
            unknown_senders: self.unknown_senders.load(Ordering::Relaxed),
            profile_errors: self.profile_errors.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct StatsSnapshot {
    pub bytes_received: u64,
    pub frames: u64,
    pub readings: u64,
    pub noise_bytes: u64,
    pub type_mismatches: u64,
    pub oversize_headers: u64,
    pub crc_failures: u64,
    pub malformed_telegrams: u64,
    pub unknown_senders: u64,
    pub profile_errors: u64,
    pub read_errors: u64,
}

impl StatsSnapshot {
    /// Frames and telegrams dropped for any non-fatal reason.
    pub fn dropped(&self) -> u64 {
        self.type_mismatches
            + self.oversize_headers
            + self.crc_failures
            + self.malformed_telegrams
            + self.unknown_senders
            + self.profile_errors
    }
}
