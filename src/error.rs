use thiserror::Error;

/// Stream-level failures. These end the read loop.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// A pushed chunk did not fit into the accumulation buffer.
    #[error("accumulation buffer overflow: {buffered} buffered + {incoming} incoming > capacity {capacity}")]
    BufferOverflow {
        buffered: usize,
        incoming: usize,
        capacity: usize,
    },
}

/// Frame-level failures. The frame is dropped and scanning continues.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Frame bytes do not start with the ESP3 sync byte.
    #[error("missing sync byte (found 0x{0:02X})")]
    MissingSync(u8),

    /// Fewer bytes than a complete header.
    #[error("frame too short: {actual} bytes, need {required}")]
    TooShort { actual: usize, required: usize },

    /// Byte count differs from the size the header declares.
    #[error("frame length mismatch: {actual} bytes, header declares {declared}")]
    LengthMismatch { actual: usize, declared: usize },

    /// Packet type is not the ERP2 radio telegram type.
    #[error("unexpected packet type 0x{0:02X}")]
    WrongPacketType(u8),

    /// Header or data CRC8 did not match (strict mode only).
    #[error("{region} CRC mismatch: expected 0x{expected:02X}, computed 0x{computed:02X}")]
    CrcMismatch {
        region: &'static str,
        expected: u8,
        computed: u8,
    },

    /// The telegram header claims more bytes than the data region carries.
    #[error("telegram payload length is negative ({0})")]
    InvalidPayloadLength(i32),

    /// A telegram field would extend past the ESP3 data region.
    #[error("telegram field at {offset}..{end} exceeds data length {data_len}")]
    PayloadOutOfBounds {
        offset: usize,
        end: usize,
        data_len: usize,
    },
}

/// Profile-level failures. The telegram is dropped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProfileError {
    /// No profile is bound to the sender. Expected on a shared radio channel.
    #[error("no profile registered for sender {0}")]
    UnknownSender(String),

    /// The payload does not have the size the profile requires.
    #[error("{eep} expects {expected} payload bytes, got {actual}")]
    PayloadLength {
        eep: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The EEP code is not in the built-in catalogue.
    #[error("unsupported EEP {0}")]
    UnsupportedEep(String),
}

/// Non-fatal outcome of decoding a single frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Profile(#[from] ProfileError),
}
