//! ESP3 transport frames.
//!
//! ```text
//! 0x55 | data_len (u16 BE) | opt_len (u8) | packet_type (u8) | crc8(header)
//!      | data[data_len] | opt[opt_len] | crc8(data ++ opt)
//! ```
//!
//! The header CRC covers the four length/type bytes, the data CRC covers the
//! data and optional regions. Both use CRC-8 with polynomial 0x07.
use std::fmt;

use bytes::Bytes;
use crc::{Crc, CRC_8_SMBUS};

use crate::error::FrameError;
use crate::logutil::hex_snippet;

pub const SYNC_BYTE: u8 = 0x55;

/// Packet type carrying an ERP2 radio telegram.
pub const PACKET_TYPE_RADIO_ERP2: u8 = 0x0A;

/// Sync byte plus the 2-byte data length and 1-byte optional length.
pub const LENGTH_FIELDS_LEN: usize = 4;

/// Sync, length/type fields and header CRC.
pub const HEADER_LEN: usize = 6;

/// Bytes of a frame that are not data or optional data.
pub const FRAME_OVERHEAD: usize = 7;

/// Largest frame the length fields can describe.
pub const MAX_FRAME_LEN: usize = FRAME_OVERHEAD + u16::MAX as usize + u8::MAX as usize;

const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

pub fn crc8(bytes: &[u8]) -> u8 {
    CRC8.checksum(bytes)
}

/// Total frame size announced by the length fields at the start of `buf`.
///
/// Only the sync byte and the length fields need to be present, so callers
/// can decide whether to wait for more input before the full header arrived.
pub fn packet_size(buf: &[u8]) -> Option<usize> {
    if buf.len() < LENGTH_FIELDS_LEN || buf[0] != SYNC_BYTE {
        return None;
    }
    let data_len = u16::from_be_bytes([buf[1], buf[2]]) as usize;
    let opt_len = buf[3] as usize;
    Some(FRAME_OVERHEAD + data_len + opt_len)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Esp3Header {
    pub data_len: u16,
    pub opt_len: u8,
    pub packet_type: u8,
    pub crc: u8,
}

impl Esp3Header {
    pub fn parse(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < HEADER_LEN {
            return Err(FrameError::TooShort {
                actual: buf.len(),
                required: HEADER_LEN,
            });
        }
        if buf[0] != SYNC_BYTE {
            return Err(FrameError::MissingSync(buf[0]));
        }
        let mut head = [0u8; HEADER_LEN];
        head.copy_from_slice(&buf[..HEADER_LEN]);
        Ok(Self::from_bytes(&head))
    }

    /// Read the fields without checking the sync byte.
    pub fn from_bytes(head: &[u8; HEADER_LEN]) -> Self {
        Self {
            data_len: u16::from_be_bytes([head[1], head[2]]),
            opt_len: head[3],
            packet_type: head[4],
            crc: head[5],
        }
    }

    pub fn frame_len(&self) -> usize {
        FRAME_OVERHEAD + self.data_len as usize + self.opt_len as usize
    }

    pub fn computed_crc(&self) -> u8 {
        let [hi, lo] = self.data_len.to_be_bytes();
        crc8(&[hi, lo, self.opt_len, self.packet_type])
    }

    pub fn verify_crc(&self) -> Result<(), FrameError> {
        let computed = self.computed_crc();
        if computed != self.crc {
            return Err(FrameError::CrcMismatch {
                region: "header",
                expected: self.crc,
                computed,
            });
        }
        Ok(())
    }

    pub fn is_radio_erp2(&self) -> bool {
        self.packet_type == PACKET_TYPE_RADIO_ERP2
    }
}

/// One complete ESP3 frame, trailer included.
///
/// The byte length always equals the size computed from its own header.
#[derive(Clone, PartialEq, Eq)]
pub struct RawFrame {
    header: Esp3Header,
    bytes: Bytes,
}

impl RawFrame {
    /// Wrap exactly one frame. Extra or missing bytes are rejected.
    pub fn new(bytes: impl Into<Bytes>) -> Result<Self, FrameError> {
        let bytes = bytes.into();
        let header = Esp3Header::parse(&bytes)?;
        let declared = header.frame_len();
        if bytes.len() != declared {
            return Err(FrameError::LengthMismatch {
                actual: bytes.len(),
                declared,
            });
        }
        Ok(Self { header, bytes })
    }

    /// `bytes` must be exactly `header.frame_len()` long and start with the sync byte.
    pub(crate) fn from_parts(header: Esp3Header, bytes: Bytes) -> Self {
        debug_assert_eq!(bytes.len(), header.frame_len());
        Self { header, bytes }
    }

    pub fn header(&self) -> &Esp3Header {
        &self.header
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        let end = HEADER_LEN + self.header.data_len as usize;
        &self.bytes[HEADER_LEN..end]
    }

    pub fn optional_data(&self) -> &[u8] {
        let start = HEADER_LEN + self.header.data_len as usize;
        &self.bytes[start..start + self.header.opt_len as usize]
    }

    pub fn data_crc(&self) -> u8 {
        self.bytes[self.bytes.len() - 1]
    }

    pub fn verify_data_crc(&self) -> Result<(), FrameError> {
        let computed = crc8(&self.bytes[HEADER_LEN..self.bytes.len() - 1]);
        let expected = self.data_crc();
        if computed != expected {
            return Err(FrameError::CrcMismatch {
                region: "data",
                expected,
                computed,
            });
        }
        Ok(())
    }

    /// Check both CRC fields.
    pub fn verify_crc(&self) -> Result<(), FrameError> {
        self.header.verify_crc()?;
        self.verify_data_crc()
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

impl fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawFrame")
            .field("packet_type", &format_args!("0x{:02X}", self.header.packet_type))
            .field("len", &self.bytes.len())
            .field("bytes", &hex_snippet(&self.bytes, 48))
            .finish()
    }
}

/// Encode a frame with valid header and data CRCs.
pub fn build_frame(packet_type: u8, data: &[u8], optional: &[u8]) -> Vec<u8> {
    let data_len = u16::try_from(data.len()).unwrap_or(u16::MAX);
    let opt_len = u8::try_from(optional.len()).unwrap_or(u8::MAX);
    let data = &data[..data_len as usize];
    let optional = &optional[..opt_len as usize];

    let [hi, lo] = data_len.to_be_bytes();
    let mut out = Vec::with_capacity(FRAME_OVERHEAD + data.len() + optional.len());
    out.push(SYNC_BYTE);
    out.extend_from_slice(&[hi, lo, opt_len, packet_type]);
    out.push(crc8(&out[1..5]));
    out.extend_from_slice(data);
    out.extend_from_slice(optional);
    out.push(crc8(&out[HEADER_LEN..]));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // CO_RD_VERSION command as documented in the ESP3 specification.
    const READ_VERSION: [u8; 8] = [0x55, 0x00, 0x01, 0x00, 0x05, 0x70, 0x03, 0x09];

    #[test]
    fn crc8_matches_reference_frame() {
        assert_eq!(crc8(&READ_VERSION[1..5]), 0x70);
        assert_eq!(crc8(&READ_VERSION[6..7]), 0x09);
        assert_eq!(build_frame(0x05, &[0x03], &[]), READ_VERSION.to_vec());
    }

    #[test]
    fn packet_size_needs_only_length_fields() {
        assert_eq!(packet_size(&[0x55, 0x00, 0x09]), None);
        assert_eq!(packet_size(&[0x55, 0x00, 0x09, 0x02]), Some(18));
        assert_eq!(packet_size(&[0x55, 0x01, 0x00, 0x00]), Some(7 + 256));
        assert_eq!(packet_size(&[0x54, 0x00, 0x09, 0x02]), None);
    }

    #[test]
    fn raw_frame_regions() {
        let bytes = build_frame(PACKET_TYPE_RADIO_ERP2, &[1, 2, 3], &[9, 0x4A]);
        let frame = RawFrame::new(bytes.clone()).unwrap();
        assert_eq!(frame.len(), 12);
        assert!(frame.header().is_radio_erp2());
        assert_eq!(frame.data(), &[1, 2, 3]);
        assert_eq!(frame.optional_data(), &[9, 0x4A]);
        assert!(frame.verify_crc().is_ok());
        assert_eq!(frame.as_bytes(), bytes.as_slice());
    }

    #[test]
    fn raw_frame_rejects_length_mismatch() {
        let mut bytes = build_frame(PACKET_TYPE_RADIO_ERP2, &[1, 2, 3], &[]);
        bytes.push(0);
        assert_eq!(
            RawFrame::new(bytes),
            Err(FrameError::LengthMismatch {
                actual: 11,
                declared: 10
            })
        );
        assert_eq!(
            RawFrame::new(vec![0x55, 0x00, 0x01, 0x00, 0x05]),
            Err(FrameError::TooShort {
                actual: 5,
                required: HEADER_LEN
            })
        );
        let err = RawFrame::new(build_frame(0x05, &[0x03], &[])[..7].to_vec()).unwrap_err();
        assert_eq!(err.to_string(), "frame length mismatch: 7 bytes, header declares 8");
    }

    #[test]
    fn header_from_bytes_matches_parse() {
        let bytes = build_frame(PACKET_TYPE_RADIO_ERP2, &[1, 2, 3], &[7, 8]);
        let mut head = [0u8; HEADER_LEN];
        head.copy_from_slice(&bytes[..HEADER_LEN]);
        let header = Esp3Header::from_bytes(&head);
        assert_eq!(Esp3Header::parse(&bytes), Ok(header));
        assert_eq!(header.frame_len(), bytes.len());
        assert!(header.verify_crc().is_ok());
    }

    #[test]
    fn corrupted_crc_is_reported_but_frame_still_parses() {
        let mut bytes = build_frame(PACKET_TYPE_RADIO_ERP2, &[1, 2, 3], &[]);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        bytes[5] ^= 0x01;
        let frame = RawFrame::new(bytes).unwrap();
        assert!(matches!(
            frame.header().verify_crc(),
            Err(FrameError::CrcMismatch { region: "header", .. })
        ));
        assert!(matches!(
            frame.verify_data_crc(),
            Err(FrameError::CrcMismatch { region: "data", .. })
        ));
    }
}
