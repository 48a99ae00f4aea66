//! ERP2 radio telegrams carried in the data region of an ESP3 frame.
//!
//! ```text
//! header | [ext header] | [ext telegram type] | originator (3/4/6)
//!        | [destination (4)] | payload | crc8
//! ```
//!
//! Header bits 7..5 select the address layout, bit 4 flags the extended
//! header, bits 3..0 carry the telegram type (0xF: an extended telegram type
//! byte follows).
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::esp3::RawFrame;
use crate::error::FrameError;

const EXTENDED_TELEGRAM: u8 = 0x0F;
const DESTINATION_LEN: usize = 4;

/// Canonical 4-byte originator or destination address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SenderId([u8; 4]);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid sender id {0:?}: expected 8 hex digits")]
pub struct ParseSenderIdError(pub String);

impl SenderId {
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Canonicalize an address as it appeared on air.
    ///
    /// 3-byte addresses get a leading zero byte, 6-byte addresses keep their
    /// last four bytes, 4-byte addresses pass through.
    pub fn from_wire(wire: &[u8]) -> Option<Self> {
        match *wire {
            [a, b, c] => Some(Self([0, a, b, c])),
            [a, b, c, d] => Some(Self([a, b, c, d])),
            [_, _, a, b, c, d] => Some(Self([a, b, c, d])),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn to_u32(self) -> u32 {
        u32::from_be_bytes(self.0)
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}

impl FromStr for SenderId {
    type Err = ParseSenderIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseSenderIdError(s.to_string()));
        }
        u32::from_str_radix(digits, 16)
            .map(|v| Self(v.to_be_bytes()))
            .map_err(|_| ParseSenderIdError(s.to_string()))
    }
}

impl Serialize for SenderId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SenderId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// First byte of an ERP2 telegram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErpHeader(pub u8);

impl ErpHeader {
    pub fn address_control(self) -> u8 {
        (self.0 >> 5) & 0x07
    }

    pub fn has_extended_header(self) -> bool {
        (self.0 >> 4) & 0x01 == 0x01
    }

    pub fn telegram_type(self) -> u8 {
        self.0 & 0x0F
    }

    pub fn has_extended_telegram(self) -> bool {
        self.telegram_type() == EXTENDED_TELEGRAM
    }

    pub fn originator_len(self) -> usize {
        match self.address_control() {
            1 | 2 => 4,
            3 => 6,
            _ => 3,
        }
    }

    pub fn destination_len(self) -> usize {
        if self.address_control() == 2 {
            DESTINATION_LEN
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Telegram {
    pub header: ErpHeader,
    pub extended_header: Option<u8>,
    pub extended_telegram_type: Option<u8>,
    pub originator: SenderId,
    pub destination: Option<SenderId>,
    pub payload: Vec<u8>,
    /// Received signal strength in dBm (negative).
    pub rssi_dbm: i16,
}

impl Telegram {
    /// Decode the ERP2 telegram in an ESP3 radio frame.
    pub fn decode(frame: &RawFrame) -> Result<Self, FrameError> {
        let esp3 = frame.header();
        if !esp3.is_radio_erp2() {
            return Err(FrameError::WrongPacketType(esp3.packet_type));
        }

        let data = frame.data();
        let header = ErpHeader(field(data, 0, 1)?[0]);
        let ext_header_len = usize::from(header.has_extended_header());
        let ext_telegram_len = usize::from(header.has_extended_telegram());
        let originator_len = header.originator_len();
        let destination_len = header.destination_len();

        let consumed = 1 + ext_header_len + ext_telegram_len + originator_len + destination_len;
        let payload_len = data.len() as i32 - (consumed as i32 + 1);
        if payload_len < 0 {
            return Err(FrameError::InvalidPayloadLength(payload_len));
        }

        let mut offset = 1;
        let extended_header = if ext_header_len == 1 {
            let b = field(data, offset, 1)?[0];
            offset += 1;
            Some(b)
        } else {
            None
        };
        let extended_telegram_type = if ext_telegram_len == 1 {
            let b = field(data, offset, 1)?[0];
            offset += 1;
            Some(b)
        } else {
            None
        };

        let wire = field(data, offset, originator_len)?;
        let originator = SenderId::from_wire(wire).ok_or(FrameError::PayloadOutOfBounds {
            offset,
            end: offset + originator_len,
            data_len: data.len(),
        })?;
        offset += originator_len;

        let destination = if destination_len > 0 {
            let wire = field(data, offset, destination_len)?;
            offset += destination_len;
            SenderId::from_wire(wire)
        } else {
            None
        };

        let payload = field(data, offset, payload_len as usize)?.to_vec();

        Ok(Self {
            header,
            extended_header,
            extended_telegram_type,
            originator,
            destination,
            payload,
            rssi_dbm: rssi_dbm(frame.as_bytes()),
        })
    }

    pub fn sender_key(&self) -> String {
        self.originator.to_string()
    }
}

/// Signal strength from the second-to-last byte of the whole ESP3 frame.
///
/// The dongle sends the magnitude unsigned, so it is negated here.
pub fn rssi_dbm(frame: &[u8]) -> i16 {
    if frame.len() < 2 {
        return 0;
    }
    -i16::from(frame[frame.len() - 2])
}

fn field(data: &[u8], offset: usize, len: usize) -> Result<&[u8], FrameError> {
    data.get(offset..offset + len)
        .ok_or(FrameError::PayloadOutOfBounds {
            offset,
            end: offset + len,
            data_len: data.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enocean::esp3::{build_frame, PACKET_TYPE_RADIO_ERP2};

    const OPT: [u8; 2] = [0x01, 0x4A];

    fn frame(data: &[u8]) -> RawFrame {
        RawFrame::new(build_frame(PACKET_TYPE_RADIO_ERP2, data, &OPT)).unwrap()
    }

    #[test]
    fn four_byte_originator() {
        let t = Telegram::decode(&frame(&[0x22, 0x04, 0x01, 0x89, 0xB8, 0x32, 0x19, 0x80, 0xEE]))
            .unwrap();
        assert_eq!(t.header.address_control(), 1);
        assert_eq!(t.header.telegram_type(), 2);
        assert_eq!(t.originator.to_string(), "040189B8");
        assert_eq!(t.destination, None);
        assert_eq!(t.payload, vec![0x32, 0x19, 0x80]);
        assert_eq!(t.rssi_dbm, -74);
    }

    #[test]
    fn three_byte_originator_is_right_aligned() {
        let t = Telegram::decode(&frame(&[0x02, 0xAB, 0xCD, 0xEF, 0x01, 0x00])).unwrap();
        assert_eq!(t.originator.as_bytes(), &[0x00, 0xAB, 0xCD, 0xEF]);
        assert_eq!(t.payload, vec![0x01]);
    }

    #[test]
    fn unassigned_address_controls_fall_back_to_three_bytes() {
        for hdr in [0x82, 0xA2, 0xC2, 0xE2] {
            let t = Telegram::decode(&frame(&[hdr, 0xAB, 0xCD, 0xEF, 0x09, 0x00])).unwrap();
            assert_eq!(t.header.address_control(), hdr >> 5);
            assert_eq!(t.header.originator_len(), 3);
            assert_eq!(t.originator.as_bytes(), &[0x00, 0xAB, 0xCD, 0xEF]);
            assert_eq!(t.destination, None);
            assert_eq!(t.payload, vec![0x09]);
        }
    }

    #[test]
    fn six_byte_originator_keeps_last_four() {
        let t = Telegram::decode(&frame(&[
            0x62, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0xA0, 0xA1, 0x00,
        ]))
        .unwrap();
        assert_eq!(t.originator.as_bytes(), &[0x33, 0x44, 0x55, 0x66]);
        assert_eq!(t.payload, vec![0xA0, 0xA1]);
    }

    #[test]
    fn destination_follows_originator() {
        let t = Telegram::decode(&frame(&[
            0x42, 0x01, 0x02, 0x03, 0x04, 0xFF, 0xFF, 0xFF, 0xFF, 0x7E, 0x00,
        ]))
        .unwrap();
        assert_eq!(t.originator.to_string(), "01020304");
        assert_eq!(t.destination.map(|d| d.to_string()).as_deref(), Some("FFFFFFFF"));
        assert_eq!(t.payload, vec![0x7E]);
    }

    #[test]
    fn extension_bytes_shift_the_address() {
        // Extended header and extended telegram type together.
        let t = Telegram::decode(&frame(&[
            0x3F, 0x10, 0x07, 0x04, 0x01, 0x89, 0xB8, 0x32, 0x19, 0x80, 0x00,
        ]))
        .unwrap();
        assert_eq!(t.extended_header, Some(0x10));
        assert_eq!(t.extended_telegram_type, Some(0x07));
        assert_eq!(t.originator.to_string(), "040189B8");
        assert_eq!(t.payload, vec![0x32, 0x19, 0x80]);
    }

    #[test]
    fn negative_payload_length_is_rejected() {
        // Six-byte address announced, but only three data bytes follow.
        let err = Telegram::decode(&frame(&[0x60, 0x01, 0x02])).unwrap_err();
        assert_eq!(err, FrameError::InvalidPayloadLength(-5));
    }

    #[test]
    fn empty_data_region_is_out_of_bounds() {
        let err = Telegram::decode(&frame(&[])).unwrap_err();
        assert!(matches!(err, FrameError::PayloadOutOfBounds { data_len: 0, .. }));
    }

    #[test]
    fn other_packet_types_are_rejected() {
        let raw = RawFrame::new(build_frame(0x01, &[0x22, 1, 2, 3, 4, 0], &[])).unwrap();
        assert_eq!(
            Telegram::decode(&raw).unwrap_err(),
            FrameError::WrongPacketType(0x01)
        );
    }

    #[test]
    fn rssi_is_negated_magnitude() {
        assert_eq!(rssi_dbm(&[0x55, 0x4A, 0x00]), -74);
        assert_eq!(rssi_dbm(&[0xFF, 0x00]), -255);
        assert_eq!(rssi_dbm(&[0x01]), 0);
    }

    #[test]
    fn sender_id_parsing() {
        assert_eq!(
            "040189b8".parse::<SenderId>().unwrap(),
            SenderId::new([0x04, 0x01, 0x89, 0xB8])
        );
        assert_eq!("0xFFFFFFFE".parse::<SenderId>().unwrap().to_u32(), 0xFFFF_FFFE);
        assert!("0401".parse::<SenderId>().is_err());
        assert!("04-01-89-B8".parse::<SenderId>().is_err());
    }
}
