//! EEP A5-09-04: CO2 concentration, temperature and humidity.
//!
//! | byte | channel       | scale            |
//! |------|---------------|------------------|
//! | 0    | humidity      | × 0.5 %          |
//! | 1    | concentration | × 10 ppm         |
//! | 2    | temperature   | × 51/255 °C      |
use chrono::{DateTime, Utc};

use super::Profile;
use crate::enocean::Telegram;
use crate::error::ProfileError;
use crate::reading::{Co2Reading, Reading};

pub const EEP: &str = "A5-09-04";
pub const PAYLOAD_LEN: usize = 3;

pub fn profile() -> Profile {
    Profile::new(EEP, decode)
}

pub fn decode(telegram: &Telegram, at: DateTime<Utc>) -> Result<Reading, ProfileError> {
    let [hum, conc, temp] = <[u8; PAYLOAD_LEN]>::try_from(telegram.payload.as_slice())
        .map_err(|_| ProfileError::PayloadLength {
            eep: EEP,
            expected: PAYLOAD_LEN,
            actual: telegram.payload.len(),
        })?;

    Ok(Reading::Co2(Co2Reading {
        source_id: telegram.sender_key(),
        timestamp: at,
        concentration_ppm: concentration(conc),
        temperature_c: temperature(temp),
        humidity_pct: humidity(hum),
        rssi_dbm: telegram.rssi_dbm,
    }))
}

fn humidity(raw: u8) -> f64 {
    f64::from(raw) * 0.5
}

fn concentration(raw: u8) -> u16 {
    u16::from(raw) * 10
}

fn temperature(raw: u8) -> f64 {
    let step = 51.0 / 255.0;
    round_tenths(step * f64::from(raw))
}

/// One decimal, halves away from zero.
fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enocean::erp2::{ErpHeader, SenderId};

    fn telegram(payload: &[u8]) -> Telegram {
        Telegram {
            header: ErpHeader(0x22),
            extended_header: None,
            extended_telegram_type: None,
            originator: SenderId::new([0x04, 0x01, 0x89, 0xB8]),
            destination: None,
            payload: payload.to_vec(),
            rssi_dbm: -61,
        }
    }

    #[test]
    fn decodes_reference_payload() {
        let at = Utc::now();
        let Reading::Co2(r) = decode(&telegram(&[0x32, 0x19, 0x80]), at).unwrap();
        assert_eq!(r.humidity_pct, 25.0);
        assert_eq!(r.concentration_ppm, 250);
        assert_eq!(r.temperature_c, 25.6);
        assert_eq!(r.rssi_dbm, -61);
        assert_eq!(r.source_id, "040189B8");
        assert_eq!(r.timestamp, at);
    }

    #[test]
    fn scale_end_points() {
        assert_eq!(humidity(0), 0.0);
        assert_eq!(humidity(200), 100.0);
        assert_eq!(concentration(255), 2550);
        assert_eq!(temperature(0), 0.0);
        assert_eq!(temperature(1), 0.2);
        assert_eq!(temperature(255), 51.0);
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_tenths(0.25), 0.3);
        assert_eq!(round_tenths(-0.25), -0.3);
        assert_eq!(round_tenths(12.34), 12.3);
    }

    #[test]
    fn wrong_payload_length() {
        let err = decode(&telegram(&[0x32, 0x19]), Utc::now()).unwrap_err();
        assert_eq!(
            err,
            ProfileError::PayloadLength {
                eep: EEP,
                expected: 3,
                actual: 2
            }
        );
        assert!(decode(&telegram(&[1, 2, 3, 4]), Utc::now()).is_err());
    }
}
