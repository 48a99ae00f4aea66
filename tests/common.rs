//! Test utilities & fixtures.
//! Frame builders for ERP2 radio telegrams and access to `tests/data`.

use std::path::{Path, PathBuf};

use enocean_rx::enocean::esp3::{build_frame, PACKET_TYPE_RADIO_ERP2};

pub const CO2_SENDER: [u8; 4] = [0x04, 0x01, 0x89, 0xB8];

/// Path to a file under `tests/data`.
#[allow(dead_code)]
pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// ERP2 frame with a 4-byte originator, no destination, RSSI byte `rssi`.
#[allow(dead_code)]
pub fn erp2_frame(sender: [u8; 4], payload: &[u8], rssi: u8) -> Vec<u8> {
    let mut data = vec![0x22];
    data.extend_from_slice(&sender);
    data.extend_from_slice(payload);
    data.push(0x00);
    build_frame(PACKET_TYPE_RADIO_ERP2, &data, &[0x01, rssi])
}

/// A5-09-04 frame from the stock CO2 sensor.
#[allow(dead_code)]
pub fn co2_frame(hum: u8, conc: u8, temp: u8) -> Vec<u8> {
    erp2_frame(CO2_SENDER, &[hum, conc, temp], 0x4A)
}
