//! Decoded sensor readings handed to consumers.
use std::fmt;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

/// One named numeric value of a reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Channel {
    pub name: &'static str,
    pub unit: &'static str,
    pub value: f64,
}

/// Reading from an A5-09-04 CO2 / temperature / humidity sensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Co2Reading {
    pub source_id: String,
    pub timestamp: DateTime<Utc>,
    /// Gas concentration, 0 - 2550 ppm.
    pub concentration_ppm: u16,
    /// Temperature, 0 - 51 °C.
    pub temperature_c: f64,
    /// Relative humidity, 0 - 100 %.
    pub humidity_pct: f64,
    pub rssi_dbm: i16,
}

impl Co2Reading {
    pub fn channels(&self) -> Vec<Channel> {
        vec![
            Channel {
                name: "concentration",
                unit: "ppm",
                value: f64::from(self.concentration_ppm),
            },
            Channel {
                name: "temperature",
                unit: "°C",
                value: self.temperature_c,
            },
            Channel {
                name: "humidity",
                unit: "%",
                value: self.humidity_pct,
            },
        ]
    }
}

impl fmt::Display for Co2Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}ppm / {:.1}°C / {:.1}%",
            self.concentration_ppm, self.temperature_c, self.humidity_pct
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "profile", rename_all = "snake_case")]
pub enum Reading {
    Co2(Co2Reading),
}

impl Reading {
    pub fn source_id(&self) -> &str {
        match self {
            Reading::Co2(r) => &r.source_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Reading::Co2(r) => r.timestamp,
        }
    }

    pub fn rssi_dbm(&self) -> i16 {
        match self {
            Reading::Co2(r) => r.rssi_dbm,
        }
    }

    /// Channels in their fixed profile order.
    pub fn channels(&self) -> Vec<Channel> {
        match self {
            Reading::Co2(r) => r.channels(),
        }
    }

    /// Channel value by position; 0.0 when the profile has no such channel.
    pub fn value(&self, index: usize) -> f64 {
        self.channels().get(index).map_or(0.0, |c| c.value)
    }

    /// Local wall-clock label (HH:MM:SS) for chart axes.
    pub fn time_label(&self) -> String {
        self.timestamp()
            .with_timezone(&Local)
            .format("%H:%M:%S")
            .to_string()
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Co2(r) => write!(f, "[{}] {} ({} dBm)", r.source_id, r, r.rssi_dbm),
        }
    }
}
