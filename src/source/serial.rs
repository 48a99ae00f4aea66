//! USB dongle attached as a serial port.
use std::io::{self, Read};
use std::time::Duration;

use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use serialport::SerialPort;

use super::ByteSource;

/// Line rate of ESP3 dongles.
pub const DEFAULT_BAUD_RATE: u32 = 57_600;

const READ_TIMEOUT: Duration = Duration::from_millis(100);

pub struct SerialSource {
    port_name: String,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialSource {
    /// Open the port 8N1 and purge whatever the dongle buffered before we
    /// attached.
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self> {
        debug!("Opening serial port {} at {} baud", port_name, baud_rate);

        let port = serialport::new(port_name, baud_rate)
            .timeout(READ_TIMEOUT)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|e| anyhow!("Failed to open serial port {}: {}", port_name, e))?;

        if let Err(e) = port.clear(serialport::ClearBuffer::Input) {
            warn!("Failed to purge input buffer of {}: {}", port_name, e);
        }
        info!("Serial port {} open at {} baud", port_name, baud_rate);

        Ok(Self {
            port_name: port_name.to_string(),
            port: Some(port),
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl ByteSource for SerialSource {
    fn available(&mut self) -> io::Result<usize> {
        match self.port.as_mut() {
            Some(port) => port
                .bytes_to_read()
                .map(|n| n as usize)
                .map_err(io::Error::from),
            None => Ok(0),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(port) = self.port.as_mut() else {
            return Ok(0);
        };
        match port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            info!("Serial port {} closed", self.port_name);
        }
    }

    fn is_exhausted(&self) -> bool {
        self.port.is_none()
    }
}
