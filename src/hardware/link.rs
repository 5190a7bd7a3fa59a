//! Serial link abstraction and fixed link settings

use crate::core::{RawSample, BAUD_RATE, FRAME_LEN, READ_TIMEOUT_MS};
use crate::hardware::LinkResult;
use crate::processing::frame::{decode_frame, Command};
use crate::utils::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One open connection to the sensor board.
///
/// Dropping the link closes the port.
pub trait SensorLink: Send {
    /// Name of the port this link is open on
    fn port_name(&self) -> &str;

    fn write_all(&mut self, bytes: &[u8]) -> LinkResult<()>;

    /// Read exactly one frame, or fail with `Timeout` if it does not arrive
    /// within the read timeout. A partially read frame is discarded.
    fn read_frame(&mut self, frame: &mut [u8; FRAME_LEN]) -> LinkResult<()>;

    /// Bytes received and not yet read
    fn bytes_to_read(&mut self) -> LinkResult<u32>;

    /// Discard everything received so far
    fn clear_input(&mut self) -> LinkResult<()>;

    fn send_command(&mut self, command: Command) -> LinkResult<()> {
        self.write_all(&[command.byte()])
    }

    fn read_sample(&mut self) -> LinkResult<RawSample> {
        let mut frame = [0u8; FRAME_LEN];
        self.read_frame(&mut frame)?;
        Ok(decode_frame(&frame)?)
    }
}

/// Enumerates and opens ports
pub trait PortProvider: Send {
    fn list_ports(&self) -> LinkResult<Vec<String>>;

    fn open(&self, port: &str, settings: &LinkSettings) -> LinkResult<Box<dyn SensorLink>>;
}

/// Serial line parameters of the sensor board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkSettings {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: bool,
    pub stop_bits: u8,
    pub dtr_enabled: bool,
    pub read_timeout_ms: u64,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            baud_rate: BAUD_RATE,
            data_bits: 8,
            parity: false,
            stop_bits: 1,
            dtr_enabled: false,
            read_timeout_ms: READ_TIMEOUT_MS,
        }
    }
}

impl LinkSettings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// The board only speaks 9600-8-N-1 with DTR off and a 200ms timeout
    pub fn validate(&self) -> Result<(), ConfigError> {
        let expected = Self::default();
        let checks: [(&str, String, bool); 6] = [
            ("baud_rate", self.baud_rate.to_string(), self.baud_rate == expected.baud_rate),
            ("data_bits", self.data_bits.to_string(), self.data_bits == expected.data_bits),
            ("parity", self.parity.to_string(), self.parity == expected.parity),
            ("stop_bits", self.stop_bits.to_string(), self.stop_bits == expected.stop_bits),
            ("dtr_enabled", self.dtr_enabled.to_string(), self.dtr_enabled == expected.dtr_enabled),
            ("read_timeout_ms", self.read_timeout_ms.to_string(), self.read_timeout_ms == expected.read_timeout_ms),
        ];

        for (parameter, value, ok) in checks {
            if !ok {
                return Err(ConfigError::InvalidParameter {
                    parameter: parameter.to_string(),
                    value,
                    reason: "sensor board requires 9600-8-N-1, DTR off, 200ms read timeout".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Link state as seen from outside the acquisition thread
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkStatus {
    pub port: Option<String>,
    pub streaming: bool,
    /// Sessions that reached the handshake
    pub sessions: u32,
    pub ticks: u64,
    pub errors: u32,
    pub last_error: Option<String>,
}

impl LinkStatus {
    pub fn is_healthy(&self) -> bool {
        self.streaming && self.port.is_some()
    }
}
