//! Serial port backend built on the `serialport` crate

use crate::core::FRAME_LEN;
use crate::hardware::{LinkError, LinkResult, LinkSettings, PortProvider, SensorLink};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortBuilder, StopBits};
use std::io::{Read, Write};

/// Opens system serial ports
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialPortProvider;

impl SerialPortProvider {
    pub fn new() -> Self {
        Self
    }
}

impl PortProvider for SerialPortProvider {
    fn list_ports(&self) -> LinkResult<Vec<String>> {
        let ports = serialport::available_ports()?;
        Ok(ports.into_iter().map(|info| info.port_name).collect())
    }

    fn open(&self, port: &str, settings: &LinkSettings) -> LinkResult<Box<dyn SensorLink>> {
        let open_error = |reason: String| LinkError::Open {
            port: port.to_string(),
            reason,
        };
        settings.validate().map_err(|e| open_error(e.to_string()))?;

        let serial = port_builder(port, settings)
            .open()
            .map_err(|e| open_error(e.to_string()))?;

        log::debug!("opened {} at {} baud", port, settings.baud_rate);
        Ok(Box::new(SerialSensorLink {
            name: port.to_string(),
            port: serial,
            timeout_ms: settings.read_timeout_ms,
        }))
    }
}

/// Builder for the board's line settings; DTR is set as part of opening
fn port_builder(port: &str, settings: &LinkSettings) -> SerialPortBuilder {
    serialport::new(port, settings.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .dtr_on_open(settings.dtr_enabled)
        .timeout(settings.read_timeout())
}

/// An open system serial port
pub struct SerialSensorLink {
    name: String,
    port: Box<dyn SerialPort>,
    timeout_ms: u64,
}

impl SensorLink for SerialSensorLink {
    fn port_name(&self) -> &str {
        &self.name
    }

    fn write_all(&mut self, bytes: &[u8]) -> LinkResult<()> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_frame(&mut self, frame: &mut [u8; FRAME_LEN]) -> LinkResult<()> {
        self.port
            .read_exact(frame)
            .map_err(|e| LinkError::from_read(e, self.timeout_ms))
    }

    fn bytes_to_read(&mut self) -> LinkResult<u32> {
        Ok(self.port.bytes_to_read()?)
    }

    fn clear_input(&mut self) -> LinkResult<()> {
        Ok(self.port.clear(ClearBuffer::Input)?)
    }
}

impl Drop for SerialSensorLink {
    fn drop(&mut self) {
        log::debug!("closing {}", self.name);
    }
}
