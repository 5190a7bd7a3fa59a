//! Simulated sensor board for testing and development

use crate::core::{RawSample, SensorId, FRAME_LEN, SELECT_SENSOR_BASE, SENSOR_COUNT, START_STREAMING, STOP_STREAMING};
use crate::hardware::{LinkError, LinkResult, LinkSettings, PortProvider, SensorLink};
use crate::processing::frame::encode_frame;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// How a simulated port answers bulk reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Four frames per bulk command
    Responsive,
    /// Opens but never answers
    Silent,
    /// Answers every bulk command with only the first `bytes` bytes
    ShortReply { bytes: usize },
    /// Answers normally, then unplugs on the bulk command after `bulk_reads`
    DisconnectAfter { bulk_reads: usize },
    /// Cannot be opened
    FailOpen,
}

#[derive(Debug, Default)]
struct BoardState {
    readings: [RawSample; SENSOR_COUNT],
    bulk_reads: usize,
    opened: usize,
    closed: usize,
    streaming: bool,
    commands: Vec<u8>,
    unplugged: bool,
}

/// Shared view of one simulated board.
///
/// Tests keep a clone to change what the sensors report and to inspect what
/// the acquisition loop did with the port.
#[derive(Debug, Clone, Default)]
pub struct MockBoard {
    state: Arc<Mutex<BoardState>>,
}

impl MockBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_reading(&self, sensor: SensorId, sample: RawSample) {
        self.state().readings[sensor.index()] = sample;
    }

    pub fn set_all_readings(&self, sample: RawSample) {
        self.state().readings = [sample; SENSOR_COUNT];
    }

    pub fn bulk_reads(&self) -> usize {
        self.state().bulk_reads
    }

    pub fn times_opened(&self) -> usize {
        self.state().opened
    }

    pub fn times_closed(&self) -> usize {
        self.state().closed
    }

    pub fn is_open(&self) -> bool {
        let state = self.state();
        state.opened > state.closed
    }

    pub fn is_streaming(&self) -> bool {
        self.state().streaming
    }

    /// Single-byte commands received, in order
    pub fn commands(&self) -> Vec<u8> {
        self.state().commands.clone()
    }

    /// Plug a previously unplugged board back in; the disconnect countdown
    /// starts over
    pub fn replug(&self) {
        let mut state = self.state();
        state.unplugged = false;
        state.bulk_reads = 0;
    }
}

struct MockPort {
    name: String,
    behavior: MockBehavior,
    board: MockBoard,
}

/// Port provider serving simulated boards
#[derive(Default)]
pub struct MockPortProvider {
    ports: Vec<MockPort>,
    reply_delay: Duration,
}

impl MockPortProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a port and return the board behind it
    pub fn add_port(&mut self, name: &str, behavior: MockBehavior) -> MockBoard {
        let board = MockBoard::new();
        self.ports.push(MockPort {
            name: name.to_string(),
            behavior,
            board: board.clone(),
        });
        board
    }

    /// Delay before each bulk reply, to pace the steady-state loop
    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = delay;
        self
    }
}

impl PortProvider for MockPortProvider {
    fn list_ports(&self) -> LinkResult<Vec<String>> {
        Ok(self.ports.iter().map(|p| p.name.clone()).collect())
    }

    fn open(&self, port: &str, settings: &LinkSettings) -> LinkResult<Box<dyn SensorLink>> {
        let mock = self
            .ports
            .iter()
            .find(|p| p.name == port)
            .ok_or_else(|| LinkError::Open {
                port: port.to_string(),
                reason: "no such port".to_string(),
            })?;

        {
            let state = mock.board.state();
            if mock.behavior == MockBehavior::FailOpen || state.unplugged {
                return Err(LinkError::Open {
                    port: port.to_string(),
                    reason: "access denied".to_string(),
                });
            }
        }
        settings.validate().map_err(|e| LinkError::Open {
            port: port.to_string(),
            reason: e.to_string(),
        })?;

        mock.board.state().opened += 1;
        Ok(Box::new(MockSensorLink {
            name: mock.name.clone(),
            behavior: mock.behavior,
            board: mock.board.clone(),
            rx: VecDeque::new(),
            read_timeout: settings.read_timeout(),
            reply_delay: self.reply_delay,
        }))
    }
}

/// An open simulated port
pub struct MockSensorLink {
    name: String,
    behavior: MockBehavior,
    board: MockBoard,
    rx: VecDeque<u8>,
    read_timeout: Duration,
    reply_delay: Duration,
}

impl MockSensorLink {
    fn is_bulk_command(bytes: &[u8]) -> bool {
        let selects: Vec<u8> = bytes.iter().copied().filter(|&b| b != 0).collect();
        let expected: Vec<u8> = (0..SENSOR_COUNT as u8).map(|i| SELECT_SENSOR_BASE + i).collect();
        bytes.len() > 1 && selects == expected
    }

    fn check_plugged(&self) -> LinkResult<()> {
        if self.board.state().unplugged {
            return Err(LinkError::Disconnected { port: self.name.clone() });
        }
        Ok(())
    }

    fn answer_bulk(&mut self) -> LinkResult<()> {
        let mut state = self.board.state();
        state.bulk_reads += 1;

        let mut reply = Vec::with_capacity(FRAME_LEN * SENSOR_COUNT);
        for sample in state.readings {
            reply.extend_from_slice(&encode_frame(sample));
        }

        match self.behavior {
            MockBehavior::Responsive => {}
            MockBehavior::Silent => reply.clear(),
            MockBehavior::ShortReply { bytes } => reply.truncate(bytes),
            MockBehavior::DisconnectAfter { bulk_reads } => {
                if state.bulk_reads > bulk_reads {
                    state.unplugged = true;
                    return Err(LinkError::Disconnected { port: self.name.clone() });
                }
            }
            MockBehavior::FailOpen => unreachable!("port never opens"),
        }
        drop(state);

        if !self.reply_delay.is_zero() {
            std::thread::sleep(self.reply_delay);
        }
        self.rx.extend(reply);
        Ok(())
    }
}

impl SensorLink for MockSensorLink {
    fn port_name(&self) -> &str {
        &self.name
    }

    fn write_all(&mut self, bytes: &[u8]) -> LinkResult<()> {
        self.check_plugged()?;

        if Self::is_bulk_command(bytes) {
            return self.answer_bulk();
        }

        let mut state = self.board.state();
        for &byte in bytes {
            state.commands.push(byte);
            match byte {
                START_STREAMING => state.streaming = true,
                STOP_STREAMING => state.streaming = false,
                _ => {}
            }
        }
        Ok(())
    }

    fn read_frame(&mut self, frame: &mut [u8; FRAME_LEN]) -> LinkResult<()> {
        self.check_plugged()?;

        if self.rx.len() < FRAME_LEN {
            // a real port blocks for the full timeout and drops the partial frame
            std::thread::sleep(self.read_timeout);
            self.rx.clear();
            return Err(LinkError::Timeout {
                timeout_ms: self.read_timeout.as_millis() as u64,
            });
        }

        for byte in frame.iter_mut() {
            *byte = self.rx.pop_front().unwrap_or_default();
        }
        Ok(())
    }

    fn bytes_to_read(&mut self) -> LinkResult<u32> {
        self.check_plugged()?;
        Ok(self.rx.len() as u32)
    }

    fn clear_input(&mut self) -> LinkResult<()> {
        self.check_plugged()?;
        self.rx.clear();
        Ok(())
    }
}

impl Drop for MockSensorLink {
    fn drop(&mut self) {
        self.board.state().closed += 1;
    }
}
