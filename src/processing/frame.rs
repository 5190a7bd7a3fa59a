//! Wire frame codec for the sensor board
//!
//! Every sensor reply is a fixed 6-byte frame holding big-endian signed
//! 16-bit X, Y and Z. Commands towards the board are single ASCII bytes,
//! except the bulk frame that selects all four sensors in one write.

use crate::core::{RawSample, SensorId, FRAME_LEN, SELECT_SENSOR_BASE, SENSOR_COUNT, START_STREAMING, STOP_STREAMING, TICK_LEN};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame length mismatch: expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
}

/// Single-byte commands understood by the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Queue one reading of the given sensor
    Select(SensorId),
    StartStreaming,
    StopStreaming,
}

impl Command {
    pub fn byte(self) -> u8 {
        match self {
            Command::Select(sensor) => SELECT_SENSOR_BASE + sensor.index() as u8,
            Command::StartStreaming => START_STREAMING,
            Command::StopStreaming => STOP_STREAMING,
        }
    }
}

/// Decode one sensor frame
pub fn decode_frame(bytes: &[u8]) -> Result<RawSample, FrameError> {
    if bytes.len() != FRAME_LEN {
        return Err(FrameError::Length {
            expected: FRAME_LEN,
            actual: bytes.len(),
        });
    }

    let word = |i: usize| i16::from_be_bytes([bytes[i], bytes[i + 1]]);
    Ok(RawSample::new(word(0), word(2), word(4)))
}

pub fn encode_frame(sample: RawSample) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[0..2].copy_from_slice(&sample.x.to_be_bytes());
    frame[2..4].copy_from_slice(&sample.y.to_be_bytes());
    frame[4..6].copy_from_slice(&sample.z.to_be_bytes());
    frame
}

/// Split a full bulk reply into the four samples, in sensor order
pub fn decode_tick(bytes: &[u8]) -> Result<[RawSample; SENSOR_COUNT], FrameError> {
    if bytes.len() != TICK_LEN {
        return Err(FrameError::Length {
            expected: TICK_LEN,
            actual: bytes.len(),
        });
    }

    let mut samples = [RawSample::default(); SENSOR_COUNT];
    for (sample, chunk) in samples.iter_mut().zip(bytes.chunks_exact(FRAME_LEN)) {
        *sample = decode_frame(chunk)?;
    }
    Ok(samples)
}

/// Build the bulk select frame.
///
/// The four select bytes are spaced `delay + 1` apart with zero padding in
/// between; the padding paces the board's replies at 9600 baud.
pub fn bulk_command(delay: usize) -> Vec<u8> {
    let period = delay + 1;
    let mut frame = vec![0u8; SENSOR_COUNT + (SENSOR_COUNT - 1) * delay];
    for sensor in SensorId::ALL {
        frame[sensor.index() * period] = Command::Select(sensor).byte();
    }
    frame
}
