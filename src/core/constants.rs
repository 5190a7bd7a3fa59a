//! Wire protocol and rig constants

/// Fixed serial baud rate of the sensor board
pub const BAUD_RATE: u32 = 9600;

/// Read timeout for every blocking serial call (milliseconds)
pub const READ_TIMEOUT_MS: u64 = 200;

/// Bytes per sensor data frame (big-endian i16 X, Y, Z)
pub const FRAME_LEN: usize = 6;

/// Number of sensors on the board
pub const SENSOR_COUNT: usize = 4;

/// Bytes returned by one bulk read of all four sensors
pub const TICK_LEN: usize = FRAME_LEN * SENSOR_COUNT;

/// ASCII '1', the select command of the first sensor
pub const SELECT_SENSOR_BASE: u8 = b'1';

/// Start continuous streaming
pub const START_STREAMING: u8 = b'5';

/// Stop continuous streaming
pub const STOP_STREAMING: u8 = b'6';

/// Side of the square formed by the four sensors (board pixels)
pub const BOARD_SIDE: f64 = 640.0;

/// Full board edge; sensors sit `SENSOR_INSET` in from each corner
pub const BOARD_EDGE: f64 = 720.0;

pub const SENSOR_INSET: f64 = 40.0;

pub const DEFAULT_FILTER_LENGTH: usize = 10;

/// Zero bytes between two select commands in the bulk frame
pub const DEFAULT_WRITE_DELAY: usize = 10;

pub const DEFAULT_HANDSHAKE_SETTLE_MS: u64 = 500;

pub const DEFAULT_NO_DEVICE_BACKOFF_MS: u64 = 1000;
