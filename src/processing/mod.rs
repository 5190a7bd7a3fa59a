//! Signal processing: wire frames, window filtering and baseline calibration

pub mod frame;
pub mod filter;
pub mod calibration;

pub use frame::{decode_frame, encode_frame, decode_tick, bulk_command, Command, FrameError};
pub use filter::{FilterWindow, FilterError, trimmed_mean, trimmed_mean_of, MIN_FILTER_LENGTH};
pub use calibration::{CalibrationStore, CalibrationError};
