//! Magnetic Source Locator
//!
//! Streams field vectors from a four-sensor magnetometer board over a serial
//! link, smooths and baseline-corrects them, and trilaterates the position of
//! a magnetic source over the board.
//!
//! ```no_run
//! use magnet_locator::{AcquisitionWorker, SerialPortProvider, SystemConfig};
//! use std::time::Duration;
//!
//! let worker = AcquisitionWorker::new(SerialPortProvider::new(), SystemConfig::default())?;
//! let acquisition = worker.spawn()?;
//! let handle = acquisition.handle();
//!
//! if let Some(report) = handle.wait_newer(None, Duration::from_secs(5)) {
//!     println!("{:?}", report.position);
//! }
//! acquisition.stop_and_join().ok();
//! # Ok::<(), magnet_locator::ApiError>(())
//! ```

pub mod core;
pub mod algorithms;
pub mod processing;
pub mod utils;
pub mod hardware;
pub mod api;

// Re-export commonly used types
pub use core::{BoardLayout, RawSample, SensorId, SensorPlacement, StableVector, CalibratedVector, PositionEstimate};
pub use algorithms::TrilaterationEngine;
pub use processing::{CalibrationStore, FilterWindow, Command};
pub use hardware::{
    LinkError, LinkResult, LinkSettings, LinkStatus, MockBehavior, MockBoard, MockPortProvider,
    PortProvider, SensorLink, SerialPortProvider,
};
pub use api::{AcquisitionHandle, AcquisitionThread, AcquisitionWorker, ApiError, ApiResult, SensorReading, TickReport};
pub use utils::{ConfigurationManager, ConfigError, SystemConfig};
