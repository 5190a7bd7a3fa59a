//! Hardware abstraction layer for the sensor board link
//!
//! The acquisition loop talks to the board through [`SensorLink`] and finds
//! it through [`PortProvider`]. [`SerialPortProvider`] opens real serial
//! ports; [`MockPortProvider`] serves simulated boards.

pub mod link;
pub mod serial;
pub mod mock;
pub mod error;

pub use link::{SensorLink, PortProvider, LinkSettings, LinkStatus};
pub use serial::{SerialPortProvider, SerialSensorLink};
pub use mock::{MockPortProvider, MockSensorLink, MockBoard, MockBehavior};
pub use error::{LinkError, LinkResult, RecoveryStrategy};
