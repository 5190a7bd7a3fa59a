//! Consumer-facing interface to the acquisition loop
//!
//! [`AcquisitionWorker`] runs on its own thread; everything else talks to it
//! through an [`AcquisitionHandle`].

pub mod acquisition;
pub mod notify;
pub mod types;

pub use acquisition::{AcquisitionHandle, AcquisitionThread, AcquisitionWorker};
pub use notify::{TickObserver, TickSlot};
pub use types::{ApiError, ApiResult, SensorReading, TickReport};
