//! Acquisition loop and its control handle
//!
//! [`AcquisitionWorker`] owns the serial link, the filter windows, the
//! calibration store and the trilateration engine, and runs
//! discovery -> handshake -> priming -> streaming on one dedicated thread
//! until stopped. Link failures close the port and restart discovery.
//!
//! Consumers talk to the running worker only through [`AcquisitionHandle`]:
//! atomic request flags in, latest [`TickReport`] out.

use crate::algorithms::TrilaterationEngine;
use crate::api::notify::{TickObserver, TickSlot};
use crate::api::types::{ApiError, ApiResult, TickReport};
use crate::core::{SensorId, StableVector, SENSOR_COUNT, TICK_LEN};
use crate::hardware::{LinkError, LinkResult, LinkStatus, PortProvider, RecoveryStrategy, SensorLink};
use crate::processing::{bulk_command, trimmed_mean, CalibrationStore, Command, FilterError, FilterWindow};
use crate::utils::config::SystemConfig;
use log::{debug, info, trace, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// State shared between the worker and its handles
#[derive(Default)]
struct Shared {
    stop: AtomicBool,
    recalibrate: [AtomicBool; SENSOR_COUNT],
    capture_ratio: [AtomicBool; SENSOR_COUNT],
    ticks: TickSlot,
    status: Mutex<LinkStatus>,
}

impl Shared {
    fn status(&self) -> MutexGuard<'_, LinkStatus> {
        self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Consumer-side control of a running acquisition loop
#[derive(Clone)]
pub struct AcquisitionHandle {
    shared: Arc<Shared>,
}

impl AcquisitionHandle {
    /// Ask the loop to close the port and exit. Returns immediately.
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stop.load(Ordering::Acquire)
    }

    /// Take the sensor's next stable reading as its new baseline
    pub fn recalibrate(&self, sensor: SensorId) {
        self.shared.recalibrate[sensor.index()].store(true, Ordering::Release);
    }

    /// Scale the sensor so its next reading ranges to half the calibration
    /// distance
    pub fn capture_ratio(&self, sensor: SensorId) {
        self.shared.capture_ratio[sensor.index()].store(true, Ordering::Release);
    }

    pub fn latest(&self) -> Option<TickReport> {
        self.shared.ticks.latest()
    }

    pub fn wait_newer(&self, after: Option<u64>, timeout: Duration) -> Option<TickReport> {
        self.shared.ticks.wait_newer(after, timeout)
    }

    pub fn status(&self) -> LinkStatus {
        self.shared.status().clone()
    }
}

/// A worker running on its own thread
pub struct AcquisitionThread {
    handle: AcquisitionHandle,
    thread: JoinHandle<()>,
}

impl AcquisitionThread {
    pub fn handle(&self) -> AcquisitionHandle {
        self.handle.clone()
    }

    pub fn stop(&self) {
        self.handle.stop();
    }

    pub fn join(self) -> thread::Result<()> {
        self.thread.join()
    }

    pub fn stop_and_join(self) -> thread::Result<()> {
        self.handle.stop();
        self.thread.join()
    }
}

/// Owner of the serial link and the per-sensor processing state
pub struct AcquisitionWorker<P: PortProvider> {
    provider: P,
    config: SystemConfig,
    bulk: Vec<u8>,
    windows: [FilterWindow; SENSOR_COUNT],
    calibration: CalibrationStore,
    engine: TrilaterationEngine,
    observers: Vec<TickObserver>,
    shared: Arc<Shared>,
    sequence: u64,
}

impl<P: PortProvider> AcquisitionWorker<P> {
    /// Validate `config` and build an idle worker
    pub fn new(provider: P, config: SystemConfig) -> ApiResult<Self> {
        config.validate()?;
        let window = FilterWindow::new(config.filter_length)?;
        let engine = TrilaterationEngine::new(config.board.clone())
            .with_calibration_distance(config.calibration_distance)
            .with_ratios(config.calibration_ratios);

        Ok(Self {
            provider,
            bulk: bulk_command(config.write_delay),
            windows: std::array::from_fn(|_| window.clone()),
            calibration: CalibrationStore::new(),
            engine,
            observers: Vec::new(),
            shared: Arc::new(Shared::default()),
            sequence: 0,
            config,
        })
    }

    pub fn handle(&self) -> AcquisitionHandle {
        AcquisitionHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Register an observer called on the acquisition thread for every tick
    pub fn add_observer(&mut self, observer: TickObserver) {
        self.observers.push(observer);
    }

    pub fn spawn(mut self) -> ApiResult<AcquisitionThread>
    where
        P: 'static,
    {
        let handle = self.handle();
        let thread = thread::Builder::new()
            .name("acquisition".to_string())
            .spawn(move || self.run())
            .map_err(ApiError::Spawn)?;
        Ok(AcquisitionThread { handle, thread })
    }

    /// Run sessions until stopped. Never fails: every runtime error is
    /// logged and followed by rediscovery.
    pub fn run(&mut self) {
        info!("acquisition started");

        while !self.stopped() {
            let result = self.session();
            self.end_session();

            if let Err(error) = result {
                self.record_error(&error);
                match error.recovery_strategy() {
                    RecoveryStrategy::RediscoverAfterBackoff => {
                        let backoff = self.config.no_device_backoff();
                        warn!("{}; retrying in {:?}", error, backoff);
                        self.pause(backoff);
                    }
                    RecoveryStrategy::Rediscover => warn!("{}; rediscovering", error),
                }
            }
        }

        info!("acquisition stopped");
    }

    fn stopped(&self) -> bool {
        self.shared.stop.load(Ordering::Acquire)
    }

    /// Sleep in read-timeout slices; false if a stop arrived meanwhile
    fn pause(&self, duration: Duration) -> bool {
        let slice = self.config.link.read_timeout();
        let deadline = Instant::now() + duration;
        loop {
            if self.stopped() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(slice.min(deadline - now));
        }
    }

    /// One connection: returns Ok when stopped, Err when the link failed
    fn session(&mut self) -> ApiResult<()> {
        let Some(mut link) = self.discover()? else {
            return Ok(());
        };
        let port = link.port_name().to_string();
        info!("sensor board found on {}", port);
        {
            let mut status = self.shared.status();
            status.port = Some(port.clone());
            status.sessions += 1;
        }

        for _ in 0..self.config.filter_length {
            if self.stopped() {
                self.shutdown(link);
                return Ok(());
            }
            link.write_all(&self.bulk)?;
            if !self.read_frames(link.as_mut())? {
                self.shutdown(link);
                return Ok(());
            }
        }

        let baseline = self.stable_vectors()?;
        for sensor in SensorId::ALL {
            self.calibration.capture_baseline(sensor, baseline[sensor.index()]);
        }
        debug!("baselines captured on {}", port);

        link.send_command(Command::StartStreaming)?;
        self.shared.status().streaming = true;
        info!("streaming from {}", port);

        while !self.stopped() {
            link.write_all(&self.bulk)?;
            self.publish_tick()?;
            if !self.read_frames(link.as_mut())? {
                break;
            }
        }

        self.shutdown(link);
        Ok(())
    }

    /// First port that passes the handshake, or `None` if stopped
    fn discover(&mut self) -> ApiResult<Option<Box<dyn SensorLink>>> {
        let ports = self.provider.list_ports()?;
        for port in &ports {
            if self.stopped() {
                return Ok(None);
            }
            match self.try_handshake(port) {
                Ok(Some(link)) => return Ok(Some(link)),
                Ok(None) => return Ok(None),
                Err(error) => debug!("{} rejected: {}", port, error),
            }
        }
        Err(LinkError::NoDevice { ports: ports.len() }.into())
    }

    /// Open `port` and check that a bulk write yields exactly one full tick
    fn try_handshake(&self, port: &str) -> LinkResult<Option<Box<dyn SensorLink>>> {
        let mut link = self.provider.open(port, &self.config.link)?;
        link.clear_input()?;
        link.write_all(&self.bulk)?;
        if !self.pause(self.config.handshake_settle()) {
            return Ok(None);
        }

        let received = link.bytes_to_read()?;
        if received as usize != TICK_LEN {
            return Err(LinkError::HandshakeMismatch {
                port: port.to_string(),
                expected: TICK_LEN,
                received,
            });
        }

        link.send_command(Command::StopStreaming)?;
        link.clear_input()?;
        debug!("{} answered the handshake", port);
        Ok(Some(link))
    }

    /// Read one frame per sensor into the windows; false if stopped first
    fn read_frames(&mut self, link: &mut dyn SensorLink) -> LinkResult<bool> {
        for sensor in SensorId::ALL {
            if self.stopped() {
                return Ok(false);
            }
            let sample = link.read_sample()?;
            self.windows[sensor.index()].push(sample);
        }
        Ok(true)
    }

    fn stable_vectors(&self) -> Result<[StableVector; SENSOR_COUNT], FilterError> {
        let mut stable = [StableVector::zeros(); SENSOR_COUNT];
        for (out, window) in stable.iter_mut().zip(&self.windows) {
            *out = trimmed_mean(window)?;
        }
        Ok(stable)
    }

    fn publish_tick(&mut self) -> ApiResult<()> {
        let stable = self.stable_vectors()?;

        for sensor in SensorId::ALL {
            if self.shared.recalibrate[sensor.index()].swap(false, Ordering::AcqRel) {
                info!("recalibrating {}", sensor);
                self.calibration.request_recalibration(sensor);
            }
        }
        let calibrated = self.calibration.apply(&stable);

        for sensor in SensorId::ALL {
            if !self.shared.capture_ratio[sensor.index()].swap(false, Ordering::AcqRel) {
                continue;
            }
            match calibrated[sensor.index()] {
                Ok(field) => {
                    let ratio = self.engine.capture_ratio(sensor, &field);
                    info!("{} calibration ratio set to {:.4e}", sensor, ratio);
                }
                Err(error) => warn!("ratio capture skipped: {}", error),
            }
        }

        self.sequence += 1;
        let report = TickReport::build(self.sequence, &calibrated, &self.engine);
        if let Some(position) = report.position {
            trace!("tick {}: source at ({:.1}, {:.1})", report.sequence, position.x, position.y);
        }

        for observer in &self.observers {
            observer(&report);
        }
        self.shared.ticks.publish(report);
        self.shared.status().ticks += 1;
        Ok(())
    }

    fn shutdown(&self, mut link: Box<dyn SensorLink>) {
        if let Err(error) = link.send_command(Command::StopStreaming) {
            debug!("stop command not delivered: {}", error);
        }
        info!("closing {}", link.port_name());
    }

    /// Forget per-session state; the port is already closed
    fn end_session(&mut self) {
        for window in &mut self.windows {
            window.clear();
        }
        self.calibration.reset();
        let mut status = self.shared.status();
        status.port = None;
        status.streaming = false;
    }

    fn record_error(&self, error: &ApiError) {
        let mut status = self.shared.status();
        status.errors += 1;
        status.last_error = Some(error.to_string());
    }
}
