//! End-to-end acquisition over simulated boards

use approx::assert_relative_eq;
use magnet_locator::{
    AcquisitionHandle, AcquisitionWorker, ApiError, CalibratedVector, MockBehavior, MockPortProvider, RawSample,
    SensorId, SystemConfig, TickReport,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const PATIENCE: Duration = Duration::from_secs(5);
const BASELINE: RawSample = RawSample { x: 100, y: -50, z: 200 };

fn fast_config() -> SystemConfig {
    SystemConfig {
        filter_length: 4,
        handshake_settle_ms: 5,
        no_device_backoff_ms: 20,
        ..Default::default()
    }
}

fn provider() -> MockPortProvider {
    MockPortProvider::new().with_reply_delay(Duration::from_millis(1))
}

/// First tick accepted by `accept`, panicking after `PATIENCE`
fn wait_for(handle: &AcquisitionHandle, mut accept: impl FnMut(&TickReport) -> bool) -> TickReport {
    let deadline = Instant::now() + PATIENCE;
    let mut after = None;
    while Instant::now() < deadline {
        if let Some(report) = handle.wait_newer(after, Duration::from_millis(50)) {
            if accept(&report) {
                return report;
            }
            after = Some(report.sequence);
        }
    }
    panic!("no matching tick within {:?}", PATIENCE);
}

fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + PATIENCE;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met within {:?}", PATIENCE);
        thread::sleep(Duration::from_millis(5));
    }
}

fn field(report: &TickReport, sensor: SensorId) -> CalibratedVector {
    report.reading(sensor).field.expect("sensor has a baseline")
}

#[test]
fn streams_and_locates_board_centre() {
    let mut provider = provider();
    let board = provider.add_port("COM3", MockBehavior::Responsive);
    board.set_all_readings(BASELINE);

    let acquisition = AcquisitionWorker::new(provider, fast_config()).unwrap().spawn().unwrap();
    let handle = acquisition.handle();

    let report = wait_for(&handle, |_| true);
    let position = report.position.expect("all sensors calibrated");
    assert_relative_eq!(position.x, 360.0);
    assert_relative_eq!(position.y, 360.0);
    assert_eq!(field(&report, SensorId::S4), CalibratedVector::zeros());

    let status = handle.status();
    assert_eq!(status.port.as_deref(), Some("COM3"));
    assert!(status.is_healthy());
    assert!(board.is_streaming());

    acquisition.stop_and_join().unwrap();
}

#[test]
fn stop_closes_port_promptly() {
    let mut provider = provider();
    let board = provider.add_port("COM1", MockBehavior::Responsive);
    board.set_all_readings(BASELINE);

    let acquisition = AcquisitionWorker::new(provider, fast_config()).unwrap().spawn().unwrap();
    wait_for(&acquisition.handle(), |_| true);

    let started = Instant::now();
    acquisition.stop_and_join().unwrap();
    assert!(started.elapsed() < Duration::from_millis(500));

    assert!(!board.is_open());
    assert!(!board.is_streaming());
    // handshake silences the board, priming ends with start, stop silences it again
    assert_eq!(board.commands(), vec![b'6', b'5', b'6']);
}

#[test]
fn stop_interrupts_no_device_backoff() {
    let config = SystemConfig {
        no_device_backoff_ms: 60_000,
        ..fast_config()
    };
    let acquisition = AcquisitionWorker::new(MockPortProvider::new(), config).unwrap().spawn().unwrap();
    let handle = acquisition.handle();
    eventually(|| handle.status().errors >= 1);

    let started = Instant::now();
    acquisition.stop_and_join().unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(handle.is_stopped());
}

#[test]
fn short_reply_port_is_skipped() {
    let mut provider = provider();
    let short = provider.add_port("COM1", MockBehavior::ShortReply { bytes: 12 });
    let good = provider.add_port("COM2", MockBehavior::Responsive);
    good.set_all_readings(BASELINE);

    let acquisition = AcquisitionWorker::new(provider, fast_config()).unwrap().spawn().unwrap();
    let handle = acquisition.handle();
    wait_for(&handle, |r| r.position.is_some());

    assert_eq!(handle.status().port.as_deref(), Some("COM2"));
    assert!(short.times_opened() >= 1);
    assert!(!short.is_open());
    assert!(short.commands().is_empty());

    acquisition.stop_and_join().unwrap();
    assert!(!good.is_open());
}

#[test]
fn bad_ports_alone_publish_nothing() {
    let mut provider = provider();
    let short = provider.add_port("COM1", MockBehavior::ShortReply { bytes: 18 });
    let silent = provider.add_port("COM2", MockBehavior::Silent);
    provider.add_port("COM3", MockBehavior::FailOpen);

    let acquisition = AcquisitionWorker::new(provider, fast_config()).unwrap().spawn().unwrap();
    let handle = acquisition.handle();
    eventually(|| handle.status().errors >= 2);

    assert!(handle.latest().is_none());
    assert!(handle.status().port.is_none());
    assert!(handle.status().last_error.is_some());

    acquisition.stop_and_join().unwrap();
    for board in [&short, &silent] {
        assert!(board.times_opened() >= 1);
        assert_eq!(board.times_opened(), board.times_closed());
    }
}

#[test]
fn disconnect_triggers_rediscovery() {
    let mut provider = provider();
    let board = provider.add_port("COM4", MockBehavior::DisconnectAfter { bulk_reads: 12 });
    board.set_all_readings(BASELINE);

    let acquisition = AcquisitionWorker::new(provider, fast_config()).unwrap().spawn().unwrap();
    let handle = acquisition.handle();

    let before = wait_for(&handle, |_| true);
    eventually(|| handle.status().errors >= 1 && !board.is_open());
    assert!(!handle.status().streaming);

    board.replug();
    let after = wait_for(&handle, |_| handle.status().sessions >= 2);
    assert!(after.sequence > before.sequence);
    assert!(after.position.is_some());

    acquisition.stop_and_join().unwrap();
    assert!(!board.is_open());
}

#[test]
fn recalibrate_zeroes_sensor() {
    let mut provider = provider();
    let board = provider.add_port("COM1", MockBehavior::Responsive);
    board.set_all_readings(BASELINE);

    let acquisition = AcquisitionWorker::new(provider, fast_config()).unwrap().spawn().unwrap();
    let handle = acquisition.handle();
    wait_for(&handle, |_| true);

    board.set_reading(SensorId::S1, RawSample::new(160, -50, 200));
    let drifted = wait_for(&handle, |r| field(r, SensorId::S1) == CalibratedVector::new(60.0, 0.0, 0.0));
    assert_eq!(field(&drifted, SensorId::S2), CalibratedVector::zeros());

    handle.recalibrate(SensorId::S1);
    let report = wait_for(&handle, |r| field(r, SensorId::S1) == CalibratedVector::zeros());
    assert_eq!(field(&report, SensorId::S2), CalibratedVector::zeros());

    acquisition.stop_and_join().unwrap();
}

#[test]
fn captured_ratio_ranges_half_calibration_distance() {
    let mut provider = provider();
    let board = provider.add_port("COM1", MockBehavior::Responsive);
    board.set_all_readings(BASELINE);

    let acquisition = AcquisitionWorker::new(provider, fast_config()).unwrap().spawn().unwrap();
    let handle = acquisition.handle();
    wait_for(&handle, |_| true);

    board.set_reading(SensorId::S1, RawSample::new(100, -50, 300));
    wait_for(&handle, |r| field(r, SensorId::S1) == CalibratedVector::new(0.0, 0.0, 100.0));

    handle.capture_ratio(SensorId::S1);
    let report = wait_for(&handle, |r| r.ratios[0] != 1.0);
    assert_relative_eq!(report.ratios[0], 640.0_f64.powi(3) * 100.0);
    assert_relative_eq!(report.reading(SensorId::S1).radius.unwrap(), 320.0, epsilon = 1e-9);
    assert_eq!(report.ratios[1..], [1.0; 3]);

    acquisition.stop_and_join().unwrap();
}

#[test]
fn observers_see_every_tick() {
    let mut provider = provider();
    let board = provider.add_port("COM1", MockBehavior::Responsive);
    board.set_all_readings(BASELINE);

    let seen = Arc::new(AtomicUsize::new(0));
    let mut worker = AcquisitionWorker::new(provider, fast_config()).unwrap();
    let counter = Arc::clone(&seen);
    worker.add_observer(Box::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    let acquisition = worker.spawn().unwrap();
    let handle = acquisition.handle();
    wait_for(&handle, |r| r.sequence >= 5);
    acquisition.stop_and_join().unwrap();

    assert_eq!(seen.load(Ordering::SeqCst) as u64, handle.status().ticks);
    assert_eq!(handle.latest().unwrap().sequence, handle.status().ticks);
}

#[test]
fn degenerate_filter_length_fails_at_startup() {
    let config = SystemConfig {
        filter_length: 2,
        ..fast_config()
    };
    match AcquisitionWorker::new(MockPortProvider::new(), config) {
        Err(ApiError::Configuration(error)) => assert!(error.to_string().contains("filter_length")),
        Err(other) => panic!("unexpected error {}", other),
        Ok(_) => panic!("filter length 2 accepted"),
    }
}
