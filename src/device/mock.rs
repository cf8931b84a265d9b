//! Mock device for tests and demos.
//!
//! [`MockDevice`] produces synthetic frames at a configured rate, or frames
//! fed in from a test through [`FrameFeeder`]. Every control call is written
//! to a shared [`Journal`] so callers can check call order and detect
//! overlapping calls.

use super::capability::{Device, DeviceError, DeviceKind};
use super::settings::{Binning, GpoMode, Roi, TriggerSettings};
use crate::capture::{ConfigError, Frame};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// How long a scripted device waits for a fed frame before reporting none.
const SCRIPTED_POLL: Duration = Duration::from_millis(20);

/// Synthetic sensor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    /// Sensor width in pixels.
    pub width: u32,
    /// Sensor height in pixels.
    pub height: u32,
    /// Free-run frame rate.
    pub fps: f32,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30.0,
        }
    }
}

impl MockConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if !(1.0..=1000.0).contains(&self.fps) {
            return Err(ConfigError::InvalidFrameRate);
        }
        Ok(())
    }

    /// Returns the interval between free-run frames.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.fps.clamp(1.0, 1000.0))
    }
}

/// A control call observed by the mock device.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    /// `open` with the device index.
    Open(u32),
    /// `close`.
    Close,
    /// `start_free_run`.
    StartFreeRun,
    /// `stop_free_run`.
    StopFreeRun,
    /// `set_binning`.
    SetBinning(Binning),
    /// `set_roi`.
    SetRoi(Roi),
    /// `set_trigger_mode`.
    SetTriggerMode(TriggerSettings),
    /// `set_gpo_mode`.
    SetGpoMode(GpoMode),
    /// `set_exposure`.
    SetExposure(Duration),
    /// `set_gain`.
    SetGain(f32),
    /// `set_focus`.
    SetFocus(f32),
    /// `set_sharpness`.
    SetSharpness(f32),
    /// `single_shot`.
    SingleShot,
}

impl DeviceCall {
    /// Short operation name, used to match injected failures.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Open(_) => "open",
            Self::Close => "close",
            Self::StartFreeRun => "start_free_run",
            Self::StopFreeRun => "stop_free_run",
            Self::SetBinning(_) => "set_binning",
            Self::SetRoi(_) => "set_roi",
            Self::SetTriggerMode(_) => "set_trigger_mode",
            Self::SetGpoMode(_) => "set_gpo_mode",
            Self::SetExposure(_) => "set_exposure",
            Self::SetGain(_) => "set_gain",
            Self::SetFocus(_) => "set_focus",
            Self::SetSharpness(_) => "set_sharpness",
            Self::SingleShot => "single_shot",
        }
    }
}

#[derive(Debug, Default)]
struct JournalInner {
    calls: Mutex<Vec<DeviceCall>>,
    in_call: AtomicBool,
    overlaps: AtomicUsize,
    frames_pulled: AtomicUsize,
    released: AtomicBool,
}

/// Shared record of the calls a [`MockDevice`] received.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    inner: Arc<JournalInner>,
}

impl Journal {
    /// Returns a copy of every recorded call, in arrival order.
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.inner
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of recorded calls.
    pub fn len(&self) -> usize {
        self.inner
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if no call was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns how many calls started while another was still running.
    pub fn overlaps(&self) -> usize {
        self.inner.overlaps.load(Ordering::SeqCst)
    }

    /// Returns how many frames were handed out in free-run mode.
    pub fn frames_pulled(&self) -> usize {
        self.inner.frames_pulled.load(Ordering::SeqCst)
    }

    /// Returns true once the device has been dropped.
    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::SeqCst)
    }

    /// Waits until at least `count` calls were recorded.
    pub fn wait_for_len(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.len() < count {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }

    fn enter(&self, call: DeviceCall) -> CallGuard {
        let guard = self.busy();
        self.inner
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        guard
    }

    /// Marks the device busy without recording a call. Frame pulls use
    /// this so they count towards overlaps too.
    fn busy(&self) -> CallGuard {
        if self.inner.in_call.swap(true, Ordering::SeqCst) {
            self.inner.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        CallGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct CallGuard {
    inner: Arc<JournalInner>,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.inner.in_call.store(false, Ordering::SeqCst);
    }
}

/// Sends frames to a scripted [`MockDevice`].
#[derive(Debug, Clone)]
pub struct FrameFeeder {
    tx: Sender<Frame>,
}

impl FrameFeeder {
    /// Queues a frame for the next `get_frame` call. Returns false if the
    /// device is gone.
    pub fn feed(&self, frame: Frame) -> bool {
        self.tx.send(frame).is_ok()
    }
}

enum FrameSource {
    Synthetic { next_due: Option<Instant> },
    Scripted(Receiver<Frame>),
}

/// Mock device generating frames without hardware.
pub struct MockDevice {
    config: MockConfig,
    kind: DeviceKind,
    source: FrameSource,
    journal: Journal,
    call_delay: Duration,
    failures: Vec<&'static str>,
    open: bool,
    streaming: bool,
    binning: Binning,
    roi: Option<Roi>,
    index: u64,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new(MockConfig::default())
    }
}

impl MockDevice {
    /// Creates a mock device producing synthetic frames.
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            kind: DeviceKind::Blocking,
            source: FrameSource::Synthetic { next_due: None },
            journal: Journal::default(),
            call_delay: Duration::ZERO,
            failures: Vec::new(),
            open: false,
            streaming: false,
            binning: Binning::default(),
            roi: None,
            index: 0,
        }
    }

    /// Creates a mock device that streams only the frames fed to it.
    pub fn scripted(config: MockConfig) -> (Self, FrameFeeder) {
        let (tx, rx) = mpsc::channel();
        let mut device = Self::new(config);
        device.source = FrameSource::Scripted(rx);
        (device, FrameFeeder { tx })
    }

    /// Overrides the reported device kind.
    pub fn with_kind(mut self, kind: DeviceKind) -> Self {
        self.kind = kind;
        self
    }

    /// Makes every control call take at least `delay`.
    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    /// Makes the named operation (see [`DeviceCall::name`]) fail.
    pub fn with_failure(mut self, operation: &'static str) -> Self {
        self.failures.push(operation);
        self
    }

    /// Returns a handle to the call journal.
    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    fn call(&self, call: DeviceCall) -> Result<(), DeviceError> {
        let name = call.name();
        let _guard = self.journal.enter(call);
        if !self.call_delay.is_zero() {
            thread::sleep(self.call_delay);
        }
        if self.failures.contains(&name) {
            return Err(DeviceError::Hardware(format!("injected {name} failure")));
        }
        Ok(())
    }

    fn require_open(&self) -> Result<(), DeviceError> {
        if self.open {
            Ok(())
        } else {
            Err(DeviceError::NotOpen)
        }
    }

    fn frame_size(&self) -> (u32, u32) {
        let (width, height) = self
            .roi
            .map(|roi| (roi.width, roi.height))
            .unwrap_or((self.config.width, self.config.height));
        (
            (width / self.binning.x.max(1)).max(1),
            (height / self.binning.y.max(1)).max(1),
        )
    }

    fn synthesize(&mut self) -> Frame {
        let (width, height) = self.frame_size();
        let index = self.index;
        let pixels = (0..height)
            .flat_map(|y| (0..width).map(move |x| ((x as u64 + y as u64 + index) % 256) as u8))
            .collect();
        self.index += 1;
        Frame::new(pixels, width, height, index)
    }
}

impl Device for MockDevice {
    fn kind(&self) -> DeviceKind {
        self.kind
    }

    fn open(&mut self, device_id: u32) -> Result<(), DeviceError> {
        self.call(DeviceCall::Open(device_id))
            .map_err(|e| DeviceError::OpenFailed(e.to_string()))?;
        self.open = true;
        self.index = 0;
        tracing::info!(device_id, "MockDevice opened with config: {:?}", self.config);
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        let result = self.call(DeviceCall::Close);
        self.open = false;
        self.streaming = false;
        tracing::info!("MockDevice closed");
        result
    }

    fn start_free_run(&mut self) -> Result<(), DeviceError> {
        self.require_open()?;
        self.call(DeviceCall::StartFreeRun)?;
        self.streaming = true;
        if let FrameSource::Synthetic { next_due } = &mut self.source {
            *next_due = Some(Instant::now());
        }
        Ok(())
    }

    fn stop_free_run(&mut self) -> Result<(), DeviceError> {
        self.require_open()?;
        self.streaming = false;
        self.call(DeviceCall::StopFreeRun)
    }

    fn get_frame(&mut self) -> Result<Option<Frame>, DeviceError> {
        self.require_open()?;
        if !self.streaming {
            return Err(DeviceError::NotStreaming);
        }
        let _busy = self.journal.busy();

        let scripted = match &mut self.source {
            FrameSource::Scripted(rx) => Some(match rx.recv_timeout(SCRIPTED_POLL) {
                Ok(frame) => Some(frame),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => {
                    thread::sleep(SCRIPTED_POLL);
                    None
                }
            }),
            FrameSource::Synthetic { next_due } => {
                let interval = self.config.frame_interval();
                let due = next_due.unwrap_or_else(Instant::now);
                let now = Instant::now();
                if due > now {
                    thread::sleep(due - now);
                }
                *next_due = Some(due.max(now) + interval);
                None
            }
        };
        let frame = match scripted {
            Some(frame) => frame,
            None => Some(self.synthesize()),
        };

        if frame.is_some() {
            self.journal.inner.frames_pulled.fetch_add(1, Ordering::SeqCst);
        }
        Ok(frame)
    }

    fn set_binning(&mut self, binning: Binning) -> Result<(), DeviceError> {
        self.require_open()?;
        self.call(DeviceCall::SetBinning(binning))?;
        self.binning = binning;
        Ok(())
    }

    fn set_roi(&mut self, roi: Roi) -> Result<(), DeviceError> {
        self.require_open()?;
        if !roi.fits_within(self.config.width, self.config.height) {
            return Err(DeviceError::Hardware(format!(
                "roi {roi} exceeds sensor {}x{}",
                self.config.width, self.config.height
            )));
        }
        self.call(DeviceCall::SetRoi(roi))?;
        self.roi = Some(roi);
        Ok(())
    }

    fn set_trigger_mode(&mut self, trigger: TriggerSettings) -> Result<(), DeviceError> {
        self.require_open()?;
        self.call(DeviceCall::SetTriggerMode(trigger))
    }

    fn set_gpo_mode(&mut self, mode: GpoMode) -> Result<(), DeviceError> {
        self.require_open()?;
        self.call(DeviceCall::SetGpoMode(mode))
    }

    fn set_exposure(&mut self, exposure: Duration) -> Result<(), DeviceError> {
        self.require_open()?;
        self.call(DeviceCall::SetExposure(exposure))
    }

    fn set_gain(&mut self, gain: f32) -> Result<(), DeviceError> {
        self.require_open()?;
        self.call(DeviceCall::SetGain(gain))
    }

    fn set_focus(&mut self, focus: f32) -> Result<(), DeviceError> {
        self.require_open()?;
        self.call(DeviceCall::SetFocus(focus))
    }

    fn set_sharpness(&mut self, sharpness: f32) -> Result<(), DeviceError> {
        self.require_open()?;
        self.call(DeviceCall::SetSharpness(sharpness))
    }

    fn single_shot(&mut self) -> Result<Frame, DeviceError> {
        self.require_open()?;
        self.call(DeviceCall::SingleShot)?;
        Ok(self.synthesize())
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.journal.inner.released.store(true, Ordering::SeqCst);
        tracing::debug!("MockDevice released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> MockConfig {
        MockConfig {
            width: 8,
            height: 6,
            fps: 200.0,
        }
    }

    #[test]
    fn test_mock_device_lifecycle() {
        let mut device = MockDevice::new(small());
        let journal = device.journal();

        device.open(3).unwrap();
        device.start_free_run().unwrap();

        let first = device.get_frame().unwrap().unwrap();
        assert!(first.is_valid());
        assert_eq!(first.index(), 0);
        let second = device.get_frame().unwrap().unwrap();
        assert_eq!(second.index(), 1);
        assert!(second.timestamp() > first.timestamp());

        device.stop_free_run().unwrap();
        device.close().unwrap();

        assert_eq!(
            journal.calls(),
            vec![
                DeviceCall::Open(3),
                DeviceCall::StartFreeRun,
                DeviceCall::StopFreeRun,
                DeviceCall::Close
            ]
        );
        assert_eq!(journal.frames_pulled(), 2);
        assert_eq!(journal.overlaps(), 0);
    }

    #[test]
    fn test_capture_without_open() {
        let mut device = MockDevice::new(small());
        assert!(matches!(device.get_frame(), Err(DeviceError::NotOpen)));
        assert!(matches!(
            device.start_free_run(),
            Err(DeviceError::NotOpen)
        ));
    }

    #[test]
    fn test_binning_and_roi_shape_frames() {
        let mut device = MockDevice::new(small());
        device.open(0).unwrap();
        device.set_roi(Roi::new(0, 0, 8, 4)).unwrap();
        device.set_binning(Binning::new(2, 2)).unwrap();

        let frame = device.single_shot().unwrap();
        assert_eq!((frame.width(), frame.height()), (4, 2));
        assert!(frame.is_valid());

        assert!(device.set_roi(Roi::new(4, 0, 8, 4)).is_err());
    }

    #[test]
    fn test_injected_failure() {
        let mut device = MockDevice::new(small()).with_failure("open");
        assert!(matches!(device.open(0), Err(DeviceError::OpenFailed(_))));
        assert!(matches!(device.close(), Ok(())));
    }

    #[test]
    fn test_scripted_frames() {
        let (mut device, feeder) = MockDevice::scripted(small());
        device.open(0).unwrap();
        device.start_free_run().unwrap();

        assert!(device.get_frame().unwrap().is_none());
        assert!(feeder.feed(Frame::new(vec![1; 4], 2, 2, 42)));
        assert_eq!(device.get_frame().unwrap().unwrap().index(), 42);
    }

    #[test]
    fn test_frame_pull_during_call_counts_as_overlap() {
        let mut device = MockDevice::new(small());
        let journal = device.journal();
        device.open(0).unwrap();
        device.start_free_run().unwrap();

        device.get_frame().unwrap();
        assert_eq!(journal.overlaps(), 0);

        let _running = journal.enter(DeviceCall::SetGain(0.5));
        device.get_frame().unwrap();
        assert_eq!(journal.overlaps(), 1);
    }

    #[test]
    fn test_release_is_recorded() {
        let device = MockDevice::default();
        let journal = device.journal();
        assert!(!journal.is_released());
        drop(device);
        assert!(journal.is_released());
    }

    #[test]
    fn test_mock_config_validation() {
        assert!(MockConfig::default().validate().is_ok());
        let bad = MockConfig {
            fps: 0.0,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(ConfigError::InvalidFrameRate)));
    }
}
