//! Polling grabber with a once-per-tick view of the latest frame.

use super::base::{Grabber, GrabberError};
use super::present::{FrameUploader, HasPixels, Updatable};
use super::slot::FrameSlot;
use crate::capture::{Frame, GrabberConfig};
use crate::device::{Device, GpoMode, Roi, TriggerSettings};
use crate::queue::{DeviceState, QueueStats};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Grabber for consumers that poll once per update cycle.
///
/// Frames published by the worker thread land in a [`FrameSlot`]. Each call
/// to [`update`](Updatable::update) takes the newest unread frame, marks it
/// as new for that tick, caches it for pixel access and refreshes the fps
/// estimate.
///
/// Frame policy: every capture is a new `Arc<Frame>`, so callers may keep
/// old frames as long as they like. Before the first capture there is no
/// frame at all.
pub struct SimpleGrabber {
    grabber: Grabber,
    slot: Arc<FrameSlot>,
    current: Option<Arc<Frame>>,
    current_frame_new: bool,
    fps: Option<f32>,
    last_timestamp: Option<Instant>,
    last_frame_index: Option<u64>,
    uploader: Option<Box<dyn FrameUploader>>,
    use_uploader: bool,
    fresh_frame_timeout: Duration,
}

impl SimpleGrabber {
    /// Creates a grabber for `device`.
    pub fn new(device: impl Device + 'static) -> Result<Self, GrabberError> {
        let grabber = Grabber::new(device)?;
        let slot = Arc::new(FrameSlot::new());
        let sink = Arc::clone(&slot);
        grabber.add_frame_listener(move |frame| sink.set_frame(Arc::clone(frame)));

        Ok(Self {
            grabber,
            slot,
            current: None,
            current_frame_new: false,
            fps: None,
            last_timestamp: None,
            last_frame_index: None,
            uploader: None,
            use_uploader: true,
            fresh_frame_timeout: GrabberConfig::default().fresh_frame_timeout(),
        })
    }

    /// Queues every setting in `config` and adopts its fresh-frame timeout.
    pub fn configure(&mut self, config: &GrabberConfig) -> Result<(), GrabberError> {
        self.grabber.apply_config(config)?;
        self.fresh_frame_timeout = config.fresh_frame_timeout();
        Ok(())
    }

    /// Opens the device, blocking until it reports open.
    pub fn open(&self, device_id: u32) -> Result<(), GrabberError> {
        self.grabber.open(device_id)
    }

    /// Closes the device, blocking until it is closed.
    pub fn close(&self) -> Result<(), GrabberError> {
        self.grabber.close()
    }

    /// Applies `trigger`, then starts free-run capture.
    pub fn start_capture(&self, trigger: TriggerSettings) -> Result<(), GrabberError> {
        self.grabber.set_trigger_mode(trigger)?;
        self.grabber.start_capture()
    }

    /// Stops free-run capture.
    pub fn stop_capture(&self) -> Result<(), GrabberError> {
        self.grabber.stop_capture()
    }

    /// Captures one frame outside free-run mode.
    pub fn single_shot(&self) -> Result<(), GrabberError> {
        self.grabber.single_shot()
    }

    /// Sets a fixed exposure time.
    pub fn set_exposure(&self, exposure: Duration) -> Result<(), GrabberError> {
        self.grabber.set_exposure(exposure)
    }

    /// Sets normalized gain.
    pub fn set_gain(&self, gain: f32) -> Result<(), GrabberError> {
        self.grabber.set_gain(gain)
    }

    /// Sets normalized focus.
    pub fn set_focus(&self, focus: f32) -> Result<(), GrabberError> {
        self.grabber.set_focus(focus)
    }

    /// Sets normalized sharpness.
    pub fn set_sharpness(&self, sharpness: f32) -> Result<(), GrabberError> {
        self.grabber.set_sharpness(sharpness)
    }

    /// Sets binning factors.
    pub fn set_binning(&self, binning_x: u32, binning_y: u32) -> Result<(), GrabberError> {
        self.grabber.set_binning(binning_x, binning_y)
    }

    /// Sets the region of interest.
    pub fn set_roi(&self, roi: Roi) -> Result<(), GrabberError> {
        self.grabber.set_roi(roi)
    }

    /// Sets trigger mode and signal.
    pub fn set_trigger_mode(&self, trigger: TriggerSettings) -> Result<(), GrabberError> {
        self.grabber.set_trigger_mode(trigger)
    }

    /// Sets the general purpose output mode.
    pub fn set_gpo_mode(&self, mode: GpoMode) -> Result<(), GrabberError> {
        self.grabber.set_gpo_mode(mode)
    }

    /// True if the last update tick observed a new frame.
    pub fn is_frame_new(&self) -> bool {
        self.current_frame_new
    }

    /// Frame rate estimated from the last two observed frames.
    pub fn fps(&self) -> Option<f32> {
        self.fps
    }

    /// Capture time of the last observed frame.
    pub fn last_timestamp(&self) -> Option<Instant> {
        self.last_timestamp
    }

    /// Index of the last observed frame.
    pub fn last_frame_index(&self) -> Option<u64> {
        self.last_frame_index
    }

    /// Latest published frame, which may be newer than the cached one.
    pub fn get_frame(&self) -> Option<Arc<Frame>> {
        self.slot.get_frame()
    }

    /// Frame observed by the last fresh update tick.
    pub fn frame(&self) -> Option<&Arc<Frame>> {
        self.current.as_ref()
    }

    /// Publishes a frame into the slot as if the device had produced it.
    pub fn set_frame(&self, frame: Arc<Frame>) {
        self.slot.set_frame(frame);
    }

    /// Returns a frame captured after this call, waiting at most `timeout`.
    ///
    /// With `give_copy`, the returned frame is a private copy; otherwise it
    /// is the same `Arc` the slot holds. Call [`update`](Updatable::update)
    /// afterwards to make the frame visible through the cached accessors.
    pub fn get_fresh_frame(
        &self,
        give_copy: bool,
        timeout: Duration,
    ) -> Result<Arc<Frame>, GrabberError> {
        let since = Instant::now();
        let frame = self
            .slot
            .wait_for_fresh(since, timeout)
            .ok_or(GrabberError::FreshFrameTimeout { timeout })?;
        tracing::trace!(index = frame.index(), "fresh frame delivered");
        Ok(if give_copy {
            Arc::new(Frame::clone(&frame))
        } else {
            frame
        })
    }

    /// [`get_fresh_frame`](Self::get_fresh_frame) with the configured timeout.
    pub fn fresh_frame(&self, give_copy: bool) -> Result<Arc<Frame>, GrabberError> {
        self.get_fresh_frame(give_copy, self.fresh_frame_timeout)
    }

    /// Installs the hook run for every frame an update tick observes.
    pub fn set_uploader(&mut self, uploader: impl FrameUploader + 'static) {
        self.uploader = Some(Box::new(uploader));
    }

    /// Enables or disables the upload hook.
    pub fn set_use_uploader(&mut self, use_uploader: bool) {
        self.use_uploader = use_uploader;
    }

    /// True if an uploader is installed and enabled.
    pub fn is_using_uploader(&self) -> bool {
        self.use_uploader && self.uploader.is_some()
    }

    /// Frames replaced in the slot before an update tick read them.
    pub fn frames_overwritten(&self) -> u64 {
        self.slot.overwritten()
    }

    /// Current device lifecycle state.
    pub fn state(&self) -> DeviceState {
        self.grabber.state()
    }

    /// Worker counters.
    pub fn stats(&self) -> QueueStats {
        self.grabber.stats()
    }

    /// Access to the underlying grabber core.
    pub fn grabber(&self) -> &Grabber {
        &self.grabber
    }
}

impl Updatable for SimpleGrabber {
    fn update(&mut self) {
        let Some(frame) = self.slot.take_new() else {
            self.current_frame_new = false;
            return;
        };

        self.current_frame_new = true;
        let timestamp = frame.timestamp();
        if let Some(last) = self.last_timestamp {
            let delta = timestamp.saturating_duration_since(last).as_secs_f32();
            if delta > 0.0 {
                self.fps = Some(1.0 / delta);
            }
        }
        self.last_timestamp = Some(timestamp);
        self.last_frame_index = Some(frame.index());

        if self.use_uploader {
            if let Some(uploader) = self.uploader.as_mut() {
                uploader.upload(&frame);
            }
        }
        self.current = Some(frame);
    }
}

impl HasPixels for SimpleGrabber {
    fn pixels(&self) -> &[u8] {
        self.current.as_deref().map(Frame::pixels).unwrap_or(&[])
    }

    fn width(&self) -> u32 {
        self.current.as_deref().map(Frame::width).unwrap_or(0)
    }

    fn height(&self) -> u32 {
        self.current.as_deref().map(Frame::height).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{FrameFeeder, MockConfig, MockDevice};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scripted() -> (SimpleGrabber, FrameFeeder) {
        let (device, feeder) = MockDevice::scripted(MockConfig {
            width: 4,
            height: 4,
            fps: 30.0,
        });
        (SimpleGrabber::new(device).unwrap(), feeder)
    }

    fn frame(index: u64, timestamp: Instant) -> Frame {
        Frame::with_timestamp(vec![index as u8; 16], 4, 4, index, timestamp)
    }

    /// Ticks until the given frame index is observed as new.
    fn tick_until(grabber: &mut SimpleGrabber, index: u64) {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            grabber.update();
            if grabber.is_frame_new() && grabber.last_frame_index() == Some(index) {
                return;
            }
            assert!(Instant::now() < deadline, "frame {index} never arrived");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_update_marks_frame_new_for_one_tick() {
        let (mut grabber, _feeder) = scripted();
        let captured = Instant::now();
        grabber.set_frame(Arc::new(frame(0, captured)));

        grabber.update();
        assert!(grabber.is_frame_new());
        assert_eq!(grabber.get_frame().unwrap().timestamp(), captured);
        assert_eq!(grabber.pixels(), &[0u8; 16][..]);
        assert_eq!((grabber.width(), grabber.height()), (4, 4));

        grabber.update();
        assert!(!grabber.is_frame_new());
        assert_eq!(grabber.last_frame_index(), Some(0));
        assert_eq!(grabber.frame().map(|f| f.index()), Some(0));
    }

    #[test]
    fn test_fps_from_consecutive_frames() {
        let (mut grabber, _feeder) = scripted();
        let t = Instant::now();

        grabber.set_frame(Arc::new(frame(0, t)));
        grabber.update();
        assert!(grabber.fps().is_none());

        grabber.set_frame(Arc::new(frame(1, t + Duration::from_millis(250))));
        grabber.update();
        let fps = grabber.fps().unwrap();
        assert!((fps - 4.0).abs() < 1e-3, "fps was {fps}");
    }

    #[test]
    fn test_empty_before_first_frame() {
        let (mut grabber, _feeder) = scripted();
        grabber.update();
        assert!(!grabber.is_frame_new());
        assert!(grabber.get_frame().is_none());
        assert!(grabber.pixels().is_empty());
        assert_eq!(grabber.width(), 0);
        assert!(grabber.last_frame_index().is_none());
    }

    #[test]
    fn test_fresh_frame_times_out_instead_of_returning_stale() {
        let (grabber, _feeder) = scripted();
        grabber.set_frame(Arc::new(frame(0, Instant::now())));
        std::thread::sleep(Duration::from_millis(2));

        let result = grabber.get_fresh_frame(true, Duration::from_millis(30));
        assert!(matches!(
            result,
            Err(GrabberError::FreshFrameTimeout { .. })
        ));
        // repeated calls behave the same
        assert!(grabber
            .get_fresh_frame(false, Duration::from_millis(10))
            .is_err());
    }

    #[test]
    fn test_fresh_frame_from_device() {
        let (grabber, feeder) = scripted();
        grabber.open(0).unwrap();
        grabber.start_capture(TriggerSettings::default()).unwrap();

        let producer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            feeder.feed(frame(5, Instant::now()));
            feeder
        });

        let called_at = Instant::now();
        let fresh = grabber.get_fresh_frame(false, Duration::from_secs(2)).unwrap();
        assert!(fresh.timestamp() >= called_at);
        assert_eq!(fresh.index(), 5);

        let shared = grabber.get_frame().unwrap();
        assert!(Arc::ptr_eq(&fresh, &shared));
        let _feeder = producer.join().unwrap();
    }

    #[test]
    fn test_fresh_frame_without_deadline() {
        let (grabber, _feeder) = scripted();
        let slot = Arc::clone(&grabber.slot);
        let producer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            slot.set_frame(Arc::new(frame(7, Instant::now())));
        });

        let fresh = grabber.get_fresh_frame(false, Duration::MAX).unwrap();
        assert_eq!(fresh.index(), 7);
        producer.join().unwrap();
    }

    #[test]
    fn test_fresh_frame_copy_is_independent() {
        let (grabber, _feeder) = scripted();
        let slot = Arc::clone(&grabber.slot);
        let producer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            slot.set_frame(Arc::new(frame(3, Instant::now())));
        });

        let copy = grabber.get_fresh_frame(true, Duration::from_secs(2)).unwrap();
        producer.join().unwrap();
        let shared = grabber.get_frame().unwrap();
        assert!(!Arc::ptr_eq(&copy, &shared));
        assert_eq!(copy.index(), shared.index());
        assert_eq!(copy.pixels(), shared.pixels());
    }

    #[test]
    fn test_uploader_runs_only_on_new_frames() {
        let (mut grabber, _feeder) = scripted();
        let uploads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&uploads);
        grabber.set_uploader(move |_: &Frame| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(grabber.is_using_uploader());

        grabber.set_frame(Arc::new(frame(0, Instant::now())));
        grabber.update();
        grabber.update();
        assert_eq!(uploads.load(Ordering::SeqCst), 1);

        grabber.set_use_uploader(false);
        grabber.set_frame(Arc::new(frame(1, Instant::now())));
        grabber.update();
        assert_eq!(uploads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_capture_session_scenario() {
        let (mut grabber, feeder) = scripted();

        grabber.open(0).unwrap();
        assert_eq!(grabber.state(), DeviceState::Open);
        grabber.start_capture(TriggerSettings::default()).unwrap();

        let t0 = Instant::now();
        for i in 0..3u64 {
            assert!(feeder.feed(frame(i, t0 + Duration::from_secs(i))));
            tick_until(&mut grabber, i);
        }

        let fps = grabber.fps().unwrap();
        assert!((fps - 1.0).abs() < 1e-3, "fps was {fps}");
        assert_eq!(grabber.last_frame_index(), Some(2));
        assert_eq!(grabber.state(), DeviceState::Capturing);

        grabber.stop_capture().unwrap();
        grabber.close().unwrap();
        assert_eq!(grabber.state(), DeviceState::Closed);
        assert_eq!(grabber.stats().frames_published, 3);
    }
}
