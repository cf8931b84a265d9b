//! Dedicated thread that serializes device access.
//!
//! The device is moved onto the worker thread when the queue is spawned and
//! is dropped there when the thread exits. Callers only ever append
//! [`Command`]s; the worker pops them in order and runs each one to
//! completion before touching the device again. Between commands, while
//! free-run capture is active, the worker pulls one frame at a time and
//! hands it to the registered frame listeners.

use super::command::Command;
use super::state::{DeviceState, StateCell};
use crate::capture::{ConfigError, Frame};
use crate::device::{Binning, Device, DeviceError, GpoMode, Roi, TriggerSettings};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError, RwLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use thiserror::Error;

/// Pause after a failed frame pull, so a broken stream cannot spin the worker.
const FRAME_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Callback fired on the worker thread for every published frame.
pub type FrameListener = Box<dyn Fn(&Arc<Frame>) + Send + Sync>;

/// Callback fired on the worker thread for every failed command.
pub type ErrorListener = Box<dyn Fn(&CommandFailure) + Send + Sync>;

/// Errors returned to callers submitting commands.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The worker has stopped; the command will never run.
    #[error("command queue has shut down")]
    Shutdown,
    /// A blocking call was made from the worker thread.
    #[error("blocking call from the command queue thread would deadlock")]
    WouldDeadlock,
    /// The command payload failed validation.
    #[error("invalid command argument: {0}")]
    InvalidCommand(#[from] ConfigError),
    /// The worker thread could not be started.
    #[error("failed to spawn command queue thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// A device command that failed on the worker thread.
#[derive(Debug, Clone)]
pub struct CommandFailure {
    /// Name of the failed command (see [`Command::name`]).
    pub command: &'static str,
    /// Error reported by the device.
    pub error: DeviceError,
}

/// Counters maintained by the worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Commands run, successful or not.
    pub commands_executed: u64,
    /// Commands the device reported as failed.
    pub command_failures: u64,
    /// Frames handed to listeners.
    pub frames_published: u64,
    /// Failed frame pulls.
    pub frame_errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    commands_executed: AtomicU64,
    command_failures: AtomicU64,
    frames_published: AtomicU64,
    frame_errors: AtomicU64,
}

type SharedListener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Registered callbacks. Callers get a snapshot, so a listener may
/// register further listeners without deadlocking the worker.
#[derive(Default)]
struct Listeners {
    frame: RwLock<Vec<SharedListener<Arc<Frame>>>>,
    error: RwLock<Vec<SharedListener<CommandFailure>>>,
}

fn snapshot<T: ?Sized>(listeners: &RwLock<Vec<Arc<T>>>) -> Vec<Arc<T>> {
    listeners
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

#[derive(Default)]
struct Pending {
    commands: VecDeque<(u64, Command)>,
    /// Ticket handed to the next submitted command.
    next_ticket: u64,
    /// Number of tickets fully executed. Ticket `t` is done once
    /// `completed > t`.
    completed: u64,
    stop: bool,
    exited: bool,
}

struct Shared {
    pending: Mutex<Pending>,
    changed: Condvar,
    state: StateCell,
    listeners: Listeners,
    counters: Counters,
    worker: OnceLock<ThreadId>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, Pending>) -> MutexGuard<'a, Pending> {
        self.changed
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn on_worker_thread(&self) -> bool {
        self.worker.get() == Some(&thread::current().id())
    }
}

/// Serializes every device call on one background thread.
pub struct CommandQueue {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl CommandQueue {
    /// Moves `device` onto a new worker thread.
    pub fn spawn(device: Box<dyn Device>) -> Result<Self, QueueError> {
        let shared = Arc::new(Shared {
            pending: Mutex::new(Pending::default()),
            changed: Condvar::new(),
            state: StateCell::new(),
            listeners: Listeners::default(),
            counters: Counters::default(),
            worker: OnceLock::new(),
        });

        let worker = Worker {
            device,
            shared: Arc::clone(&shared),
            open: false,
            streaming: false,
        };
        let handle = thread::Builder::new()
            .name("frame-grabber-commands".into())
            .spawn(move || worker.run())?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Appends a command. With `block_until_complete`, waits until the
    /// worker has executed it.
    pub fn add_action(&self, command: Command, block_until_complete: bool) -> Result<(), QueueError> {
        command.validate()?;
        if block_until_complete && self.shared.on_worker_thread() {
            return Err(QueueError::WouldDeadlock);
        }

        let mut pending = self.shared.lock();
        if pending.stop || pending.exited {
            return Err(QueueError::Shutdown);
        }
        let ticket = pending.next_ticket;
        pending.next_ticket += 1;
        tracing::debug!(command = command.name(), ticket, "command queued");
        pending.commands.push_back((ticket, command));
        self.shared.changed.notify_all();

        if !block_until_complete {
            return Ok(());
        }
        while pending.completed <= ticket {
            if pending.exited {
                return Err(QueueError::Shutdown);
            }
            pending = self.shared.wait(pending);
        }
        Ok(())
    }

    /// Waits until every command submitted so far has executed.
    pub fn block_until_action_queue_empty(&self) -> Result<(), QueueError> {
        if self.shared.on_worker_thread() {
            return Err(QueueError::WouldDeadlock);
        }
        let mut pending = self.shared.lock();
        while pending.completed < pending.next_ticket {
            if pending.exited {
                return Err(QueueError::Shutdown);
            }
            pending = self.shared.wait(pending);
        }
        Ok(())
    }

    /// Opens the device, blocking until the command has run.
    pub fn open(&self, device_id: u32) -> Result<(), QueueError> {
        self.add_action(Command::Open { device_id }, true)
    }

    /// Closes the device, blocking until the command has run.
    pub fn close(&self) -> Result<(), QueueError> {
        self.add_action(Command::Close, true)
    }

    /// Queues the start of free-run capture.
    pub fn start_free_run(&self, block: bool) -> Result<(), QueueError> {
        self.add_action(Command::StartFreeRun, block)
    }

    /// Queues the end of free-run capture.
    pub fn stop_free_run(&self, block: bool) -> Result<(), QueueError> {
        self.add_action(Command::StopFreeRun, block)
    }

    /// Queues a single capture.
    pub fn single_shot(&self, block: bool) -> Result<(), QueueError> {
        self.add_action(Command::SingleShot, block)
    }

    /// Sets binning factors.
    pub fn set_binning(&self, binning: Binning, block: bool) -> Result<(), QueueError> {
        self.add_action(Command::SetBinning(binning), block)
    }

    /// Sets the region of interest.
    pub fn set_roi(&self, roi: Roi, block: bool) -> Result<(), QueueError> {
        self.add_action(Command::SetRoi(roi), block)
    }

    /// Sets trigger mode and signal.
    pub fn set_trigger_mode(&self, trigger: TriggerSettings, block: bool) -> Result<(), QueueError> {
        self.add_action(Command::SetTriggerSettings(trigger), block)
    }

    /// Sets the general purpose output mode.
    pub fn set_gpo_mode(&self, mode: GpoMode, block: bool) -> Result<(), QueueError> {
        self.add_action(Command::SetGpoMode(mode), block)
    }

    /// Sets a fixed exposure time.
    pub fn set_exposure(&self, exposure: Duration, block: bool) -> Result<(), QueueError> {
        self.add_action(Command::SetExposure(exposure), block)
    }

    /// Sets normalized gain.
    pub fn set_gain(&self, gain: f32, block: bool) -> Result<(), QueueError> {
        self.add_action(Command::SetGain(gain), block)
    }

    /// Sets normalized focus.
    pub fn set_focus(&self, focus: f32, block: bool) -> Result<(), QueueError> {
        self.add_action(Command::SetFocus(focus), block)
    }

    /// Sets normalized sharpness.
    pub fn set_sharpness(&self, sharpness: f32, block: bool) -> Result<(), QueueError> {
        self.add_action(Command::SetSharpness(sharpness), block)
    }

    /// Registers a callback for every published frame.
    pub fn add_frame_listener(&self, listener: FrameListener) {
        self.shared
            .listeners
            .frame
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::from(listener));
    }

    /// Registers a callback for every failed command.
    pub fn add_error_listener(&self, listener: ErrorListener) {
        self.shared
            .listeners
            .error
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::from(listener));
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> DeviceState {
        self.shared.state.get()
    }

    /// Marks the device as being torn down. No further transition is
    /// accepted afterwards.
    pub(crate) fn begin_deleting(&self) {
        self.shared.state.transition(DeviceState::Deleting);
    }

    /// Returns the number of commands waiting to run.
    pub fn pending(&self) -> usize {
        self.shared.lock().commands.len()
    }

    /// Returns a snapshot of the worker counters.
    pub fn stats(&self) -> QueueStats {
        let counters = &self.shared.counters;
        QueueStats {
            commands_executed: counters.commands_executed.load(Ordering::Relaxed),
            command_failures: counters.command_failures.load(Ordering::Relaxed),
            frames_published: counters.frames_published.load(Ordering::Relaxed),
            frame_errors: counters.frame_errors.load(Ordering::Relaxed),
        }
    }

    /// Asks the worker to exit after the command it is running, if any.
    pub fn stop(&self) {
        let mut pending = self.shared.lock();
        pending.stop = true;
        self.shared.changed.notify_all();
    }

    /// Stops the worker and waits for it to exit.
    pub fn join(&mut self) {
        self.stop();
        let Some(handle) = self.handle.take() else {
            return;
        };
        if self.shared.on_worker_thread() {
            tracing::warn!("command queue dropped on its own thread; not joining");
            return;
        }
        if handle.join().is_err() {
            tracing::error!("command queue thread panicked");
        }
    }
}

impl Drop for CommandQueue {
    fn drop(&mut self) {
        self.join();
    }
}

enum Next {
    Run(u64, Command),
    Idle,
    Stop,
}

/// Releases blocked submitters when the worker exits, including by panic.
struct ExitSignal {
    shared: Arc<Shared>,
}

impl Drop for ExitSignal {
    fn drop(&mut self) {
        let mut pending = self.shared.lock();
        pending.exited = true;
        let discarded = pending.commands.len();
        pending.commands.clear();
        self.shared.changed.notify_all();
        tracing::info!(discarded, "command queue thread stopped");
    }
}

struct Worker {
    device: Box<dyn Device>,
    shared: Arc<Shared>,
    open: bool,
    streaming: bool,
}

impl Worker {
    fn run(mut self) {
        let _ = self.shared.worker.set(thread::current().id());
        let exit = ExitSignal {
            shared: Arc::clone(&self.shared),
        };
        tracing::info!("command queue thread started");

        loop {
            match self.next() {
                Next::Stop => break,
                Next::Run(ticket, command) => {
                    self.execute(command);
                    let mut pending = self.shared.lock();
                    pending.completed = ticket + 1;
                    self.shared.changed.notify_all();
                }
                Next::Idle => {}
            }
            if self.streaming {
                self.pull_frame();
            }
        }

        let Worker { device, .. } = self;
        drop(device);
        drop(exit);
    }

    fn next(&self) -> Next {
        let mut pending = self.shared.lock();
        loop {
            if pending.stop {
                return Next::Stop;
            }
            if let Some((ticket, command)) = pending.commands.pop_front() {
                return Next::Run(ticket, command);
            }
            if self.streaming {
                return Next::Idle;
            }
            pending = self.shared.wait(pending);
        }
    }

    fn execute(&mut self, command: Command) {
        let name = command.name();
        tracing::debug!(command = name, "executing command");

        let result = if command.requires_open() && !self.open {
            Err(DeviceError::NotOpen)
        } else {
            match command {
                Command::Open { device_id } => self.open(device_id),
                Command::Close => self.close(),
                Command::StartFreeRun => self.start_free_run(),
                Command::StopFreeRun => self.stop_free_run(),
                Command::SingleShot => self.single_shot(),
                Command::SetBinning(binning) => self.device.set_binning(binning),
                Command::SetRoi(roi) => self.device.set_roi(roi),
                Command::SetTriggerSettings(trigger) => self.device.set_trigger_mode(trigger),
                Command::SetGpoMode(mode) => self.device.set_gpo_mode(mode),
                Command::SetExposure(exposure) => self.device.set_exposure(exposure),
                Command::SetGain(gain) => self.device.set_gain(gain),
                Command::SetFocus(focus) => self.device.set_focus(focus),
                Command::SetSharpness(sharpness) => self.device.set_sharpness(sharpness),
            }
        };

        let counters = &self.shared.counters;
        counters.commands_executed.fetch_add(1, Ordering::Relaxed);
        if let Err(error) = result {
            counters.command_failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(command = name, error = %error, "device command failed");
            let failure = CommandFailure {
                command: name,
                error,
            };
            for listener in snapshot(&self.shared.listeners.error) {
                listener(&failure);
            }
        }
    }

    fn open(&mut self, device_id: u32) -> Result<(), DeviceError> {
        if self.open {
            tracing::debug!(device_id, "device already open");
            return Ok(());
        }
        self.shared.state.transition(DeviceState::Opening);
        match self.device.open(device_id) {
            Ok(()) => {
                self.open = true;
                self.shared.state.transition(DeviceState::Open);
                Ok(())
            }
            Err(e) => {
                self.shared.state.transition(DeviceState::Closed);
                Err(e)
            }
        }
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        if !self.open {
            self.shared.state.transition(DeviceState::Closed);
            return Ok(());
        }
        self.shared.state.transition(DeviceState::Closing);
        if self.streaming {
            self.streaming = false;
            if let Err(e) = self.device.stop_free_run() {
                tracing::warn!(error = %e, "failed to stop free-run before close");
            }
        }
        let result = self.device.close();
        self.open = false;
        self.shared.state.transition(DeviceState::Closed);
        result
    }

    fn start_free_run(&mut self) -> Result<(), DeviceError> {
        if self.streaming {
            return Ok(());
        }
        self.device.start_free_run()?;
        self.streaming = true;
        self.shared.state.transition(DeviceState::Capturing);
        Ok(())
    }

    fn stop_free_run(&mut self) -> Result<(), DeviceError> {
        if !self.streaming {
            return Ok(());
        }
        self.streaming = false;
        self.shared.state.transition(DeviceState::Open);
        self.device.stop_free_run()
    }

    fn single_shot(&mut self) -> Result<(), DeviceError> {
        let frame = self.device.single_shot()?;
        self.publish(Arc::new(frame));
        Ok(())
    }

    fn pull_frame(&mut self) {
        match self.device.get_frame() {
            Ok(Some(frame)) => self.publish(Arc::new(frame)),
            Ok(None) => {}
            Err(e) => {
                self.shared
                    .counters
                    .frame_errors
                    .fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "frame pull failed");
                thread::sleep(FRAME_ERROR_BACKOFF);
            }
        }
    }

    fn publish(&self, frame: Arc<Frame>) {
        self.shared
            .counters
            .frames_published
            .fetch_add(1, Ordering::Relaxed);
        tracing::trace!(index = frame.index(), "frame published");
        for listener in snapshot(&self.shared.listeners.frame) {
            listener(&frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceCall, MockConfig, MockDevice};
    use proptest::prelude::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn fast_config() -> MockConfig {
        MockConfig {
            width: 8,
            height: 8,
            fps: 500.0,
        }
    }

    fn spawn(device: MockDevice) -> CommandQueue {
        CommandQueue::spawn(Box::new(device)).unwrap()
    }

    #[test]
    fn test_open_blocks_until_executed() {
        let device = MockDevice::new(fast_config()).with_call_delay(Duration::from_millis(50));
        let journal = device.journal();
        let queue = spawn(device);

        let started = Instant::now();
        queue.open(4).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(journal.calls(), vec![DeviceCall::Open(4)]);
        assert_eq!(queue.state(), DeviceState::Open);
    }

    #[test]
    fn test_failed_open_stays_closed() {
        let device = MockDevice::new(fast_config()).with_failure("open");
        let queue = spawn(device);

        let failures = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&failures);
        queue.add_error_listener(Box::new(move |failure| {
            assert_eq!(failure.command, "open");
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        queue.open(0).unwrap();
        assert_eq!(queue.state(), DeviceState::Closed);
        assert_eq!(failures.load(Ordering::SeqCst), 1);
        assert_eq!(queue.stats().command_failures, 1);
    }

    #[test]
    fn test_failed_close_still_closes() {
        let device = MockDevice::new(fast_config()).with_failure("close");
        let queue = spawn(device);

        queue.open(0).unwrap();
        queue.close().unwrap();
        assert_eq!(queue.state(), DeviceState::Closed);
        assert_eq!(queue.stats().command_failures, 1);
    }

    #[test]
    fn test_commands_before_open_do_not_reach_device() {
        let device = MockDevice::new(fast_config());
        let journal = device.journal();
        let queue = spawn(device);

        queue.set_gain(0.5, true).unwrap();
        queue.start_free_run(true).unwrap();
        assert!(journal.is_empty());
        assert_eq!(queue.stats().command_failures, 2);
        assert_eq!(queue.state(), DeviceState::Closed);
    }

    #[test]
    fn test_invalid_payload_rejected_at_submission() {
        let queue = spawn(MockDevice::new(fast_config()));
        assert!(matches!(
            queue.set_binning(Binning::new(0, 0), false),
            Err(QueueError::InvalidCommand(_))
        ));
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_free_run_publishes_frames() {
        let queue = spawn(MockDevice::new(fast_config()));
        let (tx, rx) = std::sync::mpsc::channel();
        queue.add_frame_listener(Box::new(move |frame| {
            let _ = tx.send(frame.index());
        }));

        queue.open(0).unwrap();
        queue.start_free_run(true).unwrap();
        assert_eq!(queue.state(), DeviceState::Capturing);

        let indices: Vec<u64> = (0..3)
            .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        assert_eq!(indices, vec![0, 1, 2]);

        queue.stop_free_run(true).unwrap();
        assert_eq!(queue.state(), DeviceState::Open);
        queue.close().unwrap();
        assert_eq!(queue.state(), DeviceState::Closed);
        assert!(queue.stats().frames_published >= 3);
    }

    #[test]
    fn test_close_while_capturing_stops_free_run_first() {
        let device = MockDevice::new(fast_config());
        let journal = device.journal();
        let queue = spawn(device);

        queue.open(0).unwrap();
        queue.start_free_run(false).unwrap();
        queue.close().unwrap();

        assert_eq!(
            journal.calls(),
            vec![
                DeviceCall::Open(0),
                DeviceCall::StartFreeRun,
                DeviceCall::StopFreeRun,
                DeviceCall::Close
            ]
        );
    }

    #[test]
    fn test_frame_pulls_never_overlap_commands() {
        let device = MockDevice::new(fast_config());
        let journal = device.journal();
        let queue = spawn(device);

        queue.open(0).unwrap();
        queue.start_free_run(true).unwrap();
        for i in 0..20 {
            queue.set_gain(i as f32 / 20.0, false).unwrap();
            thread::sleep(Duration::from_millis(1));
        }
        queue.block_until_action_queue_empty().unwrap();
        queue.close().unwrap();

        assert!(journal.frames_pulled() > 0);
        assert_eq!(journal.overlaps(), 0);
    }

    #[test]
    fn test_listener_may_register_listeners() {
        let queue = Arc::new(spawn(MockDevice::new(fast_config())));
        let registered = Arc::new(AtomicUsize::new(0));
        let weak = Arc::downgrade(&queue);
        let count = Arc::clone(&registered);
        queue.add_frame_listener(Box::new(move |_| {
            if let Some(queue) = weak.upgrade() {
                queue.add_error_listener(Box::new(|_| {}));
                count.fetch_add(1, Ordering::SeqCst);
            }
        }));

        queue.open(0).unwrap();
        queue.single_shot(true).unwrap();
        queue.single_shot(true).unwrap();
        assert_eq!(registered.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_single_shot_publishes_one_frame() {
        let queue = spawn(MockDevice::new(fast_config()));
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        queue.add_frame_listener(Box::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        queue.open(0).unwrap();
        queue.single_shot(true).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(queue.state(), DeviceState::Open);
    }

    #[test]
    fn test_blocking_submit_from_worker_is_refused() {
        let queue = Arc::new(spawn(MockDevice::new(fast_config())));
        let (tx, rx) = std::sync::mpsc::channel();
        let weak = Arc::downgrade(&queue);
        queue.add_frame_listener(Box::new(move |_| {
            if let Some(queue) = weak.upgrade() {
                let _ = tx.send(queue.block_until_action_queue_empty().is_err());
            }
        }));

        queue.open(0).unwrap();
        queue.single_shot(true).unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(1)).unwrap());
    }

    #[test]
    fn test_stop_mid_command_waits_and_discards_rest() {
        let device = MockDevice::new(fast_config()).with_call_delay(Duration::from_millis(100));
        let journal = device.journal();
        let mut queue = spawn(device);

        queue.add_action(Command::Open { device_id: 0 }, false).unwrap();
        queue.add_action(Command::SetGain(0.1), false).unwrap();
        assert!(journal.wait_for_len(1, Duration::from_secs(1)));

        let started = Instant::now();
        queue.join();
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(journal.calls(), vec![DeviceCall::Open(0)]);
        assert!(journal.is_released());
        assert!(matches!(
            queue.add_action(Command::Close, true),
            Err(QueueError::Shutdown)
        ));
    }

    #[test]
    fn test_block_until_empty_waits_for_all() {
        let device = MockDevice::new(fast_config()).with_call_delay(Duration::from_millis(5));
        let journal = device.journal();
        let queue = spawn(device);

        queue.add_action(Command::Open { device_id: 0 }, false).unwrap();
        for i in 0..5 {
            queue.set_gain(i as f32 / 10.0, false).unwrap();
        }
        queue.block_until_action_queue_empty().unwrap();
        assert_eq!(journal.len(), 6);
        assert_eq!(queue.pending(), 0);
    }

    fn expected_call(command: &Command) -> DeviceCall {
        match command {
            Command::SetBinning(b) => DeviceCall::SetBinning(*b),
            Command::SetGain(g) => DeviceCall::SetGain(*g),
            Command::SetGpoMode(m) => DeviceCall::SetGpoMode(*m),
            Command::SetTriggerSettings(t) => DeviceCall::SetTriggerMode(*t),
            other => panic!("unexpected command {other:?}"),
        }
    }

    fn setting_command() -> impl Strategy<Value = Command> {
        prop_oneof![
            (1u32..4, 1u32..4).prop_map(|(x, y)| Command::SetBinning(Binning::new(x, y))),
            (0u32..=100).prop_map(|g| Command::SetGain(g as f32 / 100.0)),
            prop_oneof![Just(GpoMode::Off), Just(GpoMode::On), Just(GpoMode::OnWhilstExposing)]
                .prop_map(Command::SetGpoMode),
            Just(Command::SetTriggerSettings(TriggerSettings::default())),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_commands_reach_device_in_submission_order(
            commands in proptest::collection::vec(setting_command(), 0..24)
        ) {
            let device = MockDevice::new(fast_config());
            let journal = device.journal();
            let queue = spawn(device);

            queue.add_action(Command::Open { device_id: 1 }, false).unwrap();
            for command in &commands {
                queue.add_action(command.clone(), false).unwrap();
            }
            queue.block_until_action_queue_empty().unwrap();

            let mut expected = vec![DeviceCall::Open(1)];
            expected.extend(commands.iter().map(expected_call));
            prop_assert_eq!(journal.calls(), expected);
            prop_assert_eq!(journal.overlaps(), 0);
        }
    }
}
