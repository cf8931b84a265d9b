//! Metrics collection and registry.

use crate::grabber::SimpleGrabber;
use crate::queue::DeviceState;
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Registration or encoding failed.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of grabber state for metrics update.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Current device lifecycle state.
    pub state: DeviceState,
    /// Commands executed by the worker, successful or not.
    pub commands_executed: u64,
    /// Commands the device reported as failed.
    pub command_failures: u64,
    /// Frames handed to listeners.
    pub frames_published: u64,
    /// Failed frame pulls.
    pub frame_errors: u64,
    /// Frames replaced in the slot before a consumer tick read them.
    pub frames_overwritten: u64,
    /// Latest fps estimate, if two frames were observed.
    pub fps: Option<f64>,
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self {
            state: DeviceState::Closed,
            commands_executed: 0,
            command_failures: 0,
            frames_published: 0,
            frame_errors: 0,
            frames_overwritten: 0,
            fps: None,
        }
    }
}

/// Prometheus metrics registry for grabber monitoring.
pub struct MetricsRegistry {
    registry: Registry,

    // Command metrics
    commands_executed: IntCounter,
    command_failures: IntCounter,

    // Frame metrics
    frames_published: IntCounter,
    frame_errors: IntCounter,
    frames_overwritten: IntCounter,
    fps: Gauge,

    device_state: IntGauge,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all grabber metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let commands_executed = IntCounter::new(
            "frame_grabber_commands_executed_total",
            "Total device commands executed by the command queue",
        )?;
        let command_failures = IntCounter::new(
            "frame_grabber_command_failures_total",
            "Total device commands that reported an error",
        )?;

        let frames_published = IntCounter::new(
            "frame_grabber_frames_published_total",
            "Total frames published by the command queue thread",
        )?;
        let frame_errors = IntCounter::new(
            "frame_grabber_frame_errors_total",
            "Total failed frame pulls during free-run capture",
        )?;
        let frames_overwritten = IntCounter::new(
            "frame_grabber_frames_overwritten_total",
            "Total frames replaced before the consumer observed them",
        )?;
        let fps = Gauge::new("frame_grabber_fps", "Frame rate seen by the consumer")?;

        let device_state = IntGauge::new(
            "frame_grabber_device_state",
            "Device lifecycle state (0=closed, 1=opening, 2=open, 3=capturing, 4=closing, 5=deleting)",
        )?;

        registry.register(Box::new(commands_executed.clone()))?;
        registry.register(Box::new(command_failures.clone()))?;
        registry.register(Box::new(frames_published.clone()))?;
        registry.register(Box::new(frame_errors.clone()))?;
        registry.register(Box::new(frames_overwritten.clone()))?;
        registry.register(Box::new(fps.clone()))?;
        registry.register(Box::new(device_state.clone()))?;

        Ok(Self {
            registry,
            commands_executed,
            command_failures,
            frames_published,
            frame_errors,
            frames_overwritten,
            fps,
            device_state,
        })
    }

    /// Updates all metrics from a snapshot of grabber state.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        self.device_state.set(snapshot.state.code());

        // Counters only move forward, so add the difference
        advance(&self.commands_executed, snapshot.commands_executed);
        advance(&self.command_failures, snapshot.command_failures);
        advance(&self.frames_published, snapshot.frames_published);
        advance(&self.frame_errors, snapshot.frame_errors);
        advance(&self.frames_overwritten, snapshot.frames_overwritten);

        if let Some(fps) = snapshot.fps {
            self.fps.set(fps);
        }
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

impl MetricsSnapshot {
    /// Creates a snapshot from the current state of a grabber.
    pub fn from_grabber(grabber: &SimpleGrabber) -> Self {
        let stats = grabber.stats();
        Self {
            state: grabber.state(),
            commands_executed: stats.commands_executed,
            command_failures: stats.command_failures,
            frames_published: stats.frames_published,
            frame_errors: stats.frame_errors,
            frames_overwritten: grabber.frames_overwritten(),
            fps: grabber.fps().map(f64::from),
        }
    }
}
