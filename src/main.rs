//! Frame Grabber CLI
//!
//! Command-line interface for exercising the command queue and frame
//! hand-off against a mock device.

use clap::Parser;
use frame_grabber::{
    capture::{ConfigError, FileConfig},
    device::MockDevice,
    grabber::{HasPixels, SimpleGrabber, Updatable},
    metrics::{MetricsRegistry, MetricsSnapshot},
};
use std::error::Error;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "frame-grabber", version, about = "Capture frames through a serialized device queue")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of new frames to observe before stopping
    #[arg(short = 'n', long)]
    frames: Option<u32>,

    /// Device index to open
    #[arg(short, long)]
    device: Option<u32>,

    /// Fresh frame timeout in seconds
    #[arg(long)]
    fresh_timeout: Option<f32>,

    /// Metrics server port, 0 disables (needs the `metrics` feature)
    #[arg(long)]
    metrics_port: Option<u16>,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Frame Grabber v{}", frame_grabber::VERSION);
    info!("This is a demonstration using a mock device");

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    if let Err(e) = ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst)) {
        warn!("Failed to install Ctrl-C handler: {}", e);
    }

    if let Err(e) = run(&config, &running) {
        error!("Capture failed: {}", e);
        std::process::exit(1);
    }
}

fn load_config(args: &Args) -> Result<FileConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };

    if let Some(device) = args.device {
        config.grabber.device_id = device;
    }
    if let Some(frames) = args.frames {
        config.output.frame_count = frames;
    }
    if let Some(timeout) = args.fresh_timeout {
        config.grabber.fresh_frame_timeout_secs = timeout;
    }
    if let Some(port) = args.metrics_port {
        config.output.metrics_port = port;
    }

    config.grabber.validate()?;
    Ok(config)
}

fn run(config: &FileConfig, running: &AtomicBool) -> Result<(), Box<dyn Error>> {
    let exporter = Exporter::start(config.output.metrics_port)?;
    let mut grabber = SimpleGrabber::new(MockDevice::new(config.mock.clone()))?;

    grabber.open(config.grabber.device_id)?;
    grabber.configure(&config.grabber)?;
    grabber.start_capture(config.grabber.trigger)?;

    match grabber.fresh_frame(false) {
        Ok(frame) => info!(
            index = frame.index(),
            width = frame.width(),
            height = frame.height(),
            "First fresh frame"
        ),
        Err(e) => warn!("No fresh frame: {}", e),
    }

    info!("Processing frames...");

    let period = config.output.update_period();
    let mut observed = 0;
    let mut last_report = Instant::now();

    while running.load(Ordering::SeqCst) && observed < config.output.frame_count {
        let tick = Instant::now();

        grabber.update();
        if grabber.is_frame_new() {
            observed += 1;
        }
        exporter.publish(&MetricsSnapshot::from_grabber(&grabber));

        if last_report.elapsed() >= Duration::from_secs(1) {
            info!(
                frames = observed,
                fps = ?grabber.fps(),
                bytes = grabber.pixels().len(),
                state = %grabber.state(),
                "Capture progress"
            );
            last_report = Instant::now();
        }

        if let Some(rest) = period.checked_sub(tick.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    grabber.stop_capture()?;
    grabber.close()?;

    let stats = grabber.stats();
    info!(
        "Observed {} frames: {} published, {} overwritten, {} command failures",
        observed,
        stats.frames_published,
        grabber.frames_overwritten(),
        stats.command_failures
    );

    exporter.publish(&MetricsSnapshot::from_grabber(&grabber));
    exporter.finish();
    Ok(())
}

/// Where metric snapshots go: a local registry or the HTTP exporter.
enum Exporter {
    Local(MetricsRegistry),
    #[cfg(feature = "metrics")]
    Http {
        state: Arc<tokio::sync::RwLock<frame_grabber::metrics::MetricsState>>,
        shutdown: tokio::sync::oneshot::Sender<()>,
        thread: std::thread::JoinHandle<()>,
    },
}

impl Exporter {
    fn start(port: u16) -> Result<Self, Box<dyn Error>> {
        let registry = MetricsRegistry::new()?;

        #[cfg(feature = "metrics")]
        {
            if port != 0 {
                return Self::serve(port, registry);
            }
        }
        #[cfg(not(feature = "metrics"))]
        {
            if port != 0 {
                debug!(port, "Built without the metrics feature, keeping metrics local");
            }
        }

        Ok(Exporter::Local(registry))
    }

    #[cfg(feature = "metrics")]
    fn serve(port: u16, registry: MetricsRegistry) -> Result<Self, Box<dyn Error>> {
        use frame_grabber::metrics::{MetricsServer, MetricsServerConfig};

        let server = MetricsServer::new(MetricsServerConfig::with_port(port), registry);
        let state = server.state();
        let (shutdown, signal) = tokio::sync::oneshot::channel::<()>();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;

        let thread = std::thread::Builder::new()
            .name("metrics-server".into())
            .spawn(move || {
                let stop = async move {
                    let _ = signal.await;
                };
                if let Err(e) = runtime.block_on(server.run_until(stop)) {
                    error!("Metrics server failed: {}", e);
                }
            })?;

        Ok(Exporter::Http {
            state,
            shutdown,
            thread,
        })
    }

    fn publish(&self, snapshot: &MetricsSnapshot) {
        match self {
            Exporter::Local(registry) => registry.update(snapshot),
            #[cfg(feature = "metrics")]
            Exporter::Http { state, .. } => state.blocking_write().update(snapshot),
        }
    }

    fn finish(self) {
        match self {
            Exporter::Local(registry) => match registry.encode() {
                Ok(text) => debug!("Final metrics:\n{}", text),
                Err(e) => warn!("Failed to encode metrics: {}", e),
            },
            #[cfg(feature = "metrics")]
            Exporter::Http {
                shutdown, thread, ..
            } => {
                let _ = shutdown.send(());
                if thread.join().is_err() {
                    warn!("Metrics server thread panicked");
                }
            }
        }
    }
}
