//! Tethercam CLI
//!
//! Command-line interface for exercising the acquisition stack against
//! the mock camera backend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tethercam::config::FileConfig;
use tethercam::device::{MockControl, MockDecoder, MockTransport};
use tethercam::driver::{ImagingCamera, TetherDriver, TickEvent};
use tracing::{info, warn};

// Mock sensor readout used by the demo.
const DEMO_WIDTH: u32 = 320;
const DEMO_HEIGHT: u32 = 240;

#[derive(Parser)]
#[command(name = "tethercam", about = "Tethered camera acquisition demo (mock backend)")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Exposure duration in seconds.
    #[arg(long, default_value_t = 2.0)]
    exposure: f64,

    /// Sensitivity (ISO) to request; overrides the config value.
    #[arg(long)]
    iso: Option<f64>,

    /// Number of exposure cycles to run.
    #[arg(long, default_value_t = 1)]
    frames: u32,

    /// List the parsed setting catalogs and exit.
    #[arg(long)]
    list_choices: bool,
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

    let config = match &args.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config: {e}");
                std::process::exit(1);
            }
        },
        None => FileConfig::default(),
    };

    info!("Tethercam v{}", tethercam::VERSION);
    info!("This is a demonstration using the mock camera backend");

    let transport = MockTransport::new(DEMO_WIDTH, DEMO_HEIGHT)
        .with_capture_delay(Duration::from_secs_f64(args.exposure.max(0.0)));
    let mut driver = match TetherDriver::connect(
        Box::new(MockControl::new()),
        Box::new(transport),
        MockDecoder::new(DEMO_WIDTH, DEMO_HEIGHT),
    ) {
        Ok(driver) => driver,
        Err(e) => {
            eprintln!("Failed to connect to camera: {e}");
            std::process::exit(1);
        }
    };

    let info = driver.camera_info().clone();
    info!("Connected to {} {}", info.manufacturer, info.model);

    if args.list_choices {
        println!("Shutter speeds:");
        for (value, token) in driver.session().shutter_catalog().iter() {
            println!("  {token:>8}  ({value:.6} s)");
        }
        println!("Sensitivity:");
        for (value, token) in driver.session().sensitivity_catalog().iter() {
            println!("  {token:>8}  ({value:.0})");
        }
        return;
    }

    driver.set_save_on_camera(config.acquisition.save_on_camera);
    if let Err(e) = driver.update_frame(0, 0, DEMO_WIDTH, DEMO_HEIGHT) {
        eprintln!("Failed to set readout frame: {e}");
        std::process::exit(1);
    }

    let sensitivity = args.iso.unwrap_or(config.acquisition.sensitivity);
    match driver.set_sensitivity(sensitivity) {
        Ok(actual) => info!("Sensitivity set to {actual}"),
        Err(e) => warn!("Could not set sensitivity: {e}"),
    }

    // Ctrl-C requests an exposure abort instead of killing the process.
    let abort = Arc::new(AtomicBool::new(false));
    {
        let abort = Arc::clone(&abort);
        if let Err(e) = ctrlc::set_handler(move || abort.store(true, Ordering::SeqCst)) {
            warn!("Could not install Ctrl-C handler: {e}");
        }
    }

    let poll_period = Duration::from_millis(config.acquisition.poll_period_ms);
    let mut completed = 0u32;
    let mut failed = 0u32;

    'frames: for frame_index in 1..=args.frames {
        if abort.load(Ordering::SeqCst) {
            break;
        }
        if let Err(e) = driver.start_exposure(args.exposure) {
            warn!("Frame {frame_index}: could not start exposure: {e}");
            failed += 1;
            continue;
        }

        loop {
            if abort.load(Ordering::SeqCst) {
                driver.abort_exposure();
                warn!("Exposure aborted by operator");
                break 'frames;
            }
            match driver.tick() {
                TickEvent::Idle => {}
                TickEvent::Exposing { remaining_secs } => {
                    info!("Frame {frame_index}: {remaining_secs:.1}s remaining");
                }
                TickEvent::FrameReady => {
                    completed += 1;
                    info!(
                        "Frame {frame_index} ready ({} payload bytes)",
                        driver.frame().payload().len()
                    );
                    break;
                }
                TickEvent::CycleFailed(e) => {
                    failed += 1;
                    warn!("Frame {frame_index} failed: {e}");
                    break;
                }
            }
            std::thread::sleep(poll_period);
        }
    }

    println!("Processed {} frames: {completed} completed, {failed} failed", args.frames);
}
