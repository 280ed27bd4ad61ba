//! camdash - live object-detection dashboard for phone IP webcams.
//!
//! This binary:
//! 1. Loads configuration (file + env + CLI overrides)
//! 2. Connects to the camera and spawns the capture worker
//! 3. Runs the display loop on the main thread with a terminal sink
//! 4. Tears the run down on Ctrl-C or display failure

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use camdash::{
    net, run_display_loop, CameraConfig, DashboardConfig, DisplayOptions, PipelineController,
    PipelineSettings, StubBackend, TerminalSink,
};

#[derive(Parser, Debug)]
#[command(name = "camdash", about = "Live object detection dashboard for phone IP webcams")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream from the camera and run live detection
    Run {
        /// Camera URL (e.g. http://192.168.1.50:4747/video)
        #[arg(long, env = "CAMDASH_CAMERA_URL")]
        url: Option<String>,
        /// Confidence threshold in [0, 1]
        #[arg(long)]
        confidence: Option<f32>,
        /// Suppress per-frame detection summaries
        #[arg(long)]
        no_info: bool,
    },

    /// Open the camera, grab one frame, and report the result
    Test {
        /// Camera URL to probe
        #[arg(long, env = "CAMDASH_CAMERA_URL")]
        url: Option<String>,
    },

    /// Print common camera URL patterns for a phone on this network
    Presets {
        /// Phone IP; defaults to a guess based on the local subnet
        #[arg(long)]
        ip: Option<String>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = DashboardConfig::load()?;

    match args.command {
        Command::Run {
            url,
            confidence,
            no_info,
        } => run(config, url, confidence, no_info),
        Command::Test { url } => {
            let camera = camera_with_url(config.camera, url);
            let message = net::test_connection(camera)?;
            println!("{message}");
            Ok(())
        }
        Command::Presets { ip } => {
            let ip = ip.unwrap_or_else(guess_phone_subnet_ip);
            println!("local machine IP: {}", net::local_ip());
            for (name, url) in net::preset_urls(&ip) {
                println!("{name}: {url}");
            }
            Ok(())
        }
    }
}

fn run(
    config: DashboardConfig,
    url: Option<String>,
    confidence: Option<f32>,
    no_info: bool,
) -> Result<()> {
    let camera = camera_with_url(config.camera, url);
    let confidence = confidence.unwrap_or(config.detection.confidence);
    let show_info = !no_info && config.detection.show_info;

    let controller = Arc::new(PipelineController::new(PipelineSettings::default()));
    {
        let controller = Arc::clone(&controller);
        ctrlc::set_handler(move || {
            log::info!("interrupt received, stopping");
            controller.stop();
        })
        .context("install interrupt handler")?;
    }

    log::info!("starting detection on {} (confidence {confidence})", camera.url);
    log::info!("using the stub detection backend: detections are synthetic, no model is loaded");
    let frames = controller.start(camera, confidence, Box::new(StubBackend::new()))?;

    let mut sink = TerminalSink::stderr();
    let options = DisplayOptions {
        show_info,
        ..DisplayOptions::default()
    };
    let display_result = run_display_loop(&controller, &frames, &mut sink, &options);

    // Display exit (normal, stream end, or render error) tears the run down.
    controller.stop();
    display_result
}

fn camera_with_url(mut camera: CameraConfig, url: Option<String>) -> CameraConfig {
    if let Some(url) = url {
        camera.url = url;
    }
    camera
}

/// Guess a plausible phone address on the local /24 for preset display.
fn guess_phone_subnet_ip() -> String {
    let local = net::local_ip();
    match local.rsplit_once('.') {
        Some((prefix, _)) => format!("{prefix}.100"),
        None => local,
    }
}
