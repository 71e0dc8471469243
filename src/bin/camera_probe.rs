use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use facecam::{
    camera::{backend_for, open_first_available},
    config::{CameraBackendKind, FacecamConfig},
    imaging::encode_jpeg,
};
use serde::Serialize;
use tracing::{info, warn};

/// Open the camera, read a few frames and save a snapshot.
#[derive(Parser, Debug)]
#[command(name = "camera_probe")]
#[command(about = "Check that a camera can be opened and read, and save one snapshot")]
struct Args {
    /// Path to facecam configuration file (for camera settings)
    #[arg(short = 'c', long, default_value = "facecam.toml")]
    config: PathBuf,

    /// Override the primary device index
    #[arg(short, long)]
    index: Option<u32>,

    /// Override the fallback device index
    #[arg(long)]
    fallback: Option<u32>,

    /// Use the synthetic camera instead of the configured backend
    #[arg(long)]
    synthetic: bool,

    /// Number of frames to read
    #[arg(short = 'n', long, default_value_t = 10)]
    frames: u32,

    /// Where to write the last frame as JPEG
    #[arg(short, long, default_value = "probe.jpg")]
    output: PathBuf,
}

#[derive(Debug, Serialize)]
struct ProbeReport {
    backend: &'static str,
    device_index: u32,
    frames_read: u32,
    read_failures: u32,
    width: u32,
    height: u32,
    average_read_ms: f64,
    snapshot: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let mut config = FacecamConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?
        .camera;
    if let Some(index) = args.index {
        config.index = index;
    }
    if let Some(fallback) = args.fallback {
        config.fallback_index = Some(fallback);
    }
    if args.synthetic {
        config.backend = CameraBackendKind::Synthetic;
    }

    let backend = backend_for(config.backend)?;
    info!(
        "Probing {} camera (device {}, fallback {:?})",
        backend.name(),
        config.index,
        config.fallback_index
    );

    let (device, failures) = open_first_available(backend.as_ref(), &config);
    let Some(mut device) = device else {
        for failure in &failures {
            warn!("{}", failure);
        }
        return Err(anyhow!(
            "No camera could be opened (tried {:?})",
            config.candidate_indices()
        ));
    };

    let mut last_frame = None;
    let mut frames_read = 0;
    let mut read_failures = 0;
    let mut read_time = Duration::ZERO;

    for attempt in 0..args.frames {
        let started = Instant::now();
        match device.read_frame() {
            Ok(frame) => {
                read_time += started.elapsed();
                frames_read += 1;
                last_frame = Some(frame);
            }
            Err(e) => {
                warn!("Read {} failed: {}", attempt + 1, e);
                read_failures += 1;
            }
        }
    }

    let frame = last_frame.ok_or_else(|| anyhow!("Camera opened but no frame could be read"))?;
    let image = frame
        .to_rgb_image()
        .ok_or_else(|| anyhow!("Frame {} is incomplete", frame.id))?;
    let jpeg = encode_jpeg(&image, 90)?;
    std::fs::write(&args.output, jpeg)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    let report = ProbeReport {
        backend: backend.name(),
        device_index: device.index(),
        frames_read,
        read_failures,
        width: frame.width,
        height: frame.height,
        average_read_ms: read_time.as_secs_f64() * 1000.0 / frames_read.max(1) as f64,
        snapshot: args.output.display().to_string(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
