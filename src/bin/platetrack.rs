use anyhow::Context;
use clap::Parser;
use platetrack::{Config, RawObservation, Session, VehicleUpdate};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Builds a deduplicated vehicle roster with speeds from plate detections.
///
/// Input is JSON Lines, one detection per line. A line carrying only
/// `frame_index` marks a frame without detections.
#[derive(Parser)]
#[command(
    name = "platetrack",
    about = "Plate deduplication and speed estimation for ANPR detection streams",
    version = "0.1.0"
)]
struct Args {
    /// Detections file (JSON Lines)
    #[arg(short, long, required = true)]
    input: PathBuf,

    /// Directory for the results CSV and summary JSON
    #[arg(short, long, default_value = "results")]
    output: PathBuf,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Frames per second of the source video
    #[arg(long)]
    fps: Option<f64>,

    /// Real-world metres per pixel of displacement
    #[arg(long, conflicts_with_all = ["reference_meters", "reference_pixels"])]
    meters_per_pixel: Option<f64>,

    /// Known reference distance in metres, with --reference-pixels
    #[arg(long, requires = "reference_pixels")]
    reference_meters: Option<f64>,

    /// Pixel length of the reference distance
    #[arg(long, requires = "reference_meters")]
    reference_pixels: Option<f64>,

    /// Similarity needed to treat two plates as one vehicle
    #[arg(long)]
    similarity_threshold: Option<f64>,

    /// Log every resolved sighting, not only new vehicles
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {:?}...", path);
            Config::from_file(&path.to_string_lossy())?
        }
        None => Config::default(),
    };

    if let Some(fps) = args.fps {
        config.fps = fps;
    }
    if let Some(mpp) = args.meters_per_pixel {
        config.meters_per_pixel = mpp;
    }
    if let (Some(meters), Some(pixels)) = (args.reference_meters, args.reference_pixels) {
        config.calibrate_with_reference(meters, pixels)?;
    }
    if let Some(threshold) = args.similarity_threshold {
        config.similarity_threshold = threshold;
    }
    config.validate()?;
    Ok(config)
}

fn is_frame_marker(raw: &RawObservation) -> bool {
    raw.frame_index.is_some() && raw.raw_plate_text.is_none() && raw.bounding_box_center.is_none()
}

fn report_update(update: &VehicleUpdate, verbose: bool) {
    if update.is_new {
        info!(
            "NEW VEHICLE #{:2} | {:12} | Frame {:4} | {}",
            update.vehicle_id, update.canonical_plate, update.frame_index, update.speed_status
        );
    } else if verbose {
        info!(
            "Vehicle #{:2} | {:12} | Frame {:4} | ({}, {}) | {}",
            update.vehicle_id,
            update.canonical_plate,
            update.frame_index,
            update.position.x,
            update.position.y,
            update.speed_status
        );
    }
}

fn write_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    let mut file = File::create(path).with_context(|| format!("creating {:?}", path))?;
    file.write_all(contents.as_bytes())?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("platetrack=info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    info!(
        "Similarity threshold {:.2}, {} samples for final speed, {:.4} m/px at {:.1} fps",
        config.similarity_threshold, config.min_speed_samples, config.meters_per_pixel, config.fps
    );

    let reader = BufReader::new(
        File::open(&args.input).with_context(|| format!("opening {:?}", args.input))?,
    );
    let mut session = Session::new(&config);

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let raw: RawObservation = match serde_json::from_str(&line) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Line {}: not a detection record: {}", line_no + 1, e);
                continue;
            }
        };
        if is_frame_marker(&raw) {
            if let Some(frame_index) = raw.frame_index {
                if let Err(e) = session.skip_frame(frame_index) {
                    warn!("Line {}: {}", line_no + 1, e);
                }
            }
            continue;
        }
        if let Some(update) = session.ingest(raw) {
            report_update(&update, args.verbose);
        }
    }

    fs::create_dir_all(&args.output)?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let csv_path = args.output.join(format!("anpr_results_{}.csv", stamp));
    let json_path = args.output.join(format!("anpr_summary_{}.json", stamp));
    let summary = session.summary().with_outputs(&stamp, &csv_path, &json_path);
    write_file(&csv_path, &summary.to_csv())?;
    write_file(&json_path, &serde_json::to_string_pretty(&summary)?)?;

    println!("\nVIDEO PROCESSING COMPLETED");
    println!("{}", summary.to_table());
    println!("Detailed CSV: {:?}", csv_path);
    println!("Summary JSON: {:?}", json_path);
    Ok(())
}
