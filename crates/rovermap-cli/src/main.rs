//! rovermap CLI: offline replay of recorded rover frames through the
//! perception and decision pipeline.

use clap::{Args, Parser, Subcommand};
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use rovermap::rectify::frame_from_dynamic;
use rovermap::{Rover, RoverConfig, RoverState, Telemetry, TickReport};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "rovermap")]
#[command(about = "Replay rover camera frames through the mapping and navigation pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single tick on one frame from a fresh mission state.
    Tick(CliTickArgs),

    /// Replay a telemetry log tick by tick.
    Replay(CliReplayArgs),

    /// Print the perspective calibration.
    CalibInfo(CliConfigArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct CliConfigArgs {
    /// Pipeline configuration (JSON). Defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CliTickArgs {
    /// Camera frame (8-bit RGB PNG at calibration resolution).
    #[arg(long)]
    image: PathBuf,

    /// Telemetry snapshot (JSON).
    #[arg(long)]
    telemetry: PathBuf,

    /// Path to write the tick report (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Optional world-map rendering (PNG).
    #[arg(long)]
    map_out: Option<PathBuf>,

    /// Optional classification overlay (PNG).
    #[arg(long)]
    overlay_out: Option<PathBuf>,

    #[command(flatten)]
    config: CliConfigArgs,
}

#[derive(Debug, Clone, Args)]
struct CliReplayArgs {
    /// Telemetry log: one JSON object per line, with an `image` field naming
    /// the frame file.
    #[arg(long)]
    log: PathBuf,

    /// Directory containing the frames referenced by the log.
    #[arg(long)]
    frames: PathBuf,

    /// Path to write per-tick reports (JSON lines).
    #[arg(long)]
    out: PathBuf,

    /// Optional final world-map rendering (PNG).
    #[arg(long)]
    map_out: Option<PathBuf>,

    #[command(flatten)]
    config: CliConfigArgs,
}

/// One line of a replay log.
#[derive(Debug, serde::Deserialize)]
struct LogRecord {
    image: String,
    #[serde(flatten)]
    telemetry: Telemetry,
}

#[derive(Debug, serde::Serialize)]
struct TickRecord<'a> {
    tick: usize,
    image: &'a str,
    #[serde(flatten)]
    report: TickReport,
}

impl CliConfigArgs {
    fn load(&self) -> CliResult<RoverConfig> {
        match &self.config {
            Some(path) => {
                tracing::info!("Loading config: {}", path.display());
                RoverConfig::from_json_file(path)
            }
            None => Ok(RoverConfig::default()),
        }
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Tick(args) => run_tick(&args),
        Commands::Replay(args) => run_replay(&args),
        Commands::CalibInfo(args) => run_calib_info(&args),
    }
}

fn load_frame(path: &Path) -> CliResult<image::RgbImage> {
    let img = image::open(path).map_err(|e| -> CliError {
        format!("Failed to open image {}: {}", path.display(), e).into()
    })?;
    frame_from_dynamic(img).map_err(|e| -> CliError {
        format!("Unusable frame {}: {}", path.display(), e).into()
    })
}

fn write_map(state: &RoverState, path: &Path) -> CliResult<()> {
    state.worldmap.to_rgb_image().save(path)?;
    tracing::info!(
        "World map written to {} ({} cells explored)",
        path.display(),
        state.worldmap.explored_cells()
    );
    Ok(())
}

// ── calib-info ─────────────────────────────────────────────────────────

fn run_calib_info(args: &CliConfigArgs) -> CliResult<()> {
    let config = args.load()?;
    let rover = Rover::new(config)?;
    let rect = rover.rectifier().config();
    let h = rover.rectifier().homography().to_array();

    println!("rovermap perspective calibration");
    println!("  frame size:     {}x{}", rect.image_size[0], rect.image_size[1]);
    println!("  world scale:    {} px/unit", rect.world_scale());
    println!("  world size:     {} cells", rover.config().world_size);
    println!("  source quad:    {:?}", rect.source_quad);
    println!("  dest quad:      {:?}", rect.destination_quad());
    println!("  homography:");
    for row in h {
        println!("    [{:>12.6} {:>12.6} {:>12.6}]", row[0], row[1], row[2]);
    }

    Ok(())
}

// ── tick ───────────────────────────────────────────────────────────────

fn run_tick(args: &CliTickArgs) -> CliResult<()> {
    let rover = Rover::new(args.config.load()?)?;
    let mut state = rover.new_state();

    tracing::info!("Loading frame: {}", args.image.display());
    let frame = load_frame(&args.image)?;
    let telemetry: Telemetry = serde_json::from_str(&std::fs::read_to_string(&args.telemetry)?)?;

    let report = rover.tick(&mut state, &frame, &telemetry)?;
    tracing::info!(
        "mode={} throttle={:.2} brake={:.2} steer={:.2} nav_px={}",
        report.mode,
        report.control.throttle,
        report.control.brake,
        report.control.steer,
        report.perception.navigable_px,
    );

    std::fs::write(&args.out, serde_json::to_string_pretty(&report)?)?;
    tracing::info!("Report written to {}", args.out.display());

    if let Some(path) = &args.map_out {
        write_map(&state, path)?;
    }
    if let Some(path) = &args.overlay_out {
        state.vision_image.save(path)?;
        tracing::info!("Overlay written to {}", path.display());
    }

    Ok(())
}

// ── replay ─────────────────────────────────────────────────────────────

fn run_replay(args: &CliReplayArgs) -> CliResult<()> {
    let rover = Rover::new(args.config.load()?)?;
    let mut state = rover.new_state();

    let log = std::io::BufReader::new(std::fs::File::open(&args.log)?);
    let mut out = BufWriter::new(std::fs::File::create(&args.out)?);

    let mut ticks = 0usize;
    let mut pickups = 0usize;
    for (lineno, line) in log.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: LogRecord = serde_json::from_str(&line).map_err(|e| -> CliError {
            format!("{}:{}: {}", args.log.display(), lineno + 1, e).into()
        })?;

        let frame = load_frame(&args.frames.join(&record.image))?;
        let report = rover.tick(&mut state, &frame, &record.telemetry)?;
        if state.take_pickup_request() {
            pickups += 1;
        }

        let rec = TickRecord {
            tick: ticks,
            image: &record.image,
            report,
        };
        serde_json::to_writer(&mut out, &rec)?;
        out.write_all(b"\n")?;
        ticks += 1;
    }
    out.flush()?;

    tracing::info!(
        "Replayed {} ticks ({} pickup requests), final mode={}",
        ticks,
        pickups,
        state.mode
    );
    tracing::info!("Reports written to {}", args.out.display());

    if let Some(path) = &args.map_out {
        write_map(&state, path)?;
    }

    Ok(())
}
