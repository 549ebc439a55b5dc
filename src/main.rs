use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use nalgebra as na;
use tracing_subscriber::EnvFilter;

use courtmap::config::Config;
use courtmap::detections_log::DetectionsLog;
use courtmap::homography::{save_calibration, ViewTransformer};
use courtmap::pipeline::Pipeline;
use courtmap::source::VideoSource;
use courtmap::team::ClassifierState;
use courtmap::video::{OpenCvSink, OpenCvSource};

#[derive(Parser, Debug)]
#[command(
    name = "courtmap",
    about = "Team colors, ball trace and a top-down court minimap for a fixed-camera volleyball video",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    #[command(flatten)]
    run: RunArgs,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// JSON config file; flags below override it.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, value_name = "PATH")]
    source: Option<PathBuf>,
    #[arg(long, value_name = "PATH")]
    target: Option<PathBuf>,
    /// Detector and tracker output, one JSON line per frame.
    #[arg(long, value_name = "PATH")]
    detections: Option<PathBuf>,
    #[arg(long, value_name = "PATH")]
    court_config: Option<PathBuf>,
    #[arg(long)]
    calibration_frames: Option<usize>,
    /// Fixed k-means seed for reproducible team colors.
    #[arg(long)]
    seed: Option<u64>,
}

impl RunArgs {
    fn apply(self, config: &mut Config) {
        if let Some(v) = self.source {
            config.video_source = v;
        }
        if let Some(v) = self.target {
            config.video_target = v;
        }
        if let Some(v) = self.detections {
            config.detections = v;
        }
        if let Some(v) = self.court_config {
            config.court_config = v;
        }
        if let Some(v) = self.calibration_frames {
            config.calibration_frames = v;
        }
        if self.seed.is_some() {
            config.kmeans.seed = self.seed;
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a court calibration file from four pixel corners (TL, TR, BR, BL).
    Calibrate {
        #[arg(long = "point", value_name = "X,Y", required = true, value_parser = parse_point)]
        points: Vec<na::Point2<f32>>,
        #[arg(long, default_value = "court_config.json")]
        output: PathBuf,
        #[arg(long, default_value_t = 9.0)]
        court_width: f32,
        #[arg(long, default_value_t = 18.0)]
        court_length: f32,
    },
}

fn parse_point(s: &str) -> Result<na::Point2<f32>, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got {:?}", s))?;

    let x = x.trim().parse::<f32>().map_err(|e| format!("bad x {:?}: {}", x, e))?;
    let y = y.trim().parse::<f32>().map_err(|e| format!("bad y {:?}: {}", y, e))?;

    Ok(na::Point2::new(x, y))
}

fn calibrate(points: &[na::Point2<f32>], output: &Path, court_width: f32, court_length: f32) -> Result<()> {
    if points.len() != 4 {
        bail!("expected exactly 4 corners (TL, TR, BR, BL), got {}", points.len());
    }

    save_calibration(output, points, court_width, court_length)
        .with_context(|| format!("Failed to write calibration {}", output.display()))?;

    tracing::info!("saved court coordinates to {}", output.display());

    Ok(())
}

fn run(args: RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let mut source = OpenCvSource::open(&config.video_source)
        .with_context(|| format!("Failed to open video {}", config.video_source.display()))?;

    let detector = DetectionsLog::open(&config.detections, config.classes)
        .with_context(|| format!("Failed to read detections {}", config.detections.display()))?;

    let view = ViewTransformer::from_file(&config.court_config, config.court_width, config.court_length);
    let mut sink = OpenCvSink::new(&config.video_target, source.info().fps);
    let target = config.video_target.clone();

    let mut pipeline = Pipeline::new(config, detector, view);
    let report = pipeline
        .run(&mut source, &mut sink)
        .context("Processing failed")?;

    tracing::info!(
        "wrote {} of {} frames to {} ({} identities assigned, ball in {} frames)",
        report.frames_rendered,
        report.frames_ingested,
        target.display(),
        report.assignments.len(),
        report.ball_track.known()
    );

    if report.fallback_calibration {
        tracing::warn!("court coordinates came from the placeholder calibration");
    }
    if report.classifier_state != ClassifierState::Trained {
        tracing::warn!("team classifier ended {:?}, all players were drawn neutral", report.classifier_state);
    }

    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Command::Calibrate {
            points,
            output,
            court_width,
            court_length,
        }) => calibrate(&points, &output, court_width, court_length),
        None => run(cli.run),
    }
}
