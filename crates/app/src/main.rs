use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use waveform_visualiser_core::{
    AppConfig, MediaTrack, Result, Studio, VisualiserError, VisualizationEngine, WaveformKind,
};

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Render(args) => run_render(args),
        Commands::Schema { waveform } => run_schema(&waveform),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(kind = err.classification(), "{err}");
            ExitCode::FAILURE
        }
    }
}

fn run_render(args: RenderArgs) -> Result<()> {
    let mut config = AppConfig::default();
    config.render.width = args.width;
    config.render.height = args.height;
    config.render.bloom = args.bloom;
    if let Some(fps) = args.fps {
        config.recording.fps = fps;
    }
    if let Some(dir) = args.output_dir {
        config.recording.output_dir = dir;
    }

    let kind: WaveformKind = args.waveform.parse()?;
    let mut studio = Studio::new(config)?;

    let duration = match (args.input, args.tone) {
        (Some(path), _) => studio.load_file(path)?,
        (None, Some(seconds)) => {
            studio.load_track(MediaTrack::tone(args.frequency, seconds, args.sample_rate)?)?
        }
        (None, None) => {
            return Err(VisualiserError::InvalidInput(
                "provide an input WAV file or --tone <seconds>",
            ))
        }
    };
    tracing::info!(duration, waveform = %kind, "starting render");

    studio.set_waveform(kind);
    for assignment in &args.set {
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| {
                VisualiserError::msg(format!("expected name=value, got `{assignment}`"))
            })?;
        let stored = studio.set_config_text(name.trim(), value)?;
        tracing::debug!(name, ?stored, "applied override");
    }

    if args.record {
        let profile = studio.start_recording()?;
        tracing::info!(%profile, "recording");
    } else {
        studio.play();
    }

    let ticks = studio.run(1.0 / args.tick_rate.max(1) as f64)?;
    tracing::info!(ticks, "render finished");

    if let Some((blob, path)) = studio.last_recording() {
        let (bytes, chunks) = (blob.len(), blob.chunk_count());
        println!("{} ({bytes} bytes, {chunks} chunks)", path.display());
    }
    Ok(())
}

fn run_schema(waveform: &str) -> Result<()> {
    let kind: WaveformKind = waveform.parse()?;
    let mut engine = VisualizationEngine::new();
    engine.set_waveform(kind);

    let json = serde_json::to_string_pretty(&engine.schema())
        .map_err(|err| VisualiserError::msg(err.to_string()))?;
    println!("{json}");
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Waveform visualiser", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a track through a waveform headlessly, optionally recording it.
    Render(RenderArgs),
    /// Print the parameter schema of a waveform as JSON.
    Schema {
        /// Waveform name, e.g. `bars` or `particlesphere`.
        #[arg(default_value = "particlemorph")]
        waveform: String,
    },
}

#[derive(clap::Args, Debug)]
struct RenderArgs {
    /// WAV file to play.
    input: Option<PathBuf>,
    /// Play a synthetic sine tone of this many seconds instead of a file.
    #[arg(long, conflicts_with = "input")]
    tone: Option<f32>,
    #[arg(long, default_value_t = 440.0)]
    frequency: f32,
    #[arg(long, default_value_t = 44_100)]
    sample_rate: u32,
    #[arg(short, long, default_value = "particlemorph")]
    waveform: String,
    /// Parameter override as `name=value`; may be repeated.
    #[arg(long = "set", value_name = "NAME=VALUE")]
    set: Vec<String>,
    /// Capture the rendered frames and audio into a recording.
    #[arg(long)]
    record: bool,
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Capture frame rate.
    #[arg(long)]
    fps: Option<u32>,
    /// Ticks per second of the render loop.
    #[arg(long, default_value_t = 60)]
    tick_rate: u32,
    #[arg(long, default_value_t = 640)]
    width: u32,
    #[arg(long, default_value_t = 360)]
    height: u32,
    #[arg(long)]
    bloom: bool,
}
