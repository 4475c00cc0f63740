//! marker-pose CLI: replay recorded sessions and inspect configuration.

use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use marker_pose::aruco::DictionaryId;
use marker_pose::replay::{replay, write_outputs, Recording};
use marker_pose::{MarkerPoseNode, NodeParams};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[cfg(feature = "tracing")]
use tracing_log::LogTracer;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "marker-pose")]
#[command(about = "Estimate fiducial marker poses in a global frame from recorded camera streams")]
#[command(version)]
struct Cli {
    /// Log debug output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[cfg(feature = "tracing")]
    #[arg(long, global = true)]
    json_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a recording through the pose pipeline.
    Replay(ReplayArgs),

    /// Print the default node parameters as JSON.
    DefaultParams,

    /// List the supported dictionary names.
    Dictionaries,
}

#[derive(Debug, Clone, Args)]
struct ReplayArgs {
    /// Node parameters (JSON). Defaults are used when omitted.
    #[arg(long)]
    params: Option<PathBuf>,

    /// Recording file (JSON).
    #[arg(long)]
    recording: PathBuf,

    /// Directory for marker arrays, transforms and annotated images.
    #[arg(long)]
    out_dir: PathBuf,
}

fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    #[cfg(feature = "tracing")]
    {
        let _ = LogTracer::init_with_filter(level);
        marker_pose::core::init_tracing(cli.json_log);
    }
    #[cfg(not(feature = "tracing"))]
    {
        let _ = marker_pose::core::init_with_level(level);
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> CliResult<()> {
    match command {
        Commands::Replay(args) => run_replay(&args),
        Commands::DefaultParams => {
            println!("{}", serde_json::to_string_pretty(&NodeParams::default())?);
            Ok(())
        }
        Commands::Dictionaries => {
            for id in DictionaryId::ALL {
                let info = id.info();
                println!(
                    "{:<22} {:?} {}x{} bits, {} markers",
                    id.name(),
                    info.family,
                    info.marker_size,
                    info.marker_size,
                    info.size
                );
            }
            Ok(())
        }
    }
}

fn run_replay(args: &ReplayArgs) -> CliResult<()> {
    let params = match &args.params {
        Some(path) => NodeParams::load_json(path)?,
        None => NodeParams::default(),
    };
    let node = MarkerPoseNode::new(params)?;

    let recording = Recording::load_json(&args.recording)?;
    let base_dir = args.recording.parent().unwrap_or(Path::new("."));
    let out = replay(&node, &recording, base_dir)?;

    for frame in &out.frames {
        match (&frame.published, &frame.error) {
            (Some(n), _) => println!("frame {}: {} markers", frame.index, n),
            (None, Some(err)) => println!("frame {}: {}", frame.index, err),
            (None, None) => println!("frame {}: no output", frame.index),
        }
    }

    let images = write_outputs(&args.out_dir, &out)?;
    println!(
        "wrote {} marker arrays, {} transforms and {} images to {}",
        out.sink.marker_arrays.len(),
        out.sink.transforms.len(),
        images.len(),
        args.out_dir.display()
    );
    Ok(())
}
