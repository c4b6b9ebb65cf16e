//! clipwright - edit a timeline snapshot from the command line
//!
//! Subcommands:
//! - `clipwright show` - Print the timeline as loaded
//! - `clipwright lengthen --track 0 --at 4 --length 8`
//! - `clipwright shorten --track 0 --at 4 --length 2`
//! - `clipwright move --track 0 --at 4 --to 16`
//! - `clipwright split --track 0 --at 4 6 7.5`
//!
//! Results go to stdout as JSON; logs go to stderr.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use clipconf::ClipConfig;
use clipwright::{
    Beat, EditError, EditRequest, Editor, EditorConfig, MemoryStore, OperationResult, Outcome,
    SegmentHandle, TimelineSnapshot, TrackId,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "clipwright")]
#[command(about = "Arrangement timeline editor")]
#[command(version)]
struct Cli {
    /// Config file (replaces ./clipwright.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Timeline snapshot (defaults to paths.timeline from config)
    #[arg(long, global = true)]
    timeline: Option<PathBuf>,

    /// Write the edited timeline back to the snapshot
    #[arg(long, global = true)]
    write: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Target {
    /// Track index
    #[arg(long)]
    track: usize,

    /// Start of the segment, in beats
    #[arg(long)]
    at: f64,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the timeline snapshot
    Show,

    /// Grow a segment to a length in beats
    Lengthen {
        #[command(flatten)]
        target: Target,

        #[arg(long)]
        length: f64,
    },

    /// Cut a segment down to a length in beats
    Shorten {
        #[command(flatten)]
        target: Target,

        #[arg(long)]
        length: f64,
    },

    /// Move a segment, optionally changing its length afterwards
    Move {
        #[command(flatten)]
        target: Target,

        /// New start, in beats
        #[arg(long)]
        to: f64,

        /// New length, applied after the move
        #[arg(long)]
        length: Option<f64>,
    },

    /// Split a segment at one or more beats
    Split {
        #[command(flatten)]
        target: Target,

        /// Split points, ascending
        #[arg(required = true, num_args = 1..)]
        points: Vec<f64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = ClipConfig::load_with_sources_from(cli.config.as_deref())
        .context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_new(&config.infra.telemetry.log_level)
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    debug!(
        "config files: {:?}, env overrides: {:?}",
        sources.files, sources.env_overrides
    );

    let path = cli
        .timeline
        .clone()
        .unwrap_or_else(|| config.infra.paths.timeline.clone());
    let snapshot = TimelineSnapshot::load(&path)
        .with_context(|| format!("failed to load timeline {}", path.display()))?;
    if let Some(self_clamping) = config.host.self_clamping {
        debug!("host self_clamping = {} from config", self_clamping);
    }
    let store = snapshot
        .into_store_with(config.host.self_clamping)
        .context("timeline is not valid")?;
    let mut editor = Editor::with_config(store, EditorConfig::from_conf(&config));

    let output = run(&mut editor, cli.command)?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    if cli.write {
        let snapshot = TimelineSnapshot::from_store(editor.store())
            .context("failed to read back the edited timeline")?;
        snapshot
            .save(&path)
            .with_context(|| format!("failed to write timeline {}", path.display()))?;
        info!("wrote {}", path.display());
    }

    Ok(())
}

fn locate(editor: &mut Editor<MemoryStore>, target: &Target) -> Result<SegmentHandle, EditError> {
    editor.locate(TrackId(target.track), Beat(target.at))
}

/// Run one subcommand. Edit failures are reported as results, not errors.
fn run(editor: &mut Editor<MemoryStore>, command: Commands) -> Result<serde_json::Value> {
    let edited = match command {
        Commands::Show => {
            let snapshot = TimelineSnapshot::from_store(editor.store())?;
            return Ok(serde_json::to_value(snapshot)?);
        }
        Commands::Lengthen { target, length } => locate(editor, &target)
            .and_then(|handle| editor.lengthen(&handle, Beat(length))),
        Commands::Shorten { target, length } => locate(editor, &target)
            .and_then(|handle| editor.shorten(&handle, Beat(length))),
        Commands::Move { target, to, length } => locate(editor, &target).and_then(|handle| {
            editor.apply(
                &handle,
                EditRequest {
                    position: Some(Beat(to)),
                    length: length.map(Beat),
                },
            )
        }),
        Commands::Split { target, points } => {
            let points: Vec<Beat> = points.into_iter().map(Beat).collect();
            locate(editor, &target)
                .and_then(|handle| editor.split(&handle, &points))
                .map(|pieces| OperationResult::new(Outcome::Full, pieces))
        }
    };

    let result = edited.unwrap_or_else(|e| OperationResult::failed(&e));
    Ok(serde_json::to_value(result)?)
}
