use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use cutline::{
    CpuCompositor, CutlineError, CutlineResult, DirAssetStore, EditCommand, EditReceipt,
    EngineConfig, ExportOptions, ExportOutput, ExportPipeline, FfmpegEncoder, Fps,
    InMemoryProjectStore, Outcome, Progress, Sampled, SceneId, Timeline, TrackEditor,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cutline", version)]
struct Cli {
    /// Engine configuration JSON (defaults apply when omitted).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a scene's timeline, or the sampled state of its blocks at one instant.
    Inspect(InspectArgs),
    /// Apply a JSON edit script to a project file.
    Edit(EditArgs),
    /// Render a scene to MP4 (requires `ffmpeg`).
    Export(ExportArgs),
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Project snapshot JSON.
    #[arg(long)]
    project: PathBuf,

    /// Scene id (first scene when omitted).
    #[arg(long)]
    scene: Option<u64>,

    /// Sample active blocks at this time instead of listing the timeline.
    #[arg(long)]
    time: Option<f64>,
}

#[derive(Parser, Debug)]
struct EditArgs {
    /// Project snapshot JSON.
    #[arg(long)]
    project: PathBuf,

    /// Scene id (first scene when omitted).
    #[arg(long)]
    scene: Option<u64>,

    /// JSON array of edit commands.
    #[arg(long)]
    script: PathBuf,

    /// Where to write the edited project (defaults to `--project`).
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Project snapshot JSON.
    #[arg(long)]
    project: PathBuf,

    /// Scene id (first scene when omitted).
    #[arg(long)]
    scene: Option<u64>,

    /// Asset manifest JSON.
    #[arg(long)]
    assets: PathBuf,

    /// Destination directory.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Output width.
    #[arg(long)]
    width: Option<u32>,

    /// Output height.
    #[arg(long)]
    height: Option<u32>,

    /// Integer frame rate.
    #[arg(long)]
    fps: Option<u32>,

    /// Output file stem.
    #[arg(long)]
    stem: Option<String>,
}

#[derive(serde::Serialize)]
struct SampledBlock {
    block: cutline::BlockId,
    layer: cutline::LayerId,
    #[serde(flatten)]
    state: Sampled,
}

#[derive(serde::Serialize)]
struct SampledFrame {
    time: f64,
    blocks: Vec<SampledBlock>,
}

#[derive(serde::Serialize)]
struct EditReport {
    receipts: Vec<EditReceipt>,
    saved_to: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => return print_outcome(Outcome::<()>::from(Err(e))),
    };
    match cli.cmd {
        Command::Inspect(args) => print_outcome(Outcome::from(cmd_inspect(args))),
        Command::Edit(args) => print_outcome(Outcome::from(cmd_edit(args))),
        Command::Export(args) => print_outcome(Outcome::from(cmd_export(args, &config))),
    }
}

fn print_outcome<T: serde::Serialize>(outcome: Outcome<T>) -> ExitCode {
    let code = if outcome.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    };
    match serde_json::to_string_pretty(&outcome) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("failed to serialize result: {e}"),
    }
    code
}

fn load_config(path: Option<&Path>) -> CutlineResult<EngineConfig> {
    match path {
        Some(p) => EngineConfig::from_json_file(p),
        None => Ok(EngineConfig::default()),
    }
}

fn pick_scene(store: &InMemoryProjectStore, scene: Option<u64>) -> CutlineResult<SceneId> {
    match scene {
        Some(id) => Ok(SceneId(id)),
        None => store
            .scene_ids()
            .first()
            .copied()
            .ok_or_else(|| CutlineError::not_found("project has no scenes")),
    }
}

fn cmd_inspect(args: InspectArgs) -> CutlineResult<serde_json::Value> {
    let store = InMemoryProjectStore::load_json(&args.project)?;
    let scene = pick_scene(&store, args.scene)?;
    let timeline = Timeline::load(&store, scene)?;

    let Some(time) = args.time else {
        return Ok(serde_json::to_value(&timeline)?);
    };
    let blocks = timeline
        .layers
        .iter()
        .flat_map(|track| track.blocks.iter())
        .filter(|b| b.block.is_active_at(time))
        .map(|b| SampledBlock {
            block: b.block.id,
            layer: b.block.layer,
            state: cutline::sample_block(b, time),
        })
        .collect();
    Ok(serde_json::to_value(SampledFrame { time, blocks })?)
}

fn cmd_edit(args: EditArgs) -> CutlineResult<EditReport> {
    let mut store = InMemoryProjectStore::load_json(&args.project)?;
    let scene = pick_scene(&store, args.scene)?;

    let f = File::open(&args.script)
        .with_context(|| format!("open edit script '{}'", args.script.display()))?;
    let script: Vec<EditCommand> = serde_json::from_reader(BufReader::new(f))?;

    let mut editor = TrackEditor::new(&mut store, scene)?;
    let mut receipts = Vec::with_capacity(script.len());
    for (i, cmd) in script.into_iter().enumerate() {
        let receipt = editor.apply(cmd).inspect_err(|e| {
            tracing::warn!(index = i, error = %e, "edit script stopped; project not saved");
        })?;
        receipts.push(receipt);
    }

    let saved_to = args.out.unwrap_or(args.project);
    store.save_json(&saved_to)?;
    eprintln!("wrote {}", saved_to.display());
    Ok(EditReport { receipts, saved_to })
}

fn cmd_export(args: ExportArgs, config: &EngineConfig) -> CutlineResult<ExportOutput> {
    let store = InMemoryProjectStore::load_json(&args.project)?;
    let scene = pick_scene(&store, args.scene)?;
    let assets = DirAssetStore::from_manifest_file(&args.assets)?;

    let mut opts = ExportOptions::from_defaults(&config.export)?;
    opts.output_dir = args.out_dir;
    if let Some(w) = args.width {
        opts.width = w;
    }
    if let Some(h) = args.height {
        opts.height = h;
    }
    if let Some(fps) = args.fps {
        opts.fps = Fps::whole(fps)?;
    }
    if let Some(stem) = args.stem {
        opts.file_stem = stem;
    }

    let mut compositor = CpuCompositor;
    let mut encoder = FfmpegEncoder::new(config.encoder.clone());
    let mut pipeline = ExportPipeline::new(&store, &assets, &mut compositor, &mut encoder);
    pipeline.export_scene(scene, &opts, &mut |p: &Progress| {
        if let Ok(line) = serde_json::to_string(p) {
            eprintln!("{line}");
        }
    })
}
