use anyhow::{Context, Result, anyhow, bail};
use camino::Utf8PathBuf;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use rustyblocks::config::LayoutConfig;
use rustyblocks::dragger::Dragger;
use rustyblocks::loader::{FsSource, WorkspaceLoader};
use rustyblocks::model::WorkspaceDoc;
use rustyblocks::units::WorkspacePoint;

#[derive(Parser, Debug)]
#[command(author, version, about = "Replay block drags on a workspace description and print the result as JSON", long_about = None)]
struct Cli {
    /// Workspace description (JSON)
    #[arg(value_name = "WORKSPACE_FILE")]
    workspace_file: Utf8PathBuf,

    /// Layout config (JSON); defaults to 25 units for snap and bump distance
    #[arg(long, value_name = "FILE")]
    config: Option<Utf8PathBuf>,

    /// Block to drag, by description name; pair each with a --to
    #[arg(long, value_name = "NAME")]
    drag: Vec<String>,

    /// Where to drop the matching --drag block's top-left corner
    #[arg(long, value_name = "X,Y", value_parser = parse_point)]
    to: Vec<WorkspacePoint>,

    /// Also write a binary snapshot of the final workspace
    #[arg(long, value_name = "FILE")]
    save_binary: Option<Utf8PathBuf>,
}

fn parse_point(s: &str) -> Result<WorkspacePoint> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| anyhow!("expected X,Y, got {:?}", s))?;
    Ok(WorkspacePoint::new(
        x.trim().parse().with_context(|| format!("Bad x in {:?}", s))?,
        y.trim().parse().with_context(|| format!("Bad y in {:?}", s))?,
    ))
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if cli.drag.len() != cli.to.len() {
        bail!("Every --drag needs a matching --to ({} vs {})", cli.drag.len(), cli.to.len());
    }
    let config = match &cli.config {
        Some(path) => LayoutConfig::load(path)?,
        None => LayoutConfig::default(),
    };

    let mut loader = WorkspaceLoader::new(FsSource);
    let mut loaded = loader
        .load(&cli.workspace_file, config)
        .with_context(|| format!("Failed to load {}", cli.workspace_file))?;
    let mut dragger = Dragger::new(loaded.coordinator.config());

    for (name, target) in cli.drag.iter().zip(&cli.to) {
        let block = loaded
            .block(name)
            .ok_or_else(|| anyhow!("No block named {:?}", name))?;
        let coordinator = &mut loaded.coordinator;
        let touch = coordinator
            .block_group_position(block)
            .ok_or_else(|| anyhow!("Block {:?} disappeared", name))?;
        if !dragger.start_dragging_block(coordinator, block, touch)? {
            tracing::warn!("block {:?} cannot be dragged, skipping", name);
            continue;
        }
        let current = coordinator
            .workspace()
            .block(block)
            .map(|b| b.position)
            .unwrap_or(touch);
        dragger.continue_dragging_block(coordinator, block, touch + (*target - current))?;
        dragger
            .finish_dragging_block(coordinator, block)
            .with_context(|| format!("Dropping {:?}", name))?;
    }

    let doc = WorkspaceDoc {
        workspace: loaded.coordinator.workspace().clone(),
    };
    if let Some(path) = &cli.save_binary {
        doc.save_to_binary(path)
            .with_context(|| format!("Failed to write {}", path))?;
    }
    let json = serde_json::to_string_pretty(&doc.workspace)?;
    println!("{}", json);
    Ok(())
}
