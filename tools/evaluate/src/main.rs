//! Evaluation CLI Tool
//!
//! Loads the best checkpoint, rebuilds the held-out split from the run
//! manifest and writes the classification report and plots.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use finsent_core::cli::setup_cli_logging;
use finsent_core::{default_device, DefaultBackend, RunManifest};
use finsent_dataset::{NewsDataset, StratifiedSplit};
use finsent_training::{CheckpointManager, Evaluator};

/// Financial news sentiment evaluation tool
#[derive(Parser, Debug)]
#[command(
    name = "finsent-evaluate",
    about = "Evaluate a fine-tuned checkpoint on the held-out split"
)]
struct Args {
    /// Run manifest written by finsent-encode
    #[arg(short, long, value_name = "FILE", default_value = "data/manifest.json")]
    manifest: PathBuf,

    /// Checkpoint directory (defaults to the one recorded by training)
    #[arg(short, long, value_name = "DIR")]
    checkpoint_dir: Option<PathBuf>,

    /// Output directory for metrics and plots
    #[arg(short, long, value_name = "DIR", default_value = "evaluation")]
    output: PathBuf,

    /// Batch size
    #[arg(short, long, default_value = "32")]
    batch_size: usize,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_cli_logging(args.verbose)?;

    info!("Financial News Sentiment - Evaluation Tool");
    info!("==========================================");

    let manifest = RunManifest::load(&args.manifest)
        .with_context(|| format!("Failed to load manifest: {}", args.manifest.display()))?;
    let checkpoint_dir = resolve_checkpoint_dir(&args, &manifest);
    info!("Checkpoint: {}", checkpoint_dir.display());

    let device = default_device();
    let manager = CheckpointManager::new(&checkpoint_dir);
    let (model, metadata) = manager
        .load_model::<DefaultBackend>(&device)
        .with_context(|| format!("Failed to load checkpoint: {}", checkpoint_dir.display()))?;
    if metadata.labels != manifest.labels {
        warn!(
            "Checkpoint labels {} differ from manifest labels {}; using the checkpoint's",
            metadata.labels, manifest.labels
        );
    }
    let encoder = manager.load_encoder(metadata.max_seq_len, true)?;

    info!("Rebuilding held-out split...");
    let split = StratifiedSplit::from_manifest(&manifest)?;
    info!("Split: {}", split);
    let validation = NewsDataset::from_examples(&split.validation, &encoder)?;

    let evaluator = Evaluator::new(model, metadata.labels.clone(), device, args.batch_size);
    let report = evaluator.evaluate(&validation)?;

    info!("");
    info!("Classification Report:");
    for line in report.report.to_text().lines() {
        info!("{}", line);
    }
    info!("Confusion matrix:");
    for row in &report.report.confusion_matrix {
        info!("  {:?}", row);
    }

    report
        .save(&args.output)
        .with_context(|| format!("Failed to write results to {}", args.output.display()))?;
    info!("Evaluation completed successfully!");

    Ok(())
}

fn resolve_checkpoint_dir(args: &Args, manifest: &RunManifest) -> PathBuf {
    args.checkpoint_dir
        .clone()
        .or_else(|| manifest.checkpoint_dir.clone())
        .unwrap_or_else(|| PathBuf::from("model"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsent_core::{LabelMap, SplitConfig};

    fn manifest(checkpoint_dir: Option<&str>) -> RunManifest {
        let mut manifest = RunManifest::new(
            "data/data_raw.csv",
            "data/data_encoded.csv",
            LabelMap::default(),
            SplitConfig::default(),
            10,
        );
        manifest.checkpoint_dir = checkpoint_dir.map(PathBuf::from);
        manifest
    }

    #[test]
    fn test_checkpoint_dir_precedence() {
        let explicit = Args::parse_from(["finsent-evaluate", "--checkpoint-dir", "a"]);
        assert_eq!(
            resolve_checkpoint_dir(&explicit, &manifest(Some("b"))),
            PathBuf::from("a")
        );

        let default = Args::parse_from(["finsent-evaluate"]);
        assert_eq!(
            resolve_checkpoint_dir(&default, &manifest(Some("b"))),
            PathBuf::from("b")
        );
        assert_eq!(
            resolve_checkpoint_dir(&default, &manifest(None)),
            PathBuf::from("model")
        );
        assert_eq!(default.batch_size, 32);
    }
}
