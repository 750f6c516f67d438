//! Training CLI Tool
//!
//! Fine-tunes a pretrained BERT encoder on the encoded news table described
//! by a run manifest, keeping the checkpoint with the best validation
//! accuracy.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use finsent_core::cli::{load_toml_config, setup_cli_logging};
use finsent_core::{backend_name, default_device, RunManifest, TrainingBackend, TrainingConfig};
use finsent_dataset::{NewsDataset, StratifiedSplit, TextEncoder};
use finsent_training::{
    CheckpointManager, CheckpointMetadata, ClassifierConfig, PretrainedFiles, Trainer,
    TrainerConfig,
};

/// Financial news sentiment training tool
#[derive(Parser, Debug)]
#[command(
    name = "finsent-train",
    about = "Fine-tune a pretrained encoder for news sentiment",
    long_about = "Fine-tune a pretrained BERT encoder for three-class financial news sentiment \
                  with linear warmup and save-on-improve checkpointing."
)]
struct Args {
    /// Run manifest written by finsent-encode
    #[arg(short, long, value_name = "FILE", default_value = "data/manifest.json")]
    manifest: PathBuf,

    /// Training configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override number of epochs
    #[arg(short, long, value_name = "N")]
    epochs: Option<usize>,

    /// Override batch size
    #[arg(short, long, value_name = "SIZE")]
    batch_size: Option<usize>,

    /// Override learning rate
    #[arg(short, long, value_name = "LR")]
    lr: Option<f64>,

    /// Override checkpoint directory
    #[arg(long, value_name = "DIR")]
    checkpoint_dir: Option<PathBuf>,

    /// Override pretrained source (hub id or local directory)
    #[arg(long, value_name = "SOURCE")]
    pretrained: Option<String>,

    /// Dry run (validate config without training)
    #[arg(long)]
    dry_run: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_cli_logging(args.verbose)?;

    info!("Financial News Sentiment - Training Tool");
    info!("========================================");

    let mut config = match &args.config {
        Some(path) => load_toml_config::<TrainingConfig>(path)
            .context("Failed to load configuration file")?,
        None => TrainingConfig::default(),
    };
    apply_overrides(&mut config, &args);
    config.validate()?;

    let mut manifest = RunManifest::load(&args.manifest)
        .with_context(|| format!("Failed to load manifest: {}", args.manifest.display()))?;

    print_config_summary(&config, &manifest);

    if args.dry_run {
        if !manifest.encoded_path.is_file() {
            anyhow::bail!(
                "Encoded data does not exist: {}",
                manifest.encoded_path.display()
            );
        }
        info!("Configuration validated successfully (dry run)");
        return Ok(());
    }

    let saved = run_training(&config, &manifest)?;

    if saved {
        manifest.checkpoint_dir = Some(config.output.checkpoint_dir.clone());
        manifest.save(&args.manifest)?;
        info!("Training completed successfully!");
    } else {
        warn!("Training finished without a checkpoint");
    }

    Ok(())
}

fn apply_overrides(config: &mut TrainingConfig, args: &Args) {
    if let Some(epochs) = args.epochs {
        config.training.epochs = epochs;
    }
    if let Some(batch_size) = args.batch_size {
        config.training.batch_size = batch_size;
    }
    if let Some(lr) = args.lr {
        config.training.learning_rate = lr;
    }
    if let Some(ref dir) = args.checkpoint_dir {
        config.output.checkpoint_dir = dir.clone();
    }
    if let Some(ref pretrained) = args.pretrained {
        config.model.pretrained = pretrained.clone();
    }
}

fn print_config_summary(config: &TrainingConfig, manifest: &RunManifest) {
    info!("");
    info!("Configuration Summary:");
    info!("  Pretrained: {}", config.model.pretrained);
    info!("  Max seq len: {}", config.model.max_seq_len);
    info!("  Epochs: {}", config.training.epochs);
    info!("  Batch size: {}", config.training.batch_size);
    info!("  Learning rate: {}", config.training.learning_rate);
    info!("  Weight decay: {}", config.training.weight_decay);
    info!("  Warmup fraction: {}", config.training.warmup_fraction);
    info!("  Grad clip: {:?}", config.training.grad_clip);
    info!("  Backend: {}", backend_name());
    info!("  Encoded data: {}", manifest.encoded_path.display());
    info!("  Labels: {}", manifest.labels);
    info!("  Split seed: {}", manifest.split.seed);
    info!("  Checkpoint dir: {}", config.output.checkpoint_dir.display());
    info!("");
}

/// Returns whether a checkpoint was written.
fn run_training(config: &TrainingConfig, manifest: &RunManifest) -> Result<bool> {
    info!("Loading dataset...");
    let split = StratifiedSplit::from_manifest(manifest)?;
    info!("Split: {}", split);

    let files = PretrainedFiles::resolve(&config.model.pretrained)?;
    let bert_config = files.load_config()?;
    let encoder = TextEncoder::fixed_length(files.load_tokenizer()?, config.model.max_seq_len)?;

    info!("Tokenizing...");
    let train = NewsDataset::from_examples(&split.train, &encoder)?;
    let validation = NewsDataset::from_examples(&split.validation, &encoder)?;
    info!(
        "Train class distribution: {:?}",
        train.class_distribution(manifest.labels.len())
    );

    let device = default_device();
    let bert = files.load_encoder::<TrainingBackend>(&bert_config, &device)?;
    let model = ClassifierConfig::new(bert_config.clone(), manifest.labels.len())
        .with_encoder(bert, &device);

    let metadata = CheckpointMetadata::new(
        0,
        0.0,
        0.0,
        0.0,
        bert_config,
        manifest.labels.clone(),
        config.model.max_seq_len,
        config.model.pretrained.clone(),
        manifest.split.seed,
    );

    let trainer = Trainer::new(
        TrainerConfig::from_params(&config.training, manifest.split.seed, config.output.export_csv),
        CheckpointManager::new(&config.output.checkpoint_dir),
    );
    let state = trainer.fit(model, &train, &validation, &encoder, &metadata, &device)?;

    info!("");
    info!("Training Summary:");
    info!("  Best validation accuracy: {:.4}", state.best_val_accuracy);
    if let Some(best) = state.best_epoch {
        info!("  Best epoch: {}", best);
    }
    info!("  Checkpoint dir: {}", config.output.checkpoint_dir.display());

    Ok(state.best_epoch.is_some())
}
