//! Data encoding CLI tool
//!
//! Cleans raw `text,label` rows, fits the label mapping and writes the
//! encoded CSV plus the run manifest consumed by training and evaluation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use finsent_core::cli::setup_cli_logging;
use finsent_core::{RunManifest, SplitConfig};
use finsent_dataset::{encode_rows, read_raw_rows, write_encoded_rows};

/// Financial news encoding tool
#[derive(Parser, Debug)]
#[command(
    name = "finsent-encode",
    about = "Clean raw news rows and encode their sentiment labels"
)]
struct Args {
    /// Raw CSV with `text,label` columns
    #[arg(short, long, value_name = "FILE", default_value = "data/data_raw.csv")]
    input: PathBuf,

    /// Encoded CSV to write (`clean_news,label_encoded`)
    #[arg(short, long, value_name = "FILE", default_value = "data/data_encoded.csv")]
    output: PathBuf,

    /// Run manifest to write (defaults to manifest.json next to the output)
    #[arg(short, long, value_name = "FILE")]
    manifest: Option<PathBuf>,

    /// Seed of the train/validation split
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Fraction of each class held out for validation
    #[arg(long, default_value = "0.2")]
    validation_fraction: f64,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_cli_logging(args.verbose)?;

    info!("Financial News Sentiment - Encoding Tool");
    info!("========================================");

    let manifest = run(&args)?;
    info!("");
    info!("Encoding Summary:");
    info!("  Rows: {}", manifest.num_rows);
    info!("  Labels: {}", manifest.labels);
    info!("  Encoded CSV: {}", manifest.encoded_path.display());
    Ok(())
}

fn manifest_path(args: &Args) -> PathBuf {
    args.manifest.clone().unwrap_or_else(|| {
        args.output
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join("manifest.json")
    })
}

fn run(args: &Args) -> Result<RunManifest> {
    let split = SplitConfig {
        validation_fraction: args.validation_fraction,
        seed: args.seed,
    };
    split.validate()?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .context("Invalid progress template")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(100));

    spinner.set_message(format!("Reading {}", args.input.display()));
    let rows = read_raw_rows(&args.input)
        .with_context(|| format!("Failed to read raw data: {}", args.input.display()))?;

    spinner.set_message(format!("Cleaning {} rows", rows.len()));
    let (encoded, labels) = encode_rows(&rows)?;

    spinner.set_message(format!("Writing {}", args.output.display()));
    write_encoded_rows(&args.output, &encoded)
        .with_context(|| format!("Failed to write encoded data: {}", args.output.display()))?;
    spinner.finish_and_clear();

    info!("Label mapping: {}", labels);
    let mut counts = vec![0usize; labels.len()];
    for row in &encoded {
        counts[row.label] += 1;
    }
    for (name, count) in labels.names().iter().zip(&counts) {
        info!("  {:<10} {:>6} rows", name, count);
    }

    let manifest = RunManifest::new(&args.input, &args.output, labels, split, encoded.len());
    manifest.save(&manifest_path(args))?;
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsent_dataset::read_encoded_rows;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_run_writes_encoded_rows_and_manifest() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("raw.csv");
        fs::write(
            &input,
            "text,label\n\
             \"Profit rose 10%, see https://x.io\",positive\n\
             Shares fell!,negative\n\
             Flat day,neutral\n",
        )
        .unwrap();

        let args = Args {
            input: input.clone(),
            output: dir.path().join("out/encoded.csv"),
            manifest: None,
            seed: 7,
            validation_fraction: 0.2,
            verbose: false,
        };
        let manifest = run(&args).unwrap();
        assert_eq!(manifest.num_rows, 3);
        assert_eq!(manifest.split.seed, 7);

        let loaded = RunManifest::load(&dir.path().join("out/manifest.json")).unwrap();
        assert_eq!(loaded, manifest);

        let rows = read_encoded_rows(&args.output).unwrap();
        assert_eq!(rows[0].text, "profit rose 10, see");
        assert_eq!(rows[0].label, 2);
        assert_eq!(rows[1].label, 0);
    }

    #[test]
    fn test_invalid_fraction_is_rejected() {
        let dir = TempDir::new().unwrap();
        let args = Args {
            input: dir.path().join("raw.csv"),
            output: dir.path().join("encoded.csv"),
            manifest: None,
            seed: 42,
            validation_fraction: 1.5,
            verbose: false,
        };
        assert!(run(&args).is_err());
    }
}
