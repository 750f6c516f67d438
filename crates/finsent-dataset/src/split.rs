//! Deterministic stratified train/validation split.
//!
//! Examples are grouped by label, each class is shuffled with a seeded
//! `ChaCha8Rng`, and `round(n * validation_fraction)` examples of every class
//! are held out. A class always keeps at least one training example.
//! The same table and seed always give the same membership and order.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

use finsent_core::{Error, LabeledExample, Result, RunManifest, SplitConfig};
use tracing::info;

use crate::encode::{read_encoded_rows, to_examples};

/// Train and validation partitions of a labeled table
#[derive(Debug, Clone)]
pub struct StratifiedSplit {
    pub train: Vec<LabeledExample>,
    pub validation: Vec<LabeledExample>,
    pub config: SplitConfig,
}

impl StratifiedSplit {
    pub fn split(examples: Vec<LabeledExample>, config: SplitConfig) -> Result<Self> {
        config.validate()?;
        if examples.is_empty() {
            return Err(Error::Dataset("No examples provided for splitting".to_string()));
        }

        let mut by_class: BTreeMap<usize, Vec<LabeledExample>> = BTreeMap::new();
        for example in examples {
            by_class.entry(example.label).or_default().push(example);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut train = Vec::new();
        let mut validation = Vec::new();

        for (label, mut class_examples) in by_class {
            let n = class_examples.len();
            let n_val = Self::validation_count(n, config.validation_fraction);

            class_examples.shuffle(&mut rng);
            let rest = class_examples.split_off(n_val);
            info!(
                "Class {}: {} train / {} validation",
                label,
                rest.len(),
                class_examples.len()
            );
            validation.extend(class_examples);
            train.extend(rest);
        }

        train.shuffle(&mut rng);
        validation.shuffle(&mut rng);

        Ok(Self {
            train,
            validation,
            config,
        })
    }

    /// Rebuilds the split recorded in a run manifest from its encoded CSV.
    pub fn from_manifest(manifest: &RunManifest) -> Result<Self> {
        let rows = read_encoded_rows(&manifest.encoded_path)?;
        if rows.len() != manifest.num_rows {
            return Err(Error::Dataset(format!(
                "{} has {} rows but the manifest records {}",
                manifest.encoded_path.display(),
                rows.len(),
                manifest.num_rows
            )));
        }
        let examples = to_examples(rows, &manifest.labels)?;
        Self::split(examples, manifest.split)
    }

    /// Number of validation examples for a class of size `n`.
    pub fn validation_count(n: usize, fraction: f64) -> usize {
        let wanted = (n as f64 * fraction).round() as usize;
        wanted.min(n.saturating_sub(1))
    }

    pub fn len(&self) -> usize {
        self.train.len() + self.validation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Display for StratifiedSplit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} train / {} validation (seed {}, validation fraction {})",
            self.train.len(),
            self.validation.len(),
            self.config.seed,
            self.config.validation_fraction
        )
    }
}
