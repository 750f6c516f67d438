//! Locating and importing pretrained encoder files.
//!
//! A pretrained source is either a local directory or a Hugging Face hub
//! model id. Either way it must provide `config.json`, `tokenizer.json` and
//! `pytorch_model.bin`.

use std::fs;
use std::path::{Path, PathBuf};

use burn::prelude::*;
use burn::record::{FullPrecisionSettings, Recorder};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};
use tokenizers::Tokenizer;
use tracing::info;

use finsent_core::{Error, Result};

use crate::model::{BertConfig, BertModel, BertModelRecord};

pub const CONFIG_FILE: &str = "config.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const WEIGHTS_FILE: &str = "pytorch_model.bin";

/// Key rewrites from the hub checkpoint layout to [`BertModel`] fields.
const KEY_REMAPS: [(&str, &str); 6] = [
    (r"^bert\.", ""),
    (r"LayerNorm\.gamma", "layer_norm.weight"),
    (r"LayerNorm\.beta", "layer_norm.bias"),
    (r"LayerNorm\.", "layer_norm."),
    (r"attention\.self\.", "attention.self_attn."),
    (r"encoder\.layer\.", "encoder.layers."),
];

/// Paths of the files making up a pretrained encoder
#[derive(Debug, Clone)]
pub struct PretrainedFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl PretrainedFiles {
    /// Resolves a local directory or downloads from the hub (cached).
    pub fn resolve(source: &str) -> Result<Self> {
        let local = Path::new(source);
        if local.is_dir() {
            info!("Using pretrained files from {}", local.display());
            return Self::from_dir(local);
        }

        info!("Fetching pretrained model {} from the hub", source);
        let api = Api::new().map_err(|e| Error::Hub(format!("Failed to create hub client: {e}")))?;
        let repo = api.repo(Repo::new(source.to_string(), RepoType::Model));
        let fetch = |file: &str| {
            repo.get(file)
                .map_err(|e| Error::Hub(format!("Failed to fetch {file} for {source}: {e}")))
        };

        Ok(Self {
            config: fetch(CONFIG_FILE)?,
            tokenizer: fetch(TOKENIZER_FILE)?,
            weights: fetch(WEIGHTS_FILE)?,
        })
    }

    pub fn from_dir(dir: &Path) -> Result<Self> {
        let files = Self {
            config: dir.join(CONFIG_FILE),
            tokenizer: dir.join(TOKENIZER_FILE),
            weights: dir.join(WEIGHTS_FILE),
        };
        for path in [&files.config, &files.tokenizer, &files.weights] {
            if !path.is_file() {
                return Err(Error::NotFound(format!("{}", path.display())));
            }
        }
        Ok(files)
    }

    pub fn load_config(&self) -> Result<BertConfig> {
        load_bert_config(&self.config)
    }

    pub fn load_tokenizer(&self) -> Result<Tokenizer> {
        Tokenizer::from_file(&self.tokenizer).map_err(|e| {
            Error::Tokenizer(format!("Failed to load {}: {e}", self.tokenizer.display()))
        })
    }

    /// Builds the encoder from `config` and loads the pretrained weights into it.
    pub fn load_encoder<B: Backend>(
        &self,
        config: &BertConfig,
        device: &B::Device,
    ) -> Result<BertModel<B>> {
        let args = KEY_REMAPS
            .iter()
            .fold(LoadArgs::new(self.weights.clone()), |args, (from, to)| {
                args.with_key_remap(from, to)
            });

        let record: BertModelRecord<B> = PyTorchFileRecorder::<FullPrecisionSettings>::default()
            .load(args, device)
            .map_err(|e| {
                Error::Record(format!(
                    "Failed to import {}: {e}",
                    self.weights.display()
                ))
            })?;

        let model = config.init::<B>(device).load_record(record);
        info!(
            "Loaded pretrained encoder ({} parameters) from {}",
            model.num_params(),
            self.weights.display()
        );
        Ok(model)
    }
}

pub fn load_bert_config(path: &Path) -> Result<BertConfig> {
    let json = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;
    let config: BertConfig = serde_json::from_str(&json)?;
    config.validate()?;
    Ok(config)
}
