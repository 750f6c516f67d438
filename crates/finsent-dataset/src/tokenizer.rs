//! Wrapper around a Hugging Face `tokenizers::Tokenizer`.

use std::path::Path;
use std::str::FromStr;

use finsent_core::{Error, Result};
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

/// Token used for padding when the vocabulary defines it
pub const PAD_TOKEN: &str = "[PAD]";

/// Token ids and attention mask of one encoded text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedText {
    pub input_ids: Vec<u32>,
    /// 1 for real tokens, 0 for padding
    pub attention_mask: Vec<u32>,
}

impl EncodedText {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

/// Tokenizer configured for a fixed truncation length, optionally padding
/// every sequence to exactly that length.
#[derive(Clone)]
pub struct TextEncoder {
    tokenizer: Tokenizer,
    max_len: usize,
    pad_to_max: bool,
    pad_id: u32,
}

impl std::fmt::Debug for TextEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextEncoder")
            .field("max_len", &self.max_len)
            .field("pad_to_max", &self.pad_to_max)
            .field("pad_id", &self.pad_id)
            .field("vocab_size", &self.vocab_size())
            .finish()
    }
}

impl TextEncoder {
    /// Truncates and pads every text to exactly `max_len` tokens.
    pub fn fixed_length(tokenizer: Tokenizer, max_len: usize) -> Result<Self> {
        Self::configure(tokenizer, max_len, true)
    }

    /// Truncates at `max_len` tokens without padding.
    pub fn truncating(tokenizer: Tokenizer, max_len: usize) -> Result<Self> {
        Self::configure(tokenizer, max_len, false)
    }

    pub fn from_file(path: &Path, max_len: usize, pad_to_max: bool) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            Error::Tokenizer(format!("Failed to load {}: {e}", path.display()))
        })?;
        Self::configure(tokenizer, max_len, pad_to_max)
    }

    fn configure(mut tokenizer: Tokenizer, max_len: usize, pad_to_max: bool) -> Result<Self> {
        if max_len == 0 {
            return Err(Error::InvalidArgument("max_len must be greater than 0".into()));
        }
        let pad_id = tokenizer.token_to_id(PAD_TOKEN).unwrap_or(0);

        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_len,
                ..Default::default()
            }))
            .map_err(|e| Error::Tokenizer(format!("Truncation config: {e}")))?;

        if pad_to_max {
            tokenizer.with_padding(Some(PaddingParams {
                strategy: PaddingStrategy::Fixed(max_len),
                pad_id,
                pad_token: PAD_TOKEN.to_string(),
                ..Default::default()
            }));
        } else {
            tokenizer.with_padding(None);
        }

        Ok(Self {
            tokenizer,
            max_len,
            pad_to_max,
            pad_id,
        })
    }

    pub fn encode(&self, text: &str) -> Result<EncodedText> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| Error::Tokenizer(format!("Failed to encode text: {e}")))?;

        Ok(EncodedText {
            input_ids: encoding.get_ids().to_vec(),
            attention_mask: encoding.get_attention_mask().to_vec(),
        })
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn pad_id(&self) -> u32 {
        self.pad_id
    }

    pub fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Writes the underlying tokenizer (with its truncation and padding
    /// settings cleared) as `tokenizer.json`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut plain = self.tokenizer.clone();
        plain.with_padding(None);
        plain
            .with_truncation(None)
            .map_err(|e| Error::Tokenizer(format!("Truncation config: {e}")))?;
        plain
            .save(path, true)
            .map_err(|e| Error::Tokenizer(format!("Failed to save {}: {e}", path.display())))
    }
}

/// Builds a whitespace word-level tokenizer over `words`, with BERT style
/// `[CLS]`/`[SEP]` framing and `[PAD]`/`[UNK]` at ids 0 and 1.
pub fn word_level_tokenizer(words: &[&str]) -> Result<Tokenizer> {
    let mut vocab = serde_json::Map::new();
    for (id, token) in ["[PAD]", "[UNK]", "[CLS]", "[SEP]"]
        .iter()
        .chain(words)
        .enumerate()
    {
        vocab.entry(token.to_string()).or_insert(serde_json::Value::from(id));
    }

    let json = serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": { "type": "Lowercase" },
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": {
            "type": "BertProcessing",
            "sep": ["[SEP]", 3],
            "cls": ["[CLS]", 2]
        },
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": vocab,
            "unk_token": "[UNK]"
        }
    });

    Tokenizer::from_str(&json.to_string())
        .map_err(|e| Error::Tokenizer(format!("Failed to build word-level tokenizer: {e}")))
}
