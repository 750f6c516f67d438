//! Data preparation for financial news sentiment fine-tuning.
//!
//! Covers the text normalization and label encoding of the raw CSV, the
//! seeded stratified train/validation split, tokenization, and the burn
//! dataset/batcher used by training and evaluation.

pub mod clean;
pub mod dataset;
pub mod encode;
pub mod split;
pub mod tokenizer;

pub use clean::clean_text;
pub use dataset::{NewsBatch, NewsBatcher, NewsDataset, TokenizedExample};
pub use encode::{encode_rows, read_encoded_rows, read_raw_rows, to_examples, write_encoded_rows};
pub use split::StratifiedSplit;
pub use tokenizer::{word_level_tokenizer, EncodedText, TextEncoder};
