//! Core types and utilities for financial news sentiment fine-tuning.
//!
//! This crate provides the foundational types, configuration, metrics and
//! helpers shared by the dataset, training and serving crates.

pub mod backend;
pub mod cli;
pub mod config;
pub mod curves;
pub mod error;
pub mod metrics;
pub mod types;

pub use backend::*;
pub use config::*;
pub use error::{Error, Result};
pub use metrics::*;
pub use types::*;

