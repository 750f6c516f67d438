//! Shared CLI helpers for the workspace tools.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{Error, Result};

/// Installs the global subscriber; `RUST_LOG` wins over the verbosity flag.
pub fn setup_cli_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logger: {e}")))?;

    Ok(())
}

pub fn load_toml_config<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config {}: {e}", path.display())))?;

    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;
    use tempfile::TempDir;

    #[test]
    fn test_load_toml_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("train.toml");
        fs::write(
            &path,
            "[training]\nbatch_size = 8\n\n[model]\npretrained = \"prajjwal1/bert-tiny\"\n",
        )
        .unwrap();

        let config: TrainingConfig = load_toml_config(&path).unwrap();
        assert_eq!(config.training.batch_size, 8);
        assert_eq!(config.model.pretrained, "prajjwal1/bert-tiny");
        assert_eq!(config.training.epochs, 4);
    }

    #[test]
    fn test_load_toml_config_errors() {
        let dir = TempDir::new().unwrap();
        let missing = load_toml_config::<TrainingConfig>(&dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(Error::Config(_))));

        let path = dir.path().join("bad.toml");
        fs::write(&path, "[training\nepochs = ").unwrap();
        assert!(matches!(
            load_toml_config::<TrainingConfig>(&path),
            Err(Error::Config(_))
        ));
    }
}
