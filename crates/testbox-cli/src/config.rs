//! Runner configuration file
//!
//! Lives at `~/.testbox/config.json`. Missing file means defaults.

use std::path::{Path, PathBuf};

use anyhow::Context;
use testbox_core::RunnerConfig;

pub fn default_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".testbox").join("config.json"))
}

/// Load the default config file, falling back to defaults when absent
pub fn load() -> anyhow::Result<RunnerConfig> {
    match default_path() {
        Some(path) if path.exists() => load_from(&path),
        _ => Ok(RunnerConfig::default()),
    }
}

/// Load an explicit config file; it must exist
pub fn load_from(path: &Path) -> anyhow::Result<RunnerConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: RunnerConfig = serde_json::from_str(&content)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    tracing::debug!(path = %path.display(), ?config, "config loaded");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"timeoutMs": 1500}}"#).unwrap();

        let config = load_from(file.path()).unwrap();
        assert_eq!(config.timeout_ms, 1500);
        assert_eq!(config.memory_limit_bytes, RunnerConfig::default().memory_limit_bytes);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "timeoutMs = 5").unwrap();
        let err = load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid config file"));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_from(&dir.path().join("config.json")).is_err());
    }

    #[test]
    fn test_default_path_shape() {
        if let Some(path) = default_path() {
            assert!(path.ends_with(".testbox/config.json"));
        }
    }
}
