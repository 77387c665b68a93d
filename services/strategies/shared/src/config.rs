//! Service configuration utilities

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Load configuration from TOML file
pub fn load_config<T: for<'de> Deserialize<'de>>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Pick the config file: explicit argument, then `env_var`, then `default`
pub fn resolve_config_path(explicit: Option<String>, env_var: &str, default: &str) -> PathBuf {
    explicit
        .or_else(|| env_override(env_var))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

/// Read a non-empty environment variable
pub fn env_override(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Split a comma-separated override into trimmed, non-empty items
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        name: String,
        #[serde(default)]
        ports: Vec<u16>,
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name = \"monitor\"\nports = [8080, 9090]").unwrap();

        let sample: Sample = load_config(file.path()).unwrap();
        assert_eq!(
            sample,
            Sample {
                name: "monitor".to_string(),
                ports: vec![8080, 9090],
            }
        );
    }

    #[test]
    fn test_load_config_reports_path() {
        let err = load_config::<Sample>("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }

    #[test]
    fn test_load_config_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name = ").unwrap();
        assert!(load_config::<Sample>(file.path()).is_err());
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let path = resolve_config_path(
            Some("custom.toml".to_string()),
            "STRATEGY_SHARED_TEST_UNSET_VAR",
            "configs/default.toml",
        );
        assert_eq!(path, PathBuf::from("custom.toml"));

        let path = resolve_config_path(
            None,
            "STRATEGY_SHARED_TEST_UNSET_VAR",
            "configs/default.toml",
        );
        assert_eq!(path, PathBuf::from("configs/default.toml"));
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list(" BTCUSDT, ETHUSDT ,,"), vec!["BTCUSDT", "ETHUSDT"]);
        assert!(parse_list("").is_empty());
    }
}
