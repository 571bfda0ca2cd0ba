use anyhow::Context;
use facematch_core::Thresholds;
use facematch_fs::DEFAULT_MAX_FILE_BYTES;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Daemon configuration.
///
/// Sources, lowest precedence first: built-in defaults, the TOML file
/// named by `FACEMATCH_CONFIG`, `FACEMATCH_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory holding the reference images (default: $XDG_DATA_HOME/facematch/references).
    pub reference_dir: PathBuf,
    /// Files larger than this are ignored.
    pub max_file_bytes: u64,
    /// Combined score for a confirmed match.
    pub match_threshold: f32,
    /// Combined score for a possible match (manual verification).
    pub possible_threshold: f32,
    /// Register on the system bus instead of the session bus.
    pub system_bus: bool,
}

impl Default for Config {
    fn default() -> Self {
        let defaults = Thresholds::default();
        Self {
            reference_dir: default_reference_dir(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            match_threshold: defaults.matched,
            possible_threshold: defaults.possible,
            system_bus: false,
        }
    }
}

impl Config {
    /// Load the optional config file, then apply environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var("FACEMATCH_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config = toml::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Apply `FACEMATCH_*` overrides from `lookup`. Unparseable values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("FACEMATCH_REFERENCE_DIR") {
            self.reference_dir = PathBuf::from(dir);
        }
        override_parsed(&lookup, "FACEMATCH_MAX_FILE_BYTES", &mut self.max_file_bytes);
        override_parsed(&lookup, "FACEMATCH_MATCH_THRESHOLD", &mut self.match_threshold);
        override_parsed(&lookup, "FACEMATCH_POSSIBLE_THRESHOLD", &mut self.possible_threshold);
        if let Some(v) = lookup("FACEMATCH_SYSTEM_BUS") {
            self.system_bus = v != "0";
        }
    }

    /// Configured thresholds, or the defaults if they are inconsistent.
    pub fn thresholds(&self) -> Thresholds {
        let configured = Thresholds {
            matched: self.match_threshold,
            possible: self.possible_threshold,
        };
        if configured.is_valid() {
            configured
        } else {
            tracing::warn!(
                matched = self.match_threshold,
                possible = self.possible_threshold,
                "invalid thresholds (need possible <= match); using defaults"
            );
            Thresholds::default()
        }
    }
}

fn default_reference_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facematch")
        .join("references")
}

fn override_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) {
    if let Some(value) = lookup(key).and_then(|v| v.parse().ok()) {
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.match_threshold, 0.85);
        assert_eq!(config.possible_threshold, 0.75);
        assert_eq!(config.max_file_bytes, DEFAULT_MAX_FILE_BYTES);
        assert!(config.reference_dir.ends_with("facematch/references"));
        assert!(!config.system_bus);
    }

    #[test]
    fn test_toml_partial_file() {
        let config: Config = toml::from_str(
            r#"
            reference_dir = "/srv/faces"
            possible_threshold = 0.7
            "#,
        )
        .unwrap();
        assert_eq!(config.reference_dir, PathBuf::from("/srv/faces"));
        assert_eq!(config.possible_threshold, 0.7);
        assert_eq!(config.match_threshold, 0.85);
    }

    #[test]
    fn test_toml_rejects_unknown_keys() {
        assert!(toml::from_str::<Config>("similarity = 0.4").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("FACEMATCH_REFERENCE_DIR", "/data/refs"),
            ("FACEMATCH_MAX_FILE_BYTES", "4096"),
            ("FACEMATCH_MATCH_THRESHOLD", "0.9"),
            ("FACEMATCH_POSSIBLE_THRESHOLD", "not-a-number"),
            ("FACEMATCH_SYSTEM_BUS", "1"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.reference_dir, PathBuf::from("/data/refs"));
        assert_eq!(config.max_file_bytes, 4096);
        assert_eq!(config.match_threshold, 0.9);
        assert_eq!(config.possible_threshold, 0.75);
        assert!(config.system_bus);
    }

    #[test]
    fn test_inconsistent_thresholds_fall_back() {
        let config = Config {
            match_threshold: 0.6,
            possible_threshold: 0.8,
            ..Config::default()
        };
        assert_eq!(config.thresholds(), Thresholds::default());
    }
}
