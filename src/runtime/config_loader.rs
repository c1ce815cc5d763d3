//! Service configuration loader.
//!
//! Loads `canopy.yaml` and applies environment overrides on top. The
//! configuration only describes where boot-time state comes from (registry
//! directories, template parts, fallback content); it is read once at startup.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::registry::Registry;
use crate::runtime::pipeline::Fallback;
use crate::runtime::template_parts::DirectoryResolver;

/// Error type for configuration loading
#[derive(Debug, Clone)]
pub enum ConfigError {
    Io { path: PathBuf, message: String },
    Parse { path: PathBuf, message: String },
    InvalidValue { key: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, message } => {
                write!(f, "Failed to read config file {}: {}", path.display(), message)
            }
            ConfigError::Parse { path, message } => {
                write!(f, "Failed to parse config file {}: {}", path.display(), message)
            }
            ConfigError::InvalidValue { key, value } => {
                write!(f, "Invalid value for {}: '{}'", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Top-level configuration from canopy.yaml
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CanopyConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directories scanned for node type definition files
    #[serde(default = "default_registry_dirs")]
    pub registry_dirs: Vec<PathBuf>,
    /// Directory holding template part files
    #[serde(default)]
    pub template_parts: Option<PathBuf>,
    #[serde(default = "Fallback::standard")]
    pub fallback: Fallback,
}

fn default_port() -> u16 {
    8080
}

fn default_registry_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("config/nodes")]
}

impl Default for CanopyConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            registry_dirs: default_registry_dirs(),
            template_parts: None,
            fallback: Fallback::standard(),
        }
    }
}

impl CanopyConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load `path` if it exists (defaults otherwise), then apply the
    /// process environment.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a variable lookup.
    ///
    /// * `CANOPY_PORT` (or `PORT`): listen port
    /// * `CANOPY_REGISTRY_DIRS`: path list, platform separator
    /// * `CANOPY_TEMPLATE_PARTS`: template part directory
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some((key, value)) = ["CANOPY_PORT", "PORT"]
            .iter()
            .find_map(|key| lookup(key).map(|value| (*key, value)))
        {
            self.port = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.clone(),
            })?;
        }

        if let Some(dirs) = lookup("CANOPY_REGISTRY_DIRS") {
            self.registry_dirs = std::env::split_paths(&dirs)
                .filter(|dir| !dir.as_os_str().is_empty())
                .collect();
        }

        if let Some(dir) = lookup("CANOPY_TEMPLATE_PARTS").filter(|dir| !dir.is_empty()) {
            self.template_parts = Some(PathBuf::from(dir));
        }

        Ok(self)
    }

    /// Build the registry from the configured directories.
    pub fn build_registry(&self) -> Registry {
        let mut registry = Registry::new();
        registry.load_from_directory(self.registry_dirs.as_slice());
        registry
    }

    pub fn template_part_resolver(&self) -> Option<DirectoryResolver> {
        self.template_parts.as_ref().map(DirectoryResolver::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = CanopyConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.registry_dirs, vec![PathBuf::from("config/nodes")]);
        assert!(config.template_parts.is_none());
        assert_eq!(config.fallback.welcome.len(), 1);
    }

    #[test]
    fn test_from_file_fills_missing_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("canopy.yaml");
        fs::write(&path, "port: 9000\ntemplate_parts: parts\n").unwrap();

        let config = CanopyConfig::from_file(&path).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.template_parts, Some(PathBuf::from("parts")));
        assert_eq!(config.registry_dirs, vec![PathBuf::from("config/nodes")]);
        assert_eq!(config.fallback.not_found.len(), 1);
    }

    #[test]
    fn test_custom_fallback() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("canopy.yaml");
        fs::write(
            &path,
            "fallback:\n  welcome:\n    - name: site/hero\n  notFound:\n    - name: site/404\n    - null\n",
        )
        .unwrap();

        let config = CanopyConfig::from_file(&path).unwrap();
        assert_eq!(config.fallback.welcome[0].name(), Some("site/hero"));
        assert_eq!(config.fallback.not_found.len(), 1);
    }

    #[test]
    fn test_fallback_accepts_snake_case() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("canopy.yaml");
        fs::write(&path, "fallback:\n  not_found:\n    - name: site/404\n").unwrap();

        let config = CanopyConfig::from_file(&path).unwrap();
        assert_eq!(config.fallback.not_found.len(), 1);
        assert_eq!(config.fallback.not_found[0].name(), Some("site/404"));
    }

    #[test]
    fn test_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("canopy.yaml");
        fs::write(&path, "port: [not a port").unwrap();

        assert!(matches!(CanopyConfig::from_file(&path), Err(ConfigError::Parse { .. })));
        assert!(matches!(
            CanopyConfig::from_file(dir.path().join("missing.yaml")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let config = CanopyConfig::default()
            .apply_overrides(lookup(&[
                ("PORT", "3000"),
                ("CANOPY_TEMPLATE_PARTS", "/srv/parts"),
            ]))
            .unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.template_parts, Some(PathBuf::from("/srv/parts")));

        let config = CanopyConfig::default()
            .apply_overrides(lookup(&[("CANOPY_PORT", "4000"), ("PORT", "3000")]))
            .unwrap();
        assert_eq!(config.port, 4000);

        let err = CanopyConfig::default()
            .apply_overrides(lookup(&[("CANOPY_PORT", "http")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_registry_dirs_override() {
        let joined = std::env::join_paths(["a", "b"]).unwrap();
        let joined = joined.to_string_lossy().to_string();
        let config = CanopyConfig::default()
            .apply_overrides(lookup(&[("CANOPY_REGISTRY_DIRS", joined.as_str())]))
            .unwrap();
        assert_eq!(config.registry_dirs, vec![PathBuf::from("a"), PathBuf::from("b")]);
    }
}
