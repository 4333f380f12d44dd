use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::libs::environment::{CapabilityCheck, StaticHost};

const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");
const APP_NAME: &str = "nexo-libs";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub namespace: NamespaceConfig,
    pub repositories: RepositoryConfig,
    #[serde(default)]
    pub host: HostConfig,
    pub probe: ProbeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Cache directory name handed to the fetch engine.
    pub cache_dir: String,
    pub diagnostic_prefix: String,
    /// Replaces the built-in manifest when set.
    #[serde(default)]
    pub manifest: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamespaceConfig {
    pub reserved: String,
    pub host: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryConfig {
    pub maven_central: bool,
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    pub symbols: Vec<CapabilityCheck>,
    pub legacy_versions: Vec<String>,
}

impl AppConfig {
    /// Load configuration with layering: defaults → user config.
    ///
    /// An explicit path must exist; otherwise the platform config file is
    /// used when present.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let user = match explicit {
            Some(path) => Some(
                fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?,
            ),
            None => match user_config_path() {
                Some(path) if path.exists() => Some(
                    fs::read_to_string(&path)
                        .with_context(|| format!("failed to read config {}", path.display()))?,
                ),
                _ => None,
            },
        };

        Self::layered(user.as_deref())
    }

    pub fn layered(user: Option<&str>) -> Result<Self> {
        let mut merged: toml::Table =
            toml::from_str(DEFAULT_CONFIG).context("embedded default config is invalid")?;

        if let Some(user) = user {
            let overlay: toml::Table = toml::from_str(user).context("invalid user config")?;
            merge_tables(&mut merged, overlay);
        }

        let mut config: AppConfig = toml::Value::Table(merged).try_into()?;

        if let Some(manifest) = config.general.manifest.as_mut() {
            if manifest.starts_with('~') {
                let home = dirs_home().ok_or_else(|| anyhow!("cannot determine home directory"))?;
                *manifest = manifest.replacen('~', &home.to_string_lossy(), 1);
            }
        }

        Ok(config)
    }

    pub fn manifest_path(&self) -> Option<PathBuf> {
        self.general.manifest.as_ref().map(PathBuf::from)
    }

    pub fn static_host(&self) -> StaticHost {
        StaticHost {
            vendor: self.host.vendor.clone(),
            version: self.host.version.clone(),
            symbols: self.host.symbols.iter().cloned().collect(),
        }
    }
}

/// Tables merge key by key; any other value in `overlay` replaces the base.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(overlay_table) => {
                if let Some(toml::Value::Table(base_table)) = base.get_mut(&key) {
                    merge_tables(base_table, overlay_table);
                } else {
                    base.insert(key, toml::Value::Table(overlay_table));
                }
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Where the binary keeps logs and the artifact cache.
pub fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".nexo-libs"))
}

fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let config = AppConfig::layered(None).unwrap();
        assert_eq!(config.general.cache_dir, "libs");
        assert_eq!(config.general.diagnostic_prefix, "[Nexo]");
        assert_eq!(config.namespace.reserved, "com.nexomc.libs");
        assert!(config.repositories.maven_central);
        assert_eq!(config.repositories.urls.len(), 4);
        assert_eq!(config.probe.legacy_versions, ["1.20.4"]);
        assert!(config.manifest_path().is_none());
    }

    #[test]
    fn user_config_overrides_single_keys() {
        let config = AppConfig::layered(Some(
            r#"
            [general]
            cache_dir = "libraries"

            [host]
            vendor = "Paper"
            version = "1.21.4"
            "#,
        ))
        .unwrap();
        assert_eq!(config.general.cache_dir, "libraries");
        assert_eq!(config.general.diagnostic_prefix, "[Nexo]");
        assert_eq!(config.repositories.urls.len(), 4);
        assert_eq!(config.static_host().vendor.as_deref(), Some("Paper"));
    }

    #[test]
    fn lists_replace_rather_than_append() {
        let config = AppConfig::layered(Some(
            r#"
            [repositories]
            urls = ["https://repo.example.com/maven/"]
            "#,
        ))
        .unwrap();
        assert_eq!(config.repositories.urls, ["https://repo.example.com/maven/"]);
        assert!(config.repositories.maven_central);
    }

    #[test]
    fn explicit_config_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load(Some(&dir.path().join("missing.toml"))).is_err());

        let path = dir.path().join("config.toml");
        fs::write(&path, "[general]\nmanifest = \"/srv/libs.toml\"\n").unwrap();
        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.manifest_path(), Some(PathBuf::from("/srv/libs.toml")));
    }

    #[test]
    fn invalid_user_config_is_an_error() {
        assert!(AppConfig::layered(Some("[general]\ncache_dir = 3\n")).is_err());
        assert!(AppConfig::layered(Some("not toml at all [")).is_err());
    }
}
