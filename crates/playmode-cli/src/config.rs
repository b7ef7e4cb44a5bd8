use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use playmode_engine::{FetchPolicy, GameLayout};
use serde::Deserialize;

use crate::metadata::ManifestSource;

pub(crate) const CONFIG_ENV: &str = "PLAYMODE_CONFIG";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct ConfigFile {
    pub(crate) game_root: Option<PathBuf>,
    pub(crate) documents_root: Option<PathBuf>,
    pub(crate) dlc_subdir: Option<PathBuf>,
    pub(crate) manifest: Option<String>,
    #[serde(default)]
    pub(crate) fetch: FetchConfig,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct FetchConfig {
    pub(crate) max_attempts: Option<u32>,
    pub(crate) base_delay_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConfigLocation {
    pub(crate) path: PathBuf,
    /// Named by flag or environment; a missing file is then an error.
    pub(crate) explicit: bool,
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub(crate) struct ConfigOverrides {
    pub(crate) game_root: Option<PathBuf>,
    pub(crate) documents_root: Option<PathBuf>,
    pub(crate) manifest: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct ResolvedConfig {
    pub(crate) layout: GameLayout,
    pub(crate) manifest: Option<ManifestSource>,
    pub(crate) fetch_policy: FetchPolicy,
}

impl ResolvedConfig {
    pub(crate) fn manifest_source(&self) -> Result<&ManifestSource> {
        self.manifest.as_ref().ok_or_else(|| {
            anyhow!("no play-mode manifest configured; set `manifest` in the config file or pass --manifest")
        })
    }
}

pub(crate) fn parse_config(raw: &str) -> Result<ConfigFile> {
    toml::from_str(raw).context("failed to parse playmode config")
}

pub(crate) fn default_config_dir() -> Result<PathBuf> {
    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows config dir")?;
        return Ok(PathBuf::from(app_data).join("Playmode"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve config dir")?;
    Ok(PathBuf::from(home).join(".playmode"))
}

pub(crate) fn resolve_config_location(
    flag: Option<&Path>,
    env_value: Option<OsString>,
) -> Result<ConfigLocation> {
    if let Some(path) = flag {
        return Ok(ConfigLocation {
            path: path.to_path_buf(),
            explicit: true,
        });
    }
    if let Some(value) = env_value.filter(|value| !value.is_empty()) {
        return Ok(ConfigLocation {
            path: PathBuf::from(value),
            explicit: true,
        });
    }
    Ok(ConfigLocation {
        path: default_config_dir()?.join(CONFIG_FILE_NAME),
        explicit: false,
    })
}

pub(crate) fn load_config(location: &ConfigLocation) -> Result<ConfigFile> {
    let raw = match fs::read_to_string(&location.path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound && !location.explicit => {
            return Ok(ConfigFile::default());
        }
        Err(err) => {
            return Err(err).with_context(|| {
                format!("failed to read config: {}", location.path.display())
            });
        }
    };
    parse_config(&raw).with_context(|| format!("invalid config: {}", location.path.display()))
}

pub(crate) fn resolve_config(
    file: ConfigFile,
    overrides: ConfigOverrides,
    location: &ConfigLocation,
) -> Result<ResolvedConfig> {
    let game_root = overrides.game_root.or(file.game_root).ok_or_else(|| {
        anyhow!(
            "game_root is not configured; set it in {} or pass --game-root",
            location.path.display()
        )
    })?;
    let documents_root = overrides
        .documents_root
        .or(file.documents_root)
        .ok_or_else(|| {
            anyhow!(
                "documents_root is not configured; set it in {} or pass --documents-root",
                location.path.display()
            )
        })?;

    let mut layout = GameLayout::new(game_root, documents_root);
    if let Some(dlc_subdir) = file.dlc_subdir {
        layout = layout.with_dlc_subdir(dlc_subdir);
    }

    let manifest = overrides
        .manifest
        .or(file.manifest)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(|value| ManifestSource::parse(&value));

    Ok(ResolvedConfig {
        layout,
        manifest,
        fetch_policy: fetch_policy(&file.fetch)?,
    })
}

fn fetch_policy(config: &FetchConfig) -> Result<FetchPolicy> {
    let defaults = FetchPolicy::default();
    let max_attempts = config.max_attempts.unwrap_or(defaults.max_attempts);
    if max_attempts == 0 {
        return Err(anyhow!("fetch.max_attempts must be at least 1"));
    }
    Ok(FetchPolicy {
        max_attempts,
        base_delay: config
            .base_delay_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.base_delay),
    })
}
