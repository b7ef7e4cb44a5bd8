use anyhow::{Context, Result};
use playmode_core::{artifact_file_name, safe_name, LocationKind, PlayMode};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::fetch::{Fetcher, RetryingFetcher, Sleeper};
use crate::layout::{ensure_dir, GameLayout};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(PathBuf),
    Fetched(PathBuf),
    NotFound,
}

impl CacheLookup {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Hit(path) | Self::Fetched(path) => Some(path),
            Self::NotFound => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit(_) => "cache-hit",
            Self::Fetched(_) => "downloaded",
            Self::NotFound => "not-found",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcReport {
    pub removed_modes: Vec<PathBuf>,
    pub removed_versions: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

impl GcReport {
    pub fn is_empty(&self) -> bool {
        self.removed_modes.is_empty() && self.removed_versions.is_empty() && self.failed.is_empty()
    }
}

/// Where the artifact for `url` lives in the cache, whether or not it has been fetched.
pub fn artifact_cache_path(
    layout: &GameLayout,
    url: &str,
    version: &str,
    mode: &str,
    location: LocationKind,
) -> Option<PathBuf> {
    let file_name = artifact_file_name(url)?;
    Some(layout.cache_path(mode, version, location).join(file_name))
}

pub fn get_or_fetch<F: Fetcher, S: Sleeper>(
    layout: &GameLayout,
    fetcher: &RetryingFetcher<F, S>,
    url: &str,
    version: &str,
    mode: &str,
    location: LocationKind,
) -> CacheLookup {
    let Some(artifact_path) = artifact_cache_path(layout, url, version, mode, location) else {
        warn!(url, "download URL does not name a file; cannot cache it");
        return CacheLookup::NotFound;
    };
    if artifact_path.is_file() {
        return CacheLookup::Hit(artifact_path);
    }

    let entry_dir = layout.cache_path(mode, version, location);
    if let Err(err) = ensure_dir(&entry_dir) {
        warn!("failed to prepare cache entry for {mode} {version} {location}: {err:#}");
        return CacheLookup::NotFound;
    }

    match fetcher.fetch_with_retry(url, &artifact_path) {
        Ok(()) => {
            info!(mode, version, %location, "cached {}", artifact_path.display());
            CacheLookup::Fetched(artifact_path)
        }
        Err(err) => {
            warn!("{err:#}");
            remove_empty_dirs_up_to(&entry_dir, &layout.mod_cache_dir());
            CacheLookup::NotFound
        }
    }
}

/// True when every download the mode declares is already in the cache.
pub fn is_available_offline(layout: &GameLayout, mode: &PlayMode) -> bool {
    LocationKind::ALL.into_iter().all(|location| {
        let Some(url) = mode.download_url(location) else {
            return true;
        };
        artifact_cache_path(
            layout,
            url,
            mode.target_version(location),
            &mode.name,
            location,
        )
        .is_some_and(|path| path.is_file())
    })
}

/// Deletes cache directories for retired modes and superseded versions.
pub fn garbage_collect(layout: &GameLayout, current_modes: &[PlayMode]) -> Result<GcReport> {
    let mut report = GcReport::default();
    let cache_root = layout.mod_cache_dir();
    if !cache_root.is_dir() {
        return Ok(report);
    }

    let modes_by_safe_name: HashMap<String, &PlayMode> = current_modes
        .iter()
        .map(|mode| (safe_name(&mode.name), mode))
        .collect();

    for entry in fs::read_dir(&cache_root)
        .with_context(|| format!("failed to read mod cache: {}", cache_root.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let mode_dir = entry.path();
        let dir_name = entry.file_name().to_string_lossy().into_owned();

        let Some(mode) = modes_by_safe_name.get(&dir_name) else {
            match fs::remove_dir_all(&mode_dir) {
                Ok(()) => {
                    info!("removed cache for retired mode: {}", mode_dir.display());
                    report.removed_modes.push(mode_dir);
                }
                Err(err) => {
                    warn!("failed to remove {}: {err}", mode_dir.display());
                    report.failed.push(mode_dir);
                }
            }
            continue;
        };

        for version_entry in fs::read_dir(&mode_dir)
            .with_context(|| format!("failed to read {}", mode_dir.display()))?
        {
            let version_entry = version_entry?;
            if !version_entry.file_type()?.is_dir() {
                continue;
            }
            let version = version_entry.file_name().to_string_lossy().into_owned();
            if version == mode.online_version.dlc || version == mode.online_version.my_documents {
                continue;
            }

            let version_dir = version_entry.path();
            match fs::remove_dir_all(&version_dir) {
                Ok(()) => {
                    info!("removed superseded cache: {}", version_dir.display());
                    report.removed_versions.push(version_dir);
                }
                Err(err) => {
                    warn!("failed to remove {}: {err}", version_dir.display());
                    report.failed.push(version_dir);
                }
            }
        }
    }

    report.removed_modes.sort();
    report.removed_versions.sort();
    Ok(report)
}

fn remove_empty_dirs_up_to(start: &Path, stop: &Path) {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir == stop || !dir.starts_with(stop) {
            break;
        }
        if fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}
