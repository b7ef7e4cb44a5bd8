use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDateTime};
use playmode_core::{LocationKind, ModeManifest, PlayMode};
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::cache::{garbage_collect, get_or_fetch, is_available_offline, GcReport};
use crate::cleanup::{clean_obsolete, CleanupReport};
use crate::decision::{needs_cache_flush, needs_update};
use crate::extract::{download_and_extract, ExtractOutcome};
use crate::fetch::{Fetcher, RetryingFetcher, Sleeper, ThreadSleeper};
use crate::fs_utils::remove_path_if_exists;
use crate::install_state::{last_used_mode, write_version_record, InstallState};
use crate::layout::ensure_dir;
use crate::migrate::{switch_user_data, MigrationReport};
use crate::GameLayout;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationOutcome {
    UpToDate,
    Installed { artifact: PathBuf, from_cache: bool },
    RecordedWithoutContent,
    Failed { reason: String },
}

impl LocationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UpToDate => "up-to-date",
            Self::Installed { .. } => "installed",
            Self::RecordedWithoutContent => "no-content",
            Self::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationReport {
    pub location: LocationKind,
    pub version: String,
    pub outcome: LocationOutcome,
    pub cleanup: Option<CleanupReport>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchReport {
    pub mode: String,
    pub locations: Vec<LocationReport>,
    pub gc: Option<GcReport>,
    pub runtime_cache_flushed: bool,
}

impl SwitchReport {
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn failures(&self) -> impl Iterator<Item = (LocationKind, &str)> {
        self.locations
            .iter()
            .filter_map(|report| match &report.outcome {
                LocationOutcome::Failed { reason } => Some((report.location, reason.as_str())),
                _ => None,
            })
    }

    pub fn location(&self, location: LocationKind) -> Option<&LocationReport> {
        self.locations
            .iter()
            .find(|report| report.location == location)
    }
}

/// A switch that also carried user data between modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeSwitch {
    pub previous: Option<String>,
    pub migration: MigrationReport,
    pub report: SwitchReport,
    /// Set when the switch left the previous mode installed and user data was moved back.
    pub rollback: Option<MigrationReport>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeCacheFlush {
    pub removed: usize,
    pub failed: usize,
}

/// Everything needed to bring a game installation to a selected play mode.
pub struct ModeEngine<F, S = ThreadSleeper> {
    layout: GameLayout,
    fetcher: RetryingFetcher<F, S>,
}

impl<F: Fetcher, S: Sleeper> ModeEngine<F, S> {
    pub fn new(layout: GameLayout, fetcher: RetryingFetcher<F, S>) -> Self {
        Self { layout, fetcher }
    }

    pub fn layout(&self) -> &GameLayout {
        &self.layout
    }

    pub fn install_state(&self) -> InstallState {
        InstallState::read(&self.layout)
    }

    pub fn is_available_offline(&self, mode: &PlayMode) -> bool {
        is_available_offline(&self.layout, mode)
    }

    pub fn process_mode_switch(
        &self,
        selected: &PlayMode,
        manifest: &ModeManifest,
    ) -> Result<SwitchReport> {
        self.process_mode_switch_at(selected, manifest, Local::now().naive_local())
    }

    /// Brings both locations to `selected`'s versions, stamping records with `now`.
    ///
    /// Errors are returned only for unmet preconditions, before anything on
    /// disk changes; per-location failures are reported in the result.
    pub fn process_mode_switch_at(
        &self,
        selected: &PlayMode,
        manifest: &ModeManifest,
        now: NaiveDateTime,
    ) -> Result<SwitchReport> {
        self.check_preconditions(selected, manifest)?;

        let state = InstallState::read(&self.layout);
        let flush_runtime_cache = needs_cache_flush(&state, selected);
        let pending = LocationKind::ALL
            .into_iter()
            .filter(|location| needs_update(&state, selected, *location))
            .collect::<Vec<_>>();

        let mut report = SwitchReport {
            mode: selected.name.clone(),
            locations: Vec::with_capacity(LocationKind::ALL.len()),
            gc: None,
            runtime_cache_flushed: false,
        };

        if pending.is_empty() {
            info!(mode = %selected.name, "play mode already installed");
        } else {
            let cleanups = pending
                .iter()
                .map(|location| {
                    clean_obsolete(
                        &self.layout,
                        manifest.other_modes(&selected.name),
                        *location,
                        &manifest.settings,
                    )
                })
                .collect::<Vec<_>>();

            report.gc = match garbage_collect(&self.layout, &manifest.play_modes) {
                Ok(gc) => Some(gc),
                Err(err) => {
                    warn!("artifact cache garbage collection failed: {err:#}");
                    None
                }
            };

            for (location, cleanup) in pending.iter().copied().zip(cleanups) {
                let outcome = self.update_location(selected, location, now);
                report.locations.push(LocationReport {
                    location,
                    version: selected.target_version(location).to_string(),
                    outcome,
                    cleanup: Some(cleanup),
                });
            }
        }

        for location in LocationKind::ALL {
            if !pending.contains(&location) {
                report.locations.push(LocationReport {
                    location,
                    version: selected.target_version(location).to_string(),
                    outcome: LocationOutcome::UpToDate,
                    cleanup: None,
                });
            }
        }
        report.locations.sort_by_key(|entry| entry.location);

        if flush_runtime_cache {
            match self.clear_runtime_cache() {
                Ok(flush) => report.runtime_cache_flushed = flush.failed == 0,
                Err(err) => warn!("failed to clear runtime cache: {err:#}"),
            }
        }

        Ok(report)
    }

    pub fn switch_with_user_data(
        &self,
        selected: &PlayMode,
        manifest: &ModeManifest,
    ) -> Result<ModeSwitch> {
        self.switch_with_user_data_at(selected, manifest, Local::now().naive_local())
    }

    /// Swaps user data to `selected` and then installs it.
    ///
    /// Every artifact the switch needs is fetched before any user data moves;
    /// a fetch failure returns an error with saves untouched. If the install
    /// still fails and the previous mode stays the recorded one, user data is
    /// moved back so live saves always belong to the last used mode.
    pub fn switch_with_user_data_at(
        &self,
        selected: &PlayMode,
        manifest: &ModeManifest,
        now: NaiveDateTime,
    ) -> Result<ModeSwitch> {
        self.check_preconditions(selected, manifest)?;
        self.prefetch_pending(selected)?;

        let previous = last_used_mode(&self.layout);
        let migration = switch_user_data(
            &self.layout,
            &manifest.settings,
            &selected.name,
            previous.as_deref(),
        );

        let revert = || {
            let restored = previous.as_deref().filter(|previous| {
                manifest.settings.backup_user_data && *previous != selected.name
            })?;
            if last_used_mode(&self.layout).as_deref() == Some(restored) {
                warn!(
                    mode = %selected.name,
                    previous = restored,
                    "switch incomplete; restoring user data"
                );
                Some(switch_user_data(
                    &self.layout,
                    &manifest.settings,
                    restored,
                    Some(&selected.name),
                ))
            } else {
                None
            }
        };

        let report = match self.process_mode_switch_at(selected, manifest, now) {
            Ok(report) => report,
            Err(err) => {
                revert();
                return Err(err);
            }
        };
        let rollback = if report.is_success() { None } else { revert() };

        Ok(ModeSwitch {
            previous,
            migration,
            report,
            rollback,
        })
    }

    fn check_preconditions(&self, selected: &PlayMode, manifest: &ModeManifest) -> Result<()> {
        self.layout
            .ensure_roots_exist()
            .context("cannot switch play mode")?;
        if manifest.mode(&selected.name).is_none() {
            return Err(anyhow!(
                "play mode '{}' is not part of the current manifest",
                selected.name
            ));
        }
        Ok(())
    }

    /// Makes sure every artifact an out-of-date location needs is in the cache.
    fn prefetch_pending(&self, selected: &PlayMode) -> Result<()> {
        let state = InstallState::read(&self.layout);
        for location in LocationKind::ALL {
            if !needs_update(&state, selected, location) {
                continue;
            }
            let Some(url) = selected
                .download_url(location)
                .map(str::trim)
                .filter(|url| !url.is_empty())
            else {
                continue;
            };
            let version = selected.target_version(location);
            let lookup = get_or_fetch(
                &self.layout,
                &self.fetcher,
                url,
                version,
                &selected.name,
                location,
            );
            if lookup.path().is_none() {
                return Err(anyhow!(
                    "artifact for '{}' {location} {version} is not available: {url}; no user data was moved",
                    selected.name
                ));
            }
        }
        Ok(())
    }

    fn update_location(
        &self,
        selected: &PlayMode,
        location: LocationKind,
        now: NaiveDateTime,
    ) -> LocationOutcome {
        let version = selected.target_version(location);
        let target_root = self.layout.location_root(location);
        if let Err(err) = ensure_dir(&target_root) {
            return LocationOutcome::Failed {
                reason: format!("{err:#}"),
            };
        }

        let outcome = match download_and_extract(
            &self.layout,
            &self.fetcher,
            selected.download_url(location),
            &target_root,
            version,
            &selected.name,
            location,
        ) {
            Ok(ExtractOutcome::NoContent) => LocationOutcome::RecordedWithoutContent,
            Ok(ExtractOutcome::Installed {
                artifact,
                from_cache,
                ..
            }) => LocationOutcome::Installed {
                artifact,
                from_cache,
            },
            Err(err) => {
                warn!(mode = %selected.name, %location, "update failed: {err:#}");
                return LocationOutcome::Failed {
                    reason: format!("{err:#}"),
                };
            }
        };

        match write_version_record(&self.layout, &selected.name, version, location, now) {
            Ok(path) => {
                info!(mode = %selected.name, %location, version, "recorded {}", path.display());
                outcome
            }
            Err(err) => LocationOutcome::Failed {
                reason: format!("{err:#}"),
            },
        }
    }

    pub fn clear_runtime_cache(&self) -> Result<RuntimeCacheFlush> {
        clear_runtime_cache(&self.layout)
    }
}

/// Empties the game's runtime cache directory, keeping the directory itself.
pub fn clear_runtime_cache(layout: &GameLayout) -> Result<RuntimeCacheFlush> {
    let dir = layout.runtime_cache_dir();
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Ok(RuntimeCacheFlush::default());
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read runtime cache: {}", dir.display()));
        }
    };

    let mut flush = RuntimeCacheFlush::default();
    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(err) => {
                warn!("failed to read runtime cache entry: {err}");
                flush.failed += 1;
                continue;
            }
        };
        match remove_path_if_exists(&path) {
            Ok(_) => flush.removed += 1,
            Err(err) => {
                warn!("failed to remove {}: {err:#}", path.display());
                flush.failed += 1;
            }
        }
    }
    info!(
        removed = flush.removed,
        "cleared runtime cache {}",
        dir.display()
    );
    Ok(flush)
}
