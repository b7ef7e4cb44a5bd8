use playmode_core::{LocationKind, PlayMode, Settings};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::fs_utils::remove_path_if_exists;
use crate::GameLayout;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub disabled: bool,
    pub removed: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// Deletes files and folders owned by `other_modes` from one location.
///
/// Failures are logged per entry and do not stop the pass.
pub fn clean_obsolete<'a>(
    layout: &GameLayout,
    other_modes: impl IntoIterator<Item = &'a PlayMode>,
    location: LocationKind,
    settings: &Settings,
) -> CleanupReport {
    if !settings.cleanup_on_mode_switch {
        return CleanupReport {
            disabled: true,
            ..CleanupReport::default()
        };
    }

    let root = layout.location_root(location);
    let candidates: BTreeSet<PathBuf> = other_modes
        .into_iter()
        .flat_map(|mode| mode.owned_paths_in(location))
        .map(|owned| root.join(&owned.relative))
        .collect();

    let mut report = CleanupReport::default();
    for path in candidates {
        match remove_path_if_exists(&path) {
            Ok(true) => {
                info!("removed {} left by another mode", path.display());
                report.removed.push(path);
            }
            Ok(false) => {}
            Err(err) => {
                warn!("failed to remove {}: {err:#}", path.display());
                report.failed.push(path);
            }
        }
    }
    report
}
