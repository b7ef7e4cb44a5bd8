use playmode_core::Settings;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::fs_utils::{
    collect_relative_files, contains_any_file, copy_file, move_file, prune_empty_dirs,
};
use crate::layout::BackupRoot;
use crate::GameLayout;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub backed_up: usize,
    pub restored: usize,
    pub failed: Vec<PathBuf>,
}

impl MigrationReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    fn merge(&mut self, other: MigrationReport) {
        self.backed_up += other.backed_up;
        self.restored += other.restored;
        self.failed.extend(other.failed);
    }
}

/// Moves the live save and user-data trees into `mode`'s backup sets.
///
/// A tree without any file is left alone so no empty backup set appears.
pub fn deactivate(layout: &GameLayout, mode: &str) -> MigrationReport {
    let mut report = MigrationReport::default();
    for root in BackupRoot::ALL {
        let live = layout.live_dir(root);
        let backup = layout.backup_path(root, mode);
        match contains_any_file(&live) {
            Ok(true) => {}
            Ok(false) => {
                debug!("nothing to back up in {}", live.display());
                continue;
            }
            Err(err) => {
                warn!("failed to inspect {}: {err:#}", live.display());
                report.failed.push(live);
                continue;
            }
        }

        report.merge(transfer_tree(&live, &backup, Transfer::Move));
        if let Err(err) = prune_empty_dirs(&live) {
            warn!("failed to prune {}: {err:#}", live.display());
        }
        info!(
            mode,
            "backed up {} into {}",
            root.live_dir_name(),
            backup.display()
        );
    }
    report
}

/// Copies `mode`'s backup sets into the live trees; the backup sets are kept.
pub fn activate(layout: &GameLayout, mode: &str) -> MigrationReport {
    let mut report = MigrationReport::default();
    for root in BackupRoot::ALL {
        let backup = layout.backup_path(root, mode);
        if !backup.is_dir() {
            debug!("no {} backup for {mode}", root.live_dir_name());
            continue;
        }
        let live = layout.live_dir(root);
        report.merge(transfer_tree(&backup, &live, Transfer::Copy));
        info!(
            mode,
            "restored {} from {}",
            root.live_dir_name(),
            backup.display()
        );
    }
    report
}

/// Swaps user data from `previous` to `current` when the mode identity changed.
pub fn switch_user_data(
    layout: &GameLayout,
    settings: &Settings,
    current: &str,
    previous: Option<&str>,
) -> MigrationReport {
    if !settings.backup_user_data {
        return MigrationReport::default();
    }
    let Some(previous) = previous.filter(|previous| !previous.is_empty()) else {
        return MigrationReport::default();
    };
    if previous == current {
        return MigrationReport::default();
    }

    let mut report = deactivate(layout, previous);
    report.merge(activate(layout, current));
    report
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transfer {
    Move,
    Copy,
}

fn transfer_tree(src_root: &Path, dst_root: &Path, transfer: Transfer) -> MigrationReport {
    let mut report = MigrationReport::default();
    let files = match collect_relative_files(src_root) {
        Ok(files) => files,
        Err(err) => {
            warn!("failed to list {}: {err:#}", src_root.display());
            report.failed.push(src_root.to_path_buf());
            return report;
        }
    };

    for relative in files {
        let src = src_root.join(&relative);
        let dst = dst_root.join(&relative);
        let result = match transfer {
            Transfer::Move => move_file(&src, &dst),
            Transfer::Copy => copy_file(&src, &dst),
        };
        match result {
            Ok(()) => match transfer {
                Transfer::Move => report.backed_up += 1,
                Transfer::Copy => report.restored += 1,
            },
            Err(err) => {
                warn!("{err:#}");
                report.failed.push(src);
            }
        }
    }
    report
}
