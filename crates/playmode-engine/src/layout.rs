use anyhow::{anyhow, Context, Result};
use playmode_core::{safe_name, LocationKind};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_DLC_SUBDIR: &str = "Assets/DLC";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupRoot {
    ModeSaves,
    ModeUserData,
}

impl BackupRoot {
    pub const ALL: [BackupRoot; 2] = [BackupRoot::ModeSaves, BackupRoot::ModeUserData];

    pub fn dir_name(self) -> &'static str {
        match self {
            Self::ModeSaves => "ModeSaves",
            Self::ModeUserData => "ModeUserData",
        }
    }

    /// Name of the live tree under the documents root this backup mirrors.
    pub fn live_dir_name(self) -> &'static str {
        match self {
            Self::ModeSaves => "Saves",
            Self::ModeUserData => "ModUserData",
        }
    }
}

/// Every on-disk location the engine reads or writes, derived from the two
/// roots of a game installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameLayout {
    game_root: PathBuf,
    documents_root: PathBuf,
    dlc_subdir: PathBuf,
}

impl GameLayout {
    pub fn new(game_root: impl Into<PathBuf>, documents_root: impl Into<PathBuf>) -> Self {
        Self {
            game_root: game_root.into(),
            documents_root: documents_root.into(),
            dlc_subdir: PathBuf::from(DEFAULT_DLC_SUBDIR),
        }
    }

    pub fn with_dlc_subdir(mut self, dlc_subdir: impl Into<PathBuf>) -> Self {
        self.dlc_subdir = dlc_subdir.into();
        self
    }

    pub fn game_root(&self) -> &Path {
        &self.game_root
    }

    pub fn documents_root(&self) -> &Path {
        &self.documents_root
    }

    pub fn dlc_dir(&self) -> PathBuf {
        self.game_root.join(&self.dlc_subdir)
    }

    /// Root that manifest paths and extracted archives for `location` resolve against.
    pub fn location_root(&self, location: LocationKind) -> PathBuf {
        match location {
            LocationKind::Dlc => self.dlc_dir(),
            LocationKind::MyDocuments => self.documents_root.clone(),
        }
    }

    pub fn mod_cache_dir(&self) -> PathBuf {
        self.game_root.join("ModCache")
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.game_root.join("ModStaging")
    }

    pub fn runtime_cache_dir(&self) -> PathBuf {
        self.documents_root.join("cache")
    }

    pub fn version_record_path(&self, location: LocationKind) -> PathBuf {
        match location {
            LocationKind::Dlc => self.game_root.join("version_dlc.json"),
            LocationKind::MyDocuments => self.documents_root.join("version_mydocuments.json"),
        }
    }

    pub fn mode_cache_dir(&self, mode: &str) -> PathBuf {
        self.mod_cache_dir().join(safe_name(mode))
    }

    pub fn cache_path(&self, mode: &str, version: &str, location: LocationKind) -> PathBuf {
        self.mode_cache_dir(mode)
            .join(version)
            .join(location.as_str())
    }

    pub fn live_dir(&self, root: BackupRoot) -> PathBuf {
        self.documents_root.join(root.live_dir_name())
    }

    pub fn backup_root_dir(&self, root: BackupRoot) -> PathBuf {
        self.documents_root.join(root.dir_name())
    }

    pub fn backup_path(&self, root: BackupRoot, mode: &str) -> PathBuf {
        self.backup_root_dir(root).join(safe_name(mode))
    }

    pub fn ensure_roots_exist(&self) -> Result<()> {
        for (label, dir) in [
            ("game root", &self.game_root),
            ("documents root", &self.documents_root),
        ] {
            if !dir.is_dir() {
                return Err(anyhow!("{label} does not exist: {}", dir.display()));
            }
        }
        Ok(())
    }
}

pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))
}
