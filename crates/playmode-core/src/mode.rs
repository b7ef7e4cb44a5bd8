use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the two independently versioned install targets of a game.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LocationKind {
    #[serde(rename = "DLC")]
    Dlc,
    #[serde(rename = "MyDocuments")]
    MyDocuments,
}

impl LocationKind {
    pub const ALL: [LocationKind; 2] = [LocationKind::Dlc, LocationKind::MyDocuments];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dlc => "DLC",
            Self::MyDocuments => "MyDocuments",
        }
    }

    /// Splits a manifest path such as `DLC/UI_bc1` into its location and the
    /// remainder relative to that location's root.
    pub fn split_manifest_path(path: &str) -> Option<(Self, &str)> {
        let normalized = path.trim_start_matches(['/', '\\']);
        let (head, rest) = normalized.split_once(['/', '\\'])?;
        let location = if head.eq_ignore_ascii_case("DLC") {
            Self::Dlc
        } else if head.eq_ignore_ascii_case("MyDocuments") {
            Self::MyDocuments
        } else {
            return None;
        };
        Some((location, rest))
    }
}

impl fmt::Display for LocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OnlineVersion {
    #[serde(rename = "DLC")]
    pub dlc: String,
    #[serde(rename = "MyDocuments")]
    pub my_documents: String,
}

impl OnlineVersion {
    pub fn for_location(&self, location: LocationKind) -> &str {
        match location {
            LocationKind::Dlc => &self.dlc,
            LocationKind::MyDocuments => &self.my_documents,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnedPathKind {
    File,
    Folder,
}

/// A file or folder a mode owns, already routed to its install location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedPath {
    pub location: LocationKind,
    pub relative: String,
    pub kind: OwnedPathKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayMode {
    pub name: String,
    pub multiplayer_compatible: bool,
    pub online_version: OnlineVersion,
    pub owned_paths: Vec<OwnedPath>,
    pub dlc_download: Option<String>,
    pub docs_download: Option<String>,
}

impl PlayMode {
    pub fn target_version(&self, location: LocationKind) -> &str {
        self.online_version.for_location(location)
    }

    pub fn download_url(&self, location: LocationKind) -> Option<&str> {
        match location {
            LocationKind::Dlc => self.dlc_download.as_deref(),
            LocationKind::MyDocuments => self.docs_download.as_deref(),
        }
    }

    pub fn owned_paths_in(&self, location: LocationKind) -> impl Iterator<Item = &OwnedPath> {
        self.owned_paths
            .iter()
            .filter(move |owned| owned.location == location)
    }

    pub fn safe_name(&self) -> String {
        safe_name(&self.name)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    #[serde(rename = "BackupUserData", default)]
    pub backup_user_data: bool,
    #[serde(rename = "CleanupOnModeSwitch", default)]
    pub cleanup_on_mode_switch: bool,
}

/// Maps a mode name to a string usable as a single path component on every
/// platform the game ships on.
pub fn safe_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|ch| match ch {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        })
        .collect();

    // Windows silently drops trailing dots and spaces.
    let trimmed_len = out.trim_end_matches(['.', ' ']).len();
    if trimmed_len < out.len() {
        let replaced = "_".repeat(out.len() - trimmed_len);
        out.truncate(trimmed_len);
        out.push_str(&replaced);
    }

    if out.is_empty() {
        return "_".to_string();
    }
    out
}
