use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use playmode_core::{LocationKind, VersionRecord};
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::GameLayout;

/// Installed records for both locations, read together at the start of a switch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallState {
    pub dlc: Option<VersionRecord>,
    pub my_documents: Option<VersionRecord>,
}

impl InstallState {
    pub fn read(layout: &GameLayout) -> Self {
        Self {
            dlc: read_version_record(layout, LocationKind::Dlc),
            my_documents: read_version_record(layout, LocationKind::MyDocuments),
        }
    }

    pub fn record(&self, location: LocationKind) -> Option<&VersionRecord> {
        match location {
            LocationKind::Dlc => self.dlc.as_ref(),
            LocationKind::MyDocuments => self.my_documents.as_ref(),
        }
    }

    pub fn last_used_mode(&self) -> Option<&str> {
        self.my_documents
            .as_ref()
            .or(self.dlc.as_ref())
            .map(|record| record.mode.as_str())
    }
}

/// Missing and unreadable records both mean "nothing installed here".
pub fn read_version_record(layout: &GameLayout, location: LocationKind) -> Option<VersionRecord> {
    let path = layout.version_record_path(location);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!("no {location} version record at {}", path.display());
            return None;
        }
        Err(err) => {
            warn!("failed to read version record {}: {err}", path.display());
            return None;
        }
    };

    match VersionRecord::from_json_str(raw.trim_start_matches('\u{feff}')) {
        Ok(record) if record.location == location => Some(record),
        Ok(record) => {
            warn!(
                "version record {} describes location {}, expected {location}; ignoring it",
                path.display(),
                record.location
            );
            None
        }
        Err(err) => {
            warn!("ignoring corrupt version record {}: {err:#}", path.display());
            None
        }
    }
}

pub fn write_version_record(
    layout: &GameLayout,
    mode: &str,
    version: &str,
    location: LocationKind,
    last_run: NaiveDateTime,
) -> Result<PathBuf> {
    let record = VersionRecord {
        mode: mode.to_string(),
        version: version.to_string(),
        last_run,
        location,
    };
    let payload = record.to_json_string()?;

    let path = layout.version_record_path(location);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, payload.as_bytes())
        .with_context(|| format!("failed to write version record: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, &path)
        .with_context(|| format!("failed to replace version record: {}", path.display()))?;
    Ok(path)
}

pub fn last_used_mode(layout: &GameLayout) -> Option<String> {
    InstallState::read(layout).last_used_mode().map(str::to_string)
}
