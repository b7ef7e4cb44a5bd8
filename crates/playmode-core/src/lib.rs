mod archive;
mod manifest;
mod mode;
mod record;

pub use archive::{artifact_file_name, ArchiveType};
pub use manifest::ModeManifest;
pub use mode::{
    safe_name, LocationKind, OnlineVersion, OwnedPath, OwnedPathKind, PlayMode, Settings,
};
pub use record::{VersionRecord, LAST_RUN_FORMAT};

#[cfg(test)]
mod tests;
