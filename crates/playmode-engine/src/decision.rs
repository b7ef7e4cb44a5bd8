use playmode_core::{LocationKind, PlayMode, VersionRecord};

use crate::install_state::InstallState;

fn record_matches(
    record: Option<&VersionRecord>,
    target: &PlayMode,
    location: LocationKind,
) -> bool {
    record.is_some_and(|record| {
        record.mode == target.name && record.version == target.target_version(location)
    })
}

pub fn needs_update(state: &InstallState, target: &PlayMode, location: LocationKind) -> bool {
    !record_matches(state.record(location), target, location)
}

/// Any mismatch in either location invalidates the game's runtime cache.
pub fn needs_cache_flush(state: &InstallState, target: &PlayMode) -> bool {
    LocationKind::ALL
        .into_iter()
        .any(|location| !record_matches(state.record(location), target, location))
}
