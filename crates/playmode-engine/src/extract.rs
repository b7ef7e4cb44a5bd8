use anyhow::{anyhow, Context, Result};
use flate2::read::GzDecoder;
use playmode_core::{ArchiveType, LocationKind};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::cache::{get_or_fetch, CacheLookup};
use crate::fetch::{Fetcher, RetryingFetcher, Sleeper};
use crate::fs_utils::{move_dir_or_copy, remove_path_if_exists};
use crate::layout::BackupRoot;
use crate::GameLayout;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// The mode ships nothing for this location.
    NoContent,
    Installed {
        artifact: PathBuf,
        from_cache: bool,
        entries: Vec<String>,
        /// Live save or user-data trees the archive replaced.
        replaced_user_data: Vec<PathBuf>,
    },
}

/// Places a mode's artifact for one location into `target_root`.
///
/// The archive is unpacked into a private staging directory first; the live
/// target is only touched once extraction has fully succeeded. Each top-level
/// entry then replaces its same-named counterpart in the target.
pub fn download_and_extract<F: Fetcher, S: Sleeper>(
    layout: &GameLayout,
    fetcher: &RetryingFetcher<F, S>,
    url: Option<&str>,
    target_root: &Path,
    version: &str,
    mode: &str,
    location: LocationKind,
) -> Result<ExtractOutcome> {
    let Some(url) = url.map(str::trim).filter(|url| !url.is_empty()) else {
        return Ok(ExtractOutcome::NoContent);
    };

    let lookup = get_or_fetch(layout, fetcher, url, version, mode, location);
    let from_cache = matches!(lookup, CacheLookup::Hit(_));
    let Some(artifact) = lookup.path().map(Path::to_path_buf) else {
        return Err(anyhow!(
            "artifact for '{mode}' {location} {version} is not available: {url}"
        ));
    };

    let file_name = artifact
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let archive_type = ArchiveType::infer_from_file_name(file_name)
        .ok_or_else(|| anyhow!("unsupported archive type for artifact '{file_name}'"))?;

    let user_data_dirs = BackupRoot::ALL.map(|root| layout.live_dir(root));
    let staging = make_staging_dir(layout, "extract")?;
    let result = stage_and_merge(
        &artifact,
        archive_type,
        &staging,
        target_root,
        &user_data_dirs,
    );
    if let Err(err) = fs::remove_dir_all(&staging) {
        warn!("failed to remove staging dir {}: {err}", staging.display());
    }

    let merged = result.with_context(|| {
        format!(
            "failed to install '{mode}' {location} content into {}",
            target_root.display()
        )
    })?;
    Ok(ExtractOutcome::Installed {
        artifact,
        from_cache,
        entries: merged.names,
        replaced_user_data: merged.replaced_user_data,
    })
}

struct MergedEntries {
    names: Vec<String>,
    replaced_user_data: Vec<PathBuf>,
}

fn stage_and_merge(
    artifact: &Path,
    archive_type: ArchiveType,
    staging: &Path,
    target_root: &Path,
    user_data_dirs: &[PathBuf],
) -> Result<MergedEntries> {
    let raw_dir = staging.join("raw");
    let replaced_dir = staging.join("replaced");
    for dir in [&raw_dir, &replaced_dir] {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }

    extract_archive(artifact, &raw_dir, archive_type)?;
    merge_staged_entries(&raw_dir, target_root, &replaced_dir, user_data_dirs)
}

fn make_staging_dir(layout: &GameLayout, prefix: &str) -> Result<PathBuf> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system time is before unix epoch")?
        .as_nanos();
    let mut dir = layout.staging_dir();
    dir.push(format!("{}-{}-{}", prefix, std::process::id(), nanos));
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed creating staging dir: {}", dir.display()))?;
    Ok(dir)
}

pub(crate) fn extract_archive(
    archive_path: &Path,
    dst: &Path,
    archive_type: ArchiveType,
) -> Result<()> {
    match archive_type {
        ArchiveType::Zip => extract_zip(archive_path, dst),
        ArchiveType::TarGz => extract_tar_gz(archive_path, dst),
    }
}

fn extract_zip(archive_path: &Path, dst: &Path) -> Result<()> {
    let file = fs::File::open(archive_path)
        .with_context(|| format!("failed to open zip archive: {}", archive_path.display()))?;
    let mut archive = zip::ZipArchive::new(io::BufReader::new(file))
        .with_context(|| format!("failed to read zip archive: {}", archive_path.display()))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .with_context(|| format!("failed to read zip entry #{index}"))?;
        let Some(relative) = entry.enclosed_name() else {
            warn!("skipping zip entry outside extraction root: {}", entry.name());
            continue;
        };
        let out_path = dst.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .with_context(|| format!("failed to create {}", out_path.display()))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut out_file = fs::File::create(&out_path)
            .with_context(|| format!("failed to create {}", out_path.display()))?;
        io::copy(&mut entry, &mut out_file)
            .with_context(|| format!("failed to extract {}", out_path.display()))?;
    }
    Ok(())
}

fn extract_tar_gz(archive_path: &Path, dst: &Path) -> Result<()> {
    let file = fs::File::open(archive_path)
        .with_context(|| format!("failed to open tar archive: {}", archive_path.display()))?;
    tar::Archive::new(GzDecoder::new(file))
        .unpack(dst)
        .with_context(|| format!("failed to extract tar archive: {}", archive_path.display()))
}

/// Moves every top-level staged entry into `target_root`.
///
/// An existing entry is first moved into `replaced_dir` so it can be put back
/// if the new entry fails to land; the merge is atomic per entry, not across
/// entries.
fn merge_staged_entries(
    staged_root: &Path,
    target_root: &Path,
    replaced_dir: &Path,
    user_data_dirs: &[PathBuf],
) -> Result<MergedEntries> {
    fs::create_dir_all(target_root)
        .with_context(|| format!("failed to create {}", target_root.display()))?;

    let mut staged = fs::read_dir(staged_root)
        .with_context(|| format!("failed to read {}", staged_root.display()))?
        .collect::<io::Result<Vec<_>>>()
        .with_context(|| format!("failed to read {}", staged_root.display()))?;
    staged.sort_by_key(|entry| entry.file_name());
    if staged.is_empty() {
        return Err(anyhow!("archive contained no entries"));
    }

    let mut merged = MergedEntries {
        names: Vec::with_capacity(staged.len()),
        replaced_user_data: Vec::new(),
    };
    for entry in staged {
        let name = entry.file_name();
        let src = entry.path();
        let dst = target_root.join(&name);
        let aside = replaced_dir.join(&name);

        let had_existing = fs::symlink_metadata(&dst).is_ok();
        if had_existing {
            move_dir_or_copy(&dst, &aside)
                .with_context(|| format!("failed to move aside {}", dst.display()))?;
        }

        if let Err(err) = move_dir_or_copy(&src, &dst) {
            if had_existing {
                restore_replaced(&aside, &dst);
            }
            return Err(err).with_context(|| format!("failed to install {}", dst.display()));
        }

        if had_existing && user_data_dirs.contains(&dst) {
            warn!(
                "archive replaced live user data at {}; earlier files remain in the mode's backup set",
                dst.display()
            );
            merged.replaced_user_data.push(dst.clone());
        }
        debug!("installed {}", dst.display());
        merged.names.push(name.to_string_lossy().into_owned());
    }
    Ok(merged)
}

fn restore_replaced(aside: &Path, dst: &Path) {
    if let Err(err) = remove_path_if_exists(dst) {
        warn!("failed to clear partial entry {}: {err:#}", dst.display());
        return;
    }
    if let Err(err) = move_dir_or_copy(aside, dst) {
        warn!(
            "failed to restore previous {} from {}: {err:#}",
            dst.display(),
            aside.display()
        );
    }
}
