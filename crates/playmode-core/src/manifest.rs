use std::collections::HashSet;

use anyhow::{anyhow, Context};
use serde::Deserialize;

use crate::archive::{artifact_file_name, ArchiveType};
use crate::mode::{
    safe_name, LocationKind, OnlineVersion, OwnedPath, OwnedPathKind, PlayMode, Settings,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeManifest {
    pub play_modes: Vec<PlayMode>,
    pub settings: Settings,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(rename = "PlayModes")]
    play_modes: Vec<RawPlayMode>,
    #[serde(rename = "Settings", default)]
    settings: Settings,
}

#[derive(Debug, Deserialize)]
struct RawPlayMode {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "MultiplayerCompatible", default)]
    multiplayer_compatible: bool,
    #[serde(rename = "OnlineVersion")]
    online_version: OnlineVersion,
    #[serde(rename = "Files", default)]
    files: Vec<String>,
    #[serde(rename = "Folders", default)]
    folders: Vec<String>,
    #[serde(rename = "DLCDownload", default)]
    dlc_download: Option<String>,
    #[serde(rename = "DocsDownload", default)]
    docs_download: Option<String>,
}

impl ModeManifest {
    pub fn from_json_str(input: &str) -> anyhow::Result<Self> {
        let raw: RawManifest =
            serde_json::from_str(input).context("failed to parse play mode manifest")?;

        let mut seen_names = HashSet::new();
        let mut seen_safe_names = HashSet::new();
        let mut play_modes = Vec::with_capacity(raw.play_modes.len());
        for mode in raw.play_modes {
            let name = mode.name.trim().to_string();
            if name.is_empty() {
                return Err(anyhow!("play mode name must not be empty"));
            }
            if !seen_names.insert(name.clone()) {
                return Err(anyhow!("duplicate play mode '{name}'"));
            }
            if !seen_safe_names.insert(safe_name(&name)) {
                return Err(anyhow!(
                    "play mode '{name}' collides with another mode once sanitized for the file system"
                ));
            }
            for location in LocationKind::ALL {
                validate_version(mode.online_version.for_location(location)).with_context(
                    || format!("invalid {location} version for play mode '{name}'"),
                )?;
            }

            let mut owned_paths = Vec::with_capacity(mode.files.len() + mode.folders.len());
            for (entries, kind) in [
                (&mode.files, OwnedPathKind::File),
                (&mode.folders, OwnedPathKind::Folder),
            ] {
                for entry in entries {
                    let owned = parse_owned_path(entry, kind).with_context(|| {
                        format!("invalid owned path '{entry}' for play mode '{name}'")
                    })?;
                    owned_paths.push(owned);
                }
            }

            let dlc_download = normalize_download(mode.dlc_download)
                .map(|url| validate_download_url(&url).map(|_| url))
                .transpose()
                .with_context(|| format!("invalid DLCDownload for play mode '{name}'"))?;
            let docs_download = normalize_download(mode.docs_download)
                .map(|url| validate_download_url(&url).map(|_| url))
                .transpose()
                .with_context(|| format!("invalid DocsDownload for play mode '{name}'"))?;

            play_modes.push(PlayMode {
                name,
                multiplayer_compatible: mode.multiplayer_compatible,
                online_version: mode.online_version,
                owned_paths,
                dlc_download,
                docs_download,
            });
        }

        Ok(Self {
            play_modes,
            settings: raw.settings,
        })
    }

    pub fn mode(&self, name: &str) -> Option<&PlayMode> {
        self.play_modes.iter().find(|mode| mode.name == name)
    }

    pub fn other_modes<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a PlayMode> + 'a {
        self.play_modes.iter().filter(move |mode| mode.name != name)
    }
}

fn validate_version(version: &str) -> anyhow::Result<()> {
    let trimmed = version.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("version must not be empty"));
    }
    if trimmed != safe_name(trimmed) {
        return Err(anyhow!(
            "version '{version}' contains characters that are not valid in a directory name"
        ));
    }
    Ok(())
}

fn parse_owned_path(entry: &str, kind: OwnedPathKind) -> anyhow::Result<OwnedPath> {
    let Some((location, rest)) = LocationKind::split_manifest_path(entry) else {
        return Err(anyhow!("path must start with 'DLC/' or 'MyDocuments/'"));
    };

    let mut segments = Vec::new();
    for segment in rest.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => return Err(anyhow!("path must not contain '..'")),
            _ if segment.contains(':') => {
                return Err(anyhow!("path must be relative to its location root"))
            }
            _ => segments.push(segment),
        }
    }
    if segments.is_empty() {
        return Err(anyhow!("path must name an entry below its location root"));
    }

    Ok(OwnedPath {
        location,
        relative: segments.join("/"),
        kind,
    })
}

fn normalize_download(url: Option<String>) -> Option<String> {
    url.map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
}

fn validate_download_url(url: &str) -> anyhow::Result<()> {
    let lower = url.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return Err(anyhow!("download URL must use http or https: {url}"));
    }
    let Some(file_name) = artifact_file_name(url) else {
        return Err(anyhow!("download URL does not name a file: {url}"));
    };
    if ArchiveType::infer_from_file_name(file_name).is_none() {
        return Err(anyhow!(
            "unsupported archive '{file_name}'; supported: zip, tar.gz"
        ));
    }
    Ok(())
}
