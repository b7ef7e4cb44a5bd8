use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use playmode_core::{ModeManifest, PlayMode};
use reqwest::blocking::Client;

const MANIFEST_USER_AGENT: &str = concat!("playmode/", env!("CARGO_PKG_VERSION"));
const MANIFEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the play-mode manifest is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ManifestSource {
    Url(String),
    File(PathBuf),
}

impl ManifestSource {
    pub(crate) fn parse(value: &str) -> Self {
        let lower = value.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Url(value.to_string())
        } else {
            Self::File(PathBuf::from(value))
        }
    }
}

impl fmt::Display for ManifestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

pub(crate) fn load_manifest(source: &ManifestSource) -> Result<ModeManifest> {
    let raw = match source {
        ManifestSource::File(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?,
        ManifestSource::Url(url) => fetch_manifest_text(url)?,
    };
    ModeManifest::from_json_str(raw.trim_start_matches('\u{feff}'))
        .with_context(|| format!("invalid play-mode manifest: {source}"))
}

fn fetch_manifest_text(url: &str) -> Result<String> {
    let client = Client::builder()
        .user_agent(MANIFEST_USER_AGENT)
        .timeout(MANIFEST_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;
    client
        .get(url)
        .send()
        .with_context(|| format!("failed to request manifest: {url}"))?
        .error_for_status()
        .with_context(|| format!("server rejected manifest request: {url}"))?
        .text()
        .with_context(|| format!("failed to read manifest body: {url}"))
}

/// Looks a mode up by exact name, falling back to a unique case-insensitive match.
pub(crate) fn find_mode<'a>(manifest: &'a ModeManifest, name: &str) -> Result<&'a PlayMode> {
    if let Some(mode) = manifest.mode(name) {
        return Ok(mode);
    }

    let mut matches = manifest
        .play_modes
        .iter()
        .filter(|mode| mode.name.eq_ignore_ascii_case(name));
    match (matches.next(), matches.next()) {
        (Some(mode), None) => Ok(mode),
        _ => {
            let known = manifest
                .play_modes
                .iter()
                .map(|mode| mode.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            Err(anyhow!("unknown play mode '{name}'; available: {known}"))
        }
    }
}
