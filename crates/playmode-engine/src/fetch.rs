use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::fs_utils::remove_file_if_exists;

const USER_AGENT: &str = concat!("playmode/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const READ_CHUNK_BYTES: usize = 64 * 1024;

/// A single download attempt of `url` into `destination`.
pub trait Fetcher {
    fn fetch(&self, url: &str, destination: &Path) -> Result<()>;
}

impl<F> Fetcher for F
where
    F: Fn(&str, &Path) -> Result<()>,
{
    fn fetch(&self, url: &str, destination: &Path) -> Result<()> {
        self(url, destination)
    }
}

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

impl<F> Sleeper for F
where
    F: Fn(Duration),
{
    fn sleep(&self, duration: Duration) {
        self(duration)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl FetchPolicy {
    /// Linear backoff: the wait after failed attempt `n` is `base_delay * n`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

pub struct RetryingFetcher<F, S = ThreadSleeper> {
    fetcher: F,
    sleeper: S,
    policy: FetchPolicy,
}

impl<F: Fetcher> RetryingFetcher<F> {
    pub fn new(fetcher: F, policy: FetchPolicy) -> Self {
        Self::with_sleeper(fetcher, ThreadSleeper, policy)
    }
}

impl<F: Fetcher, S: Sleeper> RetryingFetcher<F, S> {
    pub fn with_sleeper(fetcher: F, sleeper: S, policy: FetchPolicy) -> Self {
        Self {
            fetcher,
            sleeper,
            policy,
        }
    }

    pub fn policy(&self) -> FetchPolicy {
        self.policy
    }

    /// Downloads `url` to `destination`, retrying failed attempts.
    ///
    /// On error nothing is left at `destination`; on success it holds the
    /// complete download.
    pub fn fetch_with_retry(&self, url: &str, destination: &Path) -> Result<()> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            debug!(url, attempt, max_attempts, "downloading artifact");
            let result = self.fetcher.fetch(url, destination).and_then(|_| {
                if destination.is_file() {
                    Ok(())
                } else {
                    Err(anyhow!(
                        "download finished without producing {}",
                        destination.display()
                    ))
                }
            });

            match result {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(url, attempt, max_attempts, "download attempt failed: {err:#}");
                    discard_partial(destination);
                    last_error = Some(err);
                }
            }

            if attempt < max_attempts {
                let delay = self.policy.delay_after(attempt);
                debug!(url, ?delay, "waiting before retrying download");
                self.sleeper.sleep(delay);
            }
        }

        discard_partial(destination);
        let err = last_error.unwrap_or_else(|| anyhow!("no download attempt was made"));
        Err(err.context(format!(
            "failed to download {url} after {max_attempts} attempt(s)"
        )))
    }
}

fn discard_partial(destination: &Path) {
    for path in [destination.to_path_buf(), part_path_for(destination)] {
        if let Err(err) = remove_file_if_exists(&path) {
            warn!("failed to remove partial download {}: {err}", path.display());
        }
    }
}

pub(crate) fn part_path_for(destination: &Path) -> PathBuf {
    destination.with_file_name(format!(
        "{}.part",
        destination
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or("artifact")
    ))
}

type ProgressCallback = Box<dyn Fn(&str, u64, Option<u64>)>;

/// Streams a URL over HTTP into a `.part` sibling and renames it into place.
pub struct HttpFetcher {
    client: Client,
    progress: Option<ProgressCallback>,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(None::<Duration>)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            progress: None,
        })
    }

    /// Reports `(url, downloaded_bytes, total_bytes)` as data arrives.
    pub fn with_progress(mut self, progress: impl Fn(&str, u64, Option<u64>) + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    fn download_to(&self, url: &str, out_path: &Path) -> Result<()> {
        let mut response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("request failed: {url}"))?
            .error_for_status()
            .with_context(|| format!("server rejected request: {url}"))?;
        let total = response.content_length();

        let mut file = fs::File::create(out_path)
            .with_context(|| format!("failed to create {}", out_path.display()))?;
        let mut buffer = vec![0_u8; READ_CHUNK_BYTES];
        let mut downloaded = 0_u64;
        self.report(url, downloaded, total);
        loop {
            let read = response
                .read(&mut buffer)
                .with_context(|| format!("failed reading response body: {url}"))?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read])
                .with_context(|| format!("failed to write {}", out_path.display()))?;
            downloaded += read as u64;
            self.report(url, downloaded, total);
        }
        file.flush()
            .with_context(|| format!("failed to flush {}", out_path.display()))?;

        match total {
            Some(expected) if expected != downloaded => Err(anyhow!(
                "download of {url} ended early: received {downloaded} of {expected} bytes"
            )),
            _ => Ok(()),
        }
    }

    fn report(&self, url: &str, downloaded: u64, total: Option<u64>) {
        if let Some(progress) = &self.progress {
            progress(url, downloaded, total);
        }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, destination: &Path) -> Result<()> {
        let part_path = part_path_for(destination);
        if let Err(err) = self.download_to(url, &part_path) {
            let _ = fs::remove_file(&part_path);
            return Err(err);
        }

        remove_file_if_exists(destination)
            .with_context(|| format!("failed to replace {}", destination.display()))?;
        fs::rename(&part_path, destination).with_context(|| {
            format!(
                "failed to move downloaded artifact into place: {}",
                destination.display()
            )
        })
    }
}
