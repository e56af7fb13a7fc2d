//! Environment configuration for endpoints, retry pacing and HTTP timeouts.
//!
//! The CLI surface only takes a book id and an output folder; everything else
//! comes from `NLI_*` environment variables so a mirror or a mock archive can
//! be targeted without new flags.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use nli_downloader_core::{
    BookDownloaderOptions, DEFAULT_DOWNLOAD_BASE_URL, DEFAULT_MANIFEST_BASE_URL, RetryPolicy,
};

pub(crate) const MANIFEST_URL_VAR: &str = "NLI_MANIFEST_URL";
pub(crate) const DOWNLOAD_URL_VAR: &str = "NLI_DOWNLOAD_URL";
pub(crate) const RETRY_DELAY_MS_VAR: &str = "NLI_RETRY_DELAY_MS";
pub(crate) const CONNECT_TIMEOUT_SECS_VAR: &str = "NLI_CONNECT_TIMEOUT_SECS";
pub(crate) const READ_TIMEOUT_SECS_VAR: &str = "NLI_READ_TIMEOUT_SECS";

const MAX_RETRY_DELAY_MS: u64 = 60_000;

/// Values read from the environment, already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EnvConfig {
    pub manifest_base_url: String,
    pub download_base_url: String,
    pub retry_delay: Duration,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl EnvConfig {
    pub(crate) fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads every variable through `lookup`. Unset and blank values use the defaults.
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let defaults = BookDownloaderOptions::default();

        let manifest_base_url = match read(MANIFEST_URL_VAR) {
            Some(value) => validate_base_url(MANIFEST_URL_VAR, value)?,
            None => DEFAULT_MANIFEST_BASE_URL.to_string(),
        };
        let download_base_url = match read(DOWNLOAD_URL_VAR) {
            Some(value) => validate_base_url(DOWNLOAD_URL_VAR, value)?,
            None => DEFAULT_DOWNLOAD_BASE_URL.to_string(),
        };

        let retry_delay_ms = match read(RETRY_DELAY_MS_VAR) {
            Some(value) => parse_u64(RETRY_DELAY_MS_VAR, &value)?,
            None => 0,
        };
        if retry_delay_ms > MAX_RETRY_DELAY_MS {
            bail!(
                "Invalid value for `{RETRY_DELAY_MS_VAR}`: {retry_delay_ms}. Expected range: 0..={MAX_RETRY_DELAY_MS}"
            );
        }

        let connect_timeout_secs = match read(CONNECT_TIMEOUT_SECS_VAR) {
            Some(value) => validate_timeout_secs(CONNECT_TIMEOUT_SECS_VAR, &value)?,
            None => defaults.connect_timeout_secs,
        };
        let read_timeout_secs = match read(READ_TIMEOUT_SECS_VAR) {
            Some(value) => validate_timeout_secs(READ_TIMEOUT_SECS_VAR, &value)?,
            None => defaults.read_timeout_secs,
        };

        Ok(Self {
            manifest_base_url,
            download_base_url,
            retry_delay: Duration::from_millis(retry_delay_ms),
            connect_timeout_secs,
            read_timeout_secs,
        })
    }

    pub(crate) fn into_options(self, show_progress: bool) -> BookDownloaderOptions {
        let defaults = BookDownloaderOptions::default();
        BookDownloaderOptions {
            manifest_base_url: self.manifest_base_url,
            download_base_url: self.download_base_url,
            retry_policy: RetryPolicy::with_max_attempts(defaults.retry_policy.max_attempts())
                .with_delay(self.retry_delay),
            connect_timeout_secs: self.connect_timeout_secs,
            read_timeout_secs: self.read_timeout_secs,
            show_progress,
            ..defaults
        }
    }
}

fn validate_base_url(key: &str, value: String) -> Result<String> {
    let parsed = url::Url::parse(&value)
        .with_context(|| format!("Invalid value for `{key}`: {value:?} is not a valid URL"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!(
            "Invalid value for `{key}`: {value:?}. Expected an http or https URL, got scheme `{}`",
            parsed.scheme()
        );
    }
    // Ids are appended verbatim, so keep the caller's exact text rather than the normalized URL.
    Ok(value)
}

fn parse_u64(key: &str, value: &str) -> Result<u64> {
    value
        .parse::<u64>()
        .with_context(|| format!("Invalid value for `{key}`: {value:?}. Expected a whole number"))
}

fn validate_timeout_secs(key: &str, value: &str) -> Result<u64> {
    let secs = parse_u64(key, value)?;
    if !(1..=3600).contains(&secs) {
        bail!("Invalid value for `{key}`: {secs}. Expected range: 1..=3600");
    }
    Ok(secs)
}
