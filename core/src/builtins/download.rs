use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use md5::Md5;
use reqwest::blocking::Client;
use reqwest::header::{IF_MODIFIED_SINCE, LAST_MODIFIED};
use reqwest::StatusCode;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use std::time::SystemTime;
use tar::{Archive, EntryType};

use crate::config::HttpSettings;
use crate::error::{BuildError, Result};
use crate::logger::Logger;

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Extracted,
    NotModified,
}

/// Fetches tar archives and unpacks them into a target directory.
pub struct Downloader {
    client: Client,
    logger: Logger,
}

impl Downloader {
    pub fn new(settings: &HttpSettings, logger: Logger) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .user_agent(settings.user_agent.as_str())
            .build()?;
        Ok(Self { client, logger })
    }

    /// Downloads `url` into `dir` unless the server reports that it has not
    /// changed since the directory was last written. `checksum` is `md5:<hex>`
    /// or `sha256:<hex>` over the raw response body.
    pub fn download(&self, dir: &Path, url: &str, checksum: Option<&str>) -> Result<DownloadOutcome> {
        let gzipped = url.ends_with(".tar.gz") || url.ends_with(".tgz");
        if !gzipped && !url.ends_with(".tar") {
            return Err(BuildError::UnsupportedArchiveFormat(url.to_string()));
        }

        self.logger.verbose(&format!("Downloading {}", url));

        let mut request = self.client.get(url);
        if let Ok(modified) = fs::metadata(dir).and_then(|m| m.modified()) {
            let since: DateTime<Utc> = modified.into();
            request = request.header(IF_MODIFIED_SINCE, since.format(HTTP_DATE).to_string());
        }

        let response = request.send()?;
        let status = response.status();

        if status == StatusCode::NOT_MODIFIED {
            self.logger
                .verbose(&format!("{} unmodified, skipping download", url));
            return Ok(DownloadOutcome::NotModified);
        }
        if !status.is_success() {
            return Err(BuildError::Network(format!("GET {} returned {}", url, status)));
        }

        let last_modified: Option<SystemTime> = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| DateTime::parse_from_rfc2822(value).ok())
            .map(Into::into);

        let body = response.bytes()?;

        if let Some(checksum) = checksum {
            verify_checksum(url, &body, checksum)?;
        }

        fs::create_dir_all(dir).map_err(|e| BuildError::io(dir, e))?;

        if gzipped {
            unpack(dir, GzDecoder::new(&body[..]))?;
        } else {
            unpack(dir, &body[..])?;
        }

        if let Some(modified) = last_modified {
            if let Err(e) = File::open(dir).and_then(|f| f.set_modified(modified)) {
                self.logger.verbose(&format!(
                    "could not set modification time of {}: {}",
                    dir.display(),
                    e
                ));
            }
        }

        Ok(DownloadOutcome::Extracted)
    }
}

fn verify_checksum(url: &str, body: &[u8], checksum: &str) -> Result<()> {
    let (actual, expected) = match checksum.split_once(':') {
        Some(("md5", expected)) => (hex::encode(Md5::digest(body)), expected),
        Some(("sha256", expected)) => (hex::encode(Sha256::digest(body)), expected),
        _ => {
            return Err(BuildError::command(format!(
                "checksum {:?} must start with \"md5:\" or \"sha256:\"",
                checksum
            )))
        }
    };

    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(BuildError::ChecksumMismatch(url.to_string()))
    }
}

/// Extracts directories and regular files; anything else in the archive is
/// refused, as is any entry that would land outside `dir`.
fn unpack<R: Read>(dir: &Path, source: R) -> Result<()> {
    let mut archive = Archive::new(source);
    let entries = archive.entries().map_err(|e| BuildError::io(dir, e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| BuildError::io(dir, e))?;

        let kind = entry.header().entry_type();
        if !matches!(kind, EntryType::Directory | EntryType::Regular) {
            return Err(BuildError::command(format!(
                "unsupported archive entry type {:?}",
                kind
            )));
        }

        let unpacked = entry.unpack_in(dir).map_err(|e| BuildError::io(dir, e))?;
        if !unpacked {
            let name = entry
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            return Err(BuildError::command(format!(
                "archive entry {:?} escapes {}",
                name,
                dir.display()
            )));
        }
    }

    Ok(())
}
