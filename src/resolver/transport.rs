//! Fetching repository files over `file://` and `http(s)://`.
//!
//! Requests are synchronous and never retried here.

use std::cell::OnceCell;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use url::Url;

use super::repository::Repository;
use crate::files::{copy_file, copy_stream, COPY_BUFFER_SIZE};

const USER_AGENT: &str = concat!("runtime-assembly/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Outcome of a fetch that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fetched {
    Found,
    Missing,
}

#[derive(Default)]
pub(crate) struct Transport {
    client: OnceCell<Client>,
}

impl Transport {
    fn client(&self) -> Result<&Client, String> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| format!("creating HTTP client: {e}"))?;
        Ok(self.client.get_or_init(|| client))
    }

    /// Fetch `relative` from `repository` into `destination`.
    pub(crate) fn fetch(
        &self,
        repository: &Repository,
        relative: &str,
        destination: &Path,
    ) -> Result<Fetched, String> {
        let location = repository.locate(relative);
        let url = Url::parse(&location).map_err(|e| format!("invalid URL '{location}': {e}"))?;

        if url.scheme() == "file" {
            let source = url
                .to_file_path()
                .map_err(|()| format!("'{location}' is not a local path"))?;
            if !source.is_file() {
                return Ok(Fetched::Missing);
            }
            copy_file(&source, destination).map_err(|e| e.to_string())?;
            return Ok(Fetched::Found);
        }

        let mut response = self
            .client()?
            .get(url)
            .send()
            .map_err(|e| format!("GET {location}: {e}"))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Fetched::Missing);
        }
        if !response.status().is_success() {
            return Err(format!("GET {location}: HTTP {}", response.status()));
        }

        let out = File::create(destination)
            .map_err(|e| format!("creating '{}': {e}", destination.display()))?;
        let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, out);
        copy_stream(&mut response, &mut writer)
            .and_then(|_| writer.flush())
            .map_err(|e| format!("downloading {location}: {e}"))?;
        Ok(Fetched::Found)
    }

    /// Fetch a small text resource, `None` when the repository lacks it.
    pub(crate) fn fetch_text(
        &self,
        repository: &Repository,
        relative: &str,
    ) -> Result<Option<String>, String> {
        let location = repository.locate(relative);
        let url = Url::parse(&location).map_err(|e| format!("invalid URL '{location}': {e}"))?;

        if url.scheme() == "file" {
            let source = url
                .to_file_path()
                .map_err(|()| format!("'{location}' is not a local path"))?;
            if !source.is_file() {
                return Ok(None);
            }
            return std::fs::read_to_string(&source)
                .map(Some)
                .map_err(|e| format!("reading '{}': {e}", source.display()));
        }

        let response = self
            .client()?
            .get(url)
            .send()
            .map_err(|e| format!("GET {location}: {e}"))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(format!("GET {location}: HTTP {}", response.status()));
        }
        response
            .text()
            .map(Some)
            .map_err(|e| format!("reading {location}: {e}"))
    }
}

/// Checksum algorithms published next to repository artifacts, in the
/// order they are consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChecksumKind {
    Sha256,
    Sha1,
}

impl ChecksumKind {
    pub(crate) const PREFERRED: [ChecksumKind; 2] = [ChecksumKind::Sha256, ChecksumKind::Sha1];

    pub(crate) fn suffix(self) -> &'static str {
        match self {
            ChecksumKind::Sha256 => "sha256",
            ChecksumKind::Sha1 => "sha1",
        }
    }

    pub(crate) fn digest_file(self, path: &Path) -> std::io::Result<String> {
        match self {
            ChecksumKind::Sha256 => hex_digest::<Sha256>(path),
            ChecksumKind::Sha1 => hex_digest::<Sha1>(path),
        }
    }
}

fn hex_digest<D: Digest>(path: &Path) -> std::io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = D::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}

/// First token of a checksum file; some publishers append the file name.
pub(crate) fn parse_checksum(contents: &str) -> Option<String> {
    contents
        .split_whitespace()
        .next()
        .map(|token| token.to_ascii_lowercase())
        .filter(|token| !token.is_empty() && token.chars().all(|c| c.is_ascii_hexdigit()))
}
