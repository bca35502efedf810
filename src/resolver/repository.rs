//! Repository endpoints and the local cache they populate.

use std::path::{Path, PathBuf};

use url::Url;

use crate::error::{AssemblyError, Result};

pub const DEFAULT_REPOSITORY_ID: &str = "central";
pub const DEFAULT_REPOSITORY_URL: &str = "https://repo.maven.apache.org/maven2/";

/// A remote (or mirrored, `file://`) repository in Maven layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    id: String,
    /// Always ends with `/`.
    url: String,
}

impl Repository {
    pub fn new(id: impl Into<String>, url: &str) -> Result<Self> {
        let id = id.into();
        let mut normalized = url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let parsed = Url::parse(&normalized).map_err(|e| {
            AssemblyError::config(format!("invalid URL '{}' for repository '{}': {}", url, id, e))
        })?;
        match parsed.scheme() {
            "http" | "https" | "file" => {}
            other => {
                return Err(AssemblyError::config(format!(
                    "unsupported scheme '{}' for repository '{}' (expected http, https or file)",
                    other, id
                )))
            }
        }
        Ok(Self {
            id,
            url: normalized,
        })
    }

    /// A `file://` repository rooted at a local directory.
    pub fn from_directory(id: impl Into<String>, dir: &Path) -> Result<Self> {
        let id = id.into();
        let url = Url::from_directory_path(dir).map_err(|()| {
            AssemblyError::config(format!(
                "repository '{}' directory '{}' must be an absolute path",
                id,
                dir.display()
            ))
        })?;
        Ok(Self {
            id,
            url: url.to_string(),
        })
    }

    pub fn central() -> Self {
        Self {
            id: DEFAULT_REPOSITORY_ID.to_string(),
            url: DEFAULT_REPOSITORY_URL.to_string(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Location of a repository-relative path below this repository.
    pub fn locate(&self, relative: &str) -> String {
        format!("{}{}", self.url, relative)
    }
}

/// Ordered remote repositories plus the local cache, consulted first.
#[derive(Debug, Clone)]
pub struct RepositorySettings {
    local: PathBuf,
    remotes: Vec<Repository>,
    offline: bool,
    verify_checksums: bool,
}

impl RepositorySettings {
    /// An empty `remotes` list selects the default public repository.
    pub fn new(local: impl Into<PathBuf>, remotes: Vec<Repository>) -> Self {
        let remotes = if remotes.is_empty() {
            vec![Repository::central()]
        } else {
            remotes
        };
        Self {
            local: local.into(),
            remotes,
            offline: false,
            verify_checksums: true,
        }
    }

    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn with_checksum_verification(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    pub fn local(&self) -> &Path {
        &self.local
    }

    pub fn remotes(&self) -> &[Repository] {
        &self.remotes
    }

    pub fn offline(&self) -> bool {
        self.offline
    }

    pub fn verify_checksums(&self) -> bool {
        self.verify_checksums
    }
}

/// `~/.m2/repository`, the cache shared with other Maven-layout tools.
pub fn default_local_repository() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".m2")
        .join("repository")
}
