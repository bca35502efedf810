//! Artifact resolution against a local cache and ordered remote repositories.
//!
//! The cache uses the Maven repository layout and is shared across runs.
//! A download lands in a `.part` file next to its final location and is
//! renamed into place only after its checksum has been checked, so an
//! interrupted transfer is never mistaken for a cache hit.

mod repository;
mod transport;

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::coordinate::ArtifactCoordinate;
use crate::error::{AssemblyError, IoContext, Result};

pub use repository::{
    default_local_repository, Repository, RepositorySettings, DEFAULT_REPOSITORY_ID,
    DEFAULT_REPOSITORY_URL,
};
use transport::{parse_checksum, ChecksumKind, Fetched, Transport};

/// Turns a coordinate into a file on local disk.
pub trait Resolve {
    /// Returns an absolute path to the resolved artifact.
    fn resolve(
        &self,
        coordinate: &ArtifactCoordinate,
        repositories: &RepositorySettings,
    ) -> Result<PathBuf>;
}

/// Resolver for Maven-layout repositories over `file://` and `http(s)://`.
#[derive(Default)]
pub struct MavenResolver {
    transport: Transport,
}

impl MavenResolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn download(
        &self,
        coordinate: &ArtifactCoordinate,
        repository: &Repository,
        relative: &str,
        cached: &Path,
        verify: bool,
    ) -> Result<bool> {
        let parent = cached.parent().unwrap_or(cached);
        fs::create_dir_all(parent)
            .io_context(|| format!("creating directory '{}'", parent.display()))?;

        let partial = cached.with_file_name(format!("{}.part", coordinate.file_name()));
        let fetched = self
            .transport
            .fetch(repository, relative, &partial)
            .map_err(|reason| {
                let _ = fs::remove_file(&partial);
                AssemblyError::resolution(coordinate, format!("[{}] {}", repository.id(), reason))
            })?;
        if fetched == Fetched::Missing {
            let _ = fs::remove_file(&partial);
            return Ok(false);
        }

        if verify {
            if let Err(err) = self.verify(coordinate, repository, relative, &partial) {
                let _ = fs::remove_file(&partial);
                return Err(err);
            }
        }

        fs::rename(&partial, cached).io_context(|| {
            format!(
                "moving '{}' to '{}'",
                partial.display(),
                cached.display()
            )
        })?;
        Ok(true)
    }

    fn verify(
        &self,
        coordinate: &ArtifactCoordinate,
        repository: &Repository,
        relative: &str,
        downloaded: &Path,
    ) -> Result<()> {
        for kind in ChecksumKind::PREFERRED {
            let checksum_path = format!("{}.{}", relative, kind.suffix());
            let published = self
                .transport
                .fetch_text(repository, &checksum_path)
                .map_err(|reason| AssemblyError::resolution(coordinate, reason))?;
            let Some(published) = published else {
                continue;
            };
            let expected = parse_checksum(&published).ok_or_else(|| {
                AssemblyError::resolution(
                    coordinate,
                    format!("[{}] malformed {} checksum", repository.id(), kind.suffix()),
                )
            })?;
            let actual = kind
                .digest_file(downloaded)
                .io_context(|| format!("hashing '{}'", downloaded.display()))?;
            if actual != expected {
                return Err(AssemblyError::resolution(
                    coordinate,
                    format!(
                        "[{}] {} checksum mismatch (expected {}, got {})",
                        repository.id(),
                        kind.suffix(),
                        expected,
                        actual
                    ),
                ));
            }
            debug!("[resolver] {} {} checksum verified", coordinate, kind.suffix());
            return Ok(());
        }
        warn!(
            "[resolver] {} publishes no checksum for {}",
            repository.id(),
            coordinate
        );
        Ok(())
    }
}

impl Resolve for MavenResolver {
    fn resolve(
        &self,
        coordinate: &ArtifactCoordinate,
        repositories: &RepositorySettings,
    ) -> Result<PathBuf> {
        let cached = repositories.local().join(coordinate.repository_path());
        if cached.is_file() {
            debug!("[resolver] cache hit {}", cached.display());
            return absolute(&cached);
        }
        if repositories.offline() {
            return Err(AssemblyError::resolution(
                coordinate,
                format!(
                    "offline and not in local repository '{}'",
                    repositories.local().display()
                ),
            ));
        }

        let relative = coordinate.repository_url_path();
        for repository in repositories.remotes() {
            debug!("[resolver] trying {} at {}", coordinate, repository.url());
            if self.download(
                coordinate,
                repository,
                &relative,
                &cached,
                repositories.verify_checksums(),
            )? {
                info!("[resolver] Downloaded {} from {}", coordinate, repository.id());
                return absolute(&cached);
            }
        }

        let tried: Vec<&str> = repositories.remotes().iter().map(Repository::id).collect();
        Err(AssemblyError::resolution(
            coordinate,
            format!("not found in repositories [{}]", tried.join(", ")),
        ))
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).io_context(|| format!("resolving '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn publish(repo: &Path, coordinate: &ArtifactCoordinate, contents: &str) -> PathBuf {
        let path = repo.join(coordinate.repository_path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    fn settings(temp: &TempDir, remotes: &[&str]) -> RepositorySettings {
        let remotes = remotes
            .iter()
            .map(|id| Repository::from_directory(*id, &temp.path().join(id)).unwrap())
            .collect();
        RepositorySettings::new(temp.path().join("cache"), remotes)
    }

    #[test]
    fn cache_hit_needs_no_remote() {
        let temp = TempDir::new().unwrap();
        let coord = ArtifactCoordinate::parse("org.example:lib:1.0").unwrap();
        let cached = publish(&temp.path().join("cache"), &coord, "cached");

        let resolved = MavenResolver::new()
            .resolve(&coord, &settings(&temp, &["nowhere"]).with_offline(true))
            .unwrap();

        assert_eq!(resolved, cached);
        assert!(resolved.is_absolute());
    }

    #[test]
    fn remote_hit_populates_cache() {
        let temp = TempDir::new().unwrap();
        let coord = ArtifactCoordinate::distribution("org.example", "runtime", "2.0");
        publish(&temp.path().join("remote"), &coord, "zip bytes");
        let settings = settings(&temp, &["remote"]);

        let resolved = MavenResolver::new().resolve(&coord, &settings).unwrap();

        assert_eq!(
            resolved,
            temp.path()
                .join("cache/org/example/runtime/2.0/runtime-2.0-bin.zip")
        );
        assert_eq!(fs::read_to_string(&resolved).unwrap(), "zip bytes");
        assert!(!resolved.with_file_name("runtime-2.0-bin.zip.part").exists());
    }

    #[test]
    fn remotes_are_tried_in_order() {
        let temp = TempDir::new().unwrap();
        let coord = ArtifactCoordinate::parse("g:a:1.0").unwrap();
        fs::create_dir_all(temp.path().join("first")).unwrap();
        publish(&temp.path().join("second"), &coord, "from second");
        publish(&temp.path().join("third"), &coord, "from third");

        let resolved = MavenResolver::new()
            .resolve(&coord, &settings(&temp, &["first", "second", "third"]))
            .unwrap();

        assert_eq!(fs::read_to_string(resolved).unwrap(), "from second");
    }

    #[test]
    fn miss_everywhere_lists_repositories() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("a")).unwrap();
        fs::create_dir_all(temp.path().join("b")).unwrap();
        let coord = ArtifactCoordinate::parse("g:missing:1.0").unwrap();

        let err = MavenResolver::new()
            .resolve(&coord, &settings(&temp, &["a", "b"]))
            .unwrap_err();

        assert!(err.is_resolution());
        assert!(err.to_string().contains("[a, b]"), "{err}");
    }

    #[test]
    fn offline_cache_miss_fails() {
        let temp = TempDir::new().unwrap();
        let coord = ArtifactCoordinate::parse("g:a:1.0").unwrap();
        publish(&temp.path().join("remote"), &coord, "x");

        let err = MavenResolver::new()
            .resolve(&coord, &settings(&temp, &["remote"]).with_offline(true))
            .unwrap_err();

        assert!(err.is_resolution());
        assert!(err.to_string().contains("offline"));
    }

    #[test]
    fn checksum_mismatch_rejects_download() {
        let temp = TempDir::new().unwrap();
        let coord = ArtifactCoordinate::parse("g:a:1.0").unwrap();
        let published = publish(&temp.path().join("remote"), &coord, "abc");
        fs::write(
            published.with_file_name("a-1.0.jar.sha1"),
            "0000000000000000000000000000000000000000",
        )
        .unwrap();

        let err = MavenResolver::new()
            .resolve(&coord, &settings(&temp, &["remote"]))
            .unwrap_err();

        assert!(err.to_string().contains("checksum mismatch"), "{err}");
        let cache_dir = temp.path().join("cache/g/a/1.0");
        assert!(!cache_dir.join("a-1.0.jar").exists());
        assert!(!cache_dir.join("a-1.0.jar.part").exists());
    }

    #[test]
    fn matching_checksum_is_accepted() {
        let temp = TempDir::new().unwrap();
        let coord = ArtifactCoordinate::parse("g:a:1.0").unwrap();
        let published = publish(&temp.path().join("remote"), &coord, "abc");
        fs::write(
            published.with_file_name("a-1.0.jar.sha256"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad  a-1.0.jar\n",
        )
        .unwrap();

        let resolved = MavenResolver::new()
            .resolve(&coord, &settings(&temp, &["remote"]))
            .unwrap();

        assert_eq!(fs::read_to_string(resolved).unwrap(), "abc");
    }

    #[test]
    fn verification_can_be_disabled() {
        let temp = TempDir::new().unwrap();
        let coord = ArtifactCoordinate::parse("g:a:1.0").unwrap();
        let published = publish(&temp.path().join("remote"), &coord, "abc");
        fs::write(published.with_file_name("a-1.0.jar.sha1"), "deadbeef").unwrap();

        let settings = settings(&temp, &["remote"]).with_checksum_verification(false);
        assert!(MavenResolver::new().resolve(&coord, &settings).is_ok());
    }
}
