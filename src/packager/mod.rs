//! Nested-package flow: stage profiles and extensions, then bundle the
//! extensions into one archive for a container's single-level library dir.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;
use walkdir::WalkDir;

use crate::archive::{extract, write_nested_archive};
use crate::coordinate::ArtifactCoordinate;
use crate::error::{AssemblyError, Result};
use crate::files::{copy_into, ensure_dir};
use crate::plan::InstallationPlan;
use crate::resolver::{RepositorySettings, Resolve};
use crate::stopwatch::{StepTiming, Stopwatch};

pub const NESTED_ARCHIVE_NAME: &str = "f3.extensions.jar";
pub const LIBRARY_DIR: &str = "WEB-INF/lib";
pub const NODE_ARTIFACT: &str = "fabric3-node";
pub const NODE_EXTENSIONS_ARTIFACT: &str = "fabric3-node-extensions";
pub const DEFAULT_DATABINDING_EXTENSION: &str = "fabric3-databinding-json";

const JAR_EXTENSION: &str = "jar";

/// A file the outer package must carry, and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryEntry {
    pub source: PathBuf,
    pub entry_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PackageOutput {
    pub staging_dir: PathBuf,
    pub nested_archive: PathBuf,
    /// Nested archive first, then the support artifacts.
    pub libraries: Vec<LibraryEntry>,
    pub steps: Vec<StepTiming>,
    pub total_ms: u64,
}

pub struct Packager<R> {
    plan: InstallationPlan,
    resolver: R,
    repositories: RepositorySettings,
    staging_dir: PathBuf,
}

impl<R: Resolve> Packager<R> {
    pub fn new(
        plan: InstallationPlan,
        resolver: R,
        repositories: RepositorySettings,
        staging_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            plan,
            resolver,
            repositories,
            staging_dir: staging_dir.into(),
        }
    }

    /// Plan extensions plus the default databinding extension.
    pub fn extensions(&self) -> BTreeSet<ArtifactCoordinate> {
        let mut extensions = self.plan.extensions().clone();
        extensions.insert(self.runtime_library(DEFAULT_DATABINDING_EXTENSION));
        extensions
    }

    fn runtime_library(&self, name: &str) -> ArtifactCoordinate {
        ArtifactCoordinate::new(
            self.plan.runtime().group.as_str(),
            name,
            JAR_EXTENSION,
            self.plan.runtime_version(),
        )
    }

    fn resolve(&self, coordinate: &ArtifactCoordinate) -> Result<PathBuf> {
        self.resolver.resolve(coordinate, &self.repositories)
    }

    pub fn run(&self) -> Result<PackageOutput> {
        let mut watch = Stopwatch::start();
        let extensions_dir = self.staging_dir.join("extensions");
        ensure_dir(&extensions_dir)?;

        for profile in self.plan.profiles() {
            info!("[package:profiles] Installing {}", profile);
            extract(&self.resolve(profile)?, &self.staging_dir)?;
        }
        watch.split("profiles");

        for extension in &self.extensions() {
            info!("[package:extensions] Installing {}", extension);
            copy_into(&self.resolve(extension)?, &extensions_dir)?;
        }
        watch.split("extensions");

        let members = jar_files(&extensions_dir);
        let nested_archive = self.staging_dir.join(NESTED_ARCHIVE_NAME);
        info!(
            "[package:bundle] Writing {} with {} extensions",
            nested_archive.display(),
            members.len()
        );
        write_nested_archive(&members, &nested_archive)?;
        watch.split("bundle");

        let mut libraries = vec![library_entry(&nested_archive)?];
        for name in [NODE_ARTIFACT, NODE_EXTENSIONS_ARTIFACT] {
            let coordinate = self.runtime_library(name);
            info!("[package:libraries] Resolving {}", coordinate);
            libraries.push(library_entry(&self.resolve(&coordinate)?)?);
        }
        watch.split("libraries");

        let (steps, total_ms) = watch.finish();
        Ok(PackageOutput {
            staging_dir: self.staging_dir.clone(),
            nested_archive,
            libraries,
            steps,
            total_ms,
        })
    }
}

/// `*.jar` files directly inside `dir`, sorted by file name.
fn jar_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(JAR_EXTENSION))
        })
        .collect()
}

fn library_entry(source: &Path) -> Result<LibraryEntry> {
    let file_name = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            AssemblyError::config(format!(
                "library '{}' has no usable file name",
                source.display()
            ))
        })?;
    Ok(LibraryEntry {
        source: source.to_path_buf(),
        entry_name: format!("{}/{}", LIBRARY_DIR, file_name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::MavenResolver;
    use crate::test_support::FixtureRepo;
    use std::fs::{self, File};
    use zip::ZipArchive;

    const GROUP: &str = "org.codehaus.fabric3";

    fn publish_support(fx: &FixtureRepo, version: &str) {
        for name in [NODE_ARTIFACT, NODE_EXTENSIONS_ARTIFACT, DEFAULT_DATABINDING_EXTENSION] {
            fx.publish_file(&ArtifactCoordinate::new(GROUP, name, "jar", version), name);
        }
    }

    #[test]
    fn packages_extensions_into_nested_archive() {
        let fx = FixtureRepo::new();
        publish_support(&fx, "3.0");
        let profile = ArtifactCoordinate::distribution("g", "web", "3.0");
        fx.publish_zip(
            &profile,
            &[
                ("extensions/from-profile.jar", b"p"),
                ("extensions/readme.txt", b"not a jar"),
                ("META-INF/MANIFEST.MF", b"m"),
            ],
        );
        let ext = ArtifactCoordinate::parse("g:ext-a:3.0").unwrap();
        fx.publish_file(&ext, "a");
        let plan = InstallationPlan::builder("3.0")
            .profile(profile)
            .extension(ext)
            .build()
            .unwrap();
        let staging = fx.temp.path().join("build/f3");

        let output = Packager::new(plan, MavenResolver::new(), fx.settings(), &staging)
            .run()
            .unwrap();

        assert_eq!(output.nested_archive, staging.join(NESTED_ARCHIVE_NAME));
        let mut zip = ZipArchive::new(File::open(&output.nested_archive).unwrap()).unwrap();
        let names: Vec<String> = zip.file_names().map(str::to_string).collect();
        assert_eq!(
            names,
            vec![
                "ext-a-3.0.jar",
                "fabric3-databinding-json-3.0.jar",
                "from-profile.jar"
            ]
        );
        assert!(zip.by_name("readme.txt").is_err());
        assert!(!staging.join("META-INF/MANIFEST.MF").exists());

        let entries: Vec<&str> = output
            .libraries
            .iter()
            .map(|l| l.entry_name.as_str())
            .collect();
        assert_eq!(
            entries,
            vec![
                "WEB-INF/lib/f3.extensions.jar",
                "WEB-INF/lib/fabric3-node-3.0.jar",
                "WEB-INF/lib/fabric3-node-extensions-3.0.jar"
            ]
        );
        assert!(output.libraries.iter().all(|l| l.source.is_file()));
    }

    #[test]
    fn default_extension_collapses_with_declared_one() {
        let fx = FixtureRepo::new();
        let declared = ArtifactCoordinate::new(GROUP, DEFAULT_DATABINDING_EXTENSION, "jar", "3.0");
        let plan = InstallationPlan::builder("3.0")
            .extension(declared)
            .build()
            .unwrap();
        let packager = Packager::new(plan, MavenResolver::new(), fx.settings(), fx.temp.path());
        assert_eq!(packager.extensions().len(), 1);
    }

    #[test]
    fn missing_support_artifact_fails() {
        let fx = FixtureRepo::new();
        fx.publish_file(
            &ArtifactCoordinate::new(GROUP, DEFAULT_DATABINDING_EXTENSION, "jar", "3.0"),
            "json",
        );
        let plan = InstallationPlan::builder("3.0").build().unwrap();
        let staging = fx.temp.path().join("stage");

        let err = Packager::new(plan, MavenResolver::new(), fx.settings(), &staging)
            .run()
            .unwrap_err();

        assert!(err.is_resolution());
        assert!(err.to_string().contains(NODE_ARTIFACT));
        assert!(fs::metadata(staging.join(NESTED_ARCHIVE_NAME)).is_ok());
    }
}
