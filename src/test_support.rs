//! Fixture repository shared by the pipeline tests.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::archive::testing::write_zip;
use crate::coordinate::ArtifactCoordinate;
use crate::resolver::{Repository, RepositorySettings};

/// A temp dir holding a `file://` remote, an empty local cache, a project
/// root and an image dir.
pub(crate) struct FixtureRepo {
    pub(crate) temp: TempDir,
}

impl FixtureRepo {
    pub(crate) fn new() -> Self {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("remote")).unwrap();
        fs::create_dir_all(temp.path().join("project")).unwrap();
        Self { temp }
    }

    pub(crate) fn remote(&self) -> PathBuf {
        self.temp.path().join("remote")
    }

    pub(crate) fn project_root(&self) -> PathBuf {
        self.temp.path().join("project")
    }

    pub(crate) fn image_dir(&self) -> PathBuf {
        self.temp.path().join("image")
    }

    pub(crate) fn settings(&self) -> RepositorySettings {
        let remote = Repository::from_directory("fixture", &self.remote()).unwrap();
        RepositorySettings::new(self.temp.path().join("cache"), vec![remote])
    }

    pub(crate) fn publish_zip(&self, coordinate: &ArtifactCoordinate, entries: &[(&str, &[u8])]) {
        write_zip(&self.remote().join(coordinate.repository_path()), entries);
    }

    pub(crate) fn publish_file(&self, coordinate: &ArtifactCoordinate, contents: &str) {
        let path = self.remote().join(coordinate.repository_path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    /// A runtime distribution laying down three runtime targets.
    pub(crate) fn publish_runtime(&self, coordinate: &ArtifactCoordinate) {
        self.publish_zip(
            coordinate,
            &[
                ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n"),
                ("bin/server.jar", b"server"),
                ("runtimes/vm/config/systemConfig.xml", b"<vm/>"),
                ("runtimes/controller/config/systemConfig.xml", b"<controller/>"),
                ("runtimes/participant/config/systemConfig.xml", b"<participant/>"),
                ("extensions/", b""),
            ],
        );
    }

    /// Write the `libs/` outputs of a local project and return its build dir.
    pub(crate) fn local_project(&self, name: &str, files: &[&str]) -> PathBuf {
        let build_dir = self.temp.path().join(name).join("build");
        let libs = build_dir.join("libs");
        fs::create_dir_all(&libs).unwrap();
        for file in files {
            fs::write(libs.join(file), *file).unwrap();
        }
        build_dir
    }
}

/// Relative paths of every regular file below `root`, sorted.
pub(crate) fn list_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}
