//! The installation plan: what goes into an image, grouped by role.
//!
//! A plan is assembled once through [`InstallationPlanBuilder`], validated in
//! [`InstallationPlanBuilder::build`], and read-only afterwards. Every role is
//! a `BTreeSet`, so duplicates collapse and iteration order is stable.

mod config;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::coordinate::ArtifactCoordinate;
use crate::error::{AssemblyError, IoContext, Result};

pub use config::{load_plan, LoadedPlan};

pub const DEFAULT_CONTRIBUTION_TARGET: &str = "vm";
pub const DEFAULT_RUNTIME_GROUP: &str = "org.codehaus.fabric3";
pub const DEFAULT_RUNTIME_NAME: &str = "runtime-standalone";

/// Directory below a project's build dir that holds its packaged archives.
pub const BUILD_LIBS_DIR: &str = "libs";

/// Extension marking a web deployable, preferred among several build outputs.
pub const WEB_DEPLOYABLE_EXTENSION: &str = "war";

/// Group and name of the base runtime distribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeDefaults {
    pub group: String,
    pub name: String,
}

impl Default for RuntimeDefaults {
    fn default() -> Self {
        Self {
            group: DEFAULT_RUNTIME_GROUP.to_string(),
            name: DEFAULT_RUNTIME_NAME.to_string(),
        }
    }
}

/// One file copied into the image after everything else is installed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ConfigOverlay {
    source: PathBuf,
    destination: Option<PathBuf>,
}

impl ConfigOverlay {
    /// `source` is relative to the project root (or absolute); `destination`
    /// is image-relative and defaults to the contribution target's config dir.
    pub fn new(source: impl Into<PathBuf>, destination: Option<PathBuf>) -> Result<Self> {
        let source = source.into();
        if source.as_os_str().is_empty() {
            return Err(AssemblyError::config(
                "a source file must be specified for a config overlay",
            ));
        }
        if let Some(dest) = &destination {
            if !is_image_relative(dest) {
                return Err(AssemblyError::config(format!(
                    "config overlay destination '{}' must be relative to the image and must not contain '..'",
                    dest.display()
                )));
            }
        }
        Ok(Self {
            source,
            destination,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }
}

fn is_image_relative(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// A contribution produced by a local project build instead of a repository.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocalBuildOutput {
    name: String,
    build_dir: PathBuf,
}

impl LocalBuildOutput {
    pub fn new(name: impl Into<String>, build_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            build_dir: build_dir.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    pub fn libs_dir(&self) -> PathBuf {
        self.build_dir.join(BUILD_LIBS_DIR)
    }

    /// Pick the single deployable archive this project built.
    ///
    /// One candidate wins outright. Among several, exactly one `.war` must
    /// exist; anything else is ambiguous.
    pub fn select_deployable(&self) -> Result<PathBuf> {
        let libs = self.libs_dir();
        let mut candidates = Vec::new();
        if libs.is_dir() {
            for entry in fs::read_dir(&libs)
                .io_context(|| format!("reading directory '{}'", libs.display()))?
            {
                let entry =
                    entry.io_context(|| format!("reading directory '{}'", libs.display()))?;
                let path = entry.path();
                if path.is_file() {
                    candidates.push(path);
                }
            }
        }
        candidates.sort();

        match candidates.len() {
            0 => Err(AssemblyError::config(format!(
                "archive not found for contribution project '{}' in '{}'",
                self.name,
                libs.display()
            ))),
            1 => Ok(candidates.remove(0)),
            _ => {
                let mut wars: Vec<PathBuf> = candidates
                    .iter()
                    .filter(|p| {
                        p.extension()
                            .and_then(|e| e.to_str())
                            .is_some_and(|e| e.eq_ignore_ascii_case(WEB_DEPLOYABLE_EXTENSION))
                    })
                    .cloned()
                    .collect();
                if wars.len() == 1 {
                    return Ok(wars.remove(0));
                }
                let names: Vec<String> = candidates
                    .iter()
                    .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                    .collect();
                Err(AssemblyError::config(format!(
                    "contribution project '{}' has multiple library archives [{}]; expected a single .{} among them",
                    self.name,
                    names.join(", "),
                    WEB_DEPLOYABLE_EXTENSION
                )))
            }
        }
    }
}

/// Everything an assembly run installs, validated and immutable.
#[derive(Debug, Clone)]
pub struct InstallationPlan {
    runtime_version: String,
    runtime: RuntimeDefaults,
    contribution_target: String,
    clean_other_targets: bool,
    profiles: BTreeSet<ArtifactCoordinate>,
    extensions: BTreeSet<ArtifactCoordinate>,
    shared_libraries: BTreeSet<ArtifactCoordinate>,
    datasources: BTreeSet<ArtifactCoordinate>,
    contributions: BTreeSet<ArtifactCoordinate>,
    local_outputs: BTreeSet<LocalBuildOutput>,
    exclusions: BTreeSet<ArtifactCoordinate>,
    config_overlays: BTreeSet<ConfigOverlay>,
}

impl InstallationPlan {
    pub fn builder(runtime_version: impl Into<String>) -> InstallationPlanBuilder {
        InstallationPlanBuilder::new(runtime_version)
    }

    pub fn runtime_version(&self) -> &str {
        &self.runtime_version
    }

    pub fn runtime(&self) -> &RuntimeDefaults {
        &self.runtime
    }

    /// `<group>:<name>:zip:bin:<runtime_version>`
    pub fn runtime_coordinate(&self) -> ArtifactCoordinate {
        ArtifactCoordinate::distribution(
            self.runtime.group.as_str(),
            self.runtime.name.as_str(),
            self.runtime_version.as_str(),
        )
    }

    pub fn contribution_target(&self) -> &str {
        &self.contribution_target
    }

    pub fn clean_other_targets(&self) -> bool {
        self.clean_other_targets
    }

    pub fn profiles(&self) -> &BTreeSet<ArtifactCoordinate> {
        &self.profiles
    }

    pub fn extensions(&self) -> &BTreeSet<ArtifactCoordinate> {
        &self.extensions
    }

    pub fn shared_libraries(&self) -> &BTreeSet<ArtifactCoordinate> {
        &self.shared_libraries
    }

    pub fn datasources(&self) -> &BTreeSet<ArtifactCoordinate> {
        &self.datasources
    }

    pub fn contributions(&self) -> &BTreeSet<ArtifactCoordinate> {
        &self.contributions
    }

    pub fn local_outputs(&self) -> &BTreeSet<LocalBuildOutput> {
        &self.local_outputs
    }

    pub fn exclusions(&self) -> &BTreeSet<ArtifactCoordinate> {
        &self.exclusions
    }

    pub fn config_overlays(&self) -> &BTreeSet<ConfigOverlay> {
        &self.config_overlays
    }
}

#[derive(Debug, Clone)]
pub struct InstallationPlanBuilder {
    plan: InstallationPlan,
}

impl InstallationPlanBuilder {
    fn new(runtime_version: impl Into<String>) -> Self {
        Self {
            plan: InstallationPlan {
                runtime_version: runtime_version.into(),
                runtime: RuntimeDefaults::default(),
                contribution_target: DEFAULT_CONTRIBUTION_TARGET.to_string(),
                clean_other_targets: false,
                profiles: BTreeSet::new(),
                extensions: BTreeSet::new(),
                shared_libraries: BTreeSet::new(),
                datasources: BTreeSet::new(),
                contributions: BTreeSet::new(),
                local_outputs: BTreeSet::new(),
                exclusions: BTreeSet::new(),
                config_overlays: BTreeSet::new(),
            },
        }
    }

    pub fn runtime(mut self, runtime: RuntimeDefaults) -> Self {
        self.plan.runtime = runtime;
        self
    }

    pub fn contribution_target(mut self, target: impl Into<String>) -> Self {
        self.plan.contribution_target = target.into();
        self
    }

    pub fn clean_other_targets(mut self, clean: bool) -> Self {
        self.plan.clean_other_targets = clean;
        self
    }

    pub fn profile(mut self, coordinate: ArtifactCoordinate) -> Self {
        self.plan.profiles.insert(coordinate);
        self
    }

    pub fn extension(mut self, coordinate: ArtifactCoordinate) -> Self {
        self.plan.extensions.insert(coordinate);
        self
    }

    pub fn shared_library(mut self, coordinate: ArtifactCoordinate) -> Self {
        self.plan.shared_libraries.insert(coordinate);
        self
    }

    pub fn datasource(mut self, coordinate: ArtifactCoordinate) -> Self {
        self.plan.datasources.insert(coordinate);
        self
    }

    pub fn contribution(mut self, coordinate: ArtifactCoordinate) -> Self {
        self.plan.contributions.insert(coordinate);
        self
    }

    pub fn local_output(mut self, output: LocalBuildOutput) -> Self {
        self.plan.local_outputs.insert(output);
        self
    }

    pub fn exclusion(mut self, coordinate: ArtifactCoordinate) -> Self {
        self.plan.exclusions.insert(coordinate);
        self
    }

    pub fn config_overlay(mut self, overlay: ConfigOverlay) -> Self {
        self.plan.config_overlays.insert(overlay);
        self
    }

    pub fn build(self) -> Result<InstallationPlan> {
        let plan = self.plan;
        if plan.runtime_version.trim().is_empty() {
            return Err(AssemblyError::config("a runtime version must be specified"));
        }
        if plan.runtime.group.trim().is_empty() || plan.runtime.name.trim().is_empty() {
            return Err(AssemblyError::config(
                "runtime group and name must not be empty",
            ));
        }
        if !is_path_segment(&plan.contribution_target) {
            return Err(AssemblyError::config(format!(
                "contribution target '{}' must be a single non-empty directory name",
                plan.contribution_target
            )));
        }
        plan.runtime_coordinate().validate()?;
        let roles = [
            &plan.profiles,
            &plan.extensions,
            &plan.shared_libraries,
            &plan.datasources,
            &plan.contributions,
            &plan.exclusions,
        ];
        for coordinate in roles.into_iter().flatten() {
            coordinate.validate()?;
        }
        Ok(plan)
    }
}

fn is_path_segment(value: &str) -> bool {
    let mut components = Path::new(value).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !value.contains('/')
        && !value.contains('\\')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn coord(raw: &str) -> ArtifactCoordinate {
        ArtifactCoordinate::parse(raw).unwrap()
    }

    #[test]
    fn builder_defaults() {
        let plan = InstallationPlan::builder("3.0.0").build().unwrap();
        assert_eq!(plan.contribution_target(), "vm");
        assert!(!plan.clean_other_targets());
        assert!(plan.profiles().is_empty());
        assert_eq!(
            plan.runtime_coordinate().to_string(),
            "org.codehaus.fabric3:runtime-standalone:zip:bin:3.0.0"
        );
    }

    #[test]
    fn duplicate_coordinates_collapse() {
        let plan = InstallationPlan::builder("1.0")
            .extension(coord("g:a:1.0"))
            .extension(coord("g:a:jar:1.0"))
            .exclusion(coord("g:b:1.0"))
            .exclusion(coord("g:b:1.0"))
            .build()
            .unwrap();
        assert_eq!(plan.extensions().len(), 1);
        assert_eq!(plan.exclusions().len(), 1);
    }

    #[test]
    fn invalid_contribution_targets_rejected() {
        for target in ["", ".", "..", "a/b", "/vm", "a\\b"] {
            let err = InstallationPlan::builder("1.0")
                .contribution_target(target)
                .build()
                .unwrap_err();
            assert!(err.is_configuration(), "target {target:?}");
        }
        assert!(InstallationPlan::builder("1.0")
            .contribution_target("node-1")
            .build()
            .is_ok());
    }

    #[test]
    fn unsafe_coordinates_rejected_at_build() {
        let err = InstallationPlan::builder("1.0")
            .exclusion(ArtifactCoordinate::new("g", "../x", "jar", "1"))
            .build()
            .unwrap_err();
        assert!(err.is_configuration());

        let err = InstallationPlan::builder("1.0")
            .extension(ArtifactCoordinate::new("", "", "", ""))
            .build()
            .unwrap_err();
        assert!(err.is_configuration());

        let err = InstallationPlan::builder("1.0")
            .runtime(RuntimeDefaults {
                group: "org/evil".into(),
                name: "runtime".into(),
            })
            .build()
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn empty_runtime_version_rejected() {
        assert!(InstallationPlan::builder("  ").build().unwrap_err().is_configuration());
    }

    #[test]
    fn overlay_validation() {
        assert!(ConfigOverlay::new("", None).unwrap_err().is_configuration());
        assert!(ConfigOverlay::new("a.xml", Some(PathBuf::from("../etc"))).is_err());
        assert!(ConfigOverlay::new("a.xml", Some(PathBuf::from("/etc"))).is_err());
        let overlay =
            ConfigOverlay::new("config/a.xml", Some(PathBuf::from("runtimes/vm/config"))).unwrap();
        assert_eq!(overlay.destination(), Some(Path::new("runtimes/vm/config")));
    }

    fn project_with(temp: &TempDir, files: &[&str]) -> LocalBuildOutput {
        let build = temp.path().join("web/build");
        fs::create_dir_all(build.join("libs")).unwrap();
        for file in files {
            fs::write(build.join("libs").join(file), file).unwrap();
        }
        LocalBuildOutput::new("web", build)
    }

    #[test]
    fn single_output_selected() {
        let temp = TempDir::new().unwrap();
        let project = project_with(&temp, &["web-1.0.jar"]);
        let chosen = project.select_deployable().unwrap();
        assert_eq!(chosen.file_name().unwrap(), "web-1.0.jar");
    }

    #[test]
    fn war_preferred_over_jar() {
        let temp = TempDir::new().unwrap();
        let project = project_with(&temp, &["web-1.0.jar", "web-1.0.war"]);
        let chosen = project.select_deployable().unwrap();
        assert_eq!(chosen.file_name().unwrap(), "web-1.0.war");
    }

    #[test]
    fn two_jars_are_ambiguous() {
        let temp = TempDir::new().unwrap();
        let project = project_with(&temp, &["a.jar", "b.jar"]);
        let err = project.select_deployable().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("multiple library archives"));
    }

    #[test]
    fn missing_libs_dir_is_configuration_error() {
        let temp = TempDir::new().unwrap();
        let project = LocalBuildOutput::new("ghost", temp.path().join("ghost/build"));
        let err = project.select_deployable().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("archive not found"));
    }
}
