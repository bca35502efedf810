use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{ConfigOverlay, InstallationPlan, LocalBuildOutput, RuntimeDefaults};
use crate::coordinate::{ArtifactCoordinate, ArtifactDecl, DeclaredKind};
use crate::error::{AssemblyError, IoContext, Result};
use crate::resolver::{default_local_repository, Repository, RepositorySettings};

/// A plan file after parsing: the plan plus the environment it names.
#[derive(Debug, Clone)]
pub struct LoadedPlan {
    pub plan: InstallationPlan,
    pub repositories: RepositorySettings,
    /// Directory relative paths in the plan file resolve against.
    pub project_root: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PlanToml {
    runtime_version: String,
    contribution_target: Option<String>,
    #[serde(default)]
    clean: bool,
    #[serde(default)]
    profiles: Vec<ArtifactDecl>,
    #[serde(default)]
    extensions: Vec<ArtifactDecl>,
    #[serde(default)]
    shared: Vec<ArtifactDecl>,
    #[serde(default)]
    datasources: Vec<ArtifactDecl>,
    #[serde(default)]
    contributions: Vec<ArtifactDecl>,
    #[serde(default)]
    exclusions: Vec<ArtifactDecl>,
    #[serde(default)]
    projects: Vec<ProjectToml>,
    #[serde(default)]
    config: Vec<OverlayToml>,
    repositories: Option<RepositoriesToml>,
    runtime: Option<RuntimeToml>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProjectToml {
    name: String,
    build_dir: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct OverlayToml {
    source: String,
    target: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RepositoriesToml {
    local: Option<String>,
    #[serde(default)]
    remotes: Vec<RemoteToml>,
    #[serde(default)]
    offline: bool,
    verify_checksums: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RemoteToml {
    id: String,
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuntimeToml {
    group: Option<String>,
    name: Option<String>,
}

/// Read and validate a plan file. Relative paths resolve against the
/// file's directory.
pub fn load_plan(path: &Path) -> Result<LoadedPlan> {
    let contents =
        fs::read_to_string(path).io_context(|| format!("reading plan '{}'", path.display()))?;
    let project_root = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    parse_plan(&contents, &project_root).map_err(|err| match err {
        AssemblyError::Configuration(msg) => {
            AssemblyError::config(format!("plan '{}': {}", path.display(), msg))
        }
        other => other,
    })
}

fn parse_plan(contents: &str, project_root: &Path) -> Result<LoadedPlan> {
    let parsed: PlanToml =
        toml::from_str(contents).map_err(|e| AssemblyError::config(e.to_string()))?;

    let mut builder = InstallationPlan::builder(parsed.runtime_version.trim())
        .clean_other_targets(parsed.clean);
    if let Some(target) = parsed.contribution_target {
        builder = builder.contribution_target(target.trim());
    }
    if let Some(runtime) = parsed.runtime {
        let defaults = RuntimeDefaults::default();
        builder = builder.runtime(RuntimeDefaults {
            group: runtime.group.unwrap_or(defaults.group),
            name: runtime.name.unwrap_or(defaults.name),
        });
    }

    for c in coordinates(&parsed.profiles, DeclaredKind::Distribution)? {
        builder = builder.profile(c);
    }
    for c in coordinates(&parsed.extensions, DeclaredKind::Library)? {
        builder = builder.extension(c);
    }
    for c in coordinates(&parsed.shared, DeclaredKind::Library)? {
        builder = builder.shared_library(c);
    }
    for c in coordinates(&parsed.datasources, DeclaredKind::Library)? {
        builder = builder.datasource(c);
    }
    for c in coordinates(&parsed.contributions, DeclaredKind::Library)? {
        builder = builder.contribution(c);
    }
    for c in coordinates(&parsed.exclusions, DeclaredKind::Library)? {
        builder = builder.exclusion(c);
    }
    for project in parsed.projects {
        if project.name.trim().is_empty() {
            return Err(AssemblyError::config("a project must have a name"));
        }
        builder = builder.local_output(LocalBuildOutput::new(
            project.name.trim(),
            resolve_path(project_root, &project.build_dir),
        ));
    }
    for overlay in parsed.config {
        builder = builder.config_overlay(ConfigOverlay::new(
            overlay.source.trim(),
            overlay.target.map(|t| PathBuf::from(t.trim())),
        )?);
    }
    let plan = builder.build()?;

    let repositories = match parsed.repositories {
        Some(repos) => {
            let local = repos
                .local
                .map(|l| resolve_path(project_root, &l))
                .unwrap_or_else(default_local_repository);
            let remotes = repos
                .remotes
                .iter()
                .map(|r| Repository::new(r.id.trim(), &r.url))
                .collect::<Result<Vec<_>>>()?;
            RepositorySettings::new(local, remotes)
                .with_offline(repos.offline)
                .with_checksum_verification(repos.verify_checksums.unwrap_or(true))
        }
        None => RepositorySettings::new(default_local_repository(), Vec::new()),
    };

    Ok(LoadedPlan {
        plan,
        repositories,
        project_root: project_root.to_path_buf(),
    })
}

fn coordinates(decls: &[ArtifactDecl], kind: DeclaredKind) -> Result<Vec<ArtifactCoordinate>> {
    decls.iter().map(|d| d.to_coordinate(kind)).collect()
}

/// Absolute paths pass through, `~/` expands to the home directory, anything
/// else is joined onto `root`.
fn resolve_path(root: &Path, raw: &str) -> PathBuf {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    let candidate = Path::new(raw);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    }
}
