//! Image assembly: an explicit, ordered list of install steps.
//!
//! The runtime step lays down the directory skeleton and must run first.
//! Exclusions follow the extensions they remove. The destructive clean step
//! runs last. Steps never retry; the first error ends the run and leaves the
//! image directory as it is.

mod steps;

use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Serialize;
use time::OffsetDateTime;

use crate::coordinate::ArtifactCoordinate;
use crate::error::Result;
use crate::files::ensure_dir;
use crate::plan::InstallationPlan;
use crate::resolver::{RepositorySettings, Resolve};
use crate::stopwatch::{StepTiming, Stopwatch};

pub use steps::{
    CONFIG_DIR, DATASOURCE_DIR, DEPLOY_DIR, EXTENSIONS_DIR, HOST_DIR, RUNTIMES_DIR,
};

/// Where an assembly writes and what its relative paths resolve against.
#[derive(Debug, Clone)]
pub struct AssemblyLayout {
    pub image_dir: PathBuf,
    pub project_root: PathBuf,
}

/// Everything a step may read. Steps share no other state.
pub struct StepContext<'a> {
    pub step: &'static str,
    pub plan: &'a InstallationPlan,
    pub resolver: &'a dyn Resolve,
    pub repositories: &'a RepositorySettings,
    pub image_dir: &'a Path,
    pub project_root: &'a Path,
}

impl StepContext<'_> {
    pub fn resolve(&self, coordinate: &ArtifactCoordinate) -> Result<PathBuf> {
        info!("[assembly:{}] Resolving {}", self.step, coordinate);
        self.resolver.resolve(coordinate, self.repositories)
    }

    /// `runtimes/<contribution target>` below the image root.
    pub fn target_dir(&self) -> PathBuf {
        self.image_dir
            .join(RUNTIMES_DIR)
            .join(self.plan.contribution_target())
    }
}

pub type StepFn = fn(&StepContext<'_>) -> Result<()>;

/// A named pipeline stage.
#[derive(Clone, Copy)]
pub struct Step {
    name: &'static str,
    run: StepFn,
}

impl Step {
    pub const fn new(name: &'static str, run: StepFn) -> Self {
        Self { name, run }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn run(&self, ctx: &StepContext<'_>) -> Result<()> {
        (self.run)(ctx)
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step").field("name", &self.name).finish()
    }
}

/// The distribution pipeline, in execution order.
pub fn distribution_steps() -> Vec<Step> {
    vec![
        Step::new("runtime", steps::install_runtime),
        Step::new("shared", steps::install_shared_libraries),
        Step::new("profiles", steps::install_profiles),
        Step::new("extensions", steps::install_extensions),
        Step::new("datasources", steps::install_datasources),
        Step::new("contributions", steps::install_contributions),
        Step::new("config", steps::install_config_overlays),
        Step::new("exclusions", steps::remove_exclusions),
        Step::new("clean", steps::clean_other_targets),
    ]
}

/// Result of a completed run, handed to whoever archives the image.
#[derive(Debug, Clone, Serialize)]
pub struct AssemblyReport {
    pub image_dir: PathBuf,
    pub started_at_utc: String,
    pub steps: Vec<StepTiming>,
    pub total_ms: u64,
}

pub struct Assembler<R> {
    plan: InstallationPlan,
    resolver: R,
    repositories: RepositorySettings,
    layout: AssemblyLayout,
}

impl<R: Resolve> Assembler<R> {
    pub fn new(
        plan: InstallationPlan,
        resolver: R,
        repositories: RepositorySettings,
        layout: AssemblyLayout,
    ) -> Self {
        Self {
            plan,
            resolver,
            repositories,
            layout,
        }
    }

    /// Run every distribution step against the image directory.
    ///
    /// The image directory is created if absent and never wiped.
    pub fn run(&self) -> Result<AssemblyReport> {
        self.run_steps(&distribution_steps())
    }

    pub fn run_steps(&self, steps: &[Step]) -> Result<AssemblyReport> {
        let started_at_utc = now_utc_compact();
        ensure_dir(&self.layout.image_dir)?;
        info!(
            "[assembly] Assembling runtime {} into {}",
            self.plan.runtime_version(),
            self.layout.image_dir.display()
        );

        let mut watch = Stopwatch::start();
        for step in steps {
            let ctx = StepContext {
                step: step.name(),
                plan: &self.plan,
                resolver: &self.resolver,
                repositories: &self.repositories,
                image_dir: &self.layout.image_dir,
                project_root: &self.layout.project_root,
            };
            step.run(&ctx)?;
            let elapsed = watch.split(step.name());
            debug!("[assembly:{}] done in {:?}", step.name(), elapsed);
        }
        let (steps, total_ms) = watch.finish();
        info!("[assembly] Image ready in {} ms", total_ms);

        Ok(AssemblyReport {
            image_dir: self.layout.image_dir.clone(),
            started_at_utc,
            steps,
            total_ms,
        })
    }
}

pub(crate) fn now_utc_compact() -> String {
    let now = OffsetDateTime::now_utc();
    format!(
        "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}
