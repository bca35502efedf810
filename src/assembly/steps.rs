use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use super::StepContext;
use crate::archive;
use crate::coordinate::ArtifactCoordinate;
use crate::error::{AssemblyError, IoContext, Result};
use crate::files::{copy_into, ensure_dir, force_delete};

pub const HOST_DIR: &str = "host";
pub const EXTENSIONS_DIR: &str = "extensions";
pub const DATASOURCE_DIR: &str = "datasource";
pub const RUNTIMES_DIR: &str = "runtimes";
pub const DEPLOY_DIR: &str = "deploy";
pub const CONFIG_DIR: &str = "config";

fn copy_artifact(ctx: &StepContext<'_>, coordinate: &ArtifactCoordinate, dir: &Path) -> Result<()> {
    info!("[assembly:{}] Installing {}", ctx.step, coordinate);
    let resolved = ctx.resolve(coordinate)?;
    copy_into(&resolved, dir)?;
    Ok(())
}

fn extract_artifact(ctx: &StepContext<'_>, coordinate: &ArtifactCoordinate) -> Result<()> {
    info!("[assembly:{}] Installing {}", ctx.step, coordinate);
    let resolved = ctx.resolve(coordinate)?;
    archive::extract(&resolved, ctx.image_dir)?;
    Ok(())
}

pub(super) fn install_runtime(ctx: &StepContext<'_>) -> Result<()> {
    extract_artifact(ctx, &ctx.plan.runtime_coordinate())
}

pub(super) fn install_shared_libraries(ctx: &StepContext<'_>) -> Result<()> {
    let host = ctx.image_dir.join(HOST_DIR);
    for coordinate in ctx.plan.shared_libraries() {
        copy_artifact(ctx, coordinate, &host)?;
    }
    Ok(())
}

pub(super) fn install_profiles(ctx: &StepContext<'_>) -> Result<()> {
    for coordinate in ctx.plan.profiles() {
        extract_artifact(ctx, coordinate)?;
    }
    Ok(())
}

pub(super) fn install_extensions(ctx: &StepContext<'_>) -> Result<()> {
    let extensions = ctx.image_dir.join(EXTENSIONS_DIR);
    for coordinate in ctx.plan.extensions() {
        copy_artifact(ctx, coordinate, &extensions)?;
    }
    Ok(())
}

pub(super) fn install_datasources(ctx: &StepContext<'_>) -> Result<()> {
    if ctx.plan.datasources().is_empty() {
        return Ok(());
    }
    let datasource = ctx.image_dir.join(EXTENSIONS_DIR).join(DATASOURCE_DIR);
    ensure_dir(&datasource)?;
    for coordinate in ctx.plan.datasources() {
        copy_artifact(ctx, coordinate, &datasource)?;
    }
    Ok(())
}

pub(super) fn install_contributions(ctx: &StepContext<'_>) -> Result<()> {
    let deploy = ctx.target_dir().join(DEPLOY_DIR);
    ensure_dir(&deploy)?;

    // Local outputs are checked before anything is fetched.
    let local: Vec<PathBuf> = ctx
        .plan
        .local_outputs()
        .iter()
        .map(|output| output.select_deployable())
        .collect::<Result<_>>()?;

    for coordinate in ctx.plan.contributions() {
        copy_artifact(ctx, coordinate, &deploy)?;
    }
    for deployable in local {
        info!(
            "[assembly:{}] Installing {}",
            ctx.step,
            deployable.display()
        );
        copy_into(&deployable, &deploy)?;
    }
    Ok(())
}

pub(super) fn install_config_overlays(ctx: &StepContext<'_>) -> Result<()> {
    for overlay in ctx.plan.config_overlays() {
        let destination = match overlay.destination() {
            Some(dest) => ctx.image_dir.join(dest),
            None => ctx.target_dir().join(CONFIG_DIR),
        };
        let source = ctx.project_root.join(overlay.source());
        if !source.is_file() {
            return Err(AssemblyError::config(format!(
                "config overlay source '{}' does not exist",
                source.display()
            )));
        }
        ensure_dir(&destination)?;
        info!(
            "[assembly:{}] Copying {} to {}",
            ctx.step,
            source.display(),
            destination.display()
        );
        copy_into(&source, &destination)?;
    }
    Ok(())
}

pub(super) fn remove_exclusions(ctx: &StepContext<'_>) -> Result<()> {
    let extensions = ctx.image_dir.join(EXTENSIONS_DIR);
    for coordinate in ctx.plan.exclusions() {
        let target = extensions.join(coordinate.exclusion_file_name());
        if !target.exists() {
            return Err(AssemblyError::config(format!(
                "excluded extension '{}' was never installed (expected '{}')",
                coordinate,
                target.display()
            )));
        }
        info!("[assembly:{}] Excluding {}", ctx.step, coordinate);
        force_delete(&target)?;
    }
    Ok(())
}

pub(super) fn clean_other_targets(ctx: &StepContext<'_>) -> Result<()> {
    if !ctx.plan.clean_other_targets() {
        return Ok(());
    }
    let runtimes = ctx.image_dir.join(RUNTIMES_DIR);
    if !runtimes.is_dir() {
        return Ok(());
    }

    let mut others = Vec::new();
    for entry in fs::read_dir(&runtimes)
        .io_context(|| format!("reading directory '{}'", runtimes.display()))?
    {
        let entry = entry.io_context(|| format!("reading directory '{}'", runtimes.display()))?;
        let path = entry.path();
        if path.is_dir() && entry.file_name() != ctx.plan.contribution_target() {
            others.push(path);
        }
    }
    others.sort();

    for path in others {
        info!("[assembly:{}] Removing {}", ctx.step, path.display());
        force_delete(&path)?;
    }
    Ok(())
}
