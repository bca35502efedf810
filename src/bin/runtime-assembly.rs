use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use runtime_assembly::stopwatch::StepTiming;
use runtime_assembly::{load_plan, Assembler, AssemblyLayout, MavenResolver, Packager};

#[derive(Parser)]
#[command(name = "runtime-assembly")]
#[command(about = "Assemble runtime images from artifact repositories")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a distribution image directory from a plan
    Assemble {
        /// Plan file (TOML)
        plan: PathBuf,
        /// Image directory (default: <plan dir>/build/image)
        #[arg(long)]
        image_dir: Option<PathBuf>,
        /// Print per-step timings to stderr
        #[arg(long)]
        timings: bool,
    },

    /// Stage profiles and extensions and bundle them for a container package
    Package {
        /// Plan file (TOML)
        plan: PathBuf,
        /// Staging directory (default: <plan dir>/build/f3)
        #[arg(long)]
        staging_dir: Option<PathBuf>,
        /// Print per-step timings to stderr
        #[arg(long)]
        timings: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Assemble {
            plan,
            image_dir,
            timings,
        } => assemble(plan, image_dir, timings),
        Commands::Package {
            plan,
            staging_dir,
            timings,
        } => package(plan, staging_dir, timings),
    }
}

fn assemble(plan_path: PathBuf, image_dir: Option<PathBuf>, timings: bool) -> Result<()> {
    let loaded = load_plan(&plan_path)
        .with_context(|| format!("loading plan '{}'", plan_path.display()))?;
    let image_dir =
        image_dir.unwrap_or_else(|| loaded.project_root.join("build").join("image"));
    let layout = AssemblyLayout {
        image_dir: image_dir.clone(),
        project_root: loaded.project_root,
    };

    let report = Assembler::new(loaded.plan, MavenResolver::new(), loaded.repositories, layout)
        .run()
        .with_context(|| format!("assembling image '{}'", image_dir.display()))?;

    if timings {
        print_timings(&report.steps, report.total_ms);
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("serializing assembly report")?
    );
    Ok(())
}

fn package(plan_path: PathBuf, staging_dir: Option<PathBuf>, timings: bool) -> Result<()> {
    let loaded = load_plan(&plan_path)
        .with_context(|| format!("loading plan '{}'", plan_path.display()))?;
    let staging_dir =
        staging_dir.unwrap_or_else(|| loaded.project_root.join("build").join("f3"));

    let output = Packager::new(
        loaded.plan,
        MavenResolver::new(),
        loaded.repositories,
        staging_dir.clone(),
    )
    .run()
    .with_context(|| format!("packaging into '{}'", staging_dir.display()))?;

    if timings {
        print_timings(&output.steps, output.total_ms);
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("serializing package output")?
    );
    Ok(())
}

fn print_timings(steps: &[StepTiming], total_ms: u64) {
    for step in steps {
        eprintln!("[timing] {:<14} {:>8} ms", step.name, step.elapsed_ms);
    }
    eprintln!("[timing] {:<14} {:>8} ms", "total", total_ms);
}
