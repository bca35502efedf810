//! Declarative runtime-image assembly.
//!
//! Given an [`InstallationPlan`] naming versioned artifacts by role, this crate
//! resolves each artifact from a Maven-layout repository and composes them
//! into either:
//!
//! - **An image** - a multi-directory distribution tree built by the
//!   [`Assembler`] in a fixed step order
//! - **A nested package** - a staging directory plus a bundled extensions
//!   archive and library entries, built by the [`Packager`]
//!
//! # Architecture
//!
//! ```text
//! InstallationPlan (validated once, read-only)
//!     │
//!     ├── Assembler: runtime → shared → profiles → extensions → datasources
//!     │              → contributions → config → exclusions → clean
//!     │
//!     └── Packager:  profiles → extensions → f3.extensions.jar → libraries
//!
//! each step uses:
//!     ├── resolver  (local cache, then remotes in order)
//!     ├── archive   (zip extraction, manifests skipped)
//!     └── files     (streaming copy, forced delete)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use runtime_assembly::{
//!     ArtifactCoordinate, Assembler, AssemblyLayout, InstallationPlan, MavenResolver,
//!     RepositorySettings,
//! };
//!
//! let plan = InstallationPlan::builder("3.0.0")
//!     .profile(ArtifactCoordinate::distribution("org.codehaus.fabric3", "profile-web", "3.0.0"))
//!     .build()?;
//! let settings = RepositorySettings::new(runtime_assembly::default_local_repository(), vec![]);
//! let layout = AssemblyLayout {
//!     image_dir: "build/image".into(),
//!     project_root: ".".into(),
//! };
//! let report = Assembler::new(plan, MavenResolver::new(), settings, layout).run()?;
//! ```
//!
//! Compressing the finished tree is left to the caller.

pub mod archive;
pub mod assembly;
pub mod coordinate;
pub mod error;
pub mod files;
pub mod packager;
pub mod plan;
pub mod resolver;
pub mod stopwatch;

#[cfg(test)]
mod test_support;

pub use assembly::{distribution_steps, Assembler, AssemblyLayout, AssemblyReport, Step};
pub use coordinate::ArtifactCoordinate;
pub use error::{AssemblyError, Result};
pub use packager::{LibraryEntry, PackageOutput, Packager};
pub use plan::{
    load_plan, ConfigOverlay, InstallationPlan, LoadedPlan, LocalBuildOutput, RuntimeDefaults,
};
pub use resolver::{
    default_local_repository, MavenResolver, Repository, RepositorySettings, Resolve,
};
