//! # vcsbatch - batch version control operations
//!
//! `vcsbatch` runs version control commands across many repositories at once. The
//! repositories either come from a YAML manifest (`import`, `validate`) or are
//! discovered below a set of directories (`pull`, `status`, `export`, ...). The
//! `vcs` binary is a thin command-line layer over the library.
//!
//! ## Features
//!
//! - **Manifests with inheritance**: a manifest may `extends` other manifests, local or remote
//! - **Many backends**: git, Mercurial, Subversion, Bazaar, and tar/zip archives
//! - **Parallel jobs**: a bounded worker pool that never runs a repository before the
//!   repositories containing it have finished
//! - **Stable results**: results are reported in manifest order regardless of parallelism
//!
//! ## Quick Start
//!
//! 1. Describe the repositories (`project.repos`):
//!
//! ```yaml
//! repositories:
//!   src/core:
//!     type: git
//!     url: https://github.com/example/core.git
//!     version: main
//!   src/docs:
//!     type: tar
//!     url: https://example.com/docs-1.0.tar.gz
//!     version: docs-1.0
//! ```
//!
//! 2. Import them:
//!
//! ```bash
//! vcs import --input project.repos .
//! ```
//!
//! 3. Work with the checkouts:
//!
//! ```bash
//! vcs status
//! vcs pull src
//! vcs export --exact > pinned.repos
//! ```
//!
//! ## Architecture
//!
//! - [`domain`]: manifest entries, job results, VCS type tags
//! - [`application`]: manifest resolution, job building, scheduling and the use cases
//! - [`infrastructure`]: VCS clients, process execution, manifest loading, repository discovery
//! - [`presentation`]: CLI interface
//! - [`common`]: shared error handling
//!
//! ## Using the Library
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vcsbatch::application::services::{
//!     all_succeeded, ExecutorConfig, JobExecutor, ManifestResolver, ManifestSource,
//! };
//! use vcsbatch::application::use_cases::{ImportOptions, ImportRepositoriesUseCase};
//! use vcsbatch::infrastructure::{ClientRegistry, CommandRunner, ManifestStore};
//!
//! # async fn example() -> vcsbatch::Result<()> {
//! let resolver = ManifestResolver::new(Arc::new(ManifestStore::new()?));
//! let manifest = resolver.resolve(&ManifestSource::parse("project.repos")).await?;
//!
//! let registry = Arc::new(ClientRegistry::with_default_clients(Arc::new(CommandRunner::new())));
//! let executor = JobExecutor::new(ExecutorConfig::default().with_workers(4));
//! let outcome = ImportRepositoriesUseCase::new(registry, executor)
//!     .with_options(ImportOptions::default().with_base_path("src"))
//!     .execute(&manifest)
//!     .await;
//!
//! println!("all imported: {}", all_succeeded(&outcome.reports));
//! # Ok(())
//! # }
//! ```

#![deny(rustdoc::broken_intra_doc_links)]

pub mod application;
pub mod common;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use crate::common::error::VcsError;
pub use crate::common::result::VcsResult as Result;
