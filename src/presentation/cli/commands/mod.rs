pub mod export;
pub mod help;
pub mod import;
pub mod run;
pub mod validate;

pub use export::*;
pub use help::*;
pub use import::*;
pub use run::*;
pub use validate::*;

use std::sync::Arc;
use std::time::Duration;

use crate::application::services::{
    CancellationFlag, ExecutorConfig, JobExecutor, ManifestResolver, ManifestSource,
};
use crate::common::result::VcsResult;
use crate::domain::entities::ResolvedManifest;
use crate::infrastructure::filesystem::ManifestStore;
use crate::infrastructure::process::CommandRunner;
use crate::infrastructure::vcs::ClientRegistry;

use super::progress::ProgressReporter;
use super::JobArgs;

/// Settings shared by all command handlers
#[derive(Debug, Clone, Copy)]
pub struct CommandContext {
    pub debug: bool,
}

impl CommandContext {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    /// Client registry whose commands honor `--timeout`
    pub fn registry(&self, jobs: &JobArgs) -> Arc<ClientRegistry> {
        let runner = CommandRunner::with_default_timeout(jobs.timeout.map(Duration::from_secs));
        Arc::new(ClientRegistry::with_default_clients(Arc::new(runner)))
    }

    /// Executor for `jobs`, with a progress bar when stderr is a terminal
    pub fn executor(&self, jobs: &JobArgs) -> (JobExecutor, Option<ProgressReporter>) {
        let workers = if jobs.workers == 0 {
            num_cpus::get()
        } else {
            jobs.workers
        };
        let show_progress = !self.debug && ProgressReporter::enabled();
        let config = ExecutorConfig::default()
            .with_workers(workers)
            .with_debug(self.debug)
            .with_progress(show_progress);

        let cancellation = CancellationFlag::new();
        cancellation.cancel_on_signal();
        let executor = JobExecutor::new(config).with_cancellation(cancellation);

        if show_progress {
            let (reporter, sender) = ProgressReporter::start();
            (executor.with_progress_sender(sender), Some(reporter))
        } else {
            (executor, None)
        }
    }

    /// Load and resolve the manifest named by `--input`
    pub async fn load_manifest(&self, input: &str) -> VcsResult<ResolvedManifest> {
        let store = ManifestStore::new()?;
        let resolver = ManifestResolver::new(Arc::new(store));
        let manifest = resolver.resolve(&ManifestSource::parse(input)).await?;
        Ok(manifest)
    }
}
