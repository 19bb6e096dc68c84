use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

use super::CommandContext;
use crate::application::services::all_succeeded;
use crate::application::use_cases::{ImportOptions, ImportRepositoriesUseCase};
use crate::presentation::cli::output::ReportPrinter;
use crate::presentation::cli::JobArgs;

/// Handler for the import command
pub struct ImportHandler {
    context: CommandContext,
    path: PathBuf,
    input: String,
    jobs: JobArgs,
    options: ImportOptions,
    repos: bool,
}

impl ImportHandler {
    pub fn new(context: CommandContext, path: PathBuf, input: String, jobs: JobArgs) -> Self {
        Self {
            context,
            options: ImportOptions::default().with_base_path(path.clone()),
            path,
            input,
            jobs,
            repos: false,
        }
    }

    pub fn with_flags(mut self, force: bool, shallow: bool, recursive: bool, skip_existing: bool) -> Self {
        self.options = self
            .options
            .with_force(force)
            .with_shallow(shallow)
            .with_recursive(recursive)
            .with_skip_existing(skip_existing);
        self
    }

    pub fn with_retry(mut self, retry: u32) -> Self {
        self.options = self.options.with_retry(retry);
        self
    }

    /// List the repositories and their clients before importing
    pub fn with_repos(mut self, repos: bool) -> Self {
        self.repos = repos;
        self
    }

    pub async fn execute(&self) -> Result<bool> {
        let manifest = self.context.load_manifest(&self.input).await?;
        info!(
            "Resolved {} repositories from '{}' for '{}'",
            manifest.len(),
            self.input,
            self.path.display()
        );

        let printer = ReportPrinter::new(self.jobs.format).with_hide_empty(self.jobs.hide_empty);
        let registry = self.context.registry(&self.jobs);
        let (executor, progress) = self.context.executor(&self.jobs);
        let use_case =
            ImportRepositoriesUseCase::new(registry, executor).with_options(self.options.clone());
        if self.repos {
            printer.print_repositories(&use_case.repositories(&manifest));
        }

        let outcome = use_case.execute(&manifest).await;
        if let Some(progress) = progress {
            progress.finish();
        }

        if !outcome.unknown_hosts.is_empty() {
            eprintln!(
                "{} {}",
                "Unknown SSH host(s), imported sequentially:".yellow(),
                outcome.unknown_hosts.join(", ")
            );
        }

        printer.print(&outcome.reports)?;
        Ok(all_succeeded(&outcome.reports))
    }
}
