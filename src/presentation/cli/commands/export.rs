use anyhow::Result;
use std::path::PathBuf;

use super::CommandContext;
use crate::application::services::all_succeeded;
use crate::application::use_cases::{ExportMode, ExportRepositoriesUseCase, RepositorySelection};
use crate::common::result::ResultExt;
use crate::infrastructure::vcs::ExportCommand;
use crate::presentation::cli::output::ReportPrinter;
use crate::presentation::cli::{DiscoveryArgs, OutputFormat};

/// Handler for the export command
pub struct ExportHandler {
    context: CommandContext,
    discovery: DiscoveryArgs,
    command: ExportCommand,
    archive: Option<PathBuf>,
}

impl ExportHandler {
    pub fn new(context: CommandContext, discovery: DiscoveryArgs) -> Self {
        Self {
            context,
            discovery,
            command: ExportCommand::default(),
            archive: None,
        }
    }

    pub fn with_exact(mut self, exact: bool, with_tags: bool) -> Self {
        self.command = ExportCommand { exact, with_tags };
        self
    }

    /// Write archives into `directory` instead of printing a manifest
    pub fn with_archive(mut self, directory: Option<PathBuf>) -> Self {
        self.archive = directory;
        self
    }

    pub async fn execute(&self) -> Result<bool> {
        let jobs = &self.discovery.jobs;
        let printer = ReportPrinter::new(jobs.format).with_hide_empty(jobs.hide_empty);
        let mode = match &self.archive {
            Some(directory) => {
                std::fs::create_dir_all(directory).with_filesystem_error(
                    "Could not create archive directory",
                    Some(directory.clone()),
                )?;
                ExportMode::Archive {
                    directory: directory.clone(),
                }
            }
            None => ExportMode::Manifest(self.command.clone()),
        };
        let selection = RepositorySelection::default()
            .with_paths(self.discovery.paths.clone())
            .with_nested(self.discovery.nested);

        let registry = self.context.registry(jobs);
        let (executor, progress) = self.context.executor(jobs);
        let use_case = ExportRepositoriesUseCase::new(registry, executor)
            .with_selection(selection)
            .with_mode(mode);
        if self.discovery.repos {
            printer.print_repositories(&use_case.find_repositories());
        }

        let outcome = use_case.execute().await;
        if let Some(progress) = progress {
            progress.finish();
        }

        if self.archive.is_some() {
            printer.print(&outcome.reports)?;
        } else {
            match jobs.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&outcome.manifest)?)
                }
                OutputFormat::Text | OutputFormat::Yaml => print!("{}", outcome.manifest.to_yaml()?),
            }
            printer.print_failures(&outcome.reports);
        }
        Ok(all_succeeded(&outcome.reports))
    }
}
