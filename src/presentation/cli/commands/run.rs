use anyhow::Result;
use tracing::debug;

use super::CommandContext;
use crate::application::services::all_succeeded;
use crate::application::use_cases::{RepositorySelection, RunCommandUseCase};
use crate::domain::value_objects::VcsType;
use crate::infrastructure::vcs::Operation;
use crate::presentation::cli::output::ReportPrinter;
use crate::presentation::cli::DiscoveryArgs;

/// Handler for commands that run one operation in every discovered repository
pub struct RunHandler {
    context: CommandContext,
    discovery: DiscoveryArgs,
    types: Vec<VcsType>,
}

impl RunHandler {
    pub fn new(context: CommandContext, discovery: DiscoveryArgs) -> Self {
        Self {
            context,
            discovery,
            types: Vec::new(),
        }
    }

    /// Restrict the command to these repository types
    pub fn with_types(mut self, types: Vec<VcsType>) -> Self {
        self.types = types;
        self
    }

    pub async fn execute(&self, operation: Operation) -> Result<bool> {
        let selection = RepositorySelection::default()
            .with_paths(self.discovery.paths.clone())
            .with_nested(self.discovery.nested)
            .with_types(self.types.clone());
        let printer =
            ReportPrinter::new(self.discovery.jobs.format).with_hide_empty(self.discovery.jobs.hide_empty);

        let registry = self.context.registry(&self.discovery.jobs);
        let (executor, progress) = self.context.executor(&self.discovery.jobs);
        let use_case = RunCommandUseCase::new(registry, executor).with_selection(selection);

        if self.discovery.repos {
            printer.print_repositories(&use_case.find_repositories());
        }

        debug!("Running '{}'", operation.name());
        let reports = use_case.execute(&operation).await;
        if let Some(progress) = progress {
            progress.finish();
        }

        printer.print(&reports)?;
        Ok(all_succeeded(&reports))
    }
}
