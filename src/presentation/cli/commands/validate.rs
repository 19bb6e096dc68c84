use anyhow::Result;

use super::CommandContext;
use crate::application::services::all_succeeded;
use crate::application::use_cases::ValidateManifestUseCase;
use crate::presentation::cli::output::ReportPrinter;
use crate::presentation::cli::JobArgs;

/// Handler for the validate command
pub struct ValidateHandler {
    context: CommandContext,
    input: String,
    retry: u32,
    jobs: JobArgs,
}

impl ValidateHandler {
    pub fn new(context: CommandContext, input: String, retry: u32, jobs: JobArgs) -> Self {
        Self {
            context,
            input,
            retry,
            jobs,
        }
    }

    pub async fn execute(&self) -> Result<bool> {
        let manifest = self.context.load_manifest(&self.input).await?;

        let registry = self.context.registry(&self.jobs);
        let (executor, progress) = self.context.executor(&self.jobs);
        let reports = ValidateManifestUseCase::new(registry, executor)
            .with_retry(self.retry)
            .execute(&manifest)
            .await;
        if let Some(progress) = progress {
            progress.finish();
        }

        ReportPrinter::new(self.jobs.format)
            .with_hide_empty(self.jobs.hide_empty)
            .print(&reports)?;
        Ok(all_succeeded(&reports))
    }
}
