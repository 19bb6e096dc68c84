use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::client::{
    BranchCommand, CheckoutOptions, ClientError, CustomCommand, DiffCommand, ExportCommand,
    ImportCommand, LogCommand, PullCommand, PushCommand, RemotesCommand, StatusCommand,
    ValidateCommand, VcsClient,
};
use crate::domain::entities::JobResult;
use crate::domain::value_objects::VcsType;

/// Placeholder bound to entries whose type no client supports
///
/// Every operation fails with the stored message.
#[derive(Debug, Clone)]
pub struct NoneClient {
    path: PathBuf,
    message: String,
}

impl NoneClient {
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Placeholder for an entry of type `vcs_type`
    pub fn unsupported(path: impl Into<PathBuf>, vcs_type: &str) -> Self {
        Self::new(path, format!("Repository type '{}' is not supported", vcs_type))
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    fn fail(&self) -> JobResult {
        JobResult::failure(&self.path, self.message.clone())
    }
}

#[async_trait]
impl VcsClient for NoneClient {
    fn vcs_type(&self) -> VcsType {
        VcsType::None
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn is_repository(&self) -> bool {
        false
    }

    async fn import(&self, _command: &ImportCommand) -> JobResult {
        self.fail()
    }

    async fn validate(&self, _command: &ValidateCommand) -> JobResult {
        self.fail()
    }

    async fn export(&self, _command: &ExportCommand) -> JobResult {
        self.fail()
    }

    async fn pull(&self, _command: &PullCommand) -> JobResult {
        self.fail()
    }

    async fn push(&self, _command: &PushCommand) -> JobResult {
        self.fail()
    }

    async fn status(&self, _command: &StatusCommand) -> JobResult {
        self.fail()
    }

    async fn diff(&self, _command: &DiffCommand) -> JobResult {
        self.fail()
    }

    async fn log(&self, _command: &LogCommand) -> JobResult {
        self.fail()
    }

    async fn branch(&self, _command: &BranchCommand) -> JobResult {
        self.fail()
    }

    async fn remotes(&self, _command: &RemotesCommand) -> JobResult {
        self.fail()
    }

    async fn custom(&self, _command: &CustomCommand) -> JobResult {
        self.fail()
    }

    async fn checkout(&self, _options: &CheckoutOptions) -> Result<bool, ClientError> {
        Err(ClientError::unsupported_operation(VcsType::None, "checkout"))
    }

    async fn export_repository(
        &self,
        _version: Option<&str>,
        _basepath: &Path,
    ) -> Result<bool, ClientError> {
        Err(ClientError::unsupported_operation(
            VcsType::None,
            "export_repository",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_operation_fails_with_message() {
        let client = NoneClient::unsupported("src/x", "cvs");

        let import = client.import(&ImportCommand::default()).await;
        let status = client.status(&StatusCommand::default()).await;

        for result in [import, status] {
            assert_eq!(result.returncode, 1);
            assert_eq!(result.output, "Repository type 'cvs' is not supported");
            assert_eq!(result.cwd, PathBuf::from("src/x"));
        }
        assert!(client.checkout(&CheckoutOptions::new("u")).await.is_err());
    }
}
