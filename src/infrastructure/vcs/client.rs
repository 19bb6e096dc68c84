use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::entities::JobResult;
use crate::domain::value_objects::VcsType;

/// Common interface for all version control clients
///
/// A client is bound to one target path. Job operations never fail with an
/// error: problems are reported through a non-zero `returncode`.
#[async_trait]
pub trait VcsClient: Send + Sync + fmt::Debug {
    /// Get the VCS type this implementation handles
    fn vcs_type(&self) -> VcsType;

    /// Path of the working copy this client operates on
    fn path(&self) -> &Path;

    /// Check if the client's path holds a working copy of this VCS
    fn is_repository(&self) -> bool;

    /// Create or update the working copy from a manifest entry
    async fn import(&self, command: &ImportCommand) -> JobResult;

    /// Check that the remote described by a manifest entry is reachable
    async fn validate(&self, command: &ValidateCommand) -> JobResult;

    /// Report the URL and version of the working copy
    async fn export(&self, command: &ExportCommand) -> JobResult;

    async fn pull(&self, _command: &PullCommand) -> JobResult {
        self.not_applicable("pull", None)
    }

    async fn push(&self, _command: &PushCommand) -> JobResult {
        self.not_applicable("push", None)
    }

    async fn status(&self, _command: &StatusCommand) -> JobResult {
        self.not_applicable("status", None)
    }

    async fn diff(&self, _command: &DiffCommand) -> JobResult {
        self.not_applicable("diff", None)
    }

    async fn log(&self, _command: &LogCommand) -> JobResult {
        self.not_applicable("log", None)
    }

    async fn branch(&self, _command: &BranchCommand) -> JobResult {
        self.not_applicable("branch", None)
    }

    async fn remotes(&self, _command: &RemotesCommand) -> JobResult {
        self.not_applicable("remotes", None)
    }

    async fn custom(&self, _command: &CustomCommand) -> JobResult {
        self.not_applicable("custom", None)
    }

    /// Create a fresh working copy at the client's path
    ///
    /// Fails when the URL is empty or the target exists and is not empty.
    /// Returns whether the underlying VCS command succeeded.
    async fn checkout(&self, options: &CheckoutOptions) -> Result<bool, ClientError>;

    /// Write `<basepath>.tar.gz` holding the tracked files at `version`
    ///
    /// The archive's single top-level directory is named after `basepath`'s last component.
    async fn export_repository(
        &self,
        version: Option<&str>,
        basepath: &Path,
    ) -> Result<bool, ClientError>;

    /// Result for an operation this client cannot perform
    fn not_applicable(&self, command: &str, message: Option<&str>) -> JobResult {
        JobResult::not_applicable(self.path(), command, self.vcs_type().as_str(), message)
    }
}

/// Parameters of `import` for one manifest entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportCommand {
    pub url: String,
    pub version: Option<String>,
    /// Delete existing directories that don't contain the repository being imported
    pub force: bool,
    /// Retry network commands this many times
    pub retry: u32,
    /// Leave existing directories untouched (repositories with the same URL are still fetched)
    pub skip_existing: bool,
    /// Recurse into submodules
    pub recursive: bool,
    /// Clone without history
    pub shallow: bool,
}

/// Parameters of `validate` for one manifest entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidateCommand {
    pub url: String,
    pub version: Option<String>,
    pub retry: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportCommand {
    /// Report commit hashes instead of branch names
    pub exact: bool,
    /// Prefer tags over hashes when exporting exact versions
    pub with_tags: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullCommand {
    pub retry: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushCommand;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusCommand {
    /// Hide untracked files
    pub quiet: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffCommand {
    /// Lines of context around each change
    pub context: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogCommand {
    /// Maximum number of entries, 0 for no limit
    pub limit: u32,
    /// Only show entries since this tag
    pub limit_tag: Option<String>,
    /// Only show entries since the most recent tag
    pub limit_untagged: bool,
    /// Only show merge commits
    pub merge_only: bool,
    pub verbose: bool,
}

impl Default for LogCommand {
    fn default() -> Self {
        Self {
            limit: 3,
            limit_tag: None,
            limit_untagged: false,
            merge_only: false,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchCommand {
    /// List all branches instead of the current one
    pub all: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemotesCommand;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomCommand {
    /// Arguments passed to the VCS executable
    pub args: Vec<String>,
}

/// Options for [`VcsClient::checkout`]
#[derive(Debug, Clone, Default)]
pub struct CheckoutOptions {
    pub url: String,
    pub version: Option<String>,
    pub verbose: bool,
    pub shallow: bool,
    pub timeout: Option<Duration>,
}

impl CheckoutOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }

    pub fn with_shallow(mut self, shallow: bool) -> Self {
        self.shallow = shallow;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// One operation dispatched to a client by the executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Import(ImportCommand),
    Validate(ValidateCommand),
    Export(ExportCommand),
    /// Archive the working copy into `<basepath>.tar.gz`
    Archive {
        basepath: PathBuf,
        version: Option<String>,
    },
    Pull(PullCommand),
    Push(PushCommand),
    Status(StatusCommand),
    Diff(DiffCommand),
    Log(LogCommand),
    Branch(BranchCommand),
    Remotes(RemotesCommand),
    Custom(CustomCommand),
}

impl Operation {
    /// Command name as shown to users
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Import(_) => "import",
            Operation::Validate(_) => "validate",
            Operation::Export(_) => "export",
            Operation::Archive { .. } => "export",
            Operation::Pull(_) => "pull",
            Operation::Push(_) => "push",
            Operation::Status(_) => "status",
            Operation::Diff(_) => "diff",
            Operation::Log(_) => "log",
            Operation::Branch(_) => "branch",
            Operation::Remotes(_) => "remotes",
            Operation::Custom(_) => "custom",
        }
    }

    /// Run this operation on `client`
    pub async fn run(&self, client: &dyn VcsClient) -> JobResult {
        match self {
            Operation::Import(command) => client.import(command).await,
            Operation::Validate(command) => client.validate(command).await,
            Operation::Export(command) => client.export(command).await,
            Operation::Archive { basepath, version } => {
                let archive = archive_file_name(basepath);
                match client.export_repository(version.as_deref(), basepath).await {
                    Ok(true) => JobResult::success(
                        client.path(),
                        format!("Exported to '{}'", archive.display()),
                    ),
                    Ok(false) => JobResult::failure(
                        client.path(),
                        format!("Could not export repository to '{}'", archive.display()),
                    ),
                    Err(e) => JobResult::failure(client.path(), e.to_string()),
                }
            }
            Operation::Pull(command) => client.pull(command).await,
            Operation::Push(command) => client.push(command).await,
            Operation::Status(command) => client.status(command).await,
            Operation::Diff(command) => client.diff(command).await,
            Operation::Log(command) => client.log(command).await,
            Operation::Branch(command) => client.branch(command).await,
            Operation::Remotes(command) => client.remotes(command).await,
            Operation::Custom(command) => client.custom(command).await,
        }
    }
}

/// `<basepath>.tar.gz`
pub fn archive_file_name(basepath: &Path) -> PathBuf {
    let mut name = basepath.as_os_str().to_os_string();
    name.push(".tar.gz");
    PathBuf::from(name)
}

/// Errors raised by the capability operations (`checkout`, `export_repository`)
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Invalid empty url: \"{url}\"")]
    InvalidUrl { url: String },

    #[error("Target path exists and is not empty: {}", path.display())]
    TargetNotEmpty { path: PathBuf },

    #[error("Unsupported operation for {vcs_type}: {operation}")]
    UnsupportedOperation { vcs_type: VcsType, operation: String },

    #[error("Download of '{url}' failed: {message}")]
    DownloadFailed { url: String, message: String },

    #[error("IO error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

impl ClientError {
    /// Create an unsupported operation error
    pub fn unsupported_operation(vcs_type: VcsType, operation: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            vcs_type,
            operation: operation.into(),
        }
    }

    /// Create a download failed error
    pub fn download_failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DownloadFailed {
            url: url.into(),
            message: message.into(),
        }
    }
}

/// What an import has to do with the target path
#[derive(Debug)]
pub(crate) enum ImportPlan {
    /// The path is ready for a fresh checkout
    Checkout,
    /// The path holds the requested repository
    Update,
    /// Nothing more to do
    Done(JobResult),
}

/// Decide how to import into `path`
///
/// `current_url` is the remote URL of an existing working copy, `None` when the
/// path holds no working copy of this VCS.
pub(crate) async fn plan_import(
    path: &Path,
    current_url: Option<&str>,
    command: &ImportCommand,
) -> ImportPlan {
    if let Some(current_url) = current_url {
        if urls_match(current_url, &command.url) {
            return ImportPlan::Update;
        }
        if command.skip_existing {
            return ImportPlan::Done(JobResult::success(
                path,
                format!(
                    "Skipped existing repository with a different URL '{}'",
                    current_url
                ),
            ));
        }
        if !command.force {
            return ImportPlan::Done(JobResult::failure(
                path,
                "Path already exists and contains a different repository",
            ));
        }
        if let Err(e) = remove_path(path).await {
            return ImportPlan::Done(JobResult::failure(
                path,
                format!("Could not remove existing path '{}': {}", path.display(), e),
            ));
        }
    } else if !directory_is_empty(path) {
        if command.skip_existing {
            return ImportPlan::Done(JobResult::success(path, "Skipped existing directory"));
        }
        if !command.force {
            return ImportPlan::Done(JobResult::failure(
                path,
                "Path already exists and is not empty",
            ));
        }
        if let Err(e) = remove_path(path).await {
            return ImportPlan::Done(JobResult::failure(
                path,
                format!("Could not remove existing path '{}': {}", path.display(), e),
            ));
        }
    }

    match create_path(path).await {
        Ok(()) => ImportPlan::Checkout,
        Err(result) => ImportPlan::Done(result),
    }
}

/// Result for a manifest entry without a URL
pub(crate) fn missing_url(path: &Path) -> JobResult {
    JobResult::failure(path, "Repository data lacks the 'url' value")
}

/// Compare remote URLs ignoring trailing slashes
pub(crate) fn urls_match(a: &str, b: &str) -> bool {
    a.trim().trim_end_matches('/') == b.trim().trim_end_matches('/')
}

/// True if `path` doesn't exist or is an empty directory
pub(crate) fn directory_is_empty(path: &Path) -> bool {
    match std::fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => !path.exists(),
    }
}

/// Check the preconditions shared by every `checkout` implementation
pub(crate) fn ensure_checkout_target(path: &Path, url: &str) -> Result<(), ClientError> {
    if url.trim().is_empty() {
        return Err(ClientError::InvalidUrl {
            url: url.to_string(),
        });
    }
    if !directory_is_empty(path) {
        return Err(ClientError::TargetNotEmpty {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Resolve `path` against the current directory
pub(crate) fn absolute_path(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

pub(crate) async fn create_path(path: &Path) -> Result<(), JobResult> {
    tokio::fs::create_dir_all(path).await.map_err(|e| {
        JobResult::failure(
            path,
            format!("Could not create directory '{}': {}", path.display(), e),
        )
    })
}

pub(crate) async fn remove_path(path: &Path) -> std::io::Result<()> {
    if tokio::fs::symlink_metadata(path).await?.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn import(url: &str) -> ImportCommand {
        ImportCommand {
            url: url.to_string(),
            ..ImportCommand::default()
        }
    }

    #[test]
    fn test_archive_file_name() {
        assert_eq!(
            archive_file_name(Path::new("/tmp/export/repo")),
            PathBuf::from("/tmp/export/repo.tar.gz")
        );
    }

    #[test]
    fn test_urls_match() {
        assert!(urls_match("https://example.com/repo/", "https://example.com/repo"));
        assert!(!urls_match("https://example.com/a", "https://example.com/b"));
    }

    #[test]
    fn test_ensure_checkout_target() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("new");

        assert!(matches!(
            ensure_checkout_target(&target, "  "),
            Err(ClientError::InvalidUrl { .. })
        ));
        assert!(ensure_checkout_target(&target, "https://example.com/r").is_ok());

        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("file"), "x").unwrap();
        let err = ensure_checkout_target(&target, "https://example.com/r").unwrap_err();
        assert!(err.to_string().starts_with("Target path exists and is not empty"));
    }

    #[tokio::test]
    async fn test_plan_import_fresh_path_is_created() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("a/b");

        let plan = plan_import(&target, None, &import("https://example.com/r")).await;

        assert!(matches!(plan, ImportPlan::Checkout));
        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn test_plan_import_different_repository() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().to_path_buf();
        std::fs::write(target.join("tracked"), "x").unwrap();

        match plan_import(&target, Some("https://other"), &import("https://example.com/r")).await {
            ImportPlan::Done(result) => {
                assert_eq!(result.returncode, 1);
                assert_eq!(
                    result.output,
                    "Path already exists and contains a different repository"
                );
            }
            other => panic!("unexpected plan {other:?}"),
        }

        let mut skip = import("https://example.com/r");
        skip.skip_existing = true;
        match plan_import(&target, Some("https://other"), &skip).await {
            ImportPlan::Done(result) => assert!(result.is_success()),
            other => panic!("unexpected plan {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_plan_import_force_replaces_directory() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("repo");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("stale"), "x").unwrap();

        let mut command = import("https://example.com/r");
        command.force = true;
        let plan = plan_import(&target, None, &command).await;

        assert!(matches!(plan, ImportPlan::Checkout));
        assert!(target.is_dir());
        assert!(!target.join("stale").exists());
    }

    #[tokio::test]
    async fn test_plan_import_same_url_updates() {
        let temp_dir = TempDir::new().unwrap();
        let plan = plan_import(
            temp_dir.path(),
            Some("https://example.com/r/"),
            &import("https://example.com/r"),
        )
        .await;
        assert!(matches!(plan, ImportPlan::Update));
    }
}
