use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::client::{
    absolute_path, archive_file_name, ensure_checkout_target, missing_url, plan_import,
    BranchCommand, CheckoutOptions, ClientError, CustomCommand, DiffCommand, ExportCommand,
    ImportCommand, ImportPlan, LogCommand, PullCommand, PushCommand, RemotesCommand,
    StatusCommand, ValidateCommand, VcsClient,
};
use crate::domain::entities::{ExportInfo, JobResult};
use crate::domain::value_objects::VcsType;
use crate::infrastructure::process::{CommandRunner, ExecutionConfig};

/// Subversion implementation of the client interface
#[derive(Debug)]
pub struct SvnClient {
    path: PathBuf,
    runner: Arc<CommandRunner>,
    svn_executable: String,
}

impl SvnClient {
    pub fn new(path: impl Into<PathBuf>, runner: Arc<CommandRunner>) -> Self {
        Self {
            path: path.into(),
            runner,
            svn_executable: "svn".to_string(),
        }
    }

    pub fn is_repository_path(path: &Path) -> bool {
        path.join(".svn").is_dir()
    }

    async fn svn(&self, args: &[&str]) -> JobResult {
        self.svn_with_retry(args, 0).await
    }

    async fn svn_with_retry(&self, args: &[&str], retry: u32) -> JobResult {
        let config = ExecutionConfig::new(&self.path)
            .with_retry(retry)
            .with_environment_variable("LC_ALL", "C");
        self.runner.run(&self.svn_executable, args, &config).await
    }

    async fn info_item(&self, item: &str) -> JobResult {
        self.svn(&["info", "--show-item", item]).await
    }
}

#[async_trait]
impl VcsClient for SvnClient {
    fn vcs_type(&self) -> VcsType {
        VcsType::Svn
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn is_repository(&self) -> bool {
        Self::is_repository_path(&self.path)
    }

    async fn import(&self, command: &ImportCommand) -> JobResult {
        if command.url.is_empty() {
            return missing_url(&self.path);
        }

        let current_url = if self.is_repository() {
            let result = self.info_item("url").await;
            if !result.is_success() {
                return result;
            }
            Some(result.output.trim().to_string())
        } else {
            None
        };

        match plan_import(&self.path, current_url.as_deref(), command).await {
            ImportPlan::Done(result) => result,
            ImportPlan::Update => {
                if command.skip_existing {
                    return JobResult::success(&self.path, "Skipped existing working copy");
                }
                let mut args = vec!["update", "--non-interactive"];
                if let Some(version) = &command.version {
                    args.extend(["--revision", version.as_str()]);
                }
                self.svn_with_retry(&args, command.retry).await
            }
            ImportPlan::Checkout => {
                let mut args = vec!["checkout", "--non-interactive"];
                if let Some(version) = &command.version {
                    args.extend(["--revision", version.as_str()]);
                }
                args.extend([command.url.as_str(), "."]);
                let result = self.svn_with_retry(&args, command.retry).await;
                if !result.is_success() {
                    let output = format!(
                        "Could not checkout repository '{}': {}",
                        command.url, result.output
                    );
                    return result.with_output(output);
                }
                result
            }
        }
    }

    async fn validate(&self, command: &ValidateCommand) -> JobResult {
        if command.url.is_empty() {
            return missing_url(&self.path);
        }
        let mut args = vec!["info", "--non-interactive"];
        if let Some(version) = &command.version {
            args.extend(["--revision", version.as_str()]);
        }
        args.push(command.url.as_str());

        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let config = ExecutionConfig::new(cwd)
            .with_retry(command.retry)
            .with_environment_variable("LC_ALL", "C");
        let mut result = self.runner.run(&self.svn_executable, &args, &config).await;
        result.cwd = self.path.clone();

        let output = if result.is_success() {
            match &command.version {
                Some(version) => format!(
                    "Found svn repository '{}' with revision '{}'",
                    command.url, version
                ),
                None => format!("Found svn repository '{}'", command.url),
            }
        } else {
            format!(
                "Failed to contact remote repository '{}': {}",
                command.url, result.output
            )
        };
        result.with_output(output)
    }

    async fn export(&self, command: &ExportCommand) -> JobResult {
        let url = self.info_item("url").await;
        if !url.is_success() {
            return url;
        }
        let url = url.output.trim().to_string();

        let version = if command.exact {
            let revision = self.info_item("revision").await;
            if !revision.is_success() {
                return revision;
            }
            Some(revision.output.trim().to_string())
        } else {
            None
        };

        let output = match &version {
            Some(version) => format!("{}\n{}", url, version),
            None => url.clone(),
        };
        JobResult::new("svn info --show-item url", &self.path, output, 0)
            .with_export(ExportInfo { url, version })
    }

    async fn pull(&self, command: &PullCommand) -> JobResult {
        self.svn_with_retry(&["update", "--non-interactive"], command.retry)
            .await
    }

    async fn push(&self, _command: &PushCommand) -> JobResult {
        self.not_applicable("push", Some("changes are committed directly to the server"))
    }

    async fn status(&self, command: &StatusCommand) -> JobResult {
        if command.quiet {
            self.svn(&["status", "--quiet"]).await
        } else {
            self.svn(&["status"]).await
        }
    }

    async fn diff(&self, command: &DiffCommand) -> JobResult {
        let extension = command.context.map(|n| format!("--unified --context {}", n));
        let mut args = vec!["diff"];
        if let Some(extension) = &extension {
            args.extend(["--extensions", extension.as_str()]);
        }
        self.svn(&args).await
    }

    async fn log(&self, command: &LogCommand) -> JobResult {
        if command.limit_tag.is_some() || command.limit_untagged {
            return self.not_applicable("log", Some("svn has no tags to limit the log by"));
        }
        let limit = command.limit.to_string();
        let mut args = vec!["log"];
        if command.limit != 0 {
            args.extend(["--limit", limit.as_str()]);
        }
        if command.verbose {
            args.push("--verbose");
        }
        self.svn(&args).await
    }

    async fn branch(&self, command: &BranchCommand) -> JobResult {
        if command.all {
            return self.not_applicable("branch", Some("at least with the option to list all branches"));
        }
        self.info_item("relative-url").await
    }

    async fn remotes(&self, _command: &RemotesCommand) -> JobResult {
        self.info_item("url").await
    }

    async fn custom(&self, command: &CustomCommand) -> JobResult {
        let args: Vec<&str> = command.args.iter().map(String::as_str).collect();
        self.svn(&args).await
    }

    async fn checkout(&self, options: &CheckoutOptions) -> Result<bool, ClientError> {
        ensure_checkout_target(&self.path, &options.url)?;
        tokio::fs::create_dir_all(&self.path).await?;

        let mut args = vec!["checkout", "--non-interactive"];
        if !options.verbose {
            args.push("--quiet");
        }
        if let Some(version) = &options.version {
            args.extend(["--revision", version.as_str()]);
        }
        args.extend([options.url.as_str(), "."]);

        let config = ExecutionConfig::new(&self.path).with_timeout(options.timeout);
        Ok(self
            .runner
            .run(&self.svn_executable, &args, &config)
            .await
            .is_success())
    }

    async fn export_repository(
        &self,
        version: Option<&str>,
        basepath: &Path,
    ) -> Result<bool, ClientError> {
        let basepath = absolute_path(basepath)?;
        let name = basepath
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "export".to_string());
        let staging = tempfile::tempdir()?;
        let exported = staging.path().join(&name);
        let exported_arg = exported.display().to_string();

        let mut args = vec!["export", "--quiet"];
        if let Some(version) = version {
            args.extend(["--revision", version]);
        }
        args.extend([".", exported_arg.as_str()]);
        if !self.svn(&args).await.is_success() {
            return Ok(false);
        }

        let archive = archive_file_name(&basepath).display().to_string();
        let staging_arg = staging.path().display().to_string();
        let tar = self
            .runner
            .run(
                "tar",
                &["-czf", archive.as_str(), "-C", staging_arg.as_str(), name.as_str()],
                &ExecutionConfig::new(&self.path),
            )
            .await;
        Ok(tar.is_success())
    }
}
