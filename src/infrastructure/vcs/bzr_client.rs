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

const PARENT_BRANCH_PREFIX: &str = "  parent branch: ";

/// Bazaar implementation of the client interface
#[derive(Debug)]
pub struct BzrClient {
    path: PathBuf,
    runner: Arc<CommandRunner>,
    bzr_executable: String,
}

impl BzrClient {
    pub fn new(path: impl Into<PathBuf>, runner: Arc<CommandRunner>) -> Self {
        Self {
            path: path.into(),
            runner,
            bzr_executable: "bzr".to_string(),
        }
    }

    pub fn is_repository_path(path: &Path) -> bool {
        path.join(".bzr").is_dir()
    }

    async fn bzr(&self, args: &[&str]) -> JobResult {
        self.bzr_with_retry(args, 0).await
    }

    async fn bzr_with_retry(&self, args: &[&str], retry: u32) -> JobResult {
        let config = ExecutionConfig::new(&self.path).with_retry(retry);
        self.runner.run(&self.bzr_executable, args, &config).await
    }

    /// Parent branch URL as reported by `bzr info`
    async fn parent_branch(&self) -> JobResult {
        // the parsed text is localized
        let config = ExecutionConfig::new(&self.path).with_environment_variable("LANG", "en_US.UTF-8");
        let result = self.runner.run(&self.bzr_executable, &["info"], &config).await;
        if !result.is_success() {
            return result;
        }
        let branch = result
            .output
            .lines()
            .find_map(|line| line.strip_prefix(PARENT_BRANCH_PREFIX))
            .map(str::to_string);
        match branch {
            Some(branch) => result.with_output(branch),
            None => {
                let mut result = result.with_output("Could not determine parent branch");
                result.returncode = 1;
                result
            }
        }
    }

    async fn revno(&self, revision: Option<&str>) -> JobResult {
        match revision {
            Some(revision) => self.bzr(&["revno", "--rev", revision]).await,
            None => self.bzr(&["revno"]).await,
        }
    }

    /// Most recent tag that points at a revision of this branch
    async fn latest_tag(&self) -> Result<String, JobResult> {
        let tags = self.bzr(&["tags", "--sort=time"]).await;
        if !tags.is_success() {
            return Err(tags);
        }
        let latest = tags
            .output
            .lines()
            .filter_map(|line| {
                let mut parts = line.split_whitespace();
                match (parts.next(), parts.next()) {
                    (Some(tag), Some(revision)) if revision != "?" => Some(tag.to_string()),
                    _ => None,
                }
            })
            .last();
        latest.ok_or_else(|| {
            let mut result = tags.with_output("Could not determine latest tag");
            result.returncode = 1;
            result
        })
    }
}

#[async_trait]
impl VcsClient for BzrClient {
    fn vcs_type(&self) -> VcsType {
        VcsType::Bzr
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
            let parent = self.parent_branch().await;
            if !parent.is_success() {
                return parent;
            }
            Some(parent.output)
        } else {
            None
        };

        match plan_import(&self.path, current_url.as_deref(), command).await {
            ImportPlan::Done(result) => result,
            ImportPlan::Update => self.bzr_with_retry(&["pull"], command.retry).await,
            ImportPlan::Checkout => {
                let mut args = vec!["branch"];
                if let Some(version) = &command.version {
                    args.extend(["-r", version.as_str()]);
                }
                args.extend([command.url.as_str(), "."]);
                let result = self.bzr_with_retry(&args, command.retry).await;
                if !result.is_success() {
                    let output = format!(
                        "Could not branch repository '{}': {}",
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
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let config = ExecutionConfig::new(cwd).with_retry(command.retry);
        let mut result = self
            .runner
            .run(&self.bzr_executable, &["info", command.url.as_str()], &config)
            .await;
        result.cwd = self.path.clone();

        let output = if result.is_success() {
            format!("Found bzr repository '{}'", command.url)
        } else {
            format!(
                "Failed to contact remote repository '{}': {}",
                command.url, result.output
            )
        };
        result.with_output(output)
    }

    async fn export(&self, command: &ExportCommand) -> JobResult {
        let parent = self.parent_branch().await;
        if !parent.is_success() {
            return parent;
        }
        let url = parent.output.clone();

        let version = if command.exact {
            let revno = self.revno(None).await;
            if !revno.is_success() {
                return revno;
            }
            Some(revno.output.trim().to_string())
        } else {
            None
        };

        let output = match &version {
            Some(version) => format!("{}\n{}", url, version),
            None => url.clone(),
        };
        parent
            .with_output(output)
            .with_export(ExportInfo { url, version })
    }

    async fn pull(&self, command: &PullCommand) -> JobResult {
        self.bzr_with_retry(&["pull"], command.retry).await
    }

    async fn push(&self, _command: &PushCommand) -> JobResult {
        self.bzr(&["push"]).await
    }

    async fn status(&self, command: &StatusCommand) -> JobResult {
        if command.quiet {
            self.bzr(&["status", "--versioned"]).await
        } else {
            self.bzr(&["status"]).await
        }
    }

    async fn diff(&self, _command: &DiffCommand) -> JobResult {
        self.bzr(&["diff"]).await
    }

    async fn log(&self, command: &LogCommand) -> JobResult {
        let limit = command.limit.to_string();

        if command.limit_tag.is_some() || command.limit_untagged {
            let tag = match &command.limit_tag {
                Some(tag) => tag.clone(),
                None => match self.latest_tag().await {
                    Ok(tag) => tag,
                    Err(result) => return result,
                },
            };

            let tag_revno = self.revno(Some(&format!("tag:{}", tag))).await;
            if !tag_revno.is_success() {
                if command.limit_tag.is_some() {
                    return tag_revno.with_output(format!("Repository lacks the tag '{}'", tag));
                }
                return tag_revno;
            }
            let head_revno = self.revno(None).await;
            if !head_revno.is_success() {
                return head_revno;
            }

            let tag_rev = tag_revno.output.trim();
            let next_rev = tag_rev
                .parse::<u64>()
                .map(|n| (n + 1).to_string())
                .unwrap_or_else(|_| tag_rev.to_string());
            let range = format!("revno:{}..", next_rev);
            let mut args = vec!["log", "--rev", range.as_str()];

            if tag_rev == head_revno.output.trim() {
                return JobResult::new(
                    CommandRunner::format_command(&self.bzr_executable, &args),
                    &self.path,
                    "",
                    0,
                );
            }
            if command.limit != 0 {
                args.extend(["--limit", limit.as_str()]);
            }
            return self.bzr(&args).await;
        }

        let mut args = vec!["log"];
        if command.limit != 0 {
            args.extend(["--limit", limit.as_str()]);
        }
        if command.verbose {
            args.push("--verbose");
        }
        self.bzr(&args).await
    }

    async fn branch(&self, command: &BranchCommand) -> JobResult {
        if command.all {
            return self.not_applicable(
                "branch",
                Some("at least with the option to list all branches"),
            );
        }
        self.parent_branch().await
    }

    async fn remotes(&self, _command: &RemotesCommand) -> JobResult {
        self.parent_branch().await
    }

    async fn custom(&self, command: &CustomCommand) -> JobResult {
        let args: Vec<&str> = command.args.iter().map(String::as_str).collect();
        self.bzr(&args).await
    }

    async fn checkout(&self, options: &CheckoutOptions) -> Result<bool, ClientError> {
        ensure_checkout_target(&self.path, &options.url)?;
        // `bzr branch` creates the target itself
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let target = absolute_path(&self.path)?.display().to_string();

        let mut args = vec!["branch"];
        if options.verbose {
            args.push("--verbose");
        }
        if let Some(version) = &options.version {
            args.extend(["--revision", version.as_str()]);
        }
        args.extend([options.url.as_str(), target.as_str()]);

        let cwd = std::env::current_dir()?;
        let config = ExecutionConfig::new(cwd).with_timeout(options.timeout);
        Ok(self
            .runner
            .run(&self.bzr_executable, &args, &config)
            .await
            .is_success())
    }

    async fn export_repository(
        &self,
        version: Option<&str>,
        basepath: &Path,
    ) -> Result<bool, ClientError> {
        let archive = archive_file_name(&absolute_path(basepath)?)
            .display()
            .to_string();
        let mut args = vec!["export", "--format=tgz", archive.as_str()];
        if let Some(version) = version {
            args.extend(["--revision", version]);
        }
        Ok(self.bzr(&args).await.is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn client(path: &Path) -> BzrClient {
        BzrClient::new(path, Arc::new(CommandRunner::new()))
    }

    #[tokio::test]
    async fn test_branch_all_is_not_applicable() {
        let temp_dir = TempDir::new().unwrap();
        let result = client(temp_dir.path())
            .branch(&BranchCommand { all: true })
            .await;

        assert_eq!(result.returncode, 0);
        assert_eq!(
            result.output,
            "Command 'branch' not applicable for client 'bzr': at least with the option to list all branches"
        );
    }

    #[tokio::test]
    async fn test_import_without_url() {
        let temp_dir = TempDir::new().unwrap();
        let result = client(temp_dir.path())
            .import(&ImportCommand::default())
            .await;
        assert_eq!(result.returncode, 1);
        assert_eq!(result.output, "Repository data lacks the 'url' value");
    }

    #[test]
    fn test_is_repository() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!client(temp_dir.path()).is_repository());
        std::fs::create_dir(temp_dir.path().join(".bzr")).unwrap();
        assert!(client(temp_dir.path()).is_repository());
    }
}
