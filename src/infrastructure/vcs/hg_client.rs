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

/// Mercurial implementation of the client interface
#[derive(Debug)]
pub struct HgClient {
    path: PathBuf,
    runner: Arc<CommandRunner>,
    hg_executable: String,
}

impl HgClient {
    pub fn new(path: impl Into<PathBuf>, runner: Arc<CommandRunner>) -> Self {
        Self {
            path: path.into(),
            runner,
            hg_executable: "hg".to_string(),
        }
    }

    pub fn is_repository_path(path: &Path) -> bool {
        path.join(".hg").is_dir()
    }

    async fn hg(&self, args: &[&str]) -> JobResult {
        self.hg_with_retry(args, 0).await
    }

    async fn hg_with_retry(&self, args: &[&str], retry: u32) -> JobResult {
        let config = ExecutionConfig::new(&self.path)
            .with_retry(retry)
            .with_environment_variable("HGPLAIN", "1");
        self.runner.run(&self.hg_executable, args, &config).await
    }

    async fn default_path(&self) -> JobResult {
        self.hg(&["paths", "default"]).await
    }

    async fn update_to(&self, result: JobResult, version: Option<&str>) -> JobResult {
        let mut args = vec!["update"];
        if let Some(version) = version {
            args.push(version);
        }
        let update = self.hg(&args).await;
        if !update.is_success() {
            let output = format!(
                "Could not update to '{}': {}",
                version.unwrap_or("tip"),
                update.output
            );
            return update.with_output(output);
        }
        result.then(update)
    }
}

#[async_trait]
impl VcsClient for HgClient {
    fn vcs_type(&self) -> VcsType {
        VcsType::Hg
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
            let result = self.default_path().await;
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
                let pull = self.hg_with_retry(&["pull"], command.retry).await;
                if !pull.is_success() || command.skip_existing {
                    return pull;
                }
                self.update_to(pull, command.version.as_deref()).await
            }
            ImportPlan::Checkout => {
                let clone = self
                    .hg_with_retry(&["clone", "--noupdate", command.url.as_str(), "."], command.retry)
                    .await;
                if !clone.is_success() {
                    let output = format!(
                        "Could not clone repository '{}': {}",
                        command.url, clone.output
                    );
                    return clone.with_output(output);
                }
                self.update_to(clone, command.version.as_deref()).await
            }
        }
    }

    async fn validate(&self, command: &ValidateCommand) -> JobResult {
        if command.url.is_empty() {
            return missing_url(&self.path);
        }
        let mut args = vec!["identify", command.url.as_str()];
        if let Some(version) = &command.version {
            args.extend(["--rev", version.as_str()]);
        }
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let config = ExecutionConfig::new(cwd).with_retry(command.retry);
        let mut result = self.runner.run(&self.hg_executable, &args, &config).await;
        result.cwd = self.path.clone();

        let output = match (&command.version, result.is_success()) {
            (_, false) => format!(
                "Failed to contact remote repository '{}': {}",
                command.url, result.output
            ),
            (Some(version), true) => {
                format!("Found hg repository '{}' with changeset '{}'", command.url, version)
            }
            (None, true) => format!("Found hg repository '{}' with default branch", command.url),
        };
        result.with_output(output)
    }

    async fn export(&self, command: &ExportCommand) -> JobResult {
        let url = self.default_path().await;
        if !url.is_success() {
            return url;
        }
        let url = url.output.trim().to_string();

        let version = if command.exact {
            let node = self.hg(&["log", "--rev", ".", "--template", "{node}"]).await;
            if !node.is_success() {
                return node;
            }
            let mut version = node.output.trim().to_string();
            if command.with_tags {
                let tags = self.hg(&["log", "--rev", ".", "--template", "{tags}"]).await;
                if let Some(tag) = tags
                    .output
                    .split_whitespace()
                    .find(|tag| *tag != "tip")
                    .filter(|_| tags.is_success())
                {
                    version = tag.to_string();
                }
            }
            version
        } else {
            let branch = self.hg(&["branch"]).await;
            if !branch.is_success() {
                return branch;
            }
            branch.output.trim().to_string()
        };

        JobResult::new("hg paths default", &self.path, format!("{}\n{}", url, version), 0)
            .with_export(ExportInfo {
                url,
                version: Some(version),
            })
    }

    async fn pull(&self, command: &PullCommand) -> JobResult {
        self.hg_with_retry(&["pull", "--update"], command.retry).await
    }

    async fn push(&self, _command: &PushCommand) -> JobResult {
        self.hg(&["push"]).await
    }

    async fn status(&self, command: &StatusCommand) -> JobResult {
        if command.quiet {
            self.hg(&["status", "--quiet"]).await
        } else {
            self.hg(&["status"]).await
        }
    }

    async fn diff(&self, command: &DiffCommand) -> JobResult {
        let context = command.context.map(|n| n.to_string());
        let mut args = vec!["diff"];
        if let Some(context) = &context {
            args.extend(["--unified", context.as_str()]);
        }
        self.hg(&args).await
    }

    async fn log(&self, command: &LogCommand) -> JobResult {
        let mut revset = None;
        if command.limit_tag.is_some() || command.limit_untagged {
            let tag = match &command.limit_tag {
                Some(tag) => tag.clone(),
                None => {
                    let latest = self
                        .hg(&["log", "--rev", ".", "--template", "{latesttag}"])
                        .await;
                    let tag = latest.output.trim().to_string();
                    if !latest.is_success() || tag.is_empty() || tag == "null" {
                        return latest.with_output("Could not determine latest tag");
                    }
                    tag
                }
            };
            let exists = self.hg(&["log", "--rev", format!("tag('{}')", tag).as_str()]).await;
            if !exists.is_success() {
                return exists.with_output(format!("Repository lacks the tag '{}'", tag));
            }
            revset = Some(format!("tag('{}')::. - tag('{}')", tag, tag));
        }

        let limit = command.limit.to_string();
        let mut args = vec!["log"];
        if command.limit != 0 {
            args.extend(["--limit", limit.as_str()]);
        }
        if command.merge_only {
            args.push("--only-merges");
        }
        if command.verbose {
            args.push("--verbose");
        }
        if let Some(revset) = &revset {
            args.extend(["--rev", revset.as_str()]);
        }
        self.hg(&args).await
    }

    async fn branch(&self, command: &BranchCommand) -> JobResult {
        if command.all {
            self.hg(&["branches"]).await
        } else {
            self.hg(&["branch"]).await
        }
    }

    async fn remotes(&self, _command: &RemotesCommand) -> JobResult {
        self.hg(&["paths"]).await
    }

    async fn custom(&self, command: &CustomCommand) -> JobResult {
        let args: Vec<&str> = command.args.iter().map(String::as_str).collect();
        self.hg(&args).await
    }

    async fn checkout(&self, options: &CheckoutOptions) -> Result<bool, ClientError> {
        ensure_checkout_target(&self.path, &options.url)?;
        tokio::fs::create_dir_all(&self.path).await?;

        let mut args = vec!["clone"];
        if !options.verbose {
            args.push("--quiet");
        }
        if let Some(version) = &options.version {
            args.extend(["--updaterev", version.as_str()]);
        }
        args.extend([options.url.as_str(), "."]);

        let config = ExecutionConfig::new(&self.path).with_timeout(options.timeout);
        Ok(self
            .runner
            .run(&self.hg_executable, &args, &config)
            .await
            .is_success())
    }

    async fn export_repository(
        &self,
        version: Option<&str>,
        basepath: &Path,
    ) -> Result<bool, ClientError> {
        let basepath = absolute_path(basepath)?;
        let prefix = basepath
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "export".to_string());
        let archive = archive_file_name(&basepath).display().to_string();

        let args = [
            "archive",
            "--type",
            "tgz",
            "--prefix",
            prefix.as_str(),
            "--rev",
            version.unwrap_or("."),
            archive.as_str(),
        ];
        Ok(self.hg(&args).await.is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_repository() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!HgClient::is_repository_path(temp_dir.path()));
        std::fs::create_dir(temp_dir.path().join(".hg")).unwrap();
        assert!(HgClient::is_repository_path(temp_dir.path()));
    }

    #[tokio::test]
    async fn test_checkout_rejects_empty_url() {
        let temp_dir = TempDir::new().unwrap();
        let client = HgClient::new(temp_dir.path(), Arc::new(CommandRunner::new()));
        let err = client.checkout(&CheckoutOptions::new(" ")).await.unwrap_err();
        assert!(err.to_string().starts_with("Invalid empty url"));
    }

    #[tokio::test]
    async fn test_validate_without_url_fails() {
        let temp_dir = TempDir::new().unwrap();
        let client = HgClient::new(temp_dir.path(), Arc::new(CommandRunner::new()));
        let result = client.validate(&ValidateCommand::default()).await;
        assert_eq!(result.returncode, 1);
    }
}
