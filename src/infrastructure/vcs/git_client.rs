use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::client::{
    absolute_path, archive_file_name, ensure_checkout_target, missing_url, plan_import, urls_match,
    BranchCommand, CheckoutOptions, ClientError, CustomCommand, DiffCommand, ExportCommand,
    ImportCommand, ImportPlan, LogCommand, PullCommand, PushCommand, RemotesCommand,
    StatusCommand, ValidateCommand, VcsClient,
};
use crate::domain::entities::{ExportInfo, JobResult};
use crate::domain::value_objects::VcsType;
use crate::infrastructure::process::{CommandRunner, ExecutionConfig};

/// Git implementation of the client interface
#[derive(Debug)]
pub struct GitClient {
    path: PathBuf,
    runner: Arc<CommandRunner>,
    git_executable: String,
}

impl GitClient {
    /// Create a new Git client for `path`
    pub fn new(path: impl Into<PathBuf>, runner: Arc<CommandRunner>) -> Self {
        Self::with_executable(path, runner, "git")
    }

    /// Create a new Git client with custom executable path
    pub fn with_executable(
        path: impl Into<PathBuf>,
        runner: Arc<CommandRunner>,
        executable: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            runner,
            git_executable: executable.into(),
        }
    }

    /// Check if a directory is a git working copy
    pub fn is_repository_path(path: &Path) -> bool {
        path.join(".git").exists()
    }

    async fn git(&self, args: &[&str]) -> JobResult {
        self.git_with_retry(args, 0).await
    }

    async fn git_with_retry(&self, args: &[&str], retry: u32) -> JobResult {
        let config = ExecutionConfig::new(&self.path).with_retry(retry);
        self.runner.run(&self.git_executable, args, &config).await
    }

    /// Remotes as (name, fetch url) pairs in the order git lists them
    async fn remotes_list(&self) -> Result<Vec<(String, String)>, JobResult> {
        let result = self.git(&["remote", "-v"]).await;
        if !result.is_success() {
            return Err(result);
        }
        let mut remotes: Vec<(String, String)> = Vec::new();
        for line in result.output.lines() {
            let mut parts = line.split_whitespace();
            if let (Some(name), Some(url)) = (parts.next(), parts.next()) {
                if !remotes.iter().any(|(n, _)| n == name) {
                    remotes.push((name.to_string(), url.to_string()));
                }
            }
        }
        Ok(remotes)
    }

    async fn update(&self, remote: &str, command: &ImportCommand) -> JobResult {
        let fetch = self
            .git_with_retry(&["fetch", "--tags", remote], command.retry)
            .await;
        if !fetch.is_success() {
            let output = format!("Could not fetch remote '{}': {}", remote, fetch.output);
            return fetch.with_output(output);
        }
        if command.skip_existing {
            return fetch;
        }

        let mut result = fetch;
        if let Some(version) = &command.version {
            let checkout = self.git(&["checkout", version.as_str()]).await;
            if !checkout.is_success() {
                let output = format!("Could not checkout ref '{}': {}", version, checkout.output);
                return checkout.with_output(output);
            }
            result = result.then(checkout);
        }

        let upstream = self
            .git(&["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"])
            .await;
        if upstream.is_success() {
            let merge = self
                .git(&["merge", "--ff-only", upstream.output.trim()])
                .await;
            result = result.then(merge);
        }

        if result.is_success() && command.recursive {
            result = result.then(self.update_submodules(command.retry).await);
        }
        result
    }

    async fn clone_into(&self, command: &ImportCommand) -> JobResult {
        let version = command.version.as_deref();
        let result = match version {
            Some(hash) if command.shallow && is_full_hash(hash) => {
                self.shallow_fetch_commit(&command.url, hash, command.retry).await
            }
            _ => {
                let mut args = vec!["clone"];
                if command.recursive {
                    args.push("--recursive");
                }
                if command.shallow {
                    args.extend(["--depth", "1"]);
                    if let Some(version) = version {
                        args.extend(["--branch", version]);
                    }
                }
                args.extend([command.url.as_str(), "."]);
                self.git_with_retry(&args, command.retry).await
            }
        };
        if !result.is_success() {
            let output = format!("Could not clone repository '{}': {}", command.url, result.output);
            return result.with_output(output);
        }
        if command.shallow {
            return result;
        }

        let mut result = result;
        if let Some(version) = version {
            let checkout = self.git(&["checkout", version]).await;
            if !checkout.is_success() {
                let output = format!("Could not checkout ref '{}': {}", version, checkout.output);
                return checkout.with_output(output);
            }
            result = result.then(checkout);
            if command.recursive {
                result = result.then(self.update_submodules(command.retry).await);
            }
        }
        result
    }

    /// Shallow clones of a single commit need an explicit fetch
    async fn shallow_fetch_commit(&self, url: &str, hash: &str, retry: u32) -> JobResult {
        let init = self.git(&["init", "--quiet"]).await;
        if !init.is_success() {
            return init;
        }
        let add = self.git(&["remote", "add", "origin", url]).await;
        if !add.is_success() {
            return add;
        }
        let fetch = self
            .git_with_retry(&["fetch", "--depth", "1", "origin", hash], retry)
            .await;
        if !fetch.is_success() {
            return fetch;
        }
        fetch.then(self.git(&["checkout", "--quiet", "FETCH_HEAD"]).await)
    }

    async fn update_submodules(&self, retry: u32) -> JobResult {
        self.git_with_retry(&["submodule", "update", "--init", "--recursive"], retry)
            .await
    }

    async fn nearest_tag(&self) -> Result<String, JobResult> {
        let result = self.git(&["describe", "--abbrev=0", "--tags"]).await;
        if !result.is_success() {
            return Err(result.with_output("Could not determine latest tag"));
        }
        Ok(result.output.trim().to_string())
    }
}

/// 40 hex characters
fn is_full_hash(version: &str) -> bool {
    version.len() == 40 && version.chars().all(|c| c.is_ascii_hexdigit())
}

/// Something that could be an abbreviated or full commit hash
fn looks_like_hash(version: &str) -> bool {
    (4..=40).contains(&version.len()) && version.chars().all(|c| c.is_ascii_hexdigit())
}

#[async_trait]
impl VcsClient for GitClient {
    fn vcs_type(&self) -> VcsType {
        VcsType::Git
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

        let mut matching_remote = None;
        let current_url = if self.is_repository() {
            let remotes = match self.remotes_list().await {
                Ok(remotes) => remotes,
                Err(result) => return result,
            };
            match remotes.iter().find(|(_, url)| urls_match(url, &command.url)) {
                Some((name, url)) => {
                    matching_remote = Some(name.clone());
                    Some(url.clone())
                }
                None => Some(remotes.first().map(|(_, url)| url.clone()).unwrap_or_default()),
            }
        } else {
            None
        };

        match plan_import(&self.path, current_url.as_deref(), command).await {
            ImportPlan::Done(result) => result,
            ImportPlan::Update => {
                let remote = matching_remote.as_deref().unwrap_or("origin");
                self.update(remote, command).await
            }
            ImportPlan::Checkout => self.clone_into(command).await,
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
            .run(&self.git_executable, &["ls-remote", command.url.as_str()], &config)
            .await;
        result.cwd = self.path.clone();
        if !result.is_success() {
            let output = format!(
                "Failed to contact remote repository '{}': {}",
                command.url, result.output
            );
            return result.with_output(output);
        }

        let Some(version) = &command.version else {
            let output = format!("Found git repository '{}' with default branch", command.url);
            return result.with_output(output);
        };
        let refs: Vec<&str> = result
            .output
            .lines()
            .filter_map(|line| line.split_whitespace().nth(1))
            .collect();
        let head = format!("refs/heads/{}", version);
        let tag = format!("refs/tags/{}", version);
        if refs.iter().any(|r| *r == head) {
            let output = format!("Found git repository '{}' with branch '{}'", command.url, version);
            result.with_output(output)
        } else if refs.iter().any(|r| *r == tag) {
            let output = format!("Found git repository '{}' with tag '{}'", command.url, version);
            result.with_output(output)
        } else if looks_like_hash(version) {
            let output = format!(
                "Found git repository '{}' but unable to verify non-branch / non-tag ref '{}' without cloning the repo",
                command.url, version
            );
            result.with_output(output)
        } else {
            let output = format!(
                "No tag or branch with name '{}' found in '{}'",
                version, command.url
            );
            let mut failed = result.with_output(output);
            failed.returncode = 1;
            failed
        }
    }

    async fn export(&self, command: &ExportCommand) -> JobResult {
        let branch = self.git(&["rev-parse", "--abbrev-ref", "HEAD"]).await;
        if !branch.is_success() {
            return branch;
        }
        let branch_name = branch.output.trim().to_string();
        let detached = branch_name == "HEAD";

        let mut remote = None;
        if !detached {
            let key = format!("branch.{}.remote", branch_name);
            let configured = self.git(&["config", "--get", key.as_str()]).await;
            if configured.is_success() {
                remote = Some(configured.output.trim().to_string());
            }
        }
        let remote = match remote {
            Some(remote) => remote,
            None => match self.remotes_list().await {
                Ok(remotes) => match remotes.into_iter().next() {
                    Some((name, _)) => name,
                    None => return JobResult::failure(&self.path, "Repository has no remotes"),
                },
                Err(result) => return result,
            },
        };

        let url = self.git(&["remote", "get-url", remote.as_str()]).await;
        if !url.is_success() {
            return url;
        }
        let url = url.output.trim().to_string();

        let version = if command.exact || detached {
            let hash = self.git(&["rev-parse", "HEAD"]).await;
            if !hash.is_success() {
                return hash;
            }
            let mut version = hash.output.trim().to_string();
            if command.with_tags {
                let tag = self
                    .git(&["describe", "--exact-match", "--tags", "HEAD"])
                    .await;
                if tag.is_success() {
                    version = tag.output.trim().to_string();
                }
            }
            version
        } else {
            branch_name
        };

        JobResult::new(
            "git rev-parse HEAD",
            &self.path,
            format!("{}\n{}", url, version),
            0,
        )
        .with_export(ExportInfo {
            url,
            version: Some(version),
        })
    }

    async fn pull(&self, command: &PullCommand) -> JobResult {
        self.git_with_retry(&["pull", "--stat"], command.retry).await
    }

    async fn push(&self, _command: &PushCommand) -> JobResult {
        self.git(&["push"]).await
    }

    async fn status(&self, command: &StatusCommand) -> JobResult {
        let mut args = vec!["status", "-s"];
        if command.quiet {
            args.push("--untracked-files=no");
        }
        self.git(&args).await
    }

    async fn diff(&self, command: &DiffCommand) -> JobResult {
        let unified = command.context.map(|n| format!("--unified={}", n));
        let mut args = vec!["diff", "--no-ext-diff"];
        if let Some(unified) = &unified {
            args.push(unified.as_str());
        }
        self.git(&args).await
    }

    async fn log(&self, command: &LogCommand) -> JobResult {
        let mut range = None;
        if command.limit_tag.is_some() || command.limit_untagged {
            let tag = match &command.limit_tag {
                Some(tag) => tag.clone(),
                None => match self.nearest_tag().await {
                    Ok(tag) => tag,
                    Err(result) => return result,
                },
            };
            let tag_ref = format!("refs/tags/{}", tag);
            let exists = self
                .git(&["rev-parse", "--verify", "--quiet", tag_ref.as_str()])
                .await;
            if !exists.is_success() {
                return exists.with_output(format!("Repository lacks the tag '{}'", tag));
            }
            range = Some(format!("{}..", tag));
        }

        let limit = format!("-{}", command.limit);
        let mut args = vec!["log", "--decorate"];
        if command.merge_only {
            args.push("--merges");
        }
        if command.verbose {
            args.push("--stat");
        }
        if command.limit != 0 {
            args.push(limit.as_str());
        }
        if let Some(range) = &range {
            args.push(range.as_str());
        }
        self.git(&args).await
    }

    async fn branch(&self, command: &BranchCommand) -> JobResult {
        if command.all {
            self.git(&["branch", "--all"]).await
        } else {
            self.git(&["branch"]).await
        }
    }

    async fn remotes(&self, _command: &RemotesCommand) -> JobResult {
        self.git(&["remote", "-v"]).await
    }

    async fn custom(&self, command: &CustomCommand) -> JobResult {
        let args: Vec<&str> = command.args.iter().map(String::as_str).collect();
        self.git(&args).await
    }

    async fn checkout(&self, options: &CheckoutOptions) -> Result<bool, ClientError> {
        ensure_checkout_target(&self.path, &options.url)?;
        tokio::fs::create_dir_all(&self.path).await?;

        let mut args = vec!["clone"];
        if !options.verbose {
            args.push("--quiet");
        }
        if options.shallow {
            args.extend(["--depth", "1"]);
            if let Some(version) = &options.version {
                args.extend(["--branch", version.as_str()]);
            }
        }
        args.extend([options.url.as_str(), "."]);

        let config = ExecutionConfig::new(&self.path).with_timeout(options.timeout);
        let result = self.runner.run(&self.git_executable, &args, &config).await;
        if !result.is_success() {
            return Ok(false);
        }

        if let (Some(version), false) = (&options.version, options.shallow) {
            let checkout = self.git(&["checkout", "--quiet", version.as_str()]).await;
            return Ok(checkout.is_success());
        }
        Ok(true)
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
        let prefix = format!("--prefix={}/", name);
        let output = format!("--output={}", archive_file_name(&basepath).display());

        let args = [
            "archive",
            "--format=tar.gz",
            prefix.as_str(),
            output.as_str(),
            version.unwrap_or("HEAD"),
        ];
        Ok(self.git(&args).await.is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn client(path: &Path) -> GitClient {
        GitClient::new(path, Arc::new(CommandRunner::new()))
    }

    /// Client whose "git" is `sh`, so `git <subcommand>` runs the script named after the
    /// subcommand inside the working copy
    #[cfg(unix)]
    fn scripted_client(path: &Path, subcommands: &[&str]) -> GitClient {
        for subcommand in subcommands {
            std::fs::write(
                path.join(subcommand),
                format!("echo attempt >> {}.count\nexit 1\n", subcommand),
            )
            .unwrap();
        }
        GitClient::with_executable(path, Arc::new(CommandRunner::new()), "sh")
    }

    #[cfg(unix)]
    fn attempts(path: &Path, subcommand: &str) -> usize {
        std::fs::read_to_string(path.join(format!("{}.count", subcommand)))
            .map(|content| content.lines().count())
            .unwrap_or(0)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_only_pull_retries_failed_commands() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path();
        let git = scripted_client(path, &["status", "diff", "log", "push", "pull"]);

        assert_eq!(git.status(&StatusCommand::default()).await.returncode, 1);
        assert_eq!(git.diff(&DiffCommand::default()).await.returncode, 1);
        assert_eq!(git.log(&LogCommand::default()).await.returncode, 1);
        assert_eq!(git.push(&PushCommand).await.returncode, 1);
        assert_eq!(git.pull(&PullCommand { retry: 2 }).await.returncode, 1);

        assert_eq!(attempts(path, "status"), 1);
        assert_eq!(attempts(path, "diff"), 1);
        assert_eq!(attempts(path, "log"), 1);
        assert_eq!(attempts(path, "push"), 1);
        assert_eq!(attempts(path, "pull"), 3);
    }

    #[test]
    fn test_hash_detection() {
        assert!(is_full_hash("377d5b3d03c212f015cc832fdb368f4534d0d583"));
        assert!(!is_full_hash("377d5b3"));
        assert!(looks_like_hash("377d5b3"));
        assert!(!looks_like_hash("main"));
    }

    #[test]
    fn test_is_repository() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!client(temp_dir.path()).is_repository());
        std::fs::create_dir(temp_dir.path().join(".git")).unwrap();
        assert!(client(temp_dir.path()).is_repository());
    }

    #[tokio::test]
    async fn test_import_without_url_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = client(temp_dir.path()).import(&ImportCommand::default()).await;
        assert_eq!(result.returncode, 1);
        assert_eq!(result.output, "Repository data lacks the 'url' value");
    }

    #[tokio::test]
    async fn test_checkout_rejects_empty_url_and_non_empty_target() {
        let temp_dir = TempDir::new().unwrap();
        let git = client(temp_dir.path());

        let err = git.checkout(&CheckoutOptions::new("")).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidUrl { .. }));

        std::fs::write(temp_dir.path().join("file"), "x").unwrap();
        let err = git
            .checkout(&CheckoutOptions::new("https://example.com/repo.git"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::TargetNotEmpty { .. }));
    }
}
