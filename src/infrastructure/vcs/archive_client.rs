use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::client::{
    ensure_checkout_target, missing_url, plan_import, CheckoutOptions, ClientError,
    ExportCommand, ImportCommand, ImportPlan, ValidateCommand, VcsClient,
};
use crate::domain::entities::JobResult;
use crate::domain::value_objects::VcsType;
use crate::infrastructure::process::{CommandRunner, ExecutionConfig};

/// Archive format handled by an [`ArchiveClient`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Tar,
    Zip,
}

impl ArchiveKind {
    fn vcs_type(self) -> VcsType {
        match self {
            ArchiveKind::Tar => VcsType::Tar,
            ArchiveKind::Zip => VcsType::Zip,
        }
    }

    fn file_name(self) -> &'static str {
        match self {
            ArchiveKind::Tar => "archive.tar",
            ArchiveKind::Zip => "archive.zip",
        }
    }
}

/// Client that downloads an archive and unpacks it into the target path
///
/// The manifest `version` names a folder inside the archive whose content is
/// used instead of the whole archive.
#[derive(Debug)]
pub struct ArchiveClient {
    kind: ArchiveKind,
    path: PathBuf,
    runner: Arc<CommandRunner>,
    http: reqwest::Client,
}

impl ArchiveClient {
    pub fn new(kind: ArchiveKind, path: impl Into<PathBuf>, runner: Arc<CommandRunner>) -> Self {
        Self {
            kind,
            path: path.into(),
            runner,
            http: reqwest::Client::new(),
        }
    }

    pub fn tar(path: impl Into<PathBuf>, runner: Arc<CommandRunner>) -> Self {
        Self::new(ArchiveKind::Tar, path, runner)
    }

    pub fn zip(path: impl Into<PathBuf>, runner: Arc<CommandRunner>) -> Self {
        Self::new(ArchiveKind::Zip, path, runner)
    }

    /// Archives leave no metadata behind, so no path is ever a repository
    pub fn is_repository_path(_path: &Path) -> bool {
        false
    }

    /// Fetch `url` into `destination`, retrying HTTP downloads
    async fn download(&self, url: &str, destination: &Path, retry: u32) -> Result<(), ClientError> {
        if let Some(source) = local_source(url) {
            tokio::fs::copy(&source, destination)
                .await
                .map_err(|e| ClientError::download_failed(url, e.to_string()))?;
            return Ok(());
        }

        let mut attempt = 0;
        loop {
            match self.fetch(url).await {
                Ok(bytes) => {
                    tokio::fs::write(destination, &bytes).await?;
                    return Ok(());
                }
                Err(e) if attempt < retry => {
                    attempt += 1;
                    debug!("Retrying download of '{}' ({}/{}): {}", url, attempt, retry, e);
                }
                Err(e) => return Err(ClientError::download_failed(url, e.to_string())),
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, reqwest::Error> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn extract(&self, archive: &Path, destination: &Path) -> JobResult {
        let archive = archive.display().to_string();
        let destination = destination.display().to_string();
        let config = ExecutionConfig::new(&self.path);
        match self.kind {
            ArchiveKind::Tar => {
                self.runner
                    .run("tar", &["-xf", archive.as_str(), "-C", destination.as_str()], &config)
                    .await
            }
            ArchiveKind::Zip => {
                self.runner
                    .run("unzip", &["-q", archive.as_str(), "-d", destination.as_str()], &config)
                    .await
            }
        }
    }

    /// Download, unpack and move the selected content into the client's path
    async fn unpack_into_path(
        &self,
        url: &str,
        version: Option<&str>,
        retry: u32,
    ) -> Result<JobResult, JobResult> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        // stage next to the target so the final move stays on one filesystem
        let staging = tempfile::Builder::new()
            .prefix(".vcsbatch-")
            .tempdir_in(parent)
            .map_err(|e| {
                JobResult::failure(&self.path, format!("Could not create temporary directory: {}", e))
            })?;

        let archive = staging.path().join(self.kind.file_name());
        self.download(url, &archive, retry)
            .await
            .map_err(|e| JobResult::failure(&self.path, e.to_string()))?;

        let unpacked = staging.path().join("content");
        tokio::fs::create_dir(&unpacked)
            .await
            .map_err(|e| JobResult::failure(&self.path, e.to_string()))?;
        let extract = self.extract(&archive, &unpacked).await;
        if !extract.is_success() {
            let output = format!("Could not extract archive '{}': {}", url, extract.output);
            return Err(extract.with_output(output));
        }

        let source = match version {
            Some(folder) => {
                let folder_path = unpacked.join(folder);
                if !folder_path.is_dir() {
                    return Err(JobResult::failure(
                        &self.path,
                        format!("Archive does not contain folder '{}'", folder),
                    ));
                }
                folder_path
            }
            None => unpacked,
        };

        move_entries(&source, &self.path)
            .await
            .map_err(|e| JobResult::failure(&self.path, format!("Could not move files: {}", e)))?;

        let mut message = format!("Downloaded archive from '{}'", url);
        if let Some(folder) = version {
            message.push_str(&format!(" and extracted folder '{}'", folder));
        }
        Ok(JobResult::new(extract.cmd, &self.path, message, 0))
    }
}

#[async_trait]
impl VcsClient for ArchiveClient {
    fn vcs_type(&self) -> VcsType {
        self.kind.vcs_type()
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
        match plan_import(&self.path, None, command).await {
            ImportPlan::Done(result) => result,
            ImportPlan::Checkout | ImportPlan::Update => {
                match self
                    .unpack_into_path(&command.url, command.version.as_deref(), command.retry)
                    .await
                {
                    Ok(result) | Err(result) => result,
                }
            }
        }
    }

    async fn validate(&self, command: &ValidateCommand) -> JobResult {
        if command.url.is_empty() {
            return missing_url(&self.path);
        }

        if let Some(source) = local_source(&command.url) {
            return if source.is_file() {
                JobResult::success(&self.path, format!("Found archive '{}'", command.url))
            } else {
                JobResult::failure(&self.path, format!("Archive '{}' does not exist", command.url))
            };
        }

        let mut attempt = 0;
        loop {
            let response = self
                .http
                .head(&command.url)
                .send()
                .await
                .and_then(|r| r.error_for_status());
            match response {
                Ok(_) => {
                    return JobResult::success(&self.path, format!("Found archive '{}'", command.url))
                }
                Err(e) if attempt < command.retry => {
                    attempt += 1;
                    debug!("Retrying '{}' ({}/{}): {}", command.url, attempt, command.retry, e);
                }
                Err(e) => {
                    return JobResult::failure(
                        &self.path,
                        format!("Failed to contact archive '{}': {}", command.url, e),
                    )
                }
            }
        }
    }

    async fn export(&self, _command: &ExportCommand) -> JobResult {
        self.not_applicable("export", Some("the download URL is not recorded"))
    }

    async fn checkout(&self, options: &CheckoutOptions) -> Result<bool, ClientError> {
        ensure_checkout_target(&self.path, &options.url)?;
        tokio::fs::create_dir_all(&self.path).await?;
        match self
            .unpack_into_path(&options.url, options.version.as_deref(), 0)
            .await
        {
            Ok(_) => Ok(true),
            Err(result) => {
                warn!("Checkout of '{}' failed: {}", options.url, result.output);
                Ok(false)
            }
        }
    }

    async fn export_repository(
        &self,
        _version: Option<&str>,
        _basepath: &Path,
    ) -> Result<bool, ClientError> {
        Err(ClientError::unsupported_operation(
            self.vcs_type(),
            "export_repository",
        ))
    }
}

/// Local file referenced by a plain path or `file://` URL
fn local_source(url: &str) -> Option<PathBuf> {
    match url::Url::parse(url) {
        Ok(parsed) if parsed.scheme() == "file" => parsed.to_file_path().ok(),
        Ok(parsed) if parsed.scheme().len() > 1 => None,
        // single letter schemes are windows drive letters
        _ => Some(PathBuf::from(url)),
    }
}

async fn move_entries(source: &Path, destination: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(destination).await?;
    let mut entries = tokio::fs::read_dir(source).await?;
    while let Some(entry) = entries.next_entry().await? {
        tokio::fs::rename(entry.path(), destination.join(entry.file_name())).await?;
    }
    Ok(())
}
