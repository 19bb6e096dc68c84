use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::fs as async_fs;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::application::services::manifest_resolver::{
    ManifestError, ManifestLoader, ManifestSource,
};

/// Options for reading manifests
#[derive(Debug, Clone)]
pub struct ManifestStoreOptions {
    /// Timeout for fetching remote manifests
    pub http_timeout: Duration,

    /// Whether http(s) references may be fetched
    pub enable_remote_fetch: bool,
}

impl Default for ManifestStoreOptions {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(30),
            enable_remote_fetch: true,
        }
    }
}

/// Reads manifests from files, URLs and stdin
#[derive(Debug, Clone)]
pub struct ManifestStore {
    http_client: reqwest::Client,
    options: ManifestStoreOptions,
}

impl ManifestStore {
    /// Create a new manifest store with default settings
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_options(ManifestStoreOptions::default())
    }

    /// Create a new manifest store with custom settings
    pub fn with_options(options: ManifestStoreOptions) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("vcsbatch/", env!("CARGO_PKG_VERSION")))
            .timeout(options.http_timeout)
            .build()?;
        Ok(Self {
            http_client,
            options,
        })
    }

    async fn read_file(&self, path: &Path) -> Result<String, ManifestError> {
        async_fs::read_to_string(path)
            .await
            .map_err(|e| ManifestError::load(path.display().to_string(), e.to_string()))
    }

    async fn fetch_url(&self, url: &url::Url) -> Result<String, ManifestError> {
        if !self.options.enable_remote_fetch {
            return Err(ManifestError::load(url.as_str(), "Remote fetch is disabled"));
        }
        let response = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ManifestError::load(url.as_str(), e.to_string()))?;
        if !response.status().is_success() {
            return Err(ManifestError::load(
                url.as_str(),
                format!("HTTP {}", response.status()),
            ));
        }
        response
            .text()
            .await
            .map_err(|e| ManifestError::load(url.as_str(), e.to_string()))
    }

    async fn read_stdin(&self) -> Result<String, ManifestError> {
        let mut content = String::new();
        tokio::io::stdin()
            .read_to_string(&mut content)
            .await
            .map_err(|e| ManifestError::load("-", e.to_string()))?;
        Ok(content)
    }
}

#[async_trait]
impl ManifestLoader for ManifestStore {
    async fn load(&self, source: &ManifestSource) -> Result<String, ManifestError> {
        debug!("Reading manifest from '{}'", source);
        match source {
            ManifestSource::Path(path) => self.read_file(path).await,
            ManifestSource::Url(url) => self.fetch_url(url).await,
            ManifestSource::Stdin => self.read_stdin().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::manifest_resolver::ManifestResolver;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_nonexistent_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.repos");
        let store = ManifestStore::new().unwrap();

        let err = store.load(&ManifestSource::Path(path.clone())).await.unwrap_err();

        assert_eq!(err.reference(), Some(path.display().to_string().as_str()));
    }

    #[tokio::test]
    async fn test_relative_extends_resolve_against_file() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join("base")).unwrap();
        std::fs::write(
            temp_dir.path().join("base/common.repos"),
            "repositories:\n  lib:\n    type: git\n    url: https://example.com/lib.git\n",
        )
        .unwrap();
        std::fs::write(
            temp_dir.path().join("project.repos"),
            "extends: base/common.repos\nrepositories:\n  app:\n    type: hg\n    url: https://example.com/app\n",
        )
        .unwrap();

        let resolved = ManifestResolver::new(Arc::new(ManifestStore::new().unwrap()))
            .resolve(&ManifestSource::Path(temp_dir.path().join("project.repos")))
            .await
            .unwrap();

        assert_eq!(resolved.len(), 2);
        assert!(resolved.get("lib").is_some());
        assert!(resolved.get("app").is_some());
    }
}
