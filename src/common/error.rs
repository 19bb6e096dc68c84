use std::path::PathBuf;
use thiserror::Error;

use crate::application::services::manifest_resolver::ManifestError;
use crate::infrastructure::vcs::client::ClientError;

#[derive(Error, Debug)]
pub enum VcsError {
    #[error("Manifest error: {message}")]
    ManifestError {
        message: String,
        reference: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Client operation failed: {message}")]
    ClientError {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("File system operation failed: {message}")]
    FileSystemError {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Network operation failed: {message}")]
    NetworkError {
        message: String,
        url: Option<String>,
        #[source]
        source: Option<reqwest::Error>,
    },
}

impl VcsError {
    pub fn manifest_error_with_source(
        message: impl Into<String>,
        reference: Option<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ManifestError {
            message: message.into(),
            reference,
            source: Some(Box::new(source)),
        }
    }

    pub fn client_error_with_source(
        message: impl Into<String>,
        path: Option<PathBuf>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ClientError {
            message: message.into(),
            path,
            source: Some(Box::new(source)),
        }
    }

    pub fn filesystem_error_with_source(
        message: impl Into<String>,
        path: Option<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::FileSystemError {
            message: message.into(),
            path,
            source: Some(source),
        }
    }

    pub fn network_error_with_source(
        message: impl Into<String>,
        url: Option<String>,
        source: reqwest::Error,
    ) -> Self {
        Self::NetworkError {
            message: message.into(),
            url,
            source: Some(source),
        }
    }
}

impl From<ManifestError> for VcsError {
    fn from(error: ManifestError) -> Self {
        let reference = error.reference().map(str::to_string);
        Self::manifest_error_with_source(error.to_string(), reference, error)
    }
}

impl From<ClientError> for VcsError {
    fn from(error: ClientError) -> Self {
        let path = match &error {
            ClientError::TargetNotEmpty { path } => Some(path.clone()),
            _ => None,
        };
        Self::client_error_with_source(error.to_string(), path, error)
    }
}

impl From<std::io::Error> for VcsError {
    fn from(error: std::io::Error) -> Self {
        Self::filesystem_error_with_source(error.to_string(), None, error)
    }
}

impl From<reqwest::Error> for VcsError {
    fn from(error: reqwest::Error) -> Self {
        Self::network_error_with_source(error.to_string(), None, error)
    }
}
