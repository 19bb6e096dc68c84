use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use super::archive_client::ArchiveClient;
use super::bzr_client::BzrClient;
use super::client::VcsClient;
use super::git_client::GitClient;
use super::hg_client::HgClient;
use super::svn_client::SvnClient;
use crate::domain::value_objects::VcsType;
use crate::infrastructure::process::CommandRunner;

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("A client for type '{0}' is already registered")]
    DuplicateType(VcsType),
}

type Constructor = fn(PathBuf, Arc<CommandRunner>) -> Arc<dyn VcsClient>;

/// One registered client implementation
#[derive(Clone)]
pub struct ClientDescriptor {
    pub vcs_type: VcsType,
    /// Checks whether a path holds a working copy of this type
    pub is_repository: fn(&Path) -> bool,
    pub constructor: Constructor,
}

impl std::fmt::Debug for ClientDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientDescriptor")
            .field("vcs_type", &self.vcs_type)
            .finish()
    }
}

/// Maps type tags to client implementations
///
/// Built once per process and passed to whatever needs to create clients.
#[derive(Debug, Clone)]
pub struct ClientRegistry {
    descriptors: Vec<ClientDescriptor>,
    runner: Arc<CommandRunner>,
}

impl ClientRegistry {
    /// Create an empty registry
    pub fn new(runner: Arc<CommandRunner>) -> Self {
        Self {
            descriptors: Vec::new(),
            runner,
        }
    }

    /// Create a registry holding every built-in client
    pub fn with_default_clients(runner: Arc<CommandRunner>) -> Self {
        let mut registry = Self::new(runner);
        for descriptor in default_descriptors() {
            // built-in types are distinct
            let _ = registry.register(descriptor);
        }
        registry
    }

    /// Add a client implementation
    pub fn register(&mut self, descriptor: ClientDescriptor) -> Result<(), RegistryError> {
        if self
            .descriptors
            .iter()
            .any(|d| d.vcs_type == descriptor.vcs_type)
        {
            return Err(RegistryError::DuplicateType(descriptor.vcs_type));
        }
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Create a client for a manifest type tag, `None` if no client supports it
    pub fn create(&self, type_tag: &str, path: impl Into<PathBuf>) -> Option<Arc<dyn VcsClient>> {
        let vcs_type: VcsType = type_tag.parse().ok()?;
        self.create_for(vcs_type, path)
    }

    pub fn create_for(
        &self,
        vcs_type: VcsType,
        path: impl Into<PathBuf>,
    ) -> Option<Arc<dyn VcsClient>> {
        self.descriptors
            .iter()
            .find(|d| d.vcs_type == vcs_type)
            .map(|d| (d.constructor)(path.into(), Arc::clone(&self.runner)))
    }

    /// Detect the type of the working copy at `path`
    pub fn detect(&self, path: &Path) -> Option<VcsType> {
        self.descriptors
            .iter()
            .find(|d| (d.is_repository)(path))
            .map(|d| d.vcs_type)
    }

    /// Registered types in registration order
    pub fn types(&self) -> Vec<VcsType> {
        self.descriptors.iter().map(|d| d.vcs_type).collect()
    }

    pub fn runner(&self) -> &Arc<CommandRunner> {
        &self.runner
    }
}

fn bzr_client(path: PathBuf, runner: Arc<CommandRunner>) -> Arc<dyn VcsClient> {
    Arc::new(BzrClient::new(path, runner))
}

fn git_client(path: PathBuf, runner: Arc<CommandRunner>) -> Arc<dyn VcsClient> {
    Arc::new(GitClient::new(path, runner))
}

fn hg_client(path: PathBuf, runner: Arc<CommandRunner>) -> Arc<dyn VcsClient> {
    Arc::new(HgClient::new(path, runner))
}

fn svn_client(path: PathBuf, runner: Arc<CommandRunner>) -> Arc<dyn VcsClient> {
    Arc::new(SvnClient::new(path, runner))
}

fn tar_client(path: PathBuf, runner: Arc<CommandRunner>) -> Arc<dyn VcsClient> {
    Arc::new(ArchiveClient::tar(path, runner))
}

fn zip_client(path: PathBuf, runner: Arc<CommandRunner>) -> Arc<dyn VcsClient> {
    Arc::new(ArchiveClient::zip(path, runner))
}

fn default_descriptors() -> Vec<ClientDescriptor> {
    vec![
        ClientDescriptor {
            vcs_type: VcsType::Bzr,
            is_repository: BzrClient::is_repository_path,
            constructor: bzr_client,
        },
        ClientDescriptor {
            vcs_type: VcsType::Git,
            is_repository: GitClient::is_repository_path,
            constructor: git_client,
        },
        ClientDescriptor {
            vcs_type: VcsType::Hg,
            is_repository: HgClient::is_repository_path,
            constructor: hg_client,
        },
        ClientDescriptor {
            vcs_type: VcsType::Svn,
            is_repository: SvnClient::is_repository_path,
            constructor: svn_client,
        },
        ClientDescriptor {
            vcs_type: VcsType::Tar,
            is_repository: ArchiveClient::is_repository_path,
            constructor: tar_client,
        },
        ClientDescriptor {
            vcs_type: VcsType::Zip,
            is_repository: ArchiveClient::is_repository_path,
            constructor: zip_client,
        },
    ]
}
