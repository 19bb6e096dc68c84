/// Infrastructure layer modules
///
/// This layer provides concrete implementations for external system interactions:
/// - VCS clients driving git, hg, svn and bzr, and archive downloads
/// - File system operations (manifests, repository discovery)
/// - Process execution (command runner, known hosts check)
pub mod filesystem;
pub mod process;
pub mod vcs;

// Re-export commonly used types
pub use filesystem::{ManifestStore, RepositoryFinder};
pub use process::{CommandRunner, ExecutionConfig};
pub use vcs::{ClientError, ClientRegistry, Operation, VcsClient};
