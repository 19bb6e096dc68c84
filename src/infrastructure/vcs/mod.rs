//! Version control clients
//!
//! Every backend implements [`VcsClient`]. Clients are created through a
//! [`ClientRegistry`] value rather than constructed by callers directly.

pub mod archive_client;
pub mod bzr_client;
pub mod client;
pub mod git_client;
pub mod hg_client;
pub mod none_client;
pub mod registry;
pub mod svn_client;

pub use archive_client::{ArchiveClient, ArchiveKind};
pub use bzr_client::BzrClient;
pub use client::{
    BranchCommand, CheckoutOptions, ClientError, CustomCommand, DiffCommand, ExportCommand,
    ImportCommand, LogCommand, Operation, PullCommand, PushCommand, RemotesCommand,
    StatusCommand, ValidateCommand, VcsClient,
};
pub use git_client::GitClient;
pub use hg_client::HgClient;
pub use none_client::NoneClient;
pub use registry::{ClientDescriptor, ClientRegistry, RegistryError};
pub use svn_client::SvnClient;
