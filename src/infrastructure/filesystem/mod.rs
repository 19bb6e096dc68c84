pub mod manifest_store;
pub mod repository_finder;

pub use manifest_store::{ManifestStore, ManifestStoreOptions};
pub use repository_finder::RepositoryFinder;
