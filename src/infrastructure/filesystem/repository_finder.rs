use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::domain::value_objects::VcsType;
use crate::infrastructure::vcs::ClientRegistry;

/// Discovers working copies below a set of directories
pub struct RepositoryFinder<'a> {
    registry: &'a ClientRegistry,
    nested: bool,
}

impl<'a> RepositoryFinder<'a> {
    pub fn new(registry: &'a ClientRegistry) -> Self {
        Self {
            registry,
            nested: false,
        }
    }

    /// Also search inside found repositories
    pub fn with_nested(mut self, nested: bool) -> Self {
        self.nested = nested;
        self
    }

    /// Repositories found under `roots`, each listed once, in walk order
    pub fn find<P: AsRef<Path>>(&self, roots: &[P]) -> Vec<(PathBuf, VcsType)> {
        let metadata_dirs: HashSet<&str> = VcsType::SUPPORTED
            .iter()
            .filter_map(|t| t.metadata_dir())
            .collect();
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for root in roots {
            let mut walker = WalkDir::new(root.as_ref())
                .follow_links(false)
                .sort_by_file_name()
                .into_iter();

            while let Some(entry) = walker.next() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        debug!("Skipping unreadable entry: {}", e);
                        continue;
                    }
                };
                if !entry.file_type().is_dir() {
                    continue;
                }
                let is_metadata = entry
                    .file_name()
                    .to_str()
                    .map_or(false, |name| metadata_dirs.contains(name));
                if is_metadata {
                    walker.skip_current_dir();
                    continue;
                }

                if let Some(vcs_type) = self.registry.detect(entry.path()) {
                    let path = entry.path().to_path_buf();
                    if seen.insert(path.clone()) {
                        found.push((path, vcs_type));
                    }
                    if !self.nested {
                        walker.skip_current_dir();
                    }
                }
            }
        }
        found
    }
}
