pub mod job_result;
pub mod manifest;

pub use job_result::{ExportInfo, JobResult};
pub use manifest::{ManifestDocument, ManifestFormatError, RepoSpec, ResolvedManifest};
