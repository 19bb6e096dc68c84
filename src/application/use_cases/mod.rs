pub mod export_repositories;
pub mod import_repositories;
pub mod run_command;
pub mod validate_manifest;

pub use export_repositories::{ExportMode, ExportOutcome, ExportRepositoriesUseCase};
pub use import_repositories::{ImportOptions, ImportOutcome, ImportRepositoriesUseCase};
pub use run_command::{RepositorySelection, RunCommandUseCase};
pub use validate_manifest::ValidateManifestUseCase;
