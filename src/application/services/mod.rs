pub mod dependency_graph;
pub mod job_builder;
pub mod job_executor;
pub mod manifest_resolver;

pub use dependency_graph::DependencyGraph;
pub use job_builder::{assign_dependencies, Job, JobBuilder};
pub use job_executor::{
    all_succeeded, CancellationFlag, ExecutorConfig, JobExecutor, JobProgress, JobReport,
    DEFAULT_WORKERS,
};
pub use manifest_resolver::{
    ManifestError, ManifestLoader, ManifestResolver, ManifestResolverOptions, ManifestSource,
};
