use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::application::services::assign_dependencies;
use crate::application::services::{Job, JobBuilder, JobExecutor, JobReport};
use crate::domain::entities::{RepoSpec, ResolvedManifest};
use crate::domain::value_objects::VcsType;
use crate::infrastructure::vcs::{ClientRegistry, ExportCommand, NoneClient, Operation, VcsClient};

use super::run_command::RepositorySelection;
use crate::infrastructure::filesystem::RepositoryFinder;

/// エクスポートの方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportMode {
    /// マニフェストを出力する
    Manifest(ExportCommand),

    /// リポジトリごとに`<dir>/<path>.tar.gz`を作成する
    Archive { directory: PathBuf },
}

impl Default for ExportMode {
    fn default() -> Self {
        ExportMode::Manifest(ExportCommand::default())
    }
}

/// エクスポートの結果
#[derive(Debug, Clone, Default)]
pub struct ExportOutcome {
    /// 成功したリポジトリから組み立てたマニフェスト（マニフェスト出力時のみ）
    pub manifest: ResolvedManifest,

    /// 投入順の実行結果
    pub reports: Vec<JobReport>,
}

/// 既存の作業コピーをマニフェストまたはアーカイブとして書き出すユースケース
pub struct ExportRepositoriesUseCase {
    registry: Arc<ClientRegistry>,
    executor: JobExecutor,
    selection: RepositorySelection,
    mode: ExportMode,
}

impl ExportRepositoriesUseCase {
    /// 新しいExportRepositoriesUseCaseインスタンスを作成
    pub fn new(registry: Arc<ClientRegistry>, executor: JobExecutor) -> Self {
        Self {
            registry,
            executor,
            selection: RepositorySelection::default(),
            mode: ExportMode::default(),
        }
    }

    /// 対象の設定を変更
    pub fn with_selection(mut self, selection: RepositorySelection) -> Self {
        self.selection = selection;
        self
    }

    /// エクスポート方式を変更
    pub fn with_mode(mut self, mode: ExportMode) -> Self {
        self.mode = mode;
        self
    }

    /// マニフェストのキーの基準となるディレクトリ
    pub fn root(&self) -> &Path {
        self.selection
            .paths
            .first()
            .map(PathBuf::as_path)
            .unwrap_or_else(|| Path::new("."))
    }

    /// 対象となるリポジトリを検索
    pub fn find_repositories(&self) -> Vec<(PathBuf, VcsType)> {
        RepositoryFinder::new(&self.registry)
            .with_nested(self.selection.nested)
            .find(&self.selection.paths)
    }

    /// エクスポートを実行
    pub async fn execute(&self) -> ExportOutcome {
        let repositories = self.find_repositories();
        let types = self.selection.types.as_deref();

        match &self.mode {
            ExportMode::Manifest(command) => {
                let jobs = JobBuilder::new(&self.registry).from_repositories(
                    &repositories,
                    &Operation::Export(command.clone()),
                    types,
                );
                let reports = self.executor.execute(jobs).await;
                ExportOutcome {
                    manifest: self.collect_manifest(&reports),
                    reports,
                }
            }
            ExportMode::Archive { directory } => {
                let jobs = self.archive_jobs(&repositories, types, directory).await;
                ExportOutcome {
                    manifest: ResolvedManifest::default(),
                    reports: self.executor.execute(jobs).await,
                }
            }
        }
    }

    /// 成功したexport結果をマニフェストに変換
    fn collect_manifest(&self, reports: &[JobReport]) -> ResolvedManifest {
        let mut repositories = BTreeMap::new();
        for report in reports {
            let export = match (&report.result.export, report.is_success()) {
                (Some(export), true) => export,
                _ => {
                    warn!("Skipping '{}' in the exported manifest", report.path.display());
                    continue;
                }
            };
            let mut spec = RepoSpec::new(report.vcs_type.as_str(), export.url.clone());
            spec.version = export.version.clone();
            repositories.insert(self.manifest_key(&report.path), spec);
        }
        ResolvedManifest::new(repositories)
    }

    async fn archive_jobs(
        &self,
        repositories: &[(PathBuf, VcsType)],
        types: Option<&[VcsType]>,
        directory: &Path,
    ) -> Vec<Job> {
        let mut jobs = Vec::new();
        for (path, vcs_type) in repositories {
            if types.map_or(false, |types| !types.contains(vcs_type)) {
                continue;
            }
            let basepath = directory.join(self.archive_name(path));
            if let Some(parent) = basepath.parent() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    debug!("Could not create '{}': {}", parent.display(), e);
                }
            }
            let client: Arc<dyn VcsClient> = match self.registry.create_for(*vcs_type, path) {
                Some(client) => client,
                None => Arc::new(NoneClient::unsupported(path, vcs_type.as_str())),
            };
            jobs.push(Job::new(
                client,
                Operation::Archive {
                    basepath,
                    version: None,
                },
            ));
        }
        assign_dependencies(&mut jobs);
        jobs
    }

    /// ルートからの相対パス（ルート自身は"."）
    fn manifest_key(&self, path: &Path) -> String {
        match pathdiff::diff_paths(path, self.root()) {
            Some(relative) if relative.as_os_str().is_empty() => ".".to_string(),
            Some(relative) => relative.to_string_lossy().replace('\\', "/"),
            None => path.to_string_lossy().to_string(),
        }
    }

    /// アーカイブのベース名（ルート自身はディレクトリ名）
    fn archive_name(&self, path: &Path) -> PathBuf {
        let key = self.manifest_key(path);
        if key != "." && !key.starts_with("..") && !Path::new(&key).is_absolute() {
            return PathBuf::from(key);
        }
        std::fs::canonicalize(path)
            .ok()
            .and_then(|p| p.file_name().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("repository"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::ExecutorConfig;
    use crate::domain::entities::{ExportInfo, JobResult};
    use crate::infrastructure::process::CommandRunner;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn use_case(root: &Path) -> ExportRepositoriesUseCase {
        let registry = Arc::new(ClientRegistry::with_default_clients(Arc::new(CommandRunner::new())));
        ExportRepositoriesUseCase::new(registry, JobExecutor::new(ExecutorConfig::default()))
            .with_selection(RepositorySelection::default().with_paths(vec![root.to_path_buf()]))
    }

    fn report(path: PathBuf, result: JobResult) -> JobReport {
        JobReport {
            path,
            vcs_type: VcsType::Git,
            result,
        }
    }

    #[test]
    fn test_collect_manifest_uses_relative_keys() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let reports = vec![
            report(
                root.to_path_buf(),
                JobResult::success(root, "").with_export(ExportInfo {
                    url: "https://example.com/top.git".to_string(),
                    version: Some("main".to_string()),
                }),
            ),
            report(
                root.join("libs/core"),
                JobResult::success(root, "").with_export(ExportInfo {
                    url: "https://example.com/core.git".to_string(),
                    version: None,
                }),
            ),
            report(root.join("broken"), JobResult::failure(root, "no remote")),
        ];

        let manifest = use_case(root).collect_manifest(&reports);

        assert_eq!(manifest.len(), 2);
        assert_eq!(
            manifest.get("."),
            Some(&RepoSpec::new("git", "https://example.com/top.git").with_version("main"))
        );
        assert_eq!(
            manifest.get("libs/core"),
            Some(&RepoSpec::new("git", "https://example.com/core.git"))
        );
    }

    #[test]
    fn test_archive_name_of_root_is_directory_name() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("workspace");
        std::fs::create_dir_all(&root).unwrap();
        let use_case = use_case(&root);

        assert_eq!(use_case.archive_name(&root), PathBuf::from("workspace"));
        assert_eq!(use_case.archive_name(&root.join("a/b")), PathBuf::from("a/b"));
    }

    #[tokio::test]
    async fn test_export_empty_directory() {
        let temp_dir = TempDir::new().unwrap();

        let outcome = use_case(temp_dir.path()).execute().await;

        assert!(outcome.reports.is_empty());
        assert!(outcome.manifest.is_empty());
    }
}
