use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::application::services::{JobBuilder, JobExecutor, JobReport};
use crate::domain::value_objects::VcsType;
use crate::infrastructure::filesystem::RepositoryFinder;
use crate::infrastructure::vcs::{ClientRegistry, Operation};

/// 検索対象の設定
#[derive(Debug, Clone)]
pub struct RepositorySelection {
    /// 検索を始めるディレクトリ
    pub paths: Vec<PathBuf>,

    /// 見つかったリポジトリの内側も検索するか
    pub nested: bool,

    /// 対象にする種別（Noneの場合は全て）
    pub types: Option<Vec<VcsType>>,
}

impl Default for RepositorySelection {
    fn default() -> Self {
        Self {
            paths: vec![PathBuf::from(".")],
            nested: false,
            types: None,
        }
    }
}

impl RepositorySelection {
    pub fn with_paths(mut self, paths: Vec<PathBuf>) -> Self {
        if !paths.is_empty() {
            self.paths = paths;
        }
        self
    }

    pub fn with_nested(mut self, nested: bool) -> Self {
        self.nested = nested;
        self
    }

    pub fn with_types(mut self, types: Vec<VcsType>) -> Self {
        self.types = if types.is_empty() { None } else { Some(types) };
        self
    }
}

/// 既存の作業コピーに対して1つの操作を一括実行するユースケース
///
/// pull, push, status, diff, log, branch, remotes, customで共通。
pub struct RunCommandUseCase {
    registry: Arc<ClientRegistry>,
    executor: JobExecutor,
    selection: RepositorySelection,
}

impl RunCommandUseCase {
    /// 新しいRunCommandUseCaseインスタンスを作成
    pub fn new(registry: Arc<ClientRegistry>, executor: JobExecutor) -> Self {
        Self {
            registry,
            executor,
            selection: RepositorySelection::default(),
        }
    }

    /// 対象の設定を変更
    pub fn with_selection(mut self, selection: RepositorySelection) -> Self {
        self.selection = selection;
        self
    }

    /// 対象となるリポジトリを検索
    pub fn find_repositories(&self) -> Vec<(PathBuf, VcsType)> {
        let found = RepositoryFinder::new(&self.registry)
            .with_nested(self.selection.nested)
            .find(&self.selection.paths);
        match &self.selection.types {
            Some(types) => found
                .into_iter()
                .filter(|(_, vcs_type)| types.contains(vcs_type))
                .collect(),
            None => found,
        }
    }

    /// 操作を実行
    pub async fn execute(&self, operation: &Operation) -> Vec<JobReport> {
        let repositories = self.find_repositories();
        debug!(
            "Running '{}' in {} repositories",
            operation.name(),
            repositories.len()
        );
        let jobs = JobBuilder::new(&self.registry).from_repositories(&repositories, operation, None);
        self.executor.execute(jobs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::ExecutorConfig;
    use crate::infrastructure::process::CommandRunner;
    use crate::infrastructure::vcs::PushCommand;
    use tempfile::TempDir;

    fn use_case(selection: RepositorySelection) -> RunCommandUseCase {
        let registry = Arc::new(ClientRegistry::with_default_clients(Arc::new(CommandRunner::new())));
        RunCommandUseCase::new(registry, JobExecutor::new(ExecutorConfig::default()))
            .with_selection(selection)
    }

    #[test]
    fn test_type_filter() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("a/.git")).unwrap();
        std::fs::create_dir_all(temp_dir.path().join("b/.svn")).unwrap();

        let found = use_case(
            RepositorySelection::default()
                .with_paths(vec![temp_dir.path().to_path_buf()])
                .with_types(vec![VcsType::Svn]),
        )
        .find_repositories();

        assert_eq!(found, vec![(temp_dir.path().join("b"), VcsType::Svn)]);
    }

    #[tokio::test]
    async fn test_not_applicable_operation_succeeds() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("wc/.svn")).unwrap();

        let reports = use_case(
            RepositorySelection::default().with_paths(vec![temp_dir.path().to_path_buf()]),
        )
        .execute(&Operation::Push(PushCommand))
        .await;

        assert_eq!(reports.len(), 1);
        assert!(reports[0].is_success());
        assert!(reports[0].result.output.contains("not applicable"));
    }
}
