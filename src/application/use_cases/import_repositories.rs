use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::services::{Job, JobBuilder, JobExecutor, JobReport};
use crate::domain::entities::{RepoSpec, ResolvedManifest};
use crate::domain::value_objects::VcsType;
use crate::infrastructure::process::known_hosts;
use crate::infrastructure::vcs::{ClientRegistry, ImportCommand, Operation};

/// インポートの設定
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// リポジトリの展開先
    pub base_path: PathBuf,

    /// 別のリポジトリや空でないディレクトリを削除してから取得するか
    pub force: bool,

    /// ネットワーク操作の再試行回数
    pub retry: u32,

    /// 既存のディレクトリをそのまま残すか
    pub skip_existing: bool,

    /// サブモジュールも取得するか
    pub recursive: bool,

    /// 履歴なしで取得するか
    pub shallow: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            force: false,
            retry: 2,
            skip_existing: false,
            recursive: false,
            shallow: false,
        }
    }
}

impl ImportOptions {
    pub fn with_base_path(mut self, base_path: impl Into<PathBuf>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_skip_existing(mut self, skip_existing: bool) -> Self {
        self.skip_existing = skip_existing;
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_shallow(mut self, shallow: bool) -> Self {
        self.shallow = shallow;
        self
    }

    fn command_for(&self, spec: &RepoSpec) -> ImportCommand {
        ImportCommand {
            url: spec.url.clone(),
            version: spec.version.clone(),
            force: self.force,
            retry: self.retry,
            skip_existing: self.skip_existing,
            recursive: self.recursive,
            shallow: self.shallow,
        }
    }
}

/// インポートの結果
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    /// 投入順の実行結果
    pub reports: Vec<JobReport>,

    /// known_hostsに未登録だったSSHホスト（逐次実行に切り替えた場合のみ）
    pub unknown_hosts: Vec<String>,
}

/// マニフェストのリポジトリを取得・更新するユースケース
pub struct ImportRepositoriesUseCase {
    registry: Arc<ClientRegistry>,
    executor: JobExecutor,
    options: ImportOptions,
}

impl ImportRepositoriesUseCase {
    /// 新しいImportRepositoriesUseCaseインスタンスを作成
    pub fn new(registry: Arc<ClientRegistry>, executor: JobExecutor) -> Self {
        Self {
            registry,
            executor,
            options: ImportOptions::default(),
        }
    }

    /// 設定を変更
    pub fn with_options(mut self, options: ImportOptions) -> Self {
        self.options = options;
        self
    }

    /// マニフェストからジョブを組み立てる
    pub fn build_jobs(&self, manifest: &ResolvedManifest) -> Vec<Job> {
        JobBuilder::new(&self.registry).from_manifest(manifest, &self.options.base_path, |spec| {
            Operation::Import(self.options.command_for(spec))
        })
    }

    /// 各ジョブの対象パスと担当クライアントの種別
    pub fn repositories(&self, manifest: &ResolvedManifest) -> Vec<(PathBuf, VcsType)> {
        self.build_jobs(manifest)
            .iter()
            .map(|job| (job.path.clone(), job.client.vcs_type()))
            .collect()
    }

    /// インポートを実行
    ///
    /// 並列実行時、known_hostsに未登録のSSHホストがあればホスト鍵の確認に
    /// 応答できるようワーカーを1つに減らす。
    pub async fn execute(&self, manifest: &ResolvedManifest) -> ImportOutcome {
        let jobs = self.build_jobs(manifest);
        info!(
            "Importing {} repositories into '{}'",
            jobs.len(),
            self.options.base_path.display()
        );

        let mut executor = self.executor.clone();
        let mut unknown = Vec::new();
        if executor.config().effective_workers() > 1 {
            unknown = self.unknown_ssh_hosts(manifest).await;
            if !unknown.is_empty() {
                warn!(
                    "Host(s) {} not in known_hosts, importing sequentially",
                    unknown.join(", ")
                );
                executor = executor.with_workers(1);
            }
        }

        ImportOutcome {
            reports: executor.execute(jobs).await,
            unknown_hosts: unknown,
        }
    }

    async fn unknown_ssh_hosts(&self, manifest: &ResolvedManifest) -> Vec<String> {
        let hosts = known_hosts::ssh_hosts(
            manifest
                .repositories
                .values()
                .filter(|spec| matches!(spec.vcs_type.parse::<VcsType>(), Ok(VcsType::Git)))
                .map(|spec| spec.url.as_str()),
        );
        if hosts.is_empty() {
            return Vec::new();
        }
        known_hosts::unknown_hosts(self.registry.runner(), &hosts).await
    }

    pub fn base_path(&self) -> &Path {
        &self.options.base_path
    }
}
