use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

use super::dependency_graph::{normalize_path, DependencyGraph};
use crate::domain::entities::{RepoSpec, ResolvedManifest};
use crate::domain::value_objects::VcsType;
use crate::infrastructure::vcs::{ClientRegistry, NoneClient, Operation, VcsClient};

/// 1リポジトリに対する1回分の処理
#[derive(Clone)]
pub struct Job {
    /// 対象パス（実行内で一意）
    pub path: PathBuf,

    /// 対象パスに束縛されたクライアント
    pub client: Arc<dyn VcsClient>,

    /// 実行する操作
    pub operation: Operation,

    /// 先に終了している必要があるジョブのパス
    pub depends: BTreeSet<PathBuf>,
}

impl Job {
    /// 新しいJobインスタンスを作成
    pub fn new(client: Arc<dyn VcsClient>, operation: Operation) -> Self {
        Self {
            path: client.path().to_path_buf(),
            client,
            operation,
            depends: BTreeSet::new(),
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("path", &self.path)
            .field("client", &self.client.vcs_type())
            .field("operation", &self.operation.name())
            .field("depends", &self.depends)
            .finish()
    }
}

/// 依存関係をパスの包含関係から設定する
pub fn assign_dependencies(jobs: &mut [Job]) {
    let paths: Vec<PathBuf> = jobs.iter().map(|job| job.path.clone()).collect();
    let graph = DependencyGraph::build(&paths);
    for (index, job) in jobs.iter_mut().enumerate() {
        job.depends = graph
            .dependencies(index)
            .iter()
            .map(|&dependency| paths[dependency].clone())
            .collect();
    }
}

/// マニフェストや検出済みリポジトリからジョブを組み立てる
///
/// この段階ではファイルシステムにもネットワークにも触れない。
pub struct JobBuilder<'a> {
    registry: &'a ClientRegistry,
}

impl<'a> JobBuilder<'a> {
    /// 新しいJobBuilderインスタンスを作成
    pub fn new(registry: &'a ClientRegistry) -> Self {
        Self { registry }
    }

    /// マニフェストの各エントリに対してジョブを作成
    ///
    /// 対応するクライアントがない種別はnoneクライアントのジョブになり、実行時に失敗する。
    /// 正規化すると先行エントリと同じディレクトリになるキー（`x`と`x/`、`./x`など）も
    /// 同じディレクトリを二重に操作しないよう失敗するジョブになる。
    pub fn from_manifest<F>(&self, manifest: &ResolvedManifest, base: &Path, operation: F) -> Vec<Job>
    where
        F: Fn(&RepoSpec) -> Operation,
    {
        let mut seen: HashMap<PathBuf, &str> = HashMap::new();
        let mut jobs = Vec::with_capacity(manifest.len());
        for (key, spec) in &manifest.repositories {
            let path = base.join(key);
            let normalized = normalize_path(&path);
            let client: Arc<dyn VcsClient> = if let Some(first) = seen.get(&normalized) {
                warn!("Repository path '{}' refers to the same directory as '{}'", key, first);
                Arc::new(NoneClient::new(
                    &path,
                    format!(
                        "Repository path '{}' refers to the same directory as '{}'",
                        key, first
                    ),
                ))
            } else {
                seen.insert(normalized, key.as_str());
                match self.registry.create(&spec.vcs_type, &path) {
                    Some(client) => client,
                    None => {
                        warn!("Repository type '{}' of '{}' is not supported", spec.vcs_type, key);
                        Arc::new(NoneClient::unsupported(&path, &spec.vcs_type))
                    }
                }
            };
            jobs.push(Job::new(client, operation(spec)));
        }
        assign_dependencies(&mut jobs);
        jobs
    }

    /// 検出済みのリポジトリに対してジョブを作成
    ///
    /// `types`を指定した場合はその種別のリポジトリだけを対象にする。
    pub fn from_repositories(
        &self,
        repositories: &[(PathBuf, VcsType)],
        operation: &Operation,
        types: Option<&[VcsType]>,
    ) -> Vec<Job> {
        let mut jobs: Vec<Job> = repositories
            .iter()
            .filter(|(_, vcs_type)| types.map_or(true, |types| types.contains(vcs_type)))
            .map(|(path, vcs_type)| {
                let client: Arc<dyn VcsClient> = match self.registry.create_for(*vcs_type, path) {
                    Some(client) => client,
                    None => Arc::new(NoneClient::unsupported(path, vcs_type.as_str())),
                };
                Job::new(client, operation.clone())
            })
            .collect();
        assign_dependencies(&mut jobs);
        jobs
    }
}
