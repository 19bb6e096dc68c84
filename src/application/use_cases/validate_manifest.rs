use std::path::Path;
use std::sync::Arc;

use crate::application::services::{JobBuilder, JobExecutor, JobReport};
use crate::domain::entities::ResolvedManifest;
use crate::infrastructure::vcs::{ClientRegistry, Operation, ValidateCommand};

/// マニフェストの各リポジトリに到達できるか確認するユースケース
///
/// 作業ディレクトリには何も書き込まない。
pub struct ValidateManifestUseCase {
    registry: Arc<ClientRegistry>,
    executor: JobExecutor,
    retry: u32,
}

impl ValidateManifestUseCase {
    /// 新しいValidateManifestUseCaseインスタンスを作成
    pub fn new(registry: Arc<ClientRegistry>, executor: JobExecutor) -> Self {
        Self {
            registry,
            executor,
            retry: 2,
        }
    }

    /// 再試行回数を設定
    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    /// 検証を実行
    pub async fn execute(&self, manifest: &ResolvedManifest) -> Vec<JobReport> {
        let retry = self.retry;
        let jobs = JobBuilder::new(&self.registry).from_manifest(
            manifest,
            Path::new(""),
            |spec| {
                Operation::Validate(ValidateCommand {
                    url: spec.url.clone(),
                    version: spec.version.clone(),
                    retry,
                })
            },
        );
        self.executor.execute(jobs).await
    }
}
