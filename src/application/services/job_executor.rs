use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, Mutex, Notify};
use tracing::{debug, info, warn};

use super::dependency_graph::normalize_path;
use super::job_builder::Job;
use crate::domain::entities::JobResult;
use crate::domain::value_objects::VcsType;

/// デフォルトのワーカー数
pub const DEFAULT_WORKERS: usize = 10;

/// ジョブ実行の設定
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// 同時に実行するジョブの最大数
    pub workers: usize,

    /// 進捗を通知するか
    pub show_progress: bool,

    /// デバッグモード（ワーカー1つで順に実行し、ディスパッチを記録）
    pub debug: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            show_progress: false,
            debug: false,
        }
    }
}

impl ExecutorConfig {
    /// ワーカー数を設定
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// 進捗通知を設定
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// デバッグモードを設定
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// 実際に使用するワーカー数
    pub fn effective_workers(&self) -> usize {
        if self.debug {
            1
        } else {
            self.workers.max(1)
        }
    }
}

/// ジョブ完了ごとの進捗
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobProgress {
    /// 完了したジョブのパス
    pub path: PathBuf,

    /// 成功したか
    pub success: bool,

    /// 完了済みのジョブ数
    pub completed: usize,

    /// ジョブの総数
    pub total: usize,
}

/// 実行中断フラグ
///
/// 立てられるとワーカーは新しいジョブを取り出さなくなる。実行中のジョブは最後まで走る。
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    inner: Arc<CancellationInner>,
}

#[derive(Debug, Default)]
struct CancellationInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// 中断を要求
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// 中断が要求されるまで待機
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Ctrl-C（UnixではSIGTERMも）を受けたら中断する
    pub fn cancel_on_signal(&self) {
        #[cfg(unix)]
        let terminate = match signal(SignalKind::terminate()) {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!("Could not listen for SIGTERM: {}", e);
                None
            }
        };

        let flag = self.clone();
        tokio::spawn(async move {
            #[cfg(unix)]
            let received = {
                let terminated = async move {
                    if let Some(mut stream) = terminate {
                        if stream.recv().await.is_some() {
                            return;
                        }
                    }
                    std::future::pending::<()>().await
                };
                tokio::select! {
                    result = tokio::signal::ctrl_c() => result.is_ok(),
                    _ = terminated => true,
                }
            };
            #[cfg(not(unix))]
            let received = tokio::signal::ctrl_c().await.is_ok();

            if received {
                warn!("Interrupted, waiting for running jobs to finish");
                flag.cancel();
            }
        });
    }
}

/// 1ジョブ分の実行結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReport {
    /// 対象パス
    pub path: PathBuf,

    /// クライアントの種別
    #[serde(rename = "type")]
    pub vcs_type: VcsType,

    /// 実行結果
    #[serde(flatten)]
    pub result: JobResult,
}

impl JobReport {
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }
}

/// 全結果が成功したかどうか
pub fn all_succeeded(reports: &[JobReport]) -> bool {
    reports.iter().all(JobReport::is_success)
}

struct SchedulerState {
    /// 未終了の依存ジョブ数
    remaining: Vec<usize>,
    dependents: Vec<Vec<usize>>,
    /// 実行可能なジョブ（投入順の小さいものから取り出す）
    ready: BTreeSet<usize>,
    running: usize,
    completed: usize,
    results: Vec<Option<JobResult>>,
}

struct Shared {
    jobs: Vec<Job>,
    state: Mutex<SchedulerState>,
    notify: Notify,
    cancellation: CancellationFlag,
    progress: Option<mpsc::UnboundedSender<JobProgress>>,
    debug: bool,
}

/// 依存関係を守りながらジョブを並列実行する
///
/// - 依存先が全て終了（成否を問わない）したジョブだけが実行可能になる
/// - 同時実行数はワーカー数まで
/// - 実行可能なジョブは投入順に取り出すため、ワーカー1つなら完全に逐次かつ決定的
/// - 結果は投入順に返す。ジョブの失敗でエラーになることはない
#[derive(Debug, Clone)]
pub struct JobExecutor {
    config: ExecutorConfig,
    cancellation: CancellationFlag,
    progress: Option<mpsc::UnboundedSender<JobProgress>>,
}

impl JobExecutor {
    /// 新しいJobExecutorインスタンスを作成
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            cancellation: CancellationFlag::new(),
            progress: None,
        }
    }

    /// 中断フラグを設定
    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// 進捗の送信先を設定（`show_progress`が有効な場合のみ送信）
    pub fn with_progress_sender(mut self, sender: mpsc::UnboundedSender<JobProgress>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// ワーカー数を変更
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// ジョブを実行し、投入順に結果を返す
    pub async fn execute(&self, jobs: Vec<Job>) -> Vec<JobReport> {
        let total = jobs.len();
        if total == 0 {
            return Vec::new();
        }

        let (remaining, dependents) = dependency_counts(&jobs);
        let ready = remaining
            .iter()
            .enumerate()
            .filter(|(_, &count)| count == 0)
            .map(|(index, _)| index)
            .collect();

        let workers = self.config.effective_workers().min(total);
        debug!("Executing {} jobs with {} workers", total, workers);

        let shared = Arc::new(Shared {
            jobs,
            state: Mutex::new(SchedulerState {
                remaining,
                dependents,
                ready,
                running: 0,
                completed: 0,
                results: vec![None; total],
            }),
            notify: Notify::new(),
            cancellation: self.cancellation.clone(),
            progress: self.progress.clone().filter(|_| self.config.show_progress),
            debug: self.config.debug,
        });

        let handles: Vec<_> = (0..workers)
            .map(|_| tokio::spawn(worker(Arc::clone(&shared))))
            .collect();
        for outcome in futures::future::join_all(handles).await {
            if let Err(e) = outcome {
                warn!("Worker task failed: {}", e);
            }
        }

        let interrupted = self.cancellation.is_cancelled();
        let mut state = shared.state.lock().await;
        let results = std::mem::take(&mut state.results);
        drop(state);

        shared
            .jobs
            .iter()
            .zip(results)
            .map(|(job, result)| {
                let result = result.unwrap_or_else(|| {
                    let message = if interrupted {
                        "Job skipped: execution was interrupted"
                    } else {
                        "Job skipped: its dependencies never finished"
                    };
                    JobResult::failure(&job.path, message)
                });
                JobReport {
                    path: job.path.clone(),
                    vcs_type: job.client.vcs_type(),
                    result,
                }
            })
            .collect()
    }
}

/// 各ジョブの`depends`から未終了の依存数と逆引きを作る
///
/// 実行内に存在しないパスへの依存は無視する。
fn dependency_counts(jobs: &[Job]) -> (Vec<usize>, Vec<Vec<usize>>) {
    let mut index_of: HashMap<PathBuf, usize> = HashMap::new();
    for (index, job) in jobs.iter().enumerate() {
        index_of.entry(normalize_path(&job.path)).or_insert(index);
    }

    let mut remaining = vec![0; jobs.len()];
    let mut dependents = vec![Vec::new(); jobs.len()];
    for (index, job) in jobs.iter().enumerate() {
        for dependency in &job.depends {
            match index_of.get(&normalize_path(dependency)) {
                Some(&parent) if parent != index => {
                    remaining[index] += 1;
                    dependents[parent].push(index);
                }
                Some(_) => {}
                None => debug!(
                    path = %job.path.display(),
                    "Ignoring dependency on '{}' outside this run",
                    dependency.display()
                ),
            }
        }
    }
    (remaining, dependents)
}

async fn worker(shared: Arc<Shared>) {
    loop {
        // registered before inspecting the state so no completion is missed
        let notified = shared.notify.notified();

        let next = {
            let mut state = shared.state.lock().await;
            if shared.cancellation.is_cancelled() {
                return;
            }
            match state.ready.pop_first() {
                Some(index) => {
                    state.running += 1;
                    Some(index)
                }
                None if state.running == 0 => return,
                None => None,
            }
        };

        let Some(index) = next else {
            tokio::select! {
                _ = notified => {}
                _ = shared.cancellation.cancelled() => {}
            }
            continue;
        };

        let job = &shared.jobs[index];
        if shared.debug {
            info!(path = %job.path.display(), "Starting '{}' job", job.operation.name());
        }
        let result = run_job(job).await;
        let success = result.is_success();
        debug!(
            path = %job.path.display(),
            returncode = result.returncode,
            "Finished '{}' job",
            job.operation.name()
        );

        let (completed, total) = {
            let mut state = shared.state.lock().await;
            state.results[index] = Some(result);
            state.running -= 1;
            state.completed += 1;
            let dependents = std::mem::take(&mut state.dependents[index]);
            for dependent in dependents {
                state.remaining[dependent] -= 1;
                if state.remaining[dependent] == 0 {
                    state.ready.insert(dependent);
                }
            }
            (state.completed, state.results.len())
        };
        shared.notify.notify_waiters();

        if let Some(progress) = &shared.progress {
            let _ = progress.send(JobProgress {
                path: job.path.clone(),
                success,
                completed,
                total,
            });
        }
    }
}

/// ジョブを独立したタスクで実行し、パニックも失敗結果に変換する
async fn run_job(job: &Job) -> JobResult {
    let client = Arc::clone(&job.client);
    let operation = job.operation.clone();
    let handle = tokio::spawn(async move { operation.run(client.as_ref()).await });
    match handle.await {
        Ok(result) => result,
        Err(e) => JobResult::failure(&job.path, format!("Job failed unexpectedly: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::job_builder::assign_dependencies;
    use crate::infrastructure::vcs::{
        CheckoutOptions, ClientError, CustomCommand, ExportCommand, ImportCommand, Operation,
        ValidateCommand, VcsClient,
    };
    use async_trait::async_trait;
    use std::path::Path;
    use std::time::Duration;

    /// Client whose `custom` operation records start and end in a shared log
    #[derive(Debug)]
    struct RecordingClient {
        path: PathBuf,
        log: Arc<std::sync::Mutex<Vec<String>>>,
        delay: Duration,
        returncode: i32,
    }

    #[async_trait]
    impl VcsClient for RecordingClient {
        fn vcs_type(&self) -> VcsType {
            VcsType::Git
        }

        fn path(&self) -> &Path {
            &self.path
        }

        fn is_repository(&self) -> bool {
            true
        }

        async fn import(&self, _command: &ImportCommand) -> JobResult {
            JobResult::success(&self.path, "")
        }

        async fn validate(&self, _command: &ValidateCommand) -> JobResult {
            JobResult::success(&self.path, "")
        }

        async fn export(&self, _command: &ExportCommand) -> JobResult {
            JobResult::success(&self.path, "")
        }

        async fn custom(&self, _command: &CustomCommand) -> JobResult {
            let name = self.path.display().to_string();
            self.log.lock().unwrap().push(format!("start {}", name));
            tokio::time::sleep(self.delay).await;
            self.log.lock().unwrap().push(format!("end {}", name));
            JobResult::new("custom", &self.path, name, self.returncode)
        }

        async fn checkout(&self, _options: &CheckoutOptions) -> Result<bool, ClientError> {
            Ok(true)
        }

        async fn export_repository(
            &self,
            _version: Option<&str>,
            _basepath: &Path,
        ) -> Result<bool, ClientError> {
            Ok(true)
        }
    }

    fn job(path: &str, log: &Arc<std::sync::Mutex<Vec<String>>>, delay_ms: u64, rc: i32) -> Job {
        Job::new(
            Arc::new(RecordingClient {
                path: PathBuf::from(path),
                log: Arc::clone(log),
                delay: Duration::from_millis(delay_ms),
                returncode: rc,
            }),
            Operation::Custom(CustomCommand::default()),
        )
    }

    #[tokio::test]
    async fn test_single_worker_runs_in_submission_order() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let jobs = ["e", "d", "c", "b", "a"]
            .iter()
            .map(|p| job(p, &log, 5, 0))
            .collect();

        let reports = JobExecutor::new(ExecutorConfig::default().with_workers(1))
            .execute(jobs)
            .await;

        let paths: Vec<_> = reports.iter().map(|r| r.result.output.clone()).collect();
        assert_eq!(paths, vec!["e", "d", "c", "b", "a"]);
        let expected: Vec<String> = ["e", "d", "c", "b", "a"]
            .iter()
            .flat_map(|p| [format!("start {}", p), format!("end {}", p)])
            .collect();
        assert_eq!(*log.lock().unwrap(), expected);
    }

    #[tokio::test]
    async fn test_results_keep_submission_order_in_parallel() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let jobs = vec![job("slow", &log, 50, 0), job("fast", &log, 1, 0)];

        let reports = JobExecutor::new(ExecutorConfig::default().with_workers(4))
            .execute(jobs)
            .await;

        assert_eq!(reports[0].path, PathBuf::from("slow"));
        assert_eq!(reports[1].path, PathBuf::from("fast"));
    }

    #[tokio::test]
    async fn test_parent_finishes_before_child_starts() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut jobs = vec![job("x/y", &log, 1, 0), job("x", &log, 30, 1), job("z", &log, 1, 0)];
        assign_dependencies(&mut jobs);

        let reports = JobExecutor::new(ExecutorConfig::default().with_workers(8))
            .execute(jobs)
            .await;

        let log = log.lock().unwrap();
        let parent_end = log.iter().position(|l| l == "end x").unwrap();
        let child_start = log.iter().position(|l| l == "start x/y").unwrap();
        assert!(parent_end < child_start);
        // the failing parent does not block its child
        assert!(reports[0].is_success());
        assert!(!reports[1].is_success());
        assert!(!all_succeeded(&reports));
    }

    #[tokio::test]
    async fn test_schedules_from_declared_dependencies() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut second = job("second", &log, 1, 0);
        second.depends.insert(PathBuf::from("first"));
        second.depends.insert(PathBuf::from("not-in-this-run"));
        let jobs = vec![second, job("first", &log, 30, 0)];

        let reports = JobExecutor::new(ExecutorConfig::default().with_workers(4))
            .execute(jobs)
            .await;

        let log = log.lock().unwrap();
        let first_end = log.iter().position(|l| l == "end first").unwrap();
        let second_start = log.iter().position(|l| l == "start second").unwrap();
        assert!(first_end < second_start);
        assert!(all_succeeded(&reports));
    }

    #[tokio::test]
    async fn test_nested_paths_without_declared_dependencies_are_independent() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let jobs = vec![job("x", &log, 30, 0), job("x/y", &log, 1, 0)];

        JobExecutor::new(ExecutorConfig::default().with_workers(2))
            .execute(jobs)
            .await;

        let log = log.lock().unwrap();
        let parent_end = log.iter().position(|l| l == "end x").unwrap();
        let child_end = log.iter().position(|l| l == "end x/y").unwrap();
        assert!(child_end < parent_end);
    }

    #[tokio::test]
    async fn test_cancelled_jobs_are_reported_as_skipped() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let flag = CancellationFlag::new();
        flag.cancel();

        let reports = JobExecutor::new(ExecutorConfig::default())
            .with_cancellation(flag)
            .execute(vec![job("a", &log, 1, 0)])
            .await;

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].result.returncode, 1);
        assert_eq!(reports[0].result.output, "Job skipped: execution was interrupted");
        assert!(log.lock().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sigterm_raises_the_cancellation_flag() {
        let flag = CancellationFlag::new();
        flag.cancel_on_signal();

        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(5), flag.cancelled())
            .await
            .unwrap();
        assert!(flag.is_cancelled());
    }

    #[tokio::test]
    async fn test_progress_is_reported_per_job() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        JobExecutor::new(ExecutorConfig::default().with_progress(true))
            .with_progress_sender(tx)
            .execute(vec![job("a", &log, 1, 0), job("b", &log, 1, 0)])
            .await;

        let mut completed = Vec::new();
        while let Ok(progress) = rx.try_recv() {
            assert_eq!(progress.total, 2);
            completed.push(progress.completed);
        }
        completed.sort();
        assert_eq!(completed, vec![1, 2]);
    }

    #[test]
    fn test_debug_forces_single_worker() {
        let config = ExecutorConfig::default().with_workers(8).with_debug(true);
        assert_eq!(config.effective_workers(), 1);
        assert_eq!(ExecutorConfig::default().with_workers(0).effective_workers(), 1);
    }
}
