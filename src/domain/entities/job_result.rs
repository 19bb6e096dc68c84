use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// exportで得られるリポジトリの取得元情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportInfo {
    /// 取得元URL
    pub url: String,

    /// ブランチ・タグ・リビジョン
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// ジョブ1件の実行結果
///
/// 生成後は変更されない。`returncode`が0以外なら失敗。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    /// 実行したコマンドライン
    pub cmd: String,

    /// 実行ディレクトリ
    pub cwd: PathBuf,

    /// 標準出力と標準エラー出力
    pub output: String,

    /// 終了コード
    pub returncode: i32,

    /// export時の取得元情報
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportInfo>,
}

impl JobResult {
    /// 新しいJobResultインスタンスを作成
    pub fn new(
        cmd: impl Into<String>,
        cwd: impl Into<PathBuf>,
        output: impl Into<String>,
        returncode: i32,
    ) -> Self {
        Self {
            cmd: cmd.into(),
            cwd: cwd.into(),
            output: output.into(),
            returncode,
            export: None,
        }
    }

    /// コマンドを伴わない成功結果
    pub fn success(cwd: &Path, output: impl Into<String>) -> Self {
        Self::new("", cwd, output, 0)
    }

    /// コマンドを伴わない失敗結果
    pub fn failure(cwd: &Path, output: impl Into<String>) -> Self {
        Self::new("", cwd, output, 1)
    }

    /// クライアントが対応していない操作の結果（失敗扱いにはしない）
    pub fn not_applicable(
        cwd: &Path,
        command: &str,
        client: &str,
        message: Option<&str>,
    ) -> Self {
        let mut output = format!("Command '{}' not applicable for client '{}'", command, client);
        if let Some(message) = message {
            output.push_str(": ");
            output.push_str(message);
        }
        Self::success(cwd, output)
    }

    /// 成功したかどうか
    pub fn is_success(&self) -> bool {
        self.returncode == 0
    }

    /// 出力を置き換える
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    /// export情報を付与する
    pub fn with_export(mut self, export: ExportInfo) -> Self {
        self.export = Some(export);
        self
    }

    /// 後続コマンドの結果を連結する
    ///
    /// コマンドと終了コードは後続のもの、出力は両方を改行でつないだものになる。
    pub fn then(self, next: JobResult) -> Self {
        let output = match (self.output.is_empty(), next.output.is_empty()) {
            (true, _) => next.output,
            (false, true) => self.output,
            (false, false) => format!("{}\n{}", self.output, next.output),
        };
        Self {
            cmd: next.cmd,
            cwd: next.cwd,
            output,
            returncode: next.returncode,
            export: next.export.or(self.export),
        }
    }
}
