use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::dependency_graph::normalize_path;
use crate::domain::entities::{ManifestDocument, ManifestFormatError, ResolvedManifest};

/// マニフェスト解決時のエラー
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Manifest '{reference}' is invalid: {source}")]
    Format {
        reference: String,
        #[source]
        source: ManifestFormatError,
    },

    #[error("Could not read manifest '{reference}': {reason}")]
    Load { reference: String, reason: String },

    #[error("Circular import detected: {chain}")]
    CircularImport { chain: String, reference: String },

    #[error("Manifest '{reference}' exceeds the maximum extends depth of {max}")]
    DepthLimitExceeded { reference: String, max: usize },
}

impl ManifestError {
    /// エラーの原因となったマニフェスト参照
    pub fn reference(&self) -> Option<&str> {
        match self {
            ManifestError::Format { reference, .. }
            | ManifestError::Load { reference, .. }
            | ManifestError::CircularImport { reference, .. }
            | ManifestError::DepthLimitExceeded { reference, .. } => Some(reference),
        }
    }

    /// 読み込みエラーを作成
    pub fn load(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Load {
            reference: reference.into(),
            reason: reason.into(),
        }
    }
}

/// マニフェストの取得元
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    /// ローカルファイル
    Path(PathBuf),
    /// http(s) URL
    Url(Url),
    /// 標準入力
    Stdin,
}

impl ManifestSource {
    /// コマンドライン引数やextendsの値を解釈
    ///
    /// `-`は標準入力、`file://`はローカルパスとして扱う。
    pub fn parse(reference: &str) -> Self {
        if reference == "-" {
            return ManifestSource::Stdin;
        }
        match Url::parse(reference) {
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(ManifestSource::Path)
                .unwrap_or_else(|_| ManifestSource::Path(PathBuf::from(reference))),
            Ok(url) if matches!(url.scheme(), "http" | "https") => ManifestSource::Url(url),
            _ => ManifestSource::Path(PathBuf::from(reference)),
        }
    }

    /// このマニフェストから見た相対参照を解決
    pub fn join(&self, reference: &str) -> Self {
        let parsed = Self::parse(reference);
        match (self, parsed) {
            (_, ManifestSource::Url(url)) => ManifestSource::Url(url),
            (_, ManifestSource::Stdin) => ManifestSource::Stdin,
            (_, ManifestSource::Path(path)) if path.is_absolute() => ManifestSource::Path(path),
            (ManifestSource::Url(base), ManifestSource::Path(_)) => match base.join(reference) {
                Ok(url) => ManifestSource::Url(url),
                Err(_) => ManifestSource::Path(PathBuf::from(reference)),
            },
            (ManifestSource::Path(base), ManifestSource::Path(path)) => {
                let dir = base.parent().unwrap_or_else(|| Path::new(""));
                ManifestSource::Path(normalize_path(&dir.join(path)))
            }
            (ManifestSource::Stdin, ManifestSource::Path(path)) => ManifestSource::Path(path),
        }
    }

    /// 循環検出に使う正規化済みの識別子
    pub fn identity(&self) -> String {
        match self {
            ManifestSource::Path(path) => {
                let absolute = if path.is_absolute() {
                    path.clone()
                } else {
                    std::env::current_dir()
                        .map(|dir| dir.join(path))
                        .unwrap_or_else(|_| path.clone())
                };
                std::fs::canonicalize(&absolute)
                    .unwrap_or_else(|_| normalize_path(&absolute))
                    .display()
                    .to_string()
            }
            ManifestSource::Url(url) => url.to_string(),
            ManifestSource::Stdin => "<stdin>".to_string(),
        }
    }
}

impl fmt::Display for ManifestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestSource::Path(path) => write!(f, "{}", path.display()),
            ManifestSource::Url(url) => write!(f, "{}", url),
            ManifestSource::Stdin => f.write_str("-"),
        }
    }
}

/// マニフェスト文書の読み込み元
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ManifestLoader: Send + Sync {
    /// 参照先の内容を文字列として取得
    async fn load(&self, source: &ManifestSource) -> Result<String, ManifestError>;
}

/// マニフェスト解決のオプション
#[derive(Debug, Clone, Default)]
pub struct ManifestResolverOptions {
    /// extendsの最大深度（既定は無制限。循環は常に検出される）
    pub max_depth: Option<usize>,
}

impl ManifestResolverOptions {
    /// 最大深度を設定
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }
}

type ResolveFuture<'a> = Pin<Box<dyn Future<Output = Result<ResolvedManifest, ManifestError>> + Send + 'a>>;

/// extendsチェーンを1つのマッピングへ解決する
///
/// 訪問中の参照は呼び出しごとのスタックで管理する。同じマニフェストが
/// 別々の枝から参照される（ダイヤモンド）のは許容し、自分自身を推移的に
/// 参照する場合のみ循環としてエラーにする。
#[derive(Clone)]
pub struct ManifestResolver {
    loader: Arc<dyn ManifestLoader>,
    options: ManifestResolverOptions,
}

impl ManifestResolver {
    /// 新しいManifestResolverインスタンスを作成
    pub fn new(loader: Arc<dyn ManifestLoader>) -> Self {
        Self {
            loader,
            options: ManifestResolverOptions::default(),
        }
    }

    /// オプションを設定
    pub fn with_options(mut self, options: ManifestResolverOptions) -> Self {
        self.options = options;
        self
    }

    /// 参照先のマニフェストを読み込んで解決
    pub async fn resolve(&self, source: &ManifestSource) -> Result<ResolvedManifest, ManifestError> {
        let mut stack = Vec::new();
        self.resolve_source(source.clone(), &mut stack).await
    }

    /// 解析済みの文書を解決（相対参照は`base`から辿る）
    pub async fn resolve_document(
        &self,
        document: ManifestDocument,
        base: &ManifestSource,
    ) -> Result<ResolvedManifest, ManifestError> {
        let mut stack = vec![base.identity()];
        self.merge_document(document, base.clone(), &mut stack).await
    }

    fn resolve_source<'a>(
        &'a self,
        source: ManifestSource,
        stack: &'a mut Vec<String>,
    ) -> ResolveFuture<'a> {
        Box::pin(async move {
            let identity = source.identity();

            if stack.contains(&identity) {
                let chain = stack
                    .iter()
                    .chain(std::iter::once(&identity))
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(" -> ");
                return Err(ManifestError::CircularImport {
                    chain,
                    reference: source.to_string(),
                });
            }
            if let Some(max) = self.options.max_depth {
                if stack.len() >= max {
                    return Err(ManifestError::DepthLimitExceeded {
                        reference: source.to_string(),
                        max,
                    });
                }
            }

            debug!("Loading manifest '{}'", source);
            let content = self.loader.load(&source).await?;
            let document =
                ManifestDocument::parse(&content).map_err(|e| ManifestError::Format {
                    reference: source.to_string(),
                    source: e,
                })?;

            stack.push(identity);
            let result = self.merge_document(document, source, stack).await;
            stack.pop();
            result
        })
    }

    /// 継承元を宣言順に解決し、最後に自身のリポジトリを重ねる
    fn merge_document<'a>(
        &'a self,
        document: ManifestDocument,
        source: ManifestSource,
        stack: &'a mut Vec<String>,
    ) -> ResolveFuture<'a> {
        Box::pin(async move {
            let mut merged = ResolvedManifest::default();
            for reference in &document.extends {
                let parent = source.join(reference);
                debug!("Manifest '{}' extends '{}'", source, parent);
                let resolved = self.resolve_source(parent, stack).await?;
                merged.overlay(resolved.repositories);
            }
            merged.overlay(document.repositories);
            Ok(merged)
        })
    }
}
