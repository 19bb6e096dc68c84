use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

/// パスを字句的に正規化する
///
/// `.`を取り除き、`..`は直前の要素と相殺する。ファイルシステムには触れない。
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let last_is_normal =
                    matches!(normalized.components().next_back(), Some(Component::Normal(_)));
                if last_is_normal {
                    normalized.pop();
                } else if !matches!(
                    normalized.components().next_back(),
                    Some(Component::RootDir) | Some(Component::Prefix(_))
                ) {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}

/// `ancestor`が`path`の真の祖先ディレクトリかどうか（字句比較）
pub fn is_strict_ancestor(ancestor: &Path, path: &Path) -> bool {
    let ancestor = normalize_path(ancestor);
    let path = normalize_path(path);
    if ancestor == path {
        return false;
    }
    if ancestor == Path::new(".") {
        // the current directory contains every relative path not leaving it
        return path.is_relative() && !path.starts_with("..");
    }
    path.starts_with(&ancestor)
}

/// ジョブ間の依存関係（パスの包含関係から導出）
///
/// ジョブJは、同じ実行内に存在しJのパスの真の祖先をパスに持つ全ジョブに依存する。
/// 祖先ジョブの成否には依存しない。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    depends: Vec<BTreeSet<usize>>,
}

impl DependencyGraph {
    /// ジョブのパス一覧（投入順）から依存関係を構築
    pub fn build<P: AsRef<Path>>(paths: &[P]) -> Self {
        let normalized: Vec<PathBuf> = paths.iter().map(|p| normalize_path(p.as_ref())).collect();
        let depends = normalized
            .iter()
            .map(|path| {
                normalized
                    .iter()
                    .enumerate()
                    .filter(|(_, other)| is_strict_ancestor(other, path))
                    .map(|(index, _)| index)
                    .collect()
            })
            .collect();
        Self { depends }
    }

    /// ジョブ数
    pub fn len(&self) -> usize {
        self.depends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depends.is_empty()
    }

    /// `index`のジョブが依存するジョブ
    pub fn dependencies(&self, index: usize) -> &BTreeSet<usize> {
        &self.depends[index]
    }

    /// 各ジョブに依存しているジョブの一覧
    pub fn dependents(&self) -> Vec<Vec<usize>> {
        let mut dependents = vec![Vec::new(); self.depends.len()];
        for (index, depends) in self.depends.iter().enumerate() {
            for &dependency in depends {
                dependents[dependency].push(index);
            }
        }
        dependents
    }
}
