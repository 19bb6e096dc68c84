use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;
use validator::Validate;

/// マニフェスト文書の形式エラー
#[derive(Debug, Error)]
pub enum ManifestFormatError {
    #[error("Input data is not valid yaml format: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    #[error("Input data is not valid format: {0}")]
    InvalidFormat(String),
}

/// リポジトリ1件分の定義
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RepoSpec {
    /// VCSの種別タグ（git, hg, svn, bzr, tar, zip）
    #[serde(rename = "type")]
    #[validate(length(min = 1))]
    pub vcs_type: String,

    /// 取得元URL
    #[validate(length(min = 1))]
    pub url: String,

    /// ブランチ・タグ・リビジョン
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl RepoSpec {
    /// 新しいRepoSpecインスタンスを作成
    pub fn new(vcs_type: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            vcs_type: vcs_type.into(),
            url: url.into(),
            version: None,
        }
    }

    /// バージョンを設定
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// 解析済みのマニフェスト文書（extendsは未解決）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestDocument {
    /// 継承元マニフェストへの参照（宣言順）
    pub extends: Vec<String>,

    /// この文書自身が定義するリポジトリ
    pub repositories: BTreeMap<String, RepoSpec>,
}

impl ManifestDocument {
    /// YAML文字列からマニフェスト文書を解析
    ///
    /// 必要な情報を欠いたエントリは警告を出してスキップする。
    pub fn parse(content: &str) -> Result<Self, ManifestFormatError> {
        let root: Value = serde_yaml::from_str(content)?;
        match root {
            Value::Mapping(mapping) => Self::from_mapping(&mapping),
            Value::Sequence(items) => Ok(Self {
                extends: Vec::new(),
                repositories: parse_rosinstall(&items)?,
            }),
            Value::Null => Err(ManifestFormatError::InvalidFormat(
                "document is empty".to_string(),
            )),
            _ => Err(ManifestFormatError::InvalidFormat(
                "expected a mapping with a 'repositories' key".to_string(),
            )),
        }
    }

    /// extendsを持つかどうか
    pub fn has_extends(&self) -> bool {
        !self.extends.is_empty()
    }

    fn from_mapping(mapping: &Mapping) -> Result<Self, ManifestFormatError> {
        let extends = match mapping.get("extends") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(reference)) => vec![reference.clone()],
            Some(Value::Sequence(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        ManifestFormatError::InvalidFormat(
                            "'extends' entries must be strings".to_string(),
                        )
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(ManifestFormatError::InvalidFormat(
                    "'extends' must be a string or a list of strings".to_string(),
                ))
            }
        };

        let repositories = match mapping.get("repositories") {
            None if extends.is_empty() => {
                return Err(ManifestFormatError::InvalidFormat(
                    "missing 'repositories'".to_string(),
                ))
            }
            None => BTreeMap::new(),
            Some(Value::Null) => {
                warn!("List of repositories is empty");
                BTreeMap::new()
            }
            Some(Value::Mapping(entries)) => parse_repositories(entries),
            Some(_) => {
                return Err(ManifestFormatError::InvalidFormat(
                    "'repositories' must be a mapping".to_string(),
                ))
            }
        };

        Ok(Self {
            extends,
            repositories,
        })
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_repositories(entries: &Mapping) -> BTreeMap<String, RepoSpec> {
    let mut repositories = BTreeMap::new();
    for (key, attributes) in entries {
        let Some(path) = scalar_to_string(key) else {
            warn!("Skipping repository with a non-scalar path: {:?}", key);
            continue;
        };
        match repo_from_attributes(attributes, "type", "url") {
            Ok(spec) => {
                repositories.insert(path, spec);
            }
            Err(missing) => warn!(
                "Repository '{}' does not provide the necessary information: {}",
                path, missing
            ),
        }
    }
    repositories
}

fn parse_rosinstall(items: &[Value]) -> Result<BTreeMap<String, RepoSpec>, ManifestFormatError> {
    let mut repositories = BTreeMap::new();
    for (index, item) in items.iter().enumerate() {
        let entry = item
            .as_mapping()
            .filter(|m| m.len() == 1)
            .ok_or_else(|| {
                ManifestFormatError::InvalidFormat(format!(
                    "list item #{} must map a single repository type to its attributes",
                    index
                ))
            })?;
        let Some((type_key, attributes)) = entry.iter().next() else {
            continue;
        };
        let Some(path) = attributes.get("local-name").and_then(scalar_to_string) else {
            warn!(
                "Repository #{} does not provide the necessary information: 'local-name'",
                index
            );
            continue;
        };
        let Some(vcs_type) = scalar_to_string(type_key) else {
            warn!("Repository '{}' has a non-scalar type", path);
            continue;
        };

        let mut with_type = attributes.as_mapping().cloned().unwrap_or_default();
        with_type.insert(Value::from("type"), Value::from(vcs_type));
        match repo_from_attributes(&Value::Mapping(with_type), "type", "uri") {
            Ok(spec) => {
                repositories.insert(path, spec);
            }
            Err(missing) => warn!(
                "Repository '{}' does not provide the necessary information: {}",
                path, missing
            ),
        }
    }
    Ok(repositories)
}

/// 属性マップからRepoSpecを組み立てる。欠けている項目名をErrで返す
fn repo_from_attributes(attributes: &Value, type_key: &str, url_key: &str) -> Result<RepoSpec, String> {
    let field = |name: &str| attributes.get(name).and_then(scalar_to_string);

    let spec = RepoSpec {
        vcs_type: field(type_key).ok_or_else(|| format!("'{}'", type_key))?,
        url: field(url_key).ok_or_else(|| format!("'{}'", url_key))?,
        version: field("version"),
    };
    spec.validate().map_err(|e| e.to_string())?;
    Ok(spec)
}

/// extendsを全て解決した後のマニフェスト
///
/// キーはソート済みで保持され、直列化結果は解決のたびに同一になる。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedManifest {
    /// パス → リポジトリ定義
    pub repositories: BTreeMap<String, RepoSpec>,
}

impl ResolvedManifest {
    /// 新しいResolvedManifestインスタンスを作成
    pub fn new(repositories: BTreeMap<String, RepoSpec>) -> Self {
        Self { repositories }
    }

    /// 別のマッピングを重ねる。同じキーはエントリ単位で上書き
    pub fn overlay(&mut self, repositories: BTreeMap<String, RepoSpec>) {
        self.repositories.extend(repositories);
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&RepoSpec> {
        self.repositories.get(path)
    }

    /// YAML文字列に直列化
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_basic_document() {
        let yaml = r#"
repositories:
  vendor/lib:
    type: git
    url: https://github.com/example/lib.git
    version: main
  tools:
    type: hg
    url: https://hg.example.com/tools
"#;
        let doc = ManifestDocument::parse(yaml).unwrap();
        assert!(!doc.has_extends());
        assert_eq!(doc.repositories.len(), 2);
        assert_eq!(
            doc.repositories["vendor/lib"],
            RepoSpec::new("git", "https://github.com/example/lib.git").with_version("main")
        );
        assert_eq!(doc.repositories["tools"].version, None);
    }

    #[test]
    fn test_parse_extends_single_and_list() {
        let single = ManifestDocument::parse("extends: base.repos\n").unwrap();
        assert_eq!(single.extends, vec!["base.repos".to_string()]);
        assert!(single.repositories.is_empty());

        let list = ManifestDocument::parse("extends: [a.repos, b.repos]\nrepositories: {}\n").unwrap();
        assert_eq!(list.extends, vec!["a.repos".to_string(), "b.repos".to_string()]);
    }

    #[test]
    fn test_missing_repositories_without_extends_is_error() {
        let err = ManifestDocument::parse("something_else: 1\n").unwrap_err();
        assert!(matches!(err, ManifestFormatError::InvalidFormat(_)));
        assert!(err.to_string().contains("repositories"));
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        let err = ManifestDocument::parse("repositories: [unclosed").unwrap_err();
        assert!(matches!(err, ManifestFormatError::InvalidYaml(_)));
    }

    #[test]
    fn test_incomplete_entries_are_skipped() {
        let yaml = r#"
repositories:
  no_url:
    type: git
  no_type:
    url: https://example.com/x.git
  empty_url:
    type: git
    url: ""
  ok:
    type: svn
    url: https://svn.example.com/trunk
"#;
        let doc = ManifestDocument::parse(yaml).unwrap();
        assert_eq!(doc.repositories.keys().collect::<Vec<_>>(), vec!["ok"]);
    }

    #[test]
    fn test_numeric_version_is_stringified() {
        let yaml = "repositories:\n  pkg:\n    type: tar\n    url: https://example.com/p.tar.gz\n    version: 42\n";
        let doc = ManifestDocument::parse(yaml).unwrap();
        assert_eq!(doc.repositories["pkg"].version.as_deref(), Some("42"));
    }

    #[test]
    fn test_null_repositories_is_empty() {
        let doc = ManifestDocument::parse("repositories:\n").unwrap();
        assert!(doc.repositories.is_empty());
    }

    #[test]
    fn test_parse_rosinstall_format() {
        let yaml = r#"
- git:
    local-name: immutable/hash
    uri: https://github.com/example/repo.git
    version: 377d5b3d03c212f015cc832fdb368f4534d0d583
- svn:
    local-name: trunk
    uri: https://svn.example.com/repo/trunk
- git:
    uri: https://github.com/example/missing-name.git
"#;
        let doc = ManifestDocument::parse(yaml).unwrap();
        assert_eq!(doc.repositories.len(), 2);
        assert_eq!(doc.repositories["trunk"].vcs_type, "svn");
        assert_eq!(
            doc.repositories["immutable/hash"].version.as_deref(),
            Some("377d5b3d03c212f015cc832fdb368f4534d0d583")
        );
    }

    #[test]
    fn test_overlay_replaces_whole_entries() {
        let mut manifest = ResolvedManifest::default();
        manifest.overlay(BTreeMap::from([(
            "k".to_string(),
            RepoSpec::new("git", "https://a").with_version("v1"),
        )]));
        manifest.overlay(BTreeMap::from([("k".to_string(), RepoSpec::new("hg", "https://b"))]));

        assert_eq!(manifest.get("k"), Some(&RepoSpec::new("hg", "https://b")));
    }

    #[test]
    fn test_yaml_output_is_sorted() {
        let manifest = ResolvedManifest::new(BTreeMap::from([
            ("z".to_string(), RepoSpec::new("git", "https://z")),
            ("a".to_string(), RepoSpec::new("git", "https://a")),
        ]));
        let yaml = manifest.to_yaml().unwrap();
        let a = yaml.find("  a:").unwrap();
        let z = yaml.find("  z:").unwrap();
        assert!(a < z);
        assert!(yaml.starts_with("repositories:"));
    }
}
