//! マニフェスト解決の統合テスト
//!
//! ファイルシステム上のマニフェストとextendsチェーンの解決を確認する

mod common;

use pretty_assertions::assert_eq;
use std::sync::Arc;

use common::mock_services::InMemoryLoader;
use common::test_fixtures::ManifestFixture;
use vcsbatch::application::services::{
    ManifestError, ManifestResolver, ManifestSource,
};
use vcsbatch::domain::entities::{ManifestDocument, RepoSpec};
use vcsbatch::infrastructure::filesystem::ManifestStore;

fn file_resolver() -> ManifestResolver {
    ManifestResolver::new(Arc::new(ManifestStore::new().unwrap()))
}

fn source(path: &std::path::Path) -> ManifestSource {
    ManifestSource::Path(path.to_path_buf())
}

#[tokio::test]
async fn test_manifest_without_extends_is_unchanged() {
    let fixture = ManifestFixture::new();
    let path = fixture.write(
        "plain.repos",
        &ManifestFixture::repositories(&[
            ("src/b", "https://example.com/b.git"),
            ("src/a", "https://example.com/a.git"),
        ]),
    );

    let manifest = file_resolver().resolve(&source(&path)).await.unwrap();

    assert_eq!(manifest.len(), 2);
    assert_eq!(
        manifest.get("src/a"),
        Some(&RepoSpec::new("git", "https://example.com/a.git"))
    );
}

#[tokio::test]
async fn test_child_overrides_whole_entry() {
    let fixture = ManifestFixture::new();
    fixture.write(
        "base.repos",
        r#"
repositories:
  shared:
    type: git
    url: https://example.com/shared.git
    version: main
  only_base:
    type: hg
    url: https://example.com/only_base
"#,
    );
    let child = fixture.write(
        "child.repos",
        r#"
extends: base.repos
repositories:
  shared:
    type: svn
    url: https://example.com/svn/shared
"#,
    );

    let manifest = file_resolver().resolve(&source(&child)).await.unwrap();

    // version from the parent entry does not survive
    assert_eq!(
        manifest.get("shared"),
        Some(&RepoSpec::new("svn", "https://example.com/svn/shared"))
    );
    assert_eq!(
        manifest.get("only_base"),
        Some(&RepoSpec::new("hg", "https://example.com/only_base"))
    );
}

#[tokio::test]
async fn test_later_parent_wins_then_child() {
    let fixture = ManifestFixture::new();
    fixture.write(
        "a.repos",
        &ManifestFixture::repositories(&[("k", "https://a/k"), ("only_a", "https://a/x")]),
    );
    fixture.write(
        "b.repos",
        &ManifestFixture::repositories(&[("k", "https://b/k"), ("m", "https://b/m")]),
    );
    let child = fixture.write(
        "child.repos",
        r#"
extends: [a.repos, b.repos]
repositories:
  m:
    type: git
    url: https://child/m
"#,
    );

    let manifest = file_resolver().resolve(&source(&child)).await.unwrap();

    assert_eq!(manifest.get("k").unwrap().url, "https://b/k");
    assert_eq!(manifest.get("m").unwrap().url, "https://child/m");
    assert_eq!(manifest.get("only_a").unwrap().url, "https://a/x");
}

#[tokio::test]
async fn test_extends_relative_to_including_file() {
    let fixture = ManifestFixture::new();
    fixture.write(
        "layers/base.repos",
        &ManifestFixture::repositories(&[("base", "https://example.com/base.git")]),
    );
    fixture.write(
        "layers/mid.repos",
        "extends: base.repos\nrepositories: {}\n",
    );
    let top = fixture.write("top.repos", "extends: layers/mid.repos\n");

    let manifest = file_resolver().resolve(&source(&top)).await.unwrap();

    assert_eq!(manifest.len(), 1);
    assert!(manifest.get("base").is_some());
}

#[tokio::test]
async fn test_circular_extends_fails() {
    let fixture = ManifestFixture::new();
    fixture.write("m1.repos", "extends: m2.repos\nrepositories: {}\n");
    fixture.write("m2.repos", "extends: m1.repos\nrepositories: {}\n");

    let err = file_resolver()
        .resolve(&source(&fixture.path().join("m1.repos")))
        .await
        .unwrap_err();

    assert!(matches!(err, ManifestError::CircularImport { .. }));
    assert!(err.to_string().starts_with("Circular import detected"));
}

#[tokio::test]
async fn test_self_extends_fails() {
    let fixture = ManifestFixture::new();
    let path = fixture.write("self.repos", "extends: ./self.repos\n");

    let err = file_resolver().resolve(&source(&path)).await.unwrap_err();

    assert!(matches!(err, ManifestError::CircularImport { .. }));
}

#[tokio::test]
async fn test_diamond_is_not_a_cycle() {
    let loader = InMemoryLoader::new();
    loader
        .add("/m/root.repos", "extends: [left.repos, right.repos]\n")
        .add("/m/left.repos", "extends: shared.repos\n")
        .add("/m/right.repos", "extends: shared.repos\n")
        .add(
            "/m/shared.repos",
            &ManifestFixture::repositories(&[("common", "https://example.com/common.git")]),
        );

    let manifest = ManifestResolver::new(Arc::new(loader.clone()))
        .resolve(&ManifestSource::parse("/m/root.repos"))
        .await
        .unwrap();

    assert_eq!(manifest.len(), 1);
    assert_eq!(loader.calls().len(), 5);
}

#[tokio::test]
async fn test_deep_extends_chain_resolves() {
    let loader = InMemoryLoader::new();
    for i in 0..40 {
        loader.add(
            &format!("/d/{i}.repos"),
            &format!("extends: {}.repos\n", i + 1),
        );
    }
    loader.add(
        "/d/40.repos",
        &ManifestFixture::repositories(&[("base", "https://example.com/base.git")]),
    );

    let manifest = ManifestResolver::new(Arc::new(loader.clone()))
        .resolve(&ManifestSource::parse("/d/0.repos"))
        .await
        .unwrap();

    assert_eq!(manifest.len(), 1);
    assert_eq!(loader.calls().len(), 41);
}

#[tokio::test]
async fn test_missing_parent_names_the_reference() {
    let fixture = ManifestFixture::new();
    let path = fixture.write("child.repos", "extends: missing.repos\n");

    let err = file_resolver().resolve(&source(&path)).await.unwrap_err();

    assert!(matches!(err, ManifestError::Load { .. }));
    assert!(err.reference().unwrap().ends_with("missing.repos"));
}

#[tokio::test]
async fn test_resolution_is_deterministic() {
    let fixture = ManifestFixture::new();
    fixture.write(
        "base.repos",
        &ManifestFixture::repositories(&[("z", "https://z"), ("a", "https://a"), ("m", "https://m")]),
    );
    let child = fixture.write(
        "child.repos",
        "extends: base.repos\nrepositories:\n  b:\n    type: tar\n    url: https://b.tar\n",
    );
    let resolver = file_resolver();

    let first = resolver.resolve(&source(&child)).await.unwrap().to_yaml().unwrap();
    let second = resolver.resolve(&source(&child)).await.unwrap().to_yaml().unwrap();

    assert_eq!(first, second);
    let keys: Vec<&str> = first
        .lines()
        .filter(|line| line.starts_with("  ") && !line.starts_with("    "))
        .collect();
    assert_eq!(keys, vec!["  a:", "  b:", "  m:", "  z:"]);
}

#[tokio::test]
async fn test_parsed_document_resolves_extends_against_base() {
    let loader = InMemoryLoader::new();
    loader.add(
        "/p/base.repos",
        &ManifestFixture::repositories(&[("lib", "https://example.com/lib.git")]),
    );
    let document = ManifestDocument::parse(
        "extends: base.repos\nrepositories:\n  app:\n    type: hg\n    url: https://example.com/app\n",
    )
    .unwrap();

    let manifest = ManifestResolver::new(Arc::new(loader.clone()))
        .resolve_document(document, &ManifestSource::parse("/p/project.repos"))
        .await
        .unwrap();

    assert_eq!(manifest.len(), 2);
    assert_eq!(manifest.get("app").map(|spec| spec.vcs_type.as_str()), Some("hg"));
    assert_eq!(loader.calls().len(), 1);
}
