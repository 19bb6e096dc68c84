//! Test fixtures for creating manifests and working copies

use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Writes manifest files into a temporary directory
pub struct ManifestFixture {
    dir: TempDir,
}

impl ManifestFixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `content` to `name` and return its path
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create manifest dir");
        }
        std::fs::write(&path, content).expect("Failed to write manifest");
        path
    }

    /// Manifest with one git entry per `(path, url)` pair
    pub fn repositories(entries: &[(&str, &str)]) -> String {
        let mut content = String::from("repositories:\n");
        for (path, url) in entries {
            content.push_str(&format!("  {}:\n    type: git\n    url: {}\n", path, url));
        }
        content
    }
}

impl Default for ManifestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `program --version` can be run
pub fn executable_available(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Run git in `dir` with a fixed identity, panicking on failure
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
        .args(["-c", "init.defaultBranch=main", "-c", "commit.gpgsign=false"])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Create a git repository with one commit on `main` and a tag `v1.0`
pub fn create_origin_repository(dir: &Path) -> PathBuf {
    std::fs::create_dir_all(dir).expect("Failed to create origin dir");
    git(dir, &["init", "--quiet"]);
    git(dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    std::fs::write(dir.join("README.md"), "# Test Repository\n").expect("Failed to write file");
    git(dir, &["add", "README.md"]);
    git(dir, &["commit", "--quiet", "-m", "Initial commit"]);
    git(dir, &["tag", "v1.0"]);
    dir.to_path_buf()
}
