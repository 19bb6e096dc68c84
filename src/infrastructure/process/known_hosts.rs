use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

use super::command_runner::{CommandRunner, ExecutionConfig};

fn scp_like_url() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^git@(?P<host>[^:/\s]+):").expect("valid regex"))
}

/// Hosts referenced by `git@host:path` style URLs
pub fn ssh_hosts<'a, I>(urls: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    urls.into_iter()
        .filter_map(|url| scp_like_url().captures(url))
        .filter_map(|caps| caps.name("host").map(|m| m.as_str().to_string()))
        .collect()
}

/// Returns the hosts missing from the user's known_hosts file
///
/// Without `ssh-keygen` on the PATH nothing can be checked and no host is reported.
pub async fn unknown_hosts(runner: &CommandRunner, hosts: &BTreeSet<String>) -> Vec<String> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| Path::new(".").to_path_buf());
    let config = ExecutionConfig::new(cwd);
    let mut unknown = Vec::new();

    for host in hosts {
        match runner.execute("ssh-keygen", &["-F", host.as_str()], &config).await {
            Ok(output) if output.exit_code == 0 => {}
            Ok(_) => unknown.push(host.clone()),
            Err(e) => {
                debug!("Skipping known_hosts check: {}", e);
                return Vec::new();
            }
        }
    }
    unknown
}
