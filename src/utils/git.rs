//! Git remote discovery.

use std::path::Path;

use serde::Serialize;
use tokio::process::Command;
use tracing::warn;

/// Fetch and push URLs of the `origin` remote. Empty when there is none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GitRemote {
    pub fetch_url: String,
    pub push_url: String,
}

impl GitRemote {
    pub fn is_empty(&self) -> bool {
        self.fetch_url.is_empty() && self.push_url.is_empty()
    }
}

/// Parses `git remote -v` output, keeping the `origin` lines.
pub fn parse_remotes(output: &str) -> GitRemote {
    let mut remote = GitRemote::default();
    for line in output.lines() {
        let mut parts = line.split_whitespace();
        let (Some(name), Some(url), Some(kind)) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };
        if name != "origin" {
            continue;
        }
        match kind {
            "(fetch)" => remote.fetch_url = url.to_string(),
            "(push)" => remote.push_url = url.to_string(),
            _ => {}
        }
    }
    remote
}

/// Reads the `origin` remote of the repository at `dir`.
///
/// # Errors
///
/// Returns an error only if `git` cannot be spawned. A directory that is
/// not a repository, or has no origin, yields an empty [`GitRemote`].
pub async fn origin_remote(dir: &Path) -> std::io::Result<GitRemote> {
    let output = Command::new("git")
        .args(["remote", "-v"])
        .current_dir(dir)
        .output()
        .await?;

    if !output.status.success() {
        warn!(
            dir = %dir.display(),
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "git remote -v failed"
        );
        return Ok(GitRemote::default());
    }

    let remote = parse_remotes(&String::from_utf8_lossy(&output.stdout));
    if remote.is_empty() {
        warn!(dir = %dir.display(), "No origin remote found");
    }
    Ok(remote)
}
