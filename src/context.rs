//! Facts about the working directory that are appended to the system prompt.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

const MAX_NODE_DEPS: usize = 5;

/// Collect Go module, git and Node project facts for `dir`, one per line.
///
/// Anything that cannot be read is left out; an empty string means nothing
/// was found.
pub async fn gather(dir: &Path) -> String {
    let parts = [go_context(dir), git_context(dir).await, node_context(dir)];
    parts.into_iter().flatten().collect::<Vec<_>>().join("\n")
}

/// Append the directory facts to `system` under a heading, if there are any.
pub fn with_context(system: &str, ctx: &str) -> String {
    if ctx.is_empty() {
        return system.to_string();
    }
    format!("{system}\n\nCurrent directory context:\n{ctx}")
}

fn go_context(dir: &Path) -> Option<String> {
    let data = std::fs::read_to_string(dir.join("go.mod")).ok()?;

    let mut module = None;
    let mut version = None;
    for line in data.lines().map(str::trim) {
        if let Some(m) = line.strip_prefix("module ") {
            module.get_or_insert(m);
        } else if let Some(v) = line.strip_prefix("go ") {
            version.get_or_insert(v);
        }
        if module.is_some() && version.is_some() {
            break;
        }
    }

    let module = module.filter(|m| !m.is_empty())?;
    Some(format!("Go module: {module} (go {})", version.unwrap_or_default()))
}

async fn git_context(dir: &Path) -> Option<String> {
    let branch = git(dir, &["rev-parse", "--abbrev-ref", "HEAD"]).await?;
    Some(match git(dir, &["log", "-1", "--pretty=%s"]).await {
        Some(subject) => format!("Git branch: {branch}\nLast commit: {subject}"),
        None => format!("Git branch: {branch}"),
    })
}

async fn git(dir: &Path, args: &[&str]) -> Option<String> {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await
        .map_err(|e| tracing::trace!(error = %e, "git unavailable"))
        .ok()?;
    if !out.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&out.stdout).trim().to_string())
}

#[derive(Debug, Deserialize)]
struct PackageJson {
    #[serde(default)]
    name: String,
    #[serde(default)]
    dependencies: BTreeMap<String, serde_json::Value>,
}

fn node_context(dir: &Path) -> Option<String> {
    let data = std::fs::read(dir.join("package.json")).ok()?;
    let pkg: PackageJson = serde_json::from_slice(&data)
        .map_err(|e| tracing::debug!(error = %e, "ignoring unreadable package.json"))
        .ok()?;
    if pkg.name.is_empty() {
        return None;
    }

    let mut out = format!("Node project: {}", pkg.name);
    if !pkg.dependencies.is_empty() {
        let deps: Vec<&str> = pkg
            .dependencies
            .keys()
            .take(MAX_NODE_DEPS)
            .map(String::as_str)
            .collect();
        out.push_str("\nDependencies: ");
        out.push_str(&deps.join(", "));
    }
    Some(out)
}
