use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use anyhow::{anyhow, Context, Result};
use tokio::process::Command;

/// Captured result of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// stderr if present, else stdout, else a placeholder
    pub fn summary(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        "no output".to_string()
    }
}

/// Run `program` to completion, killing it if it outlives `limit`
pub async fn run<S: AsRef<OsStr>>(
    program: impl AsRef<OsStr>,
    args: &[S],
    limit: Duration,
) -> Result<CommandOutput> {
    let program = program.as_ref();
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = tokio::time::timeout(limit, command.output())
        .await
        .map_err(|_| anyhow!("{} timed out after {:?}", program.to_string_lossy(), limit))?
        .with_context(|| format!("Failed to execute {}", program.to_string_lossy()))?;

    Ok(CommandOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Locate `name` on `PATH`
pub fn resolve_binary(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

pub fn command_exists(name: &str) -> bool {
    resolve_binary(name).is_some()
}

/// Locate `name` on `PATH`, then in `~/.local/bin` where pip installs user tools
pub fn resolve_user_binary(name: &str) -> Option<PathBuf> {
    if let Some(path) = resolve_binary(name) {
        return Some(path);
    }
    let home = std::env::var_os("HOME")?;
    let fallback = PathBuf::from(home).join(".local/bin").join(name);
    is_executable(&fallback).then_some(fallback)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
