use crate::git_info::GitInfo;
use anyhow::{Result, anyhow};
use std::io::Write;
use std::process::{Command, Output, Stdio};
use std::sync::{Arc, OnceLock};
use tracing::instrument;

/// Runs git subprocesses against a repository path.
///
/// The linearization engine is conflict-driven: cherry-pick, merge, rebase and
/// apply are all expected to fail with exit code 1 in the normal course of a
/// run. The `*_with_status` form is therefore the primary interface; the plain
/// form treats any nonzero exit (other than a `merge-tree` conflict) as an
/// error.
#[derive(Clone, Debug, Default)]
pub struct GitCommandExecutor {
  info: Arc<OnceLock<GitInfo>>,
}

impl GitCommandExecutor {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  #[instrument(skip(self))]
  pub fn get_info(&self) -> Result<GitInfo> {
    if let Some(info) = self.info.get() {
      return Ok(info.clone());
    }

    let info = GitInfo::discover().map_err(|e| anyhow!(e))?;
    tracing::info!(git_version = %info.version, git_path = %info.path, "discovered git info");
    // a concurrent discover is harmless; first one wins
    let _ = self.info.set(info);
    self.info.get().cloned().ok_or_else(|| anyhow!("git info should be initialized"))
  }

  fn spawn(&self, args: &[&str], repository_path: &str, input: Option<&str>) -> Result<Output> {
    if repository_path.is_empty() {
      return Err(anyhow!("repository path cannot be blank"));
    }
    let git_info = self.get_info()?;

    let mut cmd = Command::new(&git_info.path);
    cmd.args(args).current_dir(repository_path);

    let output = if let Some(input) = input {
      let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| anyhow!("Failed to spawn git command: {e}"))?;
      if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input.as_bytes()).map_err(|e| anyhow!("Failed to write to stdin: {e}"))?;
      }
      child.wait_with_output().map_err(|e| anyhow!("Failed to execute git command: {e}"))?
    } else {
      cmd.output().map_err(|e| anyhow!("Failed to execute git command: {e}"))?
    };

    Ok(output)
  }

  fn command_failed<T>(&self, output: &Output, args: &[&str]) -> Result<T> {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    tracing::Span::current().record("success", false);
    tracing::error!(stderr = %stderr, "git command failed");
    let git_info = self.get_info()?;
    Err(anyhow!("git command failed: {} {}\nError: {stderr}", git_info.path, args.join(" ")))
  }

  // `git merge-tree --write-tree` reports conflicts through exit code 1
  // while still writing a usable tree; that is a result, not a failure.
  fn is_conflict_report(args: &[&str], output: &Output) -> bool {
    args.contains(&"merge-tree") && output.status.code() == Some(1)
  }

  /// Execute a git command, treating any real failure as an error.
  /// Returns trimmed stdout.
  #[instrument(
    skip(self),
    fields(
      git_command = args.join(" "),
      repository_path = repository_path,
      success = tracing::field::Empty,
    )
  )]
  pub fn execute_command(&self, args: &[&str], repository_path: &str) -> Result<String> {
    let output = self.spawn(args, repository_path, None)?;

    if output.status.success() || Self::is_conflict_report(args, &output) {
      tracing::Span::current().record("success", true);
      Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
      self.command_failed(&output, args)
    }
  }

  /// Execute a git command and return raw untrimmed output.
  /// Used where exact bytes matter, e.g. `git diff --binary` patches.
  #[instrument(
    skip(self),
    fields(
      git_command = args.join(" "),
      repository_path = repository_path,
      success = tracing::field::Empty,
    )
  )]
  pub fn execute_command_raw(&self, args: &[&str], repository_path: &str) -> Result<String> {
    let output = self.spawn(args, repository_path, None)?;

    if output.status.success() {
      tracing::Span::current().record("success", true);
      Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
      self.command_failed(&output, args)
    }
  }

  /// Execute a git command whose nonzero exit is an expected outcome
  /// (conflicted cherry-pick, merge, rebase, apply).
  /// Returns trimmed stdout and the exit code; stderr goes to the log.
  #[instrument(
    skip(self),
    fields(
      git_command = args.join(" "),
      repository_path = repository_path,
      exit_code = tracing::field::Empty,
    )
  )]
  pub fn execute_command_with_status(&self, args: &[&str], repository_path: &str) -> Result<(String, i32)> {
    let output = self.spawn(args, repository_path, None)?;
    let exit_code = output.status.code().unwrap_or(-1);
    tracing::Span::current().record("exit_code", exit_code);

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
      tracing::debug!(stderr = %stderr, exit_code = exit_code, "git command exited nonzero");
    }
    Ok((stdout, exit_code))
  }

  /// Execute a git command with data fed through stdin (e.g. `git apply`).
  #[instrument(
    skip(self, input),
    fields(
      git_command = args.join(" "),
      repository_path = repository_path,
      input_length = input.len(),
      success = tracing::field::Empty,
    )
  )]
  pub fn execute_command_with_input(&self, args: &[&str], repository_path: &str, input: &str) -> Result<String> {
    let output = self.spawn(args, repository_path, Some(input))?;

    if output.status.success() {
      tracing::Span::current().record("success", true);
      Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
      self.command_failed(&output, args)
    }
  }

  /// Execute a git command and return output as lines, filtering empty lines.
  #[instrument(
    skip(self),
    fields(
      git_command = args.join(" "),
      repository_path = repository_path,
      success = tracing::field::Empty,
    )
  )]
  pub fn execute_command_lines(&self, args: &[&str], repository_path: &str) -> Result<Vec<String>> {
    let output = self.spawn(args, repository_path, None)?;

    if output.status.success() {
      tracing::Span::current().record("success", true);
      Ok(Self::parse_lines(&output.stdout))
    } else {
      self.command_failed(&output, args)
    }
  }

  /// Split raw output into trimmed non-empty lines.
  pub fn parse_lines(output: &[u8]) -> Vec<String> {
    output
      .split(|&b| b == b'\n')
      .filter_map(|line| {
        let line_str = String::from_utf8_lossy(line);
        let trimmed = line_str.trim();
        if !trimmed.is_empty() { Some(trimmed.to_string()) } else { None }
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_lines_filters_blanks() {
    let lines = GitCommandExecutor::parse_lines(b"a\n\n  b  \n\n");
    assert_eq!(lines, vec!["a".to_string(), "b".to_string()]);
  }

  #[test]
  fn test_blank_repository_path_rejected() {
    let executor = GitCommandExecutor::new();
    assert!(executor.execute_command(&["status"], "").is_err());
  }
}
