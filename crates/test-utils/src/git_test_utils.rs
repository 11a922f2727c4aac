// Note: We don't import GitCommandExecutor here to avoid circular dependency
// Each crate that uses TestRepo should provide its own GitCommandExecutor
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Git test repository wrapper with helper methods
pub struct TestRepo {
  dir: TempDir,
}

impl Default for TestRepo {
  fn default() -> Self {
    Self::new()
  }
}

impl TestRepo {
  /// Creates a new test repository on a `master` branch
  pub fn new() -> Self {
    let dir = tempfile::tempdir().unwrap();
    let repo_path = dir.path();

    let output = Command::new("git")
      .args(["--no-pager", "init", "--initial-branch=master"])
      .current_dir(repo_path)
      .output()
      .unwrap();
    if !output.status.success() {
      panic!("Git init failed: {}", String::from_utf8_lossy(&output.stderr));
    }

    let repo = Self { dir };
    repo.git(&["config", "user.name", "Test User"]).unwrap();
    repo.git(&["config", "user.email", "test@example.com"]).unwrap();
    repo.git(&["config", "merge.conflictstyle", "zdiff3"]).unwrap();
    repo
  }

  /// Get the repository path
  pub fn path(&self) -> &Path {
    self.dir.path()
  }

  /// Get the repository path as a str
  pub fn path_str(&self) -> &str {
    self.dir.path().to_str().unwrap()
  }

  /// Run an arbitrary git command in the repository, returning trimmed stdout
  pub fn git(&self, args: &[&str]) -> Result<String, String> {
    let output = Command::new("git").arg("--no-pager").args(args).current_dir(self.path()).output().unwrap();
    if output.status.success() {
      Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
      Err(String::from_utf8_lossy(&output.stderr).to_string())
    }
  }

  fn git_ok(&self, args: &[&str]) -> String {
    match self.git(args) {
      Ok(out) => out,
      Err(e) => panic!("git {args:?} failed: {e}"),
    }
  }

  /// Write a file without committing it
  pub fn write_file(&self, filename: &str, content: &str) {
    let file_path = self.path().join(filename);
    if let Some(parent) = file_path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(&file_path, content).unwrap();
  }

  /// Read a file from the working tree
  pub fn read_file(&self, filename: &str) -> String {
    fs::read_to_string(self.path().join(filename)).unwrap()
  }

  /// Creates a commit with a file
  pub fn create_commit(&self, message: &str, filename: &str, content: &str) -> String {
    self.create_commit_with_files(message, &[(filename, content)])
  }

  /// Creates a commit with multiple files
  pub fn create_commit_with_files(&self, message: &str, files: &[(&str, &str)]) -> String {
    for (filename, content) in files {
      self.write_file(filename, content);
      self.git_ok(&["add", filename]);
    }
    self.git_ok(&["commit", "-m", message]);
    self.head()
  }

  /// Creates a commit with an explicit message but no tree change
  pub fn create_empty_commit(&self, message: &str) -> String {
    self.git_ok(&["commit", "--allow-empty", "-m", message]);
    self.head()
  }

  /// Creates a branch pointing to the current HEAD
  pub fn create_branch(&self, branch_name: &str) -> Result<(), String> {
    self.git(&["branch", branch_name]).map(|_| ())
  }

  /// Creates a branch pointing to a specific commit
  pub fn create_branch_at(&self, branch_name: &str, commit_hash: &str) -> Result<(), String> {
    self.git(&["branch", branch_name, commit_hash]).map(|_| ())
  }

  /// Checkout a branch or commit
  pub fn checkout(&self, ref_name: &str) -> Result<(), String> {
    self.git(&["checkout", ref_name]).map(|_| ())
  }

  /// Hard reset to a commit
  pub fn reset_hard(&self, commit_hash: &str) -> Result<(), String> {
    self.git(&["reset", "--hard", commit_hash]).map(|_| ())
  }

  /// Get the current HEAD commit hash
  pub fn head(&self) -> String {
    self.git_ok(&["rev-parse", "HEAD"])
  }

  /// Get the commit hash of a reference
  pub fn rev_parse(&self, ref_name: &str) -> Result<String, String> {
    self.git(&["rev-parse", ref_name])
  }

  /// Get the tree id of a revision
  pub fn tree_id(&self, rev: &str) -> String {
    self.git_ok(&["rev-parse", &format!("{rev}^{{tree}}")])
  }

  /// Current branch name, or None when detached
  pub fn current_branch(&self) -> Option<String> {
    let out = self.git_ok(&["branch", "--show-current"]);
    if out.is_empty() { None } else { Some(out) }
  }

  /// `git status --porcelain` output
  pub fn status(&self) -> String {
    self.git_ok(&["status", "--porcelain"])
  }

  /// Create a merge commit of `branch` into the current branch.
  /// `extra` carries strategy arguments such as `-X`/`ours` or `-s`/`ours`.
  pub fn merge_with(&self, branch: &str, message: &str, extra: &[&str]) -> Result<String, String> {
    let mut args = vec!["merge", "--no-ff", "-m", message];
    args.extend_from_slice(extra);
    args.push(branch);
    self.git(&args)?;
    Ok(self.head())
  }

  /// Plain merge commit (default strategy, must be conflict-free)
  pub fn merge(&self, branch: &str, message: &str) -> String {
    self.merge_with(branch, message, &[]).unwrap()
  }

  /// Merge preferring our side for conflicting hunks (`-X ours`)
  pub fn merge_ours_option(&self, branch: &str, message: &str) -> String {
    self.merge_with(branch, message, &["-X", "ours"]).unwrap()
  }

  /// Merge discarding the other side entirely (`-s ours`): an empty merge
  pub fn merge_ours_strategy(&self, branch: &str, message: &str) -> String {
    self.merge_with(branch, message, &["-s", "ours"]).unwrap()
  }

  /// Start a merge that is expected to conflict, leaving the conflict in place
  pub fn merge_expect_conflict(&self, branch: &str) {
    assert!(self.git(&["merge", "--no-ff", branch]).is_err(), "merge of {branch} did not conflict");
  }

  /// Resolve a conflicted merge by writing files wholesale, then commit
  pub fn resolve_merge(&self, message: &str, files: &[(&str, &str)]) -> String {
    for (filename, content) in files {
      self.write_file(filename, content);
      self.git_ok(&["add", filename]);
    }
    self.git_ok(&["commit", "-m", message]);
    self.head()
  }

  /// File content as recorded in a commit's tree
  pub fn show_file(&self, rev: &str, path: &str) -> String {
    self.git_ok(&["show", &format!("{rev}:{path}")])
  }

  /// Commit hashes of `rev`'s history, newest first
  pub fn rev_list(&self, rev: &str) -> Vec<String> {
    self.git_ok(&["rev-list", rev]).lines().map(|s| s.to_string()).collect()
  }

  /// Commit subjects of `rev`'s history, newest first
  pub fn subjects(&self, rev: &str) -> Vec<String> {
    self.git_ok(&["log", "--format=%s", rev]).lines().map(|s| s.to_string()).collect()
  }

  /// Number of commits reachable from `rev`
  pub fn commit_count(&self, rev: &str) -> usize {
    self.git_ok(&["rev-list", "--count", rev]).parse().unwrap()
  }

  /// True when no commit reachable from `rev` has more than one parent
  pub fn is_strictly_linear(&self, rev: &str) -> bool {
    self.git_ok(&["rev-list", "--min-parents=2", "--count", rev]) == "0"
  }

  /// Set config value
  pub fn set_config(&self, key: &str, value: &str) -> Result<(), String> {
    self.git(&["config", key, value]).map(|_| ())
  }
}
