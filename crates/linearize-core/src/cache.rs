use anyhow::{Result, anyhow};
use dashmap::DashMap;
use git_executor::git_command_executor::GitCommandExecutor;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Per-run cache of commit → tree-id lookups. Tree comparisons drive merge
/// classification and every pop assertion, so the same commits are resolved
/// repeatedly during one run.
#[derive(Clone, Default)]
pub struct TreeIdCache {
  cache: Arc<DashMap<String, String>>,
}

impl TreeIdCache {
  pub fn new() -> Self {
    Self::default()
  }

  fn is_cacheable_key(commit_id: &str) -> bool {
    // Only cache stable object IDs (hex); symbolic refs like HEAD move during a run.
    !commit_id.is_empty() && commit_id.chars().all(|c| c.is_ascii_hexdigit())
  }

  /// Get the tree id for a commit, using the cache when possible
  #[instrument(skip(self, git_executor), fields(commit_id = %commit_id))]
  pub fn get_tree_id(&self, git_executor: &GitCommandExecutor, repo_path: &str, commit_id: &str) -> Result<String> {
    let cacheable = Self::is_cacheable_key(commit_id);
    if cacheable && let Some(tree_id) = self.cache.get(commit_id) {
      debug!("tree id cache hit");
      return Ok(tree_id.clone());
    }

    let spec = format!("{commit_id}^{{tree}}");
    let tree_id = git_executor
      .execute_command(&["rev-parse", &spec], repo_path)
      .map_err(|e| anyhow!("Failed to get tree ID for {commit_id}: {e}"))?;

    if cacheable {
      self.cache.insert(commit_id.to_string(), tree_id.clone());
    }

    Ok(tree_id)
  }
}
