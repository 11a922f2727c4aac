use crate::atomic::Atomic;
use crate::build::Builder;
use crate::error::LinearizeError;
use crate::model::{CommitId, Instruction, LinearizeOptions, LinearizeOutcome};
use crate::plan::Planner;
use crate::repo::Repo;
use git_executor::git_command_executor::GitCommandExecutor;
use tracing::{info, instrument};

/// Linearize `head_ref` bounded by `limit_refs` into a single-parent chain
/// whose tip has the same tree as `head_ref`.
///
/// The repository's branch, HEAD and working tree are restored afterwards,
/// on success and failure alike; the resulting chain is returned as a pair
/// of detached commits.
#[instrument(skip(git), fields(repo_path = repo_path, head = head_ref))]
pub fn linearize(
  git: &GitCommandExecutor,
  repo_path: &str,
  options: &LinearizeOptions,
  head_ref: &str,
  limit_refs: &[String],
) -> Result<LinearizeOutcome, LinearizeError> {
  let repo = Repo::new(git, repo_path);
  let head = repo.rev_parse(head_ref)?;
  let limits = resolve_limits(&repo, limit_refs)?;
  info!(head = %head.short(), limits = limits.len(), recursive = options.recursive, "linearizing");
  linearize_range(&repo, options, &head, &limits)
}

/// Plan without building: the reversed instruction stream for `head_ref`.
/// Used by the `plan` testing entry point.
pub fn plan(git: &GitCommandExecutor, repo_path: &str, head_ref: &str, limit_refs: &[String]) -> Result<Vec<Instruction>, LinearizeError> {
  let repo = Repo::new(git, repo_path);
  let head = repo.rev_parse(head_ref)?;
  let limits = resolve_limits(&repo, limit_refs)?;
  Planner::new(&repo).plan(&head, &limits)
}

/// One atomically guarded plan-and-build pass over resolved commits.
/// Recursive right-subgraph linearization re-enters here from the builder.
pub(crate) fn linearize_range(
  repo: &Repo<'_>,
  options: &LinearizeOptions,
  head: &CommitId,
  limits: &[CommitId],
) -> Result<LinearizeOutcome, LinearizeError> {
  Atomic::new(repo).run(|| {
    let instructions = Planner::new(repo).plan(head, limits)?;
    Builder::new(repo, options, head.clone()).run(&instructions)
  })
}

fn resolve_limits(repo: &Repo<'_>, limit_refs: &[String]) -> Result<Vec<CommitId>, LinearizeError> {
  limit_refs
    .iter()
    .map(|r| repo.rev_parse(r).map_err(LinearizeError::Other))
    .collect()
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
