use crate::model::CommitId;
use crate::repo::Repo;
use anyhow::Result;
use indexmap::IndexSet;
use tracing::{debug, instrument};

/// Drop every commit that is an ancestor of another commit in the set.
/// An ancestor contributes no content beyond its descendant, so the remaining
/// commits are a minimal covering set of base operands.
///
/// Input order is preserved for the survivors, which keeps base instructions
/// deterministic across runs.
#[instrument(skip(repo, commits), fields(candidates = commits.len()))]
pub fn reduce_bases(repo: &Repo<'_>, commits: &[CommitId]) -> Result<Vec<CommitId>> {
  let unique: IndexSet<&CommitId> = commits.iter().collect();
  let mut kept = Vec::new();

  'candidates: for candidate in &unique {
    for other in &unique {
      if candidate != other && repo.is_ancestor(candidate, other)? {
        debug!(dropped = %candidate.short(), kept_by = %other.short(), "base is an ancestor of another base");
        continue 'candidates;
      }
    }
    kept.push((*candidate).clone());
  }

  Ok(kept)
}

#[cfg(test)]
#[path = "reduce_test.rs"]
mod tests;
