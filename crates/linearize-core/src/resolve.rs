use crate::error::LinearizeError;
use crate::model::{CommitId, ConflictMode, LinearizeOptions, RESOLVE_PREFIX};
use crate::rebase::compensated_rebase;
use crate::repo::Repo;
use anyhow::anyhow;
use tracing::{debug, instrument};

/// Reproduce a merge whose recorded tree the standard strategy cannot reach
/// (a conflict resolved by hand, or an ours-style resolution discarding one
/// side).
///
/// The right side is folded in as an ours-favoring squash commit, then a
/// compensation commit patches the result onto the recorded merge tree. Both
/// are replayed onto the current HEAD; in merge mode they collapse into a
/// single commit carrying the original merge message.
#[instrument(skip(repo, options), fields(merge = %merge.short()))]
pub fn resolve_merge_conflict(repo: &Repo<'_>, options: &LinearizeOptions, merge: &CommitId) -> Result<(), LinearizeError> {
  let saved = repo.head()?;
  let parents = repo.parents(merge)?;
  let [left, right] = parents.as_slice() else {
    return Err(anyhow!("resolve-merge-conflict on {merge} with {} parents", parents.len()).into());
  };
  let message = repo.message(merge)?;

  repo.checkout_detach(left.as_str())?;
  let merged = repo.merge_squash_ours(right);
  match merged {
    Ok(true) => {}
    Ok(false) => {
      repo.reset_hard(left.as_str())?;
      repo.checkout_detach(saved.as_str())?;
      return Err(LinearizeError::MergeReplay(merge.clone()));
    }
    Err(e) => {
      repo.reset_hard(left.as_str())?;
      repo.checkout_detach(saved.as_str())?;
      return Err(e.into());
    }
  }
  let ours = repo.commit(&message, true, false)?;
  debug!(ours = %ours.short(), "created ours-favoring squash commit");

  let patch = repo.diff_patch(ours.as_str(), merge.as_str())?;
  repo.apply_to_index(&patch).map_err(|e| LinearizeError::Apply {
    context: format!("resolution compensation for merge {}: {e:#}", merge.short()),
  })?;
  let tip = repo.commit(&format!("{RESOLVE_PREFIX} {merge}"), true, false)?;

  // replay the two-commit sequence on top of the line being built
  repo.checkout_detach(saved.as_str())?;
  compensated_rebase(repo, options, left, &tip)?;

  if options.conflict_mode == ConflictMode::Merge {
    // fold resolution and compensation into one commit with the merge's message
    repo.reset_soft(saved.as_str())?;
    repo.commit(&message, true, false)?;
  }

  Ok(())
}

#[cfg(test)]
#[path = "resolve_test.rs"]
mod tests;
