use crate::error::LinearizeError;
use crate::model::{CommitId, ConflictMode, LinearizeOptions, OURS_THEIRS_PREFIX};
use crate::repo::Repo;
use tracing::{debug, instrument};

/// Replay a single commit onto the current HEAD, preserving empty and
/// redundant commits.
///
/// A conflicted replay is retried with the ours-favoring strategy. In split
/// mode the ours result is then decomposed into a theirs-strategy commit
/// followed by a compensation commit that restores the ours tree, so the
/// discarded side stays visible in the history.
#[instrument(skip(repo, options), fields(commit = %commit.short()))]
pub fn compensated_cherry_pick(repo: &Repo<'_>, options: &LinearizeOptions, commit: &CommitId) -> Result<(), LinearizeError> {
  if options.recursive {
    let subject = repo.subject(commit)?;
    if subject.starts_with(OURS_THEIRS_PREFIX) {
      debug!("dropping compensation commit from an inner linearization");
      return Ok(());
    }
  }

  let saved = repo.head()?;

  if repo.cherry_pick(commit, None)? {
    return Ok(());
  }
  repo.abort_cherry_pick();
  repo.reset_hard(saved.as_str())?;
  debug!("plain replay conflicted, retrying with the ours strategy");

  if !repo.cherry_pick(commit, Some("ours"))? {
    repo.abort_cherry_pick();
    repo.reset_hard(saved.as_str())?;
    return Err(LinearizeError::CherryPick(commit.clone()));
  }

  if options.conflict_mode == ConflictMode::Split {
    let ours = repo.head()?;
    repo.reset_hard(saved.as_str())?;

    if !repo.cherry_pick(commit, Some("theirs"))? {
      repo.abort_cherry_pick();
      repo.reset_hard(saved.as_str())?;
      return Err(LinearizeError::CherryPick(commit.clone()));
    }

    let patch = repo.diff_patch("HEAD", ours.as_str())?;
    repo.apply_to_index(&patch).map_err(|e| LinearizeError::Apply {
      context: format!("ours-theirs compensation for {}: {e:#}", commit.short()),
    })?;
    repo.commit(&format!("{OURS_THEIRS_PREFIX} {commit}"), true, false)?;
  }

  Ok(())
}

#[cfg(test)]
#[path = "cherry_pick_test.rs"]
mod tests;
