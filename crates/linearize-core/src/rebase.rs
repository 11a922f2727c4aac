use crate::cherry_pick::compensated_cherry_pick;
use crate::error::LinearizeError;
use crate::model::{CommitId, LinearizeOptions, OURS_THEIRS_PREFIX};
use crate::repo::Repo;
use tracing::{debug, instrument};

/// Replay every commit of `(base, tip]` onto the current HEAD in order.
///
/// The fast path is a straight rebase keeping empty commits. When that stops
/// on a conflict, or when the range carries inner-linearization compensation
/// commits that must be dropped, each commit goes through the compensated
/// cherry-pick instead. Returns the new tip.
#[instrument(skip(repo, options), fields(base = %base.short(), tip = %tip.short()))]
pub fn compensated_rebase(repo: &Repo<'_>, options: &LinearizeOptions, base: &CommitId, tip: &CommitId) -> Result<CommitId, LinearizeError> {
  let onto = repo.head()?;
  let commits = repo.range_commits(base, tip)?;
  if commits.is_empty() {
    debug!("nothing to replay");
    return Ok(onto);
  }

  let must_drop_compensations = options.recursive && commits.iter().any(|c| c.subject.starts_with(OURS_THEIRS_PREFIX));

  if !must_drop_compensations {
    if repo.rebase_onto(&onto, base, tip)? {
      return Ok(repo.head()?);
    }
    repo.abort_rebase();
    repo.checkout_detach(onto.as_str())?;
    debug!(commits = commits.len(), "straight rebase conflicted, replaying commit by commit");
  }

  for commit in &commits {
    compensated_cherry_pick(repo, options, &commit.id)?;
  }
  Ok(repo.head()?)
}

#[cfg(test)]
#[path = "rebase_test.rs"]
mod tests;
