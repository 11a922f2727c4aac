use crate::error::LinearizeError;
use crate::model::CommitId;
use crate::repo::Repo;
use anyhow::{Context, Result};
use tracing::{debug, error, instrument, warn};

/// Pre-run repository state captured by the guard
struct SavedState {
  branch: Option<String>,
  head: CommitId,
  /// Dangling stash commit holding uncommitted changes present at entry
  snapshot: Option<String>,
}

/// Isolates a run from user state. The guard snapshots branch, HEAD and any
/// uncommitted changes before the inner action and restores them afterwards,
/// on success and failure alike. It is the sole recovery authority: planner
/// and builder never try to repair state themselves.
pub struct Atomic<'a, 'r> {
  repo: &'a Repo<'r>,
}

impl<'a, 'r> Atomic<'a, 'r> {
  pub fn new(repo: &'a Repo<'r>) -> Self {
    Self { repo }
  }

  /// Run `inner` with the repository state guarded.
  ///
  /// A restoration failure is fatal and wins over the inner result: the
  /// repository may be in a non-canonical state the user has to inspect.
  #[instrument(skip(self, inner))]
  pub fn run<T>(&self, inner: impl FnOnce() -> Result<T, LinearizeError>) -> Result<T, LinearizeError> {
    let state = self.capture()?;
    let result = inner();

    match self.restore(&state) {
      Ok(()) => result,
      Err(restore_error) => {
        if let Err(inner_error) = &result {
          error!(error = %inner_error, "run failed and state restoration failed as well");
        }
        Err(LinearizeError::Restore(format!("{restore_error:#}")))
      }
    }
  }

  fn capture(&self) -> Result<SavedState> {
    let branch = self.repo.current_branch()?;
    let head = self.repo.head()?;

    let snapshot = if self.repo.is_dirty()? { self.repo.stash_create()? } else { None };
    if let Some(snapshot) = &snapshot {
      debug!(snapshot = %snapshot, "snapshotted uncommitted changes");
      self.repo.reset_hard("HEAD")?;
    }

    debug!(branch = ?branch, head = %head.short(), "captured repository state");
    Ok(SavedState { branch, head, snapshot })
  }

  fn restore(&self, state: &SavedState) -> Result<()> {
    // preserve whatever the run left uncommitted before cleaning up
    if self.repo.is_dirty()?
      && let Some(remnant) = self.repo.stash_create()?
    {
      self.repo.stash_store(&remnant, "git-linearize: remnant")?;
      warn!(stash = %remnant, "run left uncommitted changes behind; preserved as a stash entry");
    }
    self.repo.reset_hard("HEAD").context("could not clean working tree")?;

    match &state.branch {
      Some(branch) => {
        let tip = self.repo.rev_parse(branch).with_context(|| format!("branch '{branch}' disappeared"))?;
        if tip != state.head {
          warn!(branch = %branch, "branch tip drifted during run, moving it back");
          self.repo.force_branch(branch, &state.head)?;
        }
        self.repo.checkout(branch).with_context(|| format!("could not return to branch '{branch}'"))?;
      }
      None => {
        if self.repo.head()? != state.head {
          self.repo.checkout_detach(state.head.as_str()).context("could not return to starting commit")?;
        }
      }
    }

    if let Some(snapshot) = &state.snapshot
      && let Err(e) = self.repo.stash_apply(snapshot)
    {
      // keep the snapshot recoverable before giving up
      let _ = self.repo.stash_store(snapshot, "git-linearize: entry snapshot");
      return Err(e).context("could not re-apply the entry snapshot");
    }

    debug!("restored repository state");
    Ok(())
  }
}

#[cfg(test)]
#[path = "atomic_test.rs"]
mod tests;
