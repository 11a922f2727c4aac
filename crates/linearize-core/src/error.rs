use crate::model::CommitId;
use thiserror::Error;

/// Fatal conditions of a linearization run. There is no local recovery:
/// every variant aborts the run and unwinds through the atomic guard.
#[derive(Debug, Error)]
pub enum LinearizeError {
  #[error("unsupported topology: commit {commit} has {parents} parents (octopus merges cannot be linearized)")]
  UnsupportedTopology { commit: CommitId, parents: usize },

  #[error("cherry-pick of {0} failed with every strategy")]
  CherryPick(CommitId),

  #[error("could not replay merge {0} with the ours-favoring strategy")]
  MergeReplay(CommitId),

  #[error("compensation patch did not apply cleanly: {context}")]
  Apply { context: String },

  #[error("tree mismatch after merge {merge}: expected {expected}, got {actual}")]
  PopInvariant { merge: CommitId, expected: String, actual: String },

  #[error("failed to restore repository state: {0}\nInspect `git stash list` for snapshot entries created by git-linearize")]
  Restore(String),

  #[error("no commits in range, nothing to linearize")]
  EmptyRange,

  #[error(transparent)]
  Other(#[from] anyhow::Error),
}
