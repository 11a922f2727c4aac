use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Message prefix of a commit restoring the ours-result after a split
/// conflicted cherry-pick. Recursive runs recognize and drop such commits.
pub const OURS_THEIRS_PREFIX: &str = "COMPENSATION: ours-theirs:";

/// Message prefix of a commit reproducing a manually resolved merge.
pub const RESOLVE_PREFIX: &str = "COMPENSATION: resolve-merge-conflict:";

/// Message prefix of the final commit restoring tree identity with the input head.
pub const FINAL_FIXUP_PREFIX: &str = "COMPENSATION: final-fixup:";

/// Opaque commit object name. Instruction payloads carry these instead of
/// bare strings so commit/tree/ref arguments cannot be swapped silently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(String);

impl CommitId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Abbreviated form for log lines and commit messages
  pub fn short(&self) -> &str {
    &self.0[..self.0.len().min(12)]
  }
}

impl fmt::Display for CommitId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Position of a planned merge inside the traversal, encoded as the sequence
/// of first-parent (`L`) and second-parent (`R`) descents from the input head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalkPath(String);

impl WalkPath {
  pub fn root() -> Self {
    Self(String::new())
  }

  #[must_use]
  pub fn descend_left(&self) -> Self {
    Self(format!("{}L", self.0))
  }

  #[must_use]
  pub fn descend_right(&self) -> Self {
    Self(format!("{}R", self.0))
  }

  /// A path that never descended through a second parent. Pop instructions on
  /// such paths assert exact tree identity with the merge.
  pub fn is_pure_left(&self) -> bool {
    !self.0.contains('R')
  }

  /// The topmost merge of a right subgraph. Push instructions on such paths
  /// trigger recursive linearization.
  pub fn is_right_entry(&self) -> bool {
    self.0.ends_with('R')
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for WalkPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.0.is_empty() { f.write_str("·") } else { f.write_str(&self.0) }
  }
}

/// One step of the reconstruction. The planner emits these in reverse
/// chronological order; the engine reverses the buffer before building, so
/// `Base` is the first instruction the builder sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Instruction {
  /// Starting commit(s) of the chain; extra bases are merged onto the first
  Base { commits: Vec<CommitId> },
  /// Replay `(base, tip]` onto the current HEAD with compensation
  Compensate { base: CommitId, tip: CommitId },
  /// Reproduce a merge whose recorded resolution the standard strategy cannot
  ResolveMergeConflict { merge: CommitId },
  /// Entering the subgraph of `merge`
  Push { merge: CommitId, path: WalkPath },
  /// Leaving the subgraph of `merge`; tree identity is asserted
  Pop { merge: CommitId, path: WalkPath },
  /// Finalize; emit a final fixup if HEAD's tree differs from the input head's
  End,
}

/// How a conflicted cherry-pick materializes in the output chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictMode {
  /// A single ours-strategy commit
  Merge,
  /// A theirs-strategy commit followed by a compensation restoring the ours result
  Split,
}

impl Default for ConflictMode {
  fn default() -> Self {
    ConflictMode::Merge
  }
}

impl FromStr for ConflictMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "merge" => Ok(ConflictMode::Merge),
      "split" => Ok(ConflictMode::Split),
      other => Err(format!("unknown conflict mode '{other}' (expected 'merge' or 'split')")),
    }
  }
}

/// Immutable engine configuration, built once by the caller and passed by
/// reference through every component.
#[derive(Debug, Clone, Copy)]
pub struct LinearizeOptions {
  pub conflict_mode: ConflictMode,
  /// Recursively linearize right subgraphs before folding them in
  pub recursive: bool,
}

impl Default for LinearizeOptions {
  fn default() -> Self {
    Self {
      conflict_mode: ConflictMode::Merge,
      recursive: true,
    }
  }
}

/// Result of a successful run: the base the chain grew from and its tip.
/// The tip's tree equals the input head's tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearizeOutcome {
  pub base: CommitId,
  pub tip: CommitId,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_commit_id_short() {
    let id = CommitId::new("0123456789abcdef0123456789abcdef01234567");
    assert_eq!(id.short(), "0123456789ab");
    assert_eq!(CommitId::new("abc").short(), "abc");
  }

  #[test]
  fn test_walk_path_predicates() {
    let root = WalkPath::root();
    assert!(root.is_pure_left());
    assert!(!root.is_right_entry());

    let left = root.descend_left().descend_left();
    assert!(left.is_pure_left());
    assert_eq!(left.as_str(), "LL");

    let right = left.descend_right();
    assert!(!right.is_pure_left());
    assert!(right.is_right_entry());

    let below_right = right.descend_left();
    assert!(!below_right.is_pure_left());
    assert!(!below_right.is_right_entry());
  }

  #[test]
  fn test_conflict_mode_parsing() {
    assert_eq!("merge".parse::<ConflictMode>().unwrap(), ConflictMode::Merge);
    assert_eq!("SPLIT".parse::<ConflictMode>().unwrap(), ConflictMode::Split);
    assert!("fold".parse::<ConflictMode>().is_err());
  }
}
