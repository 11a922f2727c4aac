use crate::error::LinearizeError;
use crate::model::{CommitId, Instruction, WalkPath};
use crate::reduce::reduce_bases;
use crate::repo::{Repo, RevEntry};
use anyhow::anyhow;
use tracing::{debug, instrument, warn};

/// Recursion guard; merge nesting in real repositories is nowhere near this
const MAX_WALK_DEPTH: usize = 512;

/// Classification of a merge commit during planning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergeClass {
  /// The left parent's tree equals the merge tree: the right branch
  /// contributes nothing
  Empty,
  /// A default three-way merge reproduces the recorded tree
  Reproducible,
  /// The default strategy conflicts or yields a different tree
  Broken,
}

/// Walks the input DAG from tip to base and emits the instruction stream
/// describing how to rebuild it linearly.
pub struct Planner<'a, 'r> {
  repo: &'a Repo<'r>,
}

impl<'a, 'r> Planner<'a, 'r> {
  pub fn new(repo: &'a Repo<'r>) -> Self {
    Self { repo }
  }

  /// Plan the linearization of `head` bounded by `limits`.
  /// Returns the stream in build order (`Base` first, `End` last).
  #[instrument(skip(self, limits), fields(head = %head.short(), limits = limits.len()))]
  pub fn plan(&self, head: &CommitId, limits: &[CommitId]) -> Result<Vec<Instruction>, LinearizeError> {
    // emission happens in reverse chronological intent; End comes first
    let mut instructions = vec![Instruction::End];
    self.walk(head, limits, WalkPath::root(), 0, &mut instructions)?;
    instructions.reverse();
    debug!(instructions = instructions.len(), "planned instruction stream");
    Ok(instructions)
  }

  fn walk(
    &self,
    head: &CommitId,
    limits: &[CommitId],
    path: WalkPath,
    depth: usize,
    out: &mut Vec<Instruction>,
  ) -> Result<(), LinearizeError> {
    if depth > MAX_WALK_DEPTH {
      return Err(anyhow!("merge nesting exceeds {MAX_WALK_DEPTH} levels").into());
    }

    let entries = self.repo.rev_list_with_parents(head, limits)?;
    let Some(newest) = entries.first() else {
      debug!(%path, "range is empty");
      return Ok(());
    };

    match newest.parents.len() {
      0 => {
        // the tip is a root commit; its content is covered by the base checkout
        debug!(root = %newest.id.short(), %path, "range tip is a root commit");
        out.push(Instruction::Base {
          commits: vec![newest.id.clone()],
        });
      }
      1 => match self.repo.most_recent_merge(head, limits)? {
        Some(merge) => {
          // linear prefix above the newest merge, then the merge subgraph
          out.push(Instruction::Compensate {
            base: merge.clone(),
            tip: head.clone(),
          });
          self.walk(&merge, limits, path, depth + 1, out)?;
        }
        None => {
          let base = self.chain_base(head, limits, &entries)?;
          out.push(Instruction::Compensate {
            base: base.clone(),
            tip: head.clone(),
          });
          out.push(Instruction::Base { commits: vec![base] });
        }
      },
      2 => self.visit_merge(newest, limits, path, depth, out)?,
      parents => {
        return Err(LinearizeError::UnsupportedTopology {
          commit: newest.id.clone(),
          parents,
        });
      }
    }
    Ok(())
  }

  /// State machine of a merge visit:
  /// classify, recurse right (unless skipped), recurse left, emit bases,
  /// bracket the subgraph with push/pop.
  fn visit_merge(
    &self,
    merge_entry: &RevEntry,
    limits: &[CommitId],
    path: WalkPath,
    depth: usize,
    out: &mut Vec<Instruction>,
  ) -> Result<(), LinearizeError> {
    let merge = &merge_entry.id;
    let left = &merge_entry.parents[0];
    let right = &merge_entry.parents[1];

    out.push(Instruction::Pop {
      merge: merge.clone(),
      path: path.clone(),
    });

    match self.classify_merge(merge, left, right)? {
      MergeClass::Empty => {
        warn!(merge = %merge.short(), "empty merge, right branch contributes nothing");
      }
      MergeClass::Broken => {
        debug!(merge = %merge.short(), "merge is not reproducible by the standard strategy");
        out.push(Instruction::ResolveMergeConflict { merge: merge.clone() });
      }
      MergeClass::Reproducible => {
        let mut right_limits = limits.to_vec();
        right_limits.push(left.clone());
        self.walk(right, &right_limits, path.descend_right(), depth + 1, out)?;
      }
    }

    self.walk(left, limits, path.descend_left(), depth + 1, out)?;

    let bases = self.base_operands(merge, limits)?;
    out.push(Instruction::Base { commits: bases });
    out.push(Instruction::Push {
      merge: merge.clone(),
      path,
    });
    Ok(())
  }

  fn classify_merge(&self, merge: &CommitId, left: &CommitId, right: &CommitId) -> Result<MergeClass, LinearizeError> {
    if self.repo.trees_equal(left, merge)? {
      return Ok(MergeClass::Empty);
    }
    match self.repo.merge_tree(left, right)? {
      Some(tree) if tree == self.repo.tree_of(merge.as_str())? => Ok(MergeClass::Reproducible),
      Some(_) => {
        debug!(merge = %merge.short(), "standard merge succeeds but yields a different tree");
        Ok(MergeClass::Broken)
      }
      None => Ok(MergeClass::Broken),
    }
  }

  /// Base of a merge-free chain: the single boundary commit when the walk is
  /// bounded, the chain's root commit otherwise
  fn chain_base(&self, head: &CommitId, limits: &[CommitId], entries: &[RevEntry]) -> Result<CommitId, LinearizeError> {
    let boundary = self.repo.boundary_commits(head, limits)?;
    if boundary.is_empty() {
      let root = entries.last().ok_or_else(|| anyhow!("chain {head} has no entries"))?;
      return Ok(root.id.clone());
    }
    let reduced = reduce_bases(self.repo, &boundary)?;
    reduced
      .into_iter()
      .next()
      .ok_or_else(|| anyhow!("boundary reduction of chain {head} came back empty").into())
  }

  /// Base operands of a merge subgraph: boundary commits plus in-range roots,
  /// reduced to a minimal covering set
  fn base_operands(&self, head: &CommitId, limits: &[CommitId]) -> Result<Vec<CommitId>, LinearizeError> {
    let mut candidates = self.repo.boundary_commits(head, limits)?;
    candidates.extend(self.repo.root_commits(head, limits)?);
    let bases = reduce_bases(self.repo, &candidates)?;
    if bases.is_empty() {
      return Err(anyhow!("no base commits found for subgraph of {head}").into());
    }
    Ok(bases)
  }
}

#[cfg(test)]
#[path = "plan_test.rs"]
mod tests;
