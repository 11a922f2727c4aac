use crate::engine;
use crate::error::LinearizeError;
use crate::model::{CommitId, FINAL_FIXUP_PREFIX, Instruction, LinearizeOptions, LinearizeOutcome, WalkPath};
use crate::rebase::compensated_rebase;
use crate::repo::Repo;
use crate::resolve::resolve_merge_conflict;
use anyhow::anyhow;
use tracing::{debug, info, instrument};

/// Consumes the reversed instruction stream against a scratch HEAD.
pub struct Builder<'a, 'r> {
  repo: &'a Repo<'r>,
  options: &'a LinearizeOptions,
  /// The input head; `End` restores tree identity with it
  head: CommitId,
  started: bool,
  base: Option<CommitId>,
}

impl<'a, 'r> Builder<'a, 'r> {
  pub fn new(repo: &'a Repo<'r>, options: &'a LinearizeOptions, head: CommitId) -> Self {
    Self {
      repo,
      options,
      head,
      started: false,
      base: None,
    }
  }

  #[instrument(skip_all, fields(instructions = instructions.len()))]
  pub fn run(&mut self, instructions: &[Instruction]) -> Result<LinearizeOutcome, LinearizeError> {
    let mut index = 0;
    while index < instructions.len() {
      match &instructions[index] {
        Instruction::Base { commits } => self.start(commits)?,
        Instruction::Compensate { base, tip } => {
          self.ensure_started("compensate")?;
          compensated_rebase(self.repo, self.options, base, tip)?;
        }
        Instruction::ResolveMergeConflict { merge } => {
          self.ensure_started("resolve-merge-conflict")?;
          resolve_merge_conflict(self.repo, self.options, merge)?;
        }
        Instruction::Push { merge, path } => {
          if self.options.recursive && path.is_right_entry() {
            index = self.fold_right_subgraph(instructions, index, merge, path)?;
            continue;
          }
          debug!(merge = %merge.short(), %path, "entering merge subgraph");
        }
        Instruction::Pop { merge, path } => {
          if path.is_pure_left() {
            let head = self.repo.head()?;
            self.assert_tree_identity(merge, &head)?;
          } else {
            // right subgraphs are folded onto the mainline; their trees
            // only match the merge under recursive linearization
            debug!(merge = %merge.short(), %path, "leaving right subgraph");
          }
        }
        Instruction::End => self.finish()?,
      }
      index += 1;
    }

    let base = self.base.clone().ok_or(LinearizeError::EmptyRange)?;
    let tip = self.repo.head()?;
    info!(base = %base.short(), tip = %tip.short(), "built linear chain");
    Ok(LinearizeOutcome { base, tip })
  }

  /// Initialize the scratch HEAD from the base operands. Later base
  /// instructions belong to nested subgraphs and are skipped.
  fn start(&mut self, commits: &[CommitId]) -> Result<(), LinearizeError> {
    if self.started {
      debug!("chain already started, skipping nested base");
      return Ok(());
    }
    let (first, rest) = commits
      .split_first()
      .ok_or_else(|| anyhow!("base instruction carries no commits"))?;
    info!(base = %first.short(), extra_bases = rest.len(), "starting chain");
    self.repo.checkout_detach(first.as_str())?;
    for other in rest {
      self.repo.merge_into_head(other)?;
    }
    self.base = Some(first.clone());
    self.started = true;
    Ok(())
  }

  /// Linearize a right subgraph in an inner atomic run, replay the resulting
  /// chain onto HEAD, and skip the bracketed inline instructions.
  /// Returns the index just past the matching pop.
  fn fold_right_subgraph(
    &mut self,
    instructions: &[Instruction],
    push_index: usize,
    merge: &CommitId,
    path: &WalkPath,
  ) -> Result<usize, LinearizeError> {
    self.ensure_started("push")?;

    // the subgraph's own base operands double as its revision bounds
    let limits = match instructions.get(push_index + 1) {
      Some(Instruction::Base { commits }) => commits.clone(),
      other => return Err(anyhow!("push of {merge} is not followed by a base instruction ({other:?})").into()),
    };

    info!(merge = %merge.short(), %path, "recursively linearizing right subgraph");
    let before_fold = self.repo.head()?;
    let inner = engine::linearize_range(self.repo, self.options, merge, &limits)?;
    compensated_rebase(self.repo, self.options, &inner.base, &inner.tip)?;

    let pop_index = find_matching_pop(instructions, push_index, merge, path)?;

    // The pop invariant is checked against the chain actually being built;
    // the inner tip's tree equals the merge's by construction and proves
    // nothing about the replay onto HEAD. The mainline may already carry
    // left-side content, so the expected tree is the three-way result of the
    // pre-fold HEAD and the merge (which is the merge's own tree whenever the
    // mainline still sits at the subgraph base).
    let head = self.repo.head()?;
    match self.repo.merge_tree(&before_fold, merge)? {
      Some(expected) => {
        let actual = self.repo.tree_of(head.as_str())?;
        if expected != actual {
          return Err(LinearizeError::PopInvariant {
            merge: merge.clone(),
            expected,
            actual,
          });
        }
        debug!(merge = %merge.short(), "fold reproduced the merge content");
      }
      None => {
        debug!(merge = %merge.short(), "fold conflicts with the mainline, tree check not decidable");
      }
    }
    Ok(pop_index + 1)
  }

  fn assert_tree_identity(&self, merge: &CommitId, actual_commit: &CommitId) -> Result<(), LinearizeError> {
    let expected = self.repo.tree_of(merge.as_str())?;
    let actual = self.repo.tree_of(actual_commit.as_str())?;
    if expected != actual {
      return Err(LinearizeError::PopInvariant {
        merge: merge.clone(),
        expected,
        actual,
      });
    }
    debug!(merge = %merge.short(), "tree identity holds");
    Ok(())
  }

  /// Emit the final compensation if HEAD's tree differs from the input head's
  fn finish(&mut self) -> Result<(), LinearizeError> {
    if !self.started {
      return Err(LinearizeError::EmptyRange);
    }
    let tip = self.repo.head()?;
    if self.repo.trees_equal(&tip, &self.head)? {
      return Ok(());
    }
    info!(head = %self.head.short(), "final tree differs from the input head, compensating");
    let patch = self.repo.diff_patch("HEAD", self.head.as_str())?;
    self.repo.apply_to_index(&patch).map_err(|e| LinearizeError::Apply {
      context: format!("final fixup for {}: {e:#}", self.head.short()),
    })?;
    self.repo.commit(&format!("{FINAL_FIXUP_PREFIX} {}", self.head), true, false)?;
    Ok(())
  }

  fn ensure_started(&self, operation: &str) -> Result<(), LinearizeError> {
    if self.started {
      Ok(())
    } else {
      Err(anyhow!("malformed plan: instruction '{operation}' before any base").into())
    }
  }
}

/// Index of the pop closing the bracket opened at `push_index`
fn find_matching_pop(
  instructions: &[Instruction],
  push_index: usize,
  merge: &CommitId,
  path: &WalkPath,
) -> Result<usize, LinearizeError> {
  let mut depth = 0usize;
  for (offset, instruction) in instructions[push_index + 1..].iter().enumerate() {
    match instruction {
      Instruction::Push { .. } => depth += 1,
      Instruction::Pop {
        merge: pop_merge,
        path: pop_path,
      } => {
        if depth == 0 {
          if pop_merge == merge && pop_path == path {
            return Ok(push_index + 1 + offset);
          }
          return Err(anyhow!("unbalanced instruction stream: pop of {pop_merge} closes push of {merge}").into());
        }
        depth -= 1;
      }
      _ => {}
    }
  }
  Err(anyhow!("no matching pop for push of {merge}").into())
}
