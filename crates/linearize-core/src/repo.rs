use crate::cache::TreeIdCache;
use crate::model::CommitId;
use anyhow::{Context, Result, anyhow};
use git_executor::git_command_executor::GitCommandExecutor;
use tracing::{debug, instrument};

/// One line of `rev-list --parents`: a commit and its parents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevEntry {
  pub id: CommitId,
  pub parents: Vec<CommitId>,
}

/// A commit inside a replay range, with the subject used for
/// compensation-drop detection
#[derive(Debug, Clone)]
pub struct RangeCommit {
  pub id: CommitId,
  pub subject: String,
}

/// Typed surface over the version-control operations the engine consumes.
/// All output parsing happens here; the rest of the engine never splits
/// command output by hand.
pub struct Repo<'a> {
  git: &'a GitCommandExecutor,
  path: &'a str,
  trees: TreeIdCache,
}

impl<'a> Repo<'a> {
  pub fn new(git: &'a GitCommandExecutor, path: &'a str) -> Self {
    Self {
      git,
      path,
      trees: TreeIdCache::new(),
    }
  }

  pub fn path(&self) -> &str {
    self.path
  }

  fn limit_specs(limits: &[CommitId]) -> Vec<String> {
    limits.iter().map(|l| format!("^{l}")).collect()
  }

  // ---- queries ----------------------------------------------------------

  /// Resolve a revision to a commit id, peeling tags
  pub fn rev_parse(&self, spec: &str) -> Result<CommitId> {
    let peeled = format!("{spec}^{{commit}}");
    let out = self
      .git
      .execute_command(&["rev-parse", "--verify", &peeled], self.path)
      .with_context(|| format!("cannot resolve revision '{spec}'"))?;
    Ok(CommitId::new(out))
  }

  pub fn head(&self) -> Result<CommitId> {
    self.rev_parse("HEAD")
  }

  /// Tree id of a revision (cached for stable object names)
  pub fn tree_of(&self, rev: &str) -> Result<String> {
    self.trees.get_tree_id(self.git, self.path, rev)
  }

  pub fn trees_equal(&self, a: &CommitId, b: &CommitId) -> Result<bool> {
    Ok(self.tree_of(a.as_str())? == self.tree_of(b.as_str())?)
  }

  pub fn parents(&self, commit: &CommitId) -> Result<Vec<CommitId>> {
    let lines = self
      .git
      .execute_command_lines(&["rev-list", "--parents", "--max-count=1", commit.as_str()], self.path)?;
    let first = lines.first().ok_or_else(|| anyhow!("no rev-list output for {commit}"))?;
    Ok(first.split_whitespace().skip(1).map(CommitId::new).collect())
  }

  /// `rev-list --parents head ^limit...`, newest first
  #[instrument(skip(self), fields(head = %head))]
  pub fn rev_list_with_parents(&self, head: &CommitId, limits: &[CommitId]) -> Result<Vec<RevEntry>> {
    let specs = Self::limit_specs(limits);
    let mut args = vec!["rev-list", "--topo-order", "--parents", head.as_str()];
    args.extend(specs.iter().map(String::as_str));
    let lines = self.git.execute_command_lines(&args, self.path)?;

    let entries = lines
      .iter()
      .map(|line| {
        let mut tokens = line.split_whitespace();
        let id = tokens.next().ok_or_else(|| anyhow!("empty rev-list line"))?;
        Ok(RevEntry {
          id: CommitId::new(id),
          parents: tokens.map(CommitId::new).collect(),
        })
      })
      .collect::<Result<Vec<_>>>()?;
    debug!(commits = entries.len(), "listed revisions");
    Ok(entries)
  }

  /// The newest merge commit within `head ^limit...`, if any
  pub fn most_recent_merge(&self, head: &CommitId, limits: &[CommitId]) -> Result<Option<CommitId>> {
    let specs = Self::limit_specs(limits);
    let mut args = vec!["rev-list", "--topo-order", "--merges", "--max-count=1", head.as_str()];
    args.extend(specs.iter().map(String::as_str));
    let out = self.git.execute_command(&args, self.path)?;
    Ok(if out.is_empty() { None } else { Some(CommitId::new(out)) })
  }

  /// Excluded parent commits bordering the range (the `-`-marked entries of
  /// `rev-list --boundary`)
  pub fn boundary_commits(&self, head: &CommitId, limits: &[CommitId]) -> Result<Vec<CommitId>> {
    let specs = Self::limit_specs(limits);
    let mut args = vec!["rev-list", "--boundary", head.as_str()];
    args.extend(specs.iter().map(String::as_str));
    let lines = self.git.execute_command_lines(&args, self.path)?;
    Ok(lines.iter().filter_map(|l| l.strip_prefix('-')).map(CommitId::new).collect())
  }

  /// Parentless commits within the range
  pub fn root_commits(&self, head: &CommitId, limits: &[CommitId]) -> Result<Vec<CommitId>> {
    let specs = Self::limit_specs(limits);
    let mut args = vec!["rev-list", "--max-parents=0", head.as_str()];
    args.extend(specs.iter().map(String::as_str));
    let lines = self.git.execute_command_lines(&args, self.path)?;
    Ok(lines.into_iter().map(CommitId::new).collect())
  }

  /// Commits of `(base, tip]`, oldest first
  pub fn range_commits(&self, base: &CommitId, tip: &CommitId) -> Result<Vec<RangeCommit>> {
    let range = format!("{base}..{tip}");
    let lines = self
      .git
      .execute_command_lines(&["log", "--reverse", "--format=%H%x1f%s", &range], self.path)?;
    lines
      .iter()
      .map(|line| {
        let (id, subject) = line.split_once('\x1f').ok_or_else(|| anyhow!("malformed log line: {line}"))?;
        Ok(RangeCommit {
          id: CommitId::new(id.trim()),
          subject: subject.to_string(),
        })
      })
      .collect()
  }

  pub fn subject(&self, commit: &CommitId) -> Result<String> {
    self.git.execute_command(&["log", "--max-count=1", "--format=%s", commit.as_str()], self.path)
  }

  pub fn message(&self, commit: &CommitId) -> Result<String> {
    self
      .git
      .execute_command_raw(&["log", "--max-count=1", "--format=%B", commit.as_str()], self.path)
      .map(|m| m.trim_end().to_string())
  }

  pub fn is_ancestor(&self, ancestor: &CommitId, descendant: &CommitId) -> Result<bool> {
    let (_, code) = self
      .git
      .execute_command_with_status(&["merge-base", "--is-ancestor", ancestor.as_str(), descendant.as_str()], self.path)?;
    match code {
      0 => Ok(true),
      1 => Ok(false),
      other => Err(anyhow!("merge-base --is-ancestor {ancestor} {descendant} failed with code {other}")),
    }
  }

  /// In-memory three-way merge of `right` onto `left`.
  /// Returns the merged tree id, or None when the merge conflicts.
  #[instrument(skip(self), fields(left = %left.short(), right = %right.short()))]
  pub fn merge_tree(&self, left: &CommitId, right: &CommitId) -> Result<Option<String>> {
    let (out, code) = self
      .git
      .execute_command_with_status(&["merge-tree", "--write-tree", left.as_str(), right.as_str()], self.path)?;
    let tree = out.lines().next().unwrap_or_default().trim().to_string();
    match code {
      0 => Ok(Some(tree)),
      1 => {
        debug!("merge-tree reported conflicts");
        Ok(None)
      }
      other => Err(anyhow!("merge-tree {left} {right} failed with code {other}")),
    }
  }

  // ---- working tree mutations -------------------------------------------

  pub fn checkout_detach(&self, rev: &str) -> Result<()> {
    self.git.execute_command(&["checkout", "--detach", rev], self.path)?;
    Ok(())
  }

  pub fn checkout(&self, reference: &str) -> Result<()> {
    self.git.execute_command(&["checkout", reference], self.path)?;
    Ok(())
  }

  pub fn reset_hard(&self, rev: &str) -> Result<()> {
    self.git.execute_command(&["reset", "--hard", rev], self.path)?;
    Ok(())
  }

  pub fn reset_soft(&self, rev: &str) -> Result<()> {
    self.git.execute_command(&["reset", "--soft", rev], self.path)?;
    Ok(())
  }

  /// Merge a revision into HEAD with the default strategy.
  /// Used only for multi-root bases, so unrelated histories are allowed.
  pub fn merge_into_head(&self, rev: &CommitId) -> Result<()> {
    let result = self
      .git
      .execute_command(&["merge", "--no-edit", "--allow-unrelated-histories", rev.as_str()], self.path);
    if result.is_err() {
      self.abort_merge();
    }
    result.map(|_| ())
  }

  /// `merge --squash -X ours`: stage the ours-favoring merge result without
  /// creating a merge commit. Returns false when conflicts remain.
  pub fn merge_squash_ours(&self, rev: &CommitId) -> Result<bool> {
    let (_, code) = self
      .git
      .execute_command_with_status(&["merge", "--squash", "--strategy-option=ours", rev.as_str()], self.path)?;
    Ok(code == 0)
  }

  pub fn abort_merge(&self) {
    let _ = self.git.execute_command_with_status(&["merge", "--abort"], self.path);
  }

  /// Cherry-pick a commit, keeping empty and redundant commits.
  /// Returns false on conflict; the caller decides the fallback strategy.
  #[instrument(skip(self), fields(commit = %commit.short(), strategy = ?strategy_option))]
  pub fn cherry_pick(&self, commit: &CommitId, strategy_option: Option<&str>) -> Result<bool> {
    let strategy_arg = strategy_option.map(|strategy| format!("--strategy-option={strategy}"));
    let mut args = vec!["cherry-pick", "--allow-empty", "--keep-redundant-commits"];
    if let Some(strategy_arg) = &strategy_arg {
      args.push(strategy_arg);
    }
    args.push(commit.as_str());
    let (_, code) = self.git.execute_command_with_status(&args, self.path)?;
    match code {
      0 => Ok(true),
      1 => Ok(false),
      other => Err(anyhow!("cherry-pick {commit} failed with code {other}")),
    }
  }

  pub fn abort_cherry_pick(&self) {
    let _ = self.git.execute_command_with_status(&["cherry-pick", "--abort"], self.path);
  }

  /// `rebase --onto onto base tip`, keeping commits that become empty.
  /// Returns false when the rebase stops on a conflict.
  #[instrument(skip(self), fields(onto = %onto.short(), base = %base.short(), tip = %tip.short()))]
  pub fn rebase_onto(&self, onto: &CommitId, base: &CommitId, tip: &CommitId) -> Result<bool> {
    let (_, code) = self.git.execute_command_with_status(
      &["rebase", "--empty=keep", "--onto", onto.as_str(), base.as_str(), tip.as_str()],
      self.path,
    )?;
    Ok(code == 0)
  }

  pub fn abort_rebase(&self) {
    let _ = self.git.execute_command_with_status(&["rebase", "--abort"], self.path);
  }

  /// Patch turning the tree of `a` into the tree of `b`
  pub fn diff_patch(&self, a: &str, b: &str) -> Result<String> {
    self.git.execute_command_raw(&["diff", "--full-index", "--binary", a, b], self.path)
  }

  /// Apply a patch to both index and working tree. Empty patches are a no-op.
  pub fn apply_to_index(&self, patch: &str) -> Result<()> {
    if patch.trim().is_empty() {
      return Ok(());
    }
    self
      .git
      .execute_command_with_input(&["apply", "--index", "--whitespace=nowarn"], self.path, patch)?;
    Ok(())
  }

  /// Commit the staged state. `amend` replaces the current HEAD commit
  /// instead of growing the chain; hooks are always bypassed.
  pub fn commit(&self, message: &str, allow_empty: bool, amend: bool) -> Result<CommitId> {
    let mut args = vec!["commit", "--no-verify", "-m", message];
    if allow_empty {
      args.push("--allow-empty");
    }
    if amend {
      args.push("--amend");
    }
    self.git.execute_command(&args, self.path)?;
    self.head()
  }

  // ---- branch and stash state -------------------------------------------

  /// Current branch name, or None when HEAD is detached
  pub fn current_branch(&self) -> Result<Option<String>> {
    let out = self.git.execute_command(&["branch", "--show-current"], self.path)?;
    Ok(if out.is_empty() { None } else { Some(out) })
  }

  pub fn force_branch(&self, name: &str, target: &CommitId) -> Result<()> {
    self.git.execute_command(&["branch", "-f", name, target.as_str()], self.path)?;
    Ok(())
  }

  pub fn is_dirty(&self) -> Result<bool> {
    let out = self.git.execute_command(&["status", "--porcelain"], self.path)?;
    Ok(!out.is_empty())
  }

  /// Snapshot index and working tree as a dangling stash commit.
  /// Returns None when there is nothing to snapshot.
  pub fn stash_create(&self) -> Result<Option<String>> {
    let out = self.git.execute_command(&["stash", "create"], self.path)?;
    Ok(if out.is_empty() { None } else { Some(out) })
  }

  pub fn stash_apply(&self, stash_commit: &str) -> Result<()> {
    self.git.execute_command(&["stash", "apply", stash_commit], self.path)?;
    Ok(())
  }

  /// Register a stash commit in the stash list so the user can recover it
  pub fn stash_store(&self, stash_commit: &str, message: &str) -> Result<()> {
    self.git.execute_command(&["stash", "store", "-m", message, stash_commit], self.path)?;
    Ok(())
  }
}
