use crate::git_test_utils::TestRepo;

/// The branch-and-merge graph shared by the end-to-end tests.
///
/// ```text
/// initial --- set l3=B --- (merge c-side, ours) --- (merge d-side) = e_merge
///     \                   /                        /
///      set l3=C - set l5=C                 set l3=D
/// ```
///
/// `b_merge` is an ours-preferred conflicted merge: its recorded tree keeps
/// `l3=B` while taking the non-conflicting `l5=C` from the side branch.
/// `e_merge` is a clean merge of a branch that only touches `l3`.
pub struct GraphFixture {
  pub initial: String,
  pub b_commit: String,
  pub c_tip: String,
  pub b_merge: String,
  pub d_tip: String,
  pub e_merge: String,
}

impl GraphFixture {
  pub fn build(repo: &TestRepo) -> Self {
    let initial = repo.create_commit_with_files(
      "initial",
      &[("l1", "A\n"), ("l2", "A\n"), ("l3", "A\n"), ("l4", "A\n"), ("l5", "A\n")],
    );

    repo.create_branch("c-side").unwrap();
    repo.checkout("c-side").unwrap();
    repo.create_commit("set l3=C", "l3", "C\n");
    let c_tip = repo.create_commit("set l5=C", "l5", "C\n");

    repo.checkout("master").unwrap();
    let b_commit = repo.create_commit("set l3=B", "l3", "B\n");
    let b_merge = repo.merge_ours_option("c-side", "merge c-side (ours)");

    repo.create_branch("d-side").unwrap();
    repo.checkout("d-side").unwrap();
    let d_tip = repo.create_commit("set l3=D", "l3", "D\n");

    repo.checkout("master").unwrap();
    let e_merge = repo.merge("d-side", "merge d-side");

    Self {
      initial,
      b_commit,
      c_tip,
      b_merge,
      d_tip,
      e_merge,
    }
  }
}
