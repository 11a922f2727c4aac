use crate::model::{CommitId, ConflictMode, LinearizeOptions, OURS_THEIRS_PREFIX};
use crate::rebase::compensated_rebase;
use crate::repo::Repo;
use git_executor::git_command_executor::GitCommandExecutor;
use pretty_assertions::assert_eq;
use test_log::test;
use test_utils::git_test_utils::TestRepo;

fn options() -> LinearizeOptions {
  LinearizeOptions {
    conflict_mode: ConflictMode::Merge,
    recursive: true,
  }
}

#[test]
fn test_straight_rebase_of_disjoint_range() {
  let test_repo = TestRepo::new();
  let git = GitCommandExecutor::new();
  let initial = test_repo.create_commit("initial", "a.txt", "a");
  test_repo.create_branch_at("side", &initial).unwrap();
  test_repo.checkout("side").unwrap();
  test_repo.create_commit("s1", "s1.txt", "s1");
  let side_tip = test_repo.create_commit("s2", "s2.txt", "s2");
  test_repo.checkout("master").unwrap();
  test_repo.create_commit("m1", "m1.txt", "m1");

  let repo = Repo::new(&git, test_repo.path_str());
  let tip = compensated_rebase(&repo, &options(), &CommitId::new(initial), &CommitId::new(side_tip)).unwrap();

  assert_eq!(tip, repo.head().unwrap());
  assert_eq!(test_repo.commit_count("HEAD"), 4);
  let subjects = test_repo.subjects("HEAD");
  assert_eq!(subjects, vec!["s2", "s1", "m1", "initial"]);
  assert_eq!(test_repo.show_file("HEAD", "m1.txt"), "m1");
  assert_eq!(test_repo.show_file("HEAD", "s2.txt"), "s2");
}

#[test]
fn test_conflicting_range_falls_back_to_compensated_picks() {
  let test_repo = TestRepo::new();
  let git = GitCommandExecutor::new();
  let initial = test_repo.create_commit_with_files("initial", &[("f", "A\n"), ("g", "A\n")]);
  test_repo.create_branch_at("side", &initial).unwrap();
  test_repo.checkout("side").unwrap();
  test_repo.create_commit("set f=C", "f", "C\n");
  let side_tip = test_repo.create_commit("set g=C", "g", "C\n");
  test_repo.checkout("master").unwrap();
  test_repo.create_commit("set f=B", "f", "B\n");

  let repo = Repo::new(&git, test_repo.path_str());
  compensated_rebase(&repo, &options(), &CommitId::new(initial), &CommitId::new(side_tip)).unwrap();

  // the conflicting commit resolves to ours, the clean one lands as-is
  assert_eq!(test_repo.commit_count("HEAD"), 4);
  assert_eq!(test_repo.show_file("HEAD", "f"), "B");
  assert_eq!(test_repo.show_file("HEAD", "g"), "C");
}

#[test]
fn test_empty_range_is_a_no_op() {
  let test_repo = TestRepo::new();
  let git = GitCommandExecutor::new();
  test_repo.create_commit("initial", "a.txt", "a");
  let head = test_repo.head();

  let repo = Repo::new(&git, test_repo.path_str());
  let tip = compensated_rebase(&repo, &options(), &CommitId::new(head.clone()), &CommitId::new(head.clone())).unwrap();

  assert_eq!(tip.as_str(), head);
  assert_eq!(test_repo.head(), head);
}

#[test]
fn test_range_with_inner_compensation_drops_it() {
  let test_repo = TestRepo::new();
  let git = GitCommandExecutor::new();
  let initial = test_repo.create_commit("initial", "a.txt", "a");
  test_repo.create_branch_at("side", &initial).unwrap();
  test_repo.checkout("side").unwrap();
  test_repo.create_commit("s1", "s1.txt", "s1");
  let side_tip = test_repo.create_commit(&format!("{OURS_THEIRS_PREFIX} 0123abc"), "junk.txt", "junk");
  test_repo.checkout("master").unwrap();

  let repo = Repo::new(&git, test_repo.path_str());
  compensated_rebase(&repo, &options(), &CommitId::new(initial), &CommitId::new(side_tip)).unwrap();

  // s1 lands, the compensation commit does not
  assert_eq!(test_repo.commit_count("HEAD"), 2);
  assert_eq!(test_repo.subjects("HEAD")[0], "s1");
  assert!(test_repo.git(&["cat-file", "-e", "HEAD:junk.txt"]).is_err());
}
