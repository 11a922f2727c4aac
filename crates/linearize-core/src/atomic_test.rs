use crate::atomic::Atomic;
use crate::error::LinearizeError;
use crate::repo::Repo;
use anyhow::anyhow;
use git_executor::git_command_executor::GitCommandExecutor;
use pretty_assertions::assert_eq;
use test_utils::git_test_utils::TestRepo;

#[test]
fn test_success_restores_branch_and_head() {
  let test_repo = TestRepo::new();
  let git = GitCommandExecutor::new();
  test_repo.create_commit("one", "a.txt", "a");
  let head = test_repo.head();

  let repo = Repo::new(&git, test_repo.path_str());
  let result = Atomic::new(&repo).run(|| {
    // wander off to a detached scratch commit
    repo.checkout_detach(&test_repo.head()).map_err(LinearizeError::Other)?;
    repo.commit("scratch", true, false).map_err(LinearizeError::Other)?;
    Ok(42)
  });

  assert_eq!(result.unwrap(), 42);
  assert_eq!(test_repo.current_branch(), Some("master".to_string()));
  assert_eq!(test_repo.head(), head);
  assert_eq!(test_repo.status(), "");
}

#[test]
fn test_failure_restores_branch_and_head() {
  let test_repo = TestRepo::new();
  let git = GitCommandExecutor::new();
  test_repo.create_commit("one", "a.txt", "a");
  let head = test_repo.head();

  let repo = Repo::new(&git, test_repo.path_str());
  let result: Result<(), _> = Atomic::new(&repo).run(|| {
    repo.checkout_detach(&test_repo.head()).map_err(LinearizeError::Other)?;
    repo.commit("scratch", true, false).map_err(LinearizeError::Other)?;
    Err(LinearizeError::Other(anyhow!("boom")))
  });

  assert!(result.is_err());
  assert_eq!(test_repo.current_branch(), Some("master".to_string()));
  assert_eq!(test_repo.head(), head);
}

#[test]
fn test_uncommitted_changes_survive_a_failed_run() {
  let test_repo = TestRepo::new();
  let git = GitCommandExecutor::new();
  test_repo.create_commit("one", "a.txt", "committed");
  test_repo.write_file("a.txt", "work in progress");

  let repo = Repo::new(&git, test_repo.path_str());
  let result: Result<(), _> = Atomic::new(&repo).run(|| Err(LinearizeError::Other(anyhow!("boom"))));

  assert!(result.is_err());
  assert_eq!(test_repo.read_file("a.txt"), "work in progress");
  assert_eq!(test_repo.current_branch(), Some("master".to_string()));
}

#[test]
fn test_inner_action_sees_a_clean_tree() {
  let test_repo = TestRepo::new();
  let git = GitCommandExecutor::new();
  test_repo.create_commit("one", "a.txt", "committed");
  test_repo.write_file("a.txt", "work in progress");

  let repo = Repo::new(&git, test_repo.path_str());
  let seen = Atomic::new(&repo)
    .run(|| {
      let dirty = repo.is_dirty().map_err(LinearizeError::Other)?;
      Ok(dirty)
    })
    .unwrap();

  assert!(!seen, "entry snapshot should leave a clean tree for the run");
  // and the changes come back afterwards
  assert_eq!(test_repo.read_file("a.txt"), "work in progress");
}

#[test]
fn test_leftover_scratch_changes_are_preserved_as_remnant() {
  let test_repo = TestRepo::new();
  let git = GitCommandExecutor::new();
  test_repo.create_commit("one", "a.txt", "a");
  let head = test_repo.head();

  let repo = Repo::new(&git, test_repo.path_str());
  let result: Result<(), _> = Atomic::new(&repo).run(|| {
    test_repo.write_file("a.txt", "abandoned scratch work");
    Err(LinearizeError::Other(anyhow!("boom")))
  });

  assert!(result.is_err());
  assert_eq!(test_repo.head(), head);
  assert_eq!(test_repo.status(), "");
  let stashes = test_repo.git(&["stash", "list"]).unwrap();
  assert!(stashes.contains("git-linearize: remnant"), "remnant stash missing: {stashes}");
}
