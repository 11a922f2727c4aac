use crate::error::LinearizeError;
use crate::model::{CommitId, Instruction, WalkPath};
use crate::plan::Planner;
use crate::repo::Repo;
use git_executor::git_command_executor::GitCommandExecutor;
use pretty_assertions::assert_eq;
use test_log::test;
use test_utils::git_test_utils::TestRepo;
use test_utils::graph_fixture::GraphFixture;

fn plan_of(test_repo: &TestRepo, head: &str) -> Vec<Instruction> {
  let git = GitCommandExecutor::new();
  let repo = Repo::new(&git, test_repo.path_str());
  let head = repo.rev_parse(head).unwrap();
  Planner::new(&repo).plan(&head, &[]).unwrap()
}

#[test]
fn test_plan_of_simple_chain() {
  let test_repo = TestRepo::new();
  let a = test_repo.create_commit("a", "a.txt", "a");
  test_repo.create_commit("b", "b.txt", "b");
  let c = test_repo.create_commit("c", "c.txt", "c");

  let plan = plan_of(&test_repo, "HEAD");
  assert_eq!(
    plan,
    vec![
      Instruction::Base {
        commits: vec![CommitId::new(a.clone())]
      },
      Instruction::Compensate {
        base: CommitId::new(a),
        tip: CommitId::new(c),
      },
      Instruction::End,
    ]
  );
}

#[test]
fn test_plan_of_single_root_commit() {
  let test_repo = TestRepo::new();
  let root = test_repo.create_commit("root", "a.txt", "a");

  let plan = plan_of(&test_repo, "HEAD");
  assert_eq!(
    plan,
    vec![
      Instruction::Base {
        commits: vec![CommitId::new(root)]
      },
      Instruction::End,
    ]
  );
}

#[test]
fn test_plan_of_broken_merge() {
  let test_repo = TestRepo::new();
  let fixture = GraphFixture::build(&test_repo);
  let b_merge = CommitId::new(fixture.b_merge);
  let initial = CommitId::new(fixture.initial);
  let b_commit = CommitId::new(fixture.b_commit);

  // the ours-preferred merge is not reproducible by the default strategy:
  // it is bracketed, resolved, and its right branch is never walked
  let plan = plan_of(&test_repo, b_merge.as_str());
  assert_eq!(
    plan,
    vec![
      Instruction::Push {
        merge: b_merge.clone(),
        path: WalkPath::root(),
      },
      Instruction::Base {
        commits: vec![initial.clone()]
      },
      Instruction::Base {
        commits: vec![initial.clone()]
      },
      Instruction::Compensate {
        base: initial,
        tip: b_commit,
      },
      Instruction::ResolveMergeConflict { merge: b_merge.clone() },
      Instruction::Pop {
        merge: b_merge,
        path: WalkPath::root(),
      },
      Instruction::End,
    ]
  );
}

#[test]
fn test_plan_of_cascaded_merges() {
  let test_repo = TestRepo::new();
  let fixture = GraphFixture::build(&test_repo);
  let initial = CommitId::new(fixture.initial);
  let b_commit = CommitId::new(fixture.b_commit);
  let b_merge = CommitId::new(fixture.b_merge);
  let d_tip = CommitId::new(fixture.d_tip);
  let e_merge = CommitId::new(fixture.e_merge);
  let left_path = WalkPath::root().descend_left();

  let plan = plan_of(&test_repo, e_merge.as_str());
  assert_eq!(
    plan,
    vec![
      Instruction::Push {
        merge: e_merge.clone(),
        path: WalkPath::root(),
      },
      Instruction::Base {
        commits: vec![initial.clone()]
      },
      Instruction::Push {
        merge: b_merge.clone(),
        path: left_path.clone(),
      },
      Instruction::Base {
        commits: vec![initial.clone()]
      },
      Instruction::Base {
        commits: vec![initial.clone()]
      },
      Instruction::Compensate {
        base: initial,
        tip: b_commit,
      },
      Instruction::ResolveMergeConflict { merge: b_merge.clone() },
      Instruction::Pop {
        merge: b_merge.clone(),
        path: left_path,
      },
      Instruction::Base { commits: vec![b_merge.clone()] },
      Instruction::Compensate {
        base: b_merge,
        tip: d_tip,
      },
      Instruction::Pop {
        merge: e_merge,
        path: WalkPath::root(),
      },
      Instruction::End,
    ]
  );
}

#[test]
fn test_plan_skips_right_branch_of_empty_merge() {
  let test_repo = TestRepo::new();
  let initial = test_repo.create_commit("initial", "l1", "A\n");
  test_repo.create_branch("side").unwrap();
  test_repo.checkout("side").unwrap();
  let side_tip = test_repo.create_commit("side change", "l2", "S\n");
  test_repo.checkout("master").unwrap();
  test_repo.create_commit("main change", "l1", "M\n");
  test_repo.merge_ours_strategy("side", "empty merge of side");

  let plan = plan_of(&test_repo, "HEAD");

  // no instruction references the discarded right branch
  let side_tip = CommitId::new(side_tip);
  assert!(
    plan.iter().all(|instruction| match instruction {
      Instruction::Compensate { base, tip } => *base != side_tip && *tip != side_tip,
      Instruction::ResolveMergeConflict { .. } => false,
      _ => true,
    }),
    "unexpected plan: {plan:?}"
  );
  // the merge itself is still bracketed from the mainline
  assert!(matches!(&plan[0], Instruction::Push { path, .. } if *path == WalkPath::root()));
  assert_eq!(
    plan[1],
    Instruction::Base {
      commits: vec![CommitId::new(initial)]
    }
  );
}

#[test]
fn test_plan_of_reproducible_merge_walks_the_right_branch() {
  let test_repo = TestRepo::new();
  let initial = test_repo.create_commit("initial", "l1", "A\n");
  test_repo.create_branch("side").unwrap();
  test_repo.checkout("side").unwrap();
  let side_tip = test_repo.create_commit("side change", "l2", "S\n");
  test_repo.checkout("master").unwrap();
  test_repo.create_commit("main change", "l1", "M\n");
  let merge = test_repo.merge("side", "clean merge");

  let plan = plan_of(&test_repo, "HEAD");

  assert!(
    plan
      .iter()
      .all(|instruction| !matches!(instruction, Instruction::ResolveMergeConflict { .. })),
    "clean merge must not be resolved: {plan:?}"
  );
  // the side branch is replayed from the fork point
  assert!(plan.contains(&Instruction::Compensate {
    base: CommitId::new(initial),
    tip: CommitId::new(side_tip),
  }));
  assert!(plan.contains(&Instruction::Pop {
    merge: CommitId::new(merge),
    path: WalkPath::root(),
  }));
}

#[test]
fn test_octopus_merge_is_rejected() {
  let test_repo = TestRepo::new();
  let git = GitCommandExecutor::new();
  test_repo.create_commit("initial", "a.txt", "a");
  test_repo.create_branch("b1").unwrap();
  test_repo.create_branch("b2").unwrap();
  test_repo.checkout("b1").unwrap();
  test_repo.create_commit("one", "one.txt", "1");
  test_repo.checkout("b2").unwrap();
  test_repo.create_commit("two", "two.txt", "2");
  test_repo.checkout("master").unwrap();
  test_repo.git(&["merge", "b1", "b2", "-m", "octopus"]).unwrap();

  let repo = Repo::new(&git, test_repo.path_str());
  let head = repo.rev_parse("HEAD").unwrap();
  let result = Planner::new(&repo).plan(&head, &[]);

  assert!(
    matches!(result, Err(LinearizeError::UnsupportedTopology { parents: 3, .. })),
    "unexpected: {result:?}"
  );
}

#[test]
fn test_plan_bounded_by_limit() {
  let test_repo = TestRepo::new();
  let git = GitCommandExecutor::new();
  test_repo.create_commit("a", "a.txt", "a");
  let b = test_repo.create_commit("b", "b.txt", "b");
  let c = test_repo.create_commit("c", "c.txt", "c");

  let repo = Repo::new(&git, test_repo.path_str());
  let head = repo.rev_parse("HEAD").unwrap();
  let limit = CommitId::new(b.clone());
  let plan = Planner::new(&repo).plan(&head, &[limit]).unwrap();

  assert_eq!(
    plan,
    vec![
      Instruction::Base {
        commits: vec![CommitId::new(b.clone())]
      },
      Instruction::Compensate {
        base: CommitId::new(b),
        tip: CommitId::new(c),
      },
      Instruction::End,
    ]
  );
}
