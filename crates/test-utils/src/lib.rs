pub mod git_test_utils;
pub mod graph_fixture;
