use anyhow::{Result, anyhow, bail};
use clap::{Parser, ValueEnum};
use git_executor::git_command_executor::GitCommandExecutor;
use linearize_core::engine;
use linearize_core::model::{ConflictMode, LinearizeOptions};
use linearize_core::reduce::reduce_bases;
use linearize_core::repo::Repo;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ConflictModeArg {
  /// Fold conflict compensation into a single commit
  Merge,
  /// Keep the compensation as a separate following commit
  Split,
}

impl From<ConflictModeArg> for ConflictMode {
  fn from(mode: ConflictModeArg) -> Self {
    match mode {
      ConflictModeArg::Merge => ConflictMode::Merge,
      ConflictModeArg::Split => ConflictMode::Split,
    }
  }
}

#[derive(Parser, Debug)]
#[command(
  name = "git-linearize",
  version,
  about = "Rebuild a branch-and-merge history as a single-parent chain with the same final tree"
)]
struct Cli {
  /// Run as if started in this repository path
  #[arg(short = 'C', value_name = "PATH", default_value = ".")]
  repository: String,

  /// Enable debug diagnostics (also: DEBUG=true)
  #[arg(long)]
  debug: bool,

  /// Recursively linearize right subgraphs (the default)
  #[arg(long, overrides_with = "no_recursive")]
  recursive: bool,

  /// Only flatten the top-level merge structure (also: RECURSIVE=false)
  #[arg(long = "no-recursive", overrides_with = "recursive")]
  no_recursive: bool,

  /// How conflicted replays materialize (also: ON_CONFLICT)
  #[arg(long, value_enum, value_name = "MODE")]
  on_conflict: Option<ConflictModeArg>,

  /// Hard-reset HEAD to the linearized tip on success
  #[arg(long)]
  update_head: bool,

  /// Head to linearize, plus ^<limit> exclusions
  #[arg(value_name = "REVISION")]
  revisions: Vec<String>,

  /// Internal testing entry points: plan | reduce <commit>... | tree <rev>
  #[arg(last = true, value_name = "SUBCOMMAND")]
  internal: Vec<String>,
}

fn main() {
  let cli = Cli::parse();
  init_tracing(&cli);

  if let Err(error) = run(&cli) {
    eprintln!("fatal: {error:#}");
    std::process::exit(1);
  }
}

fn init_tracing(cli: &Cli) {
  let debug = cli.debug || env_flag("DEBUG").unwrap_or(false);
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }));
  tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn run(cli: &Cli) -> Result<()> {
  let (head, limits) = parse_revisions(&cli.revisions)?;
  let head = head.unwrap_or_else(|| "HEAD".to_string());
  let git = GitCommandExecutor::new();

  if !cli.internal.is_empty() {
    return run_internal(&git, cli, &head, &limits);
  }

  let options = resolve_options(cli)?;
  let outcome = engine::linearize(&git, &cli.repository, &options, &head, &limits)?;

  if cli.update_head {
    if outcome.base == outcome.tip {
      // nothing was rebuilt; moving the branch would be a no-op
      info!("base equals tip, leaving the current branch alone");
    } else {
      git.execute_command(&["reset", "--hard", outcome.tip.as_str()], &cli.repository)?;
      info!(tip = %outcome.tip.short(), "updated HEAD to the linearized tip");
    }
  } else {
    println!("{} {}", outcome.base, outcome.tip);
  }
  Ok(())
}

/// Dispatch to a named internal entry point, used for testing subsystems
fn run_internal(git: &GitCommandExecutor, cli: &Cli, head: &str, limits: &[String]) -> Result<()> {
  let (subcommand, args) = cli
    .internal
    .split_first()
    .ok_or_else(|| anyhow!("missing internal subcommand"))?;

  match subcommand.as_str() {
    "plan" => {
      let instructions = engine::plan(git, &cli.repository, head, limits)?;
      println!("{}", serde_json::to_string_pretty(&instructions)?);
    }
    "reduce" => {
      if args.is_empty() {
        bail!("reduce needs at least one commit");
      }
      let repo = Repo::new(git, &cli.repository);
      let commits = args.iter().map(|a| repo.rev_parse(a)).collect::<Result<Vec<_>>>()?;
      for commit in reduce_bases(&repo, &commits)? {
        println!("{commit}");
      }
    }
    "tree" => {
      let rev = args.first().map(String::as_str).unwrap_or("HEAD");
      let repo = Repo::new(git, &cli.repository);
      println!("{}", repo.tree_of(rev)?);
    }
    other => bail!("unknown internal subcommand '{other}'"),
  }
  Ok(())
}

/// The first bare argument is the head; `^`-prefixed arguments are limits
fn parse_revisions(revisions: &[String]) -> Result<(Option<String>, Vec<String>)> {
  let mut head: Option<String> = None;
  let mut limits = Vec::new();

  for revision in revisions {
    if let Some(limit) = revision.strip_prefix('^') {
      if limit.is_empty() {
        bail!("empty limit revision '^'");
      }
      limits.push(limit.to_string());
    } else if let Some(existing) = &head {
      bail!("more than one head given: '{existing}' and '{revision}'");
    } else {
      head = Some(revision.clone());
    }
  }
  Ok((head, limits))
}

/// Flags win over environment variables, which win over defaults
fn resolve_options(cli: &Cli) -> Result<LinearizeOptions> {
  let recursive = if cli.recursive {
    true
  } else if cli.no_recursive {
    false
  } else {
    env_flag("RECURSIVE").unwrap_or(true)
  };

  let conflict_mode = match cli.on_conflict {
    Some(mode) => mode.into(),
    None => match std::env::var("ON_CONFLICT") {
      Ok(value) => value.parse::<ConflictMode>().map_err(|e| anyhow!(e))?,
      Err(_) => ConflictMode::Merge,
    },
  };

  Ok(LinearizeOptions { conflict_mode, recursive })
}

fn env_flag(name: &str) -> Option<bool> {
  std::env::var(name)
    .ok()
    .map(|value| matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
}
