use std::path::Path;
use std::process::Command;

/// The engine shells out for every operation and leans on
/// `merge-tree --write-tree`, which appeared in this release.
const REQUIRED_GIT: (u32, u32) = (2, 38);

#[derive(Debug, Clone)]
pub struct GitInfo {
  pub version: String,
  pub path: String,
}

impl GitInfo {
  /// Probe the candidate binaries in order and keep the first one that can
  /// drive the engine. A probe that answers but is too old is remembered so
  /// the error can name what was found.
  pub fn discover() -> Result<Self, String> {
    let mut too_old: Option<GitInfo> = None;

    for candidate in candidate_binaries() {
      let Ok(info) = Self::from_path(&candidate) else {
        continue;
      };
      if info.supports_write_tree() {
        return Ok(info);
      }
      too_old.get_or_insert(info);
    }

    let (major, minor) = REQUIRED_GIT;
    match too_old {
      Some(info) => Err(format!(
        "git {} at '{}' is too old: linearization drives `git merge-tree --write-tree` and needs Git {major}.{minor} or newer",
        info.version, info.path
      )),
      None => Err("could not find a git executable on this system".to_string()),
    }
  }

  /// Interrogate a specific binary with `git version`
  pub fn from_path(git_path: &str) -> Result<Self, String> {
    let output = Command::new(git_path)
      .arg("version")
      .output()
      .map_err(|e| format!("cannot run '{git_path} version': {e}"))?;
    if !output.status.success() {
      return Err(format!("'{git_path} version' failed: {}", String::from_utf8_lossy(&output.stderr).trim()));
    }

    let banner = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok(Self {
      version: banner.strip_prefix("git version ").unwrap_or(&banner).to_string(),
      path: git_path.to_string(),
    })
  }

  /// Major/minor pair of the reported version
  pub fn parse_version(&self) -> Result<(u32, u32), String> {
    let mut parts = self.version.split('.');
    let major = parts
      .next()
      .and_then(|p| p.parse::<u32>().ok())
      .ok_or_else(|| format!("Invalid version format: {}", self.version))?;
    let minor = parts
      .next()
      .and_then(|p| p.parse::<u32>().ok())
      .ok_or_else(|| format!("Invalid version format: {}", self.version))?;
    Ok((major, minor))
  }

  /// Whether this git understands `merge-tree --write-tree`
  pub fn supports_write_tree(&self) -> bool {
    self.parse_version().map(|version| version >= REQUIRED_GIT).unwrap_or(false)
  }
}

/// Probe order: an explicit `GIT_LINEARIZE_GIT` override, package-manager
/// installs that tend to be newer than the OS git, then whatever PATH says.
fn candidate_binaries() -> Vec<String> {
  let mut candidates = Vec::new();

  if let Ok(override_path) = std::env::var("GIT_LINEARIZE_GIT")
    && !override_path.is_empty()
  {
    candidates.push(override_path);
  }

  if cfg!(target_os = "macos") {
    for prefix in ["/opt/homebrew", "/usr/local"] {
      let brewed = format!("{prefix}/bin/git");
      if Path::new(&brewed).exists() {
        candidates.push(brewed);
      }
    }
  }

  candidates.push("git".to_string());
  candidates
}
