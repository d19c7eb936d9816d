//! ToolContext - execution context shared by the tools of one run

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use super::ToolError;

/// Per-tool limits applied when the step arguments do not override them
#[derive(Debug, Clone, PartialEq)]
pub struct ToolLimits {
    /// Largest file `read_file` returns, in characters
    pub read_max_chars: usize,
    /// Largest text `echo` accepts, in characters
    pub echo_max_chars: usize,
    pub shell_timeout: Duration,
    pub http_timeout: Duration,
}

impl Default for ToolLimits {
    fn default() -> Self {
        Self {
            read_max_chars: 4000,
            echo_max_chars: 4000,
            shell_timeout: Duration::from_secs(30),
            http_timeout: Duration::from_secs(10),
        }
    }
}

/// Execution context for tools - scoped to a single plan execution
///
/// Relative paths resolve against `workdir`. With the sandbox on, file tools
/// cannot reach outside it.
#[derive(Clone)]
pub struct ToolContext {
    /// Directory relative paths and shell commands resolve against
    pub workdir: PathBuf,

    /// Run ID of the plan execution (for log correlation)
    pub run_id: String,

    /// Whether file paths must stay inside `workdir` (default: false)
    pub sandbox_enabled: bool,

    pub limits: ToolLimits,
}

impl ToolContext {
    /// Create a new tool context
    pub fn new(workdir: PathBuf, run_id: impl Into<String>) -> Self {
        let run_id = run_id.into();
        debug!(?workdir, %run_id, "ToolContext::new: called");
        Self {
            workdir,
            run_id,
            sandbox_enabled: false,
            limits: ToolLimits::default(),
        }
    }

    /// Create a context confined to its working directory
    pub fn new_sandboxed(workdir: PathBuf, run_id: impl Into<String>) -> Self {
        let mut ctx = Self::new(workdir, run_id);
        debug!("ToolContext::new_sandboxed: called");
        ctx.sandbox_enabled = true;
        ctx
    }

    pub fn with_limits(mut self, limits: ToolLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Expand `~/` and join relative paths onto the working directory
    fn normalize_path(&self, path: &Path) -> PathBuf {
        debug!(?path, "ToolContext::normalize_path: called");
        if let Ok(rest) = path.strip_prefix("~")
            && let Some(home) = dirs::home_dir()
        {
            debug!("ToolContext::normalize_path: expanding home directory");
            return home.join(rest);
        }
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workdir.join(path)
        }
    }

    /// Resolve a tool-supplied path, enforcing the sandbox when enabled
    pub fn resolve_path(&self, path: &Path) -> Result<PathBuf, ToolError> {
        debug!(?path, sandbox = self.sandbox_enabled, "ToolContext::resolve_path: called");
        let normalized = self.normalize_path(path);

        if !self.sandbox_enabled {
            return Ok(normalized);
        }

        let canonical = resolve_components(&std::path::absolute(&normalized)?)?;

        let workdir = self.workdir.canonicalize().unwrap_or_else(|_| self.workdir.clone());
        if canonical.starts_with(&workdir) {
            Ok(canonical)
        } else {
            debug!(?canonical, "ToolContext::resolve_path: sandbox violation");
            Err(ToolError::SandboxViolation {
                path: path.to_path_buf(),
                workdir: self.workdir.clone(),
            })
        }
    }
}

/// Resolve an absolute path one component at a time
///
/// Existing prefixes are canonicalized so symlinks are followed, `..` pops the
/// resolved prefix, and names that do not exist yet are kept as written.
fn resolve_components(path: &Path) -> std::io::Result<PathBuf> {
    let mut resolved = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(name) => {
                resolved.push(name);
                if resolved.symlink_metadata().is_ok() {
                    resolved = resolved.canonicalize()?;
                }
            }
        }
    }
    Ok(resolved)
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("workdir", &self.workdir)
            .field("run_id", &self.run_id)
            .field("sandbox_enabled", &self.sandbox_enabled)
            .finish()
    }
}
