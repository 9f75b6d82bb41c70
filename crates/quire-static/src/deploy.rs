//! Deployment transports for a published output tree.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use walkdir::WalkDir;

/// Default bound on a single deployment command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Errors that can occur while deploying.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("Output directory not found: {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("`{command}` timed out after {}s", timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    #[error("Deployment I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Hands a published output tree to a destination.
pub trait Deployer: Send + Sync {
    /// Transport name used in logs
    fn name(&self) -> &str;

    fn deploy(&self, output_dir: &Path) -> Result<(), DeployError>;
}

/// Force-pushes the output directory to a branch of a git remote.
///
/// The output directory becomes (or stays) its own repository, so the
/// published branch only ever contains generated files.
#[derive(Debug, Clone)]
pub struct GitDeployer {
    remote: String,
    branch: String,
    message: String,
    timeout: Duration,
}

impl GitDeployer {
    pub fn new(remote: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            branch: branch.into(),
            message: "Publish site".to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Bound each git invocation. A command that exceeds it is killed.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn git(&self, dir: &Path, args: &[&str]) -> Result<(), DeployError> {
        let mut command = Command::new("git");
        command.arg("-C").arg(dir).args(args);
        run_with_timeout(command, format!("git {}", args.join(" ")), self.timeout)
    }
}

impl Deployer for GitDeployer {
    fn name(&self) -> &str {
        "git"
    }

    fn deploy(&self, output_dir: &Path) -> Result<(), DeployError> {
        if !output_dir.is_dir() {
            return Err(DeployError::MissingOutput(output_dir.to_path_buf()));
        }

        if !output_dir.join(".git").exists() {
            self.git(output_dir, &["init", "--quiet"])?;
        }
        self.git(output_dir, &["checkout", "--quiet", "-B", &self.branch])?;
        self.git(output_dir, &["add", "--all"])?;
        self.git(
            output_dir,
            &["commit", "--quiet", "--allow-empty", "-m", &self.message],
        )?;
        self.git(
            output_dir,
            &["push", "--quiet", "--force", &self.remote, &self.branch],
        )?;

        tracing::info!("Pushed {} to {} ({})", output_dir.display(), self.remote, self.branch);
        Ok(())
    }
}

/// Copies the output tree into another directory, e.g. a mounted web root.
#[derive(Debug, Clone)]
pub struct DirectoryDeployer {
    target: PathBuf,
}

impl DirectoryDeployer {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

impl Deployer for DirectoryDeployer {
    fn name(&self) -> &str {
        "directory"
    }

    fn deploy(&self, output_dir: &Path) -> Result<(), DeployError> {
        if !output_dir.is_dir() {
            return Err(DeployError::MissingOutput(output_dir.to_path_buf()));
        }

        let mut copied = 0;
        let walker = WalkDir::new(output_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git");

        for entry in walker {
            let entry = entry.map_err(io::Error::from)?;
            let relative = entry.path().strip_prefix(output_dir).unwrap_or(entry.path());
            let dest = self.target.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&dest)?;
            } else if entry.file_type().is_file() {
                fs::copy(entry.path(), &dest)?;
                copied += 1;
            }
        }

        tracing::info!("Copied {} files to {}", copied, self.target.display());
        Ok(())
    }
}

/// Run a command, killing it if it outlives `timeout`.
fn run_with_timeout(
    mut command: Command,
    label: String,
    timeout: Duration,
) -> Result<(), DeployError> {
    tracing::debug!("Running {}", label);

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| DeployError::Spawn {
            command: label.clone(),
            source,
        })?;

    // Drain stderr off-thread so a chatty child cannot block on a full pipe.
    // A grandchild may keep the pipe open after the child exits, so the
    // reader is never joined.
    let stderr = child.stderr.take();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_string(&mut buf);
        }
        let _ = tx.send(buf);
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(DeployError::Timeout {
                command: label,
                timeout,
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stderr = rx
        .recv_timeout(deadline.saturating_duration_since(Instant::now()))
        .unwrap_or_default();
    if !status.success() {
        return Err(DeployError::CommandFailed {
            command: label,
            status: status.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(())
}
