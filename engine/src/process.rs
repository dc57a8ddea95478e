//! Execution context backed by real processes.
//!
//! Dynamic source commands run through the platform shell (`sh -c` on Unix,
//! `cmd /C` on Windows). Each non-empty line of standard output becomes one
//! item; a tab separates an optional description from the name.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Utc};
use command_suggest_core::{Clock, ExecutionContext, SourceError, SourceItem};
use tracing::debug;
use wait_timeout::ChildExt;

/// Runs dynamic source commands with the platform shell.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use command_suggest_core::ExecutionContext;
/// use command_suggest_engine::ProcessContext;
///
/// let context = ProcessContext::new().with_timeout(Some(Duration::from_secs(2)));
/// let branches = context.execute("git branch --format='%(refname:short)'", Some("/repo")).unwrap();
/// for branch in branches {
///     println!("{}", branch.name);
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ProcessContext {
    timeout: Option<Duration>,
}

impl ProcessContext {
    /// Creates a context without a timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Kills commands that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The configured timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut shell = Command::new("cmd");
        shell.arg("/C").arg(command);
        shell
    } else {
        let mut shell = Command::new("sh");
        shell.arg("-c").arg(command);
        shell
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            if let Err(err) = pipe.read_to_end(&mut buf) {
                debug!(error = %err, "Failed to read child output");
            }
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    let buf = handle.and_then(|h| h.join().ok()).unwrap_or_default();
    String::from_utf8_lossy(&buf).into_owned()
}

fn parse_items(stdout: &str) -> Vec<SourceItem> {
    stdout
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(|line| match line.split_once('\t') {
            Some((name, description)) => SourceItem {
                name: name.to_string(),
                description: description.trim().to_string(),
            },
            None => SourceItem::from_name(line),
        })
        .collect()
}

impl ProcessContext {
    fn wait(&self, child: &mut Child, command: &str) -> Result<ExitStatus, SourceError> {
        let failure = |message: String| SourceError::Execution {
            command: command.to_string(),
            message,
        };

        let Some(timeout) = self.timeout else {
            return child.wait().map_err(|e| failure(format!("wait failed: {e}")));
        };
        match child.wait_timeout(timeout) {
            Ok(Some(status)) => Ok(status),
            Ok(None) => {
                debug!(command, timeout_ms = timeout.as_millis() as u64, "Source command timed out, killing process");
                let _ = child.kill();
                let _ = child.wait();
                Err(failure(format!("timed out after {}ms", timeout.as_millis())))
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(failure(format!("wait failed: {e}")))
            }
        }
    }
}

impl Clock for ProcessContext {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl ExecutionContext for ProcessContext {
    fn execute(
        &self,
        command: &str,
        working_directory: Option<&str>,
    ) -> Result<Vec<SourceItem>, SourceError> {
        let mut shell = shell_command(command);
        shell
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = working_directory {
            shell.current_dir(dir);
        }

        let mut child = shell.spawn().map_err(|e| SourceError::Execution {
            command: command.to_string(),
            message: format!("spawn failed: {e}"),
        })?;

        // Drain pipes concurrently so a full pipe buffer cannot stall the child.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = self.wait(&mut child, command)?;
        let stdout = collect(stdout);
        let stderr = collect(stderr);

        if !status.success() {
            let detail = stderr.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
            return Err(SourceError::Execution {
                command: command.to_string(),
                message: format!("{status}: {}", detail.trim()),
            });
        }

        let items = parse_items(&stdout);
        debug!(command, items = items.len(), "Source command finished");
        Ok(items)
    }
}
