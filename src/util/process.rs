//! Subprocess execution utilities.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Shared flag asking running and pending work to stop.
///
/// Cloning is cheap; every clone observes the same flag.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a supervised process ended.
#[derive(Debug)]
pub enum ProcessOutcome {
    Finished(Output),
    /// The process was killed because cancellation was requested
    Cancelled,
}

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    cwd: Option<PathBuf>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env
            .insert(key.as_ref().to_string(), value.as_ref().to_string());
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }

    /// Execute the command and wait for completion.
    pub fn exec(&self) -> Result<Output> {
        let mut cmd = self.build_command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        child
            .wait_with_output()
            .with_context(|| format!("failed to wait for `{}`", self.program.display()))
    }

    /// Execute the command, killing it as soon as `cancel` is set.
    ///
    /// Output is drained on helper threads so a chatty compiler cannot
    /// block on a full pipe while we poll for its exit.
    pub fn exec_with_cancel(&self, cancel: &Cancellation) -> Result<ProcessOutcome> {
        if cancel.is_cancelled() {
            return Ok(ProcessOutcome::Cancelled);
        }

        let mut cmd = self.build_command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = loop {
            if cancel.is_cancelled() {
                kill(&mut child);
                let _ = stdout.join();
                let _ = stderr.join();
                return Ok(ProcessOutcome::Cancelled);
            }
            match child
                .try_wait()
                .with_context(|| format!("failed to wait for `{}`", self.program.display()))?
            {
                Some(status) => break status,
                None => thread::sleep(POLL_INTERVAL),
            }
        };

        Ok(ProcessOutcome::Finished(Output {
            status,
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        }))
    }

    /// Display the command for logs and error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        tracing::debug!("failed to kill process {}: {}", child.id(), e);
    }
    let _ = child.wait();
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_command() {
        let pb = ProcessBuilder::new("clang").args(["--compile", "--output=a.o", "a.c"]);
        assert_eq!(pb.display_command(), "clang --compile --output=a.o a.c");
    }

    #[test]
    fn test_cancellation_is_shared() {
        let cancel = Cancellation::new();
        let clone = cancel.clone();
        assert!(!clone.is_cancelled());
        cancel.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_precancelled_never_spawns() {
        let cancel = Cancellation::new();
        cancel.cancel();
        let outcome = ProcessBuilder::new("definitely-not-a-real-program-xyz")
            .exec_with_cancel(&cancel)
            .unwrap();
        assert!(matches!(outcome, ProcessOutcome::Cancelled));
    }

    #[test]
    fn test_spawn_failure_is_error() {
        let result = ProcessBuilder::new("definitely-not-a-real-program-xyz")
            .exec_with_cancel(&Cancellation::new());
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_with_cancel_captures_output() {
        let outcome = ProcessBuilder::new("sh")
            .args(["-c", "echo out; echo err >&2; exit 3"])
            .exec_with_cancel(&Cancellation::new())
            .unwrap();
        let ProcessOutcome::Finished(output) = outcome else {
            panic!("process was not expected to be cancelled");
        };
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "out");
        assert_eq!(String::from_utf8_lossy(&output.stderr).trim(), "err");
    }

    #[cfg(unix)]
    #[test]
    fn test_cancel_kills_running_process() {
        let cancel = Cancellation::new();
        let trigger = cancel.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let outcome = ProcessBuilder::new("sleep")
            .arg("30")
            .exec_with_cancel(&cancel)
            .unwrap();
        handle.join().unwrap();

        assert!(matches!(outcome, ProcessOutcome::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
