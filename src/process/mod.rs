//! Scoped subprocess execution with a hard wall-clock timeout.
//!
//! A non-zero exit status is a normal return: many CLI tools (flake8,
//! grep, `git diff --no-index`) use it to report findings rather than a
//! crash. Only a missing executable, a spawn failure or a timeout are
//! errors.
//!
//! On unix every child leads its own process group. A timeout or a
//! dropped run kills the whole group, so nothing a shell started is left
//! behind.

use crate::error::CoreError;
use std::io;
use std::path::Path;
use std::process::{Command as StdCommand, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

/// Captured result of a finished subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, or -1 when the process was terminated by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("executable not found: {program}")]
    NotFound { program: String },

    #[error("command timed out after {secs} seconds: {command}")]
    Timeout { command: String, secs: u64 },

    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("failed while waiting for '{command}': {source}")]
    Wait {
        command: String,
        #[source]
        source: io::Error,
    },
}

impl From<ProcessError> for CoreError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::NotFound { program } => CoreError::ProcessNotFound(program),
            ProcessError::Timeout { command, secs } => CoreError::ProcessTimeout { command, secs },
            other => CoreError::ToolExecution {
                name: "process".into(),
                message: other.to_string(),
            },
        }
    }
}

/// Runs external commands for tool handlers.
///
/// Children inherit the environment. Dropping an in-flight `run` (for
/// example when a turn is interrupted) terminates the child and its
/// process group.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    /// Run `program` with an explicit argument list.
    pub async fn run<S: AsRef<str>>(
        &self,
        program: &str,
        args: &[S],
        timeout: Duration,
        cwd: Option<&Path>,
    ) -> Result<ProcessOutput, ProcessError> {
        let mut cmd = StdCommand::new(program);
        let mut command_line = program.to_string();
        for arg in args {
            let arg: &str = arg.as_ref();
            cmd.arg(arg);
            command_line.push(' ');
            command_line.push_str(arg);
        }

        self.execute(cmd, program, command_line, timeout, cwd).await
    }

    /// Run a command line through the platform shell.
    pub async fn run_shell(
        &self,
        command: &str,
        timeout: Duration,
        cwd: Option<&Path>,
    ) -> Result<ProcessOutput, ProcessError> {
        let (shell, flag) = if cfg!(windows) { ("cmd", "/C") } else { ("sh", "-c") };
        let mut cmd = StdCommand::new(shell);
        cmd.arg(flag).arg(command);
        self.execute(cmd, shell, command.to_string(), timeout, cwd).await
    }

    async fn execute(
        &self,
        mut std_cmd: StdCommand,
        program: &str,
        command_line: String,
        timeout: Duration,
        cwd: Option<&Path>,
    ) -> Result<ProcessOutput, ProcessError> {
        if let Some(dir) = cwd {
            std_cmd.current_dir(dir);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            std_cmd.process_group(0);
        }
        let mut cmd = Command::from(std_cmd);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Spawning: {} (timeout {}s)", command_line, timeout.as_secs());

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                ProcessError::NotFound {
                    program: program.to_string(),
                }
            } else {
                ProcessError::Spawn {
                    command: command_line.clone(),
                    source: e,
                }
            }
        })?;
        let mut group = GroupGuard::new(child.id());

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let collected = tokio::time::timeout(timeout, async {
            tokio::join!(child.wait(), read_stream(stdout), read_stream(stderr))
        })
        .await;

        match collected {
            Ok((status, out, err)) => {
                group.disarm();
                let status = status.map_err(|e| ProcessError::Wait {
                    command: command_line.clone(),
                    source: e,
                })?;
                let output = ProcessOutput {
                    exit_code: status.code().unwrap_or(-1),
                    stdout: String::from_utf8_lossy(&out).into_owned(),
                    stderr: String::from_utf8_lossy(&err).into_owned(),
                };
                debug!("'{}' exited with {}", command_line, output.exit_code);
                Ok(output)
            }
            Err(_) => {
                group.kill();
                // kill() also reaps the leader.
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed-out process '{}': {}", command_line, e);
                }
                Err(ProcessError::Timeout {
                    command: command_line,
                    secs: timeout.as_secs(),
                })
            }
        }
    }
}

/// Kills the child's process group when dropped while armed.
struct GroupGuard {
    pgid: Option<u32>,
}

impl GroupGuard {
    fn new(pid: Option<u32>) -> Self {
        Self { pgid: pid }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }

    fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
        }
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    // SAFETY: kill(2) with a negative pid only signals that process group.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        debug!("killpg({}) failed: {}", pgid, io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

async fn read_stream<R: AsyncRead + Unpin>(stream: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut s) = stream {
        if let Err(e) = s.read_to_end(&mut buf).await {
            debug!("Output stream read failed: {}", e);
        }
    }
    buf
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    const NO_ARGS: &[&str] = &[];

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let out = ProcessRunner::new()
            .run("echo", &["hello"], Duration::from_secs(5), None)
            .await
            .unwrap();
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.stdout.trim(), "hello");
        assert!(out.success());
    }

    #[tokio::test]
    async fn non_zero_exit_is_not_an_error() {
        let out = ProcessRunner::new()
            .run_shell("echo oops >&2; exit 3", Duration::from_secs(5), None)
            .await
            .unwrap();
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stderr.trim(), "oops");
        assert!(!out.success());
    }

    #[tokio::test]
    async fn missing_binary_is_not_found() {
        let err = ProcessRunner::new()
            .run("definitely-not-a-real-binary-4f2a", NO_ARGS, Duration::from_secs(5), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::NotFound { ref program } if program == "definitely-not-a-real-binary-4f2a"));
    }

    #[tokio::test]
    async fn timeout_fires_within_bound() {
        let started = Instant::now();
        let err = ProcessRunner::new()
            .run("sleep", &["10"], Duration::from_secs(1), None)
            .await
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(4));
        match err {
            ProcessError::Timeout { command, secs } => {
                assert_eq!(command, "sleep 10");
                assert_eq!(secs, 1);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    /// Live and not a zombie.
    #[cfg(target_os = "linux")]
    fn is_running(pid: &str) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => stat
                .rsplit_once(')')
                .map(|(_, rest)| !rest.trim_start().starts_with('Z'))
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    async fn wait_until_gone(pid: &str) -> bool {
        for _ in 0..40 {
            if !is_running(pid) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn timeout_kills_background_children() {
        let dir = crate::tools::builtin::testutil::scratch_dir("pgroup");
        let pid_file = dir.join("pid");
        let script = format!("sleep 30 & echo $! > {}; wait", pid_file.display());

        let err = ProcessRunner::new()
            .run_shell(&script, Duration::from_secs(1), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { .. }));

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let pid = pid.trim();
        assert!(!pid.is_empty());
        assert!(wait_until_gone(pid).await, "sleep {} survived the timeout", pid);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn dropped_run_kills_background_children() {
        let dir = crate::tools::builtin::testutil::scratch_dir("pgroup-drop");
        let pid_file = dir.join("pid");
        let script = format!("sleep 30 & echo $! > {}; wait", pid_file.display());

        let runner = ProcessRunner::new();
        let run = runner.run_shell(&script, Duration::from_secs(60), None);
        assert!(tokio::time::timeout(Duration::from_millis(500), run).await.is_err());

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let pid = pid.trim();
        assert!(wait_until_gone(pid).await, "sleep {} survived the drop", pid);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn invalid_utf8_is_decoded_lossily() {
        let out = ProcessRunner::new()
            .run_shell("printf 'a\\377b'", Duration::from_secs(5), None)
            .await
            .unwrap();
        assert_eq!(out.stdout, "a\u{FFFD}b");
    }

    #[tokio::test]
    async fn working_directory_override() {
        let dir = std::env::temp_dir();
        let out = ProcessRunner::new()
            .run("pwd", NO_ARGS, Duration::from_secs(5), Some(&dir))
            .await
            .unwrap();
        let reported = std::fs::canonicalize(out.stdout.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(&dir).unwrap());
    }

    #[tokio::test]
    async fn ping_loopback() {
        let result = ProcessRunner::new()
            .run("ping", &["-c", "1", "localhost"], Duration::from_secs(5), None)
            .await;
        match result {
            Ok(out) if out.exit_code == 0 => assert!(!out.stdout.is_empty()),
            // No ping binary, or no ICMP permission in this sandbox.
            Ok(_) | Err(ProcessError::NotFound { .. }) => {}
            Err(e) => panic!("unexpected ping failure: {e}"),
        }
    }

    #[test]
    fn errors_map_into_core_taxonomy() {
        let core: CoreError = ProcessError::Timeout {
            command: "sleep 9".into(),
            secs: 2,
        }
        .into();
        assert!(matches!(core, CoreError::ProcessTimeout { secs: 2, .. }));
        let core: CoreError = ProcessError::NotFound {
            program: "git".into(),
        }
        .into();
        assert!(matches!(core, CoreError::ProcessNotFound(p) if p == "git"));
    }
}
