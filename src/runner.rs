//! External process execution.
//!
//! Runs engine commands (`docker`, `docker-compose`) synchronously from the
//! caller's point of view: each invocation blocks until the child exits and
//! returns the combined stdout/stderr text. A non-zero exit becomes a
//! [`CommandError`]; a spawn failure (including a missing executable) is
//! surfaced as the original [`std::io::Error`] and is never converted into a
//! [`CommandError`].

use std::collections::{HashMap, VecDeque};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

/// Substring docker prints to stderr when the control socket denies access.
const SOCKET_PERM_MSG: &str = "dial unix /var/run/docker.sock: permission denied";

/// User-facing message for the socket permission failure.
const SOCKET_PERM_HELP: &str = "Couldn't connect to the Docker daemon socket. \
Add yourself to the 'docker' group or fix permissions on /var/run/docker.sock, then retry.";

/// An external process exited non-zero, or its output could not be
/// interpreted in the expected shape.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct CommandError {
    /// Short description of what failed
    pub message: String,
    /// Raw combined stdout/stderr captured from the process
    pub output: String,
    /// Exit code reported by the process (-1 if terminated by a signal)
    pub code: i32,
}

impl CommandError {
    /// Create a new command error.
    pub fn new(message: impl Into<String>, output: impl Into<String>, code: i32) -> Self {
        Self {
            message: message.into(),
            output: output.into(),
            code,
        }
    }

    /// The process exited successfully but its output did not have the
    /// expected shape. `code` stays 0 here: it reports the real exit
    /// status, and the message carries the interpretation failure.
    pub fn interpretation(message: impl Into<String>, output: impl Into<String>) -> Self {
        Self::new(message, output, 0)
    }
}

/// Errors from running an external command.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The process ran but exited non-zero
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The process could not be spawned or its streams could not be read.
    /// `ErrorKind::NotFound` here means the engine binary itself is absent.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs external engine processes and captures their output.
///
/// Holds an environment overlay applied to every child process, so callers
/// can thread variables like `DOCKER_HOST` through without mutating the
/// parent environment.
#[derive(Debug, Clone, Default)]
pub struct CommandRunner {
    env: HashMap<String, String>,
    script: Option<Arc<Script>>,
}

/// Canned responses plus a log of the command lines asked for. Clones of
/// a scripted runner share the same script.
#[derive(Debug)]
struct Script {
    responses: Mutex<VecDeque<Result<String, CommandError>>>,
    invocations: Mutex<Vec<Vec<String>>>,
}

impl Script {
    fn respond(&self, program: &str, args: &[String]) -> Result<String, RunnerError> {
        let mut invocation = Vec::with_capacity(args.len() + 1);
        invocation.push(program.to_string());
        invocation.extend(args.iter().cloned());
        self.invocations.lock().unwrap().push(invocation);

        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(output)) => Ok(output),
            Some(Err(e)) => Err(e.into()),
            None => Err(CommandError::new(
                format!("no scripted response left for {} {}", program, args.join(" ")),
                "",
                -1,
            )
            .into()),
        }
    }
}

impl CommandRunner {
    /// Create a new runner with no environment overlay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a runner that answers every invocation from a fixed script
    /// instead of spawning processes, recording each command line it is
    /// asked to run. Lets tests drive a full lifecycle without an engine.
    pub fn scripted(responses: Vec<Result<String, CommandError>>) -> Self {
        Self {
            env: HashMap::new(),
            script: Some(Arc::new(Script {
                responses: Mutex::new(responses.into()),
                invocations: Mutex::new(Vec::new()),
            })),
        }
    }

    /// Command lines issued so far, program first. Always empty for a
    /// live runner.
    pub fn invocations(&self) -> Vec<Vec<String>> {
        match &self.script {
            Some(script) => script.invocations.lock().unwrap().clone(),
            None => Vec::new(),
        }
    }

    /// Add an environment variable applied to every child process.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Run a command, echoing each output line to the terminal as it
    /// arrives, and return the full combined stdout/stderr text.
    pub async fn run_live(&self, program: &str, args: &[String]) -> Result<String, RunnerError> {
        self.run(program, args, true).await
    }

    /// Run a command without echoing, returning combined stdout/stderr.
    pub async fn run_quiet(&self, program: &str, args: &[String]) -> Result<String, RunnerError> {
        self.run(program, args, false).await
    }

    async fn run(&self, program: &str, args: &[String], live: bool) -> Result<String, RunnerError> {
        debug!("Executing: {} {:?}", program, args);

        if let Some(script) = &self.script {
            return script.respond(program, args);
        }

        let mut child = Command::new(program)
            .args(args)
            .envs(&self.env)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("child stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("child stderr not captured"))?;

        let (out, err) = tokio::join!(capture_lines(stdout, live), capture_lines(stderr, live));
        let (out, err) = (out?, err?);

        let status = child.wait().await?;

        let mut output = out;
        if !err.is_empty() {
            if !output.is_empty() && !output.ends_with('\n') {
                output.push('\n');
            }
            output.push_str(&err);
        }

        if status.success() {
            Ok(output)
        } else {
            let code = status.code().unwrap_or(-1);
            Err(interpret_failure(program, args, output, code).into())
        }
    }
}

async fn capture_lines<R>(reader: R, live: bool) -> std::io::Result<String>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut captured = String::new();

    while let Some(line) = lines.next_line().await? {
        if live {
            println!("{}", line);
        }
        captured.push_str(&line);
        captured.push('\n');
    }

    Ok(captured)
}

/// Map a non-zero exit to a typed error. The docker socket permission
/// failure gets a distinguished user-facing message; everything else keeps
/// the generic shape with the raw output attached.
fn interpret_failure(program: &str, args: &[String], output: String, code: i32) -> CommandError {
    if output.contains(SOCKET_PERM_MSG) {
        CommandError::new(SOCKET_PERM_HELP, output, code)
    } else {
        CommandError::new(
            format!("{} {} exited with code {}", program, args.join(" "), code),
            output,
            code,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_quiet_captures_stdout() {
        let runner = CommandRunner::new();
        let output = runner
            .run_quiet("echo", &["hello".to_string()])
            .await
            .unwrap();
        assert!(output.contains("hello"));
    }

    #[tokio::test]
    async fn test_run_quiet_captures_stderr() {
        let runner = CommandRunner::new();
        let output = runner
            .run_quiet(
                "sh",
                &["-c".to_string(), "echo oops >&2".to_string()],
            )
            .await
            .unwrap();
        assert!(output.contains("oops"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_command_error() {
        let runner = CommandRunner::new();
        let err = runner
            .run_quiet("sh", &["-c".to_string(), "echo bad >&2; exit 3".to_string()])
            .await
            .unwrap_err();

        match err {
            RunnerError::Command(e) => {
                assert_eq!(e.code, 3);
                assert!(e.output.contains("bad"));
            }
            other => panic!("expected CommandError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_executable_is_io_error() {
        let runner = CommandRunner::new();
        let err = runner
            .run_quiet("definitely-not-a-real-binary-xyz", &[])
            .await
            .unwrap_err();

        match err {
            RunnerError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("expected Io error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_env_overlay_reaches_child() {
        let runner = CommandRunner::new().with_env("LOCALDOCK_TEST_VAR", "present");
        let output = runner
            .run_quiet(
                "sh",
                &["-c".to_string(), "echo $LOCALDOCK_TEST_VAR".to_string()],
            )
            .await
            .unwrap();
        assert!(output.contains("present"));
    }

    #[test]
    fn test_socket_permission_translation() {
        let raw = format!("some noise\n{}\n", SOCKET_PERM_MSG);
        let err = interpret_failure("docker", &["ps".to_string()], raw.clone(), 1);
        assert_eq!(err.message, SOCKET_PERM_HELP);
        assert_eq!(err.output, raw);
        assert_eq!(err.code, 1);
    }

    #[tokio::test]
    async fn test_scripted_runner_replays_and_records() {
        let runner = CommandRunner::scripted(vec![
            Ok("first\n".to_string()),
            Err(CommandError::new("boom", "raw", 1)),
        ]);

        let output = runner
            .run_quiet("docker", &["ps".to_string()])
            .await
            .unwrap();
        assert_eq!(output, "first\n");

        let err = runner.run_live("docker", &["rm".to_string()]).await.unwrap_err();
        match err {
            RunnerError::Command(e) => assert_eq!(e.code, 1),
            other => panic!("expected CommandError, got {:?}", other),
        }

        // shared script: a clone sees the same log
        assert_eq!(
            runner.clone().invocations(),
            vec![vec!["docker", "ps"], vec!["docker", "rm"]]
        );
    }

    #[tokio::test]
    async fn test_exhausted_script_fails() {
        let runner = CommandRunner::scripted(Vec::new());
        let err = runner.run_quiet("docker", &[]).await.unwrap_err();
        assert!(matches!(err, RunnerError::Command(_)));
    }

    #[test]
    fn test_interpretation_failure_reports_exit_zero() {
        let err = CommandError::interpretation("unexpected output", "garbage");
        assert_eq!(err.code, 0);
        assert_eq!(err.output, "garbage");
        assert!(err.message.contains("unexpected output"));
    }

    #[test]
    fn test_generic_failure_keeps_output() {
        let err = interpret_failure("docker", &["rm".to_string()], "no such container".into(), 1);
        assert!(err.message.contains("docker rm"));
        assert_eq!(err.output, "no such container");
    }
}
