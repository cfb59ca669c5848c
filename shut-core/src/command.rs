//! Task action that runs a shell command.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{anyhow, Context};
use indexmap::IndexMap;
use tracing::debug;

use crate::task::{ActionContext, Outcome, TaskAction};

const OUTPUT_TAIL_LINES: usize = 40;

/// Runs `sh -c <command>` in a working directory.
///
/// A non-zero exit status fails the task. The tail of the command's output (stdout, then stderr)
/// becomes the failure message, with the exit status as its cause.
#[derive(Debug, Clone)]
pub struct CommandAction {
    command: String,
    cwd: PathBuf,
    env: IndexMap<String, String>,
    skip_if_missing: Option<PathBuf>,
}

impl CommandAction {
    pub fn new(command: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            cwd: cwd.into(),
            env: IndexMap::new(),
            skip_if_missing: None,
        }
    }

    pub fn with_env(mut self, env: IndexMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Skips the task when `path` (relative to the working directory) does not exist.
    pub fn skip_if_missing(mut self, path: impl Into<PathBuf>) -> Self {
        self.skip_if_missing = Some(path.into());
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn run_command(&self, ctx: &ActionContext<'_>) -> anyhow::Result<()> {
        debug!(id = ctx.id, command = %self.command, cwd = %self.cwd.display(), "spawning command");

        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .current_dir(&self.cwd)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("failed to execute `{}`", self.command))?;

        if output.status.success() {
            if let Some(tail) = output_tail(&output.stdout, &output.stderr) {
                debug!(id = ctx.id, "command output:\n{}", tail);
            }
            return Ok(());
        }

        let status = match output.status.code() {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };
        let error = anyhow!("`{}` failed with {}", self.command, status);
        match output_tail(&output.stdout, &output.stderr) {
            Some(tail) => Err(error.context(tail)),
            None => Err(error),
        }
    }
}

/// Last [`OUTPUT_TAIL_LINES`] lines of the command's stdout followed by its stderr, if any.
fn output_tail(stdout: &[u8], stderr: &[u8]) -> Option<String> {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = [stdout.trim(), stderr.trim()]
        .into_iter()
        .filter(|stream| !stream.is_empty())
        .flat_map(str::lines)
        .collect();
    if lines.is_empty() {
        return None;
    }

    let skip = lines.len().saturating_sub(OUTPUT_TAIL_LINES);
    Some(lines[skip..].join("\n"))
}

impl TaskAction for CommandAction {
    fn run(&mut self, ctx: &ActionContext<'_>) -> Outcome {
        if let Some(path) = &self.skip_if_missing {
            if !self.cwd.join(path).exists() {
                debug!(id = ctx.id, path = %path.display(), "required path missing, skipping");
                return Outcome::Skipped;
            }
        }
        self.run_command(ctx).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ctx() -> ActionContext<'static> {
        ActionContext {
            id: "group:task",
            name: "task",
        }
    }

    #[test]
    fn test_successful_command() {
        let dir = TempDir::new().unwrap();
        let mut action = CommandAction::new("touch marker", dir.path());
        assert!(matches!(action.run(&ctx()), Outcome::Completed));
        assert!(dir.path().join("marker").exists());
    }

    #[test]
    fn test_failing_command_reports_stderr() {
        let dir = TempDir::new().unwrap();
        let mut action = CommandAction::new("echo broken >&2; exit 3", dir.path());
        match action.run(&ctx()) {
            Outcome::Failed(err) => {
                assert_eq!(err.to_string(), "broken");
                assert!(format!("{:#}", err).contains("exit code 3"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_failing_command_reports_stdout() {
        let dir = TempDir::new().unwrap();
        let mut action = CommandAction::new(
            "echo 'running 3 tests'; echo 'assertion failed at foo.rs:3'; exit 101",
            dir.path(),
        );
        match action.run(&ctx()) {
            Outcome::Failed(err) => {
                let message = format!("{:#}", err);
                assert!(message.contains("assertion failed at foo.rs:3"));
                assert!(message.contains("running 3 tests"));
                assert!(message.contains("exit code 101"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_output_tail_keeps_last_lines() {
        let stdout: String = (0..100).map(|i| format!("line {}\n", i)).collect();
        let tail = output_tail(stdout.as_bytes(), b"oops\n").unwrap();
        let lines: Vec<&str> = tail.lines().collect();
        assert_eq!(lines.len(), OUTPUT_TAIL_LINES);
        assert_eq!(lines.last(), Some(&"oops"));
        assert_eq!(lines[0], "line 61");
        assert!(output_tail(b"  \n", b"").is_none());
    }

    #[test]
    fn test_env_is_passed() {
        let dir = TempDir::new().unwrap();
        let mut env = IndexMap::new();
        env.insert("SHUT_TEST_VALUE".to_string(), "42".to_string());
        let mut action =
            CommandAction::new("test \"$SHUT_TEST_VALUE\" = 42", dir.path()).with_env(env);
        assert!(matches!(action.run(&ctx()), Outcome::Completed));
    }

    #[test]
    fn test_skip_if_missing() {
        let dir = TempDir::new().unwrap();
        let mut action = CommandAction::new("exit 1", dir.path()).skip_if_missing("e2e.sh");
        assert!(matches!(action.run(&ctx()), Outcome::Skipped));
    }
}
