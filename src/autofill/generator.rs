//! Text generator backed by an external command.

use std::fmt;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt as _;
use tokio::process::Command;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    #[error("Failed to run text generator: {0}")]
    Spawn(String),

    #[error("Text generator exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("Text generator timed out after {0:?}")]
    Timeout(Duration),

    #[error("Text generator returned unusable output: {0}")]
    InvalidOutput(String),
}

/// `generate(prompt) -> text` collaborator.
#[async_trait]
pub trait TextGenerator: Send + Sync + fmt::Debug {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError>;
}

/// Runs a configured command per prompt: the prompt is written to stdin and
/// the reply read from stdout.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    /// Executable
    program: String,
    /// Arguments passed as-is
    args: Vec<String>,
    /// Upper bound per invocation, spawn included
    timeout: Duration,
}

impl CommandGenerator {
    /// `None` when `command` is empty.
    #[must_use]
    pub fn new(command: &[String], timeout: Duration) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self { program: program.clone(), args: args.to_vec(), timeout })
    }

    /// Spawns the command and collects its reply.
    async fn run(&self, prompt: &str) -> Result<String, GenerateError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| GenerateError::Spawn(format!("{}: {e}", self.program)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(prompt.as_bytes()).await.map_err(|e| GenerateError::Spawn(e.to_string()))?;
            // stdin を閉じて EOF を送る
            drop(stdin);
        }

        let output = child.wait_with_output().await.map_err(|e| GenerateError::Spawn(e.to_string()))?;
        if !output.status.success() {
            return Err(GenerateError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout =
            String::from_utf8(output.stdout).map_err(|e| GenerateError::InvalidOutput(e.to_string()))?;
        clean_output(&stdout)
    }
}

#[async_trait]
impl TextGenerator for CommandGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        tracing::debug!(program = %self.program, prompt_len = prompt.len(), "Invoking text generator");
        tokio::time::timeout(self.timeout, self.run(prompt))
            .await
            .unwrap_or(Err(GenerateError::Timeout(self.timeout)))
    }
}

/// Trims the reply and strips a surrounding code fence.
fn clean_output(raw: &str) -> Result<String, GenerateError> {
    let mut text = raw.trim();
    if let Some(fenced) = text.strip_prefix("```") {
        // 言語タグの行を捨てる
        let body = fenced.split_once('\n').map_or("", |(_, body)| body);
        text = body.trim_end().strip_suffix("```").unwrap_or(body).trim();
    }

    if text.is_empty() {
        return Err(GenerateError::InvalidOutput("empty response".to_string()));
    }
    Ok(text.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use googletest::prelude::*;
    use rstest::rstest;

    use super::*;

    fn command(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| (*p).to_string()).collect()
    }

    #[rstest]
    #[case::plain("Save\n", "Save")]
    #[case::padded("  Save changes  ", "Save changes")]
    #[case::fenced("```\nSave\n```", "Save")]
    #[case::fenced_with_tag("```text\nSave\n```\n", "Save")]
    fn test_clean_output(#[case] raw: &str, #[case] expected: &str) {
        assert_that!(clean_output(raw), ok(eq(expected)));
    }

    #[rstest]
    #[case::empty("")]
    #[case::blank("  \n ")]
    #[case::empty_fence("```\n```")]
    fn test_clean_output_rejects_empty(#[case] raw: &str) {
        assert!(matches!(clean_output(raw), Err(GenerateError::InvalidOutput(_))));
    }

    #[test]
    fn test_empty_command_is_disabled() {
        assert!(CommandGenerator::new(&[], Duration::from_secs(1)).is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_prompt_is_sent_on_stdin() {
        let generator = CommandGenerator::new(&command(&["cat"]), Duration::from_secs(5)).unwrap();

        let reply = generator.generate("Cancel\n").await;

        assert_that!(reply, ok(eq("Cancel")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_failure() {
        let generator = CommandGenerator::new(
            &command(&["sh", "-c", "cat > /dev/null; echo quota exceeded >&2; exit 3"]),
            Duration::from_secs(5),
        )
        .unwrap();

        let reply = generator.generate("Cancel").await;

        assert!(matches!(
            &reply,
            Err(GenerateError::Failed { stderr, .. }) if stderr == "quota exceeded"
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_command_times_out() {
        let generator =
            CommandGenerator::new(&command(&["sleep", "5"]), Duration::from_millis(100)).unwrap();

        let reply = generator.generate("Cancel").await;

        assert_eq!(reply, Err(GenerateError::Timeout(Duration::from_millis(100))));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let generator =
            CommandGenerator::new(&command(&["layered-i18n-no-such-program"]), Duration::from_secs(5))
                .unwrap();

        let reply = generator.generate("Cancel").await;

        assert!(matches!(reply, Err(GenerateError::Spawn(_))));
    }
}
