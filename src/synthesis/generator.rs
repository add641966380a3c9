//! Text-generation capability consumed by the synthesizer
//!
//! The engine only needs `generate(prompt) -> text`. Two implementations:
//! - `SubprocessGenerator`: pipes the prompt to an external command (production)
//! - `MockGenerator`: returns queued responses and records prompts (testing)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Errors from text-generation calls.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("text generation not available: {0}")]
    Unavailable(String),
    #[error("generation failed: {0}")]
    Failed(String),
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
}

/// Result type for text generation
pub type GenerationResult<T> = Result<T, GenerationError>;

/// Something that turns a prompt into a completion.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> GenerationResult<String>;
}

/// External command used as the text generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorCommand {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Kill the command after this many seconds; no limit when absent
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Runs a command, writes the prompt to its stdin, returns its stdout.
pub struct SubprocessGenerator {
    invocation: GeneratorCommand,
}

impl SubprocessGenerator {
    pub fn new(invocation: GeneratorCommand) -> Self {
        Self { invocation }
    }

    async fn run(&self, prompt: &str) -> GenerationResult<String> {
        let mut child = Command::new(&self.invocation.command)
            .args(&self.invocation.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                GenerationError::Unavailable(format!(
                    "failed to start '{}': {}",
                    self.invocation.command, e
                ))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| GenerationError::Unavailable("no stdin available".to_string()))?;
        stdin
            .write_all(prompt.as_bytes())
            .await
            .map_err(|e| GenerationError::Failed(format!("failed to write prompt: {}", e)))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| GenerationError::Failed(format!("failed to read output: {}", e)))?;

        if !output.status.success() {
            return Err(GenerationError::Failed(format!(
                "'{}' exited with {}: {}",
                self.invocation.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| GenerationError::Failed(format!("output is not UTF-8: {}", e)))
    }
}

#[async_trait]
impl TextGenerator for SubprocessGenerator {
    async fn generate(&self, prompt: &str) -> GenerationResult<String> {
        debug!(command = %self.invocation.command, prompt_len = prompt.len(), "invoking generator");
        match self.invocation.timeout_secs {
            Some(secs) => {
                let limit = Duration::from_secs(secs);
                timeout(limit, self.run(prompt))
                    .await
                    .map_err(|_| GenerationError::Timeout(limit))?
            }
            None => self.run(prompt).await,
        }
    }
}

/// Mock generator for testing: replays queued responses in order.
///
/// Once the queue is empty every call fails, so tests can tell how many
/// calls they expected.
#[derive(Default)]
pub struct MockGenerator {
    responses: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful completion.
    pub fn with_response(self, text: impl Into<String>) -> Self {
        lock(&self.responses).push_back(Ok(text.into()));
        self
    }

    /// Queue a failed call.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        lock(&self.responses).push_back(Err(message.into()));
        self
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, prompt: &str) -> GenerationResult<String> {
        lock(&self.prompts).push(prompt.to_string());
        match lock(&self.responses).pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(GenerationError::Failed(message)),
            None => Err(GenerationError::Unavailable(
                "mock generator has no queued response".to_string(),
            )),
        }
    }
}
