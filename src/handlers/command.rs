//! Subprocess handler: envelope JSON on stdin, response on stdout.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::handler::{Handler, HandlerError, Result};
use crate::protocol::Envelope;

pub struct CommandHandler {
    program: PathBuf,
    args: Vec<String>,
    name: String,
}

impl CommandHandler {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let name = program.display().to_string();
        Self {
            program,
            args: Vec::new(),
            name,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

#[async_trait]
impl Handler for CommandHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, envelope: &Envelope) -> Result<String> {
        let input = serde_json::to_vec(envelope)?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // The dispatcher drops this future on timeout; the child goes with it.
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;

        // Feed stdin from a separate task so a handler that writes before
        // reading cannot deadlock against us.
        if let Some(mut stdin) = child.stdin.take() {
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&input).await {
                    tracing::debug!("Handler did not consume stdin: {}", e);
                }
            });
        }

        let output = child.wait_with_output().await?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(HandlerError::Exit {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}
