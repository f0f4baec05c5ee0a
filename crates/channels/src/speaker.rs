//! Text-to-speech through an external program.
//!
//! The configured command is run with its arguments followed by the reply
//! text. Synthesis and playback are entirely the program's business.

use async_trait::async_trait;
use nami_config::VoiceConfig;
use nami_core::error::SinkError;
use nami_core::sink::Speaker;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CommandSpeaker {
    program: String,
    args: Vec<String>,
}

impl CommandSpeaker {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build a speaker from config; `None` when no command is set.
    pub fn from_config(config: &VoiceConfig) -> Option<Self> {
        config
            .command
            .as_ref()
            .filter(|c| !c.trim().is_empty())
            .map(|c| Self::new(c.clone(), config.args.clone()))
    }
}

#[async_trait]
impl Speaker for CommandSpeaker {
    async fn speak(&self, text: &str) -> Result<(), SinkError> {
        debug!(program = %self.program, chars = text.len(), "Speaking reply");

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .await
            .map_err(|e| SinkError::DeliveryFailed {
                sink: "tts".into(),
                reason: e.to_string(),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(SinkError::DeliveryFailed {
                sink: "tts".into(),
                reason: format!("{} exited with {status}", self.program),
            })
        }
    }
}
