//! Line sources: stdin and external producer processes.
//!
//! Every source is pumped by its own task into one merged receiver of
//! `(origin, line)` pairs, so the router sees a single stream no matter how
//! many hearing, vision, or chat bridges are running.

use std::process::Stdio;

use nami_config::{ProducerConfig, ProducerKind};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Origin name used for lines typed into the terminal.
pub const CONSOLE_ORIGIN: &str = "console";

/// One line of text and the source that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub origin: String,
    /// Line format of the producer; `None` for the console
    pub kind: Option<ProducerKind>,
    pub text: String,
}

/// Forward every non-empty line of `reader` into `tx` until EOF, a read
/// error, or the receiver going away.
pub fn pump_lines<R>(
    reader: R,
    origin: impl Into<String>,
    kind: Option<ProducerKind>,
    tx: mpsc::Sender<SourceLine>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let origin = origin.into();
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let text = line.trim();
                    if text.is_empty() {
                        continue;
                    }
                    let msg = SourceLine {
                        origin: origin.clone(),
                        kind,
                        text: text.to_string(),
                    };
                    if tx.send(msg).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    debug!(origin = %origin, "Line source reached EOF");
                    break;
                }
                Err(e) => {
                    warn!(origin = %origin, error = %e, "Line source failed");
                    break;
                }
            }
        }
    })
}

/// Manages stdin and every configured producer process.
pub struct LineSources {
    producers: Vec<ProducerConfig>,
    read_stdin: bool,
    children: Vec<(String, Child)>,
}

impl LineSources {
    pub fn new(producers: Vec<ProducerConfig>) -> Self {
        Self {
            producers,
            read_stdin: true,
            children: Vec::new(),
        }
    }

    pub fn without_stdin(mut self) -> Self {
        self.read_stdin = false;
        self
    }

    /// Names of the configured producers.
    pub fn list(&self) -> Vec<&str> {
        self.producers.iter().map(|p| p.name.as_str()).collect()
    }

    /// Spawn every producer and merge all lines into one receiver.
    ///
    /// A producer that fails to spawn is logged and skipped; the others
    /// still start.
    pub fn start_all(&mut self) -> mpsc::Receiver<SourceLine> {
        let (tx, rx) = mpsc::channel(256);

        if self.read_stdin {
            pump_lines(tokio::io::stdin(), CONSOLE_ORIGIN, None, tx.clone());
        }

        for producer in &self.producers {
            match spawn_producer(producer) {
                Ok(mut child) => {
                    if let Some(stdout) = child.stdout.take() {
                        pump_lines(stdout, producer.name.clone(), Some(producer.kind), tx.clone());
                    }
                    info!(producer = %producer.name, command = %producer.command, "Started producer");
                    self.children.push((producer.name.clone(), child));
                }
                Err(e) => {
                    warn!(producer = %producer.name, error = %e, "Failed to start producer");
                }
            }
        }

        rx
    }

    /// Number of producer processes currently owned.
    pub fn running(&self) -> usize {
        self.children.len()
    }

    /// Kill every producer process.
    pub async fn stop_all(&mut self) {
        for (name, mut child) in self.children.drain(..) {
            if let Err(e) = child.kill().await {
                warn!(producer = %name, error = %e, "Failed to stop producer");
            } else {
                info!(producer = %name, "Stopped producer");
            }
        }
    }
}

fn spawn_producer(producer: &ProducerConfig) -> std::io::Result<Child> {
    Command::new(&producer.command)
        .args(&producer.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
}
