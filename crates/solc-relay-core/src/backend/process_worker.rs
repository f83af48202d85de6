//! Worker hosted in a child process.
//!
//! Commands are written to the child's stdin and notifications read from its
//! stdout, one JSON message per line. The child is killed once the command
//! channel closes.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::protocol::{WorkerCommand, WorkerMessage};
use super::worker::{WorkerChannels, WorkerSpawner};
use crate::error::{BackendError, BackendResult};

/// Spawns `program args...` as a worker process.
#[derive(Debug, Clone)]
pub struct ProcessWorker {
    program: String,
    args: Vec<String>,
}

impl ProcessWorker {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a whitespace-separated command line into program and args.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }
}

impl WorkerSpawner for ProcessWorker {
    fn spawn(&self) -> BackendResult<WorkerChannels> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BackendError::Spawn(format!("{}: {e}", self.program)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BackendError::Spawn("worker stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BackendError::Spawn("worker stdout unavailable".to_string()))?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        tokio::spawn(write_commands(child, stdin, cmd_rx));
        tokio::spawn(read_messages(stdout, msg_tx));

        debug!(program = %self.program, "worker process started");
        Ok(WorkerChannels {
            commands: cmd_tx,
            messages: msg_rx,
        })
    }
}

async fn write_commands(
    mut child: Child,
    mut stdin: ChildStdin,
    mut commands: mpsc::UnboundedReceiver<WorkerCommand>,
) {
    while let Some(command) = commands.recv().await {
        let mut line = match serde_json::to_string(&command) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "cannot encode worker command");
                continue;
            }
        };
        line.push('\n');
        if let Err(e) = stdin.write_all(line.as_bytes()).await {
            warn!(error = %e, "worker stdin closed");
            break;
        }
        if let Err(e) = stdin.flush().await {
            warn!(error = %e, "worker stdin closed");
            break;
        }
    }
    drop(stdin);
    if let Err(e) = child.kill().await {
        debug!(error = %e, "worker process already gone");
    }
}

async fn read_messages(stdout: ChildStdout, messages: mpsc::UnboundedSender<WorkerMessage>) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        let message = match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => serde_json::from_str(&line).unwrap_or_else(|e| {
                WorkerMessage::Error {
                    data: format!("invalid message from worker: {e}"),
                }
            }),
            Ok(None) => break,
            Err(e) => WorkerMessage::Error {
                data: format!("cannot read worker output: {e}"),
            },
        };
        let fatal = matches!(&message, WorkerMessage::Error { data } if data.starts_with("cannot read"));
        if messages.send(message).is_err() || fatal {
            break;
        }
    }
    debug!("worker output closed");
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str) -> ProcessWorker {
        ProcessWorker::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    #[test]
    fn parses_command_line() {
        let worker = ProcessWorker::from_command_line("node  worker.js --quiet").unwrap();
        assert_eq!(worker.program, "node");
        assert_eq!(worker.args, vec!["worker.js", "--quiet"]);
        assert!(ProcessWorker::from_command_line("   ").is_none());
    }

    #[tokio::test]
    async fn exchanges_line_delimited_json() {
        let worker = shell(
            r#"while read line; do echo '{"cmd":"versionLoaded","data":"0.4.11","acceptsMultipleFiles":true}'; done"#,
        );
        let mut ch = worker.spawn().unwrap();
        ch.commands
            .send(WorkerCommand::LoadVersion {
                data: "soljson.js".to_string(),
            })
            .unwrap();
        assert_eq!(
            ch.messages.recv().await.unwrap(),
            WorkerMessage::VersionLoaded {
                data: "0.4.11".to_string(),
                accepts_multiple_files: true
            }
        );
    }

    #[tokio::test]
    async fn garbage_output_becomes_error_message() {
        let mut ch = shell("echo 'this is not json'").spawn().unwrap();
        match ch.messages.recv().await.unwrap() {
            WorkerMessage::Error { data } => assert!(data.contains("invalid message from worker")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(ch.messages.recv().await.is_none());
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let worker = ProcessWorker::new("/nonexistent/solc-worker", vec![]);
        assert!(matches!(worker.spawn(), Err(BackendError::Spawn(_))));
    }
}
