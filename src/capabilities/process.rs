//! Shared subprocess envelope for tool-backed capabilities.
//!
//! Every external tool runs through [`ToolCommand`]: proxy environment
//! merged in unconditionally, optional stdin feed, stdout streamed line by
//! line so partial output reaches the collector as it is produced, stderr
//! tail kept for diagnostics, and `kill_on_drop` so a cancelled invocation
//! reaps its child.

use std::collections::BTreeMap;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::errors::CapabilityError;

/// Longest stderr tail kept for a failure diagnostic.
const STDERR_TAIL: usize = 2048;

pub struct ToolCommand {
    program: String,
    args: Vec<String>,
    envs: BTreeMap<String, String>,
    stdin_lines: Option<Vec<String>>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> ToolCommand {
        ToolCommand {
            program: program.into(),
            args: Vec::new(),
            envs: BTreeMap::new(),
            stdin_lines: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> ToolCommand {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> ToolCommand
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Extra environment for the child. The runner's proxy environment
    /// goes through here for every spawned tool.
    pub fn envs(mut self, envs: &BTreeMap<String, String>) -> ToolCommand {
        self.envs
            .extend(envs.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> ToolCommand {
        self.envs.insert(key.into(), value.into());
        self
    }

    /// Feed these lines to the child's stdin, then close it.
    pub fn stdin_lines(mut self, lines: Vec<String>) -> ToolCommand {
        self.stdin_lines = Some(lines);
        self
    }

    /// Run the tool, invoking `on_line` for each stdout line as it
    /// arrives. Returns once the child exits; non-zero exit is an error
    /// carrying the stderr tail.
    pub async fn stream_lines<F>(self, mut on_line: F) -> Result<(), CapabilityError>
    where
        F: FnMut(String),
    {
        let ToolCommand {
            program,
            args,
            envs,
            stdin_lines,
        } = self;

        let mut command = Command::new(&program);
        command
            .args(&args)
            .envs(&envs)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if stdin_lines.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CapabilityError::ToolNotFound {
                    tool: program.clone(),
                }
            } else {
                CapabilityError::Io(e)
            }
        })?;

        // Feed stdin concurrently with the stdout read so a large input
        // cannot deadlock against a full pipe.
        if let Some(lines) = stdin_lines {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| CapabilityError::other("child stdin unavailable"))?;
            tokio::spawn(async move {
                for line in lines {
                    if stdin.write_all(line.as_bytes()).await.is_err() {
                        break;
                    }
                    if stdin.write_all(b"\n").await.is_err() {
                        break;
                    }
                }
                // Dropping stdin closes the pipe.
            });
        }

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| CapabilityError::other("child stderr unavailable"))?;
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let mut reader = BufReader::new(stderr);
            let _ = reader.read_to_string(&mut buf).await;
            buf
        });

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CapabilityError::other("child stdout unavailable"))?;
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim().to_string();
            if !line.is_empty() {
                on_line(line);
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            let stderr = stderr_task.await.unwrap_or_default();
            let tail = if stderr.len() > STDERR_TAIL {
                stderr[stderr.len() - STDERR_TAIL..].to_string()
            } else {
                stderr
            };
            return Err(CapabilityError::ToolFailed {
                tool: program,
                code: status.code(),
                stderr: tail.trim().to_string(),
            });
        }
        Ok(())
    }
}
