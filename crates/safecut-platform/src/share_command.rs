//! External program acting as the native share sheet.
//!
//! The payload is written to the program's stdin as three lines: title,
//! text, URL. Exit status 0 means the share completed; any other status
//! means the user dismissed the sheet. Failing to launch is an error.

use safecut_core::{NativeShare, ShareCompletion, ShareError, SharePayload};
use std::io::Write;
use std::process::{Child, Command, Stdio};

#[derive(Debug, Clone)]
pub struct CommandShare {
    program: String,
    args: Vec<String>,
}

impl CommandShare {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parse a whitespace-separated command line, e.g. `"termux-share -a send"`.
    ///
    /// Returns `None` for an empty line.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl NativeShare for CommandShare {
    fn share(&mut self, payload: &SharePayload) -> Result<ShareCompletion, ShareError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| ShareError::Failed(format!("cannot launch {}: {e}", self.program)))?;

        if let Some(mut stdin) = child.stdin.take() {
            let body = format!("{}\n{}\n{}\n", payload.title, payload.text, payload.url);
            if let Err(e) = stdin.write_all(body.as_bytes()) {
                // The program may exit without reading its input.
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    reap(&mut child);
                    return Err(ShareError::Io(e));
                }
            }
        }

        let status = child.wait()?;
        tracing::debug!(program = %self.program, ?status, "share command exited");
        if status.success() {
            Ok(ShareCompletion::Completed)
        } else {
            Ok(ShareCompletion::Cancelled)
        }
    }
}

/// Kill an abandoned share program and collect its exit status.
fn reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        tracing::debug!(error = %e, "share command already exited");
    }
    if let Err(e) = child.wait() {
        tracing::warn!(error = %e, "failed to reap share command");
    }
}
