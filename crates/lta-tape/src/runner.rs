//! Subprocess execution for tape commands.

use std::process::Stdio;

use async_trait::async_trait;
use lta_core::{CommandOutput, CommandRunner, LtaError, LtaResult, TapeCommand};
use tokio::process::Command;
use tracing::debug;

/// Runs tape commands as child processes and waits for them to exit.
///
/// Tape operations can legitimately take hours, so no timeout is applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &TapeCommand) -> LtaResult<CommandOutput> {
        debug!(command = %command, "running tape command");
        let output = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| LtaError::CommandSpawn {
                program: command.program.clone(),
                source,
            })?;

        let result = CommandOutput {
            returncode: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(
            command = command.label,
            returncode = ?result.returncode,
            "tape command finished"
        );
        Ok(result)
    }
}
