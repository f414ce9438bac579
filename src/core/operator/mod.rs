//! Command execution and logging seam.
//!
//! Tools receive an [`Operator`] at construction and use it for every
//! external command they run and every message they log, so tests can swap
//! in a scripted implementation.

use crate::core::logging::{LogLevel, Logger};
use std::fmt;
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OperatorError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// A program and its arguments, run without a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ShellCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Exit code and captured text of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub returncode: i32,
    pub out: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.returncode == 0
    }
}

pub trait Operator: Send + Sync {
    /// Runs `command` to completion. A non-zero exit code is returned as a
    /// normal [`CommandOutput`]; only a failure to start the process is an
    /// error.
    fn run(&self, command: &ShellCommand) -> Result<CommandOutput, OperatorError>;

    /// `critical` marks failures, `verbose = false` keeps the message off the
    /// default console level.
    fn log(&self, message: &str, metadata: Option<serde_json::Value>, critical: bool, verbose: bool);
}

/// Runs commands on the local system and logs through a [`Logger`].
pub struct SystemOperator {
    logger: Logger,
    module: String,
}

impl SystemOperator {
    pub fn new(logger: Logger, module: &str) -> Self {
        Self {
            logger,
            module: module.to_string(),
        }
    }
}

impl Operator for SystemOperator {
    fn run(&self, command: &ShellCommand) -> Result<CommandOutput, OperatorError> {
        self.log(&format!("running: {}", command), None, false, false);

        let output = Command::new(&command.program)
            .args(&command.args)
            .output()
            .map_err(|source| OperatorError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let mut out = String::from_utf8_lossy(&output.stdout).into_owned();
        out.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutput {
            // killed by a signal
            returncode: output.status.code().unwrap_or(-1),
            out,
        })
    }

    fn log(&self, message: &str, metadata: Option<serde_json::Value>, critical: bool, verbose: bool) {
        let level = if critical {
            LogLevel::Error
        } else if !verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        };
        self.logger.log(level, &self.module, message, metadata);
    }
}
