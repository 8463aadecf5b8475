//! Typed error hierarchy for the pipeline.
//!
//! Two enums cover the failures that must reach the caller:
//! - `ParseError`: design-stage output that is not `key=value` text
//! - `PipelineError`: hard failures of a pipeline run
//!
//! Infrastructural I/O around the artifact cache (workspace creation,
//! template writes, artifact reads) is logged and degraded instead, so it
//! has no variant here.

use thiserror::Error;

use crate::workspace::Stage;

/// Errors from parsing `key=value` tool output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line_number} has no '=' separator: {line:?}")]
    MissingSeparator { line_number: usize, line: String },
}

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to launch {stage} command `{command}`: {source}")]
    ToolLaunch {
        stage: Stage,
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} exited with {}: {}", describe_exit(.code), .stderr.trim())]
    ToolFailed {
        stage: Stage,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{stage} produced unparseable output: {source}")]
    Parse {
        stage: Stage,
        #[source]
        source: ParseError,
    },

    #[error("Invalid identity '{0}': expected 32 lowercase hex characters")]
    InvalidIdentity(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}
