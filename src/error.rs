//! Error types for the CSV → PDF pipeline.

use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::engine::EngineError;
use crate::template::Placeholder;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The engine interaction that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStep {
    Launch,
    Navigate,
    ArmListener,
    FrameLookup,
    InjectContent,
    Capture,
}

impl fmt::Display for RenderStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RenderStep::Launch => "engine launch",
            RenderStep::Navigate => "navigation",
            RenderStep::ArmListener => "load listener registration",
            RenderStep::FrameLookup => "frame lookup",
            RenderStep::InjectContent => "content injection",
            RenderStep::Capture => "PDF capture",
        };
        f.write_str(name)
    }
}

/// Errors that can abort a pipeline run.
#[derive(Error, Debug)]
pub enum Error {
    /// The row source could not parse a record.
    #[error("malformed row at line {line}: {message}")]
    MalformedRow { line: u64, message: String },

    /// A template placeholder is absent (strict composition only).
    #[error("template is missing placeholder {0}")]
    MissingPlaceholder(Placeholder),

    /// The rendering engine reported a failure.
    #[error("rendering engine failed during {step}: {source}")]
    RenderEngine {
        step: RenderStep,
        #[source]
        source: EngineError,
    },

    /// The engine never confirmed the document load.
    #[error("document load did not complete within {0:?}")]
    RenderTimeout(Duration),

    /// The caller aborted the render.
    #[error("render cancelled")]
    Cancelled,

    /// Invalid configuration value or file.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error when reading inputs or writing the PDF.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn engine(step: RenderStep, source: EngineError) -> Self {
        Error::RenderEngine { step, source }
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        let rendered = err.to_string();
        match err.into_kind() {
            csv::ErrorKind::Io(io_err) => Error::Io(io_err),
            csv::ErrorKind::UnequalLengths {
                expected_len, len, ..
            } => Error::MalformedRow {
                line,
                message: format!("wrong number of fields: expected {expected_len}, got {len}"),
            },
            _ => Error::MalformedRow {
                line,
                message: rendered,
            },
        }
    }
}
