use std::io;

use serde::{Deserialize, Serialize};

/// Faults that abort a whole request before any per-case result is produced
#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    #[error("Language not supported: {0}")]
    UnsupportedLanguage(String),

    #[error("Problem {0} not found")]
    ProblemNotFound(u32),

    #[error("Failed to prepare workspace: {0}")]
    Workspace(#[source] io::Error),

    #[error("Failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Classification of a non-passing test case (or of a request aborted by compilation)
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    CompileError,
    RuntimeError,
    Timeout,
    EmptyOutput,
    OutputMismatch,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CompileError => "Compilation Error",
            Self::RuntimeError => "Runtime Error",
            Self::Timeout => "Timeout",
            Self::EmptyOutput => "Empty Output",
            Self::OutputMismatch => "Wrong Answer",
        }
    }
}
