use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LocalCiError {
    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid pipeline definition {}: {reason}", path.display())]
    Schema { path: PathBuf, reason: String },

    #[error("Invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Hook failed [{hook}] event={event}: {message}")]
    Hook {
        hook: String,
        event: String,
        message: String,
    },

    #[error("Command failed in {stage}/{job} (exit code {code}): {command}")]
    CommandFailure {
        stage: String,
        job: String,
        command: String,
        code: i32,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LocalCiError {
    /// Process exit code for this failure.
    ///
    /// A failed command propagates its own exit code; every other failure
    /// kind exits with `1`.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::CommandFailure { code, .. } if *code != 0 => *code,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, LocalCiError>;
