use std::path::PathBuf;

use thiserror::Error;

/// Failures while loading a servers/config CSV file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse CSV in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("invalid format at line {line}: {message}")]
    Format { line: usize, message: String },
}

impl ConfigError {
    pub(crate) fn format(line: usize, message: impl Into<String>) -> Self {
        ConfigError::Format {
            line,
            message: message.into(),
        }
    }

    /// 1-based line number for format errors.
    pub fn line(&self) -> Option<usize> {
        match self {
            ConfigError::Format { line, .. } => Some(*line),
            _ => None,
        }
    }
}
