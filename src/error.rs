//! Error types for the METAR map

use thiserror::Error;

use crate::parser::ParseFailure;

/// Main error type for the METAR map
#[derive(Error, Debug)]
pub enum MetarMapError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Transport errors talking to the weather dataserver
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Failure to parse a METAR document
    #[error("Parse error: {source}")]
    Parse {
        #[from]
        source: ParseFailure,
    },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// General application errors
    #[error("Application error: {message}")]
    General { message: String },
}

impl MetarMapError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new general error
    pub fn general<S: Into<String>>(message: S) -> Self {
        Self::General {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for MetarMapError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let config_err = MetarMapError::config("missing station map");
        assert!(matches!(config_err, MetarMapError::Config { .. }));

        let transport_err = MetarMapError::transport("connection refused");
        assert!(matches!(transport_err, MetarMapError::Transport { .. }));

        let validation_err = MetarMapError::validation("bad pixel index");
        assert!(matches!(validation_err, MetarMapError::Validation { .. }));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let map_err: MetarMapError = io_err.into();
        assert!(matches!(map_err, MetarMapError::Io { .. }));
    }

    #[test]
    fn test_parse_failure_conversion() {
        let map_err: MetarMapError = ParseFailure::MissingData.into();
        assert!(matches!(map_err, MetarMapError::Parse { .. }));
        assert!(map_err.to_string().contains("Parse error"));
    }
}
