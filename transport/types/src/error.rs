/*!
    Error types for the timeline transport crates.
*/

use thiserror::Error;

/**
    Error type for vocabulary-level failures: parsing rates and
    interpreting decoded audio.
*/
#[derive(Debug, Error)]
pub enum Error {
    /// Rational value could not be parsed or is out of range
    #[error("invalid rate: {message}")]
    InvalidRate { message: String },
    /// Frame data does not match its declared layout
    #[error("invalid frame data: {message}")]
    InvalidData { message: String },
    /// Sample format or layout the engine cannot consume
    #[error("unsupported format: {message}")]
    UnsupportedFormat { message: String },
}

impl Error {
    /**
        Create an invalid rate error with the given message.
    */
    pub fn invalid_rate(message: impl Into<String>) -> Self {
        Self::InvalidRate {
            message: message.into(),
        }
    }

    /**
        Create an invalid data error with the given message.
    */
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /**
        Create an unsupported format error with the given message.
    */
    pub fn unsupported_format(message: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            message: message.into(),
        }
    }
}

/**
    Result type alias for the timeline transport crates.
*/
pub type Result<T> = std::result::Result<T, Error>;
