use crate::filters::FilterError;
use crate::parser::ParseError;
use crate::writer::WriteError;
use thiserror::Error;

/// Umbrella error for the crate's top-level entry points.
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(ParseError),

    #[error("Stream filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    #[error("Operation cancelled by event listener")]
    Cancelled,
}

impl From<ParseError> for PdfError {
    fn from(err: ParseError) -> Self {
        match err {
            // Listener-requested termination is not a malformed file
            ParseError::Cancelled => PdfError::Cancelled,
            other => PdfError::Parse(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, PdfError>;
