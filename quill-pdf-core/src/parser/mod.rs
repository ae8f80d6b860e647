//! PDF Parser
//!
//! Reads the PDF file grammar of ISO 32000-1 into the typed object graph:
//! tokenizer, object grammar, cross-reference resolution (classic tables,
//! cross-reference streams, incremental updates, brute-force recovery),
//! compressed object containers, content-stream operators, and the document
//! loader that ties them together.

pub mod content;
pub mod context;
pub mod header;
pub mod lexer;
pub mod loader;
pub mod object_stream;
pub mod objects;
pub mod recovery;
pub mod trailer;
pub mod xref;
pub mod xref_stream;

pub use self::content::{ContentOperator, ContentParser};
pub use self::context::ParseContext;
pub use self::header::PdfVersion;
pub use self::lexer::{Lexer, Token};
pub use self::trailer::Trailer;
pub use self::xref::{XRefEntry, XRefTable};

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;

/// PDF Parser errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed token at byte {position}: {message}")]
    LexError { position: u64, message: String },

    #[error("Syntax error at byte {position}: {message}")]
    SyntaxError { position: u64, message: String },

    #[error("Unexpected token: expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },

    #[error("Missing required key: /{0}")]
    MissingKey(String),

    #[error("Invalid PDF header")]
    InvalidHeader,

    #[error("Empty file")]
    EmptyFile,

    #[error("Invalid cross-reference table")]
    InvalidXRef,

    #[error("Invalid trailer")]
    InvalidTrailer,

    #[error("Maximum recursion depth exceeded ({0})")]
    MaxDepthExceeded(usize),

    #[error("Stream filter error: {0}")]
    Filter(#[from] crate::filters::FilterError),

    #[error("Parse cancelled by event listener")]
    Cancelled,
}

/// Knobs for how forgiving the read pipeline is with real-world files.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Repair sloppy syntax (wrong `/Length`, missing keywords, unknown
    /// filters pass through raw) instead of propagating errors.
    pub lenient: bool,
    /// Cap on grammar recursion depth.
    pub max_depth: usize,
}

impl ParseOptions {
    /// Tolerant settings, the default: matches the format's expectation that
    /// readers accept slightly malformed files.
    pub fn lenient() -> Self {
        Self { lenient: true, max_depth: context::MAX_RECURSION_DEPTH }
    }

    /// Propagate every leaf error.
    pub fn strict() -> Self {
        Self { lenient: false, max_depth: context::MAX_RECURSION_DEPTH }
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::lenient()
    }
}
