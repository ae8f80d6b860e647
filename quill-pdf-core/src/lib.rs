//! # quill-pdf
//!
//! A pure Rust PDF object pipeline: parse PDF bytes into a typed,
//! self-referential object graph, and serialize such graphs back into valid
//! PDF bytes.
//!
//! ## Features
//!
//! - **Parsing**: tokenizer, object grammar, cross-reference resolution
//!   (classic tables, cross-reference streams, incremental updates,
//!   compressed object containers), tolerant of real-world corruption
//! - **Recovery**: brute-force full-file scan when the cross-reference data
//!   is destroyed
//! - **Writing**: reachable-graph serialization with a rebuilt
//!   cross-reference table and trailer, cycle-safe
//! - **Filters**: Flate, LZW, ASCIIHex, ASCII85 and RunLength, decode and
//!   encode, chained in declared order
//! - **Events**: synchronous listeners observing every parsed object and
//!   every content-stream operator, with cancellation
//!
//! ## Reading
//!
//! ```rust,no_run
//! use quill_pdf::load;
//! use std::fs::File;
//!
//! # fn main() -> quill_pdf::Result<()> {
//! let file = File::open("document.pdf")?;
//! let document = load(file)?;
//!
//! println!("PDF version {}", document.version());
//! println!("{} objects", document.len());
//! if let Some(catalog) = document.catalog() {
//!     println!("catalog type: {:?}", catalog.get_type());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Writing
//!
//! ```rust
//! use quill_pdf::{dump, Document, PdfDictionary, PdfName, PdfObject};
//!
//! # fn main() -> quill_pdf::Result<()> {
//! let mut document = Document::new();
//! let mut catalog = PdfDictionary::new();
//! catalog.insert("Type", PdfObject::Name(PdfName::new("Catalog")));
//! let root = document.add_object(PdfObject::Dictionary(catalog));
//! document.set_root(root);
//!
//! let mut bytes = Vec::new();
//! dump(&mut bytes, &document)?;
//! assert!(bytes.starts_with(b"%PDF-"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Observing the parse
//!
//! ```rust,no_run
//! use quill_pdf::events::{EventListener, ListenerFlow, ObjectLocation};
//! use quill_pdf::{load_with_listeners, PdfObject};
//! use std::fs::File;
//!
//! struct OperatorCensus(usize);
//!
//! impl EventListener for OperatorCensus {
//!     fn on_content_operator(&mut self, _op: &str, _operands: &[PdfObject]) -> ListenerFlow {
//!         self.0 += 1;
//!         ListenerFlow::Continue
//!     }
//! }
//!
//! # fn main() -> quill_pdf::Result<()> {
//! let mut census = OperatorCensus(0);
//! let mut listeners: [&mut dyn EventListener; 1] = [&mut census];
//! let document = load_with_listeners(File::open("document.pdf")?, &mut listeners)?;
//! println!("{} operators across {} objects", census.0, document.len());
//! # Ok(())
//! # }
//! ```

pub mod document;
pub mod error;
pub mod events;
pub mod filters;
pub mod metadata;
pub mod objects;
pub mod parser;
pub mod writer;

pub use document::Document;
pub use error::{PdfError, Result};
pub use events::{EventListener, ListenerFlow, ObjectLocation};
pub use filters::{Filter, FilterError};
pub use metadata::DocumentInfo;
pub use objects::{
    ObjectId, PdfArray, PdfDictionary, PdfName, PdfObject, PdfStream, PdfString,
};
pub use parser::{ParseError, ParseOptions, PdfVersion, Trailer};
pub use writer::{PdfWriter, WriteError};

use events::EventHub;
use std::io::{Read, Seek, Write};

/// Current version of quill-pdf
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Load a document from a seekable byte source with lenient options and no
/// listeners.
pub fn load<R: Read + Seek>(source: R) -> Result<Document> {
    let mut hub = EventHub::empty();
    Ok(parser::loader::load_document(source, ParseOptions::default(), &mut hub)?)
}

/// Load a document, notifying `listeners` synchronously per parsed object
/// and per content-stream operator.
///
/// The listener collection is borrowed for this call only — a fresh slice
/// per call, never shared between calls. A listener returning
/// [`ListenerFlow::Stop`] cancels the load with [`PdfError::Cancelled`].
pub fn load_with_listeners<R: Read + Seek>(
    source: R,
    listeners: &mut [&mut dyn EventListener],
) -> Result<Document> {
    let mut hub = EventHub::new(listeners);
    Ok(parser::loader::load_document(source, ParseOptions::default(), &mut hub)?)
}

/// Load with explicit parse options (strict mode propagates every leaf
/// error instead of repairing).
pub fn load_with_options<R: Read + Seek>(
    source: R,
    options: ParseOptions,
    listeners: &mut [&mut dyn EventListener],
) -> Result<Document> {
    let mut hub = EventHub::new(listeners);
    Ok(parser::loader::load_document(source, options, &mut hub)?)
}

/// Serialize a document into a byte sink.
///
/// Any failure aborts the pass before the trailer is emitted; the caller
/// must discard whatever reached the sink.
pub fn dump<W: Write>(sink: W, document: &Document) -> Result<()> {
    let mut writer = PdfWriter::new(sink);
    writer.write_document(document)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_dump_requires_root() {
        let document = Document::new();
        let mut sink = Vec::new();
        assert!(matches!(
            dump(&mut sink, &document),
            Err(PdfError::Write(WriteError::MissingRoot))
        ));
    }
}
