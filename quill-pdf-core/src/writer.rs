//! Object Writer
//!
//! Serializes a [`Document`] graph back into PDF bytes, mirroring the parser
//! in reverse: reachable-graph walk from the root, one serialization per
//! object number (back-edges stay indirect references), then a rebuilt
//! cross-reference table and trailer. Phases run in a strict order —
//! `Init → WritingObjects → WritingXRef → WritingTrailer → Done` — and any
//! failure aborts the pass, so a sink without a finalized trailer is never
//! mistaken for a valid file.

use crate::document::Document;
use crate::objects::{ObjectId, PdfObject, PdfStream};
use crate::parser::PdfVersion;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::io::Write;
use thiserror::Error;

/// Write-side errors. Never recovered: the caller must discard whatever
/// reached the sink.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Document has no root object")]
    MissingRoot,

    #[error("Writer phase out of order: {0} while {1}")]
    InvalidState(&'static str, &'static str),
}

pub type WriteResult<T> = Result<T, WriteError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Init,
    WritingObjects,
    WritingXRef,
    WritingTrailer,
    Done,
}

impl WriterState {
    fn name(self) -> &'static str {
        match self {
            WriterState::Init => "Init",
            WriterState::WritingObjects => "WritingObjects",
            WriterState::WritingXRef => "WritingXRef",
            WriterState::WritingTrailer => "WritingTrailer",
            WriterState::Done => "Done",
        }
    }
}

/// Serializer for one write pass over one document.
pub struct PdfWriter<W: Write> {
    sink: W,
    state: WriterState,
    offsets: BTreeMap<u32, (u16, u64)>,
    position: u64,
}

impl<W: Write> PdfWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            state: WriterState::Init,
            offsets: BTreeMap::new(),
            position: 0,
        }
    }

    /// Run the whole pass. The sink is finalized only if every phase
    /// succeeds.
    pub fn write_document(&mut self, document: &Document) -> WriteResult<()> {
        self.write_header(document.version())?;
        self.write_objects(document)?;
        let xref_position = self.write_xref()?;
        self.write_trailer(document, xref_position)?;
        Ok(())
    }

    fn transition(&mut self, from: WriterState, to: WriterState, phase: &'static str) -> WriteResult<()> {
        if self.state != from {
            return Err(WriteError::InvalidState(phase, self.state.name()));
        }
        self.state = to;
        Ok(())
    }

    /// Phase 1: `%PDF-x.y` header plus the binary comment line.
    pub fn write_header(&mut self, version: PdfVersion) -> WriteResult<()> {
        self.transition(WriterState::Init, WriterState::WritingObjects, "write_header")?;
        self.write_bytes(format!("%PDF-{version}\n").as_bytes())?;
        self.write_bytes(&[b'%', 0xE2, 0xE3, 0xCF, 0xD3, b'\n'])?;
        Ok(())
    }

    /// Phase 2: walk the reachable graph from the root, serializing each
    /// object number at most once and recording its byte offset.
    pub fn write_objects(&mut self, document: &Document) -> WriteResult<()> {
        if self.state != WriterState::WritingObjects {
            return Err(WriteError::InvalidState("write_objects", self.state.name()));
        }
        let root = document.root().ok_or(WriteError::MissingRoot)?;

        let mut queue: VecDeque<u32> = VecDeque::new();
        let mut seen: HashSet<u32> = HashSet::new();
        for id in [Some(root), document.info()].into_iter().flatten() {
            if seen.insert(id.number()) {
                queue.push_back(id.number());
            }
        }

        while let Some(number) = queue.pop_front() {
            // A dangling reference gets no body; its slot stays free in the
            // rebuilt table and readers degrade it to null.
            let (id, object) = match document.get_entry(number) {
                Some(entry) => entry,
                None => continue,
            };

            self.write_indirect_object(id, object)?;

            let mut references = Vec::new();
            object.collect_references(&mut references);
            for reference in references {
                if seen.insert(reference.number()) {
                    queue.push_back(reference.number());
                }
            }
        }

        Ok(())
    }

    fn write_indirect_object(&mut self, id: ObjectId, object: &PdfObject) -> WriteResult<()> {
        self.offsets
            .insert(id.number(), (id.generation(), self.position));
        self.write_bytes(format!("{} {} obj\n", id.number(), id.generation()).as_bytes())?;
        self.write_object_value(object)?;
        self.write_bytes(b"\nendobj\n")?;
        Ok(())
    }

    fn write_object_value(&mut self, object: &PdfObject) -> WriteResult<()> {
        match object {
            PdfObject::Null => self.write_bytes(b"null")?,
            PdfObject::Boolean(b) => self.write_bytes(if *b { b"true" } else { b"false" })?,
            PdfObject::Integer(i) => self.write_bytes(i.to_string().as_bytes())?,
            PdfObject::Real(r) => {
                let formatted = format_real(*r);
                self.write_bytes(formatted.as_bytes())?;
            }
            PdfObject::String(s) => {
                self.write_bytes(b"(")?;
                for &byte in s.as_bytes() {
                    match byte {
                        b'\\' | b'(' | b')' => {
                            self.write_bytes(&[b'\\', byte])?;
                        }
                        _ => self.write_bytes(&[byte])?,
                    }
                }
                self.write_bytes(b")")?;
            }
            PdfObject::Name(n) => {
                self.write_bytes(b"/")?;
                let escaped = escape_name(n.as_str());
                self.write_bytes(escaped.as_bytes())?;
            }
            PdfObject::Array(array) => {
                self.write_bytes(b"[")?;
                for (i, item) in array.iter().enumerate() {
                    if i > 0 {
                        self.write_bytes(b" ")?;
                    }
                    self.write_object_value(item)?;
                }
                self.write_bytes(b"]")?;
            }
            PdfObject::Dictionary(dict) => {
                self.write_dictionary(dict)?;
            }
            PdfObject::Stream(stream) => {
                self.write_stream(stream)?;
            }
            PdfObject::Reference(id) => {
                self.write_bytes(id.to_string().as_bytes())?;
            }
        }
        Ok(())
    }

    /// Keys serialize in sorted order so equal graphs produce identical
    /// bytes.
    fn write_dictionary(&mut self, dict: &crate::objects::PdfDictionary) -> WriteResult<()> {
        let mut keys: Vec<_> = dict.iter().collect();
        keys.sort_by(|(a, _), (b, _)| a.cmp(b));

        self.write_bytes(b"<<")?;
        for (key, value) in keys {
            self.write_bytes(b" /")?;
            let escaped = escape_name(key.as_str());
            self.write_bytes(escaped.as_bytes())?;
            self.write_bytes(b" ")?;
            self.write_object_value(value)?;
        }
        self.write_bytes(b" >>")?;
        Ok(())
    }

    /// Streams write their raw payload with `/Length` recomputed from the
    /// actual byte count.
    fn write_stream(&mut self, stream: &PdfStream) -> WriteResult<()> {
        let mut dict = stream.dict.clone();
        dict.insert("Length", PdfObject::Integer(stream.data.len() as i64));

        self.write_dictionary(&dict)?;
        self.write_bytes(b"\nstream\n")?;
        self.write_bytes(&stream.data)?;
        self.write_bytes(b"\nendstream")?;
        Ok(())
    }

    /// Phase 3: the rebuilt cross-reference table, one subsection covering
    /// object numbers 0 through the highest written.
    pub fn write_xref(&mut self) -> WriteResult<u64> {
        self.transition(WriterState::WritingObjects, WriterState::WritingXRef, "write_xref")?;

        let xref_position = self.position;
        let max_number = self.offsets.keys().next_back().copied().unwrap_or(0);

        self.write_bytes(b"xref\n")?;
        self.write_bytes(format!("0 {}\n", max_number + 1).as_bytes())?;
        self.write_bytes(b"0000000000 65535 f \n")?;

        for number in 1..=max_number {
            match self.offsets.get(&number).copied() {
                Some((generation, offset)) => {
                    self.write_bytes(format!("{offset:010} {generation:05} n \n").as_bytes())?;
                }
                None => {
                    self.write_bytes(b"0000000000 00000 f \n")?;
                }
            }
        }

        Ok(xref_position)
    }

    /// Phase 4: trailer dictionary, `startxref`, `%%EOF`. Only this phase
    /// finalizes the sink.
    pub fn write_trailer(&mut self, document: &Document, xref_position: u64) -> WriteResult<()> {
        self.transition(WriterState::WritingXRef, WriterState::WritingTrailer, "write_trailer")?;

        let root = document.root().ok_or(WriteError::MissingRoot)?;
        let size = self.offsets.keys().next_back().copied().unwrap_or(0) + 1;

        let mut trailer = crate::objects::PdfDictionary::new();
        trailer.insert("Size", PdfObject::Integer(size as i64));
        trailer.insert("Root", PdfObject::Reference(root));
        if let Some(info) = document.info() {
            trailer.insert("Info", PdfObject::Reference(info));
        }

        self.write_bytes(b"trailer\n")?;
        self.write_dictionary(&trailer)?;
        self.write_bytes(format!("\nstartxref\n{xref_position}\n%%EOF\n").as_bytes())?;
        self.sink.flush()?;

        self.state = WriterState::Done;
        Ok(())
    }

    /// Whether the pass reached its terminal state.
    pub fn is_done(&self) -> bool {
        self.state == WriterState::Done
    }

    fn write_bytes(&mut self, data: &[u8]) -> WriteResult<()> {
        self.sink.write_all(data)?;
        self.position += data.len() as u64;
        Ok(())
    }
}

/// Reals keep one fractional digit so they reparse as reals, and otherwise
/// drop trailing zeros.
fn format_real(value: f64) -> String {
    let mut formatted = format!("{value:.6}");
    while formatted.ends_with('0') {
        formatted.pop();
    }
    if formatted.ends_with('.') {
        formatted.push('0');
    }
    formatted
}

/// Name bytes outside the regular range use `#xx` escapes.
fn escape_name(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for &byte in name.as_bytes() {
        let needs_escape = byte == b'#'
            || !(0x21..=0x7E).contains(&byte)
            || crate::parser::lexer::is_pdf_delimiter(byte);
        if needs_escape {
            escaped.push_str(&format!("#{byte:02X}"));
        } else {
            escaped.push(byte as char);
        }
    }
    escaped
}
