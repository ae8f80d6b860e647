//! Cross-Reference Resolver
//!
//! Maps (object number, generation) to a file location, per ISO 32000-1
//! Section 7.5. Both classic plain-text tables and cross-reference streams
//! are supported. The merged table is built by walking the trailer `/Prev`
//! chain newest-first: an object number keeps the first entry seen, which is
//! exactly last-writer-wins across incremental updates.

use super::context::ParseContext;
use super::lexer::{Lexer, Token};
use super::{objects, xref_stream, ParseError, ParseOptions, ParseResult};
use crate::objects::{PdfDictionary, PdfObject};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{Read, Seek, SeekFrom};
use tracing::{debug, warn};

/// How much of the file tail is searched for `startxref`
const STARTXREF_WINDOW: u64 = 1024;

/// One cross-reference entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free slot in the free list
    Free { next_free: u32, generation: u16 },
    /// Object stored at a byte offset
    InUse { offset: u64, generation: u16 },
    /// Object stored inside a compressed object container
    Compressed { container: u32, index: u32 },
}

impl XRefEntry {
    pub fn is_in_use(&self) -> bool {
        !matches!(self, XRefEntry::Free { .. })
    }

    /// Generation recorded for this entry (compressed objects are always
    /// generation 0)
    pub fn generation(&self) -> u16 {
        match self {
            XRefEntry::Free { generation, .. } | XRefEntry::InUse { generation, .. } => *generation,
            XRefEntry::Compressed { .. } => 0,
        }
    }
}

/// Merged cross-reference table for one document
#[derive(Debug, Clone, Default)]
pub struct XRefTable {
    entries: HashMap<u32, XRefEntry>,
    trailer: Option<PdfDictionary>,
}

impl XRefTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unconditionally (recovery rebuilds use this)
    pub fn add_entry(&mut self, number: u32, entry: XRefEntry) {
        self.entries.insert(number, entry);
    }

    /// Insert only if the object number is still unseen. Sections merge
    /// newest-first, so the first writer is the latest update.
    pub fn merge_entry(&mut self, number: u32, entry: XRefEntry) {
        self.entries.entry(number).or_insert(entry);
    }

    pub fn get(&self, number: u32) -> Option<&XRefEntry> {
        self.entries.get(&number)
    }

    pub fn trailer(&self) -> Option<&PdfDictionary> {
        self.trailer.as_ref()
    }

    pub fn set_trailer(&mut self, trailer: PdfDictionary) {
        self.trailer = Some(trailer);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u32, &XRefEntry)> {
        self.entries.iter()
    }

    /// Object numbers with in-use entries
    pub fn in_use_numbers(&self) -> Vec<u32> {
        let mut numbers: Vec<u32> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_in_use())
            .map(|(n, _)| *n)
            .collect();
        numbers.sort_unstable();
        numbers
    }

    /// Build the merged table by locating `startxref` and following the
    /// update chain.
    pub fn build<R: Read + Seek>(reader: &mut R, options: &ParseOptions) -> ParseResult<Self> {
        let start = find_startxref_offset(reader)?;
        Self::build_from(reader, start, options)
    }

    /// Build the merged table starting at a known section offset.
    pub fn build_from<R: Read + Seek>(
        reader: &mut R,
        start: u64,
        options: &ParseOptions,
    ) -> ParseResult<Self> {
        let mut table = Self::new();
        let mut pending = VecDeque::from([start]);
        let mut visited: HashSet<u64> = HashSet::new();

        while let Some(offset) = pending.pop_front() {
            if !visited.insert(offset) {
                warn!(offset, "cross-reference chain loops, section skipped");
                continue;
            }

            let links = parse_section_at(reader, offset, &mut table, options)?;
            debug!(offset, entries = table.len(), "merged cross-reference section");

            // A hybrid file's stream section ranks below the classic section
            // that names it, and above everything older.
            if let Some(stm) = links.xref_stm {
                pending.push_back(stm);
            }
            if let Some(prev) = links.prev {
                pending.push_back(prev);
            }
        }

        if table.is_empty() {
            return Err(ParseError::InvalidXRef);
        }
        Ok(table)
    }
}

/// Links a section contributes to the chain walk
struct SectionLinks {
    prev: Option<u64>,
    xref_stm: Option<u64>,
}

fn dict_offset(dict: &PdfDictionary, key: &str) -> Option<u64> {
    dict.get(key)
        .and_then(|obj| obj.as_integer())
        .filter(|v| *v >= 0)
        .map(|v| v as u64)
}

/// Parse the section at `offset` (classic table or xref stream) and merge
/// its entries.
fn parse_section_at<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    table: &mut XRefTable,
    options: &ParseOptions,
) -> ParseResult<SectionLinks> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut lexer = Lexer::new_at(&mut *reader, offset);

    match lexer.peek_token() {
        Ok(Token::Xref) => parse_classic_section(&mut lexer, table),
        Ok(Token::Integer(_)) => parse_stream_section(&mut lexer, table, options),
        _ => Err(ParseError::InvalidXRef),
    }
}

/// Classic table: `xref`, subsections of fixed-format entries, `trailer`,
/// trailer dictionary.
fn parse_classic_section<R: Read + Seek>(
    lexer: &mut Lexer<R>,
    table: &mut XRefTable,
) -> ParseResult<SectionLinks> {
    lexer.expect_keyword(Token::Xref)?;

    loop {
        match lexer.next_token().map_err(|_| ParseError::InvalidXRef)? {
            Token::Trailer => break,
            Token::Integer(first) if first >= 0 => {
                let count = match lexer.next_token() {
                    Ok(Token::Integer(c)) if c >= 0 => c as u32,
                    _ => return Err(ParseError::InvalidXRef),
                };

                for i in 0..count {
                    let entry = parse_classic_entry(lexer)?;
                    table.merge_entry(first as u32 + i, entry);
                }
            }
            _ => return Err(ParseError::InvalidXRef),
        }
    }

    let mut ctx = ParseContext::new();
    let trailer_obj = objects::parse_object(lexer, &mut ctx, &ParseOptions::lenient())
        .map_err(|_| ParseError::InvalidTrailer)?;
    let trailer_dict = match trailer_obj {
        PdfObject::Dictionary(dict) => dict,
        _ => return Err(ParseError::InvalidTrailer),
    };

    let links = SectionLinks {
        prev: dict_offset(&trailer_dict, "Prev"),
        xref_stm: dict_offset(&trailer_dict, "XRefStm"),
    };

    if table.trailer.is_none() {
        table.set_trailer(trailer_dict);
    }

    Ok(links)
}

/// One fixed-format entry: `nnnnnnnnnn ggggg n|f`. Parsed word-wise, which
/// also accepts the 19-byte variants some writers produce.
fn parse_classic_entry<R: Read + Seek>(lexer: &mut Lexer<R>) -> ParseResult<XRefEntry> {
    let offset_word = lexer.read_token_word()?;
    let gen_word = lexer.read_token_word()?;
    let flag_word = lexer.read_token_word()?;

    let offset = offset_word.parse::<u64>().map_err(|_| ParseError::InvalidXRef)?;
    let generation = gen_word.parse::<u16>().map_err(|_| ParseError::InvalidXRef)?;

    match flag_word.as_str() {
        "n" => Ok(XRefEntry::InUse { offset, generation }),
        "f" => Ok(XRefEntry::Free {
            next_free: offset as u32,
            generation,
        }),
        _ => Err(ParseError::InvalidXRef),
    }
}

/// Cross-reference stream section: an indirect stream object with
/// `/Type /XRef`.
fn parse_stream_section<R: Read + Seek>(
    lexer: &mut Lexer<R>,
    table: &mut XRefTable,
    options: &ParseOptions,
) -> ParseResult<SectionLinks> {
    let mut ctx = ParseContext::new();
    let (_, object) = objects::parse_indirect_object(lexer, None, &mut ctx, options)
        .map_err(|_| ParseError::InvalidXRef)?;

    let stream = match &object {
        PdfObject::Stream(stream) => stream,
        _ => return Err(ParseError::InvalidXRef),
    };

    if stream.dict.get_type() != Some("XRef") {
        return Err(ParseError::InvalidXRef);
    }

    for (number, entry) in xref_stream::decode_entries(stream)? {
        table.merge_entry(number, entry);
    }

    let links = SectionLinks {
        prev: dict_offset(&stream.dict, "Prev"),
        xref_stm: None,
    };

    if table.trailer.is_none() {
        table.set_trailer(stream.dict.clone());
    }

    Ok(links)
}

/// Locate the `startxref` anchor near the end of the file.
pub fn find_startxref_offset<R: Read + Seek>(reader: &mut R) -> ParseResult<u64> {
    let file_size = reader.seek(SeekFrom::End(0))?;
    if file_size == 0 {
        return Err(ParseError::EmptyFile);
    }

    let window = STARTXREF_WINDOW.min(file_size);
    reader.seek(SeekFrom::End(-(window as i64)))?;

    let mut buffer = vec![0u8; window as usize];
    reader.read_exact(&mut buffer)?;

    let keyword = b"startxref";
    let pos = buffer
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .ok_or(ParseError::InvalidXRef)?;

    let digits: String = buffer[pos + keyword.len()..]
        .iter()
        .map(|&b| b as char)
        .skip_while(|c| c.is_ascii_whitespace())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    digits.parse::<u64>().map_err(|_| ParseError::InvalidXRef)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_entry_kinds() {
        assert!(!XRefEntry::Free { next_free: 0, generation: 65535 }.is_in_use());
        assert!(XRefEntry::InUse { offset: 17, generation: 0 }.is_in_use());
        assert!(XRefEntry::Compressed { container: 4, index: 2 }.is_in_use());
        assert_eq!(XRefEntry::Compressed { container: 4, index: 2 }.generation(), 0);
    }

    #[test]
    fn test_merge_first_writer_wins() {
        let mut table = XRefTable::new();
        table.merge_entry(5, XRefEntry::InUse { offset: 900, generation: 0 });
        table.merge_entry(5, XRefEntry::InUse { offset: 100, generation: 0 });
        assert_eq!(
            table.get(5),
            Some(&XRefEntry::InUse { offset: 900, generation: 0 })
        );
    }

    #[test]
    fn test_find_startxref() {
        let data = b"junk junk\nstartxref\n12345\n%%EOF\n";
        let mut cursor = Cursor::new(data.to_vec());
        assert_eq!(find_startxref_offset(&mut cursor).unwrap(), 12345);
    }

    #[test]
    fn test_find_startxref_takes_last() {
        let data = b"startxref\n1\n%%EOF\nstartxref\n2\n%%EOF\n";
        let mut cursor = Cursor::new(data.to_vec());
        assert_eq!(find_startxref_offset(&mut cursor).unwrap(), 2);
    }

    #[test]
    fn test_find_startxref_missing() {
        let mut cursor = Cursor::new(b"no anchor here".to_vec());
        assert!(matches!(
            find_startxref_offset(&mut cursor),
            Err(ParseError::InvalidXRef)
        ));
    }

    fn classic_table(body: &str) -> ParseResult<XRefTable> {
        let mut cursor = Cursor::new(body.as_bytes().to_vec());
        XRefTable::build_from(&mut cursor, 0, &ParseOptions::lenient())
    }

    #[test]
    fn test_parse_classic_section() {
        let table = classic_table(
            "xref\n0 3\n0000000000 65535 f \n0000000017 00000 n \n0000000081 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R >>\n",
        )
        .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(
            table.get(1),
            Some(&XRefEntry::InUse { offset: 17, generation: 0 })
        );
        assert!(!table.get(0).unwrap().is_in_use());
        assert_eq!(
            table.trailer().and_then(|t| t.get("Size")).and_then(|s| s.as_integer()),
            Some(3)
        );
    }

    #[test]
    fn test_parse_classic_multiple_subsections() {
        let table = classic_table(
            "xref\n0 1\n0000000000 65535 f \n4 2\n0000000200 00000 n \n0000000300 00001 n \ntrailer\n<< /Size 6 >>\n",
        )
        .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(
            table.get(5),
            Some(&XRefEntry::InUse { offset: 300, generation: 1 })
        );
        assert!(table.get(2).is_none());
    }

    #[test]
    fn test_incremental_update_newer_section_wins() {
        // Base section at offset 0 defines objects 1 and 5; the update
        // section redefines object 5 and chains back via /Prev.
        let base = "xref\n0 1\n0000000000 65535 f \n1 1\n0000000010 00000 n \n5 1\n0000000050 00000 n \ntrailer\n<< /Size 6 >>\n";
        let update_offset = base.len() as u64;
        let update = "xref\n5 1\n0000000999 00000 n \ntrailer\n<< /Size 6 /Prev 0 >>\n";

        let mut data = String::new();
        data.push_str(base);
        data.push_str(update);

        let mut cursor = Cursor::new(data.into_bytes());
        let table =
            XRefTable::build_from(&mut cursor, update_offset, &ParseOptions::lenient()).unwrap();

        // Object 5 comes from the update, object 1 from the base.
        assert_eq!(
            table.get(5),
            Some(&XRefEntry::InUse { offset: 999, generation: 0 })
        );
        assert_eq!(
            table.get(1),
            Some(&XRefEntry::InUse { offset: 10, generation: 0 })
        );
        // The newest trailer is authoritative.
        assert!(table.trailer().unwrap().contains_key("Prev"));
    }

    #[test]
    fn test_prev_loop_terminates() {
        // Two sections pointing /Prev at each other must not spin.
        let a = "xref\n1 1\n0000000010 00000 n \ntrailer\n<< /Size 2 /Prev 60 >>\n";
        let b = "xref\n2 1\n0000000020 00000 n \ntrailer\n<< /Size 3 /Prev 0 >>\n";
        assert_eq!(a.len(), 60);

        let mut data = String::new();
        data.push_str(a);
        data.push_str(b);

        let mut cursor = Cursor::new(data.into_bytes());
        let table = XRefTable::build_from(&mut cursor, 0, &ParseOptions::lenient()).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_garbage_section_is_invalid() {
        assert!(matches!(
            classic_table("definitely not an xref"),
            Err(ParseError::InvalidXRef)
        ));
    }
}
