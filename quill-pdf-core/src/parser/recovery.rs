//! Cross-Reference Recovery
//!
//! When the `startxref` anchor, the table, or the `/Prev` chain is corrupt,
//! the resolver falls back to a linear scan of the whole source for
//! `<int> <int> obj` patterns and rebuilds an approximate table from them.
//! Later occurrences of an object number overwrite earlier ones, matching
//! the order incremental updates append to the file.

use super::context::ParseContext;
use super::lexer::{is_pdf_delimiter, is_pdf_whitespace, Lexer};
use super::objects::parse_object;
use super::xref::{XRefEntry, XRefTable};
use super::{ParseOptions, ParseResult};
use crate::objects::PdfObject;
use std::io::{Cursor, Read, Seek, SeekFrom};
use tracing::{debug, warn};

/// How far past a header an `endobj` must appear for the match to count
const OBJECT_END_WINDOW: usize = 50 * 1024;

/// Scan statistics, reported through the debug log
#[derive(Debug, Default)]
pub struct RecoveryStats {
    pub objects_found: usize,
    pub trailer_found: bool,
}

/// Rebuild an approximate cross-reference table by scanning the source.
pub fn rebuild_xref<R: Read + Seek>(reader: &mut R) -> ParseResult<XRefTable> {
    reader.seek(SeekFrom::Start(0))?;
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;

    let mut stats = RecoveryStats::default();
    let mut table = XRefTable::new();

    for (number, generation, offset) in scan_object_headers(&data) {
        // Require a matching end marker nearby, otherwise the pattern is
        // probably payload bytes
        let window_end = (offset as usize + OBJECT_END_WINDOW).min(data.len());
        if !contains_keyword(&data[offset as usize..window_end], b"endobj") {
            continue;
        }
        table.add_entry(number, XRefEntry::InUse { offset, generation });
        stats.objects_found += 1;
    }

    if let Some(trailer) = recover_trailer(&data) {
        stats.trailer_found = true;
        table.set_trailer(trailer);
    }

    debug!(
        objects = stats.objects_found,
        trailer = stats.trailer_found,
        "rebuilt cross-reference table from full-file scan"
    );

    Ok(table)
}

/// All `<int> <int> obj` headers in the buffer, as (number, generation,
/// absolute offset of the object number).
fn scan_object_headers(data: &[u8]) -> Vec<(u32, u16, u64)> {
    let mut headers = Vec::new();
    let keyword = b"obj";
    let mut i = 0;

    while i + keyword.len() <= data.len() {
        if &data[i..i + keyword.len()] != keyword {
            i += 1;
            continue;
        }

        let bounded_before = i > 0 && is_pdf_whitespace(data[i - 1]);
        let after = data.get(i + keyword.len()).copied();
        let bounded_after =
            after.is_none() || after.map(|b| is_pdf_whitespace(b) || is_pdf_delimiter(b)) == Some(true);

        if bounded_before && bounded_after {
            if let Some((number, generation, start)) = parse_header_backwards(data, i - 1) {
                headers.push((number, generation, start as u64));
            }
        }
        i += keyword.len();
    }

    headers
}

/// Walk backwards over `<int> <int> ` immediately before an `obj` keyword.
fn parse_header_backwards(data: &[u8], mut pos: usize) -> Option<(u32, u16, usize)> {
    let mut read_digits_back = |pos: &mut usize| -> Option<usize> {
        while *pos > 0 && is_pdf_whitespace(data[*pos]) {
            *pos -= 1;
        }
        if !data[*pos].is_ascii_digit() {
            return None;
        }
        let end = *pos + 1;
        while *pos > 0 && data[*pos - 1].is_ascii_digit() {
            *pos -= 1;
        }
        Some(end)
    };

    let gen_end = read_digits_back(&mut pos)?;
    let gen_start = pos;
    if pos == 0 {
        return None;
    }
    pos -= 1;
    let num_end = read_digits_back(&mut pos)?;
    let num_start = pos;

    let generation = std::str::from_utf8(&data[gen_start..gen_end]).ok()?.parse().ok()?;
    let number = std::str::from_utf8(&data[num_start..num_end]).ok()?.parse().ok()?;
    Some((number, generation, num_start))
}

fn contains_keyword(haystack: &[u8], keyword: &[u8]) -> bool {
    haystack.windows(keyword.len()).any(|w| w == keyword)
}

/// Parse the dictionary after the last `trailer` keyword, if any survived.
fn recover_trailer(data: &[u8]) -> Option<crate::objects::PdfDictionary> {
    let keyword = b"trailer";
    let pos = data
        .windows(keyword.len())
        .rposition(|w| w == keyword)?;

    let after = pos + keyword.len();
    let mut cursor = Cursor::new(&data[after..]);
    let mut lexer = Lexer::new_at(&mut cursor, after as u64);
    let mut ctx = ParseContext::new();

    match parse_object(&mut lexer, &mut ctx, &ParseOptions::lenient()) {
        Ok(PdfObject::Dictionary(dict)) => Some(dict),
        _ => {
            warn!("trailer keyword found but its dictionary did not parse");
            None
        }
    }
}
