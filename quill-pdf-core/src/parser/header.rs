//! PDF Header
//!
//! Locates and parses the `%PDF-x.y` marker. Real-world files sometimes
//! carry junk before the marker; offsets elsewhere in the file are then
//! relative to the marker, so its position is recorded.

use super::{ParseError, ParseResult};
use std::fmt;
use std::io::{Read, Seek, SeekFrom};

/// How far into the file the header marker may legally sit
const HEADER_SEARCH_WINDOW: usize = 1024;

/// PDF version from the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdfVersion {
    pub major: u8,
    pub minor: u8,
}

impl PdfVersion {
    pub const V1_7: PdfVersion = PdfVersion { major: 1, minor: 7 };

    pub fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for PdfVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Parsed file header
#[derive(Debug, Clone, Copy)]
pub struct PdfHeader {
    pub version: PdfVersion,
    /// Byte offset of the `%` of the marker within the source
    pub offset: u64,
}

impl PdfHeader {
    /// Find and parse the header marker within the search window.
    pub fn parse<R: Read + Seek>(reader: &mut R) -> ParseResult<Self> {
        reader.seek(SeekFrom::Start(0))?;

        let mut window = vec![0u8; HEADER_SEARCH_WINDOW];
        let mut filled = 0;
        while filled < window.len() {
            match reader.read(&mut window[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        window.truncate(filled);

        if window.is_empty() {
            return Err(ParseError::EmptyFile);
        }

        let marker = b"%PDF-";
        let start = window
            .windows(marker.len())
            .position(|w| w == marker)
            .ok_or(ParseError::InvalidHeader)?;

        let rest = &window[start + marker.len()..];
        let version = Self::parse_version(rest).ok_or(ParseError::InvalidHeader)?;

        Ok(Self {
            version,
            offset: start as u64,
        })
    }

    fn parse_version(bytes: &[u8]) -> Option<PdfVersion> {
        let mut parts = bytes.splitn(2, |&b| b == b'.');
        let major = parse_digits(parts.next()?)?;
        let minor_part = parts.next()?;
        let end = minor_part
            .iter()
            .position(|b| !b.is_ascii_digit())
            .unwrap_or(minor_part.len());
        let minor = parse_digits(&minor_part[..end])?;
        Some(PdfVersion::new(major, minor))
    }
}

fn parse_digits(bytes: &[u8]) -> Option<u8> {
    if bytes.is_empty() || bytes.len() > 2 || !bytes.iter().all(|b| b.is_ascii_digit()) {
        return None;
    }
    std::str::from_utf8(bytes).ok()?.parse().ok()
}
