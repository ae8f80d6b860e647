//! Document Information Dictionary
//!
//! Typed access to the optional `/Info` dictionary: Title, Author, Subject,
//! Keywords, Creator, Producer, and the PDF date fields
//! (`D:YYYYMMDDHHmmSS+HH'mm` form).

use crate::document::Document;
use crate::objects::{PdfDictionary, PdfObject, PdfString};
use chrono::{DateTime, Utc};

/// The information dictionary, decoded to owned strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<DateTime<Utc>>,
    pub modification_date: Option<DateTime<Utc>>,
}

fn text_entry(dict: &PdfDictionary, key: &str) -> Option<String> {
    dict.get(key)
        .and_then(|obj| obj.as_string())
        .and_then(|s| s.as_str().ok())
        .map(|s| s.to_string())
}

fn date_entry(dict: &PdfDictionary, key: &str) -> Option<DateTime<Utc>> {
    dict.get(key)
        .and_then(|obj| obj.as_string())
        .and_then(|s| s.as_str().ok())
        .and_then(parse_pdf_date)
}

impl DocumentInfo {
    /// Read the information dictionary a document's trailer points at.
    pub fn from_document(document: &Document) -> Self {
        let dict = document
            .info()
            .and_then(|id| document.get(id))
            .and_then(|obj| obj.as_dict());
        match dict {
            Some(dict) => Self::from_dict(dict),
            None => Self::default(),
        }
    }

    pub fn from_dict(dict: &PdfDictionary) -> Self {
        Self {
            title: text_entry(dict, "Title"),
            author: text_entry(dict, "Author"),
            subject: text_entry(dict, "Subject"),
            keywords: text_entry(dict, "Keywords"),
            creator: text_entry(dict, "Creator"),
            producer: text_entry(dict, "Producer"),
            creation_date: date_entry(dict, "CreationDate"),
            modification_date: date_entry(dict, "ModDate"),
        }
    }

    /// Build the dictionary form, ready to insert into a document and
    /// reference from its trailer.
    pub fn to_dictionary(&self) -> PdfDictionary {
        let mut dict = PdfDictionary::new();
        let mut put = |key: &str, value: &Option<String>| {
            if let Some(text) = value {
                dict.insert(key, PdfObject::String(PdfString::new(text.as_bytes())));
            }
        };
        put("Title", &self.title);
        put("Author", &self.author);
        put("Subject", &self.subject);
        put("Keywords", &self.keywords);
        put("Creator", &self.creator);
        put("Producer", &self.producer);
        if let Some(date) = self.creation_date {
            dict.insert(
                "CreationDate",
                PdfObject::String(PdfString::new(format_pdf_date(date).into_bytes())),
            );
        }
        if let Some(date) = self.modification_date {
            dict.insert(
                "ModDate",
                PdfObject::String(PdfString::new(format_pdf_date(date).into_bytes())),
            );
        }
        dict
    }
}

/// Format a date as a PDF date string, `D:YYYYMMDDHHmmSS+00'00`.
pub fn format_pdf_date(date: DateTime<Utc>) -> String {
    format!("{}+00'00", date.format("D:%Y%m%d%H%M%S"))
}

/// Parse the common forms of a PDF date string. The offset suffix is
/// honored; missing trailing components default to their minimum.
pub fn parse_pdf_date(text: &str) -> Option<DateTime<Utc>> {
    use chrono::{NaiveDate, TimeZone};

    let body = text.strip_prefix("D:").unwrap_or(text);
    let digits: String = body.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return None;
    }

    let field = |start: usize, len: usize, default: u32| -> u32 {
        digits
            .get(start..start + len)
            .and_then(|s| s.parse().ok())
            .unwrap_or(default)
    };

    let year: i32 = digits.get(0..4)?.parse().ok()?;
    let month = field(4, 2, 1);
    let day = field(6, 2, 1);
    let hour = field(8, 2, 0);
    let minute = field(10, 2, 0);
    let second = field(12, 2, 0);

    let date = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;

    // Offset suffix: Z, or +HH'mm / -HH'mm relative to UTC
    let rest = &body[digits.len()..];
    let offset_minutes: i64 = match rest.chars().next() {
        Some('+') | Some('-') => {
            let sign = if rest.starts_with('-') { -1 } else { 1 };
            let nums: Vec<u32> = rest[1..]
                .split('\'')
                .filter_map(|part| part.trim_end_matches('\'').parse().ok())
                .collect();
            let hours = nums.first().copied().unwrap_or(0) as i64;
            let minutes = nums.get(1).copied().unwrap_or(0) as i64;
            sign * (hours * 60 + minutes)
        }
        _ => 0,
    };

    let utc = date - chrono::Duration::minutes(offset_minutes);
    Some(Utc.from_utc_datetime(&utc))
}
