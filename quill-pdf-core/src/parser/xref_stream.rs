//! Cross-Reference Streams
//!
//! Decodes the compact stream form of the cross-reference table
//! (ISO 32000-1 Section 7.5.8): fixed-width binary records described by the
//! `/W` array, grouped into subsections by `/Index`.

use super::xref::XRefEntry;
use super::{ParseError, ParseResult};
use crate::objects::PdfStream;
use tracing::warn;

/// Decode every record of an xref stream into (object number, entry) pairs,
/// in record order.
pub fn decode_entries(stream: &PdfStream) -> ParseResult<Vec<(u32, XRefEntry)>> {
    let dict = &stream.dict;

    let size = dict
        .get("Size")
        .and_then(|obj| obj.as_integer())
        .ok_or_else(|| ParseError::MissingKey("Size".to_string()))?;

    // Subsection list [first count ...]; default is one run covering Size
    let index = match dict.get("Index") {
        Some(obj) => {
            let array = obj.as_array().ok_or(ParseError::InvalidXRef)?;
            if array.len() % 2 != 0 {
                return Err(ParseError::InvalidXRef);
            }
            let mut pairs = Vec::with_capacity(array.len() / 2);
            for chunk in array.0.chunks(2) {
                let first = chunk[0].as_integer().ok_or(ParseError::InvalidXRef)?;
                let count = chunk[1].as_integer().ok_or(ParseError::InvalidXRef)?;
                if first < 0 || count < 0 {
                    return Err(ParseError::InvalidXRef);
                }
                pairs.push((first as u32, count as u32));
            }
            pairs
        }
        None => vec![(0, size.max(0) as u32)],
    };

    let w_array = dict
        .get("W")
        .and_then(|obj| obj.as_array())
        .ok_or_else(|| ParseError::MissingKey("W".to_string()))?;
    if w_array.len() != 3 {
        return Err(ParseError::InvalidXRef);
    }
    let mut widths = [0usize; 3];
    for (slot, obj) in widths.iter_mut().zip(w_array.iter()) {
        let value = obj.as_integer().ok_or(ParseError::InvalidXRef)?;
        if !(0..=8).contains(&value) {
            return Err(ParseError::InvalidXRef);
        }
        *slot = value as usize;
    }

    let data = stream
        .decoded()
        .map_err(|e| {
            warn!(error = %e, "cross-reference stream payload failed to decode");
            ParseError::InvalidXRef
        })?;
    let record_len = widths.iter().sum::<usize>();
    if record_len == 0 {
        return Err(ParseError::InvalidXRef);
    }

    let mut entries = Vec::new();
    let mut cursor = 0usize;

    for (first, count) in index {
        for i in 0..count {
            if cursor + record_len > data.len() {
                return Err(ParseError::SyntaxError {
                    position: cursor as u64,
                    message: "cross-reference stream data truncated".to_string(),
                });
            }

            let field1 = if widths[0] == 0 {
                // A zero-width type field defaults to type 1
                1
            } else {
                read_field(&data[cursor..], widths[0])
            };
            let field2 = read_field(&data[cursor + widths[0]..], widths[1]);
            let field3 = read_field(&data[cursor + widths[0] + widths[1]..], widths[2]);
            cursor += record_len;

            let number = first + i;
            let entry = match field1 {
                0 => XRefEntry::Free {
                    next_free: field2 as u32,
                    generation: field3 as u16,
                },
                1 => XRefEntry::InUse {
                    offset: field2,
                    generation: field3 as u16,
                },
                2 => XRefEntry::Compressed {
                    container: field2 as u32,
                    index: field3 as u32,
                },
                other => {
                    // Unknown record types shall be ignored
                    warn!(record_type = other, number, "unknown xref stream record type");
                    continue;
                }
            };
            entries.push((number, entry));
        }
    }

    Ok(entries)
}

/// Big-endian field of `width` bytes
fn read_field(data: &[u8], width: usize) -> u64 {
    let mut value = 0u64;
    for &byte in data.iter().take(width) {
        value = (value << 8) | byte as u64;
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{PdfArray, PdfDictionary, PdfName, PdfObject, PdfStream};

    fn xref_stream(dict_entries: Vec<(&str, PdfObject)>, data: Vec<u8>) -> PdfStream {
        let mut dict = PdfDictionary::new();
        dict.insert("Type", PdfObject::Name(PdfName::new("XRef")));
        for (key, value) in dict_entries {
            dict.insert(key, value);
        }
        PdfStream::new(dict, data)
    }

    fn int_array(values: &[i64]) -> PdfObject {
        PdfObject::Array(PdfArray(values.iter().map(|v| PdfObject::Integer(*v)).collect()))
    }

    #[test]
    fn test_decode_basic_records() {
        // W [1 2 1]: type, offset, generation
        let data = vec![
            0, 0x00, 0x00, 0xFF, // 0: free
            1, 0x00, 0x11, 0x00, // 1: in use at 0x11
            2, 0x00, 0x04, 0x02, // 2: in container 4, index 2
        ];
        let stream = xref_stream(
            vec![("Size", PdfObject::Integer(3)), ("W", int_array(&[1, 2, 1]))],
            data,
        );

        let entries = decode_entries(&stream).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], (0, XRefEntry::Free { next_free: 0, generation: 255 }));
        assert_eq!(entries[1], (1, XRefEntry::InUse { offset: 0x11, generation: 0 }));
        assert_eq!(entries[2], (2, XRefEntry::Compressed { container: 4, index: 2 }));
    }

    #[test]
    fn test_decode_with_index_subsections() {
        // Two runs: object 3 and objects 10-11
        let data = vec![
            1, 0x10, 0, // 3
            1, 0x20, 0, // 10
            1, 0x30, 0, // 11
        ];
        let stream = xref_stream(
            vec![
                ("Size", PdfObject::Integer(12)),
                ("W", int_array(&[1, 1, 1])),
                ("Index", int_array(&[3, 1, 10, 2])),
            ],
            data,
        );

        let entries = decode_entries(&stream).unwrap();
        let numbers: Vec<u32> = entries.iter().map(|(n, _)| *n).collect();
        assert_eq!(numbers, vec![3, 10, 11]);
    }

    #[test]
    fn test_zero_width_type_defaults_to_in_use() {
        let data = vec![0x00, 0x42, 0x00];
        let stream = xref_stream(
            vec![
                ("Size", PdfObject::Integer(1)),
                ("W", int_array(&[0, 2, 1])),
            ],
            data,
        );

        let entries = decode_entries(&stream).unwrap();
        assert_eq!(entries[0].1, XRefEntry::InUse { offset: 0x42, generation: 0 });
    }

    #[test]
    fn test_unknown_record_type_skipped() {
        let data = vec![
            7, 0, 0, // unknown type
            1, 9, 0, // valid
        ];
        let stream = xref_stream(
            vec![("Size", PdfObject::Integer(2)), ("W", int_array(&[1, 1, 1]))],
            data,
        );

        let entries = decode_entries(&stream).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, 1);
    }

    #[test]
    fn test_truncated_data_fails() {
        let stream = xref_stream(
            vec![("Size", PdfObject::Integer(2)), ("W", int_array(&[1, 2, 1]))],
            vec![1, 0, 0, 0], // one record, Size says two
        );
        assert!(decode_entries(&stream).is_err());
    }

    #[test]
    fn test_missing_w_fails() {
        let stream = xref_stream(vec![("Size", PdfObject::Integer(1))], vec![]);
        assert!(matches!(
            decode_entries(&stream),
            Err(ParseError::MissingKey(_))
        ));
    }

    #[test]
    fn test_flate_encoded_records() {
        let raw = vec![1u8, 0x00, 0x20, 0x00];
        let encoded = crate::filters::encode_chain(&raw, &[crate::filters::Filter::FlateDecode]).unwrap();

        let mut dict = PdfDictionary::new();
        dict.insert("Type", PdfObject::Name(PdfName::new("XRef")));
        dict.insert("Size", PdfObject::Integer(1));
        dict.insert("W", int_array(&[1, 2, 1]));
        dict.insert("Filter", PdfObject::Name(PdfName::new("FlateDecode")));
        let stream = PdfStream::new(dict, encoded);

        let entries = decode_entries(&stream).unwrap();
        assert_eq!(entries[0], (0, XRefEntry::InUse { offset: 0x20, generation: 0 }));
    }
}
