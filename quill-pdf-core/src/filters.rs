//! PDF Stream Filters
//!
//! Encoding and decoding of stream payloads according to ISO 32000-1
//! Section 7.4. Decoding applies the declared chain in declared order;
//! encoding applies the inverse chain so that a round trip through the same
//! declared chain is byte-exact. Every function here is a pure function of
//! (bytes, filter spec).

use crate::objects::{PdfDictionary, PdfObject};
use thiserror::Error;

#[cfg(feature = "compression")]
use flate2::read::ZlibDecoder;
#[cfg(feature = "compression")]
use std::io::Read;

/// Filter errors
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Unsupported filter: {0}")]
    Unsupported(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),
}

pub type FilterResult<T> = Result<T, FilterError>;

/// Filters named by ISO 32000-1 Table 6
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    ASCIIHexDecode,
    ASCII85Decode,
    LZWDecode,
    FlateDecode,
    RunLengthDecode,
    CCITTFaxDecode,
    JBIG2Decode,
    DCTDecode,
    JPXDecode,
    Crypt,
}

impl Filter {
    /// Parse filter from its PDF name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ASCIIHexDecode" | "AHx" => Some(Filter::ASCIIHexDecode),
            "ASCII85Decode" | "A85" => Some(Filter::ASCII85Decode),
            "LZWDecode" | "LZW" => Some(Filter::LZWDecode),
            "FlateDecode" | "Fl" => Some(Filter::FlateDecode),
            "RunLengthDecode" | "RL" => Some(Filter::RunLengthDecode),
            "CCITTFaxDecode" | "CCF" => Some(Filter::CCITTFaxDecode),
            "JBIG2Decode" => Some(Filter::JBIG2Decode),
            "DCTDecode" | "DCT" => Some(Filter::DCTDecode),
            "JPXDecode" => Some(Filter::JPXDecode),
            "Crypt" => Some(Filter::Crypt),
            _ => None,
        }
    }

    /// The canonical PDF name
    pub fn name(&self) -> &'static str {
        match self {
            Filter::ASCIIHexDecode => "ASCIIHexDecode",
            Filter::ASCII85Decode => "ASCII85Decode",
            Filter::LZWDecode => "LZWDecode",
            Filter::FlateDecode => "FlateDecode",
            Filter::RunLengthDecode => "RunLengthDecode",
            Filter::CCITTFaxDecode => "CCITTFaxDecode",
            Filter::JBIG2Decode => "JBIG2Decode",
            Filter::DCTDecode => "DCTDecode",
            Filter::JPXDecode => "JPXDecode",
            Filter::Crypt => "Crypt",
        }
    }
}

/// Read the `/Filter` entry of a stream dictionary as an ordered name list.
pub fn filter_names(dict: &PdfDictionary) -> FilterResult<Vec<String>> {
    match dict.get("Filter") {
        None => Ok(Vec::new()),
        Some(PdfObject::Name(name)) => Ok(vec![name.as_str().to_string()]),
        Some(PdfObject::Array(array)) => {
            let mut names = Vec::with_capacity(array.len());
            for obj in array.iter() {
                match obj {
                    PdfObject::Name(name) => names.push(name.as_str().to_string()),
                    other => {
                        return Err(FilterError::Decode(format!(
                            "Filter array holds non-name entry: {other:?}"
                        )))
                    }
                }
            }
            Ok(names)
        }
        Some(other) => Err(FilterError::Decode(format!(
            "Filter entry must be a name or array, found {other:?}"
        ))),
    }
}

/// Whether the stream declares decode parameters this implementation cannot
/// honor (a PNG/TIFF predictor).
fn has_unsupported_predictor(dict: &PdfDictionary) -> bool {
    let predictor_of = |obj: &PdfObject| {
        obj.as_dict()
            .and_then(|d| d.get("Predictor"))
            .and_then(|p| p.as_integer())
            .map(|p| p > 1)
            .unwrap_or(false)
    };

    match dict.get("DecodeParms").or_else(|| dict.get("DP")) {
        None => false,
        Some(PdfObject::Array(parms)) => parms.iter().any(predictor_of),
        Some(obj) => predictor_of(obj),
    }
}

/// Decode a stream payload according to its dictionary.
///
/// In strict mode (`lenient == false`) an unrecognized filter or predictor
/// propagates as [`FilterError::Unsupported`]; in lenient mode the raw bytes
/// pass through unchanged.
pub fn decode_stream(data: &[u8], dict: &PdfDictionary, lenient: bool) -> FilterResult<Vec<u8>> {
    let names = filter_names(dict)?;
    if names.is_empty() {
        return Ok(data.to_vec());
    }

    if has_unsupported_predictor(dict) {
        if lenient {
            tracing::warn!("stream declares an unsupported predictor, passing raw bytes through");
            return Ok(data.to_vec());
        }
        return Err(FilterError::Unsupported("DecodeParms predictor".to_string()));
    }

    let mut filters = Vec::with_capacity(names.len());
    for name in &names {
        match Filter::from_name(name) {
            Some(filter) => filters.push(filter),
            None => {
                if lenient {
                    tracing::warn!(filter = %name, "unknown stream filter, passing raw bytes through");
                    return Ok(data.to_vec());
                }
                return Err(FilterError::Unsupported(name.clone()));
            }
        }
    }

    match decode_chain(data, &filters) {
        Ok(decoded) => Ok(decoded),
        Err(FilterError::Unsupported(name)) if lenient => {
            tracing::warn!(filter = %name, "filter not implemented, passing raw bytes through");
            Ok(data.to_vec())
        }
        Err(e) => Err(e),
    }
}

/// Apply a decode chain in declared order.
pub fn decode_chain(data: &[u8], filters: &[Filter]) -> FilterResult<Vec<u8>> {
    let mut result = data.to_vec();
    for filter in filters {
        result = decode(&result, *filter)?;
    }
    Ok(result)
}

/// Apply the encode chain inverse to a declared decode chain: the last
/// declared filter encodes first, so decoding in declared order restores the
/// input.
pub fn encode_chain(data: &[u8], filters: &[Filter]) -> FilterResult<Vec<u8>> {
    let mut result = data.to_vec();
    for filter in filters.iter().rev() {
        result = encode(&result, *filter)?;
    }
    Ok(result)
}

/// Decode one filter's worth of data.
pub fn decode(data: &[u8], filter: Filter) -> FilterResult<Vec<u8>> {
    match filter {
        Filter::FlateDecode => decode_flate(data),
        Filter::LZWDecode => decode_lzw(data),
        Filter::ASCIIHexDecode => decode_ascii_hex(data),
        Filter::ASCII85Decode => decode_ascii85(data),
        Filter::RunLengthDecode => decode_run_length(data),
        other => Err(FilterError::Unsupported(other.name().to_string())),
    }
}

/// Encode one filter's worth of data.
pub fn encode(data: &[u8], filter: Filter) -> FilterResult<Vec<u8>> {
    match filter {
        Filter::FlateDecode => encode_flate(data),
        Filter::LZWDecode => encode_lzw(data),
        Filter::ASCIIHexDecode => Ok(encode_ascii_hex(data)),
        Filter::ASCII85Decode => Ok(encode_ascii85(data)),
        Filter::RunLengthDecode => Ok(encode_run_length(data)),
        other => Err(FilterError::Unsupported(other.name().to_string())),
    }
}

#[cfg(feature = "compression")]
fn decode_flate(data: &[u8]) -> FilterResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut result = Vec::new();
    decoder
        .read_to_end(&mut result)
        .map_err(|e| FilterError::Decode(format!("Flate decode error: {e}")))?;
    Ok(result)
}

#[cfg(not(feature = "compression"))]
fn decode_flate(_data: &[u8]) -> FilterResult<Vec<u8>> {
    Err(FilterError::Unsupported(
        "FlateDecode requires the 'compression' feature".to_string(),
    ))
}

#[cfg(feature = "compression")]
fn encode_flate(data: &[u8]) -> FilterResult<Vec<u8>> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| FilterError::Encode(format!("Flate encode error: {e}")))?;
    encoder
        .finish()
        .map_err(|e| FilterError::Encode(format!("Flate encode error: {e}")))
}

#[cfg(not(feature = "compression"))]
fn encode_flate(_data: &[u8]) -> FilterResult<Vec<u8>> {
    Err(FilterError::Unsupported(
        "FlateDecode requires the 'compression' feature".to_string(),
    ))
}

/// LZW, PDF variant: MSB-first bit order, 8-bit codes, EarlyChange=1.
fn decode_lzw(data: &[u8]) -> FilterResult<Vec<u8>> {
    let mut decoder = weezl::decode::Decoder::new(weezl::BitOrder::Msb, 8);
    let mut output = Vec::new();
    decoder
        .into_vec(&mut output)
        .decode(data)
        .status
        .map_err(|e| FilterError::Decode(format!("LZW decode error: {e}")))?;
    Ok(output)
}

fn encode_lzw(data: &[u8]) -> FilterResult<Vec<u8>> {
    weezl::encode::Encoder::new(weezl::BitOrder::Msb, 8)
        .encode(data)
        .map_err(|e| FilterError::Encode(format!("LZW encode error: {e}")))
}

fn hex_digit_value(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        _ => None,
    }
}

fn decode_ascii_hex(data: &[u8]) -> FilterResult<Vec<u8>> {
    let mut result = Vec::new();
    let mut chars = data.iter().filter(|&&b| !b.is_ascii_whitespace());

    loop {
        let high = match chars.next() {
            Some(&b'>') | None => break,
            Some(&ch) => ch,
        };

        // Odd digit count pads with 0
        let low = match chars.next() {
            Some(&b'>') | None => b'0',
            Some(&ch) => ch,
        };

        let high_val = hex_digit_value(high).ok_or_else(|| {
            FilterError::Decode(format!("Invalid hex digit: {}", high as char))
        })?;
        let low_val = hex_digit_value(low).ok_or_else(|| {
            FilterError::Decode(format!("Invalid hex digit: {}", low as char))
        })?;

        result.push((high_val << 4) | low_val);
    }

    Ok(result)
}

fn encode_ascii_hex(data: &[u8]) -> Vec<u8> {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut result = Vec::with_capacity(data.len() * 2 + 1);
    for byte in data {
        result.push(HEX[(byte >> 4) as usize]);
        result.push(HEX[(byte & 0x0F) as usize]);
    }
    result.push(b'>');
    result
}

fn decode_ascii85(data: &[u8]) -> FilterResult<Vec<u8>> {
    let mut result = Vec::new();
    let mut chars = data.iter().filter(|&&b| !b.is_ascii_whitespace());
    let mut group: Vec<u8> = Vec::with_capacity(5);

    // Optional <~ prefix
    let mut ch = match chars.next() {
        Some(&b'<') => {
            if chars.next() == Some(&b'~') {
                chars.next()
            } else {
                return Err(FilterError::Decode("Invalid ASCII85 prefix".to_string()));
            }
        }
        other => other,
    };

    while let Some(&c) = ch {
        match c {
            b'~' => {
                if chars.next() == Some(&b'>') {
                    break;
                }
                return Err(FilterError::Decode("Invalid ASCII85 end marker".to_string()));
            }
            b'z' if group.is_empty() => {
                result.extend_from_slice(&[0, 0, 0, 0]);
            }
            b'!'..=b'u' => {
                group.push(c);
                if group.len() == 5 {
                    let value = group
                        .iter()
                        .enumerate()
                        .map(|(i, &ch)| (ch - b'!') as u32 * 85u32.pow(4 - i as u32))
                        .sum::<u32>();
                    result.extend_from_slice(&value.to_be_bytes());
                    group.clear();
                }
            }
            _ => {
                return Err(FilterError::Decode(format!(
                    "Invalid ASCII85 character: {}",
                    c as char
                )));
            }
        }
        ch = chars.next();
    }

    // Incomplete final group: pad with 'u', emit len-1 bytes
    if !group.is_empty() {
        let original_len = group.len();
        if original_len == 1 {
            return Err(FilterError::Decode(
                "Truncated ASCII85 final group".to_string(),
            ));
        }
        while group.len() < 5 {
            group.push(b'u');
        }
        let value = group
            .iter()
            .enumerate()
            .map(|(i, &ch)| (ch - b'!') as u32 * 85u32.pow(4 - i as u32))
            .sum::<u32>();
        for i in 0..original_len - 1 {
            result.push((value >> (24 - 8 * i)) as u8);
        }
    }

    Ok(result)
}

fn encode_ascii85(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::new();

    for chunk in data.chunks(4) {
        let mut padded = [0u8; 4];
        padded[..chunk.len()].copy_from_slice(chunk);
        let value = u32::from_be_bytes(padded);

        if value == 0 && chunk.len() == 4 {
            result.push(b'z');
            continue;
        }

        let mut encoded = [0u8; 5];
        let mut remaining = value;
        for slot in encoded.iter_mut().rev() {
            *slot = (remaining % 85) as u8 + b'!';
            remaining /= 85;
        }
        // A short final chunk emits chunk.len() + 1 characters
        result.extend_from_slice(&encoded[..chunk.len() + 1]);
    }

    result.extend_from_slice(b"~>");
    result
}

/// RunLength decode: a length byte 0-127 copies the next length+1 bytes,
/// 129-255 repeats the next byte 257-length times, 128 ends the data.
fn decode_run_length(data: &[u8]) -> FilterResult<Vec<u8>> {
    let mut result = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let length = data[i];
        i += 1;
        match length {
            128 => break,
            0..=127 => {
                let count = length as usize + 1;
                if i + count > data.len() {
                    return Err(FilterError::Decode(
                        "RunLength literal run truncated".to_string(),
                    ));
                }
                result.extend_from_slice(&data[i..i + count]);
                i += count;
            }
            129..=255 => {
                let byte = *data.get(i).ok_or_else(|| {
                    FilterError::Decode("RunLength repeat run truncated".to_string())
                })?;
                i += 1;
                result.extend(std::iter::repeat(byte).take(257 - length as usize));
            }
        }
    }

    Ok(result)
}

fn encode_run_length(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        let mut run_len = 1;
        while i + run_len < data.len() && data[i + run_len] == byte && run_len < 128 {
            run_len += 1;
        }

        if run_len >= 2 {
            result.push((257 - run_len) as u8);
            result.push(byte);
            i += run_len;
        } else {
            let mut literal_len = 1;
            while i + literal_len < data.len()
                && literal_len < 128
                && !(i + literal_len + 1 < data.len()
                    && data[i + literal_len] == data[i + literal_len + 1])
            {
                literal_len += 1;
            }
            result.push((literal_len - 1) as u8);
            result.extend_from_slice(&data[i..i + literal_len]);
            i += literal_len;
        }
    }

    result.push(128);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{PdfArray, PdfName};

    #[test]
    fn test_filter_from_name() {
        assert_eq!(Filter::from_name("FlateDecode"), Some(Filter::FlateDecode));
        assert_eq!(Filter::from_name("Fl"), Some(Filter::FlateDecode));
        assert_eq!(Filter::from_name("LZWDecode"), Some(Filter::LZWDecode));
        assert_eq!(Filter::from_name("NoSuchFilter"), None);
    }

    #[test]
    fn test_ascii_hex_decode() {
        assert_eq!(decode_ascii_hex(b"48656C6C6F>").unwrap(), b"Hello");
        assert_eq!(decode_ascii_hex(b"48 65 6C 6C 6F>").unwrap(), b"Hello");
        // Odd digit count pads with zero
        assert_eq!(decode_ascii_hex(b"7>").unwrap(), b"\x70");
        assert!(decode_ascii_hex(b"GG>").is_err());
    }

    #[test]
    fn test_ascii85_decode() {
        assert_eq!(decode_ascii85(b"87cURD]j7BEbo80~>").unwrap(), b"Hello world!");
        assert_eq!(decode_ascii85(b"z~>").unwrap(), &[0, 0, 0, 0]);
        assert_eq!(decode_ascii85(b"~>").unwrap(), b"");
        assert!(decode_ascii85(b"\xff~>").is_err());
    }

    #[test]
    fn test_run_length_decode() {
        // literal run of 3, repeat run of 4, EOD
        let encoded = [2u8, b'a', b'b', b'c', 253, b'x', 128];
        assert_eq!(decode_run_length(&encoded).unwrap(), b"abcxxxx");
    }

    #[test]
    fn test_single_filter_round_trips() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(2048).collect();
        for filter in [
            Filter::FlateDecode,
            Filter::LZWDecode,
            Filter::ASCIIHexDecode,
            Filter::ASCII85Decode,
            Filter::RunLengthDecode,
        ] {
            let encoded = encode(&payload, filter).unwrap();
            let decoded = decode(&encoded, filter).unwrap();
            assert_eq!(decoded, payload, "round trip failed for {filter:?}");
        }
    }

    #[test]
    fn test_chain_round_trip_matches_declared_order() {
        let payload = b"the quick brown fox jumps over the lazy dog".repeat(7);
        let chain = [Filter::FlateDecode, Filter::ASCIIHexDecode];

        let encoded = encode_chain(&payload, &chain).unwrap();
        // The outermost representation is what the first declared decode
        // filter consumes: flate bytes wrapping ASCIIHex text.
        let decoded = decode_chain(&encoded, &chain).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_run_length_round_trip_degenerate() {
        for payload in [&b""[..], &b"a"[..], &b"aaaaaaaa"[..], &b"abababab"[..]] {
            let encoded = encode_run_length(payload);
            assert_eq!(decode_run_length(&encoded).unwrap(), payload);
        }
        // Runs longer than the 128-byte cap split correctly
        let long = vec![b'q'; 500];
        assert_eq!(decode_run_length(&encode_run_length(&long)).unwrap(), long);
    }

    #[test]
    fn test_decode_stream_no_filter() {
        let dict = PdfDictionary::new();
        assert_eq!(decode_stream(b"plain", &dict, false).unwrap(), b"plain");
    }

    #[test]
    fn test_decode_stream_filter_array() {
        let payload = b"stacked filters";
        let chain = [Filter::FlateDecode, Filter::ASCII85Decode];
        let encoded = encode_chain(payload, &chain).unwrap();

        let mut dict = PdfDictionary::new();
        dict.insert(
            "Filter",
            PdfObject::Array(PdfArray(vec![
                PdfObject::Name(PdfName::new("FlateDecode")),
                PdfObject::Name(PdfName::new("ASCII85Decode")),
            ])),
        );
        assert_eq!(decode_stream(&encoded, &dict, false).unwrap(), payload);
    }

    #[test]
    fn test_decode_stream_unknown_filter_strict_vs_lenient() {
        let mut dict = PdfDictionary::new();
        dict.insert("Filter", PdfObject::Name(PdfName::new("Bogus")));

        assert!(matches!(
            decode_stream(b"data", &dict, false),
            Err(FilterError::Unsupported(_))
        ));
        assert_eq!(decode_stream(b"data", &dict, true).unwrap(), b"data");
    }

    #[test]
    fn test_decode_stream_invalid_filter_type() {
        let mut dict = PdfDictionary::new();
        dict.insert("Filter", PdfObject::Integer(42));
        assert!(decode_stream(b"data", &dict, false).is_err());
    }

    #[test]
    fn test_unsupported_predictor() {
        let mut parms = PdfDictionary::new();
        parms.insert("Predictor", PdfObject::Integer(12));
        let mut dict = PdfDictionary::new();
        dict.insert("Filter", PdfObject::Name(PdfName::new("FlateDecode")));
        dict.insert("DecodeParms", PdfObject::Dictionary(parms));

        assert!(matches!(
            decode_stream(b"data", &dict, false),
            Err(FilterError::Unsupported(_))
        ));
        assert_eq!(decode_stream(b"data", &dict, true).unwrap(), b"data");
    }

    #[test]
    fn test_image_codecs_are_dispatch_only() {
        for filter in [Filter::DCTDecode, Filter::JPXDecode, Filter::CCITTFaxDecode] {
            assert!(matches!(decode(b"", filter), Err(FilterError::Unsupported(_))));
        }
    }
}
