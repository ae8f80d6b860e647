//! Compressed Object Containers
//!
//! PDF 1.5+ object streams (`/Type /ObjStm`) pack many small objects into
//! one stream payload: a table of `number offset` pairs, then the object
//! bodies, all relative to `/First`. Type-2 cross-reference entries resolve
//! through these containers.

use super::context::ParseContext;
use super::lexer::{Lexer, Token};
use super::{objects, ParseError, ParseOptions, ParseResult};
use crate::objects::{PdfObject, PdfStream};
use std::collections::HashMap;
use std::io::Cursor;

/// A parsed object container: every member object, eagerly decoded.
#[derive(Debug)]
pub struct ObjectStream {
    objects: HashMap<u32, PdfObject>,
}

impl ObjectStream {
    /// Decode the container payload and parse all member objects.
    pub fn parse(stream: &PdfStream, options: &ParseOptions) -> ParseResult<Self> {
        let dict = &stream.dict;

        let count = dict
            .get("N")
            .and_then(|obj| obj.as_integer())
            .filter(|n| *n >= 0)
            .ok_or_else(|| ParseError::MissingKey("N".to_string()))? as u32;

        let first = dict
            .get("First")
            .and_then(|obj| obj.as_integer())
            .filter(|f| *f >= 0)
            .ok_or_else(|| ParseError::MissingKey("First".to_string()))? as u64;

        let data = stream.decoded().map_err(ParseError::Filter)?;

        // Pair table: N (number, relative offset) pairs
        let mut cursor = Cursor::new(&data[..]);
        let mut lexer = Lexer::new(&mut cursor);
        let mut pairs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let number = match lexer.next_token()? {
                Token::Integer(n) if n >= 0 => n as u32,
                token => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "object number in container".to_string(),
                        found: format!("{token:?}"),
                    })
                }
            };
            let offset = match lexer.next_token()? {
                Token::Integer(n) if n >= 0 => n as u64,
                token => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "object offset in container".to_string(),
                        found: format!("{token:?}"),
                    })
                }
            };
            pairs.push((number, offset));
        }

        // Member bodies are direct objects, no obj/endobj brackets
        let mut members = HashMap::with_capacity(pairs.len());
        for (number, offset) in pairs {
            let position = first + offset;
            if position > data.len() as u64 {
                return Err(ParseError::SyntaxError {
                    position,
                    message: format!("container member {number} starts past payload end"),
                });
            }
            let mut cursor = Cursor::new(&data[..]);
            cursor.set_position(position);
            let mut lexer = Lexer::new_at(&mut cursor, position);
            let mut ctx = ParseContext::new();
            let object = objects::parse_object(&mut lexer, &mut ctx, options)?;
            members.insert(number, object);
        }

        Ok(Self { objects: members })
    }

    pub fn get(&self, number: u32) -> Option<&PdfObject> {
        self.objects.get(&number)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
