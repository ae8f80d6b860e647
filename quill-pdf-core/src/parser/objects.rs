//! PDF Object Grammar
//!
//! Parses objects from the token stream according to ISO 32000-1 Section 7.3.
//! Stateless: every function threads the explicit [`ParseContext`] for depth
//! and loop control. The `<int> <int> R` reference pattern is collapsed by
//! bounded token lookahead with push-back and never parses its target — the
//! loader dereferences on demand and memoizes the result.

use super::context::ParseContext;
use super::lexer::{Lexer, Token};
use super::{ParseError, ParseOptions, ParseResult};
use crate::objects::{ObjectId, PdfArray, PdfDictionary, PdfName, PdfObject, PdfStream, PdfString};
use std::io::{Read, Seek};
use tracing::warn;

/// Upper bound for the `endstream` repair scan
const STREAM_SCAN_LIMIT: usize = 64 * 1024 * 1024;

/// Parse one object at the lexer's position.
pub fn parse_object<R: Read + Seek>(
    lexer: &mut Lexer<R>,
    ctx: &mut ParseContext,
    options: &ParseOptions,
) -> ParseResult<PdfObject> {
    let token = next_meaningful_token(lexer)?;
    parse_from_token(lexer, token, ctx, options)
}

fn next_meaningful_token<R: Read>(lexer: &mut Lexer<R>) -> ParseResult<Token> {
    loop {
        match lexer.next_token()? {
            Token::Comment(_) => continue,
            token => return Ok(token),
        }
    }
}

fn parse_from_token<R: Read + Seek>(
    lexer: &mut Lexer<R>,
    token: Token,
    ctx: &mut ParseContext,
    options: &ParseOptions,
) -> ParseResult<PdfObject> {
    match token {
        Token::Null => Ok(PdfObject::Null),
        Token::Boolean(b) => Ok(PdfObject::Boolean(b)),
        Token::Integer(i) => match try_parse_reference(lexer, i)? {
            Some(id) => Ok(PdfObject::Reference(id)),
            None => Ok(PdfObject::Integer(i)),
        },
        Token::Real(r) => Ok(PdfObject::Real(r)),
        Token::String(s) => Ok(PdfObject::String(PdfString(s))),
        Token::Name(n) => Ok(PdfObject::Name(PdfName(n))),
        Token::ArrayStart => {
            ctx.enter()?;
            let result = parse_array(lexer, ctx, options);
            ctx.exit();
            result
        }
        Token::DictStart => {
            ctx.enter()?;
            let result = parse_dictionary_or_stream(lexer, ctx, options);
            ctx.exit();
            result
        }
        Token::Eof => Err(ParseError::SyntaxError {
            position: lexer.position(),
            message: "unexpected end of input".to_string(),
        }),
        other => Err(ParseError::UnexpectedToken {
            expected: "object".to_string(),
            found: format!("{other:?}"),
        }),
    }
}

/// Collapse `<int> <int> R` into a reference. On any mismatch the extra
/// tokens are pushed back untouched.
fn try_parse_reference<R: Read>(
    lexer: &mut Lexer<R>,
    first: i64,
) -> ParseResult<Option<ObjectId>> {
    if first < 0 || first > u32::MAX as i64 {
        return Ok(None);
    }

    let second = lexer.next_token()?;
    if let Token::Integer(gen) = second {
        if (0..=u16::MAX as i64).contains(&gen) {
            let third = lexer.next_token()?;
            if third == Token::Ref {
                return Ok(Some(ObjectId::new(first as u32, gen as u16)));
            }
            // Push back in LIFO order: the generation candidate pops first
            lexer.push_token(third);
            lexer.push_token(Token::Integer(gen));
            return Ok(None);
        }
    }
    lexer.push_token(second);
    Ok(None)
}

fn parse_array<R: Read + Seek>(
    lexer: &mut Lexer<R>,
    ctx: &mut ParseContext,
    options: &ParseOptions,
) -> ParseResult<PdfObject> {
    let mut elements = Vec::new();

    loop {
        match lexer.next_token()? {
            Token::ArrayEnd => break,
            Token::Comment(_) => continue,
            Token::Eof => {
                return Err(ParseError::SyntaxError {
                    position: lexer.position(),
                    message: "unterminated array".to_string(),
                })
            }
            token => {
                let obj = parse_from_token(lexer, token, ctx, options)?;
                elements.push(obj);
            }
        }
    }

    Ok(PdfObject::Array(PdfArray(elements)))
}

/// Parse a dictionary, then decide stream vs. plain dictionary from the
/// token that follows `>>`.
fn parse_dictionary_or_stream<R: Read + Seek>(
    lexer: &mut Lexer<R>,
    ctx: &mut ParseContext,
    options: &ParseOptions,
) -> ParseResult<PdfObject> {
    let dict = parse_dictionary_inner(lexer, ctx, options)?;

    loop {
        match lexer.next_token()? {
            Token::Stream => {
                let (dict, data) = parse_stream_payload(lexer, dict, options)?;
                return Ok(PdfObject::Stream(PdfStream { dict, data }));
            }
            Token::Comment(_) => continue,
            token => {
                lexer.push_token(token);
                return Ok(PdfObject::Dictionary(dict));
            }
        }
    }
}

fn parse_dictionary_inner<R: Read + Seek>(
    lexer: &mut Lexer<R>,
    ctx: &mut ParseContext,
    options: &ParseOptions,
) -> ParseResult<PdfDictionary> {
    let mut dict = PdfDictionary::new();

    loop {
        match lexer.next_token()? {
            Token::DictEnd => break,
            Token::Comment(_) => continue,
            Token::Name(key) => {
                let value = parse_object(lexer, ctx, options)?;
                dict.insert(key, value);
            }
            Token::Eof => {
                return Err(ParseError::SyntaxError {
                    position: lexer.position(),
                    message: "unterminated dictionary".to_string(),
                })
            }
            other => {
                return Err(ParseError::UnexpectedToken {
                    expected: "dictionary key (name) or >>".to_string(),
                    found: format!("{other:?}"),
                });
            }
        }
    }

    Ok(dict)
}

/// Read a stream payload after the `stream` keyword.
///
/// Uses the declared `/Length` when it is a direct non-negative integer and
/// `endstream` follows where it should. Otherwise (indirect `/Length`, wrong
/// value, missing key) the payload boundary is recovered by scanning for
/// `endstream`, and the dictionary entry is corrected — the returned stream
/// always declares its actual raw byte count.
fn parse_stream_payload<R: Read + Seek>(
    lexer: &mut Lexer<R>,
    mut dict: PdfDictionary,
    options: &ParseOptions,
) -> ParseResult<(PdfDictionary, Vec<u8>)> {
    // EOL after the keyword; tolerate its absence in lenient mode
    if lexer.read_newline().is_err() {
        if !options.lenient {
            return Err(ParseError::SyntaxError {
                position: lexer.position(),
                message: "expected newline after 'stream' keyword".to_string(),
            });
        }
        warn!(position = lexer.position(), "missing newline after 'stream' keyword");
        lexer.skip_whitespace()?;
    }

    let payload_start = lexer.save_position()?;

    let declared = dict
        .get("Length")
        .and_then(|obj| obj.as_integer())
        .filter(|len| *len >= 0)
        .map(|len| len as usize);

    if let Some(length) = declared {
        match lexer.read_bytes(length) {
            Ok(data) => {
                lexer.skip_whitespace()?;
                let verified = matches!(lexer.next_token(), Ok(Token::EndStream));
                if verified {
                    return Ok((dict, data));
                }
                if !options.lenient {
                    return Err(ParseError::SyntaxError {
                        position: lexer.position(),
                        message: format!("declared /Length {length} does not reach 'endstream'"),
                    });
                }
                warn!(
                    declared = length,
                    "declared /Length does not reach 'endstream', rescanning"
                );
            }
            Err(_) if options.lenient => {
                warn!(declared = length, "stream payload truncated, rescanning");
            }
            Err(_) => {
                return Err(ParseError::SyntaxError {
                    position: lexer.position(),
                    message: format!("stream payload truncated before {length} bytes"),
                });
            }
        }
        lexer.restore_position(payload_start)?;
    }

    // Boundary recovery: everything up to `endstream`, minus one trailing EOL
    let distance = lexer
        .find_keyword_ahead("endstream", STREAM_SCAN_LIMIT)?
        .ok_or_else(|| ParseError::SyntaxError {
            position: lexer.position(),
            message: "'endstream' not found".to_string(),
        })?;

    let mut data = lexer.read_bytes(distance)?;
    if data.ends_with(b"\r\n") {
        data.truncate(data.len() - 2);
    } else if data.ends_with(b"\n") || data.ends_with(b"\r") {
        data.truncate(data.len() - 1);
    }

    lexer.expect_keyword(Token::EndStream)?;
    dict.insert("Length", PdfObject::Integer(data.len() as i64));

    Ok((dict, data))
}

/// Parse a full `N G obj … endobj` body at the lexer's position.
///
/// `expected` checks the header against the cross-reference entry that led
/// here; mismatches are fatal in strict mode and repaired with a warning in
/// lenient mode.
pub fn parse_indirect_object<R: Read + Seek>(
    lexer: &mut Lexer<R>,
    expected: Option<ObjectId>,
    ctx: &mut ParseContext,
    options: &ParseOptions,
) -> ParseResult<(ObjectId, PdfObject)> {
    let position = lexer.position();

    let number = match next_meaningful_token(lexer)? {
        Token::Integer(n) if (0..=u32::MAX as i64).contains(&n) => n as u32,
        token => {
            return Err(ParseError::UnexpectedToken {
                expected: "object number".to_string(),
                found: format!("{token:?}"),
            })
        }
    };

    let generation = match lexer.next_token()? {
        Token::Integer(g) if (0..=u16::MAX as i64).contains(&g) => g as u16,
        token => {
            return Err(ParseError::UnexpectedToken {
                expected: "generation number".to_string(),
                found: format!("{token:?}"),
            })
        }
    };

    let id = ObjectId::new(number, generation);
    if let Some(expected_id) = expected {
        if expected_id != id {
            if !options.lenient {
                return Err(ParseError::SyntaxError {
                    position,
                    message: format!("object header mismatch: expected {expected_id}, found {id}"),
                });
            }
            warn!(%expected_id, %id, "object header mismatch");
        }
    }

    lexer.expect_keyword(Token::Obj)?;

    let object = parse_object(lexer, ctx, options)?;

    match lexer.next_token()? {
        Token::EndObj => {}
        token if options.lenient => {
            warn!(%id, found = ?token, "expected 'endobj' keyword");
            lexer.push_token(token);
        }
        token => {
            return Err(ParseError::UnexpectedToken {
                expected: "endobj".to_string(),
                found: format!("{token:?}"),
            })
        }
    }

    Ok((id, object))
}
