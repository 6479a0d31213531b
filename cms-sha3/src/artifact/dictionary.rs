//! Reading and writing of signature dictionaries.
//!
//! A signature dictionary is appended to the protected document and looks like
//!
//! ```text
//! << /Type /Sig /Filter /Adobe.PPKLite /SubFilter /ETSI.CAdES.detached /M (D:20240101120000Z)
//!    /Reason (Approval) /ByteRange [0000000000 0000000123 0000016509 0000000004] /Contents <3082...0000> >>
//! ```
//!
//! The `/ByteRange` entries have a fixed width so they can be patched in place once the
//! position of `/Contents` is known.

use crate::artifact::lexer::{
    decode_literal_string, error, signature_dictionary_start, skip_ws, token, Token,
};
use cms_sha3_common::{CmsError, Result};
use core::ops::Range;
use nom::error::ErrorKind;
use nom::IResult;

pub(crate) const BYTE_RANGE_WIDTH: usize = 10;
/// Deeper nesting of arrays and dictionaries is rejected.
const MAX_DEPTH: usize = 32;

/// Value of a dictionary entry.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Object {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(Vec<u8>),
    /// Hex string with the span of its `<...>` encoding in the artifact.
    Hex { bytes: Vec<u8>, span: Range<usize> },
    Name(String),
    Array(Vec<Object>),
    Dictionary(Vec<(String, Object)>),
}

/// Object parser over a suffix of the artifact, `total` is the artifact length so that
/// offsets can be derived from the remaining input.
struct Parser {
    total: usize,
}

impl Parser {
    fn offset(&self, input: &[u8]) -> usize {
        self.total - input.len()
    }

    fn object<'a>(&self, input: &'a [u8], depth: usize) -> IResult<&'a [u8], Object> {
        let (input, _) = skip_ws(input)?;
        let start = self.offset(input);
        let (rest, tok) = token(input)?;
        let object = match tok {
            Token::Null => Object::Null,
            Token::True => Object::Boolean(true),
            Token::False => Object::Boolean(false),
            Token::Integer(i) => Object::Integer(i),
            Token::Real(r) => Object::Real(r),
            Token::LiteralString(raw) => Object::String(decode_literal_string(raw)),
            Token::HexString(raw) => Object::Hex {
                bytes: decode_hex(raw).ok_or_else(|| nom::Err::Failure(nom::error::Error::new(
                    input,
                    ErrorKind::HexDigit,
                )))?,
                span: start..self.offset(rest),
            },
            Token::Name(name) => Object::Name(name),
            Token::ArrayStart if depth < MAX_DEPTH => return self.array(rest, depth + 1),
            Token::DictStart if depth < MAX_DEPTH => return self.dictionary(rest, depth + 1),
            Token::ArrayStart | Token::DictStart => {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    input,
                    ErrorKind::TooLarge,
                )))
            }
            Token::ArrayEnd | Token::DictEnd => return Err(error(input, ErrorKind::Tag)),
        };
        Ok((rest, object))
    }

    fn array<'a>(&self, mut input: &'a [u8], depth: usize) -> IResult<&'a [u8], Object> {
        let mut objects = vec![];
        loop {
            if let Ok((rest, Token::ArrayEnd)) = token(input) {
                return Ok((rest, Object::Array(objects)));
            }
            let (rest, object) = self.object(input, depth)?;
            objects.push(object);
            input = rest;
        }
    }

    /// Entries after the opening `<<`. Keys keep their order, duplicates included.
    fn dictionary<'a>(&self, mut input: &'a [u8], depth: usize) -> IResult<&'a [u8], Object> {
        let mut entries = vec![];
        loop {
            match token(input)? {
                (rest, Token::DictEnd) => return Ok((rest, Object::Dictionary(entries))),
                (rest, Token::Name(key)) => {
                    let (rest, value) = self.object(rest, depth)?;
                    entries.push((key, value));
                    input = rest;
                }
                _ => return Err(error(input, ErrorKind::Tag)),
            }
        }
    }
}

/// Hex digits with whitespace, an odd digit count is padded with `0`.
fn decode_hex(raw: &[u8]) -> Option<Vec<u8>> {
    let mut digits = raw
        .iter()
        .copied()
        .filter(|c| !c.is_ascii_whitespace() && *c != 0x00 && *c != 0x0C)
        .collect::<Vec<_>>();
    if digits.len() % 2 == 1 {
        digits.push(b'0');
    }
    hex::decode(digits).ok()
}

fn malformed(msg: impl Into<String>) -> CmsError {
    CmsError::MalformedField(msg.into())
}

/// Parses the object starting at `offset` of `data`.
pub(crate) fn parse_object(data: &[u8], offset: usize) -> Result<Object> {
    let input = data
        .get(offset..)
        .ok_or_else(|| malformed(format!("offset {offset} is out of bounds")))?;
    let parser = Parser { total: data.len() };
    parser
        .object(input, 0)
        .map(|(_, object)| object)
        .map_err(|e| match e {
            nom::Err::Error(e) | nom::Err::Failure(e) if !e.input.is_empty() => malformed(
                format!("{:?} at offset {}", e.code, parser.offset(e.input)),
            ),
            _ => malformed("unexpected end of data"),
        })
}

/// Decoded `/Contents` value and the span of its `<...>` encoding in the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contents {
    pub bytes: Vec<u8>,
    pub span: Range<usize>,
}

/// Parsed signature dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureDictionary {
    pub offset: usize,
    pub filter: Option<String>,
    pub sub_filter: Option<String>,
    pub signing_time: Option<String>,
    pub reason: Option<String>,
    pub location: Option<String>,
    pub byte_range: Option<Vec<u64>>,
    pub contents: Option<Contents>,
}

fn text(key: &str, value: Object) -> Result<String> {
    match value {
        Object::String(bytes) | Object::Hex { bytes, .. } => {
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        other => Err(malformed(format!("/{key} is not a string: {other:?}"))),
    }
}

fn name(key: &str, value: Object) -> Result<String> {
    match value {
        Object::Name(name) => Ok(name),
        other => Err(malformed(format!("/{key} is not a name: {other:?}"))),
    }
}

impl SignatureDictionary {
    /// Parses the dictionary that starts at `offset`. Unknown entries are skipped.
    pub fn parse(data: &[u8], offset: usize) -> Result<Self> {
        let Object::Dictionary(entries) = parse_object(data, offset)? else {
            return Err(malformed("signature field is not a dictionary"));
        };
        let mut dictionary = SignatureDictionary {
            offset,
            ..Default::default()
        };
        let mut is_signature = false;
        for (key, value) in entries {
            match key.as_str() {
                "Type" => is_signature = name(&key, value)? == "Sig",
                "Filter" => dictionary.filter = Some(name(&key, value)?),
                "SubFilter" => dictionary.sub_filter = Some(name(&key, value)?),
                "M" => dictionary.signing_time = Some(text(&key, value)?),
                "Reason" => dictionary.reason = Some(text(&key, value)?),
                "Location" => dictionary.location = Some(text(&key, value)?),
                "ByteRange" => {
                    let Object::Array(values) = value else {
                        return Err(malformed("/ByteRange is not an array"));
                    };
                    let values = values
                        .into_iter()
                        .map(|value| match value {
                            Object::Integer(i) => u64::try_from(i).ok(),
                            _ => None,
                        })
                        .collect::<Option<Vec<_>>>()
                        .ok_or_else(|| malformed("/ByteRange must hold non-negative integers"))?;
                    dictionary.byte_range = Some(values);
                }
                "Contents" => {
                    let Object::Hex { bytes, span } = value else {
                        return Err(malformed("/Contents is not a hex string"));
                    };
                    dictionary.contents = Some(Contents { bytes, span });
                }
                _ => {}
            }
        }
        if !is_signature {
            return Err(malformed("/Type is not /Sig"));
        }
        Ok(dictionary)
    }
}

/// Offsets of `data` where a dictionary starting with `/Type /Sig` begins.
pub fn find_signature_dictionaries(data: &[u8]) -> Vec<usize> {
    data.windows(2)
        .enumerate()
        .filter(|(_, window)| *window == b"<<")
        .map(|(offset, _)| offset)
        .filter(|offset| signature_dictionary_start(&data[*offset..]))
        .collect()
}

pub(crate) fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('(');
    for c in s.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push(')');
    out
}

pub(crate) fn format_byte_range(byte_range: &[u64; 4]) -> String {
    let [a, b, c, d] = byte_range;
    let w = BYTE_RANGE_WIDTH;
    format!("[{a:0w$} {b:0w$} {c:0w$} {d:0w$}]")
}
