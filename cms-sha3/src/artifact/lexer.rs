//! Tokenizer for the dictionary syntax of signature fields.
//!
//! The syntax is the PDF object syntax: names (`/Type`), numbers, literal strings
//! (`(...)` with escapes and balanced parentheses), hex strings (`<...>`), the keywords
//! `true`, `false` and `null`, and the delimiters `[`, `]`, `<<` and `>>`.
//! Whitespace and `%` comments between tokens are skipped.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while, take_while1},
    character::complete::{char, digit0, digit1, one_of},
    combinator::{map, opt, recognize, value},
    error::{Error, ErrorKind},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token<'a> {
    Integer(i64),
    Real(f64),
    /// Raw bytes between the parentheses, escapes are not decoded yet.
    LiteralString(&'a [u8]),
    /// Raw bytes between the angle brackets, whitespace included.
    HexString(&'a [u8]),
    Name(String),
    True,
    False,
    Null,
    ArrayStart,
    ArrayEnd,
    DictStart,
    DictEnd,
}

pub(crate) fn error(input: &[u8], kind: ErrorKind) -> nom::Err<Error<&[u8]>> {
    nom::Err::Error(Error::new(input, kind))
}

fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

fn is_delimiter(c: u8) -> bool {
    matches!(
        c,
        b'/' | b'%' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}'
    )
}

fn whitespace(input: &[u8]) -> IResult<&[u8], ()> {
    value((), take_while1(is_whitespace))(input)
}

fn comment(input: &[u8]) -> IResult<&[u8], ()> {
    value((), preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n')))(input)
}

/// Skips whitespace and comments, never fails.
pub(crate) fn skip_ws(input: &[u8]) -> IResult<&[u8], ()> {
    let mut remaining = input;
    while let Ok((rest, _)) = alt((whitespace, comment))(remaining) {
        remaining = rest;
    }
    Ok((remaining, ()))
}

/// `42`, `-7`, `+3`, `3.14`, `.5`, `5.`
fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, text) = recognize(pair(
        opt(one_of("+-")),
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
    ))(input)?;
    let text = core::str::from_utf8(text).map_err(|_| error(input, ErrorKind::Digit))?;
    let token = if text.contains('.') {
        text.parse().map(Token::Real).ok()
    } else {
        text.parse().map(Token::Integer).ok()
    };
    token
        .map(|token| (rest, token))
        .ok_or_else(|| error(input, ErrorKind::Digit))
}

/// Literal string with balanced parentheses. Escaped parentheses do not count.
fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (remaining, _) = char('(')(input)?;
    let mut depth = 1usize;
    let mut pos = 0;
    while depth > 0 {
        match remaining.get(pos) {
            None => return Err(error(input, ErrorKind::Eof)),
            Some(b'\\') => pos += 2,
            Some(b'(') => {
                depth += 1;
                pos += 1;
            }
            Some(b')') => {
                depth -= 1;
                pos += 1;
            }
            Some(_) => pos += 1,
        }
    }
    Ok((&remaining[pos..], Token::LiteralString(&remaining[..pos - 1])))
}

fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.starts_with(b"<<") {
        return Err(error(input, ErrorKind::Tag));
    }
    delimited(
        char('<'),
        map(
            take_while(|c: u8| c.is_ascii_hexdigit() || is_whitespace(c)),
            Token::HexString,
        ),
        char('>'),
    )(input)
}

fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(
        char('/'),
        map(
            take_while(|c: u8| !is_whitespace(c) && !is_delimiter(c)),
            |bytes: &[u8]| Token::Name(decode_name(bytes)),
        ),
    )(input)
}

/// Decodes `#XX` escapes, invalid sequences are kept as they are.
fn decode_name(bytes: &[u8]) -> String {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escaped = (bytes[i] == b'#')
            .then(|| bytes.get(i + 1..i + 3))
            .flatten()
            .and_then(|hex| core::str::from_utf8(hex).ok())
            .and_then(|hex| u8::from_str_radix(hex, 16).ok());
        match escaped {
            Some(byte) => {
                out.push(byte);
                i += 3;
            }
            None => {
                out.push(bytes[i]);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Keywords must be followed by a delimiter, `nullify` is not `null`.
fn parse_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, token) = alt((
        value(Token::False, tag(b"false")),
        value(Token::True, tag(b"true")),
        value(Token::Null, tag(b"null")),
    ))(input)?;
    match rest.first() {
        Some(&c) if !is_whitespace(c) && !is_delimiter(c) => Err(error(input, ErrorKind::Tag)),
        _ => Ok((rest, token)),
    }
}

fn parse_delimiter(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
    ))(input)
}

/// Skips leading whitespace and reads one token.
pub(crate) fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (input, _) = skip_ws(input)?;
    alt((
        parse_delimiter,
        parse_keyword,
        parse_name,
        parse_number,
        parse_literal_string,
        parse_hex_string,
    ))(input)
}

/// Whether `input` starts with `<< /Type /Sig`, in any spacing.
pub(crate) fn signature_dictionary_start(input: &[u8]) -> bool {
    tuple((token, token, token))(input).is_ok_and(|(_, tokens)| {
        tokens
            == (
                Token::DictStart,
                Token::Name("Type".to_string()),
                Token::Name("Sig".to_string()),
            )
    })
}

/// Decodes the escapes of a literal string: `\n \r \t \b \f \( \) \\`, octal `\ddd`
/// and backslash line continuations.
pub(crate) fn decode_literal_string(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] != b'\\' || i + 1 == raw.len() {
            out.push(raw[i]);
            i += 1;
            continue;
        }
        i += 1;
        match raw[i] {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'\r' if raw.get(i + 1) == Some(&b'\n') => i += 1,
            b'\r' | b'\n' => {}
            b'0'..=b'7' => {
                let digits = raw[i..]
                    .iter()
                    .take(3)
                    .take_while(|c| (b'0'..=b'7').contains(*c))
                    .count();
                let octal = raw[i..i + digits]
                    .iter()
                    .fold(0u16, |acc, c| acc * 8 + u16::from(c - b'0'));
                out.push(octal as u8);
                i += digits - 1;
            }
            other => out.push(other),
        }
        i += 1;
    }
    out
}
