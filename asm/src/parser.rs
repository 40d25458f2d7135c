use gxarch::{inst::Immediate, SectionKind};

use crate::error::Error;

// ----------------------------------------------------------------------------
// Line

/// One source line split at the first `;`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    pub code: &'a str,
    pub comment: Option<&'a str>,
}

impl<'a> Line<'a> {
    pub fn parse(raw: &'a str) -> Self {
        match raw.split_once(';') {
            Some((code, comment)) => Line {
                code: code.trim(),
                comment: Some(comment),
            },
            None => Line {
                code: raw.trim(),
                comment: None,
            },
        }
    }
}

// ----------------------------------------------------------------------------
// Statement

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt<'a> {
    /// Section switch, with any data words written on the same line.
    Directive(SectionKind, Vec<&'a str>),
    Label(&'a str),
    Code {
        mnemonic: &'a str,
        operands: Vec<&'a str>,
    },
    Data(Vec<&'a str>),
}

impl<'a> Stmt<'a> {
    /// Classifies a comment-free line; `section` decides between code and data.
    pub fn parse(code: &'a str, section: SectionKind) -> Result<Option<Stmt<'a>>, Error> {
        if code.is_empty() {
            return Ok(None);
        }

        if let Some(rest) = code.strip_prefix('.') {
            let (name, tail) = rest
                .split_once(char::is_whitespace)
                .unwrap_or((rest, ""));
            let kind = name
                .parse::<SectionKind>()
                .map_err(|_| Error::UnknownDirective(format!(".{name}")))?;
            let words = tokens(tail);
            if kind == SectionKind::Code {
                if let Some(word) = words.first() {
                    return Err(Error::MalformedLiteral(word.to_string()));
                }
            }
            return Ok(Some(Stmt::Directive(kind, words)));
        }

        if section != SectionKind::Code {
            return Ok(Some(Stmt::Data(tokens(code))));
        }

        if let Some(label) = code.strip_suffix(':') {
            return Ok(Some(Stmt::Label(label.trim())));
        }

        let mut words = tokens(code).into_iter();
        match words.next() {
            Some(mnemonic) => Ok(Some(Stmt::Code {
                mnemonic,
                operands: words.collect(),
            })),
            None => Ok(None),
        }
    }
}

/// Splits on commas and whitespace.
pub fn tokens(s: &str) -> Vec<&str> {
    s.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect()
}

/// A leading `.` would read as a directive, so it is not allowed.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(head) if head.is_ascii_alphabetic() || head == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        }
        _ => false,
    }
}

// ----------------------------------------------------------------------------
// Literals

/// Starts like a number: a digit, or `.`/sign followed by one.
pub fn is_numeric(s: &str) -> bool {
    let s = s.strip_prefix(['+', '-']).unwrap_or(s);
    let s = s.strip_prefix('.').unwrap_or(s);
    s.starts_with(|c: char| c.is_ascii_digit())
}

fn split_radix(s: &str) -> (u32, &str) {
    match s.get(..2) {
        Some("0b" | "0B") => (2, &s[2..]),
        Some("0o" | "0O") => (8, &s[2..]),
        Some("0x" | "0X") => (16, &s[2..]),
        _ => (10, s),
    }
}

fn looks_float(s: &str) -> bool {
    let body = s.strip_prefix(['+', '-']).unwrap_or(s);
    if split_radix(body).0 != 10 {
        return false;
    }
    body.contains(['.', 'e', 'E']) || body.ends_with(['f', 'F'])
}

pub fn parse_int(s: &str) -> Option<i64> {
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (radix, digits) = split_radix(body);
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return None;
    }
    let magnitude = u64::from_str_radix(digits, radix).ok()? as i128;
    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value).ok()
}

pub fn parse_float(s: &str) -> Option<f32> {
    let body = s.strip_suffix(['f', 'F']).unwrap_or(s);
    if !is_numeric(body) {
        return None;
    }
    body.parse::<f32>().ok().filter(|v| v.is_finite())
}

/// Literal text after the `#` sigil, or a bare number.
pub fn parse_immediate(s: &str) -> Option<Immediate> {
    if looks_float(s) {
        parse_float(s).map(Immediate::float)
    } else {
        parse_int(s).map(Immediate::int)
    }
}

/// A data word: 32 bits signed or unsigned; floats only where `allow_float`.
pub fn parse_data(token: &str, allow_float: bool) -> Result<u32, Error> {
    let malformed = || Error::MalformedLiteral(token.to_string());
    if looks_float(token) {
        return match (allow_float, parse_float(token)) {
            (true, Some(v)) => Ok(v.to_bits()),
            _ => Err(malformed()),
        };
    }
    let value = parse_int(token).ok_or_else(malformed)?;
    if let Ok(v) = u32::try_from(value) {
        Ok(v)
    } else if let Ok(v) = i32::try_from(value) {
        Ok(v as u32)
    } else {
        Err(malformed())
    }
}
