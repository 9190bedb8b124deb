//! Text scalar grammar: barewords, quoted strings, numbers and `%` literals.

use crate::error::{Error, Result};
use crate::lexer::Token;
use crate::scanner::Scanner;

fn is_bareword_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_bareword_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-')
}

fn is_number_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.')
}

fn is_literal_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.' | b'_')
}

/// Returns `true` if `b` can begin a text scalar.
pub fn starts_scalar(b: u8) -> bool {
    is_bareword_start(b) || b.is_ascii_digit() || matches!(b, b'"' | b'%' | b'+' | b'-')
}

/// Returns `true` if `bytes` can be written without quotes.
pub fn is_bareword(bytes: &[u8]) -> bool {
    match bytes.split_first() {
        Some((&first, rest)) => is_bareword_start(first) && rest.iter().all(|&b| is_bareword_byte(b)),
        None => false,
    }
}

/// Read one text scalar starting at the current byte.
pub fn read_scalar(scanner: &mut Scanner<'_>) -> Result<Token> {
    let start = scanner.position();
    let Some(first) = scanner.peek()? else {
        return Err(scanner.error_here(Error::eof()));
    };
    match first {
        b'"' => {
            scanner.advance();
            Ok(Token::String(read_quoted(scanner)?))
        }
        b'%' => {
            scanner.advance();
            let mut word = Vec::new();
            scanner.take_while(is_literal_byte, &mut word)?;
            match word.as_slice() {
                b"true" => Ok(Token::Boolean(true)),
                b"false" => Ok(Token::Boolean(false)),
                b"nan" => Ok(Token::Double(f64::NAN)),
                b"inf" | b"+inf" => Ok(Token::Double(f64::INFINITY)),
                b"-inf" => Ok(Token::Double(f64::NEG_INFINITY)),
                _ => Err(scanner.error_at(
                    Error::malformed_token(format!("unknown literal \"%{}\"", word.escape_ascii())),
                    start,
                )),
            }
        }
        b'0'..=b'9' | b'+' | b'-' => {
            let mut text = Vec::new();
            scanner.take_while(is_number_byte, &mut text)?;
            parse_number(&text).map_err(|message| scanner.error_at(Error::malformed_token(message), start))
        }
        b if is_bareword_start(b) => {
            let mut word = Vec::new();
            scanner.take_while(is_bareword_byte, &mut word)?;
            Ok(Token::String(word))
        }
        other => Err(scanner.error_at(
            Error::malformed_token(format!("unexpected byte \"{}\"", [other].escape_ascii())),
            start,
        )),
    }
}

fn parse_number(text: &[u8]) -> std::result::Result<Token, String> {
    let invalid = || format!("invalid number \"{}\"", text.escape_ascii());
    // Number bytes are ASCII, so this cannot fail.
    let s = std::str::from_utf8(text).map_err(|_| invalid())?;

    if let Some(digits) = s.strip_suffix('u') {
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        return digits
            .parse()
            .map(Token::Uint64)
            .map_err(|_| format!("uint64 literal \"{s}\" is out of range"));
    }

    if s.contains(['.', 'e', 'E']) {
        if !is_double_syntax(s.as_bytes()) {
            return Err(invalid());
        }
        return s.parse().map(Token::Double).map_err(|_| invalid());
    }

    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    s.parse()
        .map(Token::Int64)
        .map_err(|_| format!("int64 literal \"{s}\" is out of range"))
}

/// `[+-]? digits ('.' digits)? ([eE] [+-]? digits)?` with at least one
/// mantissa digit.
fn is_double_syntax(b: &[u8]) -> bool {
    let digits_from = |mut i: usize| {
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
        i
    };
    let mut i = usize::from(matches!(b.first(), Some(b'+' | b'-')));
    let int_end = digits_from(i);
    let mut mantissa_digits = int_end - i;
    i = int_end;
    if b.get(i) == Some(&b'.') {
        let frac_end = digits_from(i + 1);
        mantissa_digits += frac_end - (i + 1);
        i = frac_end;
    }
    if mantissa_digits == 0 {
        return false;
    }
    if matches!(b.get(i), Some(b'e' | b'E')) {
        i += 1;
        if matches!(b.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        let exp_end = digits_from(i);
        if exp_end == i {
            return false;
        }
        i = exp_end;
    }
    i == b.len()
}

fn read_quoted(scanner: &mut Scanner<'_>) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    loop {
        scanner.take_while(|b| b != b'"' && b != b'\\', &mut out)?;
        let at = scanner.position();
        match scanner.next_byte()? {
            None => return Err(scanner.error_here(Error::eof())),
            Some(b'"') => return Ok(out),
            Some(_) => {
                let Some(c) = scanner.next_byte()? else {
                    return Err(scanner.error_here(Error::eof()));
                };
                let byte = match c {
                    b'n' => b'\n',
                    b'r' => b'\r',
                    b't' => b'\t',
                    b'a' => 0x07,
                    b'b' => 0x08,
                    b'f' => 0x0c,
                    b'v' => 0x0b,
                    b'\\' | b'"' | b'\'' | b'?' => c,
                    b'x' => read_hex_escape(scanner, at)?,
                    b'0'..=b'7' => read_octal_escape(scanner, c, at)?,
                    _ => {
                        return Err(scanner.error_at(
                            Error::malformed_token(format!(
                                "invalid escape \"\\{}\"",
                                [c].escape_ascii()
                            )),
                            at,
                        ))
                    }
                };
                out.push(byte);
            }
        }
    }
}

fn read_hex_escape(scanner: &mut Scanner<'_>, at: u64) -> Result<u8> {
    let mut value = 0u8;
    let mut count = 0;
    while count < 2 {
        match scanner.peek()?.and_then(|b| (b as char).to_digit(16)) {
            Some(digit) => {
                value = value * 16 + digit as u8;
                scanner.advance();
                count += 1;
            }
            None => break,
        }
    }
    if count == 0 {
        return Err(scanner.error_at(Error::malformed_token("\\x escape without hex digits"), at));
    }
    Ok(value)
}

fn read_octal_escape(scanner: &mut Scanner<'_>, first: u8, at: u64) -> Result<u8> {
    let mut value = u32::from(first - b'0');
    for _ in 0..2 {
        match scanner.peek()? {
            Some(b @ b'0'..=b'7') => {
                value = value * 8 + u32::from(b - b'0');
                scanner.advance();
            }
            _ => break,
        }
    }
    u8::try_from(value).map_err(|_| {
        scanner.error_at(
            Error::malformed_token(format!("octal escape \\{value:o} is out of range")),
            at,
        )
    })
}

/// Write a string as a bareword when possible, quoted otherwise. With
/// `escape_non_ascii` every byte above 0x7f is written as `\xHH`.
pub fn write_string(out: &mut Vec<u8>, bytes: &[u8], escape_non_ascii: bool) {
    if is_bareword(bytes) {
        out.extend_from_slice(bytes);
    } else {
        write_quoted(out, bytes, escape_non_ascii);
    }
}

pub fn write_quoted(out: &mut Vec<u8>, bytes: &[u8], escape_non_ascii: bool) {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    out.push(b'"');
    for &b in bytes {
        match b {
            b'"' => out.extend_from_slice(b"\\\""),
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x20..=0x7e => out.push(b),
            0x80..=0xff if !escape_non_ascii => out.push(b),
            _ => out.extend_from_slice(&[b'\\', b'x', HEX[usize::from(b >> 4)], HEX[usize::from(b & 0xf)]]),
        }
    }
    out.push(b'"');
}

pub fn write_int64(out: &mut Vec<u8>, n: i64) {
    out.extend_from_slice(n.to_string().as_bytes());
}

pub fn write_uint64(out: &mut Vec<u8>, n: u64) {
    out.extend_from_slice(n.to_string().as_bytes());
    out.push(b'u');
}

/// Doubles always carry a `.` or an exponent so they read back as doubles.
pub fn write_double(out: &mut Vec<u8>, x: f64) {
    if x.is_nan() {
        out.extend_from_slice(b"%nan");
    } else if x.is_infinite() {
        out.extend_from_slice(if x > 0.0 { b"%inf" } else { b"%-inf" });
    } else {
        out.extend_from_slice(format!("{x:?}").as_bytes());
    }
}

pub fn write_boolean(out: &mut Vec<u8>, b: bool) {
    out.extend_from_slice(if b { b"%true" } else { b"%false" });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(input: &[u8]) -> Result<Token> {
        read_scalar(&mut Scanner::from_slice(input))
    }

    fn malformed(input: &[u8]) -> bool {
        matches!(scalar(input), Err(Error::MalformedToken { .. }))
    }

    #[test]
    fn test_barewords() {
        assert_eq!(scalar(b"abc_1.x-y;").unwrap(), Token::String(b"abc_1.x-y".to_vec()));
        assert_eq!(scalar(b"_").unwrap(), Token::String(b"_".to_vec()));
    }

    #[test]
    fn test_quoted_escapes() {
        assert_eq!(
            scalar(br#""a\"b\\c\n\t\x41\101\0""#).unwrap(),
            Token::String(b"a\"b\\c\n\tAA\0".to_vec())
        );
        assert_eq!(scalar(br#""\xfa""#).unwrap(), Token::String(vec![0xfa]));
    }

    #[test]
    fn test_bad_escapes() {
        assert!(malformed(br#""\q""#));
        assert!(malformed(br#""\777""#));
        assert!(malformed(br#""\xzz""#));
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(scalar(b"\"abc"), Err(Error::UnexpectedEof { .. })));
    }

    #[test]
    fn test_integers() {
        assert_eq!(scalar(b"42").unwrap(), Token::Int64(42));
        assert_eq!(scalar(b"-7").unwrap(), Token::Int64(-7));
        assert_eq!(scalar(b"+7").unwrap(), Token::Int64(7));
        assert_eq!(scalar(b"42u").unwrap(), Token::Uint64(42));
        assert_eq!(
            scalar(b"18446744073709551615u").unwrap(),
            Token::Uint64(u64::MAX)
        );
    }

    #[test]
    fn test_out_of_range_integers() {
        assert!(malformed(b"9223372036854775808"));
        assert!(malformed(b"18446744073709551616u"));
        assert!(malformed(b"-1u"));
    }

    #[test]
    fn test_doubles() {
        assert_eq!(scalar(b"1.5").unwrap(), Token::Double(1.5));
        assert_eq!(scalar(b"1.").unwrap(), Token::Double(1.0));
        assert_eq!(scalar(b"-2e3").unwrap(), Token::Double(-2000.0));
        assert_eq!(scalar(b"1.5E-1").unwrap(), Token::Double(0.15));
        assert!(malformed(b"1e"));
        assert!(malformed(b"1.2.3"));
        assert!(malformed(b"12abc"));
    }

    #[test]
    fn test_percent_literals() {
        assert_eq!(scalar(b"%true").unwrap(), Token::Boolean(true));
        assert_eq!(scalar(b"%false").unwrap(), Token::Boolean(false));
        assert_eq!(scalar(b"%inf").unwrap(), Token::Double(f64::INFINITY));
        assert_eq!(scalar(b"%+inf").unwrap(), Token::Double(f64::INFINITY));
        assert_eq!(scalar(b"%-inf").unwrap(), Token::Double(f64::NEG_INFINITY));
        match scalar(b"%nan").unwrap() {
            Token::Double(x) => assert!(x.is_nan()),
            other => panic!("unexpected token {other:?}"),
        }
        for bad in [&b"%infi"[..], b"%-nan", b"%nand", b"%"] {
            assert!(malformed(bad), "{}", bad.escape_ascii());
        }
    }

    #[test]
    fn test_unexpected_byte() {
        let err = scalar(b"@").unwrap_err();
        assert!(matches!(err, Error::MalformedToken { .. }));
        assert_eq!(err.location().map(|l| l.offset), Some(0));
    }

    #[test]
    fn test_is_bareword() {
        assert!(is_bareword(b"abc"));
        assert!(is_bareword(b"a-b.c_1"));
        assert!(!is_bareword(b""));
        assert!(!is_bareword(b"1abc"));
        assert!(!is_bareword(b"a b"));
        assert!(!is_bareword("é".as_bytes()));
    }

    #[test]
    fn test_write_string() {
        let mut out = Vec::new();
        write_string(&mut out, b"plain", false);
        out.push(b' ');
        write_string(&mut out, b"two words\n", false);
        out.push(b' ');
        write_string(&mut out, b"\xfa\"", true);
        assert_eq!(out, b"plain \"two words\\n\" \"\\xfa\\\"\"");
    }

    #[test]
    fn test_write_double() {
        let mut out = Vec::new();
        for x in [1.0, 0.5, 1e100, f64::NAN, f64::NEG_INFINITY] {
            write_double(&mut out, x);
            out.push(b';');
        }
        assert_eq!(out, b"1.0;0.5;1e100;%nan;%-inf;");
    }
}
