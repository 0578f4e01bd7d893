//! Hand-written lexer for CEL source.
//!
//! The whole source is tokenized up front into a `Vec<Token>` before the
//! parser ever runs: a recursive-descent parser walking a materialized
//! token vector rather than a lazily-advancing char stream.

use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    IntLiteral(i64),
    UintLiteral(u64),
    DoubleLiteral(f64),
    StringLiteral(String),
    BytesLiteral(Vec<u8>),
    True,
    False,
    Null,
    In,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    AndAnd,
    OrOr,
    Question,
    Colon,
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Char-index offset into the source this token started at, used for
    /// `ParseError::position`.
    pub pos: usize,
}

/// Reserved for future language growth; rejected wherever an identifier is
/// expected.
const RESERVED_FOR_FUTURE: &[&str] = &[
    "as", "break", "const", "continue", "else", "for", "function", "if", "import", "let", "loop",
    "package", "namespace", "return", "var", "void", "while",
];

struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.pos)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn tokenize(&mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let start = self.pos;
            let Some(c) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    pos: start,
                });
                break;
            };

            let kind = if c.is_ascii_digit() {
                self.lex_number()?
            } else if c == '"' || c == '\'' {
                self.lex_string(false, false)?
            } else if is_ident_start(c) {
                self.lex_ident_or_prefixed_string()?
            } else {
                self.lex_operator()?
            };

            tokens.push(Token { kind, pos: start });
        }
        Ok(tokens)
    }

    fn lex_ident_or_prefixed_string(&mut self) -> Result<TokenKind, ParseError> {
        let start = self.pos;
        // A leading r/R/b/B (in either order, up to two letters) followed
        // directly by a quote is a string/bytes prefix rather than an
        // identifier.
        let mut raw = false;
        let mut bytes = false;
        let mut lookahead = 0usize;
        for _ in 0..2 {
            match self.peek_at(lookahead) {
                Some('r') | Some('R') if !raw => {
                    raw = true;
                    lookahead += 1;
                }
                Some('b') | Some('B') if !bytes => {
                    bytes = true;
                    lookahead += 1;
                }
                _ => break,
            }
        }
        if (raw || bytes) && matches!(self.peek_at(lookahead), Some('"') | Some('\'')) {
            self.pos += lookahead;
            return self.lex_string(raw, bytes);
        }

        self.pos = start;
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                ident.push(c);
                self.advance();
            } else {
                break;
            }
        }

        if RESERVED_FOR_FUTURE.contains(&ident.as_str()) {
            return Err(self.err(format!("'{ident}' is a reserved word")));
        }

        Ok(match ident.as_str() {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "in" => TokenKind::In,
            _ => TokenKind::Identifier(ident),
        })
    }

    fn lex_number(&mut self) -> Result<TokenKind, ParseError> {
        let start = self.pos;
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X')) {
            self.advance();
            self.advance();
            let digits_start = self.pos;
            while self.peek().map(|c| c.is_ascii_hexdigit()).unwrap_or(false) {
                self.advance();
            }
            if self.pos == digits_start {
                return Err(self.err("expected hex digits after 0x"));
            }
            let text: String = self.chars[digits_start..self.pos].iter().collect();
            if matches!(self.peek(), Some('u') | Some('U')) {
                self.advance();
                let v = u64::from_str_radix(&text, 16)
                    .map_err(|_| self.err("invalid hex uint literal"))?;
                return Ok(TokenKind::UintLiteral(v));
            }
            let v = i64::from_str_radix(&text, 16).map_err(|_| self.err("invalid hex literal"))?;
            return Ok(TokenKind::IntLiteral(v));
        }

        while self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            self.advance();
        }

        let mut is_double = false;
        if self.peek() == Some('.') && self.peek_at(1).map(|c| c.is_ascii_digit()).unwrap_or(false)
        {
            is_double = true;
            self.advance();
            while self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let mut lookahead = 1;
            if matches!(self.peek_at(lookahead), Some('+') | Some('-')) {
                lookahead += 1;
            }
            if self.peek_at(lookahead).map(|c| c.is_ascii_digit()).unwrap_or(false) {
                is_double = true;
                self.advance();
                if matches!(self.peek(), Some('+') | Some('-')) {
                    self.advance();
                }
                while self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                    self.advance();
                }
            }
        }

        let text: String = self.chars[start..self.pos].iter().collect();
        if is_double {
            let v: f64 = text.parse().map_err(|_| self.err("invalid double literal"))?;
            return Ok(TokenKind::DoubleLiteral(v));
        }
        if matches!(self.peek(), Some('u') | Some('U')) {
            self.advance();
            let v: u64 = text.parse().map_err(|_| self.err("invalid uint literal"))?;
            return Ok(TokenKind::UintLiteral(v));
        }
        let v: i64 = text.parse().map_err(|_| self.err("invalid int literal"))?;
        Ok(TokenKind::IntLiteral(v))
    }

    fn lex_string(&mut self, raw: bool, is_bytes: bool) -> Result<TokenKind, ParseError> {
        let quote = self.advance().expect("caller checked a quote follows");
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.advance();
            self.advance();
        }

        let mut raw_content: Vec<char> = Vec::new();
        loop {
            if triple {
                if self.peek() == Some(quote)
                    && self.peek_at(1) == Some(quote)
                    && self.peek_at(2) == Some(quote)
                {
                    self.advance();
                    self.advance();
                    self.advance();
                    break;
                }
            } else if self.peek() == Some(quote) {
                self.advance();
                break;
            }

            match self.peek() {
                None => return Err(self.err("unterminated string literal")),
                Some('\\') if !raw => {
                    raw_content.push('\\');
                    self.advance();
                    match self.peek() {
                        Some(c) => {
                            raw_content.push(c);
                            self.advance();
                        }
                        None => return Err(self.err("unterminated escape sequence")),
                    }
                }
                Some(c) => {
                    raw_content.push(c);
                    self.advance();
                }
            }
        }

        let bytes = if raw {
            raw_content.iter().collect::<String>().into_bytes()
        } else {
            decode_escapes(&raw_content, self.pos)?
        };

        if is_bytes {
            Ok(TokenKind::BytesLiteral(bytes))
        } else {
            let s = String::from_utf8(bytes)
                .map_err(|_| self.err("string literal is not valid UTF-8"))?;
            Ok(TokenKind::StringLiteral(s))
        }
    }

    fn lex_operator(&mut self) -> Result<TokenKind, ParseError> {
        let c = self.advance().unwrap();
        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '?' => TokenKind::Question,
            ':' => TokenKind::Colon,
            '.' => TokenKind::Dot,
            ',' => TokenKind::Comma,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::NotEq
                } else {
                    TokenKind::Bang
                }
            }
            '=' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::EqEq
                } else {
                    return Err(self.err("unexpected '='; did you mean '=='?"));
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            '&' => {
                if self.peek() == Some('&') {
                    self.advance();
                    TokenKind::AndAnd
                } else {
                    return Err(self.err("unexpected '&'; did you mean '&&'?"));
                }
            }
            '|' => {
                if self.peek() == Some('|') {
                    self.advance();
                    TokenKind::OrOr
                } else {
                    return Err(self.err("unexpected '|'; did you mean '||'?"));
                }
            }
            other => return Err(self.err(format!("unexpected character '{other}'"))),
        };
        Ok(kind)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Decode a string's raw (still-escaped) contents into the literal byte
/// sequence it denotes.
fn decode_escapes(raw: &[char], end_pos: usize) -> Result<Vec<u8>, ParseError> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < raw.len() {
        let c = raw[i];
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            i += 1;
            continue;
        }

        i += 1;
        let Some(&esc) = raw.get(i) else {
            return Err(ParseError::new("incomplete escape sequence", end_pos));
        };
        i += 1;
        match esc {
            '\\' => out.push(b'\\'),
            '"' => out.push(b'"'),
            '\'' => out.push(b'\''),
            '`' => out.push(b'`'),
            '?' => out.push(b'?'),
            'a' => out.push(0x07),
            'b' => out.push(0x08),
            'f' => out.push(0x0C),
            'n' => out.push(0x0A),
            'r' => out.push(0x0D),
            't' => out.push(0x09),
            'v' => out.push(0x0B),
            'x' | 'X' => {
                let hex: String = take_hex_digits(raw, &mut i, 2, end_pos)?;
                let v = u8::from_str_radix(&hex, 16)
                    .map_err(|_| ParseError::new("invalid \\x escape", end_pos))?;
                out.push(v);
            }
            'u' => {
                let hex: String = take_hex_digits(raw, &mut i, 4, end_pos)?;
                let v = u32::from_str_radix(&hex, 16)
                    .map_err(|_| ParseError::new("invalid \\u escape", end_pos))?;
                let ch = char::from_u32(v)
                    .ok_or_else(|| ParseError::new("invalid \\u escape code point", end_pos))?;
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
            'U' => {
                let hex: String = take_hex_digits(raw, &mut i, 8, end_pos)?;
                let v = u32::from_str_radix(&hex, 16)
                    .map_err(|_| ParseError::new("invalid \\U escape", end_pos))?;
                let ch = char::from_u32(v)
                    .ok_or_else(|| ParseError::new("invalid \\U escape code point", end_pos))?;
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
            '0'..='3' => {
                let mut digits = String::new();
                digits.push(esc);
                for _ in 0..2 {
                    match raw.get(i) {
                        Some(d) if d.is_digit(8) => {
                            digits.push(*d);
                            i += 1;
                        }
                        _ => return Err(ParseError::new("invalid octal escape", end_pos)),
                    }
                }
                let v = u8::from_str_radix(&digits, 8)
                    .map_err(|_| ParseError::new("invalid octal escape", end_pos))?;
                out.push(v);
            }
            other => {
                return Err(ParseError::new(
                    format!("unknown escape sequence '\\{other}'"),
                    end_pos,
                ))
            }
        }
    }
    Ok(out)
}

fn take_hex_digits(
    raw: &[char],
    i: &mut usize,
    count: usize,
    end_pos: usize,
) -> Result<String, ParseError> {
    let mut digits = String::new();
    for _ in 0..count {
        match raw.get(*i) {
            Some(d) if d.is_ascii_hexdigit() => {
                digits.push(*d);
                *i += 1;
            }
            _ => return Err(ParseError::new("incomplete hex escape", end_pos)),
        }
    }
    Ok(digits)
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_hex_and_uint_literals() {
        assert_eq!(kinds("0x10"), vec![TokenKind::IntLiteral(16), TokenKind::Eof]);
        assert_eq!(kinds("5u"), vec![TokenKind::UintLiteral(5), TokenKind::Eof]);
        assert_eq!(
            kinds("0x10u"),
            vec![TokenKind::UintLiteral(16), TokenKind::Eof]
        );
    }

    #[test]
    fn lexes_double_literals() {
        assert_eq!(kinds("3.14"), vec![TokenKind::DoubleLiteral(3.14), TokenKind::Eof]);
        assert_eq!(kinds("1e10"), vec![TokenKind::DoubleLiteral(1e10), TokenKind::Eof]);
        // A dot not followed by a digit belongs to the caller (field
        // select), not to the number — `1.foo` is `1 . foo`.
        assert_eq!(
            kinds("1.foo"),
            vec![
                TokenKind::IntLiteral(1),
                TokenKind::Dot,
                TokenKind::Identifier("foo".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn raw_string_does_not_decode_escapes() {
        let kinds = kinds(r#"r"\n""#);
        assert_eq!(kinds, vec![TokenKind::StringLiteral("\\n".to_string()), TokenKind::Eof]);
    }

    #[test]
    fn interpreted_string_decodes_newline() {
        let kinds = kinds("\"\\n\"");
        assert_eq!(kinds, vec![TokenKind::StringLiteral("\n".to_string()), TokenKind::Eof]);
    }

    #[test]
    fn octal_escape_decodes_to_letter() {
        let kinds = kinds(r#""\101""#);
        assert_eq!(kinds, vec![TokenKind::StringLiteral("A".to_string()), TokenKind::Eof]);
    }

    #[test]
    fn bytes_prefix_produces_bytes_literal() {
        let kinds = kinds(r#"b"ab""#);
        assert_eq!(
            kinds,
            vec![TokenKind::BytesLiteral(vec![b'a', b'b']), TokenKind::Eof]
        );
    }

    #[test]
    fn triple_quoted_allows_embedded_quotes_and_newlines() {
        let src = "'''a\"b\nc'''";
        let kinds = kinds(src);
        assert_eq!(
            kinds,
            vec![
                TokenKind::StringLiteral("a\"b\nc".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn reserved_words_are_rejected() {
        assert!(tokenize("let").is_err());
        assert!(tokenize("if").is_err());
    }

    #[test]
    fn unknown_escape_is_an_error() {
        assert!(tokenize(r#""\q""#).is_err());
    }
}
