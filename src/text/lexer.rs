use std::fmt;

use crate::error::ParseError;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    /// A numeric literal without its sign, exactly as written.
    Number(String),
    /// A quoted literal with escapes already processed. Adjacent literals are joined.
    Str(Vec<u8>),
    Colon,
    LBrace,
    RBrace,
    Minus,
    Comma,
    Semicolon,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "identifier `{}`", s),
            Token::Number(s) => write!(f, "number `{}`", s),
            Token::Str(_) => f.write_str("string literal"),
            Token::Colon => f.write_str("`:`"),
            Token::LBrace => f.write_str("`{`"),
            Token::RBrace => f.write_str("`}`"),
            Token::Minus => f.write_str("`-`"),
            Token::Comma => f.write_str("`,`"),
            Token::Semicolon => f.write_str("`;`"),
            Token::Eof => f.write_str("end of input"),
        }
    }
}

/// Splits text into tokens, skipping whitespace and `#` comments. Positions are byte offsets
/// into the source and are turned into line and column only when an error is reported.
pub(crate) struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    peeked: Option<(Token, usize)>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            peeked: None,
        }
    }

    /// 1-based line and column of a byte offset. Columns count characters, not bytes.
    pub fn line_col(&self, pos: usize) -> (usize, usize) {
        let before = &self.src.as_bytes()[..pos.min(self.src.len())];
        let line = bytecount::count(before, b'\n') + 1;
        let line_start = before
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |i| i + 1);
        let column = bytecount::num_chars(&before[line_start..]) + 1;
        (line, column)
    }

    pub fn unexpected(
        &self,
        pos: usize,
        expected: &'static str,
        found: impl fmt::Display,
    ) -> ParseError {
        let (line, column) = self.line_col(pos);
        ParseError::UnexpectedToken {
            line,
            column,
            expected,
            found: found.to_string(),
        }
    }

    pub fn peek(&mut self) -> Result<&Token, ParseError> {
        let next = match self.peeked.take() {
            Some(next) => next,
            None => self.lex()?,
        };
        Ok(&self.peeked.insert(next).0)
    }

    /// The next token and the byte offset it starts at.
    pub fn next_token(&mut self) -> Result<(Token, usize), ParseError> {
        match self.peeked.take() {
            Some(next) => Ok(next),
            None => self.lex(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_trivia(&mut self) {
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();
            if trimmed.starts_with('#') {
                self.pos += trimmed.find('\n').unwrap_or(trimmed.len());
            } else {
                return;
            }
        }
    }

    fn lex(&mut self) -> Result<(Token, usize), ParseError> {
        self.skip_trivia();
        let start = self.pos;
        let c = match self.rest().chars().next() {
            Some(c) => c,
            None => return Ok((Token::Eof, start)),
        };
        let token = match c {
            ':' => self.punct(Token::Colon),
            '{' => self.punct(Token::LBrace),
            '}' => self.punct(Token::RBrace),
            '-' => self.punct(Token::Minus),
            ',' => self.punct(Token::Comma),
            ';' => self.punct(Token::Semicolon),
            '"' | '\'' => self.string()?,
            c if c.is_ascii_digit() || c == '.' => self.number(),
            c if c.is_ascii_alphabetic() || c == '_' => {
                let len = self
                    .rest()
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(self.rest().len());
                let ident = self.rest()[..len].to_string();
                self.pos += len;
                Token::Ident(ident)
            }
            c => return Err(self.unexpected(start, "a token", format!("`{}`", c))),
        };
        Ok((token, start))
    }

    fn punct(&mut self, token: Token) -> Token {
        self.pos += 1;
        token
    }

    // Digits, letters, dots, and a sign directly after a decimal exponent marker. Validated by
    // whoever interprets the literal.
    fn number(&mut self) -> Token {
        let rest = self.rest();
        let hex = rest.starts_with("0x") || rest.starts_with("0X");
        let mut prev = '\0';
        let len = rest
            .find(|c: char| {
                let keep = c.is_ascii_alphanumeric()
                    || c == '.'
                    || ((c == '+' || c == '-') && !hex && (prev == 'e' || prev == 'E'));
                prev = c;
                !keep
            })
            .unwrap_or(rest.len());
        self.pos += len;
        Token::Number(rest[..len].to_string())
    }

    fn string(&mut self) -> Result<Token, ParseError> {
        let mut out = Vec::new();
        loop {
            self.quoted(&mut out)?;
            self.skip_trivia();
            if !(self.rest().starts_with('"') || self.rest().starts_with('\'')) {
                return Ok(Token::Str(out));
            }
        }
    }

    // One quoted literal, starting at its opening quote.
    fn quoted(&mut self, out: &mut Vec<u8>) -> Result<(), ParseError> {
        let src: &'a str = self.src;
        let bytes = src.as_bytes();
        let open = self.pos;
        let quote = bytes[open];
        let mut i = open + 1;
        loop {
            let b = match bytes.get(i) {
                Some(&b) => b,
                None => return Err(self.unexpected(open, "closing quote", Token::Eof)),
            };
            match b {
                b'\n' => return Err(self.unexpected(i, "closing quote", "end of line")),
                b'\\' => {
                    i += 1;
                    let esc = match bytes.get(i) {
                        Some(&e) => e,
                        None => return Err(self.unexpected(i, "escape sequence", Token::Eof)),
                    };
                    i += 1;
                    match esc {
                        b'n' => out.push(b'\n'),
                        b't' => out.push(b'\t'),
                        b'r' => out.push(b'\r'),
                        b'"' => out.push(b'"'),
                        b'\'' => out.push(b'\''),
                        b'\\' => out.push(b'\\'),
                        b'x' | b'X' => {
                            let digits = bytes[i..]
                                .iter()
                                .take(2)
                                .take_while(|b| b.is_ascii_hexdigit())
                                .count();
                            if digits == 0 {
                                return Err(self.unexpected(i, "hex digits after `\\x`", "none"));
                            }
                            out.push(parse_digits(&bytes[i..i + digits], 16));
                            i += digits;
                        }
                        b'0'..=b'7' => {
                            let digits = bytes[i - 1..]
                                .iter()
                                .take(3)
                                .take_while(|b| (b'0'..=b'7').contains(b))
                                .count();
                            out.push(parse_digits(&bytes[i - 1..i - 1 + digits], 8));
                            i += digits - 1;
                        }
                        _ => {
                            return Err(self.unexpected(
                                i - 2,
                                "escape sequence",
                                format!("`\\{}`", esc as char),
                            ))
                        }
                    }
                }
                b if b == quote => {
                    self.pos = i + 1;
                    return Ok(());
                }
                b => {
                    out.push(b);
                    i += 1;
                }
            }
        }
    }
}

// Octal escapes above `\377` wrap.
fn parse_digits(digits: &[u8], radix: u32) -> u8 {
    digits.iter().fold(0u32, |acc, &d| {
        acc * radix + (d as char).to_digit(radix).unwrap_or(0)
    }) as u8
}
