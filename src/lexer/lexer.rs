use std::io::{self, BufRead};

use tracing::{trace, warn};

use crate::listing::Listing;

use super::{Token, TokenKind, KEYWORDS, ONE_SYMBOL_TOKENS, TWO_SYMBOLS_TOKENS};

/// Line-buffered scanner. Pulls one source line from the reader whenever the
/// current one is used up, so nothing past the current line is ever read.
#[derive(Debug)]
pub struct Lexer<R> {
    reader: R,
    line: Vec<char>,
    pos: usize,
    lineno: usize,
    at_eof: bool,
    io_error: Option<io::Error>,
}

impl<R: BufRead> Lexer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: vec![],
            pos: 0,
            lineno: 0,
            at_eof: false,
            io_error: None,
        }
    }

    /// Number of source lines read so far.
    pub fn lineno(&self) -> usize {
        self.lineno
    }

    /// The read failure that ended the scan early, if any.
    pub fn take_io_error(&mut self) -> Option<io::Error> {
        self.io_error.take()
    }

    /// Returns the next token. Once the input is exhausted every call yields
    /// `EndFile`.
    pub fn next_token(&mut self, listing: &mut Listing) -> Token {
        let token = self.scan(listing);
        trace!(kind = ?token.kind, lexeme = %token.lexeme, line = token.line, "scanned token");
        listing.token(&token);
        token
    }

    fn fill_line(&mut self, listing: &mut Listing) -> bool {
        while self.pos >= self.line.len() {
            if self.at_eof {
                return false;
            }
            let mut buf = String::new();
            match self.reader.read_line(&mut buf) {
                Ok(0) => self.at_eof = true,
                Ok(_) => {
                    self.lineno += 1;
                    listing.source_line(self.lineno, &buf);
                    self.line = buf.chars().collect();
                    self.pos = 0;
                }
                Err(err) => {
                    warn!(%err, line = self.lineno + 1, "failed to read source line");
                    self.io_error = Some(err);
                    self.at_eof = true;
                }
            }
        }
        true
    }

    fn peek(&mut self, listing: &mut Listing) -> Option<char> {
        if self.fill_line(listing) {
            Some(self.line[self.pos])
        } else {
            None
        }
    }

    fn bump(&mut self, listing: &mut Listing) -> Option<char> {
        let c = self.peek(listing)?;
        self.pos += 1;
        Some(c)
    }

    fn scan(&mut self, listing: &mut Listing) -> Token {
        loop {
            let Some(c) = self.bump(listing) else {
                return Token::new(TokenKind::EndFile, "", self.lineno);
            };
            let line = self.lineno;

            if c.is_ascii_whitespace() {
                continue;
            } else if c.is_ascii_digit() {
                return self.parse_number(c, line, listing);
            } else if c.is_ascii_alphabetic() {
                return self.parse_identifier(c, line, listing);
            } else if c == '/' && self.peek(listing) == Some('*') {
                self.bump(listing);
                if !self.skip_comment(listing) {
                    return Token::new(TokenKind::EndFile, "", self.lineno);
                }
            } else if matches!(c, '<' | '>' | '=' | '!') {
                return self.parse_relational(c, line, listing);
            } else if let Some(kind) = ONE_SYMBOL_TOKENS.get(&c) {
                return Token::new(*kind, c, line);
            } else {
                return Token::new(TokenKind::Error, c, line);
            }
        }
    }

    fn parse_number(&mut self, first: char, line: usize, listing: &mut Listing) -> Token {
        let mut s = String::from(first);
        while let Some(c) = self.peek(listing).filter(|c| c.is_ascii_digit()) {
            s.push(c);
            self.pos += 1;
        }
        Token::new(TokenKind::Num, s, line)
    }

    fn parse_identifier(&mut self, first: char, line: usize, listing: &mut Listing) -> Token {
        let mut s = String::from(first);
        while let Some(c) = self.peek(listing).filter(|c| c.is_ascii_alphanumeric()) {
            s.push(c);
            self.pos += 1;
        }

        match KEYWORDS.get(s.as_str()) {
            Some(kind) => Token::new(*kind, s, line),
            None => Token::new(TokenKind::Ident, s, line),
        }
    }

    fn parse_relational(&mut self, first: char, line: usize, listing: &mut Listing) -> Token {
        if let Some(next) = self.peek(listing) {
            let s: String = [first, next].iter().collect();
            if let Some(kind) = TWO_SYMBOLS_TOKENS.get(s.as_str()) {
                self.pos += 1;
                return Token::new(*kind, s, line);
            }
        }
        match ONE_SYMBOL_TOKENS.get(&first) {
            Some(kind) => Token::new(*kind, first, line),
            // a lone '!'
            None => Token::new(TokenKind::Error, first, line),
        }
    }

    /// Skips past the first `*/`; comments do not nest. Returns false when the
    /// input ends inside the comment.
    fn skip_comment(&mut self, listing: &mut Listing) -> bool {
        let mut star = false;
        while let Some(c) = self.bump(listing) {
            if star && c == '/' {
                return true;
            }
            star = c == '*';
        }
        false
    }
}

/// Scans a whole in-memory source, `EndFile` token included.
pub fn tokenize(s: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(s.as_bytes());
    let mut listing = Listing::quiet();
    let mut tokens = vec![];

    loop {
        let token = lexer.next_token(&mut listing);
        let done = token.kind == TokenKind::EndFile;
        tokens.push(token);
        if done {
            break;
        }
    }

    tokens
}
