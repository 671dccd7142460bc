use std::collections::VecDeque;

use crate::token::{Token, TokenKind};

/// Delimiter strings and whitespace-control flags consumed by the lexer.
#[derive(Debug, Clone)]
pub(crate) struct LexConfig {
    pub block_start: String,
    pub block_end: String,
    pub variable_start: String,
    pub variable_end: String,
    pub comment_start: String,
    pub comment_end: String,
    pub trim_blocks: bool,
    pub lstrip_blocks: bool,
}

impl Default for LexConfig {
    fn default() -> Self {
        Self {
            block_start: "{%".to_string(),
            block_end: "%}".to_string(),
            variable_start: "{{".to_string(),
            variable_end: "}}".to_string(),
            comment_start: "{#".to_string(),
            comment_end: "#}".to_string(),
            trim_blocks: false,
            lstrip_blocks: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Plain text between template constructs.
    Outside,
    /// Between a begin delimiter and its matching end delimiter.
    Inside(TagKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Block,
    Variable,
}

/// A pull-style stateful lexer.
///
/// Each call to `next_token` drives the state machine far enough to produce
/// one token, so the parser consumes tokens lazily and in source order. The
/// stream is finite: it ends with a single `Eof` token, or with a single
/// `Error` token after which no further input is scanned.
///
/// The closing delimiter of a variable or block tag only terminates the tag
/// while the bracket-balance stack is empty, which is what disambiguates a
/// map literal immediately before `}}`.
pub(crate) struct Lexer<'a> {
    src: &'a str,
    cfg: LexConfig,
    pos: usize,
    state: State,
    queue: VecDeque<Token>,
    /// Expected closers for currently open `(`, `[`, `{` inside a tag.
    balance: Vec<char>,
    /// Set after a block end when `trim_blocks` is on.
    skip_newline: bool,
    done: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str, cfg: LexConfig) -> Self {
        Self {
            src,
            cfg,
            pos: 0,
            state: State::Outside,
            queue: VecDeque::new(),
            balance: Vec::new(),
            skip_newline: false,
            done: false,
        }
    }

    /// Produce the next token, scanning only as far as needed.
    pub fn next_token(&mut self) -> Token {
        loop {
            if let Some(token) = self.queue.pop_front() {
                return token;
            }
            if self.done {
                return Token::new(TokenKind::Eof, self.src.len(), "");
            }
            match self.state {
                State::Outside => self.scan_outside(),
                State::Inside(kind) => self.scan_inside(kind),
            }
        }
    }

    fn emit(&mut self, kind: TokenKind, pos: usize, value: &str) {
        self.queue.push_back(Token::new(kind, pos, value));
    }

    fn error(&mut self, pos: usize, message: &str) {
        self.queue.push_back(Token::new(TokenKind::Error, pos, message));
        self.done = true;
    }

    fn scan_outside(&mut self) {
        if self.skip_newline {
            self.skip_newline = false;
            if self.src[self.pos..].starts_with("\r\n") {
                self.pos += 2;
            } else if self.src[self.pos..].starts_with('\n') {
                self.pos += 1;
            }
        }

        let block_start = self.cfg.block_start.clone();
        let variable_start = self.cfg.variable_start.clone();
        let comment_start = self.cfg.comment_start.clone();

        let start = self.pos;
        while self.pos < self.src.len() {
            let rest = &self.src[self.pos..];
            if rest.starts_with(block_start.as_str()) {
                self.flush_text(start, true);
                let pos = self.pos;
                self.pos += block_start.len();
                self.emit(TokenKind::BlockBegin, pos, &block_start);
                self.state = State::Inside(TagKind::Block);
                return;
            }
            if rest.starts_with(variable_start.as_str()) {
                self.flush_text(start, false);
                let pos = self.pos;
                self.pos += variable_start.len();
                self.emit(TokenKind::VariableBegin, pos, &variable_start);
                self.state = State::Inside(TagKind::Variable);
                return;
            }
            if rest.starts_with(comment_start.as_str()) {
                self.flush_text(start, false);
                self.scan_comment();
                return;
            }
            self.advance_char();
        }

        self.flush_text(start, false);
        self.emit(TokenKind::Eof, self.src.len(), "");
        self.done = true;
    }

    /// Emit the pending text between `start` and the current position, if
    /// any. With `lstrip_blocks`, a run of spaces and tabs between the start
    /// of a line and a block tag on that line is dropped.
    fn flush_text(&mut self, start: usize, lstrip_eligible: bool) {
        let src = self.src;
        let mut end = self.pos;
        if lstrip_eligible && self.cfg.lstrip_blocks {
            let line_start = src[..end].rfind('\n').map(|i| i + 1).unwrap_or(0);
            if line_start >= start
                && src[line_start..end].chars().all(|c| c == ' ' || c == '\t')
            {
                end = line_start;
            }
        }
        if end > start {
            self.emit(TokenKind::Text, start, &src[start..end]);
        }
    }

    /// Scan `comment_start .. comment_end`. The bytes between the markers are
    /// emitted as one text token; tag delimiters inside a comment are inert.
    fn scan_comment(&mut self) {
        let src = self.src;
        let begin = self.pos;
        let comment_start = self.cfg.comment_start.clone();
        let comment_end = self.cfg.comment_end.clone();

        self.emit(TokenKind::CommentBegin, begin, &comment_start);
        self.pos += comment_start.len();

        match src[self.pos..].find(comment_end.as_str()) {
            None => self.error(begin, "unclosed comment"),
            Some(len) => {
                if len > 0 {
                    self.emit(TokenKind::Text, self.pos, &src[self.pos..self.pos + len]);
                }
                self.pos += len;
                self.emit(TokenKind::CommentEnd, self.pos, &comment_end);
                self.pos += comment_end.len();
            }
        }
    }

    fn scan_inside(&mut self, kind: TagKind) {
        let end_delim = match kind {
            TagKind::Block => self.cfg.block_end.clone(),
            TagKind::Variable => self.cfg.variable_end.clone(),
        };

        if self.balance.is_empty() && self.src[self.pos..].starts_with(end_delim.as_str()) {
            let pos = self.pos;
            self.pos += end_delim.len();
            match kind {
                TagKind::Block => {
                    self.emit(TokenKind::BlockEnd, pos, &end_delim);
                    if self.cfg.trim_blocks {
                        self.skip_newline = true;
                    }
                }
                TagKind::Variable => self.emit(TokenKind::VariableEnd, pos, &end_delim),
            }
            self.state = State::Outside;
            return;
        }

        let Some(c) = self.src[self.pos..].chars().next() else {
            self.emit(TokenKind::Eof, self.src.len(), "");
            self.done = true;
            return;
        };

        match c {
            ' ' | '\t' | '\r' | '\n' => self.lex_whitespace(),
            '"' | '\'' => self.lex_string(c),
            '`' => self.lex_raw_string(),
            _ if c.is_ascii_digit() => self.lex_number(),
            _ if is_ident_start(c) => self.lex_ident(),
            '(' => {
                self.balance.push(')');
                self.single(TokenKind::Lparen, "(");
            }
            '[' => {
                self.balance.push(']');
                self.single(TokenKind::Lbracket, "[");
            }
            '{' => {
                self.balance.push('}');
                self.single(TokenKind::Lbrace, "{");
            }
            ')' | ']' | '}' => self.lex_closer(c, &end_delim),
            '*' => self.one_or_two('*', (TokenKind::Mul, "*"), (TokenKind::Pow, "**")),
            '/' => self.one_or_two('/', (TokenKind::Div, "/"), (TokenKind::Floordiv, "//")),
            '<' => self.one_or_two('=', (TokenKind::Lt, "<"), (TokenKind::Lteq, "<=")),
            '>' => self.one_or_two('=', (TokenKind::Gt, ">"), (TokenKind::Gteq, ">=")),
            '=' => self.one_or_two('=', (TokenKind::Assign, "="), (TokenKind::Eq, "==")),
            '!' => {
                if self.src[self.pos..].starts_with("!=") {
                    self.single2(TokenKind::Ne, "!=");
                } else {
                    self.error(self.pos, "unexpected character '!'");
                }
            }
            '+' => self.single(TokenKind::Add, "+"),
            '-' => self.single(TokenKind::Sub, "-"),
            '%' => self.single(TokenKind::Mod, "%"),
            ',' => self.single(TokenKind::Comma, ","),
            ':' => self.single(TokenKind::Colon, ":"),
            ';' => self.single(TokenKind::Semicolon, ";"),
            '.' => self.single(TokenKind::Dot, "."),
            '~' => self.single(TokenKind::Tilde, "~"),
            '|' => self.single(TokenKind::Pipe, "|"),
            _ => {
                let message = format!("unknown character {:?}", c);
                self.error(self.pos, &message);
            }
        }
    }

    fn single(&mut self, kind: TokenKind, text: &str) {
        let pos = self.pos;
        self.pos += text.len();
        self.emit(kind, pos, text);
    }

    fn single2(&mut self, kind: TokenKind, text: &str) {
        debug_assert_eq!(text.len(), 2);
        self.single(kind, text);
    }

    /// Recognise a two-character operator with one character of lookahead,
    /// falling back to the one-character operator.
    fn one_or_two(&mut self, second: char, one: (TokenKind, &str), two: (TokenKind, &str)) {
        if self.src[self.pos..].chars().nth(1) == Some(second) {
            self.single2(two.0, two.1);
        } else {
            self.single(one.0, one.1);
        }
    }

    fn lex_closer(&mut self, c: char, end_delim: &str) {
        match self.balance.last().copied() {
            Some(expected) if expected == c => {
                self.balance.pop();
                let kind = match c {
                    ')' => TokenKind::Rparen,
                    ']' => TokenKind::Rbracket,
                    _ => TokenKind::Rbrace,
                };
                let text = c.to_string();
                self.single(kind, &text);
            }
            Some(expected) => {
                let message = format!("Imbalanced delimiters, expected {}, got {}", expected, c);
                self.error(self.pos, &message);
            }
            None => {
                let message = format!("Imbalanced delimiters, expected {}, got {}", end_delim, c);
                self.error(self.pos, &message);
            }
        }
    }

    fn lex_whitespace(&mut self) {
        let src = self.src;
        let start = self.pos;
        while let Some(c) = src[self.pos..].chars().next() {
            if matches!(c, ' ' | '\t' | '\r' | '\n') {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        self.emit(TokenKind::Whitespace, start, &src[start..self.pos]);
    }

    fn lex_ident(&mut self) {
        let src = self.src;
        let start = self.pos;
        let bytes = src.as_bytes();
        while self.pos < bytes.len()
            && (bytes[self.pos].is_ascii_alphanumeric() || bytes[self.pos] == b'_')
        {
            self.pos += 1;
        }
        let word = &src[start..self.pos];
        let kind = match word {
            "true" | "false" => TokenKind::Bool,
            _ => TokenKind::Name,
        };
        self.emit(kind, start, word);
    }

    fn lex_number(&mut self) {
        let src = self.src;
        let start = self.pos;
        let bytes = src.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        let mut kind = TokenKind::Integer;
        if bytes.get(self.pos) == Some(&b'.')
            && bytes.get(self.pos + 1).is_some_and(|b| b.is_ascii_digit())
        {
            self.pos += 1;
            while self.pos < bytes.len() && bytes[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
            kind = TokenKind::Float;
        }
        self.emit(kind, start, &src[start..self.pos]);
    }

    /// Lex a `"…"` or `'…'` string, decoding backslash escapes. The token
    /// value is the decoded contents without the quotes.
    fn lex_string(&mut self, quote: char) {
        let src = self.src;
        let start = self.pos;
        self.pos += 1;
        let mut value = String::new();
        loop {
            let Some(c) = src[self.pos..].chars().next() else {
                self.error(start, "unterminated string");
                return;
            };
            self.pos += c.len_utf8();
            if c == quote {
                break;
            }
            if c == '\\' {
                let Some(escaped) = src[self.pos..].chars().next() else {
                    self.error(start, "unterminated string");
                    return;
                };
                self.pos += escaped.len_utf8();
                value.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    other => other,
                });
            } else {
                value.push(c);
            }
        }
        self.emit(TokenKind::Str, start, &value);
    }

    /// Backtick strings are raw: no escapes are decoded.
    fn lex_raw_string(&mut self) {
        let src = self.src;
        let start = self.pos;
        self.pos += 1;
        match src[self.pos..].find('`') {
            None => self.error(start, "unterminated string"),
            Some(len) => {
                let value = &src[self.pos..self.pos + len];
                self.pos += len + 1;
                self.emit(TokenKind::Str, start, value);
            }
        }
    }

    fn advance_char(&mut self) {
        if let Some(c) = self.src[self.pos..].chars().next() {
            self.pos += c.len_utf8();
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}
