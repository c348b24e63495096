//! Lexer for Flowa source text.
//!
//! Produces a token stream from UTF-8 source, synthesizing `Newline`,
//! `Indent`, and `Dedent` tokens so the parser can treat indentation blocks
//! and brace blocks uniformly. A single physical newline can release several
//! tokens (one `Newline` plus any number of `Dedent`s), so the lexer keeps a
//! small queue of tokens that are ready to be handed out.

use std::collections::VecDeque;

use crate::token::{Token, TokenKind};

/// Number of columns a tab advances the indentation counter.
const TAB_WIDTH: u32 = 4;

/// Streaming lexer with one-character lookahead.
pub struct Lexer {
    /// Decoded source characters.
    chars: Vec<char>,
    /// Index of the character currently under examination.
    pos: usize,
    /// 1-based line of `pos`.
    line: u32,
    /// Indentation column stack. Always starts with a single 0 entry.
    indents: Vec<u32>,
    /// Tokens synthesized but not yet handed out (multi-DEDENT events).
    pending: VecDeque<Token>,
    /// True when the lexer is positioned at the start of a logical line and
    /// must measure indentation before scanning.
    at_line_start: bool,
    /// Nesting depth of `(` and `[`. Newlines inside groupings are treated
    /// as plain whitespace so call arguments and array literals can wrap.
    group_depth: u32,
    /// Nesting depth of `{`. Newlines stay significant inside braces (they
    /// separate statements in brace blocks) but indentation does not.
    brace_depth: u32,
    /// Set once EOF unwinding has been queued.
    finished: bool,
}

impl Lexer {
    #[must_use]
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            indents: vec![0],
            pending: VecDeque::new(),
            at_line_start: true,
            group_depth: 0,
            brace_depth: 0,
            finished: false,
        }
    }

    /// Returns the next token in the stream.
    ///
    /// After `Eof` has been returned once, every further call returns `Eof`
    /// again, which lets the parser use unbounded lookahead near the end of
    /// input without special cases.
    pub fn next_token(&mut self) -> Token {
        loop {
            if let Some(tok) = self.pending.pop_front() {
                return tok;
            }

            if self.at_line_start && self.group_depth == 0 {
                if let Some(tok) = self.handle_line_start() {
                    return tok;
                }
                continue;
            }

            self.skip_spaces_and_comments();

            let Some(ch) = self.current() else {
                self.queue_eof();
                continue;
            };

            if ch == '\n' {
                self.advance();
                self.line += 1;
                self.at_line_start = true;
                if self.group_depth == 0 {
                    return Token::bare(TokenKind::Newline, self.line - 1);
                }
                continue;
            }

            // Tokens scanned inside a grouping leave line-start mode, so the
            // newline after the closing delimiter still terminates the
            // statement.
            self.at_line_start = false;
            return self.scan_token(ch);
        }
    }

    /// Collects every remaining token, ending with `Eof`. Test helper.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut out = Vec::new();
        loop {
            let tok = self.next_token();
            let done = tok.kind == TokenKind::Eof;
            out.push(tok);
            if done {
                return out;
            }
        }
    }

    /// Measures indentation at the start of a line and queues the resulting
    /// layout tokens. Returns a token when one is immediately available.
    fn handle_line_start(&mut self) -> Option<Token> {
        let mut column = 0u32;
        loop {
            match self.current() {
                Some(' ') => {
                    column += 1;
                    self.advance();
                }
                Some('\t') => {
                    column += TAB_WIDTH;
                    self.advance();
                }
                _ => break,
            }
        }

        // Inside a brace block indentation carries no meaning; only the
        // newline separators matter.
        if self.brace_depth > 0 {
            self.at_line_start = false;
            return None;
        }

        match self.current() {
            // Blank and comment-only lines never affect the indent stack.
            Some('\n') => {
                self.advance();
                self.line += 1;
                return None;
            }
            Some('#') => {
                self.skip_comment();
                return None;
            }
            None => {
                self.at_line_start = false;
                self.queue_eof();
                return None;
            }
            Some(_) => {}
        }

        self.at_line_start = false;
        let top = *self.indents.last().expect("indent stack is never empty");
        if column > top {
            self.indents.push(column);
            return Some(Token::bare(TokenKind::Indent, self.line));
        }
        if column < top {
            while *self.indents.last().expect("indent stack is never empty") > column {
                self.indents.pop();
                self.pending.push_back(Token::bare(TokenKind::Dedent, self.line));
            }
            if *self.indents.last().expect("indent stack is never empty") != column {
                // Dedent to a column that was never opened.
                self.pending
                    .push_back(Token::new(TokenKind::Illegal, "inconsistent dedent", self.line));
            }
            return self.pending.pop_front();
        }
        None
    }

    /// Queues the end-of-file unwinding: pending `Dedent`s back to column 0
    /// followed by a final `Eof` token.
    fn queue_eof(&mut self) {
        if self.finished {
            self.pending.push_back(Token::bare(TokenKind::Eof, self.line));
            return;
        }
        self.finished = true;
        while self.indents.len() > 1 {
            self.indents.pop();
            self.pending.push_back(Token::bare(TokenKind::Dedent, self.line));
        }
        self.pending.push_back(Token::bare(TokenKind::Eof, self.line));
    }

    /// Scans a single non-layout token starting at `ch`.
    fn scan_token(&mut self, ch: char) -> Token {
        let line = self.line;
        match ch {
            '=' => {
                if self.peek() == Some('=') {
                    self.advance_n(2);
                    Token::new(TokenKind::Eq, "==", line)
                } else {
                    self.advance();
                    Token::new(TokenKind::Assign, "=", line)
                }
            }
            '+' => {
                if self.peek() == Some('+') {
                    self.advance_n(2);
                    Token::new(TokenKind::PlusPlus, "++", line)
                } else {
                    self.advance();
                    Token::new(TokenKind::Plus, "+", line)
                }
            }
            '-' => {
                if self.peek() == Some('-') {
                    self.advance_n(2);
                    Token::new(TokenKind::MinusMinus, "--", line)
                } else if self.peek() == Some('>') {
                    self.advance_n(2);
                    Token::new(TokenKind::Arrow, "->", line)
                } else {
                    self.advance();
                    Token::new(TokenKind::Minus, "-", line)
                }
            }
            '*' => {
                self.advance();
                Token::new(TokenKind::Star, "*", line)
            }
            '/' => {
                self.advance();
                Token::new(TokenKind::Slash, "/", line)
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.advance_n(2);
                    Token::new(TokenKind::NotEq, "!=", line)
                } else {
                    self.advance();
                    Token::new(TokenKind::Bang, "!", line)
                }
            }
            '|' => {
                if self.peek() == Some('>') {
                    self.advance_n(2);
                    Token::new(TokenKind::Pipe, "|>", line)
                } else {
                    self.advance();
                    Token::new(TokenKind::Illegal, "|", line)
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.advance_n(2);
                    Token::new(TokenKind::LtEq, "<=", line)
                } else {
                    self.advance();
                    Token::new(TokenKind::Lt, "<", line)
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.advance_n(2);
                    Token::new(TokenKind::GtEq, ">=", line)
                } else {
                    self.advance();
                    Token::new(TokenKind::Gt, ">", line)
                }
            }
            '.' => {
                self.advance();
                Token::new(TokenKind::Dot, ".", line)
            }
            ',' => {
                self.advance();
                Token::new(TokenKind::Comma, ",", line)
            }
            ':' => {
                self.advance();
                Token::new(TokenKind::Colon, ":", line)
            }
            ';' => {
                self.advance();
                Token::new(TokenKind::Semicolon, ";", line)
            }
            '(' => {
                self.advance();
                self.group_depth += 1;
                Token::new(TokenKind::Lparen, "(", line)
            }
            ')' => {
                self.advance();
                self.group_depth = self.group_depth.saturating_sub(1);
                Token::new(TokenKind::Rparen, ")", line)
            }
            '{' => {
                self.advance();
                self.brace_depth += 1;
                Token::new(TokenKind::Lbrace, "{", line)
            }
            '}' => {
                self.advance();
                self.brace_depth = self.brace_depth.saturating_sub(1);
                Token::new(TokenKind::Rbrace, "}", line)
            }
            '[' => {
                self.advance();
                self.group_depth += 1;
                Token::new(TokenKind::Lbracket, "[", line)
            }
            ']' => {
                self.advance();
                self.group_depth = self.group_depth.saturating_sub(1);
                Token::new(TokenKind::Rbracket, "]", line)
            }
            '"' => self.scan_string(),
            c if c.is_ascii_digit() => self.scan_number(),
            c if is_ident_start(c) => self.scan_ident(),
            other => {
                self.advance();
                Token::new(TokenKind::Illegal, other.to_string(), line)
            }
        }
    }

    /// Scans an identifier or keyword.
    fn scan_ident(&mut self) -> Token {
        let line = self.line;
        let start = self.pos;
        while let Some(c) = self.current() {
            if is_ident_continue(c) {
                self.advance();
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        match TokenKind::keyword(&text) {
            Some(kind) => Token::new(kind, text, line),
            None => Token::new(TokenKind::Ident, text, line),
        }
    }

    /// Scans an integer or float literal. A `.` followed by a digit switches
    /// to float; a trailing `.` (as in `a.b` member access after a number
    /// variable) stays with the integer.
    fn scan_number(&mut self) -> Token {
        let line = self.line;
        let start = self.pos;
        while matches!(self.current(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        let mut is_float = false;
        if self.current() == Some('.') && matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while matches!(self.current(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if is_float {
            Token::new(TokenKind::Float, text, line)
        } else {
            Token::new(TokenKind::Int, text, line)
        }
    }

    /// Scans a double-quoted string literal, decoding escapes.
    ///
    /// Supported escapes: `\n \t \r \\ \" \0`. An unterminated string or an
    /// unknown escape produces an `Illegal` token.
    fn scan_string(&mut self) -> Token {
        let line = self.line;
        self.advance(); // opening quote
        let mut text = String::new();
        loop {
            match self.current() {
                None | Some('\n') => {
                    return Token::new(TokenKind::Illegal, "unterminated string", line);
                }
                Some('"') => {
                    self.advance();
                    return Token::new(TokenKind::Str, text, line);
                }
                Some('\\') => {
                    self.advance();
                    let Some(esc) = self.current() else {
                        return Token::new(TokenKind::Illegal, "unterminated string", line);
                    };
                    let decoded = match esc {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '\\' => '\\',
                        '"' => '"',
                        '0' => '\0',
                        other => {
                            self.advance();
                            return Token::new(TokenKind::Illegal, format!("\\{other}"), line);
                        }
                    };
                    text.push(decoded);
                    self.advance();
                }
                Some(c) => {
                    text.push(c);
                    self.advance();
                }
            }
        }
    }

    /// Skips spaces, tabs, carriage returns, and line comments, but not
    /// newlines (those are significant outside groupings).
    fn skip_spaces_and_comments(&mut self) {
        loop {
            match self.current() {
                Some(' ' | '\t' | '\r') => self.advance(),
                Some('#') => self.skip_comment(),
                Some('\n') if self.group_depth > 0 => {
                    self.advance();
                    self.line += 1;
                }
                _ => return,
            }
        }
    }

    /// Skips a comment up to (but not including) its terminating newline, so
    /// the main loop still sees the newline and emits layout tokens for it.
    fn skip_comment(&mut self) {
        while let Some(c) = self.current() {
            if c == '\n' {
                return;
            }
            self.advance();
        }
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn advance_n(&mut self, n: usize) {
        self.pos += n;
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
