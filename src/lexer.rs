//! Lexical analysis of a single input line.
//!
//! Two passes share the same quoting rules:
//! - [`split_pipeline`] cuts the raw line into pipeline stages on unquoted `|`,
//!   keeping every stage's text verbatim (quotes and escapes included).
//! - [`split_into_words`] turns one stage into argument words, removing quotes and
//!   resolving escapes.

use log::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Unquoted,
    SingleQuote,
    DoubleQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    buffer: String,
}

impl LexingFSM {
    /// Creates a new lexer over the characters of `line`.
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Unquoted,
            buffer: String::new(),
        }
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    /// Performs word splitting and returns the resulting words.
    ///
    /// Words are only emitted when they carry content, so a bare `''` or `""`
    /// produces nothing. An unterminated quote keeps whatever was collected.
    fn make_words(&mut self) -> Vec<String> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Unquoted => self.handle_unquoted(ch, &mut out),
                LexingState::SingleQuote => self.handle_single_quote(ch),
                LexingState::DoubleQuote => self.handle_double_quote(ch),
            }
        }

        self.finalize_word(&mut out);
        out
    }

    fn handle_unquoted(&mut self, ch: char, out: &mut Vec<String>) {
        match ch {
            ' ' | '\t' => self.finalize_word(out),
            '\'' => {
                // '' contributes nothing
                if self.peek_char() == Some('\'') {
                    self.read_char();
                } else {
                    self.state = LexingState::SingleQuote;
                }
            }
            '"' => {
                if self.peek_char() == Some('"') {
                    self.read_char();
                } else {
                    self.state = LexingState::DoubleQuote;
                }
            }
            '\\' => match self.read_char() {
                Some(escaped) => self.buffer.push(escaped),
                None => self.buffer.push('\\'),
            },
            c => self.buffer.push(c),
        }
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' if self.peek_char() == Some('\'') => {
                // A doubled quote inside single quotes stands for the quote itself.
                self.read_char();
                self.buffer.push('\'');
            }
            '\'' => self.state = LexingState::Unquoted,
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) {
        match ch {
            '\\' => match self.peek_char() {
                Some(escaped @ ('"' | '\\')) => {
                    self.read_char();
                    self.buffer.push(escaped);
                }
                _ => self.buffer.push('\\'),
            },
            '"' if self.peek_char() == Some('"') => {
                // "a""b" splices into one double-quoted run
                self.read_char();
            }
            '"' => self.state = LexingState::Unquoted,
            c => self.buffer.push(c),
        }
    }

    fn finalize_word(&mut self, out: &mut Vec<String>) {
        if !self.buffer.is_empty() {
            out.push(std::mem::take(&mut self.buffer));
        }
    }

    /// Splits the raw line on unquoted `|`, copying every character of a stage as-is.
    fn make_stages(&mut self) -> Vec<String> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match (self.state, ch) {
                (LexingState::Unquoted, '|') => self.finalize_stage(&mut out),
                (LexingState::Unquoted, '\'') => {
                    self.state = LexingState::SingleQuote;
                    self.buffer.push(ch);
                }
                (LexingState::Unquoted, '"') => {
                    self.state = LexingState::DoubleQuote;
                    self.buffer.push(ch);
                }
                (LexingState::Unquoted | LexingState::DoubleQuote, '\\') => {
                    self.buffer.push(ch);
                    if let Some(escaped) = self.read_char() {
                        self.buffer.push(escaped);
                    }
                }
                (LexingState::SingleQuote, '\'') | (LexingState::DoubleQuote, '"') => {
                    self.state = LexingState::Unquoted;
                    self.buffer.push(ch);
                }
                (_, c) => self.buffer.push(c),
            }
        }

        self.finalize_stage(&mut out);
        out
    }

    fn finalize_stage(&mut self, out: &mut Vec<String>) {
        let stage = std::mem::take(&mut self.buffer);
        let stage = stage.trim();
        if !stage.is_empty() {
            out.push(stage.to_string());
        }
    }
}

/// Splits a command line into argument words.
///
/// Quoting rules:
/// - `'...'` copies everything literally; `''` inside single quotes is a literal `'`.
/// - `"..."` copies literally except `\"` and `\\`, which yield the escaped character.
/// - Outside quotes `\` escapes any next character, including whitespace.
/// - Unquoted spaces and tabs separate words; adjacent quoted and unquoted runs join
///   into one word (`foo'bar'` is `foobar`).
pub fn split_into_words(line: &str) -> Vec<String> {
    let mut lexer = LexingFSM::new(line);
    let words = lexer.make_words();
    trace!("words {:?}", words);
    words
}

/// Splits a command line into pipeline stages on `|` outside of quotes.
///
/// Each stage is trimmed and empty stages are dropped. A line without an unquoted
/// `|` comes back as a single stage.
pub fn split_pipeline(line: &str) -> Vec<String> {
    let mut lexer = LexingFSM::new(line);
    let stages = lexer.make_stages();
    trace!("stages {:?}", stages);
    stages
}
