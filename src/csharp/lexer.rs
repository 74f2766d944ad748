//! C# lexer
//!
//! Produces the token stream the parser and the token-level rules work on.
//! Trivia (whitespace, comments, preprocessor directives and the text of
//! inactive `#if` branches) never becomes a token.

use crate::diagnostic::{Location, Severity};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// Reserved C# keywords. Contextual keywords (`partial`, `record`, `where`,
/// `global`, ...) are lexed as identifiers.
const KEYWORDS: &[&str] = &[
    "abstract", "as", "base", "bool", "break", "byte", "case", "catch", "char", "checked",
    "class", "const", "continue", "decimal", "default", "delegate", "do", "double", "else",
    "enum", "event", "explicit", "extern", "false", "finally", "fixed", "float", "for",
    "foreach", "goto", "if", "implicit", "in", "int", "interface", "internal", "is", "lock",
    "long", "namespace", "new", "null", "object", "operator", "out", "override", "params",
    "private", "protected", "public", "readonly", "ref", "return", "sbyte", "sealed", "short",
    "sizeof", "stackalloc", "static", "string", "struct", "switch", "this", "throw", "true",
    "try", "typeof", "uint", "ulong", "unchecked", "unsafe", "ushort", "using", "virtual",
    "void", "volatile", "while",
];

pub fn is_keyword(text: &str) -> bool {
    KEYWORDS.contains(&text)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    Keyword,
    NumericLiteral,
    StringLiteral,
    CharLiteral,
    Punctuation,
    EndOfFile,
}

/// A lexed token. `start`/`end` are byte offsets into the unit text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// Decoded identifier text when it differs from `text` (`@` prefix,
    /// unicode escapes)
    pub value: Option<String>,
    pub start: usize,
    pub end: usize,
}

impl Token {
    /// The identifier's value text (what the compiler binds against)
    pub fn value_text(&self) -> &str {
        self.value.as_deref().unwrap_or(&self.text)
    }

    pub fn is_punct(&self, punct: &str) -> bool {
        self.kind == TokenKind::Punctuation && self.text == punct
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == keyword
    }

    /// Identifier with the given value, used for contextual keywords
    pub fn is_contextual(&self, word: &str) -> bool {
        self.kind == TokenKind::Identifier && self.value.is_none() && self.text == word
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::EndOfFile
    }
}

/// A lexical or syntactic problem, positioned by byte offsets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxDiagnostic {
    pub code: &'static str,
    pub severity: Severity,
    pub message: String,
    pub start: usize,
    pub end: usize,
}

impl SyntaxDiagnostic {
    pub fn error(code: &'static str, message: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            code,
            severity: Severity::Error,
            message: message.into(),
            start,
            end,
        }
    }

    pub fn warning(code: &'static str, message: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            code,
            severity: Severity::Warning,
            message: message.into(),
            start,
            end,
        }
    }
}

/// Maps byte offsets to 1-based line/column pairs
#[derive(Debug, Clone)]
pub struct LineMap {
    text: Arc<str>,
    line_starts: Vec<usize>,
}

impl LineMap {
    pub fn new(text: Arc<str>) -> Self {
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { text, line_starts }
    }

    /// 1-based (line, column); columns count characters, not bytes
    pub fn position(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.text.len());
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let line_start = self.line_starts[line.saturating_sub(1)];
        let column = self
            .text
            .get(line_start..offset)
            .map_or(offset - line_start, |s| s.chars().count())
            + 1;
        (line, column)
    }

    pub fn location(&self, file: &Path, start: usize, end: usize) -> Location {
        let (line, column) = self.position(start);
        let (end_line, end_column) = self.position(end);
        Location::new(file.to_path_buf(), line, column).with_end(end_line, end_column)
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

/// Result of lexing one unit
#[derive(Debug, Default)]
pub struct LexOutput {
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<SyntaxDiagnostic>,
}

/// Lex a unit. `defines` seeds the preprocessor symbol set.
pub fn lex(text: &str, defines: &HashSet<String>) -> LexOutput {
    let mut lexer = Lexer {
        src: text,
        pos: 0,
        tokens: Vec::new(),
        diagnostics: Vec::new(),
        defines: defines.clone(),
        conditions: Vec::new(),
        line_clean: true,
    };
    lexer.run();
    LexOutput {
        tokens: lexer.tokens,
        diagnostics: lexer.diagnostics,
    }
}

/// One `#if` nesting level
#[derive(Debug, Clone, Copy)]
struct Condition {
    parent_active: bool,
    taken: bool,
    active: bool,
    seen_else: bool,
    start: usize,
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    tokens: Vec<Token>,
    diagnostics: Vec<SyntaxDiagnostic>,
    defines: HashSet<String>,
    conditions: Vec<Condition>,
    /// Only whitespace seen since the last line break
    line_clean: bool,
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_combining_mark(c: char) -> bool {
    matches!(c as u32,
        0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF | 0xFE20..=0xFE2F)
}

fn is_ident_part(c: char) -> bool {
    c == '_' || c.is_alphanumeric() || is_combining_mark(c) || c == '\u{200C}' || c == '\u{200D}'
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn starts_with(&self, s: &str) -> bool {
        self.src[self.pos..].starts_with(s)
    }

    fn active(&self) -> bool {
        self.conditions.last().map_or(true, |c| c.active)
    }

    fn push(&mut self, kind: TokenKind, start: usize, value: Option<String>) {
        self.tokens.push(Token {
            kind,
            text: self.src[start..self.pos].to_string(),
            value,
            start,
            end: self.pos,
        });
        self.line_clean = false;
    }

    fn run(&mut self) {
        loop {
            self.skip_trivia();
            if self.pos >= self.src.len() {
                break;
            }
            self.lex_token();
        }

        if let Some(open) = self.conditions.last() {
            self.diagnostics.push(SyntaxDiagnostic::error(
                "CS1027",
                "#endif directive expected",
                open.start,
                self.src.len(),
            ));
        }

        self.tokens.push(Token {
            kind: TokenKind::EndOfFile,
            text: String::new(),
            value: None,
            start: self.src.len(),
            end: self.src.len(),
        });
    }

    fn skip_trivia(&mut self) {
        loop {
            if !self.active() {
                self.skip_inactive_line();
                if self.pos >= self.src.len() {
                    return;
                }
                continue;
            }
            match self.peek() {
                Some('\n') => {
                    self.pos += 1;
                    self.line_clean = true;
                }
                Some(c) if c.is_whitespace() => {
                    self.pos += c.len_utf8();
                }
                Some('/') if self.peek_at(1) == Some('/') => self.skip_line_comment(),
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.skip_block_comment();
                    self.line_clean = false;
                }
                Some('#') if self.line_clean => self.directive(),
                _ => return,
            }
        }
    }

    /// Whitespace and comments only; used inside interpolation holes
    fn skip_inline_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.pos += c.len_utf8();
                }
                Some('/') if self.peek_at(1) == Some('/') => self.skip_line_comment(),
                Some('/') if self.peek_at(1) == Some('*') => self.skip_block_comment(),
                _ => return,
            }
        }
    }

    fn skip_line_comment(&mut self) {
        match self.src[self.pos..].find('\n') {
            Some(i) => self.pos += i,
            None => self.pos = self.src.len(),
        }
    }

    fn skip_block_comment(&mut self) {
        let start = self.pos;
        match self.src[self.pos + 2..].find("*/") {
            Some(i) => self.pos += 2 + i + 2,
            None => {
                self.pos = self.src.len();
                self.diagnostics.push(SyntaxDiagnostic::error(
                    "CS1035",
                    "End-of-file found, '*/' expected",
                    start,
                    self.pos,
                ));
            }
        }
    }

    fn read_line(&mut self) -> (usize, &'a str) {
        let start = self.pos;
        let end = self.src[start..]
            .find('\n')
            .map_or(self.src.len(), |i| start + i);
        self.pos = end;
        (start, &self.src[start..end])
    }

    fn skip_inactive_line(&mut self) {
        let rest = &self.src[self.pos..];
        let trimmed = rest.trim_start_matches(|c: char| c.is_whitespace() && c != '\n');
        if trimmed.starts_with('#') {
            self.pos += rest.len() - trimmed.len();
            self.directive();
        } else {
            self.read_line();
        }
        if self.peek() == Some('\n') {
            self.pos += 1;
        }
        self.line_clean = true;
    }

    fn directive(&mut self) {
        let (start, line) = self.read_line();
        let body = line[1..].trim_start();
        let name_len = body
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(body.len());
        let name = &body[..name_len];
        let arg = strip_directive_comment(body[name_len..].trim());
        let end = self.pos;
        let active = self.active();

        match name {
            "if" => {
                let value = active && self.eval_condition(arg, start, end);
                self.conditions.push(Condition {
                    parent_active: active,
                    taken: value,
                    active: value,
                    seen_else: false,
                    start,
                });
            }
            "elif" => {
                let value = self.eval_condition(arg, start, end);
                match self.conditions.last_mut() {
                    Some(cond) if !cond.seen_else => {
                        cond.active = cond.parent_active && !cond.taken && value;
                        cond.taken |= cond.active;
                    }
                    _ => self.unexpected_directive(start, end),
                }
            }
            "else" => match self.conditions.last_mut() {
                Some(cond) if !cond.seen_else => {
                    cond.active = cond.parent_active && !cond.taken;
                    cond.taken = true;
                    cond.seen_else = true;
                }
                _ => self.unexpected_directive(start, end),
            },
            "endif" => {
                if self.conditions.pop().is_none() {
                    self.unexpected_directive(start, end);
                }
            }
            _ if !active => {}
            "define" | "undef" => {
                if !self.tokens.is_empty() {
                    self.diagnostics.push(SyntaxDiagnostic::error(
                        "CS1032",
                        "Cannot define/undefine preprocessor symbols after first token in file",
                        start,
                        end,
                    ));
                } else if name == "define" {
                    self.defines.insert(arg.to_string());
                } else {
                    self.defines.remove(arg);
                }
            }
            "error" => self.diagnostics.push(SyntaxDiagnostic::error(
                "CS1029",
                format!("#error: '{}'", arg),
                start,
                end,
            )),
            "warning" => self.diagnostics.push(SyntaxDiagnostic::warning(
                "CS1030",
                format!("#warning: '{}'", arg),
                start,
                end,
            )),
            "region" | "endregion" | "pragma" | "nullable" | "line" | "r" | "load" => {}
            _ => self.diagnostics.push(SyntaxDiagnostic::error(
                "CS1024",
                "Preprocessor directive expected",
                start,
                end,
            )),
        }
        self.line_clean = true;
    }

    fn unexpected_directive(&mut self, start: usize, end: usize) {
        self.diagnostics.push(SyntaxDiagnostic::error(
            "CS1028",
            "Unexpected preprocessor directive",
            start,
            end,
        ));
    }

    fn eval_condition(&mut self, expr: &str, start: usize, end: usize) -> bool {
        match eval_pp_expression(expr, &self.defines) {
            Some(value) => value,
            None => {
                self.diagnostics.push(SyntaxDiagnostic::error(
                    "CS1517",
                    "Invalid preprocessor expression",
                    start,
                    end,
                ));
                false
            }
        }
    }

    fn lex_token(&mut self) {
        let start = self.pos;
        let Some(c) = self.peek() else {
            return;
        };

        match c {
            '@' => match self.peek_at(1) {
                Some('"') => {
                    self.pos += 1;
                    self.verbatim_string(start);
                }
                Some('$') if self.peek_at(2) == Some('"') => {
                    self.pos += 2;
                    self.interpolated_string(start, true);
                }
                Some(n) if is_ident_start(n) || n == '\\' => {
                    self.pos += 1;
                    self.identifier(start, true);
                }
                _ => self.unexpected_char(start),
            },
            '$' => {
                let dollars = self.src[self.pos..].chars().take_while(|&c| c == '$').count();
                let after = self.pos + dollars;
                if self.src[after..].starts_with("\"\"\"") {
                    self.pos = after;
                    self.raw_string(start);
                } else if self.src[after..].starts_with("@\"") && dollars == 1 {
                    self.pos += 2;
                    self.interpolated_string(start, true);
                } else if self.src[after..].starts_with('"') && dollars == 1 {
                    self.pos += 1;
                    self.interpolated_string(start, false);
                } else {
                    self.unexpected_char(start);
                }
            }
            '"' if self.starts_with("\"\"\"") => self.raw_string(start),
            '"' => self.regular_string(start),
            '\'' => self.char_literal(start),
            '\\' if matches!(self.peek_at(1), Some('u') | Some('U')) => self.identifier(start, false),
            c if is_ident_start(c) => self.identifier(start, false),
            c if c.is_ascii_digit() => self.number(start),
            '.' if self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => self.number(start),
            _ => self.punctuation(start),
        }
    }

    fn unexpected_char(&mut self, start: usize) {
        let c = self.bump().unwrap_or(' ');
        self.diagnostics.push(SyntaxDiagnostic::error(
            "CS1056",
            format!("Unexpected character '{}'", c),
            start,
            self.pos,
        ));
    }

    fn identifier(&mut self, start: usize, verbatim: bool) {
        let mut value = String::new();
        let mut escaped = false;
        loop {
            match self.peek() {
                Some('\\') if matches!(self.peek_at(1), Some('u') | Some('U')) => {
                    let wide = self.peek_at(1) == Some('U');
                    let digits = if wide { 8 } else { 4 };
                    let hex_start = self.pos + 2;
                    let hex_end = hex_start + digits;
                    let decoded = self
                        .src
                        .get(hex_start..hex_end)
                        .filter(|h| h.chars().all(|c| c.is_ascii_hexdigit()))
                        .and_then(|h| u32::from_str_radix(h, 16).ok())
                        .and_then(char::from_u32);
                    match decoded {
                        Some(ch) if (value.is_empty() && is_ident_start(ch)) || is_ident_part(ch) => {
                            value.push(ch);
                            self.pos = hex_end;
                            escaped = true;
                        }
                        _ => {
                            let err_start = self.pos;
                            self.pos += 2;
                            self.diagnostics.push(SyntaxDiagnostic::error(
                                "CS1009",
                                "Unrecognized escape sequence",
                                err_start,
                                self.pos,
                            ));
                            break;
                        }
                    }
                }
                Some(c) if (value.is_empty() && is_ident_start(c)) || (!value.is_empty() && is_ident_part(c)) => {
                    value.push(c);
                    self.pos += c.len_utf8();
                }
                _ => break,
            }
        }

        if value.is_empty() {
            // A lone escape that did not decode; already reported
            if self.pos == start {
                self.pos += 1;
            }
            return;
        }

        let text = &self.src[start..self.pos];
        if !verbatim && !escaped && is_keyword(text) {
            self.push(TokenKind::Keyword, start, None);
        } else {
            let value = (value != text).then_some(value);
            self.push(TokenKind::Identifier, start, value);
        }
    }

    fn number(&mut self, start: usize) {
        if self.starts_with("0x") || self.starts_with("0X") || self.starts_with("0b") || self.starts_with("0B") {
            self.pos += 2;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit() || c == '_') {
                self.pos += 1;
            }
        } else {
            while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
                self.pos += 1;
            }
            if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
                while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
                    self.pos += 1;
                }
            }
            if matches!(self.peek(), Some('e') | Some('E')) {
                let sign = usize::from(matches!(self.peek_at(1), Some('+') | Some('-')));
                if self.peek_at(1 + sign).is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1 + sign;
                    while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                        self.pos += 1;
                    }
                }
            }
        }
        while self.peek().is_some_and(|c| matches!(c, 'u' | 'U' | 'l' | 'L' | 'f' | 'F' | 'd' | 'D' | 'm' | 'M')) {
            self.pos += 1;
        }
        self.push(TokenKind::NumericLiteral, start, None);
    }

    fn punctuation(&mut self, start: usize) {
        if self.starts_with("::") || self.starts_with("=>") {
            self.pos += 2;
            self.push(TokenKind::Punctuation, start, None);
            return;
        }
        match self.peek() {
            Some(c) if "{}()[]<>,;:.=?!~+-*/%&|^".contains(c) => {
                self.pos += 1;
                self.push(TokenKind::Punctuation, start, None);
            }
            _ => self.unexpected_char(start),
        }
    }

    fn regular_string(&mut self, start: usize) {
        self.pos += 1;
        loop {
            match self.peek() {
                Some('\\') => {
                    self.pos += 1;
                    self.bump();
                }
                Some('"') => {
                    self.pos += 1;
                    break;
                }
                Some('\n') | None => {
                    self.diagnostics.push(SyntaxDiagnostic::error(
                        "CS1010",
                        "Newline in constant",
                        start,
                        self.pos,
                    ));
                    break;
                }
                Some(c) => self.pos += c.len_utf8(),
            }
        }
        self.push(TokenKind::StringLiteral, start, None);
    }

    fn verbatim_string(&mut self, start: usize) {
        self.pos += 1;
        loop {
            match self.peek() {
                Some('"') if self.peek_at(1) == Some('"') => self.pos += 2,
                Some('"') => {
                    self.pos += 1;
                    break;
                }
                None => {
                    self.diagnostics.push(SyntaxDiagnostic::error(
                        "CS1039",
                        "Unterminated string literal",
                        start,
                        self.pos,
                    ));
                    break;
                }
                Some(c) => self.pos += c.len_utf8(),
            }
        }
        self.push(TokenKind::StringLiteral, start, None);
    }

    /// Raw string literal, optionally prefixed by `$`s. Interpolation holes
    /// of raw strings are kept inside the literal.
    fn raw_string(&mut self, start: usize) {
        let quotes = self.src[self.pos..].chars().take_while(|&c| c == '"').count();
        self.pos += quotes;
        let delimiter = "\"".repeat(quotes);
        match self.src[self.pos..].find(&delimiter) {
            Some(i) => {
                self.pos += i;
                // A longer closing run belongs to the content
                let run = self.src[self.pos..].chars().take_while(|&c| c == '"').count();
                self.pos += run;
            }
            None => {
                self.pos = self.src.len();
                self.diagnostics.push(SyntaxDiagnostic::error(
                    "CS8997",
                    "Unterminated raw string literal",
                    start,
                    self.pos,
                ));
            }
        }
        self.push(TokenKind::StringLiteral, start, None);
    }

    fn char_literal(&mut self, start: usize) {
        self.pos += 1;
        loop {
            match self.peek() {
                Some('\\') => {
                    self.pos += 1;
                    self.bump();
                }
                Some('\'') => {
                    self.pos += 1;
                    break;
                }
                Some('\n') | None => {
                    self.diagnostics.push(SyntaxDiagnostic::error(
                        "CS1010",
                        "Newline in constant",
                        start,
                        self.pos,
                    ));
                    break;
                }
                Some(c) => self.pos += c.len_utf8(),
            }
        }
        self.push(TokenKind::CharLiteral, start, None);
    }

    /// `$"..."` / `$@"..."`: literal text segments become string tokens, the
    /// expressions inside `{...}` holes are lexed as ordinary tokens.
    fn interpolated_string(&mut self, start: usize, verbatim: bool) {
        // Positioned just past the opening quote after this
        self.pos += 1;
        let mut segment_start = start;
        loop {
            match self.peek() {
                Some('{') if self.peek_at(1) == Some('{') => self.pos += 2,
                Some('}') if self.peek_at(1) == Some('}') => self.pos += 2,
                Some('{') => {
                    self.pos += 1;
                    self.push(TokenKind::StringLiteral, segment_start, None);
                    self.interpolation_hole();
                    segment_start = self.pos;
                }
                Some('\\') if !verbatim => {
                    self.pos += 1;
                    self.bump();
                }
                Some('"') if verbatim && self.peek_at(1) == Some('"') => self.pos += 2,
                Some('"') => {
                    self.pos += 1;
                    break;
                }
                Some('\n') if !verbatim => {
                    self.diagnostics.push(SyntaxDiagnostic::error(
                        "CS1010",
                        "Newline in constant",
                        start,
                        self.pos,
                    ));
                    break;
                }
                None => {
                    self.diagnostics.push(SyntaxDiagnostic::error(
                        "CS1039",
                        "Unterminated string literal",
                        start,
                        self.pos,
                    ));
                    break;
                }
                Some(c) => self.pos += c.len_utf8(),
            }
        }
        self.push(TokenKind::StringLiteral, segment_start, None);
    }

    fn interpolation_hole(&mut self) {
        let hole_start = self.pos;
        let mut depth = 0usize;
        loop {
            self.skip_inline_trivia();
            let Some(c) = self.peek() else {
                self.diagnostics.push(SyntaxDiagnostic::error(
                    "CS8076",
                    "Missing close delimiter '}' for interpolated expression",
                    hole_start,
                    self.pos,
                ));
                return;
            };
            if depth == 0 {
                match c {
                    '}' => {
                        self.pos += 1;
                        return;
                    }
                    ':' if self.peek_at(1) != Some(':') => {
                        // Format clause runs to the closing brace
                        match self.src[self.pos..].find(|c: char| c == '}' || c == '"') {
                            Some(i) if self.src[self.pos + i..].starts_with('}') => {
                                self.pos += i + 1;
                            }
                            _ => {
                                self.diagnostics.push(SyntaxDiagnostic::error(
                                    "CS8076",
                                    "Missing close delimiter '}' for interpolated expression",
                                    hole_start,
                                    self.pos,
                                ));
                            }
                        }
                        return;
                    }
                    '"' => {
                        self.diagnostics.push(SyntaxDiagnostic::error(
                            "CS8076",
                            "Missing close delimiter '}' for interpolated expression",
                            hole_start,
                            self.pos,
                        ));
                        return;
                    }
                    _ => {}
                }
            }
            match c {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.lex_token();
        }
    }
}

/// Drop a trailing `// comment` from a directive argument
fn strip_directive_comment(arg: &str) -> &str {
    match arg.find("//") {
        Some(i) => arg[..i].trim_end(),
        None => arg,
    }
}

/// Evaluate a `#if` expression. `None` means the expression is malformed.
pub fn eval_pp_expression(expr: &str, defines: &HashSet<String>) -> Option<bool> {
    let tokens = pp_tokens(expr)?;
    let mut parser = PpParser {
        tokens: &tokens,
        pos: 0,
        defines,
    };
    let value = parser.or()?;
    (parser.pos == tokens.len()).then_some(value)
}

fn pp_tokens(expr: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '(' || c == ')' {
            tokens.push(c.to_string());
            i += 1;
        } else if i + 1 < chars.len() && matches!((c, chars[i + 1]), ('&', '&') | ('|', '|') | ('=', '=') | ('!', '=')) {
            tokens.push(chars[i..i + 2].iter().collect());
            i += 2;
        } else if c == '!' {
            tokens.push("!".to_string());
            i += 1;
        } else if is_ident_start(c) {
            let begin = i;
            while i < chars.len() && is_ident_part(chars[i]) {
                i += 1;
            }
            tokens.push(chars[begin..i].iter().collect());
        } else {
            return None;
        }
    }
    Some(tokens)
}

struct PpParser<'t> {
    tokens: &'t [String],
    pos: usize,
    defines: &'t HashSet<String>,
}

impl PpParser<'_> {
    fn eat(&mut self, token: &str) -> bool {
        if self.tokens.get(self.pos).is_some_and(|t| t == token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn or(&mut self) -> Option<bool> {
        let mut value = self.and()?;
        while self.eat("||") {
            let rhs = self.and()?;
            value = value || rhs;
        }
        Some(value)
    }

    fn and(&mut self) -> Option<bool> {
        let mut value = self.equality()?;
        while self.eat("&&") {
            let rhs = self.equality()?;
            value = value && rhs;
        }
        Some(value)
    }

    fn equality(&mut self) -> Option<bool> {
        let mut value = self.unary()?;
        loop {
            if self.eat("==") {
                value = value == self.unary()?;
            } else if self.eat("!=") {
                value = value != self.unary()?;
            } else {
                return Some(value);
            }
        }
    }

    fn unary(&mut self) -> Option<bool> {
        if self.eat("!") {
            return self.unary().map(|v| !v);
        }
        if self.eat("(") {
            let value = self.or()?;
            return self.eat(")").then_some(value);
        }
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        match token.as_str() {
            "true" => Some(true),
            "false" => Some(false),
            "(" | ")" | "&&" | "||" | "==" | "!=" => None,
            symbol => Some(self.defines.contains(symbol)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_plain(text: &str) -> LexOutput {
        lex(text, &HashSet::new())
    }

    fn identifiers(out: &LexOutput) -> Vec<&str> {
        out.tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Identifier)
            .map(|t| t.value_text())
            .collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        let out = lex_plain("public class Foo : IBar { }");
        assert!(out.diagnostics.is_empty());
        assert!(out.tokens[0].is_keyword("public"));
        assert!(out.tokens[1].is_keyword("class"));
        assert_eq!(identifiers(&out), vec!["Foo", "IBar"]);
        assert!(out.tokens.last().unwrap().is_eof());
    }

    #[test]
    fn test_verbatim_and_escaped_identifiers() {
        let out = lex_plain("var @class = caf\\u00e9;");
        assert_eq!(identifiers(&out), vec!["var", "class", "café"]);
        let escaped = out.tokens.iter().find(|t| t.text == "caf\\u00e9").unwrap();
        assert_eq!(escaped.value.as_deref(), Some("café"));
    }

    #[test]
    fn test_unicode_identifier() {
        let out = lex_plain("int café = 1;");
        assert!(out.diagnostics.is_empty());
        assert_eq!(identifiers(&out), vec!["café"]);
    }

    #[test]
    fn test_comments_are_trivia() {
        let out = lex_plain("// héllo\n/* wörld */ int x;");
        assert_eq!(identifiers(&out), vec!["x"]);
    }

    #[test]
    fn test_strings_do_not_leak_identifiers() {
        let out = lex_plain(r#"var s = "naïve"; var v = @"a ""b"" c"; var r = """raw "x" text""";"#);
        assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
        assert_eq!(identifiers(&out), vec!["var", "s", "var", "v", "var", "r"]);
    }

    #[test]
    fn test_interpolation_holes_are_lexed() {
        let out = lex_plain(r#"var s = $"value {größe:N2} and {{literal}} {f(x)}";"#);
        assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
        assert_eq!(identifiers(&out), vec!["var", "s", "größe", "f", "x"]);
    }

    #[test]
    fn test_nested_interpolation() {
        let out = lex_plain(r#"var s = $"{ $"{inner}" }";"#);
        assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
        assert_eq!(identifiers(&out), vec!["var", "s", "inner"]);
    }

    #[test]
    fn test_unterminated_string() {
        let out = lex_plain("var s = \"abc\nint x;");
        assert_eq!(out.diagnostics[0].code, "CS1010");
    }

    #[test]
    fn test_unterminated_comment() {
        let out = lex_plain("int x; /* never closed");
        assert_eq!(out.diagnostics[0].code, "CS1035");
    }

    #[test]
    fn test_unexpected_character() {
        let out = lex_plain("int x = 1 € 2;");
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].code, "CS1056");
    }

    #[test]
    fn test_inactive_region_is_skipped() {
        let text = "#if DEBUG\nint débug;\n#else\nint release;\n#endif\n";
        let out = lex_plain(text);
        assert!(out.diagnostics.is_empty());
        assert_eq!(identifiers(&out), vec!["release"]);

        let defines: HashSet<String> = ["DEBUG".to_string()].into_iter().collect();
        let out = lex(text, &defines);
        assert_eq!(identifiers(&out), vec!["débug"]);
    }

    #[test]
    fn test_define_and_elif() {
        let text = "#define A\n#if B\nint b;\n#elif A && !B\nint a;\n#endif";
        let out = lex_plain(text);
        assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
        assert_eq!(identifiers(&out), vec!["a"]);
    }

    #[test]
    fn test_directive_errors() {
        let out = lex_plain("#if X\nint a;\n");
        assert_eq!(out.diagnostics[0].code, "CS1027");

        let out = lex_plain("#endif\n");
        assert_eq!(out.diagnostics[0].code, "CS1028");

        let out = lex_plain("#error stop here\n");
        assert_eq!(out.diagnostics[0].code, "CS1029");
        assert_eq!(out.diagnostics[0].severity, Severity::Error);

        let out = lex_plain("#warning careful\n");
        assert_eq!(out.diagnostics[0].severity, Severity::Warning);
    }

    #[test]
    fn test_define_after_token() {
        let out = lex_plain("int a;\n#define X\n");
        assert_eq!(out.diagnostics[0].code, "CS1032");
    }

    #[test]
    fn test_pp_expression() {
        let defines: HashSet<String> = ["A".to_string()].into_iter().collect();
        assert_eq!(eval_pp_expression("A", &defines), Some(true));
        assert_eq!(eval_pp_expression("!A || B", &defines), Some(false));
        assert_eq!(eval_pp_expression("(A && !B) == true", &defines), Some(true));
        assert_eq!(eval_pp_expression("A &&", &defines), None);
        assert_eq!(eval_pp_expression("A + B", &defines), None);
    }

    #[test]
    fn test_line_map_positions() {
        let text: Arc<str> = Arc::from("ab\ncafé x\n");
        let map = LineMap::new(text.clone());
        assert_eq!(map.position(0), (1, 1));
        assert_eq!(map.position(3), (2, 1));
        // 'x' follows "café " where é is two bytes
        let x = text.find('x').unwrap();
        assert_eq!(map.position(x), (2, 6));
        assert_eq!(map.line_count(), 3);
    }

    #[test]
    fn test_generic_close_is_single_angle() {
        let out = lex_plain("List<List<int>> x;");
        let closes = out.tokens.iter().filter(|t| t.is_punct(">")).count();
        assert_eq!(closes, 2);
    }

    #[test]
    fn test_numbers() {
        let out = lex_plain("var a = 0x1F; var b = 1_000.5e-3m; var c = .5f;");
        assert!(out.diagnostics.is_empty());
        let numbers: Vec<_> = out
            .tokens
            .iter()
            .filter(|t| t.kind == TokenKind::NumericLiteral)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(numbers, vec!["0x1F", "1_000.5e-3m", ".5f"]);
    }
}
