//! This module turns the raw text of a machine specification into its
//! tokenized form: the declared alphabet, the initial tape contents, and a
//! flat token stream for the `[program]` section.
//!
//! The input is split into bracketed `[name]` sections first. The `[tape]`
//! section is parsed line by line against a small regex grammar; the
//! `[program]` section goes through a word-level scanner that recognizes
//! whole-word keywords and then splits glued punctuation character by
//! character, so `abc[x:"1"]` tokenizes without spaces around the
//! structural characters.

use crate::types::SpecError;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SECTION_HEADER: Regex = Regex::new(r"^\[(\w+)\]$").unwrap();
    static ref TAPE_LINE: Regex = Regex::new(r"^T\.(\d+) *= *\[(.+)\]$").unwrap();
    static ref ALPHABET_LINE: Regex = Regex::new(r"^alphabet *= *\[(.+)\]$").unwrap();
    static ref SYMBOL_RANGE: Regex = Regex::new(r"^(\w)-(\w)$").unwrap();
    static ref MALFORMED_RANGE: Regex = Regex::new(r"^\w+-\w+$").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Section names that must appear in every specification.
const MANDATORY_SECTIONS: [&str; 2] = ["tape", "program"];

/// Characters that may not appear inside a bare (unquoted) word.
const RESTRICTED_CHARS: [char; 9] = ['=', '!', ',', '{', '}', '[', ']', '"', '&'];

/// A single non-blank source line, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// 1-based line number in the original input.
    pub no: usize,
    /// The trimmed raw text of the line.
    pub text: String,
}

/// The kind of a program-section token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Start,
    End,
    If,
    Elif,
    Else,
    Then,
    Goto,
    MovL,
    MovR,
    Stay,
    /// `{`
    BraceOpen,
    /// `}`
    BraceClose,
    /// `[`
    BracketOpen,
    /// `]`
    BracketClose,
    /// `(`
    GroupOpen,
    /// `)`
    GroupClose,
    /// `:`
    Colon,
    /// `,`
    Comma,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `&&`
    And,
    /// `||`
    Or,
    /// An identifier or tape reference, unquoted.
    Var(String),
    /// A double-quoted string literal, with escaped quotes preserved.
    Const(String),
}

impl TokenKind {
    /// A short human-readable description used in parse diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Var(name) => format!("identifier '{name}'"),
            TokenKind::Const(value) => format!("constant \"{value}\""),
            other => format!("{other:?}"),
        }
    }
}

/// A token with the source line it was scanned from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: SourceLine,
}

impl Token {
    fn new(kind: TokenKind, line: &SourceLine) -> Self {
        Self {
            kind,
            line: line.clone(),
        }
    }
}

/// The result of tokenizing a complete specification.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizedSpec {
    /// The declared alphabet, in declaration order, duplicates dropped.
    pub alphabet: Vec<String>,
    /// Initial tape contents, indexed by tape id.
    pub tapes: Vec<Vec<String>>,
    /// The `[program]` section as a flat token stream.
    pub program: Vec<Token>,
}

struct Section {
    name: String,
    lines: Vec<SourceLine>,
}

/// Tokenizes a complete specification.
///
/// Comment lines (`#` after trim) and blank lines are skipped everywhere.
/// `[program]` lines are lowercased before scanning, so keyword matching is
/// case-insensitive and identifiers and constants are folded to lower case.
///
/// # Errors
///
/// Returns [`SpecError::Tokenize`] on malformed section structure, a bad
/// alphabet or tape declaration, a tape symbol outside the alphabet, or a
/// restricted character inside a bare word.
pub fn tokenize(text: &str) -> Result<TokenizedSpec, SpecError> {
    let sections = split_sections(text)?;

    for name in MANDATORY_SECTIONS {
        if !sections.iter().any(|s| s.name == name) {
            return Err(SpecError::Tokenize(format!(
                "section '{name}' is not defined"
            )));
        }
    }

    // Same-named blocks are concatenated in declaration order.
    let tape_lines: Vec<&SourceLine> = sections
        .iter()
        .filter(|s| s.name == "tape")
        .flat_map(|s| s.lines.iter())
        .collect();
    let (alphabet, tapes) = parse_tape_section(&tape_lines)?;
    check_tapes(&alphabet, &tapes)?;

    let mut program = Vec::new();
    for section in sections.iter().filter(|s| s.name == "program") {
        for line in &section.lines {
            scan_line(line, &mut program)?;
        }
    }

    Ok(TokenizedSpec {
        alphabet,
        tapes,
        program,
    })
}

/// Splits the input into named sections, rejecting unknown names, adjacent
/// duplicate headers, and content outside any section.
fn split_sections(text: &str) -> Result<Vec<Section>, SpecError> {
    let mut sections: Vec<Section> = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(caps) = SECTION_HEADER.captures(line) {
            let name = caps[1].to_lowercase();
            if !MANDATORY_SECTIONS.contains(&name.as_str()) {
                return Err(SpecError::Tokenize(format!(
                    "section '{name}' is not allowed (line {no})"
                )));
            }
            if sections.last().map(|s| s.name == name).unwrap_or(false) {
                return Err(SpecError::Tokenize(format!(
                    "multiple definitions of the same section in line {no} (section='{name}')"
                )));
            }
            sections.push(Section {
                name,
                lines: Vec::new(),
            });
        } else {
            match sections.last_mut() {
                Some(section) => section.lines.push(SourceLine {
                    no,
                    text: line.to_string(),
                }),
                None => {
                    return Err(SpecError::Tokenize(format!(
                        "line '{no}: {line}' does not belong to any section"
                    )))
                }
            }
        }
    }

    Ok(sections)
}

/// Parses the accumulated `[tape]` lines into the alphabet and the initial
/// tape contents, ordered and checked for contiguity.
fn parse_tape_section(
    lines: &[&SourceLine],
) -> Result<(Vec<String>, Vec<Vec<String>>), SpecError> {
    let mut alphabet: Option<Vec<String>> = None;
    let mut tapes: Vec<(usize, Vec<String>)> = Vec::new();

    for line in lines {
        if let Some(caps) = TAPE_LINE.captures(&line.text) {
            let index: usize = caps[1].parse().map_err(|_| {
                SpecError::Tokenize(format!(
                    "wrong tape name at line '{}: {}', expected: T.<n>",
                    line.no, line.text
                ))
            })?;
            if tapes.iter().any(|(i, _)| *i == index) {
                return Err(SpecError::Tokenize(format!(
                    "multiple definitions of tape T.{index} at line '{}: {}'",
                    line.no, line.text
                )));
            }
            let content = caps[2].split(',').map(|v| v.trim().to_string()).collect();
            tapes.push((index, content));
        } else if let Some(caps) = ALPHABET_LINE.captures(&line.text) {
            if alphabet.is_some() {
                return Err(SpecError::Tokenize(format!(
                    "multiple alphabet definitions at line '{}: {}'",
                    line.no, line.text
                )));
            }
            alphabet = Some(parse_alphabet(&caps[1], line)?);
        } else {
            return Err(SpecError::Tokenize(format!(
                "error at line '{}: {}', expected: T.<n> = [<v1>, <v2>, ...] or alphabet = [<v1>, <v2>, ...]",
                line.no, line.text
            )));
        }
    }

    let alphabet = alphabet
        .ok_or_else(|| SpecError::Tokenize("alphabet was not defined".to_string()))?;
    if tapes.is_empty() {
        return Err(SpecError::Tokenize("no tape was defined".to_string()));
    }

    tapes.sort_by_key(|(index, _)| *index);
    for (expected, (index, _)) in tapes.iter().enumerate() {
        if *index != expected {
            return Err(SpecError::Tokenize(format!(
                "tape T.{index} is defined out of order (tapes must start at index 0, without gaps)"
            )));
        }
    }

    Ok((alphabet, tapes.into_iter().map(|(_, content)| content).collect()))
}

/// Expands a comma-separated alphabet declaration, including `x-y`
/// single-character ranges in code-point order.
fn parse_alphabet(entries: &str, line: &SourceLine) -> Result<Vec<String>, SpecError> {
    let mut alphabet: Vec<String> = Vec::new();

    for entry in entries.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        if let Some(caps) = SYMBOL_RANGE.captures(entry) {
            let start = caps[1].chars().next().unwrap();
            let end = caps[2].chars().next().unwrap();
            if start > end {
                return Err(SpecError::Tokenize(format!(
                    "in range {entry}, value {start} is greater than {end}, could not iterate through range (line '{}: {}')",
                    line.no, line.text
                )));
            }
            for code in (start as u32)..=(end as u32) {
                if let Some(c) = char::from_u32(code) {
                    let symbol = c.to_string();
                    if !alphabet.contains(&symbol) {
                        alphabet.push(symbol);
                    }
                }
            }
        } else if MALFORMED_RANGE.is_match(entry) {
            return Err(SpecError::Tokenize(format!(
                "range can only be defined with single character values (line '{}: {}', wrong range: {entry})",
                line.no, line.text
            )));
        } else if !alphabet.iter().any(|s| s == entry) {
            alphabet.push(entry.to_string());
        }
    }

    Ok(alphabet)
}

/// Verifies that every declared tape symbol is a member of the alphabet.
fn check_tapes(alphabet: &[String], tapes: &[Vec<String>]) -> Result<(), SpecError> {
    for (tape_id, tape) in tapes.iter().enumerate() {
        for symbol in tape {
            if !alphabet.contains(symbol) {
                return Err(SpecError::Tokenize(format!(
                    "symbol '{symbol}' in tape T.{tape_id} is not defined in the alphabet"
                )));
            }
        }
    }
    Ok(())
}

/// Scans one `[program]` line into tokens.
fn scan_line(line: &SourceLine, out: &mut Vec<Token>) -> Result<(), SpecError> {
    let lowered = line.text.to_lowercase();
    let normalized = WHITESPACE.replace_all(&lowered, " ");

    for word in normalized.split(' ') {
        if word.is_empty() {
            continue;
        }
        match keyword(word) {
            Some(kind) => out.push(Token::new(kind, line)),
            None => scan_word(word, line, out)?,
        }
    }

    Ok(())
}

/// Matches a whole whitespace-delimited word against the keyword table.
fn keyword(word: &str) -> Option<TokenKind> {
    let kind = match word {
        "start" => TokenKind::Start,
        "end" => TokenKind::End,
        "if" => TokenKind::If,
        "elif" => TokenKind::Elif,
        "else" => TokenKind::Else,
        "then" => TokenKind::Then,
        "goto" => TokenKind::Goto,
        "mov_l" => TokenKind::MovL,
        "mov_r" => TokenKind::MovR,
        "stay" => TokenKind::Stay,
        "{" => TokenKind::BraceOpen,
        "}" => TokenKind::BraceClose,
        "[" => TokenKind::BracketOpen,
        "]" => TokenKind::BracketClose,
        "(" => TokenKind::GroupOpen,
        ")" => TokenKind::GroupClose,
        ":" => TokenKind::Colon,
        "," => TokenKind::Comma,
        "==" => TokenKind::Eq,
        "!=" => TokenKind::Ne,
        "&&" => TokenKind::And,
        "||" => TokenKind::Or,
        _ => return None,
    };
    Some(kind)
}

/// Character-by-character scan of a word that is not a whole keyword,
/// splitting glued punctuation and quoted constants.
fn scan_word(word: &str, line: &SourceLine, out: &mut Vec<Token>) -> Result<(), SpecError> {
    let mut buf = String::new();
    let mut in_quote = false;

    for c in word.chars() {
        if in_quote {
            if c == '"' && !buf.ends_with('\\') {
                out.push(Token::new(TokenKind::Const(buf.clone()), line));
                buf.clear();
                in_quote = false;
            } else {
                buf.push(c);
            }
            continue;
        }

        match c {
            '"' => {
                if buf.is_empty() {
                    in_quote = true;
                } else {
                    return Err(restricted(line, '"', word));
                }
            }
            '=' => {
                if buf == "=" {
                    buf.clear();
                    out.push(Token::new(TokenKind::Eq, line));
                } else if buf == "!" {
                    buf.clear();
                    out.push(Token::new(TokenKind::Ne, line));
                } else {
                    flush_value(&mut buf, line, out)?;
                    buf.push('=');
                }
            }
            '!' => {
                flush_value(&mut buf, line, out)?;
                buf.push('!');
            }
            '&' => {
                if buf == "&" {
                    buf.clear();
                    out.push(Token::new(TokenKind::And, line));
                } else {
                    flush_value(&mut buf, line, out)?;
                    buf.push('&');
                }
            }
            '|' => {
                if buf == "|" {
                    buf.clear();
                    out.push(Token::new(TokenKind::Or, line));
                } else {
                    flush_value(&mut buf, line, out)?;
                    buf.push('|');
                }
            }
            ':' | ',' | '{' | '}' | '[' | ']' | '(' | ')' => {
                flush_value(&mut buf, line, out)?;
                let kind = match c {
                    ':' => TokenKind::Colon,
                    ',' => TokenKind::Comma,
                    '{' => TokenKind::BraceOpen,
                    '}' => TokenKind::BraceClose,
                    '[' => TokenKind::BracketOpen,
                    ']' => TokenKind::BracketClose,
                    '(' => TokenKind::GroupOpen,
                    _ => TokenKind::GroupClose,
                };
                out.push(Token::new(kind, line));
            }
            _ => buf.push(c),
        }
    }

    if in_quote {
        return Err(SpecError::Tokenize(format!(
            "unterminated constant in '{word}' at line '{}: {}'",
            line.no, line.text
        )));
    }

    flush_value(&mut buf, line, out)
}

/// Emits the accumulated bare word as a token, rejecting leftover
/// restricted characters.
fn flush_value(buf: &mut String, line: &SourceLine, out: &mut Vec<Token>) -> Result<(), SpecError> {
    if buf.is_empty() {
        return Ok(());
    }

    if let Some(c) = buf.chars().find(|c| RESTRICTED_CHARS.contains(c)) {
        let word = buf.clone();
        buf.clear();
        return Err(restricted(line, c, &word));
    }

    let kind = match buf.as_str() {
        "mov_l" => TokenKind::MovL,
        "mov_r" => TokenKind::MovR,
        "stay" => TokenKind::Stay,
        _ => TokenKind::Var(buf.clone()),
    };
    out.push(Token::new(kind, line));
    buf.clear();

    Ok(())
}

fn restricted(line: &SourceLine, c: char, word: &str) -> SpecError {
    SpecError::Tokenize(format!(
        "restricted character '{c}' found in '{word}' at line '{}: {}'",
        line.no, line.text
    ))
}
