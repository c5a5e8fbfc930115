//! The program parser: turns the tokenized `[program]` section into a
//! [`Program`] with one AST per state.
//!
//! The parser checks grammar only. Whole-program rules (branch ordering,
//! state references, alphabet membership) live in [`crate::analyzer`].
//! Branch nodes are therefore accepted wherever they appear, including a
//! leading `ELIF` or a lone `ELSE`, so the analyzer can report them with
//! context instead of a bare grammar error.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::ast::{GotoSpec, Node, NodeKind, TapeAction, WriteValue};
use crate::condition::Condition;
use crate::tokenizer::{Token, TokenKind, TokenizedSpec};
use crate::types::{Movement, Program, SpecError};

lazy_static! {
    static ref TAPE_REF: Regex = Regex::new(r"^t\.(\d+)$").unwrap();
}

/// Parses a lowercased identifier as a tape reference `t.<n>`.
pub(crate) fn tape_id(name: &str) -> Option<usize> {
    TAPE_REF
        .captures(name)
        .and_then(|caps| caps[1].parse().ok())
}

/// A cursor over the program token stream. Running past the end is a
/// checked failure, reported against the last source line.
pub(crate) struct TokenCursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> TokenCursor<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn peek(&self) -> Result<&'a Token, SpecError> {
        self.tokens.get(self.pos).ok_or_else(|| self.eof())
    }

    pub fn advance(&mut self) -> Result<&'a Token, SpecError> {
        let token = self.tokens.get(self.pos).ok_or_else(|| self.eof())?;
        self.pos += 1;
        Ok(token)
    }

    pub fn expect(&mut self, kind: &TokenKind) -> Result<&'a Token, SpecError> {
        let token = self.advance()?;
        if &token.kind == kind {
            Ok(token)
        } else {
            Err(SpecError::parse(
                &token.line,
                format!(
                    "expected {}, found {}",
                    kind.describe(),
                    token.kind.describe()
                ),
            ))
        }
    }

    fn eof(&self) -> SpecError {
        match self.tokens.last() {
            Some(token) => {
                SpecError::parse(&token.line, "unexpected end of program section")
            }
            None => SpecError::Parse {
                line: 0,
                text: String::new(),
                message: "program section is empty".to_string(),
            },
        }
    }
}

/// Parses a tokenized specification into a [`Program`].
///
/// # Errors
///
/// Returns [`SpecError::Parse`] on any grammar violation: a missing or
/// duplicate `START`, a redefined state, a malformed GOTO block, or a
/// duplicate action for the same tape within one GOTO.
pub fn parse(spec: TokenizedSpec) -> Result<Program, SpecError> {
    let mut cursor = TokenCursor::new(&spec.program);

    let mut start_state: Option<String> = None;
    let mut halting_states: Vec<String> = Vec::new();
    let mut states: HashMap<String, Node> = HashMap::new();

    while !cursor.at_end() {
        let token = cursor.advance()?;
        match &token.kind {
            TokenKind::Start => {
                if start_state.is_some() {
                    return Err(SpecError::parse(
                        &token.line,
                        "START state is defined more than once",
                    ));
                }
                start_state = Some(state_name(&mut cursor)?);
            }
            TokenKind::End => parse_end(&mut cursor, &mut halting_states)?,
            TokenKind::Var(name) => {
                if states.contains_key(name) {
                    return Err(SpecError::parse(
                        &token.line,
                        format!("state '{name}' is defined more than once"),
                    ));
                }
                let node = parse_state(&mut cursor, name, token)?;
                states.insert(name.clone(), node);
            }
            other => {
                return Err(SpecError::parse(
                    &token.line,
                    format!(
                        "expected START, END or a state definition, found {}",
                        other.describe()
                    ),
                ))
            }
        }
    }

    let start_state = start_state.ok_or(SpecError::Parse {
        line: 0,
        text: String::new(),
        message: "START state was not defined".to_string(),
    })?;
    if halting_states.is_empty() {
        return Err(SpecError::Parse {
            line: 0,
            text: String::new(),
            message: "no END state was defined".to_string(),
        });
    }

    Ok(Program {
        alphabet: spec.alphabet,
        tapes: spec.tapes,
        start_state,
        halting_states,
        states,
    })
}

/// A bare state name.
fn state_name(cursor: &mut TokenCursor) -> Result<String, SpecError> {
    let token = cursor.advance()?;
    match &token.kind {
        TokenKind::Var(name) => Ok(name.clone()),
        other => Err(SpecError::parse(
            &token.line,
            format!("expected a state name, found {}", other.describe()),
        )),
    }
}

/// `END <state>` or `END [<state>, <state>, ...]`, trailing comma allowed.
fn parse_end(cursor: &mut TokenCursor, halting: &mut Vec<String>) -> Result<(), SpecError> {
    let push = |halting: &mut Vec<String>, name: String| {
        if !halting.contains(&name) {
            halting.push(name);
        }
    };

    if cursor.peek()?.kind == TokenKind::BracketOpen {
        cursor.advance()?;
        loop {
            let token = cursor.advance()?;
            match &token.kind {
                TokenKind::BracketClose => break,
                TokenKind::Var(name) => {
                    push(halting, name.clone());
                    if cursor.peek()?.kind == TokenKind::Comma {
                        cursor.advance()?;
                    }
                }
                other => {
                    return Err(SpecError::parse(
                        &token.line,
                        format!("expected a state name or ']', found {}", other.describe()),
                    ))
                }
            }
        }
    } else {
        push(halting, state_name(cursor)?);
    }

    Ok(())
}

/// `<name> { <items> }`
fn parse_state(cursor: &mut TokenCursor, name: &str, header: &Token) -> Result<Node, SpecError> {
    let mut node = Node::new(NodeKind::State {
        name: name.to_string(),
    });
    node.add_line(&header.line);

    cursor.expect(&TokenKind::BraceOpen)?;
    node.children = parse_items(cursor)?;
    cursor.expect(&TokenKind::BraceClose)?;

    Ok(node)
}

/// The children of a state block: GOTO and branch nodes in source order,
/// up to (not including) the closing `}`.
fn parse_items(cursor: &mut TokenCursor) -> Result<Vec<Node>, SpecError> {
    let mut items = Vec::new();

    loop {
        let token = cursor.peek()?;
        match &token.kind {
            TokenKind::BraceClose => break,
            TokenKind::Goto => items.push(parse_goto(cursor)?),
            TokenKind::If | TokenKind::Elif | TokenKind::Else => {
                items.push(parse_branch(cursor)?)
            }
            other => {
                return Err(SpecError::parse(
                    &token.line,
                    format!(
                        "expected GOTO, IF, ELIF, ELSE or '}}', found {}",
                        other.describe()
                    ),
                ))
            }
        }
    }

    Ok(items)
}

/// A single branch node with its braced body:
/// `IF <condition> THEN { ... }`, `ELIF <condition> THEN { ... }`, or
/// `ELSE { ... }`. An empty body parses; the analyzer rejects it.
fn parse_branch(cursor: &mut TokenCursor) -> Result<Node, SpecError> {
    let header = cursor.advance()?;
    let kind = match header.kind {
        TokenKind::If => NodeKind::If {
            condition: parse_condition(cursor)?,
        },
        TokenKind::Elif => NodeKind::Elif {
            condition: parse_condition(cursor)?,
        },
        _ => NodeKind::Else,
    };

    let mut node = Node::new(kind);
    node.add_line(&header.line);

    cursor.expect(&TokenKind::BraceOpen)?;
    node.children = parse_items(cursor)?;
    cursor.expect(&TokenKind::BraceClose)?;

    Ok(node)
}

fn parse_condition(cursor: &mut TokenCursor) -> Result<Condition, SpecError> {
    let condition = Condition::parse(cursor, false)?;
    cursor.expect(&TokenKind::Then)?;
    Ok(condition)
}

/// `GOTO <state> { <actions> }`, where each action is
/// `T.<n>: [<value>, <movement>]` with an optional trailing comma. Tapes
/// not mentioned keep their symbol and stay in place.
fn parse_goto(cursor: &mut TokenCursor) -> Result<Node, SpecError> {
    let header = cursor.expect(&TokenKind::Goto)?;
    let next_state = state_name(cursor)?;
    cursor.expect(&TokenKind::BraceOpen)?;

    let mut actions: Vec<TapeAction> = Vec::new();
    loop {
        let token = cursor.advance()?;
        match &token.kind {
            TokenKind::BraceClose => break,
            TokenKind::Var(name) => {
                let tape = tape_id(name).ok_or_else(|| {
                    SpecError::parse(
                        &token.line,
                        format!("expected a tape reference T.<n>, found '{name}'"),
                    )
                })?;
                if actions.iter().any(|action| action.tape == tape) {
                    return Err(SpecError::parse(
                        &token.line,
                        format!("tape T.{tape} has more than one action in this GOTO"),
                    ));
                }
                let (value, movement) = parse_action(cursor)?;
                actions.push(TapeAction {
                    tape,
                    value,
                    movement,
                });
                if cursor.peek()?.kind == TokenKind::Comma {
                    cursor.advance()?;
                }
            }
            other => {
                return Err(SpecError::parse(
                    &token.line,
                    format!(
                        "expected a tape reference T.<n> or '}}', found {}",
                        other.describe()
                    ),
                ))
            }
        }
    }

    let mut node = Node::new(NodeKind::Goto {
        goto: GotoSpec {
            next_state,
            actions,
        },
    });
    node.add_line(&header.line);
    Ok(node)
}

/// The `: [<value>, <movement>]` tail of one tape action.
fn parse_action(cursor: &mut TokenCursor) -> Result<(WriteValue, Movement), SpecError> {
    cursor.expect(&TokenKind::Colon)?;
    cursor.expect(&TokenKind::BracketOpen)?;

    let token = cursor.advance()?;
    let value = match &token.kind {
        TokenKind::Const(value) => WriteValue::Literal(value.clone()),
        TokenKind::Var(name) => match tape_id(name) {
            Some(id) => WriteValue::Copy(id),
            None => {
                return Err(SpecError::parse(
                    &token.line,
                    format!("expected a constant or a tape reference T.<n>, found '{name}'"),
                ))
            }
        },
        other => {
            return Err(SpecError::parse(
                &token.line,
                format!(
                    "expected a constant or a tape reference T.<n>, found {}",
                    other.describe()
                ),
            ))
        }
    };

    cursor.expect(&TokenKind::Comma)?;

    let token = cursor.advance()?;
    let movement = match token.kind {
        TokenKind::MovL => Movement::Left,
        TokenKind::MovR => Movement::Right,
        TokenKind::Stay => Movement::Stay,
        ref other => {
            return Err(SpecError::parse(
                &token.line,
                format!("expected MOV_L, MOV_R or STAY, found {}", other.describe()),
            ))
        }
    };

    cursor.expect(&TokenKind::BracketClose)?;

    Ok((value, movement))
}
