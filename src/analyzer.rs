//! Whole-program validation, run after parsing and before execution.
//!
//! The analyzer walks every state tree and checks the rules the grammar
//! alone cannot express: branch ordering within a chain, exhaustiveness,
//! state references, tape ranges, and alphabet membership. Checking is
//! fail-fast: the first violation found is reported.

use thiserror::Error;

use crate::ast::{Node, NodeKind, WriteValue};
use crate::condition::Condition;
use crate::types::{Program, SpecError};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("START state '{0}' is not defined")]
    UnknownStartState(String),
    #[error("START state '{0}' is in the halting set, the machine would never run")]
    HaltingStartState(String),
    #[error("halting state '{0}' is not defined")]
    UnknownHaltingState(String),
    #[error("state '{state}': GOTO targets unknown state '{target}' (line {line})")]
    UnknownGotoTarget {
        state: String,
        target: String,
        line: usize,
    },
    #[error("state '{state}': tape T.{tape} does not exist, the machine has {count} tape(s) (line {line})")]
    TapeOutOfRange {
        state: String,
        tape: usize,
        count: usize,
        line: usize,
    },
    #[error("state '{state}': symbol '{symbol}' is not in the alphabet (line {line})")]
    SymbolNotInAlphabet {
        state: String,
        symbol: String,
        line: usize,
    },
    #[error("state '{state}': IF cannot follow another branch in the same chain (line {line})")]
    MisplacedIf { state: String, line: usize },
    #[error("state '{state}': ELIF without a preceding IF (line {line})")]
    MisplacedElif { state: String, line: usize },
    #[error("state '{state}': ELSE without a preceding IF (line {line})")]
    MisplacedElse { state: String, line: usize },
    #[error("state '{state}': IF chain has no terminal ELSE (line {line})")]
    MissingElse { state: String, line: usize },
    #[error("state '{state}': unreachable node after a GOTO or ELSE (line {line})")]
    Unreachable { state: String, line: usize },
    #[error("state '{state}': branch has no GOTO (line {line})")]
    MissingGoto { state: String, line: usize },
    #[error("state '{0}' has an empty body")]
    EmptyState(String),
}

impl From<ValidationError> for SpecError {
    fn from(err: ValidationError) -> Self {
        SpecError::Validation(err.to_string())
    }
}

/// Validates a parsed program.
///
/// The start state and every halting state must be declared, and the start
/// state must not itself be halting. Every chain must be exhaustive: a
/// bare GOTO, or an IF with optional ELIFs and a mandatory terminal ELSE,
/// at every nesting level. This makes a missing transition impossible for
/// any input, so a validated program can only fault by moving a head off a
/// tape.
pub fn analyze(program: &Program) -> Result<(), SpecError> {
    if !program.states.contains_key(&program.start_state) {
        return Err(ValidationError::UnknownStartState(program.start_state.clone()).into());
    }
    if program.is_halting(&program.start_state) {
        return Err(ValidationError::HaltingStartState(program.start_state.clone()).into());
    }
    for name in &program.halting_states {
        if !program.states.contains_key(name) {
            return Err(ValidationError::UnknownHaltingState(name.clone()).into());
        }
    }

    let mut names: Vec<&String> = program.states.keys().collect();
    names.sort();
    for name in names {
        let node = &program.states[name];
        if node.children.is_empty() {
            if program.is_halting(name) {
                // A halting state's body is never evaluated.
                continue;
            }
            return Err(ValidationError::EmptyState(name.clone()).into());
        }
        check_chain(program, name, node)?;
    }

    Ok(())
}

fn line_of(node: &Node) -> usize {
    node.first_line().map(|(no, _)| no).unwrap_or(0)
}

/// Checks one children list: either a single GOTO, or an `IF ELIF* ELSE`
/// chain, recursing into branch bodies.
fn check_chain(program: &Program, state: &str, parent: &Node) -> Result<(), SpecError> {
    let children = &parent.children;

    for (i, child) in children.iter().enumerate() {
        let line = line_of(child);
        match &child.kind {
            NodeKind::Goto { .. } if i > 0 => {
                return Err(ValidationError::Unreachable {
                    state: state.to_string(),
                    line,
                }
                .into())
            }
            NodeKind::Goto { .. } if children.len() > 1 => {
                return Err(ValidationError::Unreachable {
                    state: state.to_string(),
                    line: line_of(&children[1]),
                }
                .into())
            }
            NodeKind::Goto { .. } => {}
            NodeKind::If { .. } if i > 0 => {
                return Err(ValidationError::MisplacedIf {
                    state: state.to_string(),
                    line,
                }
                .into())
            }
            NodeKind::If { .. } => {}
            NodeKind::Elif { .. } => {
                let after_if = matches!(
                    children.get(i.wrapping_sub(1)).map(|n| &n.kind),
                    Some(NodeKind::If { .. }) | Some(NodeKind::Elif { .. })
                );
                if i == 0 || !after_if {
                    return Err(ValidationError::MisplacedElif {
                        state: state.to_string(),
                        line,
                    }
                    .into());
                }
            }
            NodeKind::Else => {
                if i == 0 {
                    return Err(ValidationError::MisplacedElse {
                        state: state.to_string(),
                        line,
                    }
                    .into());
                }
                if i != children.len() - 1 {
                    return Err(ValidationError::Unreachable {
                        state: state.to_string(),
                        line: line_of(&children[i + 1]),
                    }
                    .into());
                }
            }
            NodeKind::State { .. } => {
                return Err(ValidationError::Unreachable {
                    state: state.to_string(),
                    line,
                }
                .into())
            }
        }
    }

    // A chain that starts with IF must end with ELSE, otherwise some input
    // would leave the state without a transition.
    if matches!(children.first().map(|n| &n.kind), Some(NodeKind::If { .. }))
        && !matches!(children.last().map(|n| &n.kind), Some(NodeKind::Else))
    {
        return Err(ValidationError::MissingElse {
            state: state.to_string(),
            line: line_of(parent),
        }
        .into());
    }

    for child in children {
        match &child.kind {
            NodeKind::Goto { goto } => check_goto(program, state, child, goto)?,
            NodeKind::If { condition } | NodeKind::Elif { condition } => {
                check_condition(program, state, child, condition)?;
                check_body(program, state, child)?;
            }
            NodeKind::Else => check_body(program, state, child)?,
            NodeKind::State { .. } => {}
        }
    }

    Ok(())
}

fn check_body(program: &Program, state: &str, branch: &Node) -> Result<(), SpecError> {
    if branch.children.is_empty() {
        return Err(ValidationError::MissingGoto {
            state: state.to_string(),
            line: line_of(branch),
        }
        .into());
    }
    check_chain(program, state, branch)
}

fn check_condition(
    program: &Program,
    state: &str,
    node: &Node,
    condition: &Condition,
) -> Result<(), SpecError> {
    let count = program.tape_count();
    for tape in condition.tape_ids() {
        if tape >= count {
            return Err(ValidationError::TapeOutOfRange {
                state: state.to_string(),
                tape,
                count,
                line: line_of(node),
            }
            .into());
        }
    }
    for symbol in condition.constants() {
        if !program.in_alphabet(symbol) {
            return Err(ValidationError::SymbolNotInAlphabet {
                state: state.to_string(),
                symbol: symbol.to_string(),
                line: line_of(node),
            }
            .into());
        }
    }
    Ok(())
}

fn check_goto(
    program: &Program,
    state: &str,
    node: &Node,
    goto: &crate::ast::GotoSpec,
) -> Result<(), SpecError> {
    let line = line_of(node);

    if !program.states.contains_key(&goto.next_state) {
        return Err(ValidationError::UnknownGotoTarget {
            state: state.to_string(),
            target: goto.next_state.clone(),
            line,
        }
        .into());
    }

    let count = program.tape_count();
    for action in &goto.actions {
        if action.tape >= count {
            return Err(ValidationError::TapeOutOfRange {
                state: state.to_string(),
                tape: action.tape,
                count,
                line,
            }
            .into());
        }
        match &action.value {
            WriteValue::Literal(symbol) => {
                if !program.in_alphabet(symbol) {
                    return Err(ValidationError::SymbolNotInAlphabet {
                        state: state.to_string(),
                        symbol: symbol.clone(),
                        line,
                    }
                    .into());
                }
            }
            WriteValue::Copy(source) => {
                if *source >= count {
                    return Err(ValidationError::TapeOutOfRange {
                        state: state.to_string(),
                        tape: *source,
                        count,
                        line,
                    }
                    .into());
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::tokenizer::tokenize;

    fn check(text: &str) -> Result<(), SpecError> {
        let spec = format!(
            "[tape]\nalphabet = [0, 1, x]\nT.0 = [0, 1]\nT.1 = [x, x]\n[program]\n{text}\n"
        );
        analyze(&parse(tokenize(&spec).unwrap())?)
    }

    #[test]
    fn test_valid_program() {
        check(
            r#"
START S0
END S1
S0 {
  IF T.0 == "0" THEN {
    GOTO S0 { T.0: ["1", MOV_R] }
  }
  ELIF T.0 == "1" THEN {
    GOTO S0 { T.0: ["0", MOV_R] }
  }
  ELSE {
    GOTO S1 { }
  }
}
S1 { }
"#,
        )
        .unwrap();
    }

    #[test]
    fn test_bare_goto_state() {
        check("START S0\nEND S1\nS0 { GOTO S1 { } }\nS1 { }").unwrap();
    }

    #[test]
    fn test_unknown_start_state() {
        let error = check("START S9\nEND S1\nS0 { GOTO S1 { } }\nS1 { }").unwrap_err();
        assert!(error.to_string().contains("START state 's9'"));
    }

    #[test]
    fn test_halting_start_state() {
        let error = check("START S0\nEND S0\nS0 { }").unwrap_err();
        assert!(error.to_string().contains("halting set"));
    }

    #[test]
    fn test_undeclared_halting_state() {
        let error = check("START S0\nEND [S1, S2]\nS0 { GOTO S1 { } }\nS1 { }").unwrap_err();
        assert!(error.to_string().contains("halting state 's2'"));
    }

    #[test]
    fn test_if_without_else() {
        let error = check(
            "START S0\nEND S1\nS0 { IF T.0 == \"0\" THEN { GOTO S1 { } } }\nS1 { }",
        )
        .unwrap_err();
        assert!(error.to_string().contains("no terminal ELSE"));
    }

    #[test]
    fn test_nested_if_without_else() {
        let error = check(
            r#"
START S0
END S1
S0 {
  IF T.0 == "0" THEN {
    IF T.1 == "x" THEN {
      GOTO S1 { }
    }
  }
  ELSE {
    GOTO S1 { }
  }
}
S1 { }
"#,
        )
        .unwrap_err();
        assert!(error.to_string().contains("no terminal ELSE"));
    }

    #[test]
    fn test_lone_else() {
        let error = check("START S0\nEND S1\nS0 { ELSE { GOTO S1 { } } }\nS1 { }").unwrap_err();
        assert!(error.to_string().contains("ELSE without a preceding IF"));
    }

    #[test]
    fn test_lone_elif() {
        let error = check(
            "START S0\nEND S1\nS0 { ELIF T.0 == \"0\" THEN { GOTO S1 { } } }\nS1 { }",
        )
        .unwrap_err();
        assert!(error.to_string().contains("ELIF without a preceding IF"));
    }

    #[test]
    fn test_node_after_goto_is_unreachable() {
        let error =
            check("START S0\nEND S1\nS0 { GOTO S1 { } GOTO S0 { } }\nS1 { }").unwrap_err();
        assert!(error.to_string().contains("unreachable"));
    }

    #[test]
    fn test_empty_branch_body() {
        let error = check(
            "START S0\nEND S1\nS0 { IF T.0 == \"0\" THEN { } ELSE { GOTO S1 { } } }\nS1 { }",
        )
        .unwrap_err();
        assert!(error.to_string().contains("branch has no GOTO"));
    }

    #[test]
    fn test_empty_non_halting_state() {
        let error =
            check("START S0\nEND S1\nS0 { }\nS1 { }\nS2 { GOTO S1 { } }").unwrap_err();
        assert!(error.to_string().contains("empty body"));
    }

    #[test]
    fn test_empty_halting_state_is_allowed() {
        check("START S0\nEND S1\nS0 { GOTO S1 { } }\nS1 { }").unwrap();
    }

    #[test]
    fn test_unknown_goto_target() {
        let error = check("START S0\nEND S1\nS0 { GOTO S9 { } }\nS1 { }").unwrap_err();
        assert!(error.to_string().contains("unknown state 's9'"));
    }

    #[test]
    fn test_halting_state_with_body_is_allowed() {
        // The body is dead at runtime but must still be well-formed.
        check("START S0\nEND S1\nS0 { GOTO S1 { } }\nS1 { GOTO S1 { } }").unwrap();
    }

    #[test]
    fn test_condition_tape_out_of_range() {
        let error = check(
            "START S0\nEND S1\nS0 { IF T.7 == \"0\" THEN { GOTO S1 { } } ELSE { GOTO S1 { } } }\nS1 { }",
        )
        .unwrap_err();
        assert!(error.to_string().contains("T.7"));
    }

    #[test]
    fn test_condition_symbol_not_in_alphabet() {
        let error = check(
            "START S0\nEND S1\nS0 { IF T.0 == \"z\" THEN { GOTO S1 { } } ELSE { GOTO S1 { } } }\nS1 { }",
        )
        .unwrap_err();
        assert!(error.to_string().contains("'z'"));
    }

    #[test]
    fn test_grouped_condition_is_checked_recursively() {
        let error = check(
            "START S0\nEND S1\nS0 { IF (T.0 == \"0\" || T.9 == \"1\") THEN { GOTO S1 { } } ELSE { GOTO S1 { } } }\nS1 { }",
        )
        .unwrap_err();
        assert!(error.to_string().contains("T.9"));
    }

    #[test]
    fn test_action_tape_out_of_range() {
        let error = check("START S0\nEND S1\nS0 { GOTO S1 { T.5: [\"0\", STAY] } }\nS1 { }")
            .unwrap_err();
        assert!(error.to_string().contains("T.5"));
    }

    #[test]
    fn test_action_symbol_not_in_alphabet() {
        let error = check("START S0\nEND S1\nS0 { GOTO S1 { T.0: [\"q\", STAY] } }\nS1 { }")
            .unwrap_err();
        assert!(error.to_string().contains("'q'"));
    }

    #[test]
    fn test_action_copy_source_out_of_range() {
        let error = check("START S0\nEND S1\nS0 { GOTO S1 { T.0: [T.6, STAY] } }\nS1 { }")
            .unwrap_err();
        assert!(error.to_string().contains("T.6"));
    }
}
