//! This module defines the core data structures and types shared across the
//! tokenizer, parser, and execution engine: the validated program, tape head
//! movements, execution step results, and the error taxonomy.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::ast::Node;

/// File extension of machine specification files.
pub const SPEC_FILE_EXTENSION: &str = "tm";
/// The maximum allowed size for a machine specification in bytes.
pub const MAX_SPEC_SIZE: usize = 65536; // 64KB

/// A fully loaded and validated multi-tape Turing machine program.
///
/// Holds the declared alphabet, the initial tape contents, and the state
/// graph produced by the parser. Instances are immutable after loading;
/// all mutable runtime state lives in [`crate::machine::Machine`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Program {
    /// The ordered set of symbols tape cells and literals may use.
    pub alphabet: Vec<String>,
    /// Initial contents of each tape, indexed by tape id.
    pub tapes: Vec<Vec<String>>,
    /// Name of the state execution starts in.
    pub start_state: String,
    /// Names of the states that stop automatic execution.
    pub halting_states: Vec<String>,
    /// The decision tree of every declared state, keyed by state name.
    pub states: HashMap<String, Node>,
}

impl Program {
    /// Number of tapes the program declares.
    pub fn tape_count(&self) -> usize {
        self.tapes.len()
    }

    /// Whether `name` belongs to the declared halting set.
    pub fn is_halting(&self, name: &str) -> bool {
        self.halting_states.iter().any(|s| s == name)
    }

    /// Whether `symbol` is a member of the declared alphabet.
    pub fn in_alphabet(&self, symbol: &str) -> bool {
        self.alphabet.iter().any(|s| s == symbol)
    }
}

/// A head movement applied at the end of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Movement {
    /// Move the head one position to the left.
    Left,
    /// Keep the head in the same position.
    Stay,
    /// Move the head one position to the right.
    Right,
}

impl Movement {
    /// The signed index delta of this movement.
    pub fn offset(self) -> isize {
        match self {
            Movement::Left => -1,
            Movement::Stay => 0,
            Movement::Right => 1,
        }
    }
}

/// Outcome of a single execution step.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// The machine performed a transition and can continue.
    Continue,
    /// The machine stopped, either normally or with a fault.
    Halt(Halt),
}

/// How the machine stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum Halt {
    /// The current state is in the halting set.
    Ok,
    /// A fatal fault terminated the run.
    Err(ExecutionFault),
}

/// A fatal fault raised by the execution engine.
///
/// Faults terminate the run in progress; the machine's last known tape and
/// state snapshot remains queryable for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ExecutionFault {
    /// The current state name is not declared in the program.
    #[error("state '{0}' is undefined")]
    UndefinedState(String),
    /// The state's decision tree produced no transition.
    #[error("no executable transition found in state '{0}'")]
    NoTransition(String),
    /// A head movement left the fixed tape bounds.
    #[error("head of tape T.{tape} moved out of bounds (to position {position})")]
    HeadOutOfBounds { tape: usize, position: isize },
    /// A transition referenced a tape the machine does not have.
    #[error("transition references tape T.{tape}, but the machine has {count} tapes")]
    TapeOutOfRange { tape: usize, count: usize },
}

/// Errors surfaced while loading or running a machine specification.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpecError {
    /// Malformed section structure, alphabet, or program text.
    #[error("tokenize error: {0}")]
    Tokenize(String),
    /// A grammar violation, anchored to the offending source line.
    #[error("parse error at line '{line}: {text}': {message}")]
    Parse {
        line: usize,
        text: String,
        message: String,
    },
    /// A whole-program validation failure.
    #[error("validation error: {0}")]
    Validation(String),
    /// A fatal execution fault.
    #[error("execution fault: {0}")]
    Execution(#[from] ExecutionFault),
    /// A file system failure while loading a specification.
    #[error("file error: {0}")]
    File(String),
}

impl SpecError {
    /// Builds a [`SpecError::Parse`] anchored to `line`.
    pub fn parse(line: &crate::tokenizer::SourceLine, message: impl Into<String>) -> Self {
        SpecError::Parse {
            line: line.no,
            text: line.text.clone(),
            message: message.into(),
        }
    }
}

/// A point-in-time view of a machine's mutable state, used for status
/// printing by front ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineSnapshot {
    pub tapes: Vec<Vec<String>>,
    pub heads: Vec<usize>,
    pub state: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movement_offsets() {
        assert_eq!(Movement::Left.offset(), -1);
        assert_eq!(Movement::Stay.offset(), 0);
        assert_eq!(Movement::Right.offset(), 1);
    }

    #[test]
    fn test_movement_serialization() {
        let left_json = serde_json::to_string(&Movement::Left).unwrap();
        let stay_json = serde_json::to_string(&Movement::Stay).unwrap();

        assert_eq!(left_json, "\"Left\"");
        assert_eq!(stay_json, "\"Stay\"");

        let left: Movement = serde_json::from_str(&left_json).unwrap();
        let stay: Movement = serde_json::from_str(&stay_json).unwrap();

        assert_eq!(left, Movement::Left);
        assert_eq!(stay, Movement::Stay);
    }

    #[test]
    fn test_fault_display() {
        let fault = ExecutionFault::HeadOutOfBounds {
            tape: 1,
            position: -1,
        };
        let msg = fault.to_string();
        assert!(msg.contains("T.1"));
        assert!(msg.contains("-1"));

        let fault = ExecutionFault::NoTransition("s0".to_string());
        assert!(fault.to_string().contains("s0"));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let snapshot = MachineSnapshot {
            tapes: vec![vec!["a".to_string(), "b".to_string()]],
            heads: vec![1],
            state: "scan".to_string(),
        };

        let json = serde_json::to_string(&snapshot).unwrap();
        let decoded: MachineSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, decoded);
    }
}
