//! The program AST produced by the parser.
//!
//! A state is a tree of nodes: the children of a [`NodeKind::State`] node
//! form an IF/ELIF/ELSE chain or a bare GOTO, and the children of a branch
//! node form the branch body (another chain or a GOTO). Evaluation walks
//! the children in source order and commits to the first branch whose
//! condition holds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::tokenizer::SourceLine;
use crate::types::Movement;

/// The value written to a tape cell by a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteValue {
    /// A quoted constant.
    Literal(String),
    /// The current symbol under the head of tape `T.<n>`, read before any
    /// write of the step is applied.
    Copy(usize),
}

/// The per-tape effect of a GOTO: what to write and where to move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapeAction {
    pub tape: usize,
    pub value: WriteValue,
    pub movement: Movement,
}

/// A resolved transition: the next state and the explicit tape actions.
/// Tapes without an action keep their symbol and stay in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GotoSpec {
    pub next_state: String,
    pub actions: Vec<TapeAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    State { name: String },
    If { condition: Condition },
    Elif { condition: Condition },
    Else,
    Goto { goto: GotoSpec },
}

/// One node of a state tree, with the source lines it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    /// Source lines contributing to this node, keyed by line number.
    pub lines: BTreeMap<usize, String>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            lines: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub(crate) fn add_line(&mut self, line: &SourceLine) {
        self.lines.insert(line.no, line.text.clone());
    }

    /// The earliest source line of this node, for diagnostics.
    pub fn first_line(&self) -> Option<(usize, &str)> {
        self.lines
            .iter()
            .next()
            .map(|(no, text)| (*no, text.as_str()))
    }

    /// The state name, when this is a [`NodeKind::State`] node.
    pub fn state_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::State { name } => Some(name),
            _ => None,
        }
    }

    /// Selects the transition for the given head symbols.
    ///
    /// Children are tried in source order: a GOTO fires unconditionally, an
    /// IF or ELIF fires when its condition holds, an ELSE always fires. Once
    /// a branch fires, evaluation descends into its body and never falls
    /// back to later siblings. Returns `None` when no branch produced a
    /// GOTO, which the machine reports as a missing transition.
    pub fn evaluate(&self, symbols: &[String]) -> Option<&GotoSpec> {
        for child in &self.children {
            match &child.kind {
                NodeKind::Goto { goto } => return Some(goto),
                NodeKind::If { condition } | NodeKind::Elif { condition } => {
                    if condition.matches(symbols) {
                        return child.evaluate(symbols);
                    }
                }
                NodeKind::Else => return child.evaluate(symbols),
                NodeKind::State { .. } => {}
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{CmpOp, CondTerm, Comparison, Operand};

    fn eq(tape: usize, value: &str) -> Condition {
        Condition {
            branches: vec![vec![CondTerm::Cmp(Comparison {
                left: Operand::Tape(tape),
                op: CmpOp::Eq,
                right: Operand::Const(value.to_string()),
            })]],
        }
    }

    fn goto(next: &str) -> Node {
        Node::new(NodeKind::Goto {
            goto: GotoSpec {
                next_state: next.to_string(),
                actions: Vec::new(),
            },
        })
    }

    fn branch(kind: NodeKind, body: Node) -> Node {
        let mut node = Node::new(kind);
        node.children.push(body);
        node
    }

    fn symbols(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_bare_goto_fires_unconditionally() {
        let mut state = Node::new(NodeKind::State {
            name: "s0".to_string(),
        });
        state.children.push(goto("s1"));

        let spec = state.evaluate(&symbols(&["x"])).unwrap();
        assert_eq!(spec.next_state, "s1");
    }

    #[test]
    fn test_first_matching_branch_wins() {
        let mut state = Node::new(NodeKind::State {
            name: "s0".to_string(),
        });
        state.children.push(branch(
            NodeKind::If { condition: eq(0, "a") },
            goto("s1"),
        ));
        state.children.push(branch(
            NodeKind::Elif { condition: eq(0, "b") },
            goto("s2"),
        ));
        state.children.push(branch(NodeKind::Else, goto("s3")));

        assert_eq!(state.evaluate(&symbols(&["a"])).unwrap().next_state, "s1");
        assert_eq!(state.evaluate(&symbols(&["b"])).unwrap().next_state, "s2");
        assert_eq!(state.evaluate(&symbols(&["c"])).unwrap().next_state, "s3");
    }

    #[test]
    fn test_taken_branch_never_falls_back() {
        // The outer IF matches, but its body's inner chain does not: the
        // outer ELSE must not be consulted.
        let mut inner = branch(NodeKind::If { condition: eq(1, "y") }, goto("s1"));
        inner.add_line(&crate::tokenizer::SourceLine {
            no: 3,
            text: "if t.1 == \"y\" then".to_string(),
        });

        let mut state = Node::new(NodeKind::State {
            name: "s0".to_string(),
        });
        state.children.push(branch(
            NodeKind::If { condition: eq(0, "a") },
            inner,
        ));
        state.children.push(branch(NodeKind::Else, goto("s9")));

        assert!(state.evaluate(&symbols(&["a", "z"])).is_none());
        assert_eq!(
            state.evaluate(&symbols(&["z", "z"])).unwrap().next_state,
            "s9"
        );
    }

    #[test]
    fn test_no_matching_branch_yields_none() {
        let mut state = Node::new(NodeKind::State {
            name: "s0".to_string(),
        });
        state.children.push(branch(
            NodeKind::If { condition: eq(0, "a") },
            goto("s1"),
        ));

        assert!(state.evaluate(&symbols(&["b"])).is_none());
    }

    #[test]
    fn test_first_line_orders_by_line_number() {
        let mut node = Node::new(NodeKind::Else);
        node.add_line(&crate::tokenizer::SourceLine {
            no: 7,
            text: "else".to_string(),
        });
        node.add_line(&crate::tokenizer::SourceLine {
            no: 4,
            text: "s0 {".to_string(),
        });

        assert_eq!(node.first_line(), Some((4, "s0 {")));
    }
}
