//! Boolean conditions attached to IF/ELIF nodes.
//!
//! A condition is a disjunction of conjunction chains: `a && b || c` holds
//! one branch `[a, b]` and one branch `[c]`. Parenthesised groups are kept
//! as nested conditions, so `(a || b) && c` binds the way the source reads.
//!
//! Parsing is two-pass: the first pass collects comparison terms and the
//! boolean operators between them at one nesting level (recursing into
//! groups), the second folds `&&` runs into branches split on `||`.

use serde::{Deserialize, Serialize};

use crate::parser::TokenCursor;
use crate::tokenizer::TokenKind;
use crate::types::SpecError;

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    /// The current symbol under the head of tape `T.<n>`.
    Tape(usize),
    /// A quoted constant.
    Const(String),
}

/// A single comparison, e.g. `T.0 == "1"` or `T.0 != T.1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    pub left: Operand,
    pub op: CmpOp,
    pub right: Operand,
}

impl Comparison {
    /// Evaluates the comparison against the current head symbols.
    fn matches(&self, symbols: &[String]) -> bool {
        let left = self.resolve(&self.left, symbols);
        let right = self.resolve(&self.right, symbols);
        match self.op {
            CmpOp::Eq => left == right,
            CmpOp::Ne => left != right,
        }
    }

    fn resolve<'a>(&self, operand: &'a Operand, symbols: &'a [String]) -> &'a str {
        match operand {
            Operand::Tape(id) => symbols.get(*id).map(String::as_str).unwrap_or(""),
            Operand::Const(value) => value.as_str(),
        }
    }

    /// Tape ids referenced by this comparison.
    fn tape_ids(&self, out: &mut Vec<usize>) {
        for operand in [&self.left, &self.right] {
            if let Operand::Tape(id) = operand {
                out.push(*id);
            }
        }
    }

    /// Constants referenced by this comparison.
    fn constants<'a>(&'a self, out: &mut Vec<&'a str>) {
        for operand in [&self.left, &self.right] {
            if let Operand::Const(value) = operand {
                out.push(value);
            }
        }
    }
}

/// One term of a conjunction chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CondTerm {
    Cmp(Comparison),
    /// A parenthesised sub-condition, evaluated as a unit.
    Group(Condition),
}

impl CondTerm {
    fn matches(&self, symbols: &[String]) -> bool {
        match self {
            CondTerm::Cmp(cmp) => cmp.matches(symbols),
            CondTerm::Group(cond) => cond.matches(symbols),
        }
    }
}

/// A full condition: OR over branches, AND within each branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub branches: Vec<Vec<CondTerm>>,
}

impl Condition {
    /// Evaluates the condition with short-circuiting in source order.
    pub fn matches(&self, symbols: &[String]) -> bool {
        self.branches
            .iter()
            .any(|branch| branch.iter().all(|term| term.matches(symbols)))
    }

    /// All tape ids referenced anywhere in the condition.
    pub fn tape_ids(&self) -> Vec<usize> {
        let mut ids = Vec::new();
        self.collect_tape_ids(&mut ids);
        ids
    }

    fn collect_tape_ids(&self, out: &mut Vec<usize>) {
        for branch in &self.branches {
            for term in branch {
                match term {
                    CondTerm::Cmp(cmp) => cmp.tape_ids(out),
                    CondTerm::Group(cond) => cond.collect_tape_ids(out),
                }
            }
        }
    }

    /// All quoted constants referenced anywhere in the condition.
    pub fn constants(&self) -> Vec<&str> {
        let mut values = Vec::new();
        self.collect_constants(&mut values);
        values
    }

    fn collect_constants<'a>(&'a self, out: &mut Vec<&'a str>) {
        for branch in &self.branches {
            for term in branch {
                match term {
                    CondTerm::Cmp(cmp) => cmp.constants(out),
                    CondTerm::Group(cond) => cond.collect_constants(out),
                }
            }
        }
    }

    /// Parses a condition from the cursor, stopping at `THEN` (top level) or
    /// at the closing `)` of the current group.
    pub(crate) fn parse(cursor: &mut TokenCursor, in_group: bool) -> Result<Self, SpecError> {
        let mut terms: Vec<CondTerm> = Vec::new();
        let mut ops: Vec<BoolOp> = Vec::new();
        let mut expect_term = true;

        loop {
            let token = cursor.peek()?;
            match &token.kind {
                TokenKind::Then if !in_group => {
                    if expect_term {
                        return Err(SpecError::parse(
                            &token.line,
                            "expected a comparison before THEN".to_string(),
                        ));
                    }
                    break;
                }
                TokenKind::GroupClose if in_group => {
                    if expect_term {
                        return Err(SpecError::parse(
                            &token.line,
                            "expected a comparison before ')'".to_string(),
                        ));
                    }
                    cursor.advance()?;
                    break;
                }
                TokenKind::GroupOpen => {
                    if !expect_term {
                        return Err(SpecError::parse(
                            &token.line,
                            "expected '&&', '||' or the end of the condition, found '('"
                                .to_string(),
                        ));
                    }
                    cursor.advance()?;
                    terms.push(CondTerm::Group(Condition::parse(cursor, true)?));
                    expect_term = false;
                }
                TokenKind::And | TokenKind::Or => {
                    if expect_term {
                        return Err(SpecError::parse(
                            &token.line,
                            format!("expected a comparison, found {}", token.kind.describe()),
                        ));
                    }
                    ops.push(match token.kind {
                        TokenKind::And => BoolOp::And,
                        _ => BoolOp::Or,
                    });
                    cursor.advance()?;
                    expect_term = true;
                }
                TokenKind::Var(_) | TokenKind::Const(_) => {
                    if !expect_term {
                        return Err(SpecError::parse(
                            &token.line,
                            format!(
                                "expected '&&', '||' or the end of the condition, found {}",
                                token.kind.describe()
                            ),
                        ));
                    }
                    terms.push(CondTerm::Cmp(parse_comparison(cursor)?));
                    expect_term = false;
                }
                other => {
                    return Err(SpecError::parse(
                        &token.line,
                        format!("unexpected {} in condition", other.describe()),
                    ));
                }
            }
        }

        Ok(Self::fold(terms, ops))
    }

    /// Second pass: folds `&&` runs into branches, splitting on `||`.
    fn fold(terms: Vec<CondTerm>, ops: Vec<BoolOp>) -> Self {
        let mut branches = Vec::new();
        let mut branch = Vec::new();
        let mut ops = ops.into_iter();

        for term in terms {
            branch.push(term);
            if let Some(BoolOp::Or) = ops.next() {
                branches.push(std::mem::take(&mut branch));
            }
        }
        if !branch.is_empty() {
            branches.push(branch);
        }

        Condition { branches }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoolOp {
    And,
    Or,
}

/// Parses a single `T.<n> ==|!= <operand>` comparison. The left side must
/// be a tape reference; the right side may also be a constant.
fn parse_comparison(cursor: &mut TokenCursor) -> Result<Comparison, SpecError> {
    let token = cursor.advance()?;
    let left = match &token.kind {
        TokenKind::Var(name) => match crate::parser::tape_id(name) {
            Some(id) => Operand::Tape(id),
            None => {
                return Err(SpecError::parse(
                    &token.line,
                    format!(
                        "the left side of a comparison must be a tape reference T.<n>, found '{name}'"
                    ),
                ))
            }
        },
        other => {
            return Err(SpecError::parse(
                &token.line,
                format!(
                    "the left side of a comparison must be a tape reference T.<n>, found {}",
                    other.describe()
                ),
            ))
        }
    };

    let token = cursor.advance()?;
    let op = match token.kind {
        TokenKind::Eq => CmpOp::Eq,
        TokenKind::Ne => CmpOp::Ne,
        ref other => {
            return Err(SpecError::parse(
                &token.line,
                format!("expected '==' or '!=', found {}", other.describe()),
            ))
        }
    };

    let right = parse_operand(cursor)?;

    Ok(Comparison { left, op, right })
}

fn parse_operand(cursor: &mut TokenCursor) -> Result<Operand, SpecError> {
    let token = cursor.advance()?;
    match &token.kind {
        TokenKind::Const(value) => Ok(Operand::Const(value.clone())),
        TokenKind::Var(name) => match crate::parser::tape_id(name) {
            Some(id) => Ok(Operand::Tape(id)),
            None => Err(SpecError::parse(
                &token.line,
                format!("expected a tape reference T.<n> or a constant, found '{name}'"),
            )),
        },
        other => Err(SpecError::parse(
            &token.line,
            format!(
                "expected a tape reference T.<n> or a constant, found {}",
                other.describe()
            ),
        )),
    }
}
