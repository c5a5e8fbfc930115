//! A compiler and interpreter for a small text language describing
//! multi-tape Turing machines.
//!
//! A specification has a `[tape]` section declaring the alphabet and the
//! fixed-length tapes, and a `[program]` section declaring states as trees
//! of IF/ELIF/ELSE branches ending in GOTO transitions. Loading a
//! specification runs the full pipeline (tokenize, parse, analyze) and
//! yields a [`Program`] that a [`Machine`] executes deterministically.
//!
//! # Example
//!
//! ```
//! use tapestry::{Halt, Machine, ProgramLoader};
//!
//! let spec = r#"
//! [tape]
//! alphabet = [0, 1]
//! T.0 = [0, 1]
//!
//! [program]
//! START s0
//! END s1
//!
//! s0 {
//!   IF T.0 == "0" THEN {
//!     GOTO s0 { T.0: ["1", MOV_R] }
//!   }
//!   ELSE {
//!     GOTO s1 { }
//!   }
//! }
//!
//! s1 { }
//! "#;
//!
//! let program = ProgramLoader::load_program_from_string(spec).unwrap();
//! let mut machine = Machine::new(program);
//!
//! assert_eq!(machine.run(), Halt::Ok);
//! assert_eq!(machine.tapes()[0], vec!["1", "1"]);
//! ```

pub mod analyzer;
pub mod ast;
pub mod condition;
pub mod loader;
pub mod machine;
pub mod parser;
pub mod programs;
pub mod tokenizer;
pub mod types;

pub use analyzer::{analyze, ValidationError};
pub use ast::{GotoSpec, Node, NodeKind, TapeAction, WriteValue};
pub use condition::{CmpOp, CondTerm, Condition, Comparison, Operand};
pub use loader::ProgramLoader;
pub use machine::Machine;
pub use parser::parse;
pub use programs::{ProgramInfo, ProgramManager};
pub use tokenizer::{tokenize, SourceLine, Token, TokenKind, TokenizedSpec};
pub use types::{
    ExecutionFault, Halt, MachineSnapshot, Movement, Program, SpecError, Step,
    MAX_SPEC_SIZE, SPEC_FILE_EXTENSION,
};
