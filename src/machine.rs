//! The execution engine.
//!
//! A [`Machine`] owns a validated [`Program`] together with the mutable run
//! state: tape contents, head positions, the current state name, and the
//! step counter. Execution is deterministic; a fault freezes the machine
//! with its last consistent tape contents intact.

use crate::ast::WriteValue;
use crate::types::{ExecutionFault, Halt, MachineSnapshot, Program, Step};

#[derive(Debug, Clone)]
pub struct Machine {
    program: Program,
    tapes: Vec<Vec<String>>,
    heads: Vec<usize>,
    state: String,
    step_count: usize,
    halted: Option<Halt>,
}

impl Machine {
    /// Creates a machine positioned at the program's start state, with
    /// every head at position 0.
    pub fn new(program: Program) -> Self {
        let tapes = program.tapes.clone();
        let heads = vec![0; program.tape_count()];
        let state = program.start_state.clone();
        Self {
            program,
            tapes,
            heads,
            state,
            step_count: 0,
            halted: None,
        }
    }

    /// Performs one transition.
    ///
    /// If the current state is in the halting set, the machine halts
    /// without evaluating the state's body. Otherwise the state tree picks
    /// a GOTO for the current head symbols, and the step applies it in
    /// three phases: all movements are bounds-checked first, then all
    /// writes are applied against the symbols read at the start of the
    /// step, then all heads move. A failed bounds check therefore leaves
    /// every tape untouched.
    ///
    /// Once halted, further calls return the same [`Step::Halt`].
    pub fn step(&mut self) -> Step {
        if let Some(halt) = &self.halted {
            return Step::Halt(halt.clone());
        }
        if self.program.is_halting(&self.state) {
            self.halted = Some(Halt::Ok);
            return Step::Halt(Halt::Ok);
        }
        if !self.program.states.contains_key(&self.state) {
            return self.fault(ExecutionFault::UndefinedState(self.state.clone()));
        }

        let symbols = self.symbols();
        let goto = match self.program.states[&self.state].evaluate(&symbols) {
            Some(goto) => goto.clone(),
            None => return self.fault(ExecutionFault::NoTransition(self.state.clone())),
        };

        for action in &goto.actions {
            if action.tape >= self.tapes.len() {
                return self.fault(ExecutionFault::TapeOutOfRange {
                    tape: action.tape,
                    count: self.tapes.len(),
                });
            }
            if let WriteValue::Copy(source) = &action.value {
                if *source >= self.tapes.len() {
                    return self.fault(ExecutionFault::TapeOutOfRange {
                        tape: *source,
                        count: self.tapes.len(),
                    });
                }
            }
        }

        for action in &goto.actions {
            let position = self.heads[action.tape] as isize + action.movement.offset();
            if position < 0 || position >= self.tapes[action.tape].len() as isize {
                return self.fault(ExecutionFault::HeadOutOfBounds {
                    tape: action.tape,
                    position,
                });
            }
        }

        for action in &goto.actions {
            let value = match &action.value {
                WriteValue::Literal(symbol) => symbol.clone(),
                WriteValue::Copy(source) => symbols[*source].clone(),
            };
            let head = self.heads[action.tape];
            self.tapes[action.tape][head] = value;
        }

        for action in &goto.actions {
            let head = &mut self.heads[action.tape];
            *head = (*head as isize + action.movement.offset()) as usize;
        }

        self.state = goto.next_state;
        self.step_count += 1;

        Step::Continue
    }

    /// Records a fault and freezes the machine on it.
    fn fault(&mut self, fault: ExecutionFault) -> Step {
        let halt = Halt::Err(fault);
        self.halted = Some(halt.clone());
        Step::Halt(halt)
    }

    /// Runs until the machine halts and returns how it stopped.
    pub fn run(&mut self) -> Halt {
        loop {
            if let Step::Halt(halt) = self.step() {
                return halt;
            }
        }
    }

    /// Restores the initial tapes, heads, and start state.
    pub fn reset(&mut self) {
        self.tapes = self.program.tapes.clone();
        self.heads = vec![0; self.program.tape_count()];
        self.state = self.program.start_state.clone();
        self.step_count = 0;
        self.halted = None;
    }

    /// The symbols currently under each head, indexed by tape id.
    pub fn symbols(&self) -> Vec<String> {
        self.tapes
            .iter()
            .zip(&self.heads)
            .map(|(tape, head)| tape[*head].clone())
            .collect()
    }

    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            tapes: self.tapes.clone(),
            heads: self.heads.clone(),
            state: self.state.clone(),
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn tapes(&self) -> &[Vec<String>] {
        &self.tapes
    }

    pub fn heads(&self) -> &[usize] {
        &self.heads
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze;
    use crate::parser::parse;
    use crate::tokenizer::tokenize;

    fn machine(spec: &str) -> Machine {
        let program = parse(tokenize(spec).unwrap()).unwrap();
        analyze(&program).unwrap();
        Machine::new(program)
    }

    // Walks T.0 rightward, rewriting each cell to "1", and halts on "x".
    const FILL_ONES: &str = r#"
[tape]
alphabet = [0, 1, x]
T.0 = [0, 0, 0, x]

[program]
START S0
END S1
S0 {
  IF T.0 == "x" THEN {
    GOTO S1 { }
  }
  ELSE {
    GOTO S0 { T.0: ["1", MOV_R] }
  }
}
S1 { }
"#;

    #[test]
    fn test_run_to_normal_halt() {
        let mut m = machine(FILL_ONES);
        let halt = m.run();

        assert_eq!(halt, Halt::Ok);
        assert!(m.is_halted());
        assert_eq!(m.state(), "s1");
        assert_eq!(m.tapes()[0], vec!["1", "1", "1", "x"]);
        assert_eq!(m.heads()[0], 3);
        assert_eq!(m.step_count(), 4);
    }

    #[test]
    fn test_halting_state_stops_before_evaluation() {
        // S1 is halting; its self-GOTO body must never run.
        let spec = r#"
[tape]
alphabet = [0, 1]
T.0 = [0, 0]

[program]
START S0
END S1
S0 {
  GOTO S1 { T.0: ["1", MOV_R] }
}
S1 {
  GOTO S1 { T.0: ["1", MOV_R] }
}
"#;
        let mut m = machine(spec);

        assert_eq!(m.step(), Step::Continue);
        assert_eq!(m.step(), Step::Halt(Halt::Ok));
        assert_eq!(m.tapes()[0], vec!["1", "0"]);
        assert_eq!(m.heads()[0], 1);
        assert_eq!(m.step_count(), 1);
    }

    #[test]
    fn test_out_of_bounds_preserves_tapes() {
        // The write in the faulting GOTO must not land.
        let spec = r#"
[tape]
alphabet = [0, 1]
T.0 = [0]

[program]
START S0
END S1
S0 {
  GOTO S1 { T.0: ["1", MOV_R] }
}
S1 { }
"#;
        let mut m = machine(spec);
        let halt = m.run();

        assert_eq!(
            halt,
            Halt::Err(ExecutionFault::HeadOutOfBounds {
                tape: 0,
                position: 1
            })
        );
        assert_eq!(m.tapes()[0], vec!["0"]);
        assert_eq!(m.heads()[0], 0);
        assert_eq!(m.state(), "s0");
        assert_eq!(m.step_count(), 0);
    }

    #[test]
    fn test_left_of_zero_faults() {
        let spec = r#"
[tape]
alphabet = [0]
T.0 = [0, 0]

[program]
START S0
END S1
S0 {
  GOTO S1 { T.0: ["0", MOV_L] }
}
S1 { }
"#;
        let mut m = machine(spec);

        assert_eq!(
            m.run(),
            Halt::Err(ExecutionFault::HeadOutOfBounds {
                tape: 0,
                position: -1
            })
        );
    }

    #[test]
    fn test_copy_values_read_before_writes() {
        // T.0 and T.1 swap symbols in a single step: both copies must
        // resolve against the pre-write head symbols.
        let spec = r#"
[tape]
alphabet = [a, b]
T.0 = [a]
T.1 = [b]

[program]
START S0
END S1
S0 {
  GOTO S1 {
    T.0: [T.1, STAY],
    T.1: [T.0, STAY]
  }
}
S1 { }
"#;
        let mut m = machine(spec);
        m.run();

        assert_eq!(m.tapes()[0], vec!["b"]);
        assert_eq!(m.tapes()[1], vec!["a"]);
    }

    #[test]
    fn test_unmentioned_tape_keeps_symbol_and_position() {
        let spec = r#"
[tape]
alphabet = [0, 1]
T.0 = [0, 0]
T.1 = [1, 1]

[program]
START S0
END S1
S0 {
  GOTO S1 { T.0: ["1", MOV_R] }
}
S1 { }
"#;
        let mut m = machine(spec);
        m.step();

        assert_eq!(m.tapes()[1], vec!["1", "1"]);
        assert_eq!(m.heads()[1], 0);
    }

    #[test]
    fn test_step_after_halt_is_stable() {
        let mut m = machine(FILL_ONES);
        m.run();

        let before = m.snapshot();
        assert_eq!(m.step(), Step::Halt(Halt::Ok));
        assert_eq!(m.snapshot(), before);
    }

    #[test]
    fn test_reset_restores_initial_configuration() {
        let mut m = machine(FILL_ONES);
        m.run();
        m.reset();

        assert!(!m.is_halted());
        assert_eq!(m.state(), "s0");
        assert_eq!(m.tapes()[0], vec!["0", "0", "0", "x"]);
        assert_eq!(m.heads()[0], 0);
        assert_eq!(m.step_count(), 0);

        // A second run is identical to the first.
        assert_eq!(m.run(), Halt::Ok);
        assert_eq!(m.tapes()[0], vec!["1", "1", "1", "x"]);
    }

    // Built without validation, to exercise the engine's own guards.
    fn unvalidated(spec: &str) -> Machine {
        Machine::new(parse(tokenize(spec).unwrap()).unwrap())
    }

    #[test]
    fn test_undefined_state_fault() {
        let spec = r#"
[tape]
alphabet = [0]
T.0 = [0]

[program]
START S0
END S1
S0 { GOTO S9 { } }
S1 { }
"#;
        let mut m = unvalidated(spec);

        assert_eq!(m.step(), Step::Continue);
        assert_eq!(
            m.step(),
            Step::Halt(Halt::Err(ExecutionFault::UndefinedState("s9".to_string())))
        );
    }

    #[test]
    fn test_no_transition_fault() {
        let spec = r#"
[tape]
alphabet = [0, 1]
T.0 = [0]

[program]
START S0
END S1
S0 {
  IF T.0 == "1" THEN {
    GOTO S1 { }
  }
}
S1 { }
"#;
        let mut m = unvalidated(spec);

        assert_eq!(
            m.step(),
            Step::Halt(Halt::Err(ExecutionFault::NoTransition("s0".to_string())))
        );
        assert!(m.is_halted());
    }

    #[test]
    fn test_fault_freezes_machine() {
        let spec = r#"
[tape]
alphabet = [0]
T.0 = [0]

[program]
START S0
END S1
S0 {
  GOTO S1 { T.0: ["0", MOV_L] }
}
S1 { }
"#;
        let mut m = machine(spec);
        let halt = m.run();

        assert!(m.is_halted());
        let before = m.snapshot();
        assert_eq!(m.step(), Step::Halt(halt));
        assert_eq!(m.snapshot(), before);
    }

    #[test]
    fn test_action_tape_out_of_range_faults() {
        let spec = r#"
[tape]
alphabet = [0]
T.0 = [0]

[program]
START S0
END S1
S0 { GOTO S1 { T.5: ["0", STAY] } }
S1 { }
"#;
        let mut m = unvalidated(spec);

        assert_eq!(
            m.step(),
            Step::Halt(Halt::Err(ExecutionFault::TapeOutOfRange { tape: 5, count: 1 }))
        );
        assert!(m.is_halted());
        assert_eq!(m.tapes()[0], vec!["0"]);
    }

    #[test]
    fn test_copy_source_out_of_range_faults() {
        let spec = r#"
[tape]
alphabet = [0]
T.0 = [0]

[program]
START S0
END S1
S0 { GOTO S1 { T.0: [T.7, STAY] } }
S1 { }
"#;
        let mut m = unvalidated(spec);

        assert_eq!(
            m.step(),
            Step::Halt(Halt::Err(ExecutionFault::TapeOutOfRange { tape: 7, count: 1 }))
        );
    }

    #[test]
    fn test_increment_transducer() {
        let spec = r#"
[tape]
alphabet = [0, 1]
T.0 = [0, 0, 0]

[program]
START S0
END S1
S0 {
  IF (T.0 == "1") THEN {
    GOTO S0 { T.0: ["0", MOV_R] }
  }
  ELSE {
    GOTO S1 { T.0: ["1", MOV_R] }
  }
}
S1 { GOTO S1 { T.0: [T.0, MOV_R] } }
"#;
        let mut m = machine(spec);

        assert_eq!(m.step(), Step::Continue);
        assert_eq!(m.state(), "s1");
        assert_eq!(m.tapes()[0], vec!["1", "0", "0"]);
        assert_eq!(m.heads()[0], 1);

        // S1 is halting, so its self-loop never advances the head.
        assert_eq!(m.run(), Halt::Ok);
        assert_eq!(m.tapes()[0], vec!["1", "0", "0"]);
        assert_eq!(m.heads()[0], 1);
    }

    #[test]
    fn test_deterministic_replay() {
        let mut first = machine(FILL_ONES);
        let mut second = machine(FILL_ONES);

        assert_eq!(first.run(), second.run());
        assert_eq!(first.snapshot(), second.snapshot());
        assert_eq!(first.step_count(), second.step_count());
    }
}
