//! Built-in demo programs, compiled into the binary and registered in a
//! process-wide registry on first use.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use lazy_static::lazy_static;
use serde::Serialize;

use crate::loader::ProgramLoader;
use crate::types::{Program, SpecError};

const PROGRAM_TEXTS: [(&str, &str); 3] = [
    ("binary-flip", include_str!("../programs/binary-flip.tm")),
    ("copy-tape", include_str!("../programs/copy-tape.tm")),
    ("match-symbols", include_str!("../programs/match-symbols.tm")),
];

lazy_static! {
    static ref PROGRAMS: RwLock<Vec<(String, Program)>> = RwLock::new(Vec::new());
}

fn read_registry() -> RwLockReadGuard<'static, Vec<(String, Program)>> {
    PROGRAMS.read().unwrap_or_else(|poison| poison.into_inner())
}

fn write_registry() -> RwLockWriteGuard<'static, Vec<(String, Program)>> {
    PROGRAMS.write().unwrap_or_else(|poison| poison.into_inner())
}

/// Summary of one registered program, for listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramInfo {
    pub index: usize,
    pub name: String,
    pub state_count: usize,
    pub tape_count: usize,
    pub alphabet_size: usize,
}

impl ProgramInfo {
    fn new(index: usize, name: &str, program: &Program) -> Self {
        Self {
            index,
            name: name.to_string(),
            state_count: program.states.len(),
            tape_count: program.tape_count(),
            alphabet_size: program.alphabet.len(),
        }
    }
}

pub struct ProgramManager;

impl ProgramManager {
    /// Compiles and registers the built-in programs. Idempotent; returns
    /// the number of registered programs.
    pub fn load_builtin_programs() -> Result<usize, SpecError> {
        let mut programs = write_registry();
        if !programs.is_empty() {
            return Ok(programs.len());
        }
        for (name, text) in PROGRAM_TEXTS {
            let program = ProgramLoader::load_program_from_string(text)?;
            programs.push((name.to_string(), program));
        }
        Ok(programs.len())
    }

    pub fn count() -> usize {
        read_registry().len()
    }

    pub fn names() -> Vec<String> {
        read_registry().iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn get_by_index(index: usize) -> Option<Program> {
        read_registry()
            .get(index)
            .map(|(_, program)| program.clone())
    }

    pub fn get_by_name(name: &str) -> Option<Program> {
        read_registry()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, program)| program.clone())
    }

    pub fn infos() -> Vec<ProgramInfo> {
        read_registry()
            .iter()
            .enumerate()
            .map(|(index, (name, program))| ProgramInfo::new(index, name, program))
            .collect()
    }

    /// Case-insensitive substring search over program names.
    pub fn search(query: &str) -> Vec<ProgramInfo> {
        let query = query.to_lowercase();
        Self::infos()
            .into_iter()
            .filter(|info| info.name.to_lowercase().contains(&query))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::Machine;
    use crate::types::Halt;

    #[test]
    fn test_load_builtin_programs() {
        let count = ProgramManager::load_builtin_programs().unwrap();
        assert_eq!(count, 3);
        assert_eq!(ProgramManager::count(), 3);
        assert_eq!(
            ProgramManager::names(),
            vec!["binary-flip", "copy-tape", "match-symbols"]
        );
    }

    #[test]
    fn test_load_is_idempotent() {
        ProgramManager::load_builtin_programs().unwrap();
        let count = ProgramManager::load_builtin_programs().unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_get_by_name_and_index() {
        ProgramManager::load_builtin_programs().unwrap();

        let by_name = ProgramManager::get_by_name("copy-tape").unwrap();
        assert_eq!(by_name.tape_count(), 2);

        let by_index = ProgramManager::get_by_index(1).unwrap();
        assert_eq!(by_index, by_name);

        assert!(ProgramManager::get_by_name("missing").is_none());
        assert!(ProgramManager::get_by_index(99).is_none());
    }

    #[test]
    fn test_search() {
        ProgramManager::load_builtin_programs().unwrap();

        let hits = ProgramManager::search("TAPE");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "copy-tape");

        assert!(ProgramManager::search("nothing").is_empty());
    }

    #[test]
    fn test_builtins_run_to_completion() {
        ProgramManager::load_builtin_programs().unwrap();

        let mut flip = Machine::new(ProgramManager::get_by_name("binary-flip").unwrap());
        assert_eq!(flip.run(), Halt::Ok);
        assert_eq!(flip.tapes()[0], vec!["0", "1", "1", "0", "x"]);

        let mut copy = Machine::new(ProgramManager::get_by_name("copy-tape").unwrap());
        assert_eq!(copy.run(), Halt::Ok);
        assert_eq!(copy.tapes()[1], vec!["a", "b", "c", "_"]);

        let mut matcher = Machine::new(ProgramManager::get_by_name("match-symbols").unwrap());
        assert_eq!(matcher.run(), Halt::Ok);
        assert_eq!(matcher.state(), "same");
    }
}
