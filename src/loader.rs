//! Loading of machine specifications from text and from disk.
//!
//! A load runs the full pipeline: tokenize, parse, analyze. Directory
//! loading picks up every `.tm` file, sorted by file name so the result is
//! stable across platforms.

use std::fs;
use std::path::Path;

use crate::types::{Program, SpecError, MAX_SPEC_SIZE, SPEC_FILE_EXTENSION};
use crate::{analyzer, parser, tokenizer};

pub struct ProgramLoader;

impl ProgramLoader {
    /// Compiles a specification from its text.
    pub fn load_program_from_string(text: &str) -> Result<Program, SpecError> {
        if text.len() > MAX_SPEC_SIZE {
            return Err(SpecError::File(format!(
                "specification is {} bytes, the limit is {MAX_SPEC_SIZE}",
                text.len()
            )));
        }

        let tokenized = tokenizer::tokenize(text)?;
        let program = parser::parse(tokenized)?;
        analyzer::analyze(&program)?;

        Ok(program)
    }

    /// Reads and compiles a specification file.
    pub fn load_program(path: &Path) -> Result<Program, SpecError> {
        let text = fs::read_to_string(path).map_err(|err| {
            SpecError::File(format!("could not read '{}': {err}", path.display()))
        })?;
        Self::load_program_from_string(&text)
    }

    /// Loads every `.tm` file in `dir`, paired with its file stem, sorted
    /// by file name. Files with other extensions are ignored.
    pub fn load_programs(dir: &Path) -> Result<Vec<(String, Program)>, SpecError> {
        let entries = fs::read_dir(dir).map_err(|err| {
            SpecError::File(format!("could not read directory '{}': {err}", dir.display()))
        })?;

        let mut paths: Vec<_> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension().and_then(|ext| ext.to_str()) == Some(SPEC_FILE_EXTENSION)
            })
            .collect();
        paths.sort();

        let mut programs = Vec::with_capacity(paths.len());
        for path in paths {
            let name = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or_default()
                .to_string();
            programs.push((name, Self::load_program(&path)?));
        }

        Ok(programs)
    }
}
