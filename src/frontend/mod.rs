//! Front-end service seams.
//!
//! The carver never parses source text. It consumes a translation unit that
//! the front end has already parsed and preprocessed, through the traits in
//! this module:
//!
//! - [`SourceLocator`]: presumed file entries and include locations.
//! - [`MacroRecord`]: macro expansions recorded during preprocessing.
//! - [`PreprocessorListener`]: callback interface fed with `#define` and
//!   expansion events in lexing order.
//! - [`TranslationUnit`]: the parsed tree plus the three services above.

pub mod memory;

use crate::types::{
    Ast, FileEntry, FileId, MacroDefinedEvent, MacroExpandsEvent, MacroExpansion, SourceLoc,
    SourceRange,
};

/// Resolves file ids to presumed file entries.
pub trait SourceLocator {
    /// File entry for `id`, `None` when unknown.
    fn file(&self, id: FileId) -> Option<&FileEntry>;

    /// Main file of the translation unit.
    fn main_file(&self) -> FileId;

    /// Presumed file name of a location.
    fn filename(&self, loc: SourceLoc) -> Option<&str> {
        if !loc.is_valid() {
            return None;
        }
        self.file(loc.file).map(|entry| entry.name.as_str())
    }

    /// Location of the `#include` that pulled `file` in.
    fn include_loc(&self, file: FileId) -> Option<SourceLoc> {
        self.file(file).and_then(|entry| entry.include_loc)
    }

    /// Human-readable `file, l:c - l:c` rendering of a range.
    fn describe(&self, range: SourceRange) -> String {
        match (self.filename(range.begin), range.end.is_valid()) {
            (Some(name), true) => format!(
                "{}, {}:{} - {}:{}",
                name, range.begin.line, range.begin.column, range.end.line, range.end.column
            ),
            _ => "<invalid range>".to_string(),
        }
    }
}

/// Query interface over recorded macro expansions.
pub trait MacroRecord {
    /// Expansions whose beginning lies within `range`.
    fn expansions_in(&self, range: SourceRange) -> Vec<&MacroExpansion>;
}

/// Receives preprocessor callbacks in lexing order.
pub trait PreprocessorListener {
    /// A macro was defined.
    fn macro_defined(&mut self, event: &MacroDefinedEvent);

    /// A macro was expanded.
    fn macro_expands(&mut self, event: &MacroExpandsEvent);
}

/// A parsed and preprocessed translation unit.
pub trait TranslationUnit: SourceLocator + MacroRecord {
    /// The syntax tree.
    fn ast(&self) -> &Ast;

    /// Error diagnostics produced while parsing.
    fn errors(&self) -> Vec<String>;

    /// Feed the preprocessor events to `listener` in lexing order.
    fn replay_preprocessor(&self, listener: &mut dyn PreprocessorListener);
}

pub use memory::{Diagnostic, FrontEndError, InMemoryTranslationUnit, Severity};
