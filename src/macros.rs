//! Macro dependency tracking.
//!
//! Declarations only record where macros were expanded, not which macros
//! those expansions relied on. Two pieces close that gap:
//!
//! - [`MacroTracker`] listens to the preprocessor while the translation unit
//!   is lexed. It records the corrected extent of every definition and an
//!   edge from each macro to every macro expanded inside its expansion.
//! - [`close_over_macros`] runs after marking. Every expansion inside a kept
//!   range keeps its definition, and every macro that definition depends on,
//!   at any depth.
//!
//! Definitions are identified by their naive range (name start to the start
//! of the last replacement token), which is what expansion records carry.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::frontend::{MacroRecord, PreprocessorListener, SourceLocator};
use crate::marker::mark_range;
use crate::types::{KeptLines, MacroDefinedEvent, MacroExpandsEvent, SourceRange};

/// Edges from a macro definition to the definitions expanded inside it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroDependencyGraph {
    edges: BTreeMap<SourceRange, BTreeSet<SourceRange>>,
}

impl MacroDependencyGraph {
    /// Record that expanding `outer` expands `nested`.
    pub fn add_edge(&mut self, outer: SourceRange, nested: SourceRange) {
        self.edges.entry(outer).or_default().insert(nested);
    }

    /// Direct dependencies of a definition.
    pub fn dependencies(&self, definition: &SourceRange) -> impl Iterator<Item = &SourceRange> {
        self.edges.get(definition).into_iter().flatten()
    }

    /// Number of definitions with at least one dependency.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether no dependency was recorded.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Everything the tracker learned during preprocessing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroIndex {
    /// Macro-to-macro dependencies.
    pub dependencies: MacroDependencyGraph,
    /// Naive definition range to corrected definition range.
    pub corrected: BTreeMap<SourceRange, SourceRange>,
}

impl MacroIndex {
    /// Corrected range of a definition; the naive range when never seen.
    pub fn corrected_range(&self, definition: SourceRange) -> SourceRange {
        self.corrected.get(&definition).copied().unwrap_or(definition)
    }
}

/// Preprocessor listener building a [`MacroIndex`].
#[derive(Debug, Clone)]
pub struct MacroTracker {
    index: MacroIndex,
    outer: Option<SourceRange>,
}

impl Default for MacroTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MacroTracker {
    /// Create a tracker; command-line macros map to the invalid range.
    pub fn new() -> Self {
        let mut index = MacroIndex::default();
        index
            .corrected
            .insert(SourceRange::invalid(), SourceRange::invalid());
        Self { index, outer: None }
    }

    /// Stop listening and hand over the index.
    pub fn finish(self) -> MacroIndex {
        self.index
    }
}

impl PreprocessorListener for MacroTracker {
    fn macro_defined(&mut self, event: &MacroDefinedEvent) {
        let definition = event.definition;
        let end = match event.last_token {
            Some(token) => token.loc.advanced_by(token.len.saturating_sub(1)),
            None => definition
                .begin
                .advanced_by((event.name.len() as u32).saturating_sub(1)),
        };
        self.index
            .corrected
            .insert(definition, SourceRange::new(definition.begin, end));
    }

    fn macro_expands(&mut self, event: &MacroExpandsEvent) {
        if !event.nested {
            self.outer = Some(event.definition);
            return;
        }
        match self.outer {
            Some(outer) => self.index.dependencies.add_edge(outer, event.definition),
            None => warn!(
                name = %event.name,
                "Nested macro expansion without an enclosing expansion"
            ),
        }
    }
}

/// Result of the macro post-pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroClosure {
    /// Kept lines including macro definitions.
    pub kept_lines: KeptLines,
    /// Definitions whose lines were kept.
    pub marked: BTreeSet<SourceRange>,
}

/// Keep every macro definition the kept ranges depend on.
///
/// Each definition is visited once. A definition in a real file keeps its
/// corrected range and include chain; its dependencies are followed either
/// way, so a command-line macro still pulls in the file macros it uses.
pub fn close_over_macros<T>(
    unit: &T,
    index: &MacroIndex,
    kept_lines: KeptLines,
    kept_ranges: &BTreeSet<SourceRange>,
) -> MacroClosure
where
    T: SourceLocator + MacroRecord + ?Sized,
{
    let mut closure = MacroClosure {
        kept_lines,
        marked: BTreeSet::new(),
    };
    let mut visited: BTreeSet<SourceRange> = BTreeSet::new();
    let mut pending: Vec<SourceRange> = Vec::new();

    for range in kept_ranges {
        for expansion in unit.expansions_in(*range) {
            pending.push(expansion.definition);
            while let Some(definition) = pending.pop() {
                if !visited.insert(definition) {
                    continue;
                }
                if is_actual_file(unit, definition) {
                    let corrected = index.corrected_range(definition);
                    match mark_range(unit, corrected, &mut closure.kept_lines) {
                        Ok(()) => {
                            debug!(definition = %unit.describe(corrected), "Keeping macro");
                            closure.marked.insert(definition);
                        }
                        Err(reason) => debug!(?definition, %reason, "Skipping macro definition"),
                    }
                }
                pending.extend(index.dependencies.dependencies(&definition).copied());
            }
        }
    }
    closure
}

// `<built-in>` and `<command line>` definitions have no lines to keep.
fn is_actual_file<L: SourceLocator + ?Sized>(locator: &L, definition: SourceRange) -> bool {
    definition.begin.is_valid()
        && locator
            .file(definition.begin.file)
            .is_some_and(|entry| entry.is_actual_file())
}
