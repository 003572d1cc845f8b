//! Source marker.
//!
//! Projects the reachable declarations onto source ranges and then onto
//! per-file kept lines. Marking walks the top-level declarations; container
//! declarations keep only their skeleton (head line and closing brace) and
//! recurse into the members that are themselves reachable.
//!
//! ## Retention rules
//!
//! | Declaration | Kept |
//! |---|---|
//! | access specifier, using-directive, typedef, alias template, field, enumerator, function, variable | full range |
//! | namespace | head and closing brace, if any child was kept |
//! | record | head and closing brace; reachable members |
//! | enum | head and closing brace; every enumerator |
//! | class/function template | template head; the pattern and every specialization |
//! | explicit/partial specialization | record rule plus the `template<>` head |
//!
//! Implicit declarations are never kept.
//!
//! Every kept range also keeps the `#include` line that pulled its file in,
//! in every ancestor file, so the carved tree still includes what it needs.

use std::collections::BTreeSet;
use tracing::{debug, trace};

use crate::collector::Reachable;
use crate::frontend::SourceLocator;
use crate::types::{
    Ast, Decl, DeclId, DeclKind, FileId, FileKind, KeptLines, RecordDecl, SourceLoc, SourceRange,
    SpecializationKind, TemplateDecl,
};

/// A range that cannot be projected onto lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MalformedRange {
    /// One of the ends is invalid.
    #[error("range has an invalid end")]
    Invalid,
    /// The ends are in different files.
    #[error("range spans two files")]
    CrossFile,
    /// The locator does not know the range's file.
    #[error("range names unknown {0}")]
    UnknownFile(FileId),
}

/// Output of the marker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Marking {
    /// Kept lines per file.
    pub kept_lines: KeptLines,
    /// Every range handed to the marker, including skipped ones.
    pub kept_ranges: BTreeSet<SourceRange>,
    /// Number of ranges that could not be marked.
    pub skipped_ranges: usize,
}

/// Mark the lines of `range` and the include chain of its file.
pub fn mark_range<L: SourceLocator + ?Sized>(
    locator: &L,
    range: SourceRange,
    kept: &mut KeptLines,
) -> Result<(), MalformedRange> {
    if !range.is_valid() {
        return Err(MalformedRange::Invalid);
    }
    if range.begin.file != range.end.file {
        return Err(MalformedRange::CrossFile);
    }
    let entry = locator
        .file(range.begin.file)
        .ok_or(MalformedRange::UnknownFile(range.begin.file))?;

    for line in range.begin.line..=range.end.line {
        kept.keep(&entry.name, line as usize - 1);
    }

    let mut seen = BTreeSet::from([range.begin.file]);
    let mut include = locator.include_loc(range.begin.file);
    while let Some(loc) = include {
        if !loc.is_valid() || !seen.insert(loc.file) {
            break;
        }
        let Some(includer) = locator.file(loc.file) else {
            break;
        };
        if includer.kind == FileKind::BuiltIn {
            break;
        }
        kept.keep(&includer.name, loc.line as usize - 1);
        include = includer.include_loc;
    }
    Ok(())
}

/// Top-level declarations that marking starts from.
///
/// A forward-declared tag qualifies when its definition is reachable.
pub fn marking_candidates(ast: &Ast, reachable: &Reachable) -> Vec<DeclId> {
    ast.top_level()
        .iter()
        .copied()
        .filter(|&id| {
            reachable.contains_decl(id)
                || ast
                    .tag_definition(id)
                    .is_some_and(|definition| reachable.contains_decl(definition))
        })
        .collect()
}

/// Last location of a container's head.
///
/// The head ends where the first non-implicit member begins. When that is
/// on a later line than the container itself, the head ends on the line
/// before it.
pub fn end_of_head(ast: &Ast, id: DeclId) -> SourceLoc {
    let decl = ast.decl(id);
    let mut head_end = decl.range.end;
    for &member in ast.members(id) {
        let member = ast.decl(member);
        if !member.implicit && member.range.begin.line < head_end.line {
            head_end = member.range.begin;
        }
    }
    if head_end.line > decl.range.begin.line {
        head_end = head_end.previous_line();
    }
    head_end
}

/// Mark every reachable declaration.
pub fn mark<L: SourceLocator + ?Sized>(ast: &Ast, locator: &L, reachable: &Reachable) -> Marking {
    let mut marker = SourceMarker {
        ast,
        locator,
        reachable,
        marking: Marking::default(),
    };
    for id in marking_candidates(ast, reachable) {
        marker.recurse(id, 0);
    }
    marker.marking
}

struct SourceMarker<'a, L: ?Sized> {
    ast: &'a Ast,
    locator: &'a L,
    reachable: &'a Reachable,
    marking: Marking,
}

impl<L: SourceLocator + ?Sized> SourceMarker<'_, L> {
    fn keep(&mut self, range: SourceRange, depth: usize) {
        trace!(
            "{:indent$}keep {}",
            "",
            self.locator.describe(range),
            indent = depth * 2
        );
        self.marking.kept_ranges.insert(range);
        if let Err(reason) = mark_range(self.locator, range, &mut self.marking.kept_lines) {
            debug!(range = ?range, %reason, "Skipping range");
            self.marking.skipped_ranges += 1;
        }
    }

    fn recurse_filtered(&mut self, id: DeclId, depth: usize) -> bool {
        self.reachable.contains_decl(id) && self.recurse(id, depth)
    }

    /// Mark one declaration; returns whether anything was kept.
    fn recurse(&mut self, id: DeclId, depth: usize) -> bool {
        let ast = self.ast;
        let decl = ast.decl(id);
        if decl.implicit {
            return false;
        }
        trace!(
            "{:indent$}mark {} '{}'",
            "",
            id,
            decl.display_name(),
            indent = depth * 2
        );

        match &decl.kind {
            DeclKind::AccessSpec
            | DeclKind::UsingDirective
            | DeclKind::Typedef { .. }
            | DeclKind::AliasTemplate(_)
            | DeclKind::Field(_)
            | DeclKind::EnumConstant { .. }
            | DeclKind::Function(_)
            | DeclKind::Var(_)
            | DeclKind::Param(_) => {
                self.keep(decl.range, depth);
                true
            }
            DeclKind::Namespace(ns) => {
                let mut kept = false;
                for &child in &ns.children {
                    kept |= self.recurse_filtered(child, depth + 1);
                }
                if kept {
                    let head_end = end_of_head(ast, id);
                    self.keep(SourceRange::new(decl.range.begin, head_end), depth);
                    self.keep(SourceRange::new(ns.rbrace, decl.range.end), depth);
                }
                kept
            }
            DeclKind::Record(record) => {
                self.record_rule(id, decl, record, depth);
                true
            }
            DeclKind::ClassTemplateSpecialization(spec) => {
                self.record_rule(id, decl, &spec.record, depth);
                if spec.kind != SpecializationKind::Implicit {
                    self.keep(SourceRange::new(decl.range.begin, spec.record.outer_start), depth);
                }
                true
            }
            DeclKind::Enum(e) => {
                self.keep(SourceRange::new(e.outer_start, end_of_head(ast, id)), depth);
                if let Some(brace_end) = e.brace_end {
                    self.keep(SourceRange::new(brace_end, decl.range.end), depth);
                }
                for &constant in &e.constants {
                    self.recurse(constant, depth + 1);
                }
                true
            }
            DeclKind::ClassTemplate(template) | DeclKind::FunctionTemplate(template) => {
                self.template_rule(decl, template, depth)
            }
            DeclKind::TemplateParam { .. } | DeclKind::Empty | DeclKind::Other(_) => false,
        }
    }

    fn record_rule(&mut self, id: DeclId, decl: &Decl, record: &RecordDecl, depth: usize) {
        let head_end = end_of_head(self.ast, id);
        self.keep(SourceRange::new(record.outer_start, head_end), depth);
        if let Some(brace_end) = record.brace_end {
            self.keep(SourceRange::new(brace_end, decl.range.end), depth);
        }
        for &member in &record.members {
            self.recurse_filtered(member, depth + 1);
        }
    }

    fn template_rule(&mut self, decl: &Decl, template: &TemplateDecl, depth: usize) -> bool {
        let mut kept = self.recurse(template.templated, depth + 1);
        for &spec in &template.specializations {
            kept |= self.recurse(spec, depth + 1);
        }
        if kept {
            let mut head_end = self.ast.decl(template.templated).range.begin;
            if head_end.line > decl.range.begin.line {
                head_end = head_end.previous_line();
            }
            self.keep(SourceRange::new(decl.range.begin, head_end), depth);
        }
        kept
    }
}
