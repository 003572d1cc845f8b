//! Top-level declaration ordering check.
//!
//! Line-level retention only works when no two top-level declarations
//! share a line: otherwise keeping one would drag the other along. Before
//! any analysis runs, every adjacent pair of top-level declarations is
//! checked and the carve is refused if some pair overlaps.
//!
//! ## Exemptions
//!
//! A pair sharing a line is still accepted when the overlap is harmless:
//!
//! - both come from the same macro expansion and collapse to one position
//! - a record directly wrapped by a typedef (`typedef struct {..} T;`)
//! - the second declaration is a stray `;`
//! - the second declaration is a compiler builtin
//! - a record or enum wrapped by a variable or function (`struct S {..} s;`)
//! - single-line variables from one declarator (`int a, b;`)

use tracing::error;

use crate::frontend::SourceLocator;
use crate::types::{Ast, DeclId, DeclKind};

/// Two top-level declarations that are not on separate lines.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("declaration '{curr}' must start on a line after the end of declaration '{prev}' ({file}:{line})")]
pub struct OrderingViolation {
    /// Name of the earlier declaration.
    pub prev: String,
    /// Name of the later declaration.
    pub curr: String,
    /// File of the later declaration.
    pub file: String,
    /// Line where the later declaration begins.
    pub line: u32,
}

/// Whether `prev` ends strictly before the line where `curr` begins, or the
/// overlap is one of the tolerated shapes.
pub fn is_before(ast: &Ast, prev: DeclId, curr: DeclId) -> bool {
    let prev_decl = ast.decl(prev);
    let curr_decl = ast.decl(curr);
    let prev_begin = prev_decl.range.begin;
    let prev_end = prev_decl.range.end;
    let curr_begin = curr_decl.range.begin;
    let curr_end = curr_decl.range.end;

    // Only declarations from one real file can clash.
    if !prev_end.is_valid() || !curr_begin.is_valid() || prev_end.file != curr_begin.file {
        return true;
    }

    if prev_end.line < curr_begin.line {
        return true;
    }

    if prev_begin.from_macro
        && curr_begin.from_macro
        && prev_begin.position() == prev_end.position()
        && prev_end.position() == curr_begin.position()
        && curr_begin.position() == curr_end.position()
    {
        return true;
    }

    let prev_is_record = ast.as_record(prev).is_some();
    let prev_is_tag = ast.is_tag(prev);
    let wraps_prev = curr_decl.range.fully_contains(&prev_decl.range);

    match &curr_decl.kind {
        DeclKind::Typedef { .. } if prev_is_record && wraps_prev => true,
        DeclKind::Empty => true,
        DeclKind::Function(f) if f.builtin => true,
        DeclKind::Var(_) | DeclKind::Function(_) if prev_is_tag && wraps_prev => true,
        DeclKind::Var(_) => {
            matches!(prev_decl.kind, DeclKind::Var(_))
                && prev_begin.line == prev_end.line
                && prev_end.line == curr_begin.line
                && curr_begin.line == curr_end.line
        }
        _ => false,
    }
}

/// Every ordering violation among adjacent top-level declarations, in order.
pub fn find_violations<L: SourceLocator + ?Sized>(ast: &Ast, locator: &L) -> Vec<OrderingViolation> {
    ast.top_level()
        .windows(2)
        .filter(|pair| !is_before(ast, pair[0], pair[1]))
        .map(|pair| {
            let prev = ast.decl(pair[0]);
            let curr = ast.decl(pair[1]);
            OrderingViolation {
                prev: prev.display_name().to_string(),
                curr: curr.display_name().to_string(),
                file: locator
                    .filename(curr.range.begin)
                    .unwrap_or("<unknown>")
                    .to_string(),
                line: curr.range.begin.line,
            }
        })
        .collect()
}

/// Check the ordering precondition.
///
/// Every violation is logged; the first one is returned.
pub fn validate<L: SourceLocator + ?Sized>(ast: &Ast, locator: &L) -> Result<(), OrderingViolation> {
    let violations = find_violations(ast, locator);
    for violation in &violations {
        error!(
            file = %violation.file,
            line = violation.line,
            prev = %violation.prev,
            curr = %violation.curr,
            "{}",
            violation
        );
    }
    match violations.into_iter().next() {
        Some(first) => Err(first),
        None => Ok(()),
    }
}
