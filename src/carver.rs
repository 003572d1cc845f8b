//! Carving pipeline.
//!
//! A carve runs the phases in a fixed order, each one a pure function of
//! the previous phase's output:
//!
//! 1. Refuse translation units with error diagnostics
//! 2. Replay the preprocessor into a [`MacroTracker`]
//! 3. Check that top-level declarations sit on separate lines
//! 4. Resolve the root functions
//! 5. Collect everything reachable from the roots
//! 6. Mark the reachable declarations' lines
//! 7. Keep the macro definitions the kept ranges depend on
//!
//! No output is produced when any phase before marking fails.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::collector::collect;
use crate::config::{CarveConfig, DefaultRoots, UnresolvedRootPolicy};
use crate::frontend::{FrontEndError, TranslationUnit};
use crate::macros::{close_over_macros, MacroTracker};
use crate::marker::mark;
use crate::types::{DeclId, DeclKind, KeptLines};
use crate::validator::{validate, OrderingViolation};

/// Error type for a carve.
#[derive(Debug, thiserror::Error)]
pub enum CarveError {
    /// The front end could not produce a usable translation unit.
    #[error("Front end failed: {0}")]
    FrontEnd(String),

    /// Two top-level declarations share a line.
    #[error(transparent)]
    OrderingViolation(#[from] OrderingViolation),

    /// A configured root does not exist.
    #[error("root '{0}' not found")]
    UnresolvedRoot(String),
}

impl From<FrontEndError> for CarveError {
    fn from(err: FrontEndError) -> Self {
        Self::FrontEnd(err.to_string())
    }
}

/// Counters describing one carve.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarveStats {
    /// Reachable declarations.
    pub reachable_decls: usize,
    /// Reachable statements.
    pub reachable_stmts: usize,
    /// Reachable types.
    pub reachable_types: usize,
    /// Ranges handed to the marker.
    pub kept_ranges: usize,
    /// Ranges the marker could not project onto lines.
    pub skipped_ranges: usize,
    /// Macro definitions kept.
    pub macro_definitions: usize,
    /// Lines kept across all files.
    pub kept_lines: usize,
}

/// Result of a carve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarveOutput {
    /// Kept lines per file.
    pub kept_lines: KeptLines,
    /// Fingerprint of `kept_lines`.
    pub fingerprint: String,
    /// Hash of the configuration used.
    pub config_hash: String,
    /// Resolved root declarations.
    pub roots: Vec<DeclId>,
    /// Run counters.
    pub stats: CarveStats,
}

/// Resolve the configured roots to declarations.
///
/// Named roots are looked up among top-level functions, every overload
/// included. Without names the configured preset applies.
pub fn resolve_roots<T: TranslationUnit + ?Sized>(
    unit: &T,
    config: &CarveConfig,
) -> Result<Vec<DeclId>, CarveError> {
    let ast = unit.ast();

    if config.roots.is_empty() {
        let roots: Vec<DeclId> = match config.default_roots {
            DefaultRoots::MainOnly => ast.lookup_functions("main"),
            DefaultRoots::MainFileFunctions => {
                let main_file = unit.main_file();
                ast.top_level()
                    .iter()
                    .copied()
                    .filter(|&id| {
                        let decl = ast.decl(id);
                        !decl.implicit
                            && decl.range.begin.file == main_file
                            && matches!(&decl.kind, DeclKind::Function(f) if f.body.is_some())
                    })
                    .collect()
            }
        };
        if roots.is_empty() {
            warn!(preset = ?config.default_roots, "No default roots found");
        }
        return Ok(roots);
    }

    let mut roots = Vec::new();
    for name in &config.roots {
        let found = ast.lookup_functions(name);
        if found.is_empty() {
            match config.unresolved_root {
                UnresolvedRootPolicy::Abort => return Err(CarveError::UnresolvedRoot(name.clone())),
                UnresolvedRootPolicy::Skip => {
                    warn!(root = %name, "Root not found, skipping");
                    continue;
                }
            }
        }
        roots.extend(found);
    }
    Ok(roots)
}

/// Carves a translation unit down to what its roots need.
pub struct Carver<T: TranslationUnit> {
    unit: Arc<T>,
    config: CarveConfig,
}

impl<T: TranslationUnit> Carver<T> {
    /// Create a carver over a translation unit.
    pub fn new(unit: Arc<T>, config: CarveConfig) -> Self {
        Self { unit, config }
    }

    /// Configuration in use.
    pub fn config(&self) -> &CarveConfig {
        &self.config
    }

    /// Translation unit being carved.
    pub fn unit(&self) -> &T {
        &self.unit
    }

    /// Run every phase and return the kept lines.
    pub fn carve(&self) -> Result<CarveOutput, CarveError> {
        let unit = self.unit.as_ref();

        let errors = unit.errors();
        if !errors.is_empty() {
            return Err(CarveError::FrontEnd(errors.join("; ")));
        }

        let mut tracker = MacroTracker::new();
        unit.replay_preprocessor(&mut tracker);
        let index = tracker.finish();

        let ast = unit.ast();
        validate(ast, unit)?;

        let roots = resolve_roots(unit, &self.config)?;
        info!(
            config = %self.config.config_id(),
            roots = roots.len(),
            top_level = ast.top_level().len(),
            "Carving translation unit"
        );

        let reachable = collect(ast, &roots);
        info!(
            decls = reachable.decls.len(),
            stmts = reachable.stmts.len(),
            types = reachable.types.len(),
            "Collected reachable nodes"
        );

        let marking = mark(ast, unit, &reachable);
        info!(
            ranges = marking.kept_ranges.len(),
            skipped = marking.skipped_ranges,
            "Marked kept ranges"
        );

        let closure = close_over_macros(unit, &index, marking.kept_lines, &marking.kept_ranges);
        let kept_lines = closure.kept_lines;

        let stats = CarveStats {
            reachable_decls: reachable.decls.len(),
            reachable_stmts: reachable.stmts.len(),
            reachable_types: reachable.types.len(),
            kept_ranges: marking.kept_ranges.len(),
            skipped_ranges: marking.skipped_ranges,
            macro_definitions: closure.marked.len(),
            kept_lines: kept_lines.kept_count(),
        };
        info!(
            macros = stats.macro_definitions,
            lines = stats.kept_lines,
            files = kept_lines.files().count(),
            "Carve complete"
        );

        Ok(CarveOutput {
            fingerprint: kept_lines.fingerprint(),
            config_hash: self.config.params_hash(),
            kept_lines,
            roots,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{InMemoryTranslationUnit, Severity};
    use crate::types::{
        Decl, FileEntry, FileId, FunctionDecl, SourceRange, Stmt, StmtKind, TemplateDecl, Type,
        TypeId,
    };

    fn function(tu: &mut InMemoryTranslationUnit, file: FileId, int: TypeId, name: &str, line: u32) -> DeclId {
        let body = tu.add_stmt(Stmt::new(
            StmtKind::Other("CompoundStmt".into()),
            SourceRange::span(file, (line, 10), (line, 12)),
        ));
        tu.add_top_level(Decl::new(
            name,
            DeclKind::Function(FunctionDecl::new(int).with_body(body)),
            SourceRange::span(file, (line, 1), (line, 12)),
        ))
    }

    fn make_tu() -> (InMemoryTranslationUnit, FileId, TypeId) {
        let mut tu = InMemoryTranslationUnit::new();
        let main = tu.add_file(FileEntry::source("main.c", None));
        let int = tu.add_type(Type::Builtin("int".into()));
        (tu, main, int)
    }

    #[test]
    fn test_named_roots_include_all_overloads() {
        let (mut tu, main, int) = make_tu();
        let f1 = function(&mut tu, main, int, "f", 1);
        let f2 = function(&mut tu, main, int, "f", 2);
        function(&mut tu, main, int, "g", 3);

        let roots = resolve_roots(&tu, &CarveConfig::with_roots(["f"])).unwrap();
        assert_eq!(roots, vec![f1, f2]);
    }

    #[test]
    fn test_function_template_root_resolves_to_pattern() {
        let (mut tu, main, int) = make_tu();
        let pattern = tu.add_decl(Decl::new(
            "t",
            DeclKind::Function(FunctionDecl::new(int)),
            SourceRange::span(main, (2, 1), (2, 12)),
        ));
        tu.add_top_level(Decl::new(
            "t",
            DeclKind::FunctionTemplate(TemplateDecl {
                params: vec![],
                templated: pattern,
                specializations: vec![],
            }),
            SourceRange::span(main, (1, 1), (2, 12)),
        ));
        let roots = resolve_roots(&tu, &CarveConfig::with_roots(["t"])).unwrap();
        assert_eq!(roots, vec![pattern]);
    }

    #[test]
    fn test_unresolved_root_policy() {
        let (mut tu, main, int) = make_tu();
        let f = function(&mut tu, main, int, "f", 1);

        let err = resolve_roots(&tu, &CarveConfig::with_roots(["f", "missing"])).unwrap_err();
        assert!(matches!(err, CarveError::UnresolvedRoot(ref name) if name == "missing"));
        assert_eq!(err.to_string(), "root 'missing' not found");

        let config =
            CarveConfig::with_roots(["f", "missing"]).unresolved_root(UnresolvedRootPolicy::Skip);
        assert_eq!(resolve_roots(&tu, &config).unwrap(), vec![f]);
    }

    #[test]
    fn test_default_root_presets() {
        let (mut tu, main, int) = make_tu();
        let header = tu.add_file(FileEntry::source(
            "a.h",
            Some(crate::types::SourceLoc::new(main, 1, 1)),
        ));
        function(&mut tu, header, int, "helper", 1);
        let f = function(&mut tu, main, int, "f", 2);
        let main_fn = function(&mut tu, main, int, "main", 3);

        let only_main = resolve_roots(&tu, &CarveConfig::default()).unwrap();
        assert_eq!(only_main, vec![main_fn]);

        let config = CarveConfig::default().default_roots(DefaultRoots::MainFileFunctions);
        assert_eq!(resolve_roots(&tu, &config).unwrap(), vec![f, main_fn]);
    }

    #[test]
    fn test_front_end_errors_refuse_carve() {
        let (mut tu, main, int) = make_tu();
        function(&mut tu, main, int, "main", 1);
        tu.add_diagnostic(Severity::Error, "unknown type name 'foo'");

        let carver = Carver::new(Arc::new(tu), CarveConfig::default());
        let err = carver.carve().unwrap_err();
        assert!(matches!(err, CarveError::FrontEnd(ref msg) if msg.contains("unknown type")));
    }

    #[test]
    fn test_ordering_violation_produces_no_output() {
        let (mut tu, main, int) = make_tu();
        function(&mut tu, main, int, "main", 1);
        function(&mut tu, main, int, "g", 1);

        let carver = Carver::new(Arc::new(tu), CarveConfig::default());
        match carver.carve() {
            Err(CarveError::OrderingViolation(violation)) => {
                assert_eq!(violation.prev, "main");
                assert_eq!(violation.curr, "g");
            }
            other => panic!("expected ordering violation, got {:?}", other),
        }
    }

    #[test]
    fn test_carve_reports_stats() {
        let (mut tu, main, int) = make_tu();
        function(&mut tu, main, int, "g", 1);
        function(&mut tu, main, int, "main", 2);

        let output = Carver::new(Arc::new(tu), CarveConfig::default()).carve().unwrap();
        assert_eq!(output.roots.len(), 1);
        assert_eq!(output.stats.reachable_decls, 1);
        assert_eq!(output.stats.kept_lines, 1);
        assert!(output.kept_lines.is_kept("main.c", 1));
        assert!(!output.kept_lines.is_kept("main.c", 0));
        assert_eq!(output.fingerprint, output.kept_lines.fingerprint());
    }
}
