//! # tree-carver
//!
//! Reachability-driven line carving for C/C++ translation units.
//!
//! The carver answers one question:
//!
//! > Given a set of root functions, which source lines are **needed** to
//! > keep them compiling?
//!
//! ## Core Contract
//!
//! 1. Given a parsed translation unit and root functions, deterministically
//!    compute every declaration, statement, type and macro the roots depend on
//! 2. Project that closure onto a per-file, per-line keep/elide decision
//! 3. Produce a **fingerprint** of the kept lines for comparing runs
//!
//! ## Architecture
//!
//! ```text
//! TranslationUnit → Validator → Collector → Marker → Macro closure → KeptLines
//!        ↓                                                              ↓
//!  MacroTracker (preprocessor replay) ─────────────────────────→ render
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same translation unit + same config → identical kept lines and fingerprint
//! - Node sets and kept-line maps are ordered (`BTreeSet`/`BTreeMap`)
//! - Collection does not depend on root order or traversal order

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod frontend;
pub mod validator;
pub mod collector;
pub mod marker;
pub mod macros;
pub mod config;
pub mod carver;
pub mod canonical;
pub mod render;

// Re-exports
pub use types::{
    Ast, Decl, DeclKind, DeclId, StmtId, TypeId, FileId, SourceLoc, SourceRange, FileEntry,
    FileKind, FileLines, KeptLines, NodeRef,
};
pub use frontend::{
    InMemoryTranslationUnit, FrontEndError, MacroRecord, PreprocessorListener, SourceLocator,
    TranslationUnit,
};
pub use validator::{validate, is_before, OrderingViolation};
pub use collector::{collect, Collector, Reachable};
pub use marker::{mark, mark_range, end_of_head, Marking, MalformedRange};
pub use macros::{close_over_macros, MacroTracker, MacroIndex, MacroDependencyGraph, MacroClosure};
pub use config::{CarveConfig, DefaultRoots, UnresolvedRootPolicy};
pub use carver::{Carver, CarveError, CarveOutput, CarveStats, resolve_roots};
pub use canonical::{to_canonical_bytes, canonical_hash, canonical_hash_hex};
pub use render::{render_source, write_tree, RenderMode, RenderError, ELIDED_LINE_PREFIX};

/// Schema version of the translation-unit dump and carve output.
/// Increment on breaking changes to any serialized type.
pub const TREE_CARVER_SCHEMA_VERSION: &str = "1.0.0";

/// Default configuration version identifier.
pub const DEFAULT_CONFIG_VERSION: &str = "carve_config_v1";
