//! Core types for the carver: arena ids, source locations, the syntax tree,
//! preprocessor records and kept-line maps.

pub mod ids;
pub mod source;
pub mod ast;
pub mod macros;
pub mod kept;

pub use ids::{DeclId, StmtId, TypeId, FileId};
pub use source::{SourceLoc, SourceRange, FileEntry, FileKind};
pub use ast::{
    Ast, Decl, DeclKind, NamespaceDecl, VarDecl, FieldDecl, FunctionDecl, FunctionKind,
    CtorInitializer, TemplateDecl, RecordDecl, TagKind, SpecializationDecl,
    SpecializationKind, EnumDecl, Stmt, StmtKind, TraitOperand, Type, TypeLoc,
    TemplateArgument, Qualifier, QualifierKind, NodeRef,
};
pub use macros::{
    MacroExpansion, TokenSpan, MacroDefinedEvent, MacroExpandsEvent, PreprocessorEvent,
};
pub use kept::{FileLines, KeptLines};
