//! In-memory translation unit.
//!
//! Holds everything a front end exports for one translation unit: file
//! entries, the syntax-tree arenas, recorded macro expansions, the
//! preprocessor event stream and diagnostics. It can be built node by node
//! (tests, benchmarks) or loaded from a JSON dump.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{MacroRecord, PreprocessorListener, SourceLocator, TranslationUnit};
use crate::types::{
    Ast, CtorInitializer, Decl, DeclId, DeclKind, FileEntry, FileId, MacroExpansion,
    PreprocessorEvent, Qualifier, QualifierKind, SourceLoc, SourceRange, Stmt, StmtId, StmtKind,
    TemplateArgument, TraitOperand, Type, TypeId, TypeLoc,
};

/// Error type for loading a translation unit.
#[derive(Debug, thiserror::Error)]
pub enum FrontEndError {
    /// The dump could not be read.
    #[error("Failed to read translation unit: {0}")]
    Io(#[from] std::io::Error),

    /// The dump is not valid JSON for a translation unit.
    #[error("Failed to parse translation unit: {0}")]
    Json(#[from] serde_json::Error),

    /// A node refers to an id outside its arena.
    #[error("Dangling {arena} id {index}")]
    Dangling {
        /// Arena name.
        arena: &'static str,
        /// Offending index.
        index: u32,
    },

    /// A location refers to an unknown file.
    #[error("Unknown file id {0}")]
    UnknownFile(FileId),
}

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Warning; does not stop carving.
    Warning,
    /// Error; carving is refused.
    Error,
}

/// A diagnostic reported while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity.
    pub severity: Severity,
    /// Message text.
    pub message: String,
}

/// Translation unit held entirely in memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryTranslationUnit {
    /// Main file id.
    #[serde(default)]
    pub main_file: FileId,
    /// File entries by id.
    pub files: Vec<FileEntry>,
    /// Syntax tree.
    pub ast: Ast,
    /// Recorded macro expansions.
    #[serde(default)]
    pub expansions: Vec<MacroExpansion>,
    /// Preprocessor events in lexing order.
    #[serde(default)]
    pub preprocessor_events: Vec<PreprocessorEvent>,
    /// Parse diagnostics.
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl InMemoryTranslationUnit {
    /// Create an empty translation unit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON dump and check its ids.
    pub fn from_json(json: &str) -> Result<Self, FrontEndError> {
        let tu: Self = serde_json::from_str(json)?;
        tu.validate_ids()?;
        Ok(tu)
    }

    /// Read and parse a JSON dump from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FrontEndError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize to a JSON dump.
    pub fn to_json(&self) -> Result<String, FrontEndError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Register a file; the first file added becomes the main file.
    pub fn add_file(&mut self, entry: FileEntry) -> FileId {
        let id = FileId::new(self.files.len());
        self.files.push(entry);
        id
    }

    /// Add a declaration to the arena.
    pub fn add_decl(&mut self, decl: Decl) -> DeclId {
        let id = DeclId::new(self.ast.decls.len());
        self.ast.decls.push(decl);
        id
    }

    /// Add a declaration and append it to the top-level order.
    pub fn add_top_level(&mut self, decl: Decl) -> DeclId {
        let id = self.add_decl(decl);
        self.ast.top_level.push(id);
        id
    }

    /// Mutable access to a declaration, for wiring forward references.
    pub fn decl_mut(&mut self, id: DeclId) -> &mut Decl {
        &mut self.ast.decls[id.index()]
    }

    /// Add a statement to the arena.
    pub fn add_stmt(&mut self, stmt: Stmt) -> StmtId {
        let id = StmtId::new(self.ast.stmts.len());
        self.ast.stmts.push(stmt);
        id
    }

    /// Add a type to the arena.
    pub fn add_type(&mut self, ty: Type) -> TypeId {
        let id = TypeId::new(self.ast.types.len());
        self.ast.types.push(ty);
        id
    }

    /// Record a macro expansion.
    pub fn add_expansion(&mut self, expansion: MacroExpansion) {
        self.expansions.push(expansion);
    }

    /// Append a preprocessor event.
    pub fn push_event(&mut self, event: PreprocessorEvent) {
        self.preprocessor_events.push(event);
    }

    /// Append a diagnostic.
    pub fn add_diagnostic(&mut self, severity: Severity, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            message: message.into(),
        });
    }

    /// Check that every id in the tree, the event stream and the file table
    /// points into its arena.
    pub fn validate_ids(&self) -> Result<(), FrontEndError> {
        let check = IdCheck { tu: self };
        if !self.files.is_empty() {
            check.file(self.main_file)?;
        }
        for entry in &self.files {
            if let Some(loc) = entry.include_loc {
                check.loc(loc)?;
            }
        }
        for &id in &self.ast.top_level {
            check.decl(id)?;
        }
        for decl in &self.ast.decls {
            check.decl_node(decl)?;
        }
        for stmt in &self.ast.stmts {
            check.stmt_node(stmt)?;
        }
        for ty in &self.ast.types {
            check.type_node(ty)?;
        }
        for expansion in &self.expansions {
            check.range(expansion.range)?;
            check.range(expansion.definition)?;
        }
        for event in &self.preprocessor_events {
            match event {
                PreprocessorEvent::MacroDefined(defined) => {
                    check.range(defined.definition)?;
                    if let Some(token) = defined.last_token {
                        check.loc(token.loc)?;
                    }
                }
                PreprocessorEvent::MacroExpands(expands) => check.range(expands.definition)?,
            }
        }
        Ok(())
    }
}

impl SourceLocator for InMemoryTranslationUnit {
    fn file(&self, id: FileId) -> Option<&FileEntry> {
        self.files.get(id.index())
    }

    fn main_file(&self) -> FileId {
        self.main_file
    }
}

impl MacroRecord for InMemoryTranslationUnit {
    fn expansions_in(&self, range: SourceRange) -> Vec<&MacroExpansion> {
        self.expansions
            .iter()
            .filter(|expansion| range.contains(expansion.range.begin))
            .collect()
    }
}

impl TranslationUnit for InMemoryTranslationUnit {
    fn ast(&self) -> &Ast {
        &self.ast
    }

    fn errors(&self) -> Vec<String> {
        self.diagnostics
            .iter()
            .filter(|diag| diag.severity == Severity::Error)
            .map(|diag| diag.message.clone())
            .collect()
    }

    fn replay_preprocessor(&self, listener: &mut dyn PreprocessorListener) {
        for event in &self.preprocessor_events {
            match event {
                PreprocessorEvent::MacroDefined(defined) => listener.macro_defined(defined),
                PreprocessorEvent::MacroExpands(expands) => listener.macro_expands(expands),
            }
        }
    }
}

/// Arena bounds checks for a loaded translation unit.
struct IdCheck<'a> {
    tu: &'a InMemoryTranslationUnit,
}

impl IdCheck<'_> {
    fn decl(&self, id: DeclId) -> Result<(), FrontEndError> {
        bounded("decl", id.0, self.tu.ast.decls.len())
    }

    fn stmt(&self, id: StmtId) -> Result<(), FrontEndError> {
        bounded("stmt", id.0, self.tu.ast.stmts.len())
    }

    fn ty(&self, id: TypeId) -> Result<(), FrontEndError> {
        bounded("type", id.0, self.tu.ast.types.len())
    }

    fn file(&self, id: FileId) -> Result<(), FrontEndError> {
        if id.index() < self.tu.files.len() {
            Ok(())
        } else {
            Err(FrontEndError::UnknownFile(id))
        }
    }

    // Invalid locations are legal; valid ones must name a known file.
    fn loc(&self, loc: SourceLoc) -> Result<(), FrontEndError> {
        if loc.is_valid() {
            self.file(loc.file)?;
        }
        Ok(())
    }

    fn range(&self, range: SourceRange) -> Result<(), FrontEndError> {
        self.loc(range.begin)?;
        self.loc(range.end)
    }

    fn decls(&self, ids: &[DeclId]) -> Result<(), FrontEndError> {
        ids.iter().try_for_each(|&id| self.decl(id))
    }

    fn types(&self, ids: &[TypeId]) -> Result<(), FrontEndError> {
        ids.iter().try_for_each(|&id| self.ty(id))
    }

    fn opt_decl(&self, id: Option<DeclId>) -> Result<(), FrontEndError> {
        id.map_or(Ok(()), |id| self.decl(id))
    }

    fn opt_stmt(&self, id: Option<StmtId>) -> Result<(), FrontEndError> {
        id.map_or(Ok(()), |id| self.stmt(id))
    }

    fn opt_type(&self, id: Option<TypeId>) -> Result<(), FrontEndError> {
        id.map_or(Ok(()), |id| self.ty(id))
    }

    fn type_loc(&self, type_loc: Option<&TypeLoc>) -> Result<(), FrontEndError> {
        match type_loc {
            Some(TypeLoc::ConstantArray { element, size_expr }) => {
                self.ty(*element)?;
                self.stmt(*size_expr)
            }
            None => Ok(()),
        }
    }

    fn template_args(&self, args: &[TemplateArgument]) -> Result<(), FrontEndError> {
        for arg in args {
            match arg {
                TemplateArgument::Type(ty) | TemplateArgument::NullPtr(ty) => self.ty(*ty)?,
                TemplateArgument::Expr(expr) => self.stmt(*expr)?,
                TemplateArgument::Decl(decl) => self.decl(*decl)?,
                TemplateArgument::Integral(expr) => self.opt_stmt(*expr)?,
                TemplateArgument::Other => {}
            }
        }
        Ok(())
    }

    fn qualifier(&self, qualifier: Option<&Qualifier>) -> Result<(), FrontEndError> {
        let mut current = qualifier;
        while let Some(q) = current {
            if let QualifierKind::Type(ty) = q.kind {
                self.ty(ty)?;
            }
            current = q.prefix.as_deref();
        }
        Ok(())
    }

    fn decl_node(&self, decl: &Decl) -> Result<(), FrontEndError> {
        self.range(decl.range)?;
        self.opt_decl(decl.context)?;
        match &decl.kind {
            DeclKind::Namespace(ns) => {
                self.decls(&ns.children)?;
                self.loc(ns.rbrace)
            }
            DeclKind::Var(var) | DeclKind::Param(var) => {
                self.ty(var.ty)?;
                self.opt_stmt(var.init)?;
                self.type_loc(var.declarator.as_ref())
            }
            DeclKind::Field(field) => {
                self.ty(field.ty)?;
                self.opt_stmt(field.bit_width)?;
                self.opt_stmt(field.init)?;
                self.type_loc(field.declarator.as_ref())
            }
            DeclKind::EnumConstant { ty } => self.ty(*ty),
            DeclKind::Function(f) => {
                self.decls(&f.params)?;
                self.opt_stmt(f.body)?;
                self.ty(f.return_type)?;
                self.opt_type(f.ty)?;
                self.opt_decl(f.primary_template)?;
                f.inits
                    .iter()
                    .try_for_each(|CtorInitializer { member, init }| {
                        self.opt_decl(*member)?;
                        self.stmt(*init)
                    })
            }
            DeclKind::FunctionTemplate(t) | DeclKind::ClassTemplate(t) | DeclKind::AliasTemplate(t) => {
                self.decls(&t.params)?;
                self.decl(t.templated)?;
                self.decls(&t.specializations)
            }
            DeclKind::Record(record) => self.record(record),
            DeclKind::ClassTemplateSpecialization(spec) => {
                self.decl(spec.specialized)?;
                self.opt_decl(spec.partial_source)?;
                self.record(&spec.record)
            }
            DeclKind::Typedef { underlying } => self.ty(*underlying),
            DeclKind::Enum(e) => {
                self.loc(e.outer_start)?;
                self.decls(&e.constants)?;
                self.opt_decl(e.definition)
            }
            DeclKind::TemplateParam { ty } => self.opt_type(*ty),
            DeclKind::UsingDirective | DeclKind::AccessSpec | DeclKind::Empty | DeclKind::Other(_) => {
                Ok(())
            }
        }
    }

    fn record(&self, record: &crate::types::RecordDecl) -> Result<(), FrontEndError> {
        self.loc(record.outer_start)?;
        self.decls(&record.members)?;
        self.types(&record.bases)?;
        self.types(&record.virtual_bases)?;
        self.opt_decl(record.destructor)?;
        self.opt_decl(record.definition)
    }

    fn stmt_node(&self, stmt: &Stmt) -> Result<(), FrontEndError> {
        self.range(stmt.range)?;
        stmt.children.iter().try_for_each(|&child| self.stmt(child))?;
        match &stmt.kind {
            StmtKind::DeclStmt { decls } => self.decls(decls),
            StmtKind::DeclRef {
                decl,
                template_args,
                qualifier,
            } => {
                self.decl(*decl)?;
                self.template_args(template_args)?;
                self.qualifier(qualifier.as_ref())
            }
            StmtKind::Member {
                member,
                template_args,
            } => {
                self.decl(*member)?;
                self.template_args(template_args)
            }
            StmtKind::InitList { syntactic } => self.opt_stmt(*syntactic),
            StmtKind::DesignatedInit { fields } => self.decls(fields),
            StmtKind::Call { callee } => self.stmt(*callee),
            StmtKind::Construct { constructor } => self.decl(*constructor),
            StmtKind::ExplicitCast { ty } => self.ty(*ty),
            StmtKind::TypeTrait(TraitOperand::Type(ty)) => self.ty(*ty),
            StmtKind::TypeTrait(TraitOperand::Expr(expr)) => self.stmt(*expr),
            StmtKind::Other(_) => Ok(()),
        }
    }

    fn type_node(&self, ty: &Type) -> Result<(), FrontEndError> {
        match ty {
            Type::Builtin(_) => Ok(()),
            Type::Pointer(inner)
            | Type::Reference(inner)
            | Type::Array(inner)
            | Type::ConstantArray(inner)
            | Type::Attributed(inner)
            | Type::TypeOf(inner)
            | Type::Paren(inner) => self.ty(*inner),
            Type::FunctionProto { params, ret } => {
                self.types(params)?;
                self.ty(*ret)
            }
            Type::Auto(deduced) => self.opt_type(*deduced),
            Type::Decltype { expr, underlying } => {
                self.stmt(*expr)?;
                self.ty(*underlying)
            }
            Type::Record(decl) | Type::Enum(decl) | Type::Typedef(decl) => self.decl(*decl),
            Type::TemplateSpecialization { template, args } => {
                self.opt_decl(*template)?;
                self.template_args(args)
            }
            Type::Elaborated { named, qualifier } => {
                self.ty(*named)?;
                self.qualifier(qualifier.as_ref())
            }
        }
    }
}

fn bounded(arena: &'static str, index: u32, len: usize) -> Result<(), FrontEndError> {
    if (index as usize) < len {
        Ok(())
    } else {
        Err(FrontEndError::Dangling { arena, index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FunctionDecl, MacroDefinedEvent, MacroExpandsEvent};

    fn make_tu() -> InMemoryTranslationUnit {
        let mut tu = InMemoryTranslationUnit::new();
        let main = tu.add_file(FileEntry::source("main.c", None));
        let int = tu.add_type(Type::Builtin("int".into()));
        tu.add_top_level(Decl::new(
            "main",
            DeclKind::Function(FunctionDecl::new(int)),
            SourceRange::span(main, (1, 1), (1, 20)),
        ));
        tu.add_expansion(MacroExpansion {
            name: "N".into(),
            range: SourceRange::span(main, (1, 10), (1, 10)),
            definition: SourceRange::invalid(),
        });
        tu
    }

    #[test]
    fn test_json_round_trip_preserves_tree() {
        let tu = make_tu();
        let json = tu.to_json().unwrap();
        let loaded = InMemoryTranslationUnit::from_json(&json).unwrap();
        assert_eq!(loaded.ast, tu.ast);
        assert_eq!(loaded.expansions, tu.expansions);
    }

    #[test]
    fn test_dangling_id_rejected() {
        let mut tu = make_tu();
        tu.ast.top_level.push(DeclId(42));
        let json = serde_json::to_string(&tu).unwrap();
        let err = InMemoryTranslationUnit::from_json(&json).unwrap_err();
        assert!(matches!(err, FrontEndError::Dangling { arena: "decl", index: 42 }));
    }

    #[test]
    fn test_unknown_file_rejected() {
        let mut tu = make_tu();
        tu.ast.decls[0].range = SourceRange::span(FileId(9), (1, 1), (1, 2));
        assert!(matches!(tu.validate_ids(), Err(FrontEndError::UnknownFile(FileId(9)))));
    }

    #[test]
    fn test_expansions_in_range() {
        let tu = make_tu();
        let main = tu.main_file();
        assert_eq!(tu.expansions_in(SourceRange::span(main, (1, 1), (1, 20))).len(), 1);
        assert!(tu.expansions_in(SourceRange::span(main, (2, 1), (3, 1))).is_empty());
    }

    #[test]
    fn test_only_error_diagnostics_are_errors() {
        let mut tu = make_tu();
        tu.add_diagnostic(Severity::Warning, "unused variable");
        assert!(tu.errors().is_empty());
        tu.add_diagnostic(Severity::Error, "expected ';'");
        assert_eq!(tu.errors(), vec!["expected ';'".to_string()]);
    }

    #[test]
    fn test_replay_in_order() {
        #[derive(Default)]
        struct Names(Vec<String>);
        impl PreprocessorListener for Names {
            fn macro_defined(&mut self, event: &MacroDefinedEvent) {
                self.0.push(format!("def {}", event.name));
            }
            fn macro_expands(&mut self, event: &MacroExpandsEvent) {
                self.0.push(format!("exp {}", event.name));
            }
        }

        let mut tu = make_tu();
        tu.push_event(PreprocessorEvent::MacroDefined(MacroDefinedEvent {
            name: "N".into(),
            definition: SourceRange::invalid(),
            last_token: None,
        }));
        tu.push_event(PreprocessorEvent::MacroExpands(MacroExpandsEvent {
            name: "N".into(),
            definition: SourceRange::invalid(),
            nested: false,
        }));

        let mut names = Names::default();
        tu.replay_preprocessor(&mut names);
        assert_eq!(names.0, vec!["def N", "exp N"]);
    }

    #[test]
    fn test_describe_range() {
        let tu = make_tu();
        let main = tu.main_file();
        assert_eq!(
            tu.describe(SourceRange::span(main, (3, 1), (4, 2))),
            "main.c, 3:1 - 4:2"
        );
        assert_eq!(tu.describe(SourceRange::invalid()), "<invalid range>");
    }
}
