//! Reachability collector.
//!
//! Computes the closure of every node a set of root declarations depends on.
//! A node is visited at most once; cycles (recursive functions, self-referential
//! records) terminate because arena nodes are memoized before their edges are
//! followed. The result does not depend on traversal order.
//!
//! ## Edges
//!
//! Every declaration reaches its enclosing context and the using-directives
//! of that context. Beyond that, each declaration kind contributes the edges
//! of every facet it has: a class-template specialization contributes both
//! the specialization edges and the record edges, and every value
//! declaration reaches its declared type.
//!
//! Record members are deliberately not edges: a member is retained only when
//! something else reaches it.

use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

use crate::types::{
    Ast, DeclId, DeclKind, FunctionKind, NodeRef, Qualifier, QualifierKind, RecordDecl, StmtId,
    StmtKind, TemplateArgument, TraitOperand, Type, TypeId, TypeLoc,
};

/// The nodes reachable from the roots.
///
/// Sets only ever grow while collecting; iteration order is id order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reachable {
    /// Reachable declarations.
    pub decls: BTreeSet<DeclId>,
    /// Reachable statements.
    pub stmts: BTreeSet<StmtId>,
    /// Reachable types.
    pub types: BTreeSet<TypeId>,
}

impl Reachable {
    /// Whether a declaration is reachable.
    pub fn contains_decl(&self, id: DeclId) -> bool {
        self.decls.contains(&id)
    }

    /// Whether a statement is reachable.
    pub fn contains_stmt(&self, id: StmtId) -> bool {
        self.stmts.contains(&id)
    }

    /// Whether a type is reachable.
    pub fn contains_type(&self, id: TypeId) -> bool {
        self.types.contains(&id)
    }

    /// Whether every node reachable here is also reachable in `other`.
    pub fn is_subset_of(&self, other: &Reachable) -> bool {
        self.decls.is_subset(&other.decls)
            && self.stmts.is_subset(&other.stmts)
            && self.types.is_subset(&other.types)
    }
}

/// Collect every node reachable from `roots`.
pub fn collect(ast: &Ast, roots: &[DeclId]) -> Reachable {
    let mut collector = Collector::new(ast);
    for &root in roots {
        collector.visit(NodeRef::Decl(root));
    }
    collector.reachable
}

/// Worklist-driven closure over the syntax tree.
pub struct Collector<'a> {
    ast: &'a Ast,
    using_directives: BTreeMap<Option<DeclId>, Vec<DeclId>>,
    reachable: Reachable,
    worklist: Vec<(NodeRef<'a>, usize)>,
}

impl<'a> Collector<'a> {
    /// Create a collector with nothing reached yet.
    pub fn new(ast: &'a Ast) -> Self {
        Self {
            ast,
            using_directives: ast.using_directives(),
            reachable: Reachable::default(),
            worklist: Vec::new(),
        }
    }

    /// Reach `node` and everything it depends on.
    pub fn visit(&mut self, node: NodeRef<'a>) {
        self.worklist.push((node, 0));
        while let Some((node, depth)) = self.worklist.pop() {
            match node {
                NodeRef::Decl(id) => self.visit_decl(id, depth),
                NodeRef::Stmt(id) => self.visit_stmt(id, depth),
                NodeRef::Type(id) => self.visit_type(id, depth),
                NodeRef::TypeLoc(type_loc) => self.visit_type_loc(type_loc, depth),
                NodeRef::TemplateArgument(arg) => self.visit_template_arg(arg, depth),
                NodeRef::Qualifier(qualifier) => self.visit_qualifier(qualifier, depth),
            }
        }
    }

    /// Nodes reached so far.
    pub fn reachable(&self) -> &Reachable {
        &self.reachable
    }

    /// Consume the collector.
    pub fn finish(self) -> Reachable {
        self.reachable
    }

    fn push(&mut self, node: NodeRef<'a>, depth: usize) {
        self.worklist.push((node, depth + 1));
    }

    fn push_decl(&mut self, id: Option<DeclId>, depth: usize) {
        if let Some(id) = id {
            self.push(NodeRef::Decl(id), depth);
        }
    }

    fn push_stmt(&mut self, id: Option<StmtId>, depth: usize) {
        if let Some(id) = id {
            self.push(NodeRef::Stmt(id), depth);
        }
    }

    fn push_type(&mut self, id: Option<TypeId>, depth: usize) {
        if let Some(id) = id {
            self.push(NodeRef::Type(id), depth);
        }
    }

    fn push_template_args(&mut self, args: &'a [TemplateArgument], depth: usize) {
        for arg in args {
            self.push(NodeRef::TemplateArgument(arg), depth);
        }
    }

    fn visit_decl(&mut self, id: DeclId, depth: usize) {
        if !self.reachable.decls.insert(id) {
            return;
        }
        let ast = self.ast;
        let decl = ast.decl(id);
        trace!(
            "{:indent$}decl {} '{}'",
            "",
            id,
            decl.display_name(),
            indent = depth * 2
        );

        // Context and its using-directives.
        let directives = self
            .using_directives
            .get(&decl.context)
            .cloned()
            .unwrap_or_default();
        for directive in directives {
            self.push(NodeRef::Decl(directive), depth);
        }
        self.push_decl(decl.context, depth);

        match &decl.kind {
            DeclKind::Typedef { underlying } => self.push(NodeRef::Type(*underlying), depth),
            DeclKind::ClassTemplateSpecialization(spec) => {
                self.push(NodeRef::Decl(spec.specialized), depth);
                self.push_decl(spec.partial_source, depth);
                self.record_edges(&spec.record, depth);
            }
            DeclKind::Record(record) => self.record_edges(record, depth),
            DeclKind::ClassTemplate(template)
            | DeclKind::FunctionTemplate(template)
            | DeclKind::AliasTemplate(template) => {
                for &param in &template.params {
                    self.push(NodeRef::Decl(param), depth);
                }
                self.push(NodeRef::Decl(template.templated), depth);
            }
            DeclKind::Param(var) | DeclKind::Var(var) => {
                self.push_stmt(var.init, depth);
                self.declared_type(var.ty, var.declarator.as_ref(), depth);
            }
            DeclKind::Field(field) => {
                self.push_stmt(field.bit_width, depth);
                self.push_stmt(field.init, depth);
                self.declared_type(field.ty, field.declarator.as_ref(), depth);
            }
            DeclKind::EnumConstant { ty } => self.push(NodeRef::Type(*ty), depth),
            DeclKind::Function(function) => {
                if function.kind == FunctionKind::Constructor {
                    for init in &function.inits {
                        self.push_decl(init.member, depth);
                        self.push(NodeRef::Stmt(init.init), depth);
                    }
                }
                self.push_decl(function.primary_template, depth);
                for &param in &function.params {
                    self.push(NodeRef::Decl(param), depth);
                }
                self.push_stmt(function.body, depth);
                self.push(NodeRef::Type(function.return_type), depth);
                self.push_type(function.ty, depth);
            }
            DeclKind::Enum(e) => {
                if e.brace_end.is_none() {
                    self.push_decl(e.definition, depth);
                }
            }
            DeclKind::TemplateParam { ty } => self.push_type(*ty, depth),
            DeclKind::Namespace(_)
            | DeclKind::UsingDirective
            | DeclKind::AccessSpec
            | DeclKind::Empty
            | DeclKind::Other(_) => {}
        }
    }

    fn record_edges(&mut self, record: &'a RecordDecl, depth: usize) {
        if !record.is_definition() {
            self.push_decl(record.definition, depth);
            return;
        }
        let ast = self.ast;
        for &member in &record.members {
            if matches!(ast.decl(member).kind, DeclKind::AccessSpec) {
                self.push(NodeRef::Decl(member), depth);
            }
        }
        for &base in record.bases.iter().chain(&record.virtual_bases) {
            self.push(NodeRef::Type(base), depth);
        }
        self.push_decl(record.destructor, depth);
    }

    // A fixed-size array declarator carries its size expression only in the
    // written syntax; the plain type keeps just the element type.
    fn declared_type(&mut self, ty: TypeId, declarator: Option<&'a TypeLoc>, depth: usize) {
        if let (Type::ConstantArray(_), Some(type_loc)) = (self.ast.ty(ty), declarator) {
            self.push(NodeRef::TypeLoc(type_loc), depth);
        }
        self.push(NodeRef::Type(ty), depth);
    }

    fn visit_stmt(&mut self, id: StmtId, depth: usize) {
        if !self.reachable.stmts.insert(id) {
            return;
        }
        let ast = self.ast;
        let stmt = ast.stmt(id);
        trace!("{:indent$}stmt {} {:?}", "", id, stmt.kind, indent = depth * 2);

        for &child in &stmt.children {
            self.push(NodeRef::Stmt(child), depth);
        }

        match &stmt.kind {
            StmtKind::DeclStmt { decls } => {
                for &decl in decls {
                    self.push(NodeRef::Decl(decl), depth);
                }
            }
            StmtKind::DeclRef {
                decl,
                template_args,
                qualifier,
            } => {
                self.push(NodeRef::Decl(*decl), depth);
                self.push_template_args(template_args, depth);
                if let Some(qualifier) = qualifier {
                    self.push(NodeRef::Qualifier(qualifier), depth);
                }
            }
            StmtKind::Member {
                member,
                template_args,
            } => {
                self.push(NodeRef::Decl(*member), depth);
                self.push_template_args(template_args, depth);
            }
            StmtKind::InitList { syntactic } => self.push_stmt(*syntactic, depth),
            StmtKind::DesignatedInit { fields } => {
                for &field in fields {
                    self.push(NodeRef::Decl(field), depth);
                }
            }
            StmtKind::Call { callee } => self.push(NodeRef::Stmt(*callee), depth),
            StmtKind::Construct { constructor } => self.push(NodeRef::Decl(*constructor), depth),
            StmtKind::ExplicitCast { ty } => self.push(NodeRef::Type(*ty), depth),
            StmtKind::TypeTrait(TraitOperand::Type(ty)) => self.push(NodeRef::Type(*ty), depth),
            StmtKind::TypeTrait(TraitOperand::Expr(expr)) => {
                self.push(NodeRef::Stmt(*expr), depth)
            }
            StmtKind::Other(_) => {}
        }
    }

    fn visit_type(&mut self, id: TypeId, depth: usize) {
        if !self.reachable.types.insert(id) {
            return;
        }
        let ast = self.ast;
        let ty = ast.ty(id);
        trace!("{:indent$}type {} {:?}", "", id, ty, indent = depth * 2);

        match ty {
            Type::Builtin(_) => {}
            Type::Pointer(inner)
            | Type::Reference(inner)
            | Type::Array(inner)
            | Type::ConstantArray(inner)
            | Type::Attributed(inner)
            | Type::TypeOf(inner)
            | Type::Paren(inner) => self.push(NodeRef::Type(*inner), depth),
            Type::FunctionProto { params, ret } => {
                for &param in params {
                    self.push(NodeRef::Type(param), depth);
                }
                self.push(NodeRef::Type(*ret), depth);
            }
            Type::Auto(deduced) => self.push_type(*deduced, depth),
            Type::Decltype { expr, underlying } => {
                self.push(NodeRef::Stmt(*expr), depth);
                self.push(NodeRef::Type(*underlying), depth);
            }
            Type::Record(decl) | Type::Enum(decl) | Type::Typedef(decl) => {
                self.push(NodeRef::Decl(*decl), depth)
            }
            Type::TemplateSpecialization { template, args } => {
                self.push_decl(*template, depth);
                self.push_template_args(args, depth);
            }
            Type::Elaborated { named, qualifier } => {
                self.push(NodeRef::Type(*named), depth);
                if let Some(qualifier) = qualifier {
                    self.push(NodeRef::Qualifier(qualifier), depth);
                }
            }
        }
    }

    fn visit_type_loc(&mut self, type_loc: &'a TypeLoc, depth: usize) {
        match type_loc {
            TypeLoc::ConstantArray { element, size_expr } => {
                self.push(NodeRef::Type(*element), depth);
                self.push(NodeRef::Stmt(*size_expr), depth);
            }
        }
    }

    fn visit_template_arg(&mut self, arg: &'a TemplateArgument, depth: usize) {
        match arg {
            TemplateArgument::Type(ty) | TemplateArgument::NullPtr(ty) => {
                self.push(NodeRef::Type(*ty), depth)
            }
            TemplateArgument::Expr(expr) => self.push(NodeRef::Stmt(*expr), depth),
            TemplateArgument::Integral(expr) => self.push_stmt(*expr, depth),
            TemplateArgument::Decl(decl) => self.push(NodeRef::Decl(*decl), depth),
            TemplateArgument::Other => {}
        }
    }

    fn visit_qualifier(&mut self, qualifier: &'a Qualifier, depth: usize) {
        if let QualifierKind::Type(ty) = qualifier.kind {
            self.push(NodeRef::Type(ty), depth);
        }
        if let Some(prefix) = qualifier.prefix.as_deref() {
            self.push(NodeRef::Qualifier(prefix), depth);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::InMemoryTranslationUnit;
    use crate::types::{
        CtorInitializer, Decl, FieldDecl, FileEntry, FileId, FunctionDecl, NamespaceDecl,
        RecordDecl, SourceLoc, SourceRange, SpecializationDecl, SpecializationKind, Stmt, TagKind,
        TemplateDecl, VarDecl,
    };

    fn make_tu() -> (InMemoryTranslationUnit, FileId, TypeId) {
        let mut tu = InMemoryTranslationUnit::new();
        let main = tu.add_file(FileEntry::source("main.cpp", None));
        let int = tu.add_type(Type::Builtin("int".into()));
        (tu, main, int)
    }

    fn line(file: FileId, n: u32) -> SourceRange {
        SourceRange::span(file, (n, 1), (n, 40))
    }

    fn decl_ref(tu: &mut InMemoryTranslationUnit, file: FileId, decl: DeclId) -> StmtId {
        tu.add_stmt(Stmt::new(
            StmtKind::DeclRef {
                decl,
                template_args: vec![],
                qualifier: None,
            },
            line(file, 1),
        ))
    }

    fn body(tu: &mut InMemoryTranslationUnit, file: FileId, children: Vec<StmtId>) -> StmtId {
        tu.add_stmt(Stmt::new(StmtKind::Other("CompoundStmt".into()), line(file, 1)).with_children(children))
    }

    #[test]
    fn test_call_reaches_callee_only() {
        let (mut tu, main, int) = make_tu();
        let g_body = body(&mut tu, main, vec![]);
        let g = tu.add_top_level(Decl::new(
            "g",
            DeclKind::Function(FunctionDecl::new(int).with_body(g_body)),
            line(main, 1),
        ));
        let h = tu.add_top_level(Decl::new(
            "h",
            DeclKind::Function(FunctionDecl::new(int)),
            line(main, 2),
        ));
        let callee = decl_ref(&mut tu, main, g);
        let call = tu.add_stmt(Stmt::new(StmtKind::Call { callee }, line(main, 3)).with_children(vec![callee]));
        let f_body = body(&mut tu, main, vec![call]);
        let f = tu.add_top_level(Decl::new(
            "f",
            DeclKind::Function(FunctionDecl::new(int).with_body(f_body)),
            line(main, 3),
        ));

        let reachable = collect(&tu.ast, &[f]);
        assert!(reachable.contains_decl(f));
        assert!(reachable.contains_decl(g));
        assert!(!reachable.contains_decl(h));
        assert!(reachable.contains_stmt(g_body));
        assert!(reachable.contains_type(int));
    }

    #[test]
    fn test_recursion_terminates() {
        let (mut tu, main, int) = make_tu();
        let f = tu.add_top_level(Decl::new(
            "f",
            DeclKind::Function(FunctionDecl::new(int)),
            line(main, 1),
        ));
        let callee = decl_ref(&mut tu, main, f);
        let call = tu.add_stmt(Stmt::new(StmtKind::Call { callee }, line(main, 1)));
        let f_body = body(&mut tu, main, vec![call]);
        if let DeclKind::Function(function) = &mut tu.decl_mut(f).kind {
            function.body = Some(f_body);
        }

        let reachable = collect(&tu.ast, &[f]);
        assert_eq!(reachable.decls.len(), 1);
        assert_eq!(reachable.stmts.len(), 3);
    }

    #[test]
    fn test_record_members_not_forced() {
        let (mut tu, main, int) = make_tu();
        let rec = tu.add_top_level(Decl::new(
            "S",
            DeclKind::Record(RecordDecl::definition(
                TagKind::Struct,
                SourceLoc::new(main, 1, 1),
                SourceLoc::new(main, 4, 1),
            )),
            SourceRange::span(main, (1, 1), (4, 2)),
        ));
        let a = tu.add_decl(
            Decl::new("a", DeclKind::Field(FieldDecl::new(int)), line(main, 2)).in_context(rec),
        );
        let public = tu.add_decl(
            Decl::anonymous(DeclKind::AccessSpec, line(main, 3)).in_context(rec),
        );
        if let DeclKind::Record(record) = &mut tu.decl_mut(rec).kind {
            record.members = vec![a, public];
        }

        let reachable = collect(&tu.ast, &[rec]);
        assert!(reachable.contains_decl(public));
        assert!(!reachable.contains_decl(a));
    }

    #[test]
    fn test_member_reaches_enclosing_record() {
        let (mut tu, main, int) = make_tu();
        let rec = tu.add_top_level(Decl::new(
            "S",
            DeclKind::Record(RecordDecl::definition(
                TagKind::Struct,
                SourceLoc::new(main, 1, 1),
                SourceLoc::new(main, 3, 1),
            )),
            SourceRange::span(main, (1, 1), (3, 2)),
        ));
        let a = tu.add_decl(
            Decl::new("a", DeclKind::Field(FieldDecl::new(int)), line(main, 2)).in_context(rec),
        );
        let reachable = collect(&tu.ast, &[a]);
        assert!(reachable.contains_decl(rec));
    }

    #[test]
    fn test_constant_array_reaches_size_expression() {
        let (mut tu, main, int) = make_tu();
        let n = tu.add_top_level(Decl::new(
            "N",
            DeclKind::Var(VarDecl::new(int)),
            line(main, 1),
        ));
        let size = decl_ref(&mut tu, main, n);
        let array = tu.add_type(Type::ConstantArray(int));
        let arr = tu.add_top_level(Decl::new(
            "arr",
            DeclKind::Var(VarDecl::new(array).with_declarator(TypeLoc::ConstantArray {
                element: int,
                size_expr: size,
            })),
            line(main, 2),
        ));

        let reachable = collect(&tu.ast, &[arr]);
        assert!(reachable.contains_decl(n));
        assert!(reachable.contains_stmt(size));
        assert!(reachable.contains_type(array));
    }

    #[test]
    fn test_using_directives_of_context_pulled_in() {
        let (mut tu, main, int) = make_tu();
        let ns = tu.add_top_level(Decl::new(
            "lib",
            DeclKind::Namespace(NamespaceDecl {
                children: vec![],
                rbrace: SourceLoc::new(main, 3, 1),
            }),
            SourceRange::span(main, (1, 1), (3, 1)),
        ));
        let directive = tu.add_top_level(Decl::anonymous(DeclKind::UsingDirective, line(main, 4)));
        let x = tu.add_top_level(Decl::new("x", DeclKind::Var(VarDecl::new(int)), line(main, 5)));

        let reachable = collect(&tu.ast, &[x]);
        assert!(reachable.contains_decl(directive));
        assert!(!reachable.contains_decl(ns));
    }

    #[test]
    fn test_constructor_initializers_and_specialization_edges() {
        let (mut tu, main, int) = make_tu();
        let tmpl_record = tu.add_decl(Decl::new(
            "B",
            DeclKind::Record(RecordDecl::definition(
                TagKind::Struct,
                SourceLoc::new(main, 2, 1),
                SourceLoc::new(main, 2, 20),
            )),
            line(main, 2),
        ));
        let tmpl = tu.add_top_level(Decl::new(
            "B",
            DeclKind::ClassTemplate(TemplateDecl {
                params: vec![],
                templated: tmpl_record,
                specializations: vec![],
            }),
            SourceRange::span(main, (1, 1), (2, 20)),
        ));
        let spec = tu.add_top_level(Decl::new(
            "B",
            DeclKind::ClassTemplateSpecialization(SpecializationDecl {
                kind: SpecializationKind::Explicit,
                specialized: tmpl,
                partial_source: None,
                record: RecordDecl::definition(
                    TagKind::Struct,
                    SourceLoc::new(main, 4, 1),
                    SourceLoc::new(main, 4, 30),
                ),
            }),
            SourceRange::span(main, (3, 1), (4, 30)),
        ));

        let field = tu.add_decl(
            Decl::new("m", DeclKind::Field(FieldDecl::new(int)), line(main, 6)).in_context(spec),
        );
        let seven = tu.add_stmt(Stmt::new(StmtKind::Other("IntegerLiteral".into()), line(main, 7)));
        let mut ctor = FunctionDecl::new(int).with_kind(FunctionKind::Constructor);
        ctor.inits = vec![CtorInitializer {
            member: Some(field),
            init: seven,
        }];
        let ctor = tu.add_decl(Decl::new("B", DeclKind::Function(ctor), line(main, 7)).in_context(spec));

        let reachable = collect(&tu.ast, &[ctor]);
        assert!(reachable.contains_decl(field));
        assert!(reachable.contains_stmt(seven));
        assert!(reachable.contains_decl(spec));
        assert!(reachable.contains_decl(tmpl));
        assert!(reachable.contains_decl(tmpl_record));
    }

    #[test]
    fn test_order_independent() {
        let (mut tu, main, int) = make_tu();
        let a = tu.add_top_level(Decl::new("a", DeclKind::Var(VarDecl::new(int)), line(main, 1)));
        let b_init = decl_ref(&mut tu, main, a);
        let b = tu.add_top_level(Decl::new(
            "b",
            DeclKind::Var(VarDecl::new(int).with_init(b_init)),
            line(main, 2),
        ));
        let c = tu.add_top_level(Decl::new("c", DeclKind::Var(VarDecl::new(int)), line(main, 3)));

        assert_eq!(collect(&tu.ast, &[b, c]), collect(&tu.ast, &[c, b]));
        assert!(collect(&tu.ast, &[b]).is_subset_of(&collect(&tu.ast, &[b, c])));
    }
}
