//! Arena-indexed syntax tree of a translation unit.
//!
//! The front end hands over declarations, statements and types as three
//! flat arenas. Edges between nodes are ids into those arenas; the set of
//! node kinds is closed so that every consumer matches exhaustively.
//!
//! ## Facets
//!
//! Several declaration kinds share behavior with a more general kind: a
//! class-template specialization is also a record, a parameter is also a
//! variable, and every value declaration has a declared type. The helpers on
//! [`Ast`] expose those facets so traversal and marking can apply every rule
//! a declaration satisfies.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ids::{DeclId, StmtId, TypeId};
use super::source::{SourceLoc, SourceRange};

// ============================================================================
// Declarations
// ============================================================================

/// A declaration node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decl {
    /// Declared name, if any.
    #[serde(default)]
    pub name: Option<String>,
    /// Kind-specific payload.
    pub kind: DeclKind,
    /// Source extent of the whole declaration.
    pub range: SourceRange,
    /// Enclosing declaration; `None` for the translation unit itself.
    #[serde(default)]
    pub context: Option<DeclId>,
    /// Compiler-synthesized declaration.
    #[serde(default)]
    pub implicit: bool,
}

impl Decl {
    /// Create a declaration at the top of the translation unit.
    pub fn new(name: impl Into<String>, kind: DeclKind, range: SourceRange) -> Self {
        Self {
            name: Some(name.into()),
            kind,
            range,
            context: None,
            implicit: false,
        }
    }

    /// Create a declaration without a name.
    pub fn anonymous(kind: DeclKind, range: SourceRange) -> Self {
        Self {
            name: None,
            kind,
            range,
            context: None,
            implicit: false,
        }
    }

    /// Place the declaration inside `context`.
    pub fn in_context(mut self, context: DeclId) -> Self {
        self.context = Some(context);
        self
    }

    /// Flag the declaration as compiler-synthesized.
    pub fn implicit(mut self) -> Self {
        self.implicit = true;
        self
    }

    /// Name for diagnostics, `<anonymous>` when unnamed.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

/// Kind-specific payload of a declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclKind {
    /// `namespace N { ... }`.
    Namespace(NamespaceDecl),
    /// `using namespace N;`.
    UsingDirective,
    /// `public:` / `protected:` / `private:`.
    AccessSpec,
    /// Variable.
    Var(VarDecl),
    /// Function parameter; the initializer is the default argument.
    Param(VarDecl),
    /// Non-static data member.
    Field(FieldDecl),
    /// Enumerator.
    EnumConstant {
        /// Type of the enumerator (the enclosing enum).
        ty: TypeId,
    },
    /// Function, method, constructor or destructor.
    Function(FunctionDecl),
    /// `template<...> R f(...)`.
    FunctionTemplate(TemplateDecl),
    /// `struct`, `class` or `union`.
    Record(RecordDecl),
    /// `template<...> struct S`.
    ClassTemplate(TemplateDecl),
    /// Explicit, partial or implicit specialization of a class template.
    ClassTemplateSpecialization(SpecializationDecl),
    /// `typedef T N;` or `using N = T;`.
    Typedef {
        /// Aliased type.
        underlying: TypeId,
    },
    /// `template<...> using N = T;`.
    AliasTemplate(TemplateDecl),
    /// `enum E { ... }`.
    Enum(EnumDecl),
    /// Template parameter; non-type parameters carry their type.
    TemplateParam {
        /// Declared type of a non-type parameter.
        #[serde(default)]
        ty: Option<TypeId>,
    },
    /// A stray `;`.
    Empty,
    /// Any other declaration class, by name.
    Other(String),
}

/// Namespace payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceDecl {
    /// Declarations inside the namespace, in source order.
    pub children: Vec<DeclId>,
    /// Location of the closing brace.
    pub rbrace: SourceLoc,
}

/// Variable and parameter payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDecl {
    /// Declared type.
    pub ty: TypeId,
    /// Initializer, or default argument for parameters.
    #[serde(default)]
    pub init: Option<StmtId>,
    /// Declarator syntax, when it carries more than the plain type.
    #[serde(default)]
    pub declarator: Option<TypeLoc>,
}

impl VarDecl {
    /// Variable of type `ty` with no initializer.
    pub fn new(ty: TypeId) -> Self {
        Self {
            ty,
            init: None,
            declarator: None,
        }
    }

    /// Attach an initializer.
    pub fn with_init(mut self, init: StmtId) -> Self {
        self.init = Some(init);
        self
    }

    /// Attach declarator syntax.
    pub fn with_declarator(mut self, declarator: TypeLoc) -> Self {
        self.declarator = Some(declarator);
        self
    }
}

/// Data member payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    /// Declared type.
    pub ty: TypeId,
    /// Bit-field width expression.
    #[serde(default)]
    pub bit_width: Option<StmtId>,
    /// In-class initializer.
    #[serde(default)]
    pub init: Option<StmtId>,
    /// Declarator syntax, when it carries more than the plain type.
    #[serde(default)]
    pub declarator: Option<TypeLoc>,
}

impl FieldDecl {
    /// Field of type `ty`.
    pub fn new(ty: TypeId) -> Self {
        Self {
            ty,
            bit_width: None,
            init: None,
            declarator: None,
        }
    }
}

/// Flavor of a function declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    /// Free function.
    #[default]
    Plain,
    /// Member function.
    Method,
    /// Constructor.
    Constructor,
    /// Destructor.
    Destructor,
}

/// A constructor member-initializer `member(init)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtorInitializer {
    /// Initialized member, absent for base and delegating initializers.
    #[serde(default)]
    pub member: Option<DeclId>,
    /// Initializer expression.
    pub init: StmtId,
}

/// Function payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    /// Function flavor.
    #[serde(default)]
    pub kind: FunctionKind,
    /// Parameter declarations.
    #[serde(default)]
    pub params: Vec<DeclId>,
    /// Body, absent for prototypes.
    #[serde(default)]
    pub body: Option<StmtId>,
    /// Declared return type.
    pub return_type: TypeId,
    /// Full function type.
    #[serde(default)]
    pub ty: Option<TypeId>,
    /// Template this function specializes.
    #[serde(default)]
    pub primary_template: Option<DeclId>,
    /// Compiler builtin such as `__builtin_memcpy`.
    #[serde(default)]
    pub builtin: bool,
    /// Constructor member-initializers.
    #[serde(default)]
    pub inits: Vec<CtorInitializer>,
}

impl FunctionDecl {
    /// Plain function returning `return_type`.
    pub fn new(return_type: TypeId) -> Self {
        Self {
            kind: FunctionKind::Plain,
            params: Vec::new(),
            body: None,
            return_type,
            ty: None,
            primary_template: None,
            builtin: false,
            inits: Vec::new(),
        }
    }

    /// Attach a body.
    pub fn with_body(mut self, body: StmtId) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach parameters.
    pub fn with_params(mut self, params: Vec<DeclId>) -> Self {
        self.params = params;
        self
    }

    /// Set the function flavor.
    pub fn with_kind(mut self, kind: FunctionKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Payload shared by class, function and alias templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDecl {
    /// Template parameter declarations.
    #[serde(default)]
    pub params: Vec<DeclId>,
    /// The templated declaration (pattern).
    pub templated: DeclId,
    /// Known specializations and instantiations.
    #[serde(default)]
    pub specializations: Vec<DeclId>,
}

/// Record tag keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TagKind {
    /// `struct`.
    #[default]
    Struct,
    /// `class`.
    Class,
    /// `union`.
    Union,
}

/// Record payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDecl {
    /// Tag keyword.
    #[serde(default)]
    pub tag: TagKind,
    /// Start of the record head (the tag keyword).
    pub outer_start: SourceLoc,
    /// Closing brace; `None` for a forward declaration.
    #[serde(default)]
    pub brace_end: Option<SourceLoc>,
    /// Member declarations in source order.
    #[serde(default)]
    pub members: Vec<DeclId>,
    /// Base class types.
    #[serde(default)]
    pub bases: Vec<TypeId>,
    /// Virtual base class types.
    #[serde(default)]
    pub virtual_bases: Vec<TypeId>,
    /// User-declared destructor.
    #[serde(default)]
    pub destructor: Option<DeclId>,
    /// Defining declaration, for forward declarations of a defined record.
    #[serde(default)]
    pub definition: Option<DeclId>,
}

impl RecordDecl {
    /// A record definition whose head starts at `outer_start`.
    pub fn definition(tag: TagKind, outer_start: SourceLoc, brace_end: SourceLoc) -> Self {
        Self {
            tag,
            outer_start,
            brace_end: Some(brace_end),
            members: Vec::new(),
            bases: Vec::new(),
            virtual_bases: Vec::new(),
            destructor: None,
            definition: None,
        }
    }

    /// A forward declaration, optionally naming its definition.
    pub fn forward(tag: TagKind, outer_start: SourceLoc, definition: Option<DeclId>) -> Self {
        Self {
            tag,
            outer_start,
            brace_end: None,
            members: Vec::new(),
            bases: Vec::new(),
            virtual_bases: Vec::new(),
            destructor: None,
            definition,
        }
    }

    /// Attach members.
    pub fn with_members(mut self, members: Vec<DeclId>) -> Self {
        self.members = members;
        self
    }

    /// Whether this declaration carries the record body.
    pub fn is_definition(&self) -> bool {
        self.brace_end.is_some()
    }
}

/// How a class-template specialization came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecializationKind {
    /// `template<> struct S<int>`.
    Explicit,
    /// `template<class T> struct S<T*>`.
    Partial,
    /// Instantiated by the compiler from the primary template.
    Implicit,
}

/// Class-template specialization payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecializationDecl {
    /// How the specialization came to be.
    pub kind: SpecializationKind,
    /// The specialized class template.
    pub specialized: DeclId,
    /// Partial specialization this one was instantiated from.
    #[serde(default)]
    pub partial_source: Option<DeclId>,
    /// Record body of the specialization.
    pub record: RecordDecl,
}

/// Enum payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDecl {
    /// Start of the enum head.
    pub outer_start: SourceLoc,
    /// Closing brace; `None` for an opaque declaration.
    #[serde(default)]
    pub brace_end: Option<SourceLoc>,
    /// Enumerators in source order.
    #[serde(default)]
    pub constants: Vec<DeclId>,
    /// Defining declaration, for opaque declarations of a defined enum.
    #[serde(default)]
    pub definition: Option<DeclId>,
}

// ============================================================================
// Statements
// ============================================================================

/// A statement or expression node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    /// Kind-specific payload.
    pub kind: StmtKind,
    /// Source extent.
    pub range: SourceRange,
    /// Syntactic children in source order.
    #[serde(default)]
    pub children: Vec<StmtId>,
}

impl Stmt {
    /// Create a statement with no children.
    pub fn new(kind: StmtKind, range: SourceRange) -> Self {
        Self {
            kind,
            range,
            children: Vec::new(),
        }
    }

    /// Attach children.
    pub fn with_children(mut self, children: Vec<StmtId>) -> Self {
        self.children = children;
        self
    }
}

/// Kind-specific payload of a statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StmtKind {
    /// Local declarations.
    DeclStmt {
        /// Declared entities.
        decls: Vec<DeclId>,
    },
    /// Reference to a named declaration.
    DeclRef {
        /// Referenced declaration.
        decl: DeclId,
        /// Explicit template arguments.
        #[serde(default)]
        template_args: Vec<TemplateArgument>,
        /// Nested-name qualifier.
        #[serde(default)]
        qualifier: Option<Qualifier>,
    },
    /// Member access `a.m` or `p->m`.
    Member {
        /// Accessed member.
        member: DeclId,
        /// Explicit template arguments.
        #[serde(default)]
        template_args: Vec<TemplateArgument>,
    },
    /// Braced initializer list; semantic forms point at their syntactic form.
    InitList {
        /// Syntactic form of a semantic initializer list.
        #[serde(default)]
        syntactic: Option<StmtId>,
    },
    /// Designated initializer `.a.b = x`.
    DesignatedInit {
        /// Fields named by the designators.
        fields: Vec<DeclId>,
    },
    /// Function call.
    Call {
        /// Callee expression.
        callee: StmtId,
    },
    /// Constructor invocation.
    Construct {
        /// Invoked constructor.
        constructor: DeclId,
    },
    /// Explicit cast.
    ExplicitCast {
        /// Target type as written.
        ty: TypeId,
    },
    /// `sizeof` / `alignof`.
    TypeTrait(TraitOperand),
    /// Any other statement class, by name.
    Other(String),
}

/// Operand of `sizeof` / `alignof`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitOperand {
    /// `sizeof(T)`.
    Type(TypeId),
    /// `sizeof expr`.
    Expr(StmtId),
}

// ============================================================================
// Types and type syntax
// ============================================================================

/// A type node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Type {
    /// `int`, `char`, ...
    Builtin(String),
    /// `T*`.
    Pointer(TypeId),
    /// `T&` / `T&&`.
    Reference(TypeId),
    /// Array of unknown or dependent size.
    Array(TypeId),
    /// Array of constant size.
    ConstantArray(TypeId),
    /// Type with attributes.
    Attributed(TypeId),
    /// `typeof(T)`.
    TypeOf(TypeId),
    /// Function prototype.
    FunctionProto {
        /// Parameter types.
        params: Vec<TypeId>,
        /// Return type.
        ret: TypeId,
    },
    /// Parenthesized type.
    Paren(TypeId),
    /// `auto`, with its deduced type once known.
    Auto(Option<TypeId>),
    /// `decltype(expr)`.
    Decltype {
        /// Operand expression.
        expr: StmtId,
        /// Resulting type.
        underlying: TypeId,
    },
    /// Record type.
    Record(DeclId),
    /// Enum type.
    Enum(DeclId),
    /// Typedef type.
    Typedef(DeclId),
    /// `Tmpl<Args...>`.
    TemplateSpecialization {
        /// Named template, when it is a declaration.
        #[serde(default)]
        template: Option<DeclId>,
        /// Template arguments.
        #[serde(default)]
        args: Vec<TemplateArgument>,
    },
    /// Qualified or tag-keyword-elaborated type.
    Elaborated {
        /// Named type.
        named: TypeId,
        /// Nested-name qualifier.
        #[serde(default)]
        qualifier: Option<Qualifier>,
    },
}

/// Declarator syntax that carries information the plain type drops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeLoc {
    /// `T name[size]` as written.
    ConstantArray {
        /// Element type.
        element: TypeId,
        /// Size expression as written.
        size_expr: StmtId,
    },
}

/// A template argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateArgument {
    /// Type argument.
    Type(TypeId),
    /// Expression argument.
    Expr(StmtId),
    /// Declaration argument.
    Decl(DeclId),
    /// `nullptr` argument of the given type.
    NullPtr(TypeId),
    /// Integral value with its source expression when written.
    Integral(Option<StmtId>),
    /// Template-name, pack or other argument without edges.
    Other,
}

/// A nested-name qualifier such as `ns::Outer<int>::`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Qualifier {
    /// This component.
    pub kind: QualifierKind,
    /// Qualifier to the left of this component.
    #[serde(default)]
    pub prefix: Option<Box<Qualifier>>,
}

/// One component of a nested-name qualifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualifierKind {
    /// Type component.
    Type(TypeId),
    /// Namespace component, by name.
    Namespace(String),
    /// Leading `::`.
    Global,
}

// ============================================================================
// Node references
// ============================================================================

/// A reference to any traversable node.
///
/// Declarations, statements and types have arena identity; the remaining
/// variants are structural values reached through their owner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeRef<'a> {
    /// Declaration.
    Decl(DeclId),
    /// Statement or expression.
    Stmt(StmtId),
    /// Type.
    Type(TypeId),
    /// Declarator syntax.
    TypeLoc(&'a TypeLoc),
    /// Template argument.
    TemplateArgument(&'a TemplateArgument),
    /// Nested-name qualifier.
    Qualifier(&'a Qualifier),
}

// ============================================================================
// Arena
// ============================================================================

/// The three node arenas plus the top-level declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ast {
    /// Declaration arena.
    pub decls: Vec<Decl>,
    /// Statement arena.
    #[serde(default)]
    pub stmts: Vec<Stmt>,
    /// Type arena.
    #[serde(default)]
    pub types: Vec<Type>,
    /// Top-level declarations in source order.
    pub top_level: Vec<DeclId>,
}

impl Ast {
    /// Declaration by id.
    ///
    /// Ids are checked against the arenas when a translation unit is loaded,
    /// so lookups of ids taken from the tree itself always succeed.
    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id.index()]
    }

    /// Statement by id.
    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.index()]
    }

    /// Type by id.
    pub fn ty(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    /// Top-level declarations in source order.
    pub fn top_level(&self) -> &[DeclId] {
        &self.top_level
    }

    /// Function facet of a declaration.
    pub fn as_function(&self, id: DeclId) -> Option<&FunctionDecl> {
        match &self.decl(id).kind {
            DeclKind::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Record facet of a declaration (records and class-template specializations).
    pub fn as_record(&self, id: DeclId) -> Option<&RecordDecl> {
        match &self.decl(id).kind {
            DeclKind::Record(r) => Some(r),
            DeclKind::ClassTemplateSpecialization(s) => Some(&s.record),
            _ => None,
        }
    }

    /// Whether the declaration is a record or enum (a tag declaration).
    pub fn is_tag(&self, id: DeclId) -> bool {
        self.as_record(id).is_some() || matches!(self.decl(id).kind, DeclKind::Enum(_))
    }

    /// Defining declaration of a forward-declared tag.
    pub fn tag_definition(&self, id: DeclId) -> Option<DeclId> {
        match &self.decl(id).kind {
            DeclKind::Record(r) if !r.is_definition() => r.definition,
            DeclKind::ClassTemplateSpecialization(s) if !s.record.is_definition() => {
                s.record.definition
            }
            DeclKind::Enum(e) if e.brace_end.is_none() => e.definition,
            _ => None,
        }
    }

    /// Declarations lexically nested in a declaration context.
    pub fn members(&self, id: DeclId) -> &[DeclId] {
        match &self.decl(id).kind {
            DeclKind::Namespace(ns) => &ns.children,
            DeclKind::Record(r) => &r.members,
            DeclKind::ClassTemplateSpecialization(s) => &s.record.members,
            DeclKind::Enum(e) => &e.constants,
            _ => &[],
        }
    }

    /// Using-directives grouped by the context they appear in.
    ///
    /// The `None` key holds the directives at translation-unit scope.
    pub fn using_directives(&self) -> BTreeMap<Option<DeclId>, Vec<DeclId>> {
        let mut by_context: BTreeMap<Option<DeclId>, Vec<DeclId>> = BTreeMap::new();
        for (index, decl) in self.decls.iter().enumerate() {
            if matches!(decl.kind, DeclKind::UsingDirective) {
                by_context
                    .entry(decl.context)
                    .or_default()
                    .push(DeclId::new(index));
            }
        }
        by_context
    }

    /// Top-level functions named `name`, all overloads.
    ///
    /// A function template resolves to its templated function.
    pub fn lookup_functions(&self, name: &str) -> Vec<DeclId> {
        self.top_level
            .iter()
            .filter(|&&id| self.decl(id).name.as_deref() == Some(name))
            .filter_map(|&id| match &self.decl(id).kind {
                DeclKind::Function(_) => Some(id),
                DeclKind::FunctionTemplate(t) => {
                    self.as_function(t.templated).map(|_| t.templated)
                }
                _ => None,
            })
            .collect()
    }
}
