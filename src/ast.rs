//! Syntax tree shapes produced by the upstream CoffeeScript parser.
//!
//! This crate does not parse source text. The parser hands over an owned
//! tree of these nodes, and the scope analyzer walks it read-only. The
//! contract the parser must honor:
//!
//! - Every [`Ident`] that is a declaration site carries `declaration: true`
//!   (CoffeeScript has no declaration keywords, so the parser marks the
//!   first binding occurrence of each name).
//! - CoffeeScript-only constructs keep their dedicated shapes: the unary
//!   `do` operator, [`For`] with `name`/`index`/`source` fields,
//!   [`ClassMember::Property`] vs [`ClassMember::PrototypeProperty`], and
//!   optional member/call expressions flagged via `optional`.
//! - Scope-introducing nodes and identifiers carry a [`NodeId`] unique
//!   within one tree, used for side-table lookups on the analysis result.

use serde::{Deserialize, Serialize};

/// Identity of one syntax-tree node within a single tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// Hands out fresh [`NodeId`]s while a tree is being built.
#[derive(Debug, Default)]
pub struct NodeIdGen {
    next: u32,
}

impl NodeIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

/// Line/column position of a token in the original source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Whether the program is a classic script or an ES module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[default]
    Script,
    Module,
}

/// Root of a parsed program.
#[derive(Debug)]
pub struct Program {
    pub id: NodeId,
    pub source_type: SourceType,
    pub body: Vec<Stmt>,
}

/// Statement-position nodes.
#[derive(Debug)]
pub enum Stmt {
    Expr(Expr),
    Block(BlockStmt),
    If(Box<IfStmt>),
    While(Box<WhileStmt>),
    For(Box<For>),
    Try(Box<TryStmt>),
    Switch(Box<SwitchStmt>),
    With(Box<WithStmt>),
    Return(Option<Expr>),
    Throw(Expr),
}

#[derive(Debug)]
pub struct BlockStmt {
    pub id: NodeId,
    pub body: Vec<Stmt>,
}

#[derive(Debug)]
pub struct IfStmt {
    pub test: Expr,
    pub consequent: Stmt,
    pub alternate: Option<Stmt>,
}

#[derive(Debug)]
pub struct WhileStmt {
    pub test: Expr,
    pub body: BlockStmt,
}

/// CoffeeScript `for` loop (comprehension or statement, prefix or postfix).
///
/// `for x, i in xs` binds `name = x` and `index = i`; `for k, v of obj`
/// binds key and value the same way. Either binding may alias an existing
/// outer variable instead of declaring a new one; the parser's
/// `declaration` flag on the pattern identifiers tells the two apart.
#[derive(Debug)]
pub struct For {
    pub id: NodeId,
    pub name: Option<Pattern>,
    pub index: Option<Pattern>,
    pub source: Expr,
    pub guard: Option<Expr>,
    pub step: Option<Expr>,
    /// `for own k of obj`
    pub own: bool,
    pub postfix: bool,
    pub body: BlockStmt,
}

#[derive(Debug)]
pub struct TryStmt {
    pub block: BlockStmt,
    pub handler: Option<CatchClause>,
    pub finalizer: Option<BlockStmt>,
}

#[derive(Debug)]
pub struct CatchClause {
    pub id: NodeId,
    pub param: Option<Pattern>,
    pub body: BlockStmt,
}

#[derive(Debug)]
pub struct SwitchStmt {
    pub id: NodeId,
    pub discriminant: Expr,
    pub cases: Vec<SwitchCase>,
}

#[derive(Debug)]
pub struct SwitchCase {
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug)]
pub struct WithStmt {
    pub id: NodeId,
    pub object: Expr,
    pub body: BlockStmt,
}

/// One identifier occurrence.
#[derive(Debug)]
pub struct Ident {
    pub id: NodeId,
    pub name: String,
    /// `true` when the parser flagged this occurrence as a declaration
    /// site rather than a use of an existing binding.
    pub declaration: bool,
    pub loc: SourceLocation,
}

impl Ident {
    pub fn new(id: NodeId, name: impl Into<String>, loc: SourceLocation) -> Self {
        Self {
            id,
            name: name.into(),
            declaration: false,
            loc,
        }
    }

    /// Same as [`Ident::new`] but flagged as a declaration site.
    pub fn declaration(id: NodeId, name: impl Into<String>, loc: SourceLocation) -> Self {
        Self {
            id,
            name: name.into(),
            declaration: true,
            loc,
        }
    }
}

/// Expression-position nodes.
#[derive(Debug)]
pub enum Expr {
    Identifier(Ident),
    This,
    Literal(Literal),
    /// Interpolated string; holds the interpolation expressions.
    Template(Vec<Expr>),
    Array(Vec<Expr>),
    Object(Vec<Property>),
    Sequence(Vec<Expr>),
    Unary(Box<UnaryExpr>),
    Binary(Box<BinaryExpr>),
    Assignment(Box<AssignmentExpr>),
    Update(Box<UpdateExpr>),
    Conditional(Box<ConditionalExpr>),
    Call(Box<CallExpr>),
    Member(Box<MemberExpr>),
    Function(Box<Function>),
    Class(Box<ClassDef>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Bool(bool),
    Regex(String),
    Null,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// CoffeeScript `do` - immediately invokes its function operand.
    Do,
    Not,
    Minus,
    Plus,
    TypeOf,
    Delete,
    New,
}

#[derive(Debug)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub argument: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    Lt,
    Gt,
    Lte,
    Gte,
    And,
    Or,
    Nullish,
    In,
    Of,
    InstanceOf,
}

#[derive(Debug)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub left: Expr,
    pub right: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Or,
    And,
    Nullish,
}

#[derive(Debug)]
pub struct AssignmentExpr {
    pub id: NodeId,
    pub op: AssignmentOp,
    pub left: Pattern,
    pub right: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Debug)]
pub struct UpdateExpr {
    pub op: UpdateOp,
    pub prefix: bool,
    pub argument: Expr,
}

#[derive(Debug)]
pub struct ConditionalExpr {
    pub test: Expr,
    pub consequent: Expr,
    pub alternate: Expr,
}

#[derive(Debug)]
pub struct CallExpr {
    pub id: NodeId,
    pub callee: Expr,
    pub arguments: Vec<Expr>,
    /// `a?()` - soak call. Scoping treats it like a plain call.
    pub optional: bool,
}

#[derive(Debug)]
pub struct MemberExpr {
    pub object: Expr,
    pub property: Expr,
    pub computed: bool,
    /// `a?.b` - soak access. Scoping treats it like a plain access.
    pub optional: bool,
}

/// Function expression. CoffeeScript functions are anonymous; `bound`
/// distinguishes `=>` from `->`.
#[derive(Debug)]
pub struct Function {
    pub id: NodeId,
    pub params: Vec<Pattern>,
    pub bound: bool,
    pub body: BlockStmt,
}

/// Class definition, usable in statement or expression position.
#[derive(Debug)]
pub struct ClassDef {
    pub id: NodeId,
    pub name: Option<Ident>,
    pub superclass: Option<Expr>,
    pub body: Vec<ClassMember>,
}

/// Class body members. Static (`@name: …`) and prototype (`name: …`)
/// properties keep distinct tags, but scope analysis visits both through
/// the same property path.
#[derive(Debug)]
pub enum ClassMember {
    Property(ClassProperty),
    PrototypeProperty(ClassProperty),
}

impl ClassMember {
    pub fn property(&self) -> &ClassProperty {
        match self {
            ClassMember::Property(p) | ClassMember::PrototypeProperty(p) => p,
        }
    }
}

#[derive(Debug)]
pub struct ClassProperty {
    pub key: Expr,
    pub computed: bool,
    pub value: Option<Expr>,
}

/// Object literal entry.
#[derive(Debug)]
pub struct Property {
    pub key: Expr,
    pub value: Expr,
    pub computed: bool,
}

/// Binding patterns and assignment targets.
#[derive(Debug)]
pub enum Pattern {
    Identifier(Ident),
    /// `[a, , b]` - holes are `None`.
    Array(Vec<Option<Pattern>>),
    Object(Vec<ObjectPatternItem>),
    /// `x = default` inside a destructuring pattern or parameter list.
    Assignment(Box<AssignmentPattern>),
    /// `args...`
    Rest(Box<Pattern>),
    /// Member assignment target (`a.b = …`, `@x = …`). Introduces no
    /// binding; its sub-expressions are read references.
    Member(Box<MemberExpr>),
}

#[derive(Debug)]
pub enum ObjectPatternItem {
    KeyValue(PatternProperty),
    Rest(Pattern),
}

#[derive(Debug)]
pub struct PatternProperty {
    pub key: Expr,
    pub value: Pattern,
    pub computed: bool,
}

#[derive(Debug)]
pub struct AssignmentPattern {
    pub left: Pattern,
    pub right: Expr,
}
