//! Scope tree data model
//!
//! The analysis result is an arena of scopes, variables, and references
//! linked by `u32` newtype ids:
//! - [`Scope`] - one lexical region with its name → [`Variable`] table
//! - [`Variable`] - one bound name with its [`Definition`]s and the
//!   references that resolved to it
//! - [`Reference`] - one read/write use of a name, resolved or pending
//!   fallback resolution by the host

use std::collections::HashMap;

use bitflags::bitflags;

use crate::ast::{Expr, Ident, NodeId};

/// Unique identifier for a scope within one analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

impl ScopeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Unique identifier for a variable within one analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariableId(pub u32);

impl VariableId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Unique identifier for a reference within one analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReferenceId(pub u32);

impl ReferenceId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// The kind of lexical region a scope covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Module,
    Function,
    Block,
    Class,
    /// Present for API completeness only: CoffeeScript catch parameters
    /// bind into the enclosing scope, so the analyzer never creates one.
    Catch,
    Switch,
    With,
    For,
}

impl ScopeKind {
    /// `true` for scopes that own hoisted bindings (the "variable scope"
    /// of everything nested inside them).
    pub fn is_variable_scope(self) -> bool {
        matches!(
            self,
            ScopeKind::Global | ScopeKind::Module | ScopeKind::Function
        )
    }
}

/// A node in the lexical scope tree.
#[derive(Debug)]
pub struct Scope {
    pub id: ScopeId,
    pub kind: ScopeKind,
    /// The syntax-tree node that introduced this scope.
    pub block: NodeId,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    /// Nearest enclosing global/module/function scope (self for those
    /// kinds). Hoisting-like binding placement targets this scope.
    pub variable_scope: ScopeId,
    /// Names bound directly in this scope.
    pub variables: HashMap<String, VariableId>,
    /// References recorded in this scope, in visit order.
    pub references: Vec<ReferenceId>,
    /// References that passed through this scope unresolved.
    pub through: Vec<ReferenceId>,
    /// `with` scopes and scopes tainted by a direct `eval` call resolve
    /// nothing statically.
    pub dynamic: bool,
    pub direct_call_to_eval: bool,
    /// References awaiting resolution when the scope closes.
    pub(crate) pending: Vec<ReferenceId>,
}

impl Scope {
    pub(crate) fn new(
        id: ScopeId,
        kind: ScopeKind,
        block: NodeId,
        parent: Option<ScopeId>,
        variable_scope: ScopeId,
    ) -> Self {
        Self {
            id,
            kind,
            block,
            parent,
            children: Vec::new(),
            variable_scope,
            variables: HashMap::new(),
            references: Vec::new(),
            through: Vec::new(),
            dynamic: matches!(kind, ScopeKind::With),
            direct_call_to_eval: false,
            pending: Vec::new(),
        }
    }
}

/// Why a variable exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    /// Declaration via assignment (`x = 1` introducing `x`) or a loop
    /// binding.
    Variable,
    ClassName,
    Parameter,
    CatchClause,
    /// Created by the global scope's `iteration` fallback for an
    /// out-of-scope write.
    ImplicitGlobal,
}

/// One declaring occurrence of a variable.
#[derive(Debug, Clone, Copy)]
pub struct Definition<'ast> {
    pub kind: DefinitionKind,
    /// The declared identifier.
    pub name: &'ast Ident,
    /// The enclosing declaration node (assignment, class, function, loop).
    pub node: NodeId,
    /// `true` for a rest parameter (`args...`).
    pub rest: bool,
}

/// One bound name and everything known about it.
#[derive(Debug)]
pub struct Variable<'ast> {
    pub id: VariableId,
    pub name: String,
    /// The scope that owns this variable.
    pub scope: ScopeId,
    /// Declaring occurrences, in visit order. Redeclarations of the same
    /// name in the same scope append here instead of creating a second
    /// variable.
    pub defs: Vec<Definition<'ast>>,
    /// References that resolved to this variable, in resolution order.
    pub references: Vec<ReferenceId>,
}

bitflags! {
    /// Read/write direction of a [`Reference`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ReferenceFlags: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
    }
}

/// One use of a name.
#[derive(Debug)]
pub struct Reference<'ast> {
    pub id: ReferenceId,
    pub ident: &'ast Ident,
    /// The scope the reference was recorded in.
    pub scope: ScopeId,
    pub flags: ReferenceFlags,
    /// For writes: the exact syntactic right-hand side being assigned.
    pub write_expr: Option<&'ast Expr>,
    /// Write covers only part of the value (destructuring element, loop
    /// binding).
    pub partial: bool,
    /// Declaration-site write participating in variable-scope-level
    /// resolution (parameter defaults, loop bindings).
    pub init: bool,
    /// An unresolved write with this flag may become an implicit global
    /// under the `iteration` fallback.
    pub maybe_implicit_global: bool,
    pub resolved: Option<VariableId>,
}

impl Reference<'_> {
    pub fn is_read(&self) -> bool {
        self.flags.contains(ReferenceFlags::READ)
    }

    pub fn is_write(&self) -> bool {
        self.flags.contains(ReferenceFlags::WRITE)
    }

    pub fn is_read_only(&self) -> bool {
        self.flags == ReferenceFlags::READ
    }

    pub fn is_write_only(&self) -> bool {
        self.flags == ReferenceFlags::WRITE
    }

    pub fn is_read_write(&self) -> bool {
        self.flags == ReferenceFlags::READ | ReferenceFlags::WRITE
    }
}

/// The finalized result of one analysis pass. Read-only.
#[derive(Debug)]
pub struct ScopeAnalysis<'ast> {
    pub(crate) scopes: Vec<Scope>,
    pub(crate) variables: Vec<Variable<'ast>>,
    pub(crate) references: Vec<Reference<'ast>>,
    pub(crate) root: ScopeId,
    /// Scope-introducing node → innermost scope created for it.
    pub(crate) block_scopes: HashMap<NodeId, ScopeId>,
    /// Declaration identifier node → the variable it declares.
    pub(crate) ident_variables: HashMap<NodeId, VariableId>,
    /// Reference identifier node → the reference recorded for it.
    pub(crate) ident_references: HashMap<NodeId, ReferenceId>,
}

impl<'ast> ScopeAnalysis<'ast> {
    /// The root (global) scope.
    pub fn root(&self) -> ScopeId {
        self.root
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn variable(&self, id: VariableId) -> &Variable<'ast> {
        &self.variables[id.index()]
    }

    pub fn reference(&self, id: ReferenceId) -> &Reference<'ast> {
        &self.references[id.index()]
    }

    pub fn scopes(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.iter()
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable<'ast>> {
        self.variables.iter()
    }

    pub fn references(&self) -> impl Iterator<Item = &Reference<'ast>> {
        self.references.iter()
    }

    /// The innermost scope created for a scope-introducing node.
    pub fn scope_for(&self, block: NodeId) -> Option<&Scope> {
        self.block_scopes.get(&block).map(|&id| self.scope(id))
    }

    /// The variable declared by a declaration-flagged identifier node.
    pub fn variable_for_ident(&self, ident: NodeId) -> Option<&Variable<'ast>> {
        self.ident_variables.get(&ident).map(|&id| self.variable(id))
    }

    /// The reference recorded for an identifier node in use position.
    pub fn reference_for_ident(&self, ident: NodeId) -> Option<&Reference<'ast>> {
        self.ident_references
            .get(&ident)
            .map(|&id| self.reference(id))
    }

    /// Walks a scope and its ancestors, innermost first.
    pub fn ancestors(&self, scope: ScopeId) -> impl Iterator<Item = &Scope> {
        std::iter::successors(Some(self.scope(scope)), |s| {
            s.parent.map(|p| self.scope(p))
        })
    }

    /// Looks a name up from a scope, walking the scope chain.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&Variable<'ast>> {
        self.ancestors(scope)
            .find_map(|s| s.variables.get(name))
            .map(|&id| self.variable(id))
    }

    /// References that never resolved to any variable; expected for
    /// ambient/global names; the host resolves them lazily.
    pub fn unresolved(&self) -> impl Iterator<Item = &Reference<'ast>> {
        self.scope(self.root)
            .through
            .iter()
            .filter(|&&id| self.reference(id).resolved.is_none())
            .map(|&id| self.reference(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_scope_kinds() {
        assert!(ScopeKind::Global.is_variable_scope());
        assert!(ScopeKind::Module.is_variable_scope());
        assert!(ScopeKind::Function.is_variable_scope());
        assert!(!ScopeKind::Block.is_variable_scope());
        assert!(!ScopeKind::Class.is_variable_scope());
        assert!(!ScopeKind::Catch.is_variable_scope());
        assert!(!ScopeKind::Switch.is_variable_scope());
        assert!(!ScopeKind::With.is_variable_scope());
        assert!(!ScopeKind::For.is_variable_scope());
    }

    #[test]
    fn test_with_scopes_start_dynamic() {
        let with = Scope::new(ScopeId(1), ScopeKind::With, NodeId(0), Some(ScopeId(0)), ScopeId(0));
        assert!(with.dynamic);
        let block = Scope::new(ScopeId(2), ScopeKind::Block, NodeId(1), Some(ScopeId(0)), ScopeId(0));
        assert!(!block.dynamic);
    }

    #[test]
    fn test_reference_flag_queries() {
        let ident = Ident::new(NodeId(0), "x", Default::default());
        let mut r = Reference {
            id: ReferenceId(0),
            ident: &ident,
            scope: ScopeId(0),
            flags: ReferenceFlags::READ,
            write_expr: None,
            partial: false,
            init: false,
            maybe_implicit_global: false,
            resolved: None,
        };
        assert!(r.is_read() && r.is_read_only() && !r.is_write());

        r.flags = ReferenceFlags::READ | ReferenceFlags::WRITE;
        assert!(r.is_read_write() && r.is_read() && r.is_write());
        assert!(!r.is_read_only() && !r.is_write_only());
    }
}
