//! Scope manager - owns the scope arenas and the current-scope stack
//!
//! One manager serves exactly one traversal: the referencer pushes and
//! pops scopes and records definitions/references, then [`ScopeManager::finalize`]
//! consumes the manager and hands the read-only [`ScopeAnalysis`] back.
//! Reuse after `finalize` is a compile error (the manager is moved).
//!
//! Reference resolution happens incrementally: when a scope is exited it
//! is *closed*: every reference pending in it either binds to a variable
//! of that scope or propagates to the parent's pending list. The global
//! scope closes last, applying the configured unresolved-write fallback.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::trace;

use crate::ast::{Expr, Ident, NodeId, SourceType};
use crate::{Error, Result};

use super::tree::{
    Definition, DefinitionKind, Reference, ReferenceFlags, ReferenceId, Scope, ScopeAnalysis,
    ScopeId, ScopeKind, Variable, VariableId,
};

/// Policy for writes that resolve to no variable in any enclosing scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Fallback {
    /// Bind them as implicit globals on the root scope.
    #[default]
    Iteration,
    /// Leave them in the root scope's `through` list for the host to
    /// resolve against its own ambient-name table.
    DomainSpecific,
}

/// Parser/host configuration for one analysis pass.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyzeOptions {
    pub fallback: Fallback,
    /// Source mode the host was configured with. During analysis the
    /// program's own `source_type` wins; the parser stamps it on the
    /// tree, and the tree knows best what it was parsed as.
    pub source_type: SourceType,
    /// Language-version tag; either an edition number (6..) or a year
    /// (2015..). Block and module scopes require ES2015.
    pub ecma_version: u32,
    /// Suppress the direct-`eval` special case. The CoffeeScript host
    /// enables this: `eval` is rare and the taint it spreads disables
    /// resolution for whole scope chains.
    pub ignore_eval: bool,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            fallback: Fallback::Iteration,
            source_type: SourceType::Script,
            ecma_version: 2018,
            ignore_eval: true,
        }
    }
}

impl AnalyzeOptions {
    pub fn is_es6(&self) -> bool {
        self.ecma_version >= 2015 || (6..=13).contains(&self.ecma_version)
    }
}

/// Owns the scope tree while it is being built.
#[derive(Debug)]
pub struct ScopeManager<'ast> {
    options: AnalyzeOptions,
    scopes: Vec<Scope>,
    variables: Vec<Variable<'ast>>,
    references: Vec<Reference<'ast>>,
    stack: Vec<ScopeId>,
    block_scopes: HashMap<NodeId, ScopeId>,
    ident_variables: HashMap<NodeId, VariableId>,
    ident_references: HashMap<NodeId, ReferenceId>,
}

impl<'ast> ScopeManager<'ast> {
    pub fn new(options: AnalyzeOptions) -> Self {
        Self {
            options,
            scopes: Vec::new(),
            variables: Vec::new(),
            references: Vec::new(),
            stack: Vec::new(),
            block_scopes: HashMap::new(),
            ident_variables: HashMap::new(),
            ident_references: HashMap::new(),
        }
    }

    pub fn options(&self) -> &AnalyzeOptions {
        &self.options
    }

    pub fn current(&self) -> Option<ScopeId> {
        self.stack.last().copied()
    }

    /// The innermost open scope.
    pub fn current_scope(&self) -> ScopeId {
        self.current()
            .expect("scope stack is never empty during traversal")
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    /// The nearest enclosing variable scope of the current scope.
    pub fn current_variable_scope(&self) -> ScopeId {
        self.scope(self.current_scope()).variable_scope
    }

    /// Pushes a new scope of `kind` for `block` and makes it current.
    ///
    /// CoffeeScript override: `Catch` pushes nothing and returns the
    /// current scope unchanged: the caught-exception name binds into
    /// the enclosing scope, and the caller skips the matching
    /// [`ScopeManager::exit_scope`].
    pub fn enter_scope(&mut self, kind: ScopeKind, block: NodeId) -> ScopeId {
        if kind == ScopeKind::Catch {
            let current = self.current_scope();
            trace!(?current, "catch clause: keeping current scope");
            return current;
        }

        let id = ScopeId(self.scopes.len() as u32);
        let parent = self.stack.last().copied();
        let variable_scope = if kind.is_variable_scope() {
            id
        } else {
            match parent {
                Some(p) => self.scopes[p.index()].variable_scope,
                None => id,
            }
        };
        self.scopes
            .push(Scope::new(id, kind, block, parent, variable_scope));
        if let Some(p) = parent {
            self.scopes[p.index()].children.push(id);
        }
        self.block_scopes.insert(block, id);
        self.stack.push(id);
        trace!(?id, ?kind, "entered scope");
        id
    }

    /// Closes and pops the current scope, restoring its parent.
    pub fn exit_scope(&mut self) -> Result<ScopeId> {
        let id = self.stack.pop().ok_or(Error::ScopeUnderflow)?;
        self.close(id);
        trace!(?id, "exited scope");
        Ok(id)
    }

    /// Binds `name` in `scope`, creating the variable on first binding
    /// and appending a definition on redeclaration.
    pub(crate) fn define(
        &mut self,
        scope: ScopeId,
        name: &'ast Ident,
        kind: DefinitionKind,
        node: NodeId,
        rest: bool,
    ) -> VariableId {
        let def = Definition {
            kind,
            name,
            node,
            rest,
        };
        let id = match self.scopes[scope.index()].variables.get(name.name.as_str()) {
            Some(&existing) => {
                self.variables[existing.index()].defs.push(def);
                existing
            }
            None => {
                let id = VariableId(self.variables.len() as u32);
                self.variables.push(Variable {
                    id,
                    name: name.name.clone(),
                    scope,
                    defs: vec![def],
                    references: Vec::new(),
                });
                self.scopes[scope.index()]
                    .variables
                    .insert(name.name.clone(), id);
                id
            }
        };
        self.ident_variables.insert(name.id, id);
        trace!(name = %name.name, ?scope, ?kind, "defined variable");
        id
    }

    /// Records a use of `ident` in the current scope, pending resolution
    /// at scope close.
    pub(crate) fn referencing(
        &mut self,
        ident: &'ast Ident,
        flags: ReferenceFlags,
        write_expr: Option<&'ast Expr>,
        partial: bool,
        init: bool,
        maybe_implicit_global: bool,
    ) -> ReferenceId {
        let scope = self.current_scope();
        let id = ReferenceId(self.references.len() as u32);
        self.references.push(Reference {
            id,
            ident,
            scope,
            flags,
            write_expr,
            partial,
            init,
            maybe_implicit_global,
            resolved: None,
        });
        let s = &mut self.scopes[scope.index()];
        s.references.push(id);
        s.pending.push(id);
        self.ident_references.insert(ident.id, id);
        trace!(name = %ident.name, ?scope, ?flags, "recorded reference");
        id
    }

    /// Marks the current variable scope as containing a direct `eval`
    /// call; it and every ancestor become dynamic (statically
    /// unresolvable).
    pub(crate) fn detect_eval(&mut self) {
        let vs = self.current_variable_scope();
        self.scopes[vs.index()].direct_call_to_eval = true;
        let mut cur = Some(vs);
        while let Some(s) = cur {
            self.scopes[s.index()].dynamic = true;
            cur = self.scopes[s.index()].parent;
        }
    }

    /// Consumes the manager and returns the finished, read-only tree.
    pub fn finalize(self) -> Result<ScopeAnalysis<'ast>> {
        if !self.stack.is_empty() {
            return Err(Error::UnbalancedTraversal(self.stack.len()));
        }
        if self.scopes.is_empty() {
            return Err(Error::MalformedNode(
                "no scopes were created; the traversal never ran".into(),
            ));
        }
        Ok(ScopeAnalysis {
            scopes: self.scopes,
            variables: self.variables,
            references: self.references,
            root: ScopeId(0),
            block_scopes: self.block_scopes,
            ident_variables: self.ident_variables,
            ident_references: self.ident_references,
        })
    }

    // ── Reference resolution at scope close ──────────────────────────

    fn close(&mut self, id: ScopeId) {
        let pending = std::mem::take(&mut self.scopes[id.index()].pending);
        let scope = &self.scopes[id.index()];
        match (scope.kind == ScopeKind::Global, scope.dynamic) {
            (true, false) => self.close_global(id, pending),
            // A global tainted by direct eval still materializes implicit
            // globals from unresolved writes, but resolves nothing.
            (true, true) => {
                self.materialize_implicit_globals(id, &pending);
                self.close_dynamic(id, pending);
            }
            (false, true) => self.close_dynamic(id, pending),
            (false, false) => self.close_static(id, pending),
        }
    }

    /// `iteration`-fallback half of the global close, usable on its own
    /// when the global is dynamic: unresolved maybe-implicit-global
    /// writes get an `ImplicitGlobal` variable, nothing is bound.
    fn materialize_implicit_globals(&mut self, id: ScopeId, pending: &[ReferenceId]) {
        if self.options.fallback != Fallback::Iteration {
            return;
        }
        for &ref_id in pending {
            let (implicit, ident) = {
                let r = &self.references[ref_id.index()];
                (r.maybe_implicit_global && r.is_write(), r.ident)
            };
            if implicit
                && !self.scopes[id.index()]
                    .variables
                    .contains_key(ident.name.as_str())
            {
                self.define(id, ident, DefinitionKind::ImplicitGlobal, ident.id, false);
            }
        }
    }

    /// Resolve against this scope's own table; misses go through to the
    /// parent's pending list.
    fn close_static(&mut self, id: ScopeId, pending: Vec<ReferenceId>) {
        for ref_id in pending {
            let ident = self.references[ref_id.index()].ident;
            match self.scopes[id.index()]
                .variables
                .get(ident.name.as_str())
                .copied()
            {
                Some(var) => self.bind(ref_id, var),
                None => {
                    self.scopes[id.index()].through.push(ref_id);
                    if let Some(parent) = self.scopes[id.index()].parent {
                        self.scopes[parent.index()].pending.push(ref_id);
                    }
                }
            }
        }
    }

    /// `with` bodies and eval-tainted scopes resolve nothing; every
    /// pending reference stays unresolved and is recorded as passing
    /// through this scope and all its ancestors.
    fn close_dynamic(&mut self, id: ScopeId, pending: Vec<ReferenceId>) {
        for ref_id in pending {
            let mut cur = Some(id);
            while let Some(s) = cur {
                self.scopes[s.index()].through.push(ref_id);
                cur = self.scopes[s.index()].parent;
            }
        }
    }

    /// The root closes last: names in its table resolve statically;
    /// unresolved writes become implicit globals under the `iteration`
    /// fallback; everything else stays in `through` for the host.
    fn close_global(&mut self, id: ScopeId, pending: Vec<ReferenceId>) {
        for ref_id in pending {
            let ident = self.references[ref_id.index()].ident;
            if let Some(&var) = self.scopes[id.index()].variables.get(ident.name.as_str()) {
                self.bind(ref_id, var);
                continue;
            }
            let r = &self.references[ref_id.index()];
            if r.maybe_implicit_global
                && r.is_write()
                && self.options.fallback == Fallback::Iteration
            {
                let var = self.define(id, ident, DefinitionKind::ImplicitGlobal, ident.id, false);
                self.bind(ref_id, var);
            } else {
                self.scopes[id.index()].through.push(ref_id);
            }
        }
    }

    fn bind(&mut self, r: ReferenceId, v: VariableId) {
        self.references[r.index()].resolved = Some(v);
        self.variables[v.index()].references.push(r);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SourceLocation;

    fn ident(id: u32, name: &str) -> Ident {
        Ident::new(NodeId(id), name, SourceLocation::default())
    }

    fn decl_ident(id: u32, name: &str) -> Ident {
        Ident::declaration(NodeId(id), name, SourceLocation::default())
    }

    #[test]
    fn test_enter_exit_restores_parent() {
        let mut mgr = ScopeManager::new(AnalyzeOptions::default());
        let global = mgr.enter_scope(ScopeKind::Global, NodeId(0));
        let func = mgr.enter_scope(ScopeKind::Function, NodeId(1));
        assert_eq!(mgr.current_scope(), func);
        assert_eq!(mgr.scope(func).parent, Some(global));
        assert_eq!(mgr.exit_scope().unwrap(), func);
        assert_eq!(mgr.current_scope(), global);
        assert_eq!(mgr.scope(global).children, vec![func]);
    }

    #[test]
    fn test_catch_does_not_push_a_scope() {
        let mut mgr = ScopeManager::new(AnalyzeOptions::default());
        let global = mgr.enter_scope(ScopeKind::Global, NodeId(0));
        let func = mgr.enter_scope(ScopeKind::Function, NodeId(1));
        let caught = mgr.enter_scope(ScopeKind::Catch, NodeId(2));
        assert_eq!(caught, func);
        assert_eq!(mgr.current_scope(), func);
        // No matching exit for the catch; the pairing stays balanced.
        mgr.exit_scope().unwrap();
        assert_eq!(mgr.current_scope(), global);
    }

    #[test]
    fn test_exit_with_no_scope_is_underflow() {
        let mut mgr: ScopeManager = ScopeManager::new(AnalyzeOptions::default());
        assert!(matches!(mgr.exit_scope(), Err(Error::ScopeUnderflow)));
    }

    #[test]
    fn test_finalize_rejects_open_scopes() {
        let mut mgr: ScopeManager = ScopeManager::new(AnalyzeOptions::default());
        mgr.enter_scope(ScopeKind::Global, NodeId(0));
        assert!(matches!(
            mgr.finalize(),
            Err(Error::UnbalancedTraversal(1))
        ));
    }

    #[test]
    fn test_variable_scope_pointer_skips_blocks() {
        let mut mgr: ScopeManager = ScopeManager::new(AnalyzeOptions::default());
        let global = mgr.enter_scope(ScopeKind::Global, NodeId(0));
        let func = mgr.enter_scope(ScopeKind::Function, NodeId(1));
        let block = mgr.enter_scope(ScopeKind::Block, NodeId(2));
        let class = mgr.enter_scope(ScopeKind::Class, NodeId(3));
        assert_eq!(mgr.scope(class).variable_scope, func);
        assert_eq!(mgr.scope(block).variable_scope, func);
        assert_eq!(mgr.scope(func).variable_scope, func);
        assert_eq!(mgr.scope(global).variable_scope, global);
    }

    #[test]
    fn test_redeclaration_appends_definition() {
        let first = decl_ident(1, "x");
        let second = decl_ident(2, "x");
        let mut mgr = ScopeManager::new(AnalyzeOptions::default());
        let global = mgr.enter_scope(ScopeKind::Global, NodeId(0));
        let v1 = mgr.define(global, &first, DefinitionKind::Variable, NodeId(10), false);
        let v2 = mgr.define(global, &second, DefinitionKind::Variable, NodeId(11), false);
        assert_eq!(v1, v2);
        mgr.exit_scope().unwrap();
        let analysis = mgr.finalize().unwrap();
        let var = analysis.variable(v1);
        assert_eq!(var.defs.len(), 2);
        assert_eq!(var.name, "x");
    }

    #[test]
    fn test_unresolved_write_becomes_implicit_global_under_iteration() {
        let target = ident(1, "ghost");
        let mut mgr = ScopeManager::new(AnalyzeOptions::default());
        mgr.enter_scope(ScopeKind::Global, NodeId(0));
        mgr.referencing(&target, ReferenceFlags::WRITE, None, false, false, true);
        mgr.exit_scope().unwrap();
        let analysis = mgr.finalize().unwrap();
        let var = analysis
            .lookup(analysis.root(), "ghost")
            .expect("implicit global should exist");
        assert_eq!(var.defs[0].kind, DefinitionKind::ImplicitGlobal);
        assert_eq!(var.references.len(), 1);
        assert_eq!(analysis.unresolved().count(), 0);
    }

    #[test]
    fn test_unresolved_write_stays_through_under_domain_specific() {
        let target = ident(1, "ghost");
        let options = AnalyzeOptions {
            fallback: Fallback::DomainSpecific,
            ..Default::default()
        };
        let mut mgr = ScopeManager::new(options);
        mgr.enter_scope(ScopeKind::Global, NodeId(0));
        mgr.referencing(&target, ReferenceFlags::WRITE, None, false, false, true);
        mgr.exit_scope().unwrap();
        let analysis = mgr.finalize().unwrap();
        assert!(analysis.lookup(analysis.root(), "ghost").is_none());
        assert_eq!(analysis.unresolved().count(), 1);
    }

    #[test]
    fn test_eval_tainted_global_resolves_nothing() {
        let def = decl_ident(1, "x");
        let use_x = ident(2, "x");
        let ghost = ident(3, "ghost");
        let options = AnalyzeOptions {
            ignore_eval: false,
            ..Default::default()
        };
        let mut mgr = ScopeManager::new(options);
        let global = mgr.enter_scope(ScopeKind::Global, NodeId(0));
        mgr.define(global, &def, DefinitionKind::Variable, NodeId(10), false);
        mgr.detect_eval();
        mgr.referencing(&use_x, ReferenceFlags::READ, None, false, false, false);
        mgr.referencing(&ghost, ReferenceFlags::WRITE, None, false, false, true);
        mgr.exit_scope().unwrap();
        let analysis = mgr.finalize().unwrap();

        // The implicit global still materializes under the iteration
        // fallback, but no reference binds statically.
        let ghost_var = analysis.lookup(analysis.root(), "ghost").unwrap();
        assert_eq!(ghost_var.defs[0].kind, DefinitionKind::ImplicitGlobal);
        assert!(ghost_var.references.is_empty());
        let read = analysis.reference_for_ident(NodeId(2)).unwrap();
        assert!(read.resolved.is_none());
        let write = analysis.reference_for_ident(NodeId(3)).unwrap();
        assert!(write.resolved.is_none());
        assert_eq!(analysis.unresolved().count(), 2);
    }

    #[test]
    fn test_reads_propagate_to_enclosing_scope_tables() {
        let def = decl_ident(1, "x");
        let use_x = ident(2, "x");
        let mut mgr = ScopeManager::new(AnalyzeOptions::default());
        let global = mgr.enter_scope(ScopeKind::Global, NodeId(0));
        mgr.define(global, &def, DefinitionKind::Variable, NodeId(10), false);
        mgr.enter_scope(ScopeKind::Function, NodeId(1));
        mgr.referencing(&use_x, ReferenceFlags::READ, None, false, false, false);
        mgr.exit_scope().unwrap();
        mgr.exit_scope().unwrap();
        let analysis = mgr.finalize().unwrap();
        let var = analysis.lookup(analysis.root(), "x").unwrap();
        assert_eq!(var.references.len(), 1);
        let r = analysis.reference(var.references[0]);
        assert_eq!(r.resolved, Some(var.id));
        // The function scope recorded the miss as a through reference.
        let func = analysis.scope_for(NodeId(1)).unwrap();
        assert_eq!(func.through.len(), 1);
    }

    #[test]
    fn test_default_options_match_host_defaults() {
        let options = AnalyzeOptions::default();
        assert_eq!(options.fallback, Fallback::Iteration);
        assert_eq!(options.source_type, SourceType::Script);
        assert_eq!(options.ecma_version, 2018);
        assert!(options.ignore_eval);
        assert!(options.is_es6());
    }

    #[test]
    fn test_es6_accepts_edition_and_year_tags() {
        let mut options = AnalyzeOptions::default();
        for version in [6, 13, 2015, 2022] {
            options.ecma_version = version;
            assert!(options.is_es6(), "version {version} should be ES2015+");
        }
        options.ecma_version = 5;
        assert!(!options.is_es6());
    }
}
