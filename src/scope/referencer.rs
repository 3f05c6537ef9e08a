//! Scope builder - single depth-first pass over the syntax tree
//!
//! One handler per node kind, explicit recursion: each handler visits its
//! own children, so every construct controls exactly what counts as a
//! declaration, a read, or a write. The CoffeeScript rules are layered
//! over the generic ECMAScript walk:
//!
//! - catch parameters bind into the enclosing scope (no catch scope)
//! - `do (x) -> …` marks its non-defaulted parameters as reads of the
//!   outer variables they capture
//! - `x = 1` with a declaration-flagged `x` binds into the nearest
//!   variable scope before the write is recorded
//! - `for x in xs` both defines the loop variable and records a partial
//!   init write from the loop source
//! - optional member/call expressions scope exactly like plain ones
//! - class names bind twice: once in the enclosing scope before the
//!   superclass expression is visited, and again inside the class scope
//!   so static members can self-reference

use tracing::debug;

use crate::ast::{
    AssignmentExpr, AssignmentOp, BlockStmt, CallExpr, CatchClause, ClassDef, Expr, For, Function,
    Ident, Pattern, Program, SourceType, Stmt, SwitchStmt, TryStmt, UnaryOp, UpdateExpr, WithStmt,
};
use crate::{Error, Result};

use super::manager::{AnalyzeOptions, ScopeManager};
use super::pattern::collect_pattern;
use super::tree::{DefinitionKind, ReferenceFlags, ScopeAnalysis, ScopeKind};

/// Analyzes `program` and returns the finished scope tree.
///
/// The tree is walked exactly once; the manager is constructed fresh and
/// consumed, so a second analysis of the same tree starts from nothing.
pub fn analyze<'ast>(
    program: &'ast Program,
    options: &AnalyzeOptions,
) -> Result<ScopeAnalysis<'ast>> {
    debug!(?options, "analyzing program scopes");
    let mut manager = ScopeManager::new(options.clone());
    {
        let mut referencer = Referencer::new(&mut manager);
        referencer.visit_program(program)?;
    }
    manager.finalize()
}

/// Transient visitor driving one traversal. Holds no state beyond the
/// borrowed manager; per-construct context (like the do-IIFE marker)
/// travels as call arguments, never as tree annotations.
pub struct Referencer<'mgr, 'ast> {
    mgr: &'mgr mut ScopeManager<'ast>,
}

impl<'mgr, 'ast> Referencer<'mgr, 'ast> {
    pub fn new(mgr: &'mgr mut ScopeManager<'ast>) -> Self {
        Self { mgr }
    }

    pub fn visit_program(&mut self, program: &'ast Program) -> Result<()> {
        self.mgr.enter_scope(ScopeKind::Global, program.id);
        // The parser stamps the program's source type; it is authoritative
        // over whatever the host configuration says.
        let module =
            program.source_type == SourceType::Module && self.mgr.options().is_es6();
        if module {
            self.mgr.enter_scope(ScopeKind::Module, program.id);
        }
        self.visit_stmts(&program.body)?;
        if module {
            self.mgr.exit_scope()?;
        }
        self.mgr.exit_scope()?;
        Ok(())
    }

    // ── Statements ───────────────────────────────────────────────────

    fn visit_stmts(&mut self, stmts: &'ast [Stmt]) -> Result<()> {
        for stmt in stmts {
            self.visit_stmt(stmt)?;
        }
        Ok(())
    }

    fn visit_stmt(&mut self, stmt: &'ast Stmt) -> Result<()> {
        match stmt {
            Stmt::Expr(e) => self.visit_expr(e),
            Stmt::Block(b) => self.visit_block(b),
            Stmt::If(s) => {
                self.visit_expr(&s.test)?;
                self.visit_stmt(&s.consequent)?;
                if let Some(alternate) = &s.alternate {
                    self.visit_stmt(alternate)?;
                }
                Ok(())
            }
            Stmt::While(s) => {
                self.visit_expr(&s.test)?;
                self.visit_block(&s.body)
            }
            Stmt::For(f) => self.visit_for(f),
            Stmt::Try(t) => self.visit_try(t),
            Stmt::Switch(s) => self.visit_switch(s),
            Stmt::With(w) => self.visit_with(w),
            Stmt::Return(e) => {
                if let Some(e) = e {
                    self.visit_expr(e)?;
                }
                Ok(())
            }
            Stmt::Throw(e) => self.visit_expr(e),
        }
    }

    fn visit_block(&mut self, block: &'ast BlockStmt) -> Result<()> {
        if self.mgr.options().is_es6() {
            self.mgr.enter_scope(ScopeKind::Block, block.id);
            self.visit_stmts(&block.body)?;
            self.mgr.exit_scope()?;
            Ok(())
        } else {
            self.visit_stmts(&block.body)
        }
    }

    fn visit_try(&mut self, t: &'ast TryStmt) -> Result<()> {
        self.visit_block(&t.block)?;
        if let Some(handler) = &t.handler {
            self.visit_catch(handler)?;
        }
        if let Some(finalizer) = &t.finalizer {
            self.visit_block(finalizer)?;
        }
        Ok(())
    }

    /// CoffeeScript catch clauses introduce no scope of their own: the
    /// caught name binds into the enclosing scope, and the handler body
    /// shares that scope too.
    fn visit_catch(&mut self, clause: &'ast CatchClause) -> Result<()> {
        let scope = self.mgr.enter_scope(ScopeKind::Catch, clause.id);
        if let Some(param) = &clause.param {
            let pb = collect_pattern(param);
            for &ident in &pb.identifiers {
                self.mgr
                    .define(scope, ident, DefinitionKind::CatchClause, clause.id, false);
            }
            for &(ident, default) in &pb.defaults {
                self.mgr.referencing(
                    ident,
                    ReferenceFlags::WRITE,
                    Some(default),
                    false,
                    true,
                    false,
                );
            }
            for &e in &pb.rhs_exprs {
                self.visit_expr(e)?;
            }
        }
        // No matching exit_scope: enter_scope pushed nothing for Catch.
        self.visit_stmts(&clause.body.body)
    }

    fn visit_switch(&mut self, s: &'ast SwitchStmt) -> Result<()> {
        self.visit_expr(&s.discriminant)?;
        let nested = self.mgr.options().is_es6();
        if nested {
            self.mgr.enter_scope(ScopeKind::Switch, s.id);
        }
        for case in &s.cases {
            if let Some(test) = &case.test {
                self.visit_expr(test)?;
            }
            self.visit_stmts(&case.body)?;
        }
        if nested {
            self.mgr.exit_scope()?;
        }
        Ok(())
    }

    fn visit_with(&mut self, w: &'ast WithStmt) -> Result<()> {
        self.visit_expr(&w.object)?;
        self.mgr.enter_scope(ScopeKind::With, w.id);
        self.visit_block(&w.body)?;
        self.mgr.exit_scope()?;
        Ok(())
    }

    // ── Expressions ──────────────────────────────────────────────────

    fn visit_expr(&mut self, expr: &'ast Expr) -> Result<()> {
        match expr {
            Expr::Identifier(ident) => self.visit_ident(ident),
            Expr::This | Expr::Literal(_) => Ok(()),
            Expr::Template(parts) | Expr::Sequence(parts) | Expr::Array(parts) => {
                for part in parts {
                    self.visit_expr(part)?;
                }
                Ok(())
            }
            Expr::Object(properties) => {
                for property in properties {
                    if property.computed {
                        self.visit_expr(&property.key)?;
                    }
                    self.visit_expr(&property.value)?;
                }
                Ok(())
            }
            Expr::Unary(u) => {
                if u.op == UnaryOp::Do {
                    if let Expr::Function(func) = &u.argument {
                        return self.visit_function(func, true);
                    }
                }
                self.visit_expr(&u.argument)
            }
            Expr::Binary(b) => {
                self.visit_expr(&b.left)?;
                self.visit_expr(&b.right)
            }
            Expr::Assignment(a) => self.visit_assignment(a),
            Expr::Update(u) => self.visit_update(u),
            Expr::Conditional(c) => {
                self.visit_expr(&c.test)?;
                self.visit_expr(&c.consequent)?;
                self.visit_expr(&c.alternate)
            }
            Expr::Call(c) => self.visit_call(c),
            Expr::Member(m) => {
                self.visit_expr(&m.object)?;
                if m.computed {
                    self.visit_expr(&m.property)?;
                }
                Ok(())
            }
            Expr::Function(f) => self.visit_function(f, false),
            Expr::Class(c) => self.visit_class(c),
        }
    }

    /// Declaration-flagged identifiers were already handled by whichever
    /// declaration form owns them; everything else is a read.
    fn visit_ident(&mut self, ident: &'ast Ident) -> Result<()> {
        if !ident.declaration {
            self.mgr
                .referencing(ident, ReferenceFlags::READ, None, false, false, false);
        }
        Ok(())
    }

    /// Both soak (`a?()`) and plain calls: detect direct `eval` before
    /// descending into callee and arguments.
    fn visit_call(&mut self, call: &'ast CallExpr) -> Result<()> {
        if !self.mgr.options().ignore_eval
            && matches!(&call.callee, Expr::Identifier(i) if i.name == "eval")
        {
            self.mgr.detect_eval();
        }
        self.visit_expr(&call.callee)?;
        for argument in &call.arguments {
            self.visit_expr(argument)?;
        }
        Ok(())
    }

    /// Declaration-via-assignment: flagged identifiers in the target
    /// bind into the nearest variable scope *before* the write reference
    /// is recorded, so the write resolves against the new binding rather
    /// than an outer shadowed name.
    fn visit_assignment(&mut self, a: &'ast AssignmentExpr) -> Result<()> {
        if matches!(a.left, Pattern::Rest(_)) {
            return Err(Error::MalformedNode(
                "rest element cannot be a top-level assignment target".into(),
            ));
        }
        let pb = collect_pattern(&a.left);
        for &ident in &pb.identifiers {
            if ident.declaration {
                let variable_scope = self.mgr.current_variable_scope();
                self.mgr
                    .define(variable_scope, ident, DefinitionKind::Variable, a.id, false);
            }
        }
        match a.op {
            AssignmentOp::Assign => {
                let whole = matches!(a.left, Pattern::Identifier(_));
                for &ident in &pb.identifiers {
                    self.mgr.referencing(
                        ident,
                        ReferenceFlags::WRITE,
                        Some(&a.right),
                        !whole,
                        false,
                        true,
                    );
                }
            }
            _ => {
                // Compound operators read the old value too; they never
                // destructure, so only a bare identifier target counts.
                if let Pattern::Identifier(ident) = &a.left {
                    self.mgr.referencing(
                        ident,
                        ReferenceFlags::READ | ReferenceFlags::WRITE,
                        Some(&a.right),
                        false,
                        false,
                        true,
                    );
                }
            }
        }
        for &(ident, default) in &pb.defaults {
            self.mgr.referencing(
                ident,
                ReferenceFlags::WRITE,
                Some(default),
                false,
                false,
                false,
            );
        }
        for &e in &pb.rhs_exprs {
            self.visit_expr(e)?;
        }
        self.visit_expr(&a.right)
    }

    fn visit_update(&mut self, u: &'ast UpdateExpr) -> Result<()> {
        match &u.argument {
            Expr::Identifier(ident) => {
                self.mgr.referencing(
                    ident,
                    ReferenceFlags::READ | ReferenceFlags::WRITE,
                    None,
                    false,
                    false,
                    true,
                );
                Ok(())
            }
            Expr::Member(m) => {
                self.visit_expr(&m.object)?;
                if m.computed {
                    self.visit_expr(&m.property)?;
                }
                Ok(())
            }
            _ => Err(Error::MalformedNode(
                "update expression target must be an identifier or member expression".into(),
            )),
        }
    }

    /// Loop bindings are defined (when declaration-flagged) *and* given
    /// an explicit partial init write from the loop source, because a
    /// loop variable may alias an existing outer name; downstream
    /// assigned-but-never-used checks need the write either way.
    fn visit_for(&mut self, f: &'ast For) -> Result<()> {
        for pattern in [f.name.as_ref(), f.index.as_ref()].into_iter().flatten() {
            let pb = collect_pattern(pattern);
            for &ident in &pb.identifiers {
                if ident.declaration {
                    let variable_scope = self.mgr.current_variable_scope();
                    self.mgr
                        .define(variable_scope, ident, DefinitionKind::Variable, f.id, false);
                }
                self.mgr.referencing(
                    ident,
                    ReferenceFlags::WRITE,
                    Some(&f.source),
                    true,
                    true,
                    false,
                );
            }
        }
        // Generic child pass: non-declaration loop variables also count
        // as plain uses, declaration-flagged ones were fully handled.
        for pattern in [f.name.as_ref(), f.index.as_ref()].into_iter().flatten() {
            self.visit_pattern_uses(pattern)?;
        }
        self.visit_expr(&f.source)?;
        if let Some(guard) = &f.guard {
            self.visit_expr(guard)?;
        }
        if let Some(step) = &f.step {
            self.visit_expr(step)?;
        }
        self.visit_block(&f.body)
    }

    fn visit_function(&mut self, func: &'ast Function, is_do_iife: bool) -> Result<()> {
        if is_do_iife {
            self.mark_do_iife_params_as_read(func)?;
        }
        let scope = self.mgr.enter_scope(ScopeKind::Function, func.id);
        for param in &func.params {
            let rest = matches!(param, Pattern::Rest(_));
            let pb = collect_pattern(param);
            for &ident in &pb.identifiers {
                self.mgr
                    .define(scope, ident, DefinitionKind::Parameter, func.id, rest);
            }
            for &(ident, default) in &pb.defaults {
                self.mgr.referencing(
                    ident,
                    ReferenceFlags::WRITE,
                    Some(default),
                    false,
                    true,
                    false,
                );
            }
            for &e in &pb.rhs_exprs {
                self.visit_expr(e)?;
            }
        }
        // The body block shares the function scope.
        self.visit_stmts(&func.body.body)?;
        self.mgr.exit_scope()?;
        Ok(())
    }

    /// A do-IIFE's parameters are pre-bound to same-named outer
    /// variables, so each non-defaulted parameter is a read of the outer
    /// name. Recorded in the *enclosing* scope, before the function
    /// scope exists.
    fn mark_do_iife_params_as_read(&mut self, func: &'ast Function) -> Result<()> {
        for param in &func.params {
            if matches!(param, Pattern::Assignment(_)) {
                continue;
            }
            self.visit_pattern_uses(param)?;
        }
        Ok(())
    }

    /// Class names bind twice: in the enclosing scope when the name is a
    /// fresh declaration (before the superclass is visited, so the
    /// superclass cannot resolve to it), and inside the class scope so
    /// static members can self-reference.
    fn visit_class(&mut self, class: &'ast ClassDef) -> Result<()> {
        if let Some(name) = &class.name {
            if name.declaration {
                let current = self.mgr.current_scope();
                self.mgr
                    .define(current, name, DefinitionKind::ClassName, class.id, false);
            }
        }
        if let Some(superclass) = &class.superclass {
            self.visit_expr(superclass)?;
        }
        let class_scope = self.mgr.enter_scope(ScopeKind::Class, class.id);
        if let Some(name) = &class.name {
            self.mgr
                .define(class_scope, name, DefinitionKind::ClassName, class.id, false);
            // A reopened class name (declaration flag unset) is a read.
            self.visit_ident(name)?;
        }
        for member in &class.body {
            // Static and prototype properties share the property path.
            let property = member.property();
            if property.computed {
                self.visit_expr(&property.key)?;
            }
            if let Some(value) = &property.value {
                self.visit_expr(value)?;
            }
        }
        self.mgr.exit_scope()?;
        Ok(())
    }

    /// Visits a pattern as plain uses: identifiers go through the
    /// declaration-flag check, sub-expressions are ordinary reads.
    fn visit_pattern_uses(&mut self, pattern: &'ast Pattern) -> Result<()> {
        let pb = collect_pattern(pattern);
        for &ident in &pb.identifiers {
            self.visit_ident(ident)?;
        }
        for &e in &pb.rhs_exprs {
            self.visit_expr(e)?;
        }
        Ok(())
    }
}
