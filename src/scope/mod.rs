//! Lexical scope analysis for parsed CoffeeScript programs.
//!
//! [`referencer::analyze`] walks a [`crate::ast::Program`] once and
//! returns a [`tree::ScopeAnalysis`]: the scope tree, every variable with
//! its definitions, and every reference with its resolution. Lint rules
//! consume the analysis read-only.

pub mod manager;
pub mod pattern;
pub mod referencer;
pub mod tree;

pub use manager::{AnalyzeOptions, Fallback, ScopeManager};
pub use referencer::analyze;
pub use tree::{
    Definition, DefinitionKind, Reference, ReferenceFlags, ReferenceId, Scope, ScopeAnalysis,
    ScopeId, ScopeKind, Variable, VariableId,
};
