//! Lint rule components.
//!
//! Rules are pure functions over a finished [`ScopeAnalysis`]: no rule
//! re-walks the syntax tree or mutates anything. The catalog here is
//! deliberately small; it exists to exercise the analysis surface that
//! rules consume (resolved references, definition kinds, read/write
//! flags, source positions).
//!
//! [`ScopeAnalysis`]: crate::scope::ScopeAnalysis

pub mod no_unused_vars;
pub mod no_use_before_define;

pub use no_unused_vars::no_unused_vars;
pub use no_use_before_define::no_use_before_define;

use crate::ast::{NodeId, SourceLocation};

/// One rule finding, anchored at the offending identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Stable rule name, kebab-case.
    pub rule: &'static str,
    pub message: String,
    /// The identifier node the finding points at.
    pub node: NodeId,
    pub loc: SourceLocation,
}

/// Orders findings by source position for stable output.
pub(crate) fn sort_diagnostics(diagnostics: &mut Vec<Diagnostic>) {
    diagnostics.sort_by(|a, b| a.loc.cmp(&b.loc).then_with(|| a.message.cmp(&b.message)));
}
