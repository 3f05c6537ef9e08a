//! # Coffeelint - Scope analysis for CoffeeScript linting
//!
//! ESLint-compatible scope analysis over parsed CoffeeScript trees.
//!
//! Coffeelint provides:
//! - An AST contract for the upstream CoffeeScript parser ([`ast`])
//! - A single-pass scope analyzer with the CoffeeScript binding rules
//!   layered over standard ECMAScript scoping ([`scope`])
//! - Lint rule components consuming the finished analysis ([`rules`])
//!
//! ```no_run
//! use coffeelint::ast::Program;
//! use coffeelint::scope::{analyze, AnalyzeOptions};
//!
//! fn lint(program: &Program) -> coffeelint::Result<()> {
//!     let analysis = analyze(program, &AnalyzeOptions::default())?;
//!     for finding in coffeelint::rules::no_unused_vars(&analysis) {
//!         println!("{}: {}", finding.rule, finding.message);
//!     }
//!     Ok(())
//! }
//! ```

pub mod ast;
pub mod rules;
pub mod scope;

// Re-exports for convenient access
pub use rules::Diagnostic;
pub use scope::{analyze, AnalyzeOptions, Fallback, ScopeAnalysis};

/// Result type alias for Coffeelint operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Coffeelint operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Malformed node: {0}")]
    MalformedNode(String),

    #[error("Scope exit with no scope on the stack")]
    ScopeUnderflow,

    #[error("Traversal ended with {0} scope(s) still open")]
    UnbalancedTraversal(usize),
}
