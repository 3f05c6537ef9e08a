//! `no-use-before-define` - reads of a variable positioned before its
//! first declaring occurrence.
//!
//! Only reads count: with declaration-via-assignment, writes usually
//! *are* the declaration. Implicit globals have no meaningful
//! declaration site and are skipped.

use crate::rules::{sort_diagnostics, Diagnostic};
use crate::scope::{DefinitionKind, ScopeAnalysis};

pub fn no_use_before_define(analysis: &ScopeAnalysis<'_>) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for reference in analysis.references() {
        if !reference.is_read() {
            continue;
        }
        let Some(var_id) = reference.resolved else {
            continue;
        };
        let var = analysis.variable(var_id);
        if var
            .defs
            .iter()
            .any(|d| d.kind == DefinitionKind::ImplicitGlobal)
        {
            continue;
        }
        let Some(first_def) = var.defs.iter().map(|d| d.name.loc).min() else {
            continue;
        };
        if reference.ident.loc < first_def {
            diagnostics.push(Diagnostic {
                rule: "no-use-before-define",
                message: format!("'{}' was used before it was defined", var.name),
                node: reference.ident.id,
                loc: reference.ident.loc,
            });
        }
    }
    sort_diagnostics(&mut diagnostics);
    diagnostics
}
