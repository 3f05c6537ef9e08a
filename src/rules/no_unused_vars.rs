//! `no-unused-vars` - variables that are written or declared but never
//! read.
//!
//! Parameters are exempt (whether unused arguments matter is host
//! policy), as are implicit globals, which only exist because an
//! out-of-scope write was folded into the root scope.

use tracing::trace;

use crate::rules::{sort_diagnostics, Diagnostic};
use crate::scope::{DefinitionKind, ScopeAnalysis};

pub fn no_unused_vars(analysis: &ScopeAnalysis<'_>) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for var in analysis.variables() {
        let exempt = var.defs.iter().any(|d| {
            matches!(
                d.kind,
                DefinitionKind::Parameter | DefinitionKind::ImplicitGlobal
            )
        });
        if exempt {
            continue;
        }
        let mut read = false;
        let mut written = false;
        for &r in &var.references {
            let reference = analysis.reference(r);
            read |= reference.is_read();
            written |= reference.is_write();
        }
        if read {
            continue;
        }
        trace!(name = %var.name, "unused variable");
        let def = var.defs[0];
        let message = if written {
            format!("'{}' is assigned a value but never used", var.name)
        } else {
            format!("'{}' is defined but never used", var.name)
        };
        diagnostics.push(Diagnostic {
            rule: "no-unused-vars",
            message,
            node: def.name.id,
            loc: def.name.loc,
        });
    }
    sort_diagnostics(&mut diagnostics);
    diagnostics
}
