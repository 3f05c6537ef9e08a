//! Binding-pattern collector
//!
//! Destructuring targets and parameter lists mix three things: the
//! identifiers being bound, default-value expressions, and plain
//! sub-expressions (member-target objects, computed keys) that are
//! ordinary reads. The collector separates them in one pass so the
//! referencer can define, reference, and visit each group explicitly.
//! The input tree is never touched.

use crate::ast::{Expr, Ident, ObjectPatternItem, Pattern};

/// Everything a binding pattern contributes to scope analysis.
#[derive(Debug, Default)]
pub(crate) struct PatternBindings<'ast> {
    /// Binding identifiers, in source order.
    pub identifiers: Vec<&'ast Ident>,
    /// (bound identifier, default expression) for every default-value
    /// pattern enclosing that identifier, innermost first.
    pub defaults: Vec<(&'ast Ident, &'ast Expr)>,
    /// Sub-expressions to visit as plain reads: default values,
    /// computed keys, member-target objects and computed properties.
    pub rhs_exprs: Vec<&'ast Expr>,
}

/// Collects the bindings of `pattern`.
pub(crate) fn collect_pattern<'ast>(pattern: &'ast Pattern) -> PatternBindings<'ast> {
    let mut out = PatternBindings::default();
    let mut defaults_stack = Vec::new();
    walk(pattern, &mut out, &mut defaults_stack);
    out
}

fn walk<'ast>(
    pattern: &'ast Pattern,
    out: &mut PatternBindings<'ast>,
    defaults_stack: &mut Vec<&'ast Expr>,
) {
    match pattern {
        Pattern::Identifier(ident) => {
            out.identifiers.push(ident);
            for default in defaults_stack.iter().rev() {
                out.defaults.push((ident, default));
            }
        }
        Pattern::Array(elements) => {
            for element in elements.iter().flatten() {
                walk(element, out, defaults_stack);
            }
        }
        Pattern::Object(items) => {
            for item in items {
                match item {
                    ObjectPatternItem::KeyValue(prop) => {
                        if prop.computed {
                            out.rhs_exprs.push(&prop.key);
                        }
                        walk(&prop.value, out, defaults_stack);
                    }
                    ObjectPatternItem::Rest(rest) => walk(rest, out, defaults_stack),
                }
            }
        }
        Pattern::Assignment(assignment) => {
            defaults_stack.push(&assignment.right);
            walk(&assignment.left, out, defaults_stack);
            defaults_stack.pop();
            out.rhs_exprs.push(&assignment.right);
        }
        Pattern::Rest(rest) => walk(rest, out, defaults_stack),
        Pattern::Member(member) => {
            out.rhs_exprs.push(&member.object);
            if member.computed {
                out.rhs_exprs.push(&member.property);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{
        AssignmentPattern, Literal, MemberExpr, NodeId, PatternProperty, SourceLocation,
    };

    fn ident(id: u32, name: &str) -> Ident {
        Ident::new(NodeId(id), name, SourceLocation::default())
    }

    #[test]
    fn test_plain_identifier() {
        let pat = Pattern::Identifier(ident(1, "x"));
        let pb = collect_pattern(&pat);
        assert_eq!(pb.identifiers.len(), 1);
        assert_eq!(pb.identifiers[0].name, "x");
        assert!(pb.defaults.is_empty());
        assert!(pb.rhs_exprs.is_empty());
    }

    #[test]
    fn test_array_pattern_with_holes_and_rest() {
        let pat = Pattern::Array(vec![
            Some(Pattern::Identifier(ident(1, "a"))),
            None,
            Some(Pattern::Rest(Box::new(Pattern::Identifier(ident(2, "rest"))))),
        ]);
        let pb = collect_pattern(&pat);
        let names: Vec<_> = pb.identifiers.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["a", "rest"]);
    }

    #[test]
    fn test_default_value_pairs_identifier_with_expression() {
        let default = Expr::Literal(Literal::Number(1.0));
        let pat = Pattern::Assignment(Box::new(AssignmentPattern {
            left: Pattern::Identifier(ident(1, "x")),
            right: default,
        }));
        let pb = collect_pattern(&pat);
        assert_eq!(pb.identifiers.len(), 1);
        assert_eq!(pb.defaults.len(), 1);
        assert_eq!(pb.defaults[0].0.name, "x");
        // The default expression is also queued for a plain visit.
        assert_eq!(pb.rhs_exprs.len(), 1);
    }

    #[test]
    fn test_object_pattern_computed_key_is_rhs() {
        let pat = Pattern::Object(vec![ObjectPatternItem::KeyValue(PatternProperty {
            key: Expr::Identifier(ident(1, "k")),
            value: Pattern::Identifier(ident(2, "v")),
            computed: true,
        })]);
        let pb = collect_pattern(&pat);
        assert_eq!(pb.identifiers.len(), 1);
        assert_eq!(pb.identifiers[0].name, "v");
        assert_eq!(pb.rhs_exprs.len(), 1);
    }

    #[test]
    fn test_member_target_binds_nothing() {
        let pat = Pattern::Member(Box::new(MemberExpr {
            object: Expr::Identifier(ident(1, "obj")),
            property: Expr::Identifier(ident(2, "field")),
            computed: false,
            optional: false,
        }));
        let pb = collect_pattern(&pat);
        assert!(pb.identifiers.is_empty());
        assert_eq!(pb.rhs_exprs.len(), 1);
    }
}
