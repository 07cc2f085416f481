// Apply -> Join decorrelation. Classifies the correlated-subquery
// marker left by the plan builder and lowers it to a plain join so the rest
// of the pipeline (predicate pushdown, column pruning, DP join reorder)
// never has to special-case `Apply`.

use super::{Rule, RuleContext};
use crate::ast::JoinType;
use crate::expr::Expression;
use crate::plan::{ApplyKind, JoinNode, LogicalPlan, SelectionNode};

pub struct Decorrelate;

impl Rule for Decorrelate {
    fn name(&self) -> &'static str {
        "decorrelate"
    }

    fn matches(&self, plan: &LogicalPlan) -> bool {
        matches!(plan, LogicalPlan::Apply(_))
    }

    /// `NO_DECORRELATE` gates this rule directly rather than through a
    /// separate `HintAwareSubquery` rule object: every rule already sees
    /// `ctx.hints`, so a pass-through rule whose only job is forwarding a
    /// flag would add a stage with no transformation of its own.
    fn apply(&self, plan: &LogicalPlan, ctx: &RuleContext) -> Option<LogicalPlan> {
        let LogicalPlan::Apply(node) = plan else { return None };
        if ctx.hints.no_decorrelate {
            return None;
        }

        let join_type = match node.kind {
            // EXISTS/IN only require a matching inner row to exist.
            ApplyKind::Exists | ApplyKind::In => JoinType::Semi,
            // NOT EXISTS/NOT IN lower to anti-join. NOT IN's NULL-sensitive
            // degrade-to-left-anti-with-NULL-guard behavior is not
            // implemented here: it requires inner-column nullability, which
            // isn't available until the catalog is consulted during plan
            // conversion (Open Question, see DESIGN.md).
            ApplyKind::NotExists | ApplyKind::NotIn => JoinType::AntiSemi,
            // An uncorrelated scalar subquery is a plain join; a correlated
            // one must preserve every outer row even when the inner side
            // has no match.
            ApplyKind::Scalar => {
                if node.correlated_columns.is_empty() {
                    JoinType::Inner
                } else {
                    JoinType::LeftOuter
                }
            }
        };

        let (inner, condition) = lift_correlated_predicate((*node.inner).clone(), &node.correlated_columns);
        Some(LogicalPlan::Join(JoinNode {
            left: node.outer.clone(),
            right: Box::new(inner),
            join_type,
            condition,
            hint_applied: None,
        }))
    }
}

/// Pull the conjuncts of `inner`'s top `Selection` that reference a
/// correlated outer column out as the join condition, leaving any residual,
/// inner-only conjuncts behind as a `Selection` over the inner side.
fn lift_correlated_predicate(inner: LogicalPlan, correlated: &[String]) -> (LogicalPlan, Option<Expression>) {
    if correlated.is_empty() {
        return (inner, None);
    }
    let LogicalPlan::Selection(node) = inner else { return (inner, None) };
    let conjuncts = node.predicate.split_conjuncts();
    let mut lifted = Vec::new();
    let mut residual = Vec::new();
    for c in conjuncts {
        if c.referenced_columns().iter().any(|col| correlated.contains(col)) {
            lifted.push(c);
        } else {
            residual.push(c);
        }
    }
    let new_input = match Expression::from_conjuncts(residual) {
        Some(pred) => LogicalPlan::Selection(SelectionNode { input: node.input, predicate: pred }),
        None => *node.input,
    };
    (new_input, Expression::from_conjuncts(lifted))
}
