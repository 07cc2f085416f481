// Column pruning. A node's own output schema only reflects what its real
// ancestors need once the rule has walked all the way up to the root, so
// `apply` treats the firing node's current schema as the required set and
// re-derives every descendant's requirement from there — a tree-wide,
// top-down pass, not just a look at the immediate child.

use super::{Rule, RuleContext};
use crate::plan::{AggregateNode, DataSourceNode, JoinNode, LogicalPlan};
use std::collections::HashSet;

pub struct ColumnPruning;

impl Rule for ColumnPruning {
    fn name(&self) -> &'static str {
        "column_pruning"
    }

    fn matches(&self, plan: &LogicalPlan) -> bool {
        matches!(plan, LogicalPlan::Projection(_) | LogicalPlan::Selection(_) | LogicalPlan::Join(_) | LogicalPlan::Aggregate(_))
    }

    /// Re-derives the required-column set from `plan`'s own output schema and
    /// pushes it down through every descendant, narrowing any `DataSource` it
    /// reaches. Firing bottom-up means a `Selection` right over a scan gets
    /// visited before the `Projection` above it; this still converges because
    /// each firing recomputes the whole subtree from scratch rather than
    /// patching in the previous firing's (possibly too-narrow) decision, and
    /// the fixed-point loop keeps iterating until the tree stops changing.
    fn apply(&self, plan: &LogicalPlan, _ctx: &RuleContext) -> Option<LogicalPlan> {
        let required: HashSet<String> = plan.schema().columns.into_iter().map(|c| c.name).collect();
        let rewritten = push_required(plan.clone(), &required);
        if format!("{rewritten:?}") == format!("{plan:?}") {
            None
        } else {
            Some(rewritten)
        }
    }
}

/// Narrow every `DataSource` beneath `plan` to `required` (widened at each
/// level by whatever that operator itself needs), recursing with each
/// child's own required set.
fn push_required(plan: LogicalPlan, required: &HashSet<String>) -> LogicalPlan {
    match plan {
        LogicalPlan::DataSource(n) => prune_scan(n, required),
        LogicalPlan::Selection(mut n) => {
            let mut needed = required.clone();
            needed.extend(n.predicate.referenced_columns());
            n.input = Box::new(push_required(*n.input, &needed));
            LogicalPlan::Selection(n)
        }
        LogicalPlan::Projection(mut n) => {
            let needed: HashSet<String> = n.items.iter().flat_map(|i| i.expr.referenced_columns()).collect();
            n.input = Box::new(push_required(*n.input, &needed));
            LogicalPlan::Projection(n)
        }
        LogicalPlan::Join(n) => push_required_join(n, required),
        LogicalPlan::Aggregate(n) => push_required_aggregate(n, required),
        other => other,
    }
}

fn prune_scan(mut n: DataSourceNode, required: &HashSet<String>) -> LogicalPlan {
    let needed: Vec<String> = n.schema.columns.iter().map(|c| c.name.clone()).filter(|name| required.contains(name)).collect();
    if !needed.is_empty() && n.projected_columns.as_ref() != Some(&needed) {
        n.projected_columns = Some(needed);
    }
    LogicalPlan::DataSource(n)
}

/// Splits `required` (plus the join condition's own columns) by which side's
/// schema each column belongs to, so each side only gets pruned against what
/// is actually read from it.
fn push_required_join(mut n: JoinNode, required: &HashSet<String>) -> LogicalPlan {
    let left_schema = n.left.schema();
    let right_schema = n.right.schema();
    let condition_cols: Vec<String> = n.condition.as_ref().map(|c| c.referenced_columns()).unwrap_or_default();

    let mut left_needed: HashSet<String> = required.iter().filter(|c| left_schema.contains(c)).cloned().collect();
    left_needed.extend(condition_cols.iter().filter(|c| left_schema.contains(c)).cloned());
    let mut right_needed: HashSet<String> = required.iter().filter(|c| right_schema.contains(c)).cloned().collect();
    right_needed.extend(condition_cols.iter().filter(|c| right_schema.contains(c)).cloned());

    n.left = Box::new(push_required(*n.left, &left_needed));
    n.right = Box::new(push_required(*n.right, &right_needed));
    LogicalPlan::Join(n)
}

/// An `Aggregate` always needs its own group-by and aggregate-argument
/// columns regardless of what's asked from above — it can't pass a narrower
/// request through than that.
fn push_required_aggregate(mut n: AggregateNode, _required: &HashSet<String>) -> LogicalPlan {
    let mut needed: HashSet<String> = n.group_by.iter().cloned().collect();
    needed.extend(n.aggregates.iter().flat_map(|a| a.expr.referenced_columns()));
    n.input = Box::new(push_required(*n.input, &needed));
    LogicalPlan::Aggregate(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptimizerConfig;
    use crate::expr::{Expression, Op};
    use crate::hints::OptimizerHints;
    use crate::plan::{IndexDirective, ProjectionItem, ProjectionNode, SelectionNode};
    use crate::schema::{ColumnDef, Schema};
    use crate::value::{DataType, Value};

    fn scan(col_names: &[&str]) -> LogicalPlan {
        LogicalPlan::DataSource(DataSourceNode {
            table: "t".to_string(),
            schema: Schema::new(col_names.iter().map(|c| ColumnDef::new(*c, DataType::Integer, true)).collect()),
            pushed_predicates: None,
            projected_columns: None,
            pushed_limit: None,
            pushed_topn: None,
            index_directive: IndexDirective::default(),
        })
    }

    fn ctx(config: &OptimizerConfig, hints: &OptimizerHints) -> RuleContext<'_> {
        RuleContext { config, hints }
    }

    #[test]
    fn selection_narrows_scan_to_referenced_columns() {
        let plan = LogicalPlan::Selection(SelectionNode {
            input: Box::new(scan(&["age", "name"])),
            predicate: Expression::binary(Op::Gt, Expression::column("age"), Expression::value(Value::Integer(30))),
        });
        let config = OptimizerConfig::default();
        let hints = OptimizerHints::default();
        let rewritten = ColumnPruning.apply(&plan, &ctx(&config, &hints)).unwrap();
        let LogicalPlan::Selection(n) = rewritten else { panic!() };
        let LogicalPlan::DataSource(scan) = *n.input else { panic!() };
        assert_eq!(scan.projected_columns, Some(vec!["age".to_string()]));
    }

    /// `SELECT a FROM t WHERE b > 0` — the scan must keep `a` even though
    /// the immediate parent of the `DataSource` (the `Selection`) only
    /// itself references `b`, because the `Projection` above still reads
    /// `a`. An operator-local rule drops it.
    #[test]
    fn projection_over_selection_keeps_column_needed_only_above_the_selection() {
        let plan = LogicalPlan::Projection(ProjectionNode {
            input: Box::new(LogicalPlan::Selection(SelectionNode {
                input: Box::new(scan(&["a", "b"])),
                predicate: Expression::binary(Op::Gt, Expression::column("b"), Expression::value(Value::Integer(0))),
            })),
            items: vec![ProjectionItem { expr: Expression::column("a"), alias: None }],
        });
        let config = OptimizerConfig::default();
        let hints = OptimizerHints::default();
        let rewritten = ColumnPruning.apply(&plan, &ctx(&config, &hints)).unwrap();
        let LogicalPlan::Projection(proj) = rewritten else { panic!() };
        let LogicalPlan::Selection(sel) = *proj.input else { panic!() };
        let LogicalPlan::DataSource(scan) = *sel.input else { panic!() };
        let mut cols = scan.projected_columns.unwrap();
        cols.sort();
        assert_eq!(cols, vec!["a".to_string(), "b".to_string()]);
    }
}
