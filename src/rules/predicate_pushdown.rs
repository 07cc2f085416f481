// Predicate pushdown: split a Selection's predicate into its AND
// conjuncts and sink each conjunct past Projection/Join/Aggregate nodes down
// onto the DataSource scan that references only that table's columns.

use super::{Rule, RuleContext};
use crate::expr::Expression;
use crate::plan::{AggregateNode, DataSourceNode, JoinNode, LogicalPlan, ProjectionNode, SelectionNode};
use std::collections::HashMap;

pub struct PredicatePushdown;

impl Rule for PredicatePushdown {
    fn name(&self) -> &'static str {
        "predicate_pushdown"
    }

    fn matches(&self, plan: &LogicalPlan) -> bool {
        matches!(plan, LogicalPlan::Selection(_))
    }

    fn apply(&self, plan: &LogicalPlan, _ctx: &RuleContext) -> Option<LogicalPlan> {
        let LogicalPlan::Selection(node) = plan else { return None };
        let conjuncts = node.predicate.split_conjuncts();
        let (input, remaining) = push_into(*node.input.clone(), conjuncts);

        Some(match Expression::from_conjuncts(remaining) {
            Some(pred) => LogicalPlan::Selection(SelectionNode { input: Box::new(input), predicate: pred }),
            None => input,
        })
    }
}

/// Try to sink each conjunct as far down `plan` as the columns it
/// references allow. Returns the rewritten subtree plus the conjuncts that
/// could not be pushed any further (to be re-wrapped by the caller).
fn push_into(plan: LogicalPlan, conjuncts: Vec<Expression>) -> (LogicalPlan, Vec<Expression>) {
    match plan {
        LogicalPlan::DataSource(mut n) => {
            let schema = n.schema.clone();
            let (pushable, rest) = split_by_schema(conjuncts, &schema);
            if let Some(pred) = Expression::from_conjuncts(pushable) {
                n.pushed_predicates = Some(match n.pushed_predicates.take() {
                    Some(existing) => existing.and(pred),
                    None => pred,
                });
            }
            (LogicalPlan::DataSource(n), rest)
        }
        LogicalPlan::Join(n) => push_into_join(n, conjuncts),
        LogicalPlan::Projection(n) => push_into_projection(n, conjuncts),
        LogicalPlan::Aggregate(n) => push_into_aggregate(n, conjuncts),
        other => (other, conjuncts),
    }
}

/// Only a conjunct whose every referenced column is a plain pass-through of
/// an input column (no computed expression in between) can sink through a
/// `Projection` — and it must be rewritten in terms of the input's column
/// name, since `alias` may rename it. Anything else (a predicate on a
/// computed/aliased expression) stays above, untranslated.
fn push_into_projection(mut n: ProjectionNode, conjuncts: Vec<Expression>) -> (LogicalPlan, Vec<Expression>) {
    let mut passthrough = HashMap::new();
    for item in &n.items {
        if let Expression::Column(inner) = &item.expr {
            let output_name = item.alias.clone().unwrap_or_else(|| inner.clone());
            passthrough.insert(output_name, inner.clone());
        }
    }

    let mut pushable = Vec::new();
    let mut rest = Vec::new();
    for c in conjuncts {
        if c.referenced_columns().iter().all(|col| passthrough.contains_key(col)) {
            pushable.push(rename_columns(&c, &passthrough));
        } else {
            rest.push(c);
        }
    }

    let (new_input, unpushed) = push_into(*n.input, pushable);
    n.input = Box::new(wrap_residual(new_input, unpushed));
    (LogicalPlan::Projection(n), rest)
}

/// A conjunct referencing only `GROUP BY` columns can sink below the
/// `Aggregate` — the group key passes through unchanged, so filtering before
/// or after grouping on it is equivalent. A conjunct touching an aggregate
/// output (e.g. a `HAVING` condition) must stay above.
fn push_into_aggregate(mut n: AggregateNode, conjuncts: Vec<Expression>) -> (LogicalPlan, Vec<Expression>) {
    let mut pushable = Vec::new();
    let mut rest = Vec::new();
    for c in conjuncts {
        if c.referenced_columns().iter().all(|col| n.group_by.contains(col)) {
            pushable.push(c);
        } else {
            rest.push(c);
        }
    }

    let (new_input, unpushed) = push_into(*n.input, pushable);
    n.input = Box::new(wrap_residual(new_input, unpushed));
    (LogicalPlan::Aggregate(n), rest)
}

/// Re-wrap conjuncts that reached a node but couldn't push further as a
/// `Selection` directly above it, rather than letting them bubble up past an
/// operator whose column names they may no longer match.
fn wrap_residual(plan: LogicalPlan, conjuncts: Vec<Expression>) -> LogicalPlan {
    match Expression::from_conjuncts(conjuncts) {
        Some(pred) => LogicalPlan::Selection(SelectionNode { input: Box::new(plan), predicate: pred }),
        None => plan,
    }
}

fn rename_columns(expr: &Expression, map: &HashMap<String, String>) -> Expression {
    match expr {
        Expression::Column(name) => Expression::Column(map.get(name).cloned().unwrap_or_else(|| name.clone())),
        Expression::Value(v) => Expression::Value(v.clone()),
        Expression::Operator { op, left, right } => {
            Expression::Operator { op: *op, left: Box::new(rename_columns(left, map)), right: Box::new(rename_columns(right, map)) }
        }
        Expression::Function { name, args } => Expression::Function { name: name.clone(), args: args.iter().map(|a| rename_columns(a, map)).collect() },
    }
}

fn push_into_join(mut n: JoinNode, conjuncts: Vec<Expression>) -> (LogicalPlan, Vec<Expression>) {
    // Outer joins must not have filters pushed below the side that can
    // produce NULL-extended rows; conservatively only push through Inner
    // and Cross joins.
    if !matches!(n.join_type, crate::ast::JoinType::Inner | crate::ast::JoinType::Cross) {
        return (LogicalPlan::Join(n), conjuncts);
    }

    let left_schema = n.left.schema();
    let right_schema = n.right.schema();
    let mut remaining = Vec::new();
    let mut left_preds = Vec::new();
    let mut right_preds = Vec::new();
    let mut new_conditions = Vec::new();

    for conjunct in conjuncts {
        let cols = conjunct.referenced_columns();
        if cols.iter().all(|c| left_schema.contains(c)) {
            left_preds.push(conjunct);
        } else if cols.iter().all(|c| right_schema.contains(c)) {
            right_preds.push(conjunct);
        } else if spans_join_sides(&conjunct, &left_schema, &right_schema) {
            // `col_left op col_right`: this is a join key, not a residual
            // filter. A cross join that picks one up becomes an equi-join.
            new_conditions.push(conjunct);
        } else {
            remaining.push(conjunct);
        }
    }

    let (new_left, left_rest) = push_into(*n.left, left_preds);
    let (new_right, right_rest) = push_into(*n.right, right_preds);
    remaining.extend(left_rest);
    remaining.extend(right_rest);
    n.left = Box::new(new_left);
    n.right = Box::new(new_right);
    if let Some(extra) = Expression::from_conjuncts(new_conditions) {
        n.condition = Some(match n.condition.take() {
            Some(existing) => existing.and(extra),
            None => extra,
        });
        n.join_type = crate::ast::JoinType::Inner;
    }
    (LogicalPlan::Join(n), remaining)
}

/// True when `conjunct` is a single binary comparison with one operand
/// resolving entirely to the left schema and the other entirely to the
/// right schema (in either order) — the `col_left op col_right` shape
/// spec.md calls a join condition rather than a residual filter.
fn spans_join_sides(conjunct: &Expression, left_schema: &crate::schema::Schema, right_schema: &crate::schema::Schema) -> bool {
    let Expression::Operator { op, left, right } = conjunct else { return false };
    if !matches!(op, crate::expr::Op::Eq | crate::expr::Op::NotEq | crate::expr::Op::Lt | crate::expr::Op::LtEq | crate::expr::Op::Gt | crate::expr::Op::GtEq) {
        return false;
    }
    let left_cols = left.referenced_columns();
    let right_cols = right.referenced_columns();
    if left_cols.is_empty() || right_cols.is_empty() {
        return false;
    }
    (left_cols.iter().all(|c| left_schema.contains(c)) && right_cols.iter().all(|c| right_schema.contains(c)))
        || (left_cols.iter().all(|c| right_schema.contains(c)) && right_cols.iter().all(|c| left_schema.contains(c)))
}

fn split_by_schema(conjuncts: Vec<Expression>, schema: &crate::schema::Schema) -> (Vec<Expression>, Vec<Expression>) {
    let mut pushable = Vec::new();
    let mut rest = Vec::new();
    for c in conjuncts {
        if c.referenced_columns().iter().all(|col| schema.contains(col)) {
            pushable.push(c);
        } else {
            rest.push(c);
        }
    }
    (pushable, rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptimizerConfig;
    use crate::expr::Op;
    use crate::hints::OptimizerHints;
    use crate::schema::{ColumnDef, Schema};
    use crate::value::{DataType, Value};

    fn scan(table: &str, col: &str) -> LogicalPlan {
        LogicalPlan::DataSource(DataSourceNode {
            table: table.to_string(),
            schema: Schema::new(vec![ColumnDef::new(col, DataType::Integer, true)]),
            pushed_predicates: None,
            projected_columns: None,
            pushed_limit: None,
            pushed_topn: None,
            index_directive: crate::plan::IndexDirective::default(),
        })
    }

    #[test]
    fn pushes_single_table_predicate_onto_scan() {
        let plan = LogicalPlan::Selection(SelectionNode {
            input: Box::new(scan("users", "age")),
            predicate: Expression::binary(Op::Gt, Expression::column("age"), Expression::value(Value::Integer(30))),
        });
        let config = OptimizerConfig::default();
        let hints = OptimizerHints::default();
        let ctx = RuleContext { config: &config, hints: &hints };
        let rule = PredicatePushdown;
        let rewritten = rule.apply(&plan, &ctx).unwrap();
        match rewritten {
            LogicalPlan::DataSource(n) => assert!(n.pushed_predicates.is_some()),
            other => panic!("expected DataSource, got {other:?}"),
        }
    }

    #[test]
    fn does_not_push_through_left_outer_join() {
        let join = LogicalPlan::Join(JoinNode {
            left: Box::new(scan("orders", "id")),
            right: Box::new(scan("refunds", "order_id")),
            join_type: crate::ast::JoinType::LeftOuter,
            condition: None,
            hint_applied: None,
        });
        let plan = LogicalPlan::Selection(SelectionNode {
            input: Box::new(join),
            predicate: Expression::binary(Op::IsNull, Expression::column("order_id"), Expression::column("order_id")),
        });
        let config = OptimizerConfig::default();
        let hints = OptimizerHints::default();
        let ctx = RuleContext { config: &config, hints: &hints };
        let rewritten = PredicatePushdown.apply(&plan, &ctx).unwrap();
        assert!(matches!(rewritten, LogicalPlan::Selection(_)));
    }

    #[test]
    fn cross_join_equi_predicate_becomes_a_join_condition() {
        let join = LogicalPlan::Join(JoinNode {
            left: Box::new(scan("orders", "customer_id")),
            right: Box::new(scan("customers", "cust_id")),
            join_type: crate::ast::JoinType::Cross,
            condition: None,
            hint_applied: None,
        });
        let plan = LogicalPlan::Selection(SelectionNode {
            input: Box::new(join),
            predicate: Expression::binary(Op::Eq, Expression::column("customer_id"), Expression::column("cust_id")),
        });
        let config = OptimizerConfig::default();
        let hints = OptimizerHints::default();
        let ctx = RuleContext { config: &config, hints: &hints };
        let rewritten = PredicatePushdown.apply(&plan, &ctx).unwrap();
        match rewritten {
            LogicalPlan::Join(n) => {
                assert_eq!(n.join_type, crate::ast::JoinType::Inner, "a cross join that gains an equi-condition is no longer a cartesian product");
                assert!(n.condition.is_some(), "the cross-table predicate should have become the join condition");
            }
            other => panic!("expected the Selection to disappear into a Join condition, got {other:?}"),
        }
    }

    #[test]
    fn pushes_through_a_renaming_projection() {
        let plan = LogicalPlan::Selection(SelectionNode {
            input: Box::new(LogicalPlan::Projection(crate::plan::ProjectionNode {
                input: Box::new(scan("users", "age")),
                items: vec![crate::plan::ProjectionItem { expr: Expression::column("age"), alias: Some("user_age".to_string()) }],
            })),
            predicate: Expression::binary(Op::Gt, Expression::column("user_age"), Expression::value(Value::Integer(30))),
        });
        let config = OptimizerConfig::default();
        let hints = OptimizerHints::default();
        let ctx = RuleContext { config: &config, hints: &hints };
        let rewritten = PredicatePushdown.apply(&plan, &ctx).unwrap();
        let LogicalPlan::Projection(proj) = rewritten else { panic!("expected Projection, got {rewritten:?}") };
        match *proj.input {
            LogicalPlan::DataSource(n) => assert!(n.pushed_predicates.is_some()),
            other => panic!("expected the predicate to sink onto the scan, got {other:?}"),
        }
    }

    #[test]
    fn group_by_predicate_sinks_below_aggregate_but_having_does_not() {
        let plan = LogicalPlan::Selection(SelectionNode {
            input: Box::new(LogicalPlan::Aggregate(crate::plan::AggregateNode {
                input: Box::new(scan("orders", "region")),
                group_by: vec!["region".to_string()],
                aggregates: vec![crate::ast::AggregateItem {
                    kind: crate::ast::AggKind::Count,
                    expr: Expression::column("region"),
                    alias: Some("cnt".to_string()),
                    distinct: false,
                }],
                hint_applied: None,
            })),
            predicate: Expression::binary(Op::Eq, Expression::column("region"), Expression::value(Value::Integer(1)))
                .and(Expression::binary(Op::Gt, Expression::column("cnt"), Expression::value(Value::Integer(5)))),
        });
        let config = OptimizerConfig::default();
        let hints = OptimizerHints::default();
        let ctx = RuleContext { config: &config, hints: &hints };
        let rewritten = PredicatePushdown.apply(&plan, &ctx).unwrap();
        let LogicalPlan::Selection(residual) = rewritten else { panic!("expected the HAVING-side conjunct to remain as a Selection, got {rewritten:?}") };
        assert_eq!(residual.predicate.referenced_columns(), vec!["cnt".to_string()]);
        let LogicalPlan::Aggregate(agg) = *residual.input else { panic!() };
        match *agg.input {
            LogicalPlan::DataSource(n) => assert!(n.pushed_predicates.is_some(), "the region=1 conjunct should have sunk onto the scan"),
            other => panic!("expected the group-by predicate to sink onto the scan, got {other:?}"),
        }
    }
}
