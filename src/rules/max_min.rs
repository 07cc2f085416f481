// MAX/MIN elimination: a single-column MAX/MIN with no GROUP BY
// never needs a full aggregation pass — the extremal value is just the
// first row of a sorted, non-null scan.

use super::{Rule, RuleContext};
use crate::ast::{AggKind, AggregateItem, JoinType};
use crate::expr::{Expression, Op};
use crate::plan::{AggregateNode, JoinNode, LimitNode, LogicalPlan, SelectionNode, SortNode};

pub struct MaxMinElimination;

impl Rule for MaxMinElimination {
    fn name(&self) -> &'static str {
        "max_min_elimination"
    }

    fn matches(&self, plan: &LogicalPlan) -> bool {
        match plan {
            LogicalPlan::Aggregate(n) => n.group_by.is_empty() && !n.aggregates.is_empty() && n.aggregates.iter().all(|a| matches!(a.kind, AggKind::Max | AggKind::Min)),
            _ => false,
        }
    }

    fn apply(&self, plan: &LogicalPlan, _ctx: &RuleContext) -> Option<LogicalPlan> {
        let LogicalPlan::Aggregate(node) = plan else { return None };
        if node.aggregates.len() == 1 {
            return Some(extremal_scan(&node.aggregates[0], (*node.input).clone()));
        }

        // Multiple MAX/MIN over the same input, no GROUP BY: each becomes
        // its own one-row extremal scan, combined by cross join.
        let mut subqueries = node.aggregates.iter().map(|agg| extremal_scan(agg, (*node.input).clone()));
        let first = subqueries.next()?;
        Some(subqueries.fold(first, |acc, next| {
            LogicalPlan::Join(JoinNode {
                left: Box::new(acc),
                right: Box::new(next),
                join_type: JoinType::Cross,
                condition: None,
                hint_applied: None,
            })
        }))
    }
}

/// `Aggregate(Max(c)) <- Limit(1) <- Sort(c DESC) <- Selection(c IS NOT NULL) <- input`
/// (or `Sort(c ASC)` for MIN). A `NULL` can never sort to the front of the
/// kept side since the selection excludes it first.
fn extremal_scan(agg: &AggregateItem, input: LogicalPlan) -> LogicalPlan {
    let not_null = Expression::binary(Op::IsNotNull, agg.expr.clone(), agg.expr.clone());
    let filtered = LogicalPlan::Selection(SelectionNode { input: Box::new(input), predicate: not_null });
    let sorted = LogicalPlan::Sort(SortNode {
        input: Box::new(filtered),
        order_by: vec![crate::ast::OrderByItem { expr: agg.expr.clone(), ascending: matches!(agg.kind, AggKind::Min) }],
    });
    let limited = LogicalPlan::Limit(LimitNode { input: Box::new(sorted), limit: Some(1), offset: None });
    LogicalPlan::Aggregate(AggregateNode {
        input: Box::new(limited),
        group_by: vec![],
        aggregates: vec![agg.clone()],
        hint_applied: None,
    })
}
