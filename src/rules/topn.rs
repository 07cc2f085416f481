// TopN pushdown and derivation.

use super::{Rule, RuleContext};
use crate::ast::JoinType;
use crate::expr::{Expression, Op};
use crate::plan::{JoinNode, LimitNode, LogicalPlan, ProjectionNode, TopNNode, WindowFunctionKind};
use crate::value::Value;

/// Fuses `Limit` directly over `Sort` into a single `TopN`, then sinks the
/// `TopN` below `Projection` (always) and below the row-preserving side of
/// an outer join. Pushing below `Selection` is skipped: a filter can
/// eliminate rows below the cut, and the cases where it provably can't are
/// rare enough that the plan usually just stops here.
pub struct TopNPushdown;

impl Rule for TopNPushdown {
    fn name(&self) -> &'static str {
        "topn_pushdown"
    }

    fn matches(&self, plan: &LogicalPlan) -> bool {
        matches!(plan, LogicalPlan::Limit(n) if matches!(n.input.as_ref(), LogicalPlan::Sort(_) | LogicalPlan::TopN(_)))
            || matches!(plan, LogicalPlan::TopN(n) if matches!(n.input.as_ref(), LogicalPlan::Projection(_) | LogicalPlan::Join(_)))
    }

    fn apply(&self, plan: &LogicalPlan, _ctx: &RuleContext) -> Option<LogicalPlan> {
        match plan {
            LogicalPlan::Limit(limit) => fuse_limit(limit),
            LogicalPlan::TopN(topn) => push_topn(topn),
            _ => None,
        }
    }
}

fn fuse_limit(limit: &LimitNode) -> Option<LogicalPlan> {
    match limit.input.as_ref() {
        LogicalPlan::Sort(sort) => Some(LogicalPlan::TopN(TopNNode {
            input: sort.input.clone(),
            order_by: sort.order_by.clone(),
            limit: limit.limit.unwrap_or(u64::MAX),
            offset: limit.offset.unwrap_or(0),
        })),
        // A tighter outer Limit over an already-fused TopN (the window
        // derivation path can produce this) keeps the smaller cutoff.
        LogicalPlan::TopN(inner) => {
            let outer_limit = limit.limit.unwrap_or(u64::MAX);
            Some(LogicalPlan::TopN(TopNNode {
                input: inner.input.clone(),
                order_by: inner.order_by.clone(),
                limit: inner.limit.min(outer_limit),
                offset: limit.offset.unwrap_or(inner.offset),
            }))
        }
        _ => None,
    }
}

fn push_topn(topn: &TopNNode) -> Option<LogicalPlan> {
    match topn.input.as_ref() {
        LogicalPlan::Projection(proj) => Some(LogicalPlan::Projection(ProjectionNode {
            input: Box::new(LogicalPlan::TopN(TopNNode {
                input: proj.input.clone(),
                order_by: topn.order_by.clone(),
                limit: topn.limit,
                offset: topn.offset,
            })),
            items: proj.items.clone(),
        })),
        LogicalPlan::Join(join) => push_topn_into_join(topn, join),
        _ => None,
    }
}

/// Only the side whose rows survive unconditionally (the preserved side of
/// an outer join) can receive the cut, and only when every sort key belongs
/// to that side — otherwise the limit would drop rows the join still needs.
fn push_topn_into_join(topn: &TopNNode, join: &JoinNode) -> Option<LogicalPlan> {
    let sort_cols: Vec<String> = topn.order_by.iter().flat_map(|o| o.expr.referenced_columns()).collect();
    let preserved_left = matches!(join.join_type, JoinType::LeftOuter) && sort_cols.iter().all(|c| join.left.schema().contains(c));
    let preserved_right = matches!(join.join_type, JoinType::RightOuter) && sort_cols.iter().all(|c| join.right.schema().contains(c));

    if preserved_left {
        let mut new_join = join.clone();
        new_join.left = Box::new(LogicalPlan::TopN(TopNNode {
            input: join.left.clone(),
            order_by: topn.order_by.clone(),
            limit: topn.limit,
            offset: topn.offset,
        }));
        Some(LogicalPlan::Join(new_join))
    } else if preserved_right {
        let mut new_join = join.clone();
        new_join.right = Box::new(LogicalPlan::TopN(TopNNode {
            input: join.right.clone(),
            order_by: topn.order_by.clone(),
            limit: topn.limit,
            offset: topn.offset,
        }));
        Some(LogicalPlan::Join(new_join))
    } else {
        None
    }
}

/// `ROW_NUMBER() OVER (ORDER BY k) <= N` followed by `Limit N` collapses to
/// `TopN(k, N)`, the window dropped entirely — only valid without a
/// `PARTITION BY`, since a partitioned row number resets per group.
pub struct DeriveTopNFromWindow;

impl Rule for DeriveTopNFromWindow {
    fn name(&self) -> &'static str {
        "derive_topn_from_window"
    }

    fn matches(&self, plan: &LogicalPlan) -> bool {
        matches!(plan, LogicalPlan::Selection(n) if matches!(n.input.as_ref(), LogicalPlan::Window(w) if w.function == WindowFunctionKind::RowNumber && w.partition_by.is_empty()))
    }

    fn apply(&self, plan: &LogicalPlan, _ctx: &RuleContext) -> Option<LogicalPlan> {
        let LogicalPlan::Selection(sel) = plan else { return None };
        let LogicalPlan::Window(window) = sel.input.as_ref() else { return None };
        let n = row_number_cutoff(&sel.predicate, &window.alias)?;
        Some(LogicalPlan::TopN(TopNNode {
            input: window.input.clone(),
            order_by: window.order_by.clone(),
            limit: n,
            offset: 0,
        }))
    }
}

/// Recognizes `alias <= N` (in either operand order) and returns `N`.
fn row_number_cutoff(predicate: &Expression, alias: &str) -> Option<u64> {
    let Expression::Operator { op: Op::LtEq, left, right } = predicate else { return None };
    let as_cutoff = |col: &Expression, val: &Expression| match (col, val) {
        (Expression::Column(c), Expression::Value(Value::Integer(n))) if c == alias && *n >= 0 => Some(*n as u64),
        _ => None,
    };
    as_cutoff(left, right).or_else(|| as_cutoff(right, left))
}
