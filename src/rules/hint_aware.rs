// Hint-aware rules. These run first in
// `RuleSet::standard` so every later, cost-based decision already sees the
// hint-forced choices.

use super::{Rule, RuleContext};
use crate::plan::{AggAlgorithm, JoinAlgorithm, LogicalPlan};

/// `HASH_JOIN`/`MERGE_JOIN`/`INL_JOIN`/`NO_HASH_JOIN`: force the physical
/// join algorithm a `Join` node will later be lowered to, overriding the
/// plan converter's cost-based choice.
pub struct HintAwareJoin;

impl Rule for HintAwareJoin {
    fn name(&self) -> &'static str {
        "hint_aware_join"
    }

    fn matches(&self, plan: &LogicalPlan) -> bool {
        matches!(plan, LogicalPlan::Join(n) if n.hint_applied.is_none())
    }

    fn apply(&self, plan: &LogicalPlan, ctx: &RuleContext) -> Option<LogicalPlan> {
        let LogicalPlan::Join(node) = plan else { return None };
        let left_tables = table_names(&node.left);
        let right_tables = table_names(&node.right);
        let pair_hinted = ctx.hints.hash_join_pairs.iter().any(|(a, b)| {
            (left_tables.contains(a) && right_tables.contains(b)) || (left_tables.contains(b) && right_tables.contains(a))
        });

        let algorithm = if pair_hinted {
            Some(JoinAlgorithm::Hash)
        } else if ctx.hints.merge_join {
            Some(JoinAlgorithm::Merge)
        } else if ctx.hints.inl_join {
            Some(JoinAlgorithm::IndexNestedLoop)
        } else if ctx.hints.no_hash_join {
            Some(JoinAlgorithm::Merge)
        } else {
            None
        };

        algorithm.map(|alg| {
            let mut new_node = node.clone();
            new_node.hint_applied = Some(alg);
            LogicalPlan::Join(new_node)
        })
    }
}

/// `FORCE_INDEX`/`USE_INDEX`/`IGNORE_INDEX`/`ORDER_INDEX`/`NO_ORDER_INDEX`:
/// copy the per-table index directive onto the matching `DataSource`.
pub struct HintAwareIndex;

impl Rule for HintAwareIndex {
    fn name(&self) -> &'static str {
        "hint_aware_index"
    }

    fn matches(&self, plan: &LogicalPlan) -> bool {
        matches!(plan, LogicalPlan::DataSource(_))
    }

    fn apply(&self, plan: &LogicalPlan, ctx: &RuleContext) -> Option<LogicalPlan> {
        let LogicalPlan::DataSource(node) = plan else { return None };
        let Some(hint) = ctx.hints.index_hints.get(&node.table) else { return None };

        let directive = crate::plan::IndexDirective {
            forced: hint.force.clone(),
            allowed: if hint.allowed.is_empty() { None } else { Some(hint.allowed.clone()) },
            ignored: hint.ignored.clone(),
            order_index: hint.order_index.clone(),
            no_order_index: hint.no_order_index,
        };
        if directive_eq(&node.index_directive, &directive) {
            return None;
        }
        let mut new_node = node.clone();
        new_node.index_directive = directive;
        Some(LogicalPlan::DataSource(new_node))
    }
}

fn directive_eq(a: &crate::plan::IndexDirective, b: &crate::plan::IndexDirective) -> bool {
    a.forced == b.forced && a.allowed == b.allowed && a.ignored == b.ignored && a.order_index == b.order_index && a.no_order_index == b.no_order_index
}

/// `HASH_AGG`/`STREAM_AGG`: force the aggregation algorithm.
pub struct HintAwareAggregation;

impl Rule for HintAwareAggregation {
    fn name(&self) -> &'static str {
        "hint_aware_aggregation"
    }

    fn matches(&self, plan: &LogicalPlan) -> bool {
        matches!(plan, LogicalPlan::Aggregate(n) if n.hint_applied.is_none())
    }

    fn apply(&self, plan: &LogicalPlan, ctx: &RuleContext) -> Option<LogicalPlan> {
        let LogicalPlan::Aggregate(node) = plan else { return None };
        // HASH_AGG wins when both appear, matching the rest of the hint
        // system's "more specific/forceful hint wins" convention.
        let algorithm = if ctx.hints.hash_agg {
            Some(AggAlgorithm::Hash)
        } else if ctx.hints.stream_agg {
            Some(AggAlgorithm::Stream)
        } else {
            None
        };
        algorithm.map(|alg| {
            let mut new_node = node.clone();
            new_node.hint_applied = Some(alg);
            LogicalPlan::Aggregate(new_node)
        })
    }
}

fn table_names(plan: &LogicalPlan) -> Vec<String> {
    match plan {
        LogicalPlan::DataSource(n) => vec![n.table.clone()],
        _ => plan.children().iter().flat_map(|c| table_names(c)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::JoinType;
    use crate::config::OptimizerConfig;
    use crate::hints::OptimizerHints;
    use crate::plan::{DataSourceNode, IndexDirective, JoinNode};
    use crate::schema::{ColumnDef, Schema};
    use crate::value::DataType;

    fn scan(table: &str) -> LogicalPlan {
        LogicalPlan::DataSource(DataSourceNode {
            table: table.to_string(),
            schema: Schema::new(vec![ColumnDef::new("k", DataType::Integer, false).with_qualifier(table)]),
            pushed_predicates: None,
            projected_columns: None,
            pushed_limit: None,
            pushed_topn: None,
            index_directive: IndexDirective::default(),
        })
    }

    #[test]
    fn hash_join_hint_forces_algorithm_for_named_pair() {
        let plan = LogicalPlan::Join(JoinNode {
            left: Box::new(scan("a")),
            right: Box::new(scan("b")),
            join_type: JoinType::Inner,
            condition: None,
            hint_applied: None,
        });
        let config = OptimizerConfig::default();
        let hints = OptimizerHints::from_raw("/*+ HASH_JOIN(a,b) */");
        let ctx = RuleContext { config: &config, hints: &hints };
        let rewritten = HintAwareJoin.apply(&plan, &ctx).unwrap();
        let LogicalPlan::Join(n) = rewritten else { panic!() };
        assert_eq!(n.hint_applied, Some(JoinAlgorithm::Hash));
    }

    #[test]
    fn force_index_hint_sets_directive_on_matching_scan() {
        let plan = scan("orders");
        let config = OptimizerConfig::default();
        let hints = OptimizerHints::from_raw("/*+ FORCE_INDEX(orders, idx_k) */");
        let ctx = RuleContext { config: &config, hints: &hints };
        let rewritten = HintAwareIndex.apply(&plan, &ctx).unwrap();
        let LogicalPlan::DataSource(n) = rewritten else { panic!() };
        assert_eq!(n.index_directive.forced, Some("idx_k".to_string()));
    }

    #[test]
    fn hash_agg_wins_over_stream_agg_when_both_present() {
        let plan = LogicalPlan::Aggregate(crate::plan::AggregateNode {
            input: Box::new(scan("t")),
            group_by: vec!["k".into()],
            aggregates: vec![],
            hint_applied: None,
        });
        let config = OptimizerConfig::default();
        let hints = OptimizerHints::from_raw("/*+ HASH_AGG STREAM_AGG */");
        let ctx = RuleContext { config: &config, hints: &hints };
        let rewritten = HintAwareAggregation.apply(&plan, &ctx).unwrap();
        let LogicalPlan::Aggregate(n) = rewritten else { panic!() };
        assert_eq!(n.hint_applied, Some(AggAlgorithm::Hash));
    }
}
