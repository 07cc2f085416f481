// Semi-join rewrite, gated by the `SEMI_JOIN_REWRITE` hint.
//
// An inner join against a side that's only been grouped to deduplicate it
// (no aggregate expressions, just `GROUP BY` used as a `DISTINCT`) only
// needs to know a match *exists* — the grouping is pure overhead once the
// join itself is rewritten to stop at the first match.

use super::{Rule, RuleContext};
use crate::ast::JoinType;
use crate::plan::{JoinNode, LogicalPlan};

pub struct SemiJoinRewrite;

impl Rule for SemiJoinRewrite {
    fn name(&self) -> &'static str {
        "semi_join_rewrite"
    }

    fn matches(&self, plan: &LogicalPlan) -> bool {
        matches!(plan, LogicalPlan::Join(n) if n.join_type == JoinType::Inner && dedup_only(&n.right))
    }

    fn apply(&self, plan: &LogicalPlan, ctx: &RuleContext) -> Option<LogicalPlan> {
        if !ctx.hints.semi_join_rewrite {
            return None;
        }
        let LogicalPlan::Join(node) = plan else { return None };
        let LogicalPlan::Aggregate(agg) = node.right.as_ref() else { return None };
        Some(LogicalPlan::Join(JoinNode {
            left: node.left.clone(),
            right: agg.input.clone(),
            join_type: JoinType::Semi,
            condition: node.condition.clone(),
            hint_applied: None,
        }))
    }
}

fn dedup_only(plan: &LogicalPlan) -> bool {
    matches!(plan, LogicalPlan::Aggregate(n) if !n.group_by.is_empty() && n.aggregates.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptimizerConfig;
    use crate::hints::OptimizerHints;
    use crate::plan::{AggregateNode, DataSourceNode, IndexDirective};
    use crate::schema::{ColumnDef, Schema};
    use crate::value::DataType;

    fn scan(table: &str, col: &str) -> LogicalPlan {
        LogicalPlan::DataSource(DataSourceNode {
            table: table.to_string(),
            schema: Schema::new(vec![ColumnDef::new(col, DataType::Integer, true)]),
            pushed_predicates: None,
            projected_columns: None,
            pushed_limit: None,
            pushed_topn: None,
            index_directive: IndexDirective::default(),
        })
    }

    fn plan() -> LogicalPlan {
        LogicalPlan::Join(JoinNode {
            left: Box::new(scan("orders", "cid")),
            right: Box::new(LogicalPlan::Aggregate(AggregateNode {
                input: Box::new(scan("customers", "id")),
                group_by: vec!["id".into()],
                aggregates: vec![],
                hint_applied: None,
            })),
            join_type: JoinType::Inner,
            condition: None,
            hint_applied: None,
        })
    }

    #[test]
    fn rewrites_dedup_join_to_semi_when_hinted() {
        let config = OptimizerConfig::default();
        let hints = OptimizerHints::from_raw("/*+ SEMI_JOIN_REWRITE */");
        let rewritten = SemiJoinRewrite.apply(&plan(), &RuleContext { config: &config, hints: &hints }).unwrap();
        let LogicalPlan::Join(n) = rewritten else { panic!() };
        assert_eq!(n.join_type, JoinType::Semi);
        assert!(matches!(n.right.as_ref(), LogicalPlan::DataSource(_)));
    }

    #[test]
    fn leaves_plan_alone_without_hint() {
        let config = OptimizerConfig::default();
        let hints = OptimizerHints::default();
        assert!(SemiJoinRewrite.apply(&plan(), &RuleContext { config: &config, hints: &hints }).is_none());
    }
}
