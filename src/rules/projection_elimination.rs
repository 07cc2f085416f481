// Projection elimination: drop a `Projection`
// that reproduces its input's columns unchanged — a no-op left behind by
// earlier stages (e.g. a `SELECT *` over a subtree that already exposes
// exactly the right shape) that would otherwise cost a row copy for
// nothing.

use super::{Rule, RuleContext};
use crate::expr::Expression;
use crate::plan::LogicalPlan;

pub struct ProjectionElimination;

impl Rule for ProjectionElimination {
    fn name(&self) -> &'static str {
        "projection_elimination"
    }

    fn matches(&self, plan: &LogicalPlan) -> bool {
        matches!(plan, LogicalPlan::Projection(_))
    }

    fn apply(&self, plan: &LogicalPlan, _ctx: &RuleContext) -> Option<LogicalPlan> {
        let LogicalPlan::Projection(node) = plan else { return None };
        let input_schema = node.input.schema();
        if node.items.len() != input_schema.columns.len() {
            return None;
        }
        let is_identity = node.items.iter().zip(input_schema.columns.iter()).all(|(item, col)| {
            let renamed = item.alias.as_ref().is_some_and(|a| a != &col.name);
            !renamed && matches!(&item.expr, Expression::Column(c) if c == &col.name)
        });
        if is_identity {
            Some((*node.input).clone())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptimizerConfig;
    use crate::hints::OptimizerHints;
    use crate::plan::{DataSourceNode, IndexDirective, ProjectionItem, ProjectionNode};
    use crate::schema::{ColumnDef, Schema};
    use crate::value::DataType;

    fn scan() -> LogicalPlan {
        LogicalPlan::DataSource(DataSourceNode {
            table: "t".to_string(),
            schema: Schema::new(vec![ColumnDef::new("a", DataType::Integer, true), ColumnDef::new("b", DataType::Integer, true)]),
            pushed_predicates: None,
            projected_columns: None,
            pushed_limit: None,
            pushed_topn: None,
            index_directive: IndexDirective::default(),
        })
    }

    #[test]
    fn identity_projection_is_removed() {
        let plan = LogicalPlan::Projection(ProjectionNode {
            input: Box::new(scan()),
            items: vec![
                ProjectionItem { expr: Expression::column("a"), alias: None },
                ProjectionItem { expr: Expression::column("b"), alias: None },
            ],
        });
        let config = OptimizerConfig::default();
        let hints = OptimizerHints::default();
        let ctx = RuleContext { config: &config, hints: &hints };
        let rewritten = ProjectionElimination.apply(&plan, &ctx).unwrap();
        assert!(matches!(rewritten, LogicalPlan::DataSource(_)));
    }

    #[test]
    fn renaming_projection_is_kept() {
        let plan = LogicalPlan::Projection(ProjectionNode {
            input: Box::new(scan()),
            items: vec![
                ProjectionItem { expr: Expression::column("a"), alias: Some("x".into()) },
                ProjectionItem { expr: Expression::column("b"), alias: None },
            ],
        });
        let config = OptimizerConfig::default();
        let hints = OptimizerHints::default();
        let ctx = RuleContext { config: &config, hints: &hints };
        assert!(ProjectionElimination.apply(&plan, &ctx).is_none());
    }

    #[test]
    fn reordering_projection_is_kept() {
        let plan = LogicalPlan::Projection(ProjectionNode {
            input: Box::new(scan()),
            items: vec![
                ProjectionItem { expr: Expression::column("b"), alias: None },
                ProjectionItem { expr: Expression::column("a"), alias: None },
            ],
        });
        let config = OptimizerConfig::default();
        let hints = OptimizerHints::default();
        assert!(ProjectionElimination.apply(&plan, &RuleContext { config: &config, hints: &hints }).is_none());
    }
}
