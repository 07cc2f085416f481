// Subquery flattening: a canonicalizing rule that runs before the
// reducing/reordering passes.
//
// The upstream AST has no derived-table-in-FROM representation — a
// `FROM (SELECT ...) t` is handed to this crate already lowered by the
// plan builder into a stack of operators over the same `DataSource`, not a
// nested statement. Flattening that stack is this crate's equivalent of
// the classical "inline the derived table" rewrite: collapse adjacent
// `Selection`s into one conjunction and adjacent `Projection`s into one
// projection list, so every later rule sees the shallowest tree possible
// before it has to pattern-match through it.

use super::{Rule, RuleContext};
use crate::expr::Expression;
use crate::plan::{LogicalPlan, ProjectionNode, SelectionNode};

pub struct SubqueryFlattening;

impl Rule for SubqueryFlattening {
    fn name(&self) -> &'static str {
        "subquery_flattening"
    }

    fn matches(&self, plan: &LogicalPlan) -> bool {
        matches!(plan, LogicalPlan::Selection(n) if matches!(n.input.as_ref(), LogicalPlan::Selection(_)))
            || matches!(plan, LogicalPlan::Projection(n) if matches!(n.input.as_ref(), LogicalPlan::Projection(_)))
    }

    fn apply(&self, plan: &LogicalPlan, _ctx: &RuleContext) -> Option<LogicalPlan> {
        match plan {
            LogicalPlan::Selection(outer) => {
                let LogicalPlan::Selection(inner) = outer.input.as_ref() else { return None };
                Some(LogicalPlan::Selection(SelectionNode {
                    input: inner.input.clone(),
                    predicate: inner.predicate.clone().and(outer.predicate.clone()),
                }))
            }
            LogicalPlan::Projection(outer) => {
                let LogicalPlan::Projection(inner) = outer.input.as_ref() else { return None };
                // Only fuse when the outer projection is a pure pass-through
                // of the inner one's output columns — substituting a real
                // outer expression through an aliased inner one would need
                // a general expression-rewrite pass this crate doesn't have.
                let fused = outer.items.iter().map(|item| {
                    let Expression::Column(name) = &item.expr else { return None };
                    inner.items.iter().find(|inner_item| {
                        inner_item.alias.as_deref().unwrap_or_else(|| match &inner_item.expr {
                            Expression::Column(c) => c.as_str(),
                            _ => "",
                        }) == name
                    }).map(|inner_item| crate::plan::ProjectionItem {
                        expr: inner_item.expr.clone(),
                        alias: item.alias.clone().or_else(|| inner_item.alias.clone()),
                    })
                }).collect::<Option<Vec<_>>>()?;
                Some(LogicalPlan::Projection(ProjectionNode { input: inner.input.clone(), items: fused }))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptimizerConfig;
    use crate::expr::Op;
    use crate::hints::OptimizerHints;
    use crate::plan::{DataSourceNode, IndexDirective, ProjectionItem};
    use crate::schema::{ColumnDef, Schema};
    use crate::value::{DataType, Value};

    fn scan() -> LogicalPlan {
        LogicalPlan::DataSource(DataSourceNode {
            table: "t".to_string(),
            schema: Schema::new(vec![ColumnDef::new("a", DataType::Integer, true)]),
            pushed_predicates: None,
            projected_columns: None,
            pushed_limit: None,
            pushed_topn: None,
            index_directive: IndexDirective::default(),
        })
    }

    #[test]
    fn nested_selections_fuse_into_one_conjunction() {
        let plan = LogicalPlan::Selection(SelectionNode {
            input: Box::new(LogicalPlan::Selection(SelectionNode {
                input: Box::new(scan()),
                predicate: Expression::binary(Op::Gt, Expression::column("a"), Expression::value(Value::Integer(1))),
            })),
            predicate: Expression::binary(Op::Lt, Expression::column("a"), Expression::value(Value::Integer(10))),
        });
        let config = OptimizerConfig::default();
        let hints = OptimizerHints::default();
        let rewritten = SubqueryFlattening.apply(&plan, &RuleContext { config: &config, hints: &hints }).unwrap();
        let LogicalPlan::Selection(n) = rewritten else { panic!() };
        assert_eq!(n.predicate.split_conjuncts().len(), 2);
        assert!(matches!(n.input.as_ref(), LogicalPlan::DataSource(_)));
    }

    #[test]
    fn passthrough_projections_fuse() {
        let plan = LogicalPlan::Projection(ProjectionNode {
            input: Box::new(LogicalPlan::Projection(ProjectionNode {
                input: Box::new(scan()),
                items: vec![ProjectionItem { expr: Expression::column("a"), alias: Some("a2".into()) }],
            })),
            items: vec![ProjectionItem { expr: Expression::column("a2"), alias: None }],
        });
        let config = OptimizerConfig::default();
        let hints = OptimizerHints::default();
        let rewritten = SubqueryFlattening.apply(&plan, &RuleContext { config: &config, hints: &hints }).unwrap();
        let LogicalPlan::Projection(n) = rewritten else { panic!() };
        assert!(matches!(n.input.as_ref(), LogicalPlan::DataSource(_)));
        assert_eq!(n.items.len(), 1);
    }
}
