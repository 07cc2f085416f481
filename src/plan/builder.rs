// Bottom-up lowering from the upstream AST to `LogicalPlan`.

use crate::ast::{AggKind, SelectItem, SelectStatement, SqlStatement};
use crate::catalog::DataSource;
use crate::error::OptError;
use crate::expr::Expression;
use crate::plan::{
    AggregateNode, DataSourceNode, DeleteNode, InsertNode, JoinNode, LimitNode, LogicalPlan,
    ProjectionItem, ProjectionNode, SelectionNode, SortNode, UpdateNode,
};
use crate::schema::{ColumnDef, Schema};

pub struct PlanBuilder<'a> {
    source: &'a dyn DataSource,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(source: &'a dyn DataSource) -> Self {
        Self { source }
    }

    pub fn build(&self, stmt: &SqlStatement) -> Result<LogicalPlan, OptError> {
        match stmt {
            SqlStatement::Select(select) => self.build_select(select),
            SqlStatement::Insert(insert) => {
                let info = self.source.get_table_info(&insert.table)?;
                Ok(LogicalPlan::Insert(InsertNode {
                    table: insert.table.clone(),
                    schema: table_schema(&insert.table, &info),
                    columns: insert.columns.clone(),
                    values: insert.values.clone(),
                }))
            }
            SqlStatement::Update(update) => {
                let info = self.source.get_table_info(&update.table)?;
                let schema = table_schema(&update.table, &info);
                let mut input = self.data_source_plan(&update.table, schema.clone());
                if let Some(pred) = &update.where_clause {
                    input = LogicalPlan::Selection(SelectionNode {
                        input: Box::new(input),
                        predicate: pred.clone(),
                    });
                }
                Ok(LogicalPlan::Update(UpdateNode {
                    table: update.table.clone(),
                    schema,
                    assignments: update.assignments.clone(),
                    input: Box::new(input),
                }))
            }
            SqlStatement::Delete(delete) => {
                let info = self.source.get_table_info(&delete.table)?;
                let schema = table_schema(&delete.table, &info);
                let mut input = self.data_source_plan(&delete.table, schema.clone());
                if let Some(pred) = &delete.where_clause {
                    input = LogicalPlan::Selection(SelectionNode {
                        input: Box::new(input),
                        predicate: pred.clone(),
                    });
                }
                Ok(LogicalPlan::Delete(DeleteNode {
                    table: delete.table.clone(),
                    schema,
                    input: Box::new(input),
                }))
            }
        }
    }

    fn build_select(&self, select: &SelectStatement) -> Result<LogicalPlan, OptError> {
        // FROM -> DataSource, binding the synthetic one-row `dual` table
        // when the statement has no FROM clause (e.g. `SELECT 1`).
        let mut plan = match &select.from_table {
            Some(table) => {
                let info = self.source.get_table_info(table)?;
                self.data_source_plan(table, table_schema(table, &info))
            }
            None => self.data_source_plan("dual", dual_schema()),
        };

        for join in &select.joins {
            let info = self.source.get_table_info(&join.table)?;
            let right = self.data_source_plan(&join.table, table_schema(&join.table, &info));
            plan = LogicalPlan::Join(JoinNode {
                left: Box::new(plan),
                right: Box::new(right),
                join_type: join.join_type,
                condition: join.condition.clone(),
                hint_applied: None,
            });
        }

        // WHERE -> Selection
        if let Some(pred) = &select.where_clause {
            plan = LogicalPlan::Selection(SelectionNode {
                input: Box::new(plan),
                predicate: pred.clone(),
            });
        }

        let has_aggregates = select.columns.iter().any(|c| matches!(c, SelectItem::Aggregate(_)));

        // GROUP BY / aggregate items -> Aggregate
        if has_aggregates || !select.group_by.is_empty() {
            let aggregates = select
                .columns
                .iter()
                .filter_map(|c| match c {
                    SelectItem::Aggregate(agg) => Some(agg.clone()),
                    _ => None,
                })
                .collect::<Vec<_>>();
            plan = LogicalPlan::Aggregate(AggregateNode {
                input: Box::new(plan),
                group_by: select.group_by.clone(),
                aggregates,
                hint_applied: None,
            });

            if let Some(having) = &select.having {
                plan = LogicalPlan::Selection(SelectionNode {
                    input: Box::new(plan),
                    predicate: having.clone(),
                });
            }
        }

        // ORDER BY -> Sort
        if !select.order_by.is_empty() {
            plan = LogicalPlan::Sort(SortNode { input: Box::new(plan), order_by: select.order_by.clone() });
        }

        // LIMIT -> Limit
        if select.limit.is_some() || select.offset.is_some() {
            plan = LogicalPlan::Limit(LimitNode {
                input: Box::new(plan),
                limit: select.limit,
                offset: select.offset,
            });
        }

        // SELECT list -> Projection, skipped when Aggregate already
        // produces exactly the requested output columns.
        let needs_projection = !(has_aggregates
            && select.columns.iter().all(|c| matches!(c, SelectItem::Aggregate(_))));
        if needs_projection && !matches!(select.columns.first(), Some(SelectItem::Wildcard) if select.columns.len() == 1) {
            let items = select
                .columns
                .iter()
                .filter_map(|c| match c {
                    SelectItem::Wildcard => None,
                    SelectItem::Expr { expr, alias } => {
                        Some(ProjectionItem { expr: expr.clone(), alias: alias.clone() })
                    }
                    SelectItem::Aggregate(agg) => Some(ProjectionItem {
                        expr: agg.expr.clone(),
                        alias: agg.alias.clone(),
                    }),
                })
                .collect::<Vec<_>>();
            if !items.is_empty() {
                plan = LogicalPlan::Projection(ProjectionNode { input: Box::new(plan), items });
            }
        }

        Ok(plan)
    }

    fn data_source_plan(&self, table: &str, schema: Schema) -> LogicalPlan {
        LogicalPlan::DataSource(DataSourceNode {
            table: table.to_string(),
            schema,
            pushed_predicates: None,
            projected_columns: None,
            pushed_limit: None,
            pushed_topn: None,
            index_directive: crate::plan::IndexDirective::default(),
        })
    }
}

fn table_schema(table: &str, info: &crate::catalog::TableInfo) -> Schema {
    let columns = info
        .columns
        .iter()
        .map(|c| ColumnDef::new(c.name.clone(), c.data_type.clone(), c.nullable).with_qualifier(table))
        .collect();
    Schema::new(columns)
}

/// Synthetic one-row table bound when a `SELECT` has no `FROM` clause.
fn dual_schema() -> Schema {
    Schema::new(vec![ColumnDef::new("dummy", crate::value::DataType::Boolean, false)])
}

impl AggKind {
    pub fn name(&self) -> &'static str {
        match self {
            AggKind::Count => "COUNT",
            AggKind::Sum => "SUM",
            AggKind::Avg => "AVG",
            AggKind::Max => "MAX",
            AggKind::Min => "MIN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{OrderByItem, SelectStatement};
    use crate::catalog::{ColumnInfo, IndexInfo, TableInfo};
    use crate::expr::Op;
    use crate::stats::{ColumnStatistics, TableStatistics};
    use crate::value::DataType;

    struct FakeSource;

    impl DataSource for FakeSource {
        fn get_table_info(&self, name: &str) -> Result<TableInfo, OptError> {
            if name != "users" {
                return Err(OptError::TableNotFound(name.to_string()));
            }
            Ok(TableInfo {
                name: "users".into(),
                columns: vec![
                    ColumnInfo { name: "id".into(), data_type: DataType::Integer, nullable: false, primary_key: true, auto_increment: true },
                    ColumnInfo { name: "age".into(), data_type: DataType::Integer, nullable: true, primary_key: false, auto_increment: false },
                ],
                indexes: vec![IndexInfo { name: "pk".into(), columns: vec!["id".into()], unique: true }],
            })
        }

        fn get_table_stats(&self, _name: &str) -> Option<TableStatistics> {
            Some(TableStatistics::new(1000))
        }

        fn get_column_stats(&self, _table: &str, _column: &str) -> Option<ColumnStatistics> {
            None
        }
    }

    #[test]
    fn unknown_table_is_table_not_found() {
        let source = FakeSource;
        let builder = PlanBuilder::new(&source);
        let stmt = SqlStatement::Select(SelectStatement {
            from_table: Some("ghost".into()),
            ..Default::default()
        });
        let err = builder.build(&stmt).unwrap_err();
        assert!(matches!(err, OptError::TableNotFound(t) if t == "ghost"));
    }

    #[test]
    fn select_with_where_and_order_builds_selection_then_sort() {
        let source = FakeSource;
        let builder = PlanBuilder::new(&source);
        let stmt = SqlStatement::Select(SelectStatement {
            from_table: Some("users".into()),
            where_clause: Some(Expression::binary(
                Op::Gt,
                Expression::column("age"),
                Expression::value(crate::value::Value::Integer(30)),
            )),
            order_by: vec![OrderByItem { expr: Expression::column("age"), ascending: true }],
            columns: vec![crate::ast::SelectItem::Wildcard],
            ..Default::default()
        });
        let plan = builder.build(&stmt).unwrap();
        assert!(matches!(plan, LogicalPlan::Sort(_)));
    }

    #[test]
    fn no_from_binds_dual() {
        let source = FakeSource;
        let builder = PlanBuilder::new(&source);
        let stmt = SqlStatement::Select(SelectStatement {
            columns: vec![crate::ast::SelectItem::Expr {
                expr: Expression::value(crate::value::Value::Integer(1)),
                alias: Some("one".into()),
            }],
            ..Default::default()
        });
        let plan = builder.build(&stmt).unwrap();
        assert!(matches!(plan, LogicalPlan::Projection(_)));
    }
}
