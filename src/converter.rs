// Lowers an optimized `LogicalPlan` into a `PhysicalPlan`: every operator
// picks a concrete algorithm here, informed by hints (when present) and
// the cost model (otherwise).

use crate::ast::JoinType;
use crate::catalog::DataSource;
use crate::config::OptimizerConfig;
use crate::cost::CostModel;
use crate::expr::Expression;
use crate::hints::OptimizerHints;
use crate::plan::{AggAlgorithm, JoinAlgorithm, LogicalPlan};
use crate::physical::{PhysicalPlan, TableScan};
use crate::stats::CardinalityEstimator;
use tracing::debug;

pub struct PlanConverter<'a> {
    source: &'a dyn DataSource,
    cost_model: &'a CostModel,
    hints: &'a OptimizerHints,
    config: &'a OptimizerConfig,
    cardinality: CardinalityEstimator,
}

impl<'a> PlanConverter<'a> {
    pub fn new(
        source: &'a dyn DataSource,
        cost_model: &'a CostModel,
        hints: &'a OptimizerHints,
        config: &'a OptimizerConfig,
    ) -> Self {
        Self { source, cost_model, hints, config, cardinality: CardinalityEstimator::new() }
    }

    pub fn convert(&self, plan: &LogicalPlan) -> PhysicalPlan {
        match plan {
            LogicalPlan::DataSource(n) => PhysicalPlan::TableScan(self.convert_scan(n)),
            LogicalPlan::Selection(n) => {
                PhysicalPlan::Filter { input: Box::new(self.convert(&n.input)), predicate: n.predicate.clone() }
            }
            LogicalPlan::Projection(n) => PhysicalPlan::Project {
                input: Box::new(self.convert(&n.input)),
                items: n.items.iter().map(|i| (i.expr.clone(), i.alias.clone())).collect(),
            },
            LogicalPlan::Join(n) => {
                let algorithm = n.hint_applied.unwrap_or_else(|| self.choose_join_algorithm(n));
                PhysicalPlan::Join {
                    left: Box::new(self.convert(&n.left)),
                    right: Box::new(self.convert(&n.right)),
                    algorithm,
                    join_type: n.join_type,
                    condition: n.condition.clone(),
                }
            }
            LogicalPlan::Aggregate(n) => {
                let algorithm = n.hint_applied.unwrap_or_else(|| self.choose_agg_algorithm(n));
                PhysicalPlan::Aggregate {
                    input: Box::new(self.convert(&n.input)),
                    algorithm,
                    group_by: n.group_by.clone(),
                    aggregates: n.aggregates.clone(),
                }
            }
            LogicalPlan::Sort(n) => {
                PhysicalPlan::Sort { input: Box::new(self.convert(&n.input)), order_by: n.order_by.clone() }
            }
            LogicalPlan::Limit(n) => {
                PhysicalPlan::Limit { input: Box::new(self.convert(&n.input)), limit: n.limit, offset: n.offset }
            }
            LogicalPlan::TopN(n) => PhysicalPlan::TopN {
                input: Box::new(self.convert(&n.input)),
                order_by: n.order_by.clone(),
                limit: n.limit,
                offset: n.offset,
            },
            LogicalPlan::Window(n) => PhysicalPlan::Window {
                input: Box::new(self.convert(&n.input)),
                function: n.function,
                partition_by: n.partition_by.clone(),
                order_by: n.order_by.clone(),
                alias: n.alias.clone(),
            },
            LogicalPlan::Apply(n) => {
                // Reached only if decorrelation didn't fire (e.g.
                // NO_DECORRELATE); fall back to a nested-loop-shaped filter
                // over the cross product, the safest general execution.
                debug!(kind = ?n.kind, "lowering undecorrelated Apply to nested-loop join");
                PhysicalPlan::Join {
                    left: Box::new(self.convert(&n.outer)),
                    right: Box::new(self.convert(&n.inner)),
                    algorithm: JoinAlgorithm::NestedLoop,
                    join_type: JoinType::Inner,
                    condition: None,
                }
            }
            LogicalPlan::Union(n) => {
                PhysicalPlan::Union { inputs: n.inputs.iter().map(|p| self.convert(p)).collect(), distinct: n.distinct }
            }
            LogicalPlan::Insert(n) => {
                PhysicalPlan::Insert { table: n.table.clone(), columns: n.columns.clone(), values: n.values.clone() }
            }
            LogicalPlan::Update(n) => PhysicalPlan::Update {
                table: n.table.clone(),
                assignments: n.assignments.clone(),
                input: Box::new(self.convert(&n.input)),
            },
            LogicalPlan::Delete(n) => {
                PhysicalPlan::Delete { table: n.table.clone(), input: Box::new(self.convert(&n.input)) }
            }
        }
    }

    fn convert_scan(&self, n: &crate::plan::DataSourceNode) -> TableScan {
        let columns = n.projected_columns.clone().unwrap_or_else(|| n.schema.columns.iter().map(|c| c.name.clone()).collect());
        let (order_by, index_order_limit, index_order_offset) = match &n.pushed_topn {
            Some((order, limit, offset)) => (Some(order.clone()), Some(*limit), Some(*offset)),
            None => (None, None, None),
        };
        let (limit, offset) = match &n.pushed_limit {
            Some((l, o)) => (*l, *o),
            None => (index_order_limit, index_order_offset),
        };

        let index = self.select_index(&n.table, &n.index_directive, &n.pushed_predicates);
        let rows = self.estimate_scan_rows(&n.table, &n.pushed_predicates);
        let has_local_filter = n.pushed_predicates.is_some();
        let parallel = rows >= 100 && !has_local_filter && self.config.parallelism.resolve(self.cost_model.hardware().cores) > 1;

        TableScan {
            table: n.table.clone(),
            columns,
            filter: n.pushed_predicates.clone(),
            limit,
            offset,
            order_by,
            index,
            index_only: false,
            parallel,
        }
    }

    /// Resolve the hint-derived `IndexDirective` against the table's real
    /// indexes, honoring FORCE_INDEX > USE_INDEX > IGNORE_INDEX >
    /// ORDER_INDEX > NO_ORDER_INDEX. Falls back to `None` (full scan) when
    /// no index applies or the table metadata can't be fetched.
    fn select_index(&self, table: &str, directive: &crate::plan::IndexDirective, filter: &Option<Expression>) -> Option<String> {
        let Ok(info) = self.source.get_table_info(table) else { return None };

        if let Some(name) = &directive.forced {
            if info.indexes.iter().any(|i| &i.name == name) {
                return Some(name.clone());
            }
        }
        if let Some(allowed) = &directive.allowed {
            if let Some(i) = info.indexes.iter().find(|i| allowed.contains(&i.name)) {
                return Some(i.name.clone());
            }
        }
        if let Some(name) = &directive.order_index {
            if info.indexes.iter().any(|i| &i.name == name) {
                return Some(name.clone());
            }
        }

        // No hint decided it: pick the index whose leading column is
        // referenced by an equality/range predicate, excluding anything
        // IGNORE_INDEX named.
        let filter_cols = filter.as_ref().map(|f| f.referenced_columns()).unwrap_or_default();
        info.indexes
            .iter()
            .filter(|i| !directive.ignored.contains(&i.name))
            .find(|i| i.columns.first().map(|c| filter_cols.contains(c)).unwrap_or(false))
            .map(|i| i.name.clone())
    }

    fn estimate_scan_rows(&self, table: &str, filter: &Option<Expression>) -> u64 {
        let Some(stats) = self.source.get_table_stats(table) else { return 0 };
        match filter {
            Some(expr) => {
                let selectivity = self.cardinality.filter_selectivity(Some(&stats), expr);
                ((stats.row_count as f64) * selectivity).round() as u64
            }
            None => stats.row_count,
        }
    }

    fn estimate_rows(&self, plan: &LogicalPlan) -> u64 {
        match plan {
            LogicalPlan::DataSource(n) => self.estimate_scan_rows(&n.table, &n.pushed_predicates),
            LogicalPlan::Selection(n) => {
                let input_rows = self.estimate_rows(&n.input);
                let stats = self.table_stats_for(&n.input);
                let sel = self.cardinality.filter_selectivity(stats.as_ref(), &n.predicate);
                (input_rows as f64 * sel).round() as u64
            }
            LogicalPlan::Join(n) => {
                let left = self.estimate_rows(&n.left);
                let right = self.estimate_rows(&n.right);
                match n.join_type {
                    JoinType::Cross => self.cardinality.cross_join_cardinality(left, right),
                    JoinType::Semi | JoinType::AntiSemi => self.cardinality.semi_join_cardinality(left, 0.3),
                    _ => self.cardinality.join_cardinality(left, right, None, None),
                }
            }
            LogicalPlan::Aggregate(n) => {
                let input_rows = self.estimate_rows(&n.input);
                let ndvs: Vec<u64> = n.group_by.iter().map(|_| 100).collect();
                self.cardinality.aggregate_cardinality(input_rows, &ndvs)
            }
            _ => plan.children().first().map(|c| self.estimate_rows(c)).unwrap_or(1),
        }
    }

    fn table_stats_for(&self, plan: &LogicalPlan) -> Option<crate::stats::TableStatistics> {
        match plan {
            LogicalPlan::DataSource(n) => self.source.get_table_stats(&n.table),
            _ => plan.children().first().and_then(|c| self.table_stats_for(c)),
        }
    }

    fn choose_join_algorithm(&self, n: &crate::plan::JoinNode) -> JoinAlgorithm {
        if self.hints.no_hash_join {
            return JoinAlgorithm::Merge;
        }
        let left_rows = self.estimate_rows(&n.left);
        let right_rows = self.estimate_rows(&n.right);
        let output_rows = self.estimate_rows(&LogicalPlan::Join(n.clone()));

        let has_equi_condition = n.condition.as_ref().map(equi_join_condition).unwrap_or(false);
        if !has_equi_condition {
            return JoinAlgorithm::NestedLoop;
        }

        let hash_cost = self.cost_model.hash_join_cost(left_rows, right_rows, output_rows);
        let merge_cost = self.cost_model.merge_join_cost(left_rows, right_rows, self.cost_model.sort_cost(left_rows) + self.cost_model.sort_cost(right_rows));

        if hash_cost.0 <= merge_cost.0 {
            JoinAlgorithm::Hash
        } else {
            JoinAlgorithm::Merge
        }
    }

    fn choose_agg_algorithm(&self, n: &crate::plan::AggregateNode) -> AggAlgorithm {
        if n.group_by.is_empty() {
            return AggAlgorithm::Hash;
        }
        // Streaming aggregation is only valid when the input is already
        // sorted on (a prefix of) the group-by columns.
        if let LogicalPlan::Sort(sort) = n.input.as_ref() {
            let sort_cols: Vec<String> = sort.order_by.iter().flat_map(|o| o.expr.referenced_columns()).collect();
            if n.group_by.iter().zip(sort_cols.iter()).all(|(a, b)| a == b) {
                return AggAlgorithm::Stream;
            }
        }
        AggAlgorithm::Hash
    }
}

fn equi_join_condition(expr: &Expression) -> bool {
    match expr {
        Expression::Operator { op: crate::expr::Op::Eq, left, right } => {
            matches!((left.as_ref(), right.as_ref()), (Expression::Column(_), Expression::Column(_)))
        }
        Expression::Operator { op: crate::expr::Op::And, left, right } => {
            equi_join_condition(left) || equi_join_condition(right)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{IndexInfo, TableInfo};
    use crate::error::OptError;
    use crate::plan::{DataSourceNode, IndexDirective, JoinNode};
    use crate::schema::{ColumnDef, Schema};
    use crate::stats::{ColumnStatistics, TableStatistics};
    use crate::value::DataType;

    struct FakeSource;
    impl DataSource for FakeSource {
        fn get_table_info(&self, name: &str) -> Result<TableInfo, OptError> {
            Ok(TableInfo {
                name: name.to_string(),
                columns: vec![],
                indexes: vec![IndexInfo { name: "idx_id".into(), columns: vec!["id".into()], unique: true }],
            })
        }
        fn get_table_stats(&self, _name: &str) -> Option<TableStatistics> {
            Some(TableStatistics::new(500).with_column("id", ColumnStatistics::new(500)))
        }
        fn get_column_stats(&self, _table: &str, _column: &str) -> Option<ColumnStatistics> {
            None
        }
    }

    fn scan(table: &str, pushed_predicates: Option<Expression>) -> LogicalPlan {
        LogicalPlan::DataSource(DataSourceNode {
            table: table.to_string(),
            schema: Schema::new(vec![ColumnDef::new("id", DataType::Integer, false)]),
            pushed_predicates,
            projected_columns: None,
            pushed_limit: None,
            pushed_topn: None,
            index_directive: IndexDirective::default(),
        })
    }

    #[test]
    fn index_hint_resolves_to_real_index() {
        let source = FakeSource;
        let cost_model = CostModel::new(crate::cost::HardwareProfile::default());
        let hints = OptimizerHints::default();
        let config = OptimizerConfig::default();
        let converter = PlanConverter::new(&source, &cost_model, &hints, &config);

        let mut node = match scan("orders", None) {
            LogicalPlan::DataSource(n) => n,
            _ => unreachable!(),
        };
        node.index_directive.forced = Some("idx_id".to_string());
        let physical = converter.convert_scan(&node);
        assert_eq!(physical.index, Some("idx_id".to_string()));
    }

    #[test]
    fn scan_with_local_filter_is_not_parallel() {
        let source = FakeSource;
        let cost_model = CostModel::new(crate::cost::HardwareProfile::default());
        let hints = OptimizerHints::default();
        let config = OptimizerConfig::default();
        let converter = PlanConverter::new(&source, &cost_model, &hints, &config);

        let predicate = Expression::binary(crate::expr::Op::Eq, Expression::column("id"), Expression::value(crate::value::Value::Integer(1)));
        let node = match scan("orders", Some(predicate)) {
            LogicalPlan::DataSource(n) => n,
            _ => unreachable!(),
        };
        let physical = converter.convert_scan(&node);
        assert!(!physical.parallel);
    }

    #[test]
    fn join_without_equi_condition_uses_nested_loop() {
        let source = FakeSource;
        let cost_model = CostModel::new(crate::cost::HardwareProfile::default());
        let hints = OptimizerHints::default();
        let config = OptimizerConfig::default();
        let converter = PlanConverter::new(&source, &cost_model, &hints, &config);

        let join = JoinNode {
            left: Box::new(scan("orders", None)),
            right: Box::new(scan("customers", None)),
            join_type: JoinType::Inner,
            condition: None,
            hint_applied: None,
        };
        let physical = converter.convert(&LogicalPlan::Join(join));
        match physical {
            PhysicalPlan::Join { algorithm, .. } => assert_eq!(algorithm, JoinAlgorithm::NestedLoop),
            _ => panic!("expected Join"),
        }
    }
}
