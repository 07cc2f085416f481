// Benchmarks the DP/bushy join reorder pass in isolation, across join
// chains wide enough to exercise both the exact DP path and the
// greedy-fallback path above `dp_join_limit`.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rusty_optimizer::catalog::{ColumnInfo, DataSource, IndexInfo, TableInfo};
use rusty_optimizer::cost::{CostModel, HardwareProfile};
use rusty_optimizer::error::OptError;
use rusty_optimizer::expr::{Expression, Op};
use rusty_optimizer::hints::OptimizerHints;
use rusty_optimizer::join_reorder::reorder_joins;
use rusty_optimizer::plan::{DataSourceNode, IndexDirective, JoinNode, LogicalPlan};
use rusty_optimizer::schema::{ColumnDef, Schema};
use rusty_optimizer::stats::{ColumnStatistics, TableStatistics};
use rusty_optimizer::value::DataType;

/// A chain `t0 ⋈ t1 ⋈ ... ⋈ t{n-1}` on `t{i}.fk{i} = t{i+1}.pk{i+1}`, every
/// column name distinct across the whole chain so bare-name resolution
/// never collapses two tables onto the same join key.
struct ChainCatalog {
    n: usize,
}

impl ChainCatalog {
    fn pk(i: usize) -> String {
        format!("pk{i}")
    }
    fn fk(i: usize) -> String {
        format!("fk{i}")
    }
}

impl DataSource for ChainCatalog {
    fn get_table_info(&self, name: &str) -> Result<TableInfo, OptError> {
        let i: usize = name.strip_prefix('t').and_then(|s| s.parse().ok()).ok_or_else(|| OptError::TableNotFound(name.to_string()))?;
        if i >= self.n {
            return Err(OptError::TableNotFound(name.to_string()));
        }
        let mut columns = vec![ColumnInfo {
            name: Self::pk(i),
            data_type: DataType::Integer,
            nullable: false,
            primary_key: true,
            auto_increment: true,
        }];
        if i + 1 < self.n {
            columns.push(ColumnInfo {
                name: Self::fk(i),
                data_type: DataType::Integer,
                nullable: false,
                primary_key: false,
                auto_increment: false,
            });
        }
        Ok(TableInfo {
            name: name.to_string(),
            columns,
            indexes: vec![IndexInfo { name: format!("pk_{name}"), columns: vec![Self::pk(i)], unique: true }],
        })
    }

    fn get_table_stats(&self, name: &str) -> Option<TableStatistics> {
        let i: usize = name.strip_prefix('t')?.parse().ok()?;
        // Row counts grow geometrically down the chain so the DP search
        // has a real cost gradient to optimize over, not a flat one.
        let rows = 100u64 * 10u64.saturating_pow(i.min(4) as u32);
        let mut stats = TableStatistics::new(rows).with_column(Self::pk(i), ColumnStatistics::new(rows));
        if i + 1 < self.n {
            stats = stats.with_column(Self::fk(i), ColumnStatistics::new(rows / 4 + 1));
        }
        Some(stats)
    }

    fn get_column_stats(&self, table: &str, column: &str) -> Option<ColumnStatistics> {
        self.get_table_stats(table).and_then(|s| s.column(column).cloned())
    }
}

fn scan(i: usize) -> LogicalPlan {
    let mut columns = vec![ColumnDef::new(ChainCatalog::pk(i), DataType::Integer, false).with_qualifier(format!("t{i}"))];
    columns.push(ColumnDef::new(ChainCatalog::fk(i), DataType::Integer, false).with_qualifier(format!("t{i}")));
    LogicalPlan::DataSource(DataSourceNode {
        table: format!("t{i}"),
        schema: Schema::new(columns),
        pushed_predicates: None,
        projected_columns: None,
        pushed_limit: None,
        pushed_topn: None,
        index_directive: IndexDirective::default(),
    })
}

/// A left-deep chain of Cross joins, each carrying the equi-condition
/// connecting adjacent tables — `reorder_joins` flattens this back out and
/// re-optimizes it regardless of the shape it starts in.
fn chain_plan(n: usize) -> LogicalPlan {
    let mut plan = scan(0);
    for i in 1..n {
        let condition = Expression::binary(
            Op::Eq,
            Expression::column(ChainCatalog::fk(i - 1)),
            Expression::column(ChainCatalog::pk(i)),
        );
        plan = LogicalPlan::Join(JoinNode {
            left: Box::new(plan),
            right: Box::new(scan(i)),
            join_type: rusty_optimizer::ast::JoinType::Cross,
            condition: Some(condition),
            hint_applied: None,
        });
    }
    plan
}

fn bench_join_reorder(c: &mut Criterion) {
    let cost_model = CostModel::new(HardwareProfile::default());
    let hints = OptimizerHints::default();

    let mut group = c.benchmark_group("join_reorder");
    // Below the default dp_join_limit (10): exact DP search. Above it:
    // the greedy fallback. Both paths are worth tracking since they have
    // very different asymptotics.
    for &n in &[4usize, 6, 8, 12, 16] {
        let catalog = ChainCatalog { n };
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let plan = chain_plan(n);
                reorder_joins(plan, &catalog, &cost_model, &hints, 10)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_join_reorder);
criterion_main!(benches);
