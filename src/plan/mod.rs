// Logical plan algebra. Every operator owns its children
// directly (`Box<LogicalPlan>`/`Vec<LogicalPlan>`) — no parent pointers, no
// shared subtrees without cloning, per the documented concurrency model.

pub mod builder;

use crate::ast::{AggregateItem, JoinType, OrderByItem};
use crate::expr::Expression;
use crate::schema::Schema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub enum LogicalPlan {
    DataSource(DataSourceNode),
    Selection(SelectionNode),
    Projection(ProjectionNode),
    Join(JoinNode),
    Aggregate(AggregateNode),
    Sort(SortNode),
    Limit(LimitNode),
    TopN(TopNNode),
    Window(WindowNode),
    Apply(ApplyNode),
    Union(UnionNode),
    Insert(InsertNode),
    Update(UpdateNode),
    Delete(DeleteNode),
}

#[derive(Debug, Clone)]
pub struct DataSourceNode {
    pub table: String,
    pub schema: Schema,
    /// Predicates pushed down onto this scan; cumulative and merged by AND,
    /// never duplicated.
    pub pushed_predicates: Option<Expression>,
    /// Columns this scan is required to produce, set by column pruning.
    pub projected_columns: Option<Vec<String>>,
    /// Pushed-down `(limit, offset)`, set by limit/TopN pushdown.
    pub pushed_limit: Option<(Option<u64>, Option<u64>)>,
    /// Pushed-down `(order_by, limit, offset)` from a fused TopN.
    pub pushed_topn: Option<(Vec<OrderByItem>, u64, u64)>,
    /// Index hint constraints gathered by `HintAwareIndex`; consulted by
    /// index selection during plan conversion, not resolved to a concrete
    /// index here since no physical access method exists yet at the
    /// logical-plan stage.
    pub index_directive: IndexDirective,
}

/// FORCE_INDEX/USE_INDEX/IGNORE_INDEX/ORDER_INDEX/NO_ORDER_INDEX collapsed
/// onto a single scan, already resolved to the priority order
/// (FORCE_INDEX > USE_INDEX > IGNORE_INDEX > ORDER_INDEX > NO_ORDER_INDEX).
#[derive(Debug, Clone, Default)]
pub struct IndexDirective {
    pub forced: Option<String>,
    pub allowed: Option<Vec<String>>,
    pub ignored: Vec<String>,
    pub order_index: Option<String>,
    pub no_order_index: bool,
}

#[derive(Debug, Clone)]
pub struct SelectionNode {
    pub input: Box<LogicalPlan>,
    pub predicate: Expression,
}

#[derive(Debug, Clone)]
pub struct ProjectionItem {
    pub expr: Expression,
    pub alias: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProjectionNode {
    pub input: Box<LogicalPlan>,
    pub items: Vec<ProjectionItem>,
}

#[derive(Debug, Clone)]
pub struct JoinNode {
    pub left: Box<LogicalPlan>,
    pub right: Box<LogicalPlan>,
    pub join_type: JoinType,
    pub condition: Option<Expression>,
    /// Algorithm forced by a `HASH_JOIN`/`MERGE_JOIN`/`INL_JOIN` hint
    ///; `None` leaves the choice to the
    /// plan converter's cost-based selection.
    pub hint_applied: Option<JoinAlgorithm>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinAlgorithm {
    Hash,
    Merge,
    NestedLoop,
    IndexNestedLoop,
}

#[derive(Debug, Clone)]
pub struct AggregateNode {
    pub input: Box<LogicalPlan>,
    pub group_by: Vec<String>,
    pub aggregates: Vec<AggregateItem>,
    /// Algorithm forced by a `HASH_AGG`/`STREAM_AGG` hint; `None` leaves
    /// the choice to the plan converter.
    pub hint_applied: Option<AggAlgorithm>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggAlgorithm {
    Hash,
    Stream,
}

#[derive(Debug, Clone)]
pub struct SortNode {
    pub input: Box<LogicalPlan>,
    pub order_by: Vec<OrderByItem>,
}

#[derive(Debug, Clone)]
pub struct LimitNode {
    pub input: Box<LogicalPlan>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Fused Sort+Limit, produced by TopN pushdown/derivation rules.
#[derive(Debug, Clone)]
pub struct TopNNode {
    pub input: Box<LogicalPlan>,
    pub order_by: Vec<OrderByItem>,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowFunctionKind {
    RowNumber,
    Rank,
    DenseRank,
}

#[derive(Debug, Clone)]
pub struct WindowNode {
    pub input: Box<LogicalPlan>,
    pub function: WindowFunctionKind,
    pub partition_by: Vec<String>,
    pub order_by: Vec<OrderByItem>,
    pub alias: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyKind {
    Exists,
    NotExists,
    In,
    NotIn,
    Scalar,
}

/// Correlated subquery application, decorrelated into a `Join` by the
/// `Decorrelate` rule before DP join reorder ever sees it.
#[derive(Debug, Clone)]
pub struct ApplyNode {
    pub outer: Box<LogicalPlan>,
    pub inner: Box<LogicalPlan>,
    pub kind: ApplyKind,
    pub correlated_columns: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UnionNode {
    pub inputs: Vec<LogicalPlan>,
    pub distinct: bool,
}

#[derive(Debug, Clone)]
pub struct InsertNode {
    pub table: String,
    pub schema: Schema,
    pub columns: Vec<String>,
    pub values: Vec<Vec<Expression>>,
}

#[derive(Debug, Clone)]
pub struct UpdateNode {
    pub table: String,
    pub schema: Schema,
    pub assignments: Vec<(String, Expression)>,
    pub input: Box<LogicalPlan>,
}

#[derive(Debug, Clone)]
pub struct DeleteNode {
    pub table: String,
    pub schema: Schema,
    pub input: Box<LogicalPlan>,
}

impl LogicalPlan {
    pub fn children(&self) -> Vec<&LogicalPlan> {
        match self {
            LogicalPlan::DataSource(_) => vec![],
            LogicalPlan::Selection(n) => vec![&n.input],
            LogicalPlan::Projection(n) => vec![&n.input],
            LogicalPlan::Join(n) => vec![&n.left, &n.right],
            LogicalPlan::Aggregate(n) => vec![&n.input],
            LogicalPlan::Sort(n) => vec![&n.input],
            LogicalPlan::Limit(n) => vec![&n.input],
            LogicalPlan::TopN(n) => vec![&n.input],
            LogicalPlan::Window(n) => vec![&n.input],
            LogicalPlan::Apply(n) => vec![&n.outer, &n.inner],
            LogicalPlan::Union(n) => n.inputs.iter().collect(),
            LogicalPlan::Insert(_) => vec![],
            LogicalPlan::Update(n) => vec![&n.input],
            LogicalPlan::Delete(n) => vec![&n.input],
        }
    }

    pub fn children_mut(&mut self) -> Vec<&mut LogicalPlan> {
        match self {
            LogicalPlan::DataSource(_) => vec![],
            LogicalPlan::Selection(n) => vec![&mut n.input],
            LogicalPlan::Projection(n) => vec![&mut n.input],
            LogicalPlan::Join(n) => vec![&mut n.left, &mut n.right],
            LogicalPlan::Aggregate(n) => vec![&mut n.input],
            LogicalPlan::Sort(n) => vec![&mut n.input],
            LogicalPlan::Limit(n) => vec![&mut n.input],
            LogicalPlan::TopN(n) => vec![&mut n.input],
            LogicalPlan::Window(n) => vec![&mut n.input],
            LogicalPlan::Apply(n) => vec![&mut n.outer, &mut n.inner],
            LogicalPlan::Union(n) => n.inputs.iter_mut().collect(),
            LogicalPlan::Insert(_) => vec![],
            LogicalPlan::Update(n) => vec![&mut n.input],
            LogicalPlan::Delete(n) => vec![&mut n.input],
        }
    }

    /// Output schema for this node. DataSource/Insert/Update/Delete carry
    /// their schema directly; everything else derives it from children.
    pub fn schema(&self) -> Schema {
        match self {
            LogicalPlan::DataSource(n) => match &n.projected_columns {
                Some(cols) => n.schema.project(cols),
                None => n.schema.clone(),
            },
            LogicalPlan::Selection(n) => n.input.schema(),
            LogicalPlan::Projection(n) => {
                let input_schema = n.input.schema();
                let columns = n
                    .items
                    .iter()
                    .map(|item| {
                        let name = item
                            .alias
                            .clone()
                            .unwrap_or_else(|| match &item.expr {
                                Expression::Column(c) => c.clone(),
                                _ => "?column?".to_string(),
                            });
                        let source = match &item.expr {
                            Expression::Column(c) => input_schema.find(c),
                            _ => None,
                        };
                        match source {
                            Some(col) => {
                                let mut col = col.clone();
                                col.name = name;
                                col
                            }
                            None => crate::schema::ColumnDef::new(
                                name,
                                crate::value::DataType::Text,
                                true,
                            ),
                        }
                    })
                    .collect();
                Schema::new(columns)
            }
            LogicalPlan::Join(n) => {
                let left = n.left.schema();
                let right = n.right.schema();
                match n.join_type {
                    JoinType::Semi | JoinType::AntiSemi => left,
                    _ => Schema::join_disambiguated(&left, &right),
                }
            }
            LogicalPlan::Aggregate(n) => {
                let input_schema = n.input.schema();
                let mut columns: Vec<_> = n
                    .group_by
                    .iter()
                    .filter_map(|name| input_schema.find(name).cloned())
                    .collect();
                for agg in &n.aggregates {
                    let alias = agg.alias.clone().unwrap_or_else(|| format!("{:?}", agg.kind));
                    // AVG over an empty group evaluates to NULL, never 0
                    // — the output column is always nullable.
                    columns.push(crate::schema::ColumnDef::new(
                        alias,
                        crate::value::DataType::Double,
                        true,
                    ));
                }
                Schema::new(columns)
            }
            LogicalPlan::Sort(n) => n.input.schema(),
            LogicalPlan::Limit(n) => n.input.schema(),
            LogicalPlan::TopN(n) => n.input.schema(),
            LogicalPlan::Window(n) => {
                let mut schema = n.input.schema();
                schema.columns.push(crate::schema::ColumnDef::new(
                    n.alias.clone(),
                    crate::value::DataType::BigInt,
                    false,
                ));
                schema
            }
            LogicalPlan::Apply(n) => n.outer.schema(),
            LogicalPlan::Union(n) => n.inputs.first().map(|p| p.schema()).unwrap_or_default(),
            LogicalPlan::Insert(n) => n.schema.clone(),
            LogicalPlan::Update(n) => n.schema.clone(),
            LogicalPlan::Delete(n) => n.schema.clone(),
        }
    }

    /// Required output columns for this node considered in isolation
    /// (without descending into children) — used by column pruning's
    /// top-down required-column analysis.
    pub fn required_input_columns(&self) -> Vec<String> {
        match self {
            LogicalPlan::DataSource(_) | LogicalPlan::Insert(_) => vec![],
            LogicalPlan::Selection(n) => n.predicate.referenced_columns(),
            LogicalPlan::Projection(n) => {
                n.items.iter().flat_map(|i| i.expr.referenced_columns()).collect()
            }
            LogicalPlan::Join(n) => n.condition.as_ref().map(|c| c.referenced_columns()).unwrap_or_default(),
            LogicalPlan::Aggregate(n) => {
                let mut cols = n.group_by.clone();
                cols.extend(n.aggregates.iter().flat_map(|a| a.expr.referenced_columns()));
                cols
            }
            LogicalPlan::Sort(n) => n.order_by.iter().flat_map(|o| o.expr.referenced_columns()).collect(),
            LogicalPlan::TopN(n) => n.order_by.iter().flat_map(|o| o.expr.referenced_columns()).collect(),
            LogicalPlan::Limit(_) => vec![],
            LogicalPlan::Window(n) => {
                let mut cols = n.partition_by.clone();
                cols.extend(n.order_by.iter().flat_map(|o| o.expr.referenced_columns()));
                cols
            }
            LogicalPlan::Apply(n) => n.correlated_columns.clone(),
            LogicalPlan::Union(_) => vec![],
            LogicalPlan::Update(n) => {
                n.assignments.iter().flat_map(|(_, e)| e.referenced_columns()).collect()
            }
            LogicalPlan::Delete(_) => vec![],
        }
    }

    pub fn explain(&self) -> String {
        self.explain_indented(0)
    }

    fn explain_indented(&self, depth: usize) -> String {
        let pad = "  ".repeat(depth);
        let line = match self {
            LogicalPlan::DataSource(n) => format!("DataSource({})", n.table),
            LogicalPlan::Selection(n) => format!("Selection({:?})", n.predicate),
            LogicalPlan::Projection(n) => format!("Projection({} cols)", n.items.len()),
            LogicalPlan::Join(n) => format!("Join({:?})", n.join_type),
            LogicalPlan::Aggregate(n) => format!("Aggregate(group_by={:?})", n.group_by),
            LogicalPlan::Sort(n) => format!("Sort({} keys)", n.order_by.len()),
            LogicalPlan::Limit(n) => format!("Limit({:?})", n.limit),
            LogicalPlan::TopN(n) => format!("TopN(limit={})", n.limit),
            LogicalPlan::Window(n) => format!("Window({:?})", n.function),
            LogicalPlan::Apply(n) => format!("Apply({:?})", n.kind),
            LogicalPlan::Union(n) => format!("Union(distinct={})", n.distinct),
            LogicalPlan::Insert(n) => format!("Insert({})", n.table),
            LogicalPlan::Update(n) => format!("Update({})", n.table),
            LogicalPlan::Delete(n) => format!("Delete({})", n.table),
        };
        let mut out = format!("{pad}{line}\n");
        for child in self.children() {
            out.push_str(&child.explain_indented(depth + 1));
        }
        out
    }
}
