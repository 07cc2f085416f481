// Physical plan tree: the serializable output an execution engine
// consumes. Unlike `LogicalPlan`, every choice here is concrete — a join
// names its algorithm, a scan names its access path.

use crate::ast::OrderByItem;
use crate::expr::Expression;
use crate::plan::{AggAlgorithm, JoinAlgorithm, WindowFunctionKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PhysicalPlan {
    TableScan(TableScan),
    Filter { input: Box<PhysicalPlan>, predicate: Expression },
    Project { input: Box<PhysicalPlan>, items: Vec<(Expression, Option<String>)> },
    Join {
        left: Box<PhysicalPlan>,
        right: Box<PhysicalPlan>,
        algorithm: JoinAlgorithm,
        join_type: crate::ast::JoinType,
        condition: Option<Expression>,
    },
    Aggregate {
        input: Box<PhysicalPlan>,
        algorithm: AggAlgorithm,
        group_by: Vec<String>,
        aggregates: Vec<crate::ast::AggregateItem>,
    },
    Sort { input: Box<PhysicalPlan>, order_by: Vec<OrderByItem> },
    Limit { input: Box<PhysicalPlan>, limit: Option<u64>, offset: Option<u64> },
    TopN { input: Box<PhysicalPlan>, order_by: Vec<OrderByItem>, limit: u64, offset: u64 },
    Window {
        input: Box<PhysicalPlan>,
        function: WindowFunctionKind,
        partition_by: Vec<String>,
        order_by: Vec<OrderByItem>,
        alias: String,
    },
    Union { inputs: Vec<PhysicalPlan>, distinct: bool },
    Insert { table: String, columns: Vec<String>, values: Vec<Vec<Expression>> },
    Update { table: String, assignments: Vec<(String, Expression)>, input: Box<PhysicalPlan> },
    Delete { table: String, input: Box<PhysicalPlan> },
}

/// A scan's concrete access path, chosen by index selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableScan {
    pub table: String,
    pub columns: Vec<String>,
    pub filter: Option<Expression>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub order_by: Option<Vec<OrderByItem>>,
    /// `None` means a full scan; `Some(name)` names the chosen index.
    pub index: Option<String>,
    pub index_only: bool,
    pub parallel: bool,
}
