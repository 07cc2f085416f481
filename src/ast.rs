// Upstream AST contract. This crate does not parse SQL text — these
// types describe what the embedding application hands the optimizer after
// its own parsing step.

use crate::expr::Expression;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub enum SqlStatement {
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
}

#[derive(Debug, Clone, Default)]
pub struct SelectStatement {
    pub columns: Vec<SelectItem>,
    pub from_table: Option<String>,
    pub joins: Vec<JoinItem>,
    pub where_clause: Option<Expression>,
    pub group_by: Vec<String>,
    pub having: Option<Expression>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Raw `/*+ ... */` text; the optimizer parses it itself.
    pub hints: Option<String>,
}

#[derive(Debug, Clone)]
pub enum SelectItem {
    Wildcard,
    Expr { expr: Expression, alias: Option<String> },
    Aggregate(AggregateItem),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggKind {
    Count,
    Sum,
    Avg,
    Max,
    Min,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateItem {
    pub kind: AggKind,
    pub expr: Expression,
    pub alias: Option<String>,
    pub distinct: bool,
}

#[derive(Debug, Clone)]
pub struct JoinItem {
    pub table: String,
    pub join_type: JoinType,
    pub condition: Option<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    LeftOuter,
    RightOuter,
    FullOuter,
    Cross,
    Semi,
    AntiSemi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderByItem {
    pub expr: Expression,
    pub ascending: bool,
}

#[derive(Debug, Clone)]
pub struct InsertStatement {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Vec<Expression>>,
}

#[derive(Debug, Clone)]
pub struct UpdateStatement {
    pub table: String,
    pub assignments: Vec<(String, Expression)>,
    pub where_clause: Option<Expression>,
}

#[derive(Debug, Clone)]
pub struct DeleteStatement {
    pub table: String,
    pub where_clause: Option<Expression>,
}
