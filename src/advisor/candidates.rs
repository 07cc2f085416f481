// Candidate index extraction from a query's AST: WHERE equality/range
// predicates, join equi-keys, GROUP BY leading columns, ORDER BY prefixes,
// and composite candidates formed by combining them.

use crate::ast::{SelectStatement, SqlStatement};
use crate::expr::{Expression, Op};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Candidate {
    pub table: String,
    pub columns: Vec<String>,
    /// Higher wins ties during GA seeding order; not itself the GA fitness.
    pub priority: u8,
    pub reason: String,
}

impl Candidate {
    /// `table(col1,col2,...)`, column order preserved -- the dedup key
    /// named in the spec.
    pub fn key(&self) -> String {
        format!("{}({})", self.table, self.columns.join(","))
    }
}

/// Extract and deduplicate candidates across every statement, honoring
/// `max_columns` for composite candidates.
pub fn extract_candidates(queries: &[SqlStatement], max_columns: usize) -> Vec<Candidate> {
    let mut by_key: HashMap<String, Candidate> = HashMap::new();
    for stmt in queries {
        if let SqlStatement::Select(select) = stmt {
            for c in extract_from_select(select, max_columns) {
                by_key
                    .entry(c.key())
                    .and_modify(|existing| {
                        if c.priority > existing.priority {
                            existing.priority = c.priority;
                        }
                    })
                    .or_insert(c);
            }
        }
    }
    let mut out: Vec<_> = by_key.into_values().collect();
    out.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.key().cmp(&b.key())));
    out
}

fn extract_from_select(select: &SelectStatement, max_columns: usize) -> Vec<Candidate> {
    let Some(table) = &select.from_table else { return vec![] };
    let mut candidates = Vec::new();
    let mut eq_cols = Vec::new();
    let mut range_cols = Vec::new();

    if let Some(where_clause) = &select.where_clause {
        for conjunct in where_clause.split_conjuncts() {
            collect_predicate_columns(&conjunct, &mut eq_cols, &mut range_cols);
        }
    }

    for col in &eq_cols {
        candidates.push(Candidate {
            table: table.clone(),
            columns: vec![col.clone()],
            priority: 4,
            reason: format!("equality predicate on {table}.{col}"),
        });
    }
    for col in &range_cols {
        candidates.push(Candidate {
            table: table.clone(),
            columns: vec![col.clone()],
            priority: 3,
            reason: format!("range predicate on {table}.{col}"),
        });
    }

    for join in &select.joins {
        if let Some(cond) = &join.condition {
            for (left, right) in equi_join_pairs(cond) {
                candidates.push(Candidate {
                    table: table.clone(),
                    columns: vec![left.clone()],
                    priority: 4,
                    reason: format!("join equi-key {table}.{left} = {}.{right}", join.table),
                });
                candidates.push(Candidate {
                    table: join.table.clone(),
                    columns: vec![right.clone()],
                    priority: 4,
                    reason: format!("join equi-key {}.{right} = {table}.{left}", join.table),
                });
            }
        }
    }

    if !select.group_by.is_empty() {
        let cols: Vec<String> = select.group_by.iter().take(max_columns).cloned().collect();
        candidates.push(Candidate {
            table: table.clone(),
            columns: cols,
            priority: 2,
            reason: format!("GROUP BY leading columns on {table}"),
        });
    }

    if !select.order_by.is_empty() {
        let cols: Vec<String> = select
            .order_by
            .iter()
            .filter_map(|o| match &o.expr {
                Expression::Column(c) => Some(c.clone()),
                _ => None,
            })
            .take(max_columns)
            .collect();
        if !cols.is_empty() {
            candidates.push(Candidate {
                table: table.clone(),
                columns: cols,
                priority: 2,
                reason: format!("ORDER BY prefix on {table}"),
            });
        }
    }

    // Composite: WHERE equality columns followed by a GROUP BY/ORDER BY
    // prefix, up to max_columns.
    if !eq_cols.is_empty() {
        let mut composite = eq_cols.clone();
        let tail: Vec<&String> = if !select.group_by.is_empty() {
            select.group_by.iter().collect()
        } else {
            select
                .order_by
                .iter()
                .filter_map(|o| match &o.expr {
                    Expression::Column(c) => Some(c),
                    _ => None,
                })
                .collect()
        };
        for col in tail {
            if composite.len() >= max_columns {
                break;
            }
            if !composite.contains(col) {
                composite.push(col.clone());
            }
        }
        if composite.len() > 1 {
            candidates.push(Candidate {
                table: table.clone(),
                columns: composite,
                priority: 3,
                reason: format!("composite WHERE + GROUP BY/ORDER BY on {table}"),
            });
        }
    }

    candidates
}

fn collect_predicate_columns(expr: &Expression, eq: &mut Vec<String>, range: &mut Vec<String>) {
    let Expression::Operator { op, left, right } = expr else { return };
    let column = match (left.as_ref(), right.as_ref()) {
        (Expression::Column(c), Expression::Value(_)) => Some(c.clone()),
        (Expression::Value(_), Expression::Column(c)) => Some(c.clone()),
        (Expression::Column(c), _) if matches!(op, Op::IsNull | Op::IsNotNull) => Some(c.clone()),
        _ => None,
    };
    let Some(col) = column else { return };
    match op {
        Op::Eq => {
            if !eq.contains(&col) {
                eq.push(col);
            }
        }
        Op::Lt | Op::LtEq | Op::Gt | Op::GtEq | Op::Between | Op::In => {
            if !range.contains(&col) {
                range.push(col);
            }
        }
        _ => {}
    }
}

/// `col_a = col_b` pairs in a join condition, as `(left_column, right_column)`.
fn equi_join_pairs(expr: &Expression) -> Vec<(&str, &str)> {
    match expr {
        Expression::Operator { op: Op::And, left, right } => {
            let mut out = equi_join_pairs(left);
            out.extend(equi_join_pairs(right));
            out
        }
        Expression::Operator { op: Op::Eq, left, right } => match (left.as_ref(), right.as_ref()) {
            (Expression::Column(a), Expression::Column(b)) => vec![(a.as_str(), b.as_str())],
            _ => vec![],
        },
        _ => vec![],
    }
}
