// Plan cache: canonical AST fingerprinting plus an LRU store keyed by
// that fingerprint, with table-dependency-tracked invalidation.

use crate::ast::{DeleteStatement, InsertStatement, SelectItem, SelectStatement, SqlStatement, UpdateStatement};
use crate::common::BoundedHashMap;
use crate::expr::Expression;
use crate::physical::PhysicalPlan;
use crate::value::Value;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Placeholder substituted for every literal so that statements differing
/// only in their literal values share a cache entry.
const PLACEHOLDER: Value = Value::Null;

fn canonicalize_expr(expr: &Expression) -> Expression {
    match expr {
        Expression::Value(_) => Expression::Value(PLACEHOLDER),
        Expression::Column(c) => Expression::Column(c.clone()),
        Expression::Operator { op, left, right } => Expression::Operator {
            op: *op,
            left: Box::new(canonicalize_expr(left)),
            right: Box::new(canonicalize_expr(right)),
        },
        Expression::Function { name, args } => {
            Expression::Function { name: name.clone(), args: args.iter().map(canonicalize_expr).collect() }
        }
    }
}

fn canonicalize_opt_expr(expr: &Option<Expression>) -> Option<Expression> {
    expr.as_ref().map(canonicalize_expr)
}

/// Canonical parameterized form of a statement: literals become a single
/// placeholder, hint text is excluded entirely (hints influence the plan
/// the cache stores, not its identity), and the result is a plain `String`
/// built from the statement's structure rather than source whitespace —
/// so two statements that differ only in formatting or literal values
/// fingerprint identically.
pub fn fingerprint(stmt: &SqlStatement) -> String {
    match stmt {
        SqlStatement::Select(s) => format!("SELECT:{:?}", canonical_select(s)),
        SqlStatement::Insert(s) => format!("INSERT:{:?}", canonical_insert(s)),
        SqlStatement::Update(s) => format!("UPDATE:{:?}", canonical_update(s)),
        SqlStatement::Delete(s) => format!("DELETE:{:?}", canonical_delete(s)),
    }
}

fn canonical_select(s: &SelectStatement) -> SelectStatement {
    SelectStatement {
        columns: s
            .columns
            .iter()
            .map(|c| match c {
                SelectItem::Wildcard => SelectItem::Wildcard,
                SelectItem::Expr { expr, alias } => {
                    SelectItem::Expr { expr: canonicalize_expr(expr), alias: alias.clone() }
                }
                SelectItem::Aggregate(a) => {
                    let mut a = a.clone();
                    a.expr = canonicalize_expr(&a.expr);
                    SelectItem::Aggregate(a)
                }
            })
            .collect(),
        from_table: s.from_table.clone(),
        joins: s
            .joins
            .iter()
            .map(|j| {
                let mut j = j.clone();
                j.condition = canonicalize_opt_expr(&j.condition);
                j
            })
            .collect(),
        where_clause: canonicalize_opt_expr(&s.where_clause),
        group_by: s.group_by.clone(),
        having: canonicalize_opt_expr(&s.having),
        order_by: s
            .order_by
            .iter()
            .map(|o| crate::ast::OrderByItem { expr: canonicalize_expr(&o.expr), ascending: o.ascending })
            .collect(),
        limit: s.limit,
        offset: s.offset,
        // Hints do not participate in the plan's identity: two statements
        // differing only by `/*+ ... */` text still share a cache entry.
        hints: None,
    }
}

fn canonical_insert(s: &InsertStatement) -> InsertStatement {
    InsertStatement {
        table: s.table.clone(),
        columns: s.columns.clone(),
        values: s.values.iter().map(|row| row.iter().map(canonicalize_expr).collect()).collect(),
    }
}

fn canonical_update(s: &UpdateStatement) -> UpdateStatement {
    UpdateStatement {
        table: s.table.clone(),
        assignments: s.assignments.iter().map(|(c, e)| (c.clone(), canonicalize_expr(e))).collect(),
        where_clause: canonicalize_opt_expr(&s.where_clause),
    }
}

fn canonical_delete(s: &DeleteStatement) -> DeleteStatement {
    DeleteStatement { table: s.table.clone(), where_clause: canonicalize_opt_expr(&s.where_clause) }
}

struct CacheEntry {
    plan: Arc<PhysicalPlan>,
    tables: Vec<String>,
}

struct Inner {
    entries: BoundedHashMap<String, CacheEntry>,
    by_table: HashMap<String, HashSet<String>>,
}

/// LRU plan cache keyed by statement fingerprint. Safe to share across
/// threads behind a single lock: lookups and inserts are both cheap, and
/// the workload is read-heavy with occasional writes on cache misses.
pub struct PlanCache {
    inner: Mutex<Inner>,
}

impl PlanCache {
    pub fn new(capacity: usize) -> Self {
        Self { inner: Mutex::new(Inner { entries: BoundedHashMap::new(capacity.max(1)), by_table: HashMap::new() }) }
    }

    pub fn get(&self, key: &str) -> Option<Arc<PhysicalPlan>> {
        let mut inner = self.inner.lock();
        inner.entries.get(&key.to_string()).map(|e| e.plan.clone())
    }

    pub fn insert(&self, key: String, plan: Arc<PhysicalPlan>, tables: Vec<String>) {
        let mut inner = self.inner.lock();
        for table in &tables {
            inner.by_table.entry(table.clone()).or_default().insert(key.clone());
        }
        inner.entries.insert(key, CacheEntry { plan, tables });
    }

    /// Evicts every cached plan that reads the named table. Called when a
    /// statistics delta for that table crosses the embedder's invalidation
    /// threshold.
    pub fn invalidate_table(&self, table: &str) {
        let mut inner = self.inner.lock();
        let Some(keys) = inner.by_table.remove(table) else { return };
        for key in keys {
            if let Some(entry) = inner.entries.get_no_update(&key) {
                for t in &entry.tables {
                    if t != table {
                        if let Some(set) = inner.by_table.get_mut(t) {
                            set.remove(&key);
                        }
                    }
                }
            }
            inner.entries.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.by_table.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SelectStatement;
    use crate::expr::{Expression, Op};

    fn select_with_literal(n: i64) -> SqlStatement {
        SqlStatement::Select(SelectStatement {
            from_table: Some("orders".to_string()),
            where_clause: Some(Expression::binary(Op::Eq, Expression::column("id"), Expression::value(Value::Integer(n)))),
            ..Default::default()
        })
    }

    #[test]
    fn fingerprint_ignores_literal_values() {
        let a = fingerprint(&select_with_literal(1));
        let b = fingerprint(&select_with_literal(2));
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_ignores_hint_text() {
        let mut with_hint = SelectStatement { from_table: Some("orders".to_string()), ..Default::default() };
        with_hint.hints = Some("/*+ USE_INDEX(orders, idx_id) */".to_string());
        let mut without_hint = SelectStatement { from_table: Some("orders".to_string()), ..Default::default() };
        without_hint.hints = None;
        assert_eq!(
            fingerprint(&SqlStatement::Select(with_hint)),
            fingerprint(&SqlStatement::Select(without_hint))
        );
    }

    #[test]
    fn distinct_queries_fingerprint_differently() {
        let a = fingerprint(&select_with_literal(1));
        let b = fingerprint(&SqlStatement::Select(SelectStatement {
            from_table: Some("customers".to_string()),
            ..Default::default()
        }));
        assert_ne!(a, b);
    }

    fn dummy_plan() -> Arc<PhysicalPlan> {
        Arc::new(PhysicalPlan::Insert { table: "t".to_string(), columns: vec![], values: vec![] })
    }

    #[test]
    fn get_and_insert_round_trip() {
        let cache = PlanCache::new(4);
        cache.insert("k1".to_string(), dummy_plan(), vec!["orders".to_string()]);
        assert!(cache.get("k1").is_some());
        assert!(cache.get("missing").is_none());
    }

    #[test]
    fn invalidate_table_evicts_dependent_entries_only() {
        let cache = PlanCache::new(4);
        cache.insert("orders_q".to_string(), dummy_plan(), vec!["orders".to_string()]);
        cache.insert("customers_q".to_string(), dummy_plan(), vec!["customers".to_string()]);
        cache.invalidate_table("orders");
        assert!(cache.get("orders_q").is_none());
        assert!(cache.get("customers_q").is_some());
    }

    #[test]
    fn lru_eviction_respects_capacity() {
        let cache = PlanCache::new(2);
        cache.insert("a".to_string(), dummy_plan(), vec!["t".to_string()]);
        cache.insert("b".to_string(), dummy_plan(), vec!["t".to_string()]);
        cache.insert("c".to_string(), dummy_plan(), vec!["t".to_string()]);
        assert_eq!(cache.len(), 2);
    }
}
