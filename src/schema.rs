// Ordered output schema shared by every logical operator.

use crate::value::DataType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    /// Source table/alias this column came from before join-disambiguation
    /// prefixing was applied. `None` for computed/aliased expressions.
    pub table_qualifier: Option<String>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self { name: name.into(), data_type, nullable, table_qualifier: None }
    }

    pub fn with_qualifier(mut self, table: impl Into<String>) -> Self {
        self.table_qualifier = Some(table.into());
        self
    }
}

/// Ordered `[(name, type, nullable)]` list. Names are unique within a
/// schema; order is meaningful since projections and joins concatenate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<ColumnDef>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self { columns }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// All table/alias qualifiers referenced by this schema's columns, used
    /// by predicate pushdown's "minimal set of tables referenced" analysis
    ///.
    pub fn qualifiers(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for col in &self.columns {
            if let Some(q) = &col.table_qualifier {
                if !seen.contains(q) {
                    seen.push(q.clone());
                }
            }
        }
        seen
    }

    /// Produce the disambiguated output schema for a join: left columns
    /// keep their names, right columns whose names collide with a left
    /// column (or an earlier right column) are prefixed with their table
    /// qualifier (falling back to `right.` when no qualifier is set).
    pub fn join_disambiguated(left: &Schema, right: &Schema) -> Schema {
        let mut out = left.columns.clone();
        for col in &right.columns {
            let mut col = col.clone();
            if out.iter().any(|c| c.name == col.name) {
                let prefix = col.table_qualifier.clone().unwrap_or_else(|| "right".to_string());
                col.name = format!("{prefix}.{}", col.name);
            }
            out.push(col);
        }
        Schema::new(out)
    }

    pub fn project(&self, names: &[String]) -> Schema {
        let columns = names
            .iter()
            .filter_map(|n| self.find(n).cloned())
            .collect();
        Schema::new(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, table: &str) -> ColumnDef {
        ColumnDef::new(name, DataType::Integer, true).with_qualifier(table)
    }

    #[test]
    fn join_disambiguation_prefixes_colliding_right_column() {
        let left = Schema::new(vec![col("id", "orders"), col("amount", "orders")]);
        let right = Schema::new(vec![col("id", "customers"), col("name", "customers")]);
        let out = Schema::join_disambiguated(&left, &right);
        let names: Vec<&str> = out.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "amount", "customers.id", "name"]);
    }

    #[test]
    fn no_collision_means_no_prefixing() {
        let left = Schema::new(vec![col("id", "orders")]);
        let right = Schema::new(vec![col("customer_id", "customers")]);
        let out = Schema::join_disambiguated(&left, &right);
        assert_eq!(out.columns[1].name, "customer_id");
    }
}
