// Hypothetical indexes: metadata-only index descriptions used by the
// advisor for what-if cost comparisons. Never materialized, never touch
// storage, and live only for the duration of a single advisor invocation.

use std::collections::HashMap;

/// Synthesized statistics for a hypothetical index, derived from the
/// underlying columns' real statistics rather than measured from an actual
/// index structure.
#[derive(Debug, Clone, Copy)]
pub struct SynthesizedStats {
    pub ndv: u64,
    pub selectivity: f64,
    pub estimated_size: u64,
    pub null_fraction: f64,
    /// Dampener applied to composite selectivity to account for
    /// cross-column correlation; `1.0` means the columns are treated as
    /// independent.
    pub correlation: f64,
}

#[derive(Debug, Clone)]
pub struct HypotheticalIndex {
    pub id: u64,
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
    pub synthesized_stats: SynthesizedStats,
}

impl HypotheticalIndex {
    pub fn create_index_sql(&self) -> String {
        let unique = if self.unique { "UNIQUE " } else { "" };
        let name = format!("idx_{}_{}", self.table, self.columns.join("_"));
        format!(
            "CREATE {unique}INDEX {name} ON {}({})",
            self.table,
            self.columns.join(", ")
        )
    }
}

/// In-memory store keyed by id. Local to a single advisor invocation --
/// no cross-request sharing, never persisted.
#[derive(Debug, Default)]
pub struct HypotheticalIndexStore {
    next_id: u64,
    indexes: HashMap<u64, HypotheticalIndex>,
}

impl HypotheticalIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        table: impl Into<String>,
        columns: Vec<String>,
        unique: bool,
        synthesized_stats: SynthesizedStats,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.indexes.insert(
            id,
            HypotheticalIndex { id, table: table.into(), columns, unique, synthesized_stats },
        );
        id
    }

    pub fn get(&self, id: u64) -> Option<&HypotheticalIndex> {
        self.indexes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}
