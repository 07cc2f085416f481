// Table/column statistics and the cardinality/selectivity estimator.

use crate::expr::{Expression, Op};
use crate::value::Value;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct TableStatistics {
    pub row_count: u64,
    pub columns: HashMap<String, ColumnStatistics>,
}

impl TableStatistics {
    pub fn new(row_count: u64) -> Self {
        Self { row_count, columns: HashMap::new() }
    }

    pub fn with_column(mut self, name: impl Into<String>, stats: ColumnStatistics) -> Self {
        self.columns.insert(name.into(), stats);
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnStatistics> {
        self.columns.get(name)
    }
}

#[derive(Debug, Clone)]
pub struct ColumnStatistics {
    /// Number of distinct values.
    pub ndv: u64,
    pub null_count: u64,
    pub min: Option<Value>,
    pub max: Option<Value>,
    pub histogram: Option<Histogram>,
    pub top_n: Option<TopN>,
}

impl ColumnStatistics {
    pub fn new(ndv: u64) -> Self {
        Self { ndv, null_count: 0, min: None, max: None, histogram: None, top_n: None }
    }

    pub fn with_range(mut self, min: Value, max: Value) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn with_nulls(mut self, null_count: u64) -> Self {
        self.null_count = null_count;
        self
    }

    pub fn with_histogram(mut self, h: Histogram) -> Self {
        self.histogram = Some(h);
        self
    }

    pub fn with_top_n(mut self, t: TopN) -> Self {
        self.top_n = Some(t);
        self
    }

    fn in_range(&self, v: &Value) -> bool {
        match (&self.min, &self.max) {
            (Some(min), Some(max)) => v >= min && v <= max,
            _ => true,
        }
    }
}

/// Equi-height histogram: each bucket covers an equal share of rows.
#[derive(Debug, Clone)]
pub struct Histogram {
    pub buckets: Vec<HistogramBucket>,
}

#[derive(Debug, Clone)]
pub struct HistogramBucket {
    pub lower: Value,
    pub upper: Value,
    /// Fraction of the table's rows falling in this bucket.
    pub frequency: f64,
}

impl Histogram {
    /// Selectivity for `col <range-op> point`, via linear interpolation
    /// across buckets, falling back to `[min, max]` span interpolation
    /// when the value doesn't land in any bucket cleanly.
    pub fn range_selectivity(&self, op: Op, point: &Value) -> f64 {
        if self.buckets.is_empty() {
            return 0.3;
        }
        let point_f = point.as_f64();
        let mut selectivity = 0.0;
        for bucket in &self.buckets {
            let (lo, hi) = (bucket.lower.as_f64(), bucket.upper.as_f64());
            let (Some(lo), Some(hi), Some(p)) = (lo, hi, point_f) else {
                continue;
            };
            if hi <= lo {
                continue;
            }
            let frac_below = ((p - lo) / (hi - lo)).clamp(0.0, 1.0);
            match op {
                Op::Lt => {
                    if p <= lo {
                        // bucket entirely above point, contributes nothing
                    } else if p >= hi {
                        selectivity += bucket.frequency;
                    } else {
                        selectivity += bucket.frequency * frac_below;
                    }
                }
                Op::LtEq | Op::Gt | Op::GtEq => {
                    // handled by caller via complement/adjustment; compute Lt
                    // equivalent here and let caller invert for Gt family.
                    if p <= lo {
                    } else if p >= hi {
                        selectivity += bucket.frequency;
                    } else {
                        selectivity += bucket.frequency * frac_below;
                    }
                }
                _ => {}
            }
        }
        match op {
            Op::Lt | Op::LtEq => selectivity.clamp(0.0, 1.0),
            Op::Gt | Op::GtEq => (1.0 - selectivity).clamp(0.0, 1.0),
            _ => selectivity.clamp(0.0, 1.0),
        }
    }

    /// Selectivity of a closed range `[low, high]` (BETWEEN), via two
    /// `Lt`-style lookups.
    pub fn between_selectivity(&self, low: &Value, high: &Value) -> f64 {
        let below_low = self.range_selectivity(Op::Lt, low);
        let below_high = self.range_selectivity(Op::LtEq, high);
        (below_high - below_low).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone)]
pub struct TopN {
    pub values: Vec<(Value, u64)>,
}

impl TopN {
    pub fn freq(&self, v: &Value) -> Option<u64> {
        self.values.iter().find(|(val, _)| val == v).map(|(_, c)| *c)
    }
}

/// Default selectivities used when a referenced column has no statistics.
const DEFAULT_EQ: f64 = 0.1;
const DEFAULT_NEQ: f64 = 0.9;
const DEFAULT_RANGE: f64 = 0.3;

pub struct SelectivityEstimator;

impl SelectivityEstimator {
    pub fn new() -> Self {
        Self
    }

    /// `filter_selectivity(table, filter) -> [0,1]`.
    pub fn estimate(&self, stats: Option<&TableStatistics>, expr: &Expression) -> f64 {
        match expr {
            Expression::Operator { op: Op::And, left, right } => {
                self.estimate(stats, left) * self.estimate(stats, right)
            }
            Expression::Operator { op: Op::Or, left, right } => {
                let a = self.estimate(stats, left);
                let b = self.estimate(stats, right);
                // Inclusion-exclusion; naive sum is forbidden since it can
                // exceed 1.
                (1.0 - (1.0 - a) * (1.0 - b)).clamp(0.0, 1.0)
            }
            Expression::Operator { op: Op::Not, left, .. } => {
                (1.0 - self.estimate(stats, left)).clamp(0.0, 1.0)
            }
            Expression::Operator { op, left, right } => {
                self.estimate_comparison(stats, *op, left, right)
            }
            _ => 1.0,
        }
    }

    fn column_stats<'a>(
        &self,
        stats: Option<&'a TableStatistics>,
        expr: &Expression,
    ) -> Option<&'a ColumnStatistics> {
        match expr {
            Expression::Column(name) => stats.and_then(|s| s.column(name)),
            _ => None,
        }
    }

    fn estimate_comparison(
        &self,
        stats: Option<&TableStatistics>,
        op: Op,
        left: &Expression,
        right: &Expression,
    ) -> f64 {
        let col_stats = self.column_stats(stats, left).or_else(|| self.column_stats(stats, right));
        let point = match (left, right) {
            (Expression::Column(_), Expression::Value(v)) => Some(v),
            (Expression::Value(v), Expression::Column(_)) => Some(v),
            _ => None,
        };

        match op {
            Op::Eq => {
                let (Some(cs), Some(v)) = (col_stats, point) else { return DEFAULT_EQ };
                if !cs.in_range(v) {
                    return 0.0;
                }
                if let Some(top_n) = &cs.top_n {
                    if let Some(count) = top_n.freq(v) {
                        return count as f64 / Self::row_count(stats).max(1) as f64;
                    }
                }
                1.0 / cs.ndv.max(1) as f64
            }
            Op::NotEq => {
                let Some(cs) = col_stats else { return DEFAULT_NEQ };
                // Must differ from `=` even as ndv grows large.
                ((cs.ndv.max(1) as f64 - 1.0) / cs.ndv.max(1) as f64).max(0.0)
            }
            Op::Lt | Op::LtEq | Op::Gt | Op::GtEq => {
                let (Some(cs), Some(v)) = (col_stats, point) else { return DEFAULT_RANGE };
                if let Some(h) = &cs.histogram {
                    h.range_selectivity(op, v)
                } else {
                    Self::linear_fallback(cs, op, v)
                }
            }
            Op::IsNull => {
                let Some(cs) = col_stats else { return 0.05 };
                cs.null_count as f64 / Self::row_count(stats).max(1) as f64
            }
            Op::IsNotNull => {
                let Some(cs) = col_stats else { return 0.95 };
                1.0 - cs.null_count as f64 / Self::row_count(stats).max(1) as f64
            }
            Op::In => DEFAULT_EQ * 2.0,
            Op::Between => DEFAULT_RANGE,
            Op::Like => 0.1,
            _ => 1.0,
        }
    }

    fn row_count(stats: Option<&TableStatistics>) -> u64 {
        stats.map(|s| s.row_count).unwrap_or(0)
    }

    /// Linear interpolation over `[min, max]` used when no histogram is
    /// present.
    fn linear_fallback(cs: &ColumnStatistics, op: Op, point: &Value) -> f64 {
        let (Some(min), Some(max)) = (&cs.min, &cs.max) else { return DEFAULT_RANGE };
        let (Some(lo), Some(hi), Some(p)) = (min.as_f64(), max.as_f64(), point.as_f64()) else {
            return DEFAULT_RANGE;
        };
        if hi <= lo {
            return DEFAULT_RANGE;
        }
        let frac_below = ((p - lo) / (hi - lo)).clamp(0.0, 1.0);
        match op {
            Op::Lt | Op::LtEq => frac_below,
            Op::Gt | Op::GtEq => 1.0 - frac_below,
            _ => DEFAULT_RANGE,
        }
    }

    /// `IN (v1..vk)` selectivity: sum of equality selectivities, capped at 1.
    pub fn in_list_selectivity(&self, stats: Option<&TableStatistics>, col: &str, values: &[Value]) -> f64 {
        let cs = stats.and_then(|s| s.column(col));
        let Some(cs) = cs else { return (DEFAULT_EQ * values.len() as f64).min(1.0) };
        let sum: f64 = values
            .iter()
            .map(|v| {
                if !cs.in_range(v) {
                    0.0
                } else if let Some(top_n) = &cs.top_n {
                    top_n
                        .freq(v)
                        .map(|c| c as f64 / Self::row_count(stats).max(1) as f64)
                        .unwrap_or(1.0 / cs.ndv.max(1) as f64)
                } else {
                    1.0 / cs.ndv.max(1) as f64
                }
            })
            .sum();
        sum.min(1.0)
    }

    /// BETWEEN selectivity via histogram range, or linear fallback.
    pub fn between_selectivity(
        &self,
        stats: Option<&TableStatistics>,
        col: &str,
        low: &Value,
        high: &Value,
    ) -> f64 {
        let Some(cs) = stats.and_then(|s| s.column(col)) else { return DEFAULT_RANGE };
        if let Some(h) = &cs.histogram {
            h.between_selectivity(low, high)
        } else {
            let below_low = Self::linear_fallback(cs, Op::Lt, low);
            let below_high = Self::linear_fallback(cs, Op::LtEq, high);
            (below_high - below_low).clamp(0.0, 1.0)
        }
    }
}

pub struct CardinalityEstimator {
    selectivity: SelectivityEstimator,
}

impl CardinalityEstimator {
    pub fn new() -> Self {
        Self { selectivity: SelectivityEstimator::new() }
    }

    pub fn selectivity_estimator(&self) -> &SelectivityEstimator {
        &self.selectivity
    }

    pub fn filter_selectivity(&self, stats: Option<&TableStatistics>, filter: &Expression) -> f64 {
        self.selectivity.estimate(stats, filter).clamp(0.0, 1.0)
    }

    /// Equi-join cardinality: `left_rows * right_rows / max(ndv_left(k), ndv_right(k))`.
    /// Falls back to cross-product heuristics for cross/semi/anti joins.
    pub fn join_cardinality(
        &self,
        left_rows: u64,
        right_rows: u64,
        left_ndv: Option<u64>,
        right_ndv: Option<u64>,
    ) -> u64 {
        let ndv = left_ndv.unwrap_or(1).max(right_ndv.unwrap_or(1)).max(1);
        ((left_rows as f64 * right_rows as f64) / ndv as f64).round() as u64
    }

    pub fn cross_join_cardinality(&self, left_rows: u64, right_rows: u64) -> u64 {
        left_rows.saturating_mul(right_rows)
    }

    /// Semi/anti-join cardinality: `left_rows * selectivity_of_match`.
    pub fn semi_join_cardinality(&self, left_rows: u64, match_selectivity: f64) -> u64 {
        ((left_rows as f64) * match_selectivity.clamp(0.0, 1.0)).round() as u64
    }

    /// `aggregate_cardinality(input_rows, group_by_cols) -> rows`: bounded by
    /// `min(input_rows, product of ndv(group_by_col))`; no group-by => 1.
    pub fn aggregate_cardinality(&self, input_rows: u64, group_by_ndvs: &[u64]) -> u64 {
        if group_by_ndvs.is_empty() {
            return 1;
        }
        let product = group_by_ndvs.iter().fold(1u64, |acc, &n| acc.saturating_mul(n.max(1)));
        input_rows.min(product)
    }
}
