// Index advisor: candidate extraction, what-if benefit evaluation against
// hypothetical indexes, and genetic-algorithm combinatorial selection.

pub mod candidates;
pub mod genetic;
pub mod hypothetical;

use crate::catalog::DataSource;
use crate::config::OptimizerConfig;
use crate::cost::{CostModel, HardwareProfile};
use crate::error::OptError;
use crate::ast::SqlStatement;
use candidates::{extract_candidates, Candidate};
use genetic::{CandidateFitnessInput, GaParams};
use hypothetical::{HypotheticalIndexStore, SynthesizedStats};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Recommendation {
    pub table: String,
    pub columns: Vec<String>,
    pub create_index_sql: String,
    /// `(cost_baseline - cost_with_index) / cost_baseline`, clamped `[0,1]`.
    pub benefit: f64,
    pub reason: String,
}

pub struct IndexAdvisor<'a> {
    source: &'a dyn DataSource,
    config: &'a OptimizerConfig,
}

impl<'a> IndexAdvisor<'a> {
    pub fn new(source: &'a dyn DataSource, config: &'a OptimizerConfig) -> Self {
        Self { source, config }
    }

    /// Runs the full pipeline: extract -> dedup (done inside
    /// `extract_candidates`) -> what-if benefit evaluation -> GA selection
    /// -> sorted recommendations. Honors `advisor_timeout`; a deadline hit
    /// during either stage yields the best partial result found so far
    /// rather than failing the call, surfaced via the returned bool.
    pub fn recommend(&self, queries: &[SqlStatement]) -> (Vec<Recommendation>, Option<OptError>) {
        let deadline = Instant::now() + self.config.advisor_timeout;
        let candidates = extract_candidates(queries, self.config.advisor_max_columns);
        if candidates.is_empty() {
            return (vec![], None);
        }

        let cost_model = CostModel::new(HardwareProfile::detect());
        let mut store = HypotheticalIndexStore::new();
        let mut evaluated = Vec::with_capacity(candidates.len());
        let mut timed_out = false;

        for candidate in &candidates {
            if Instant::now() >= deadline {
                timed_out = true;
                break;
            }
            if let Some(eval) = self.evaluate(candidate, &cost_model, &mut store) {
                evaluated.push(eval);
            }
        }

        if evaluated.is_empty() {
            let err = if timed_out { Some(OptError::AdvisorTimeout) } else { None };
            return (vec![], err);
        }

        let inputs: Vec<CandidateFitnessInput> = evaluated
            .iter()
            .map(|e| CandidateFitnessInput { benefit: e.benefit, estimated_size: e.stats.estimated_size })
            .collect();

        let params = GaParams {
            population: self.config.advisor_population,
            generations: self.config.advisor_generations,
            max_indexes: self.config.advisor_max_indexes,
            max_total_size: self.config.advisor_max_total_size,
            ..Default::default()
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        let ga_deadline = if timed_out { Some(Instant::now()) } else { Some(Instant::now() + remaining) };
        let ga_result = genetic::run(inputs.len(), &inputs, &params, ga_deadline);

        info!(selected = ga_result.selected.len(), generations = ga_result.generations_run, "advisor GA complete");

        let mut recommendations: Vec<Recommendation> = ga_result
            .selected
            .iter()
            .map(|&idx| {
                let e = &evaluated[idx];
                Recommendation {
                    table: e.candidate.table.clone(),
                    columns: e.candidate.columns.clone(),
                    create_index_sql: e.create_sql.clone(),
                    benefit: e.benefit,
                    reason: e.candidate.reason.clone(),
                }
            })
            .collect();
        recommendations.sort_by(|a, b| b.benefit.partial_cmp(&a.benefit).unwrap_or(std::cmp::Ordering::Equal));

        let err = if timed_out || ga_result.timed_out {
            warn!("index advisor returned partial results: deadline exceeded");
            Some(OptError::AdvisorTimeout)
        } else {
            None
        };
        (recommendations, err)
    }

    fn evaluate(
        &self,
        candidate: &Candidate,
        cost_model: &CostModel,
        store: &mut HypotheticalIndexStore,
    ) -> Option<EvaluatedCandidate> {
        let table_stats = self.source.get_table_stats(&candidate.table)?;
        let rows = table_stats.row_count;
        if rows == 0 {
            return None;
        }

        let mut combined_ndv = 1u64;
        let mut row_width_bytes = 0u64;
        for col in &candidate.columns {
            let cs = self.source.get_column_stats(&candidate.table, col);
            let ndv = cs.as_ref().map(|c| c.ndv.max(1)).unwrap_or(rows.max(1));
            combined_ndv = combined_ndv.saturating_mul(ndv);
            row_width_bytes += 16; // fixed per-column estimate; the advisor doesn't model variable-width types
        }
        // Composite selectivity assuming independence overestimates
        // selectivity for correlated columns; dampen each column beyond
        // the first.
        let correlation = 0.7f64.powi(candidate.columns.len().saturating_sub(1) as i32);
        let raw_selectivity = 1.0 / combined_ndv.max(1) as f64;
        let selectivity = (raw_selectivity / correlation).min(1.0);

        let baseline = cost_model.scan_cost(rows);
        let with_index = cost_model.index_scan_cost(rows, selectivity, 1.0);
        if baseline.0 <= 0.0 {
            return None;
        }
        let benefit = ((baseline.0 - with_index.0) / baseline.0).clamp(0.0, 1.0);

        let estimated_size = rows.saturating_mul(row_width_bytes.max(8));
        let synthesized_stats = SynthesizedStats {
            ndv: combined_ndv,
            selectivity,
            estimated_size,
            null_fraction: 0.0,
            correlation,
        };
        let id = store.register(candidate.table.clone(), candidate.columns.clone(), false, synthesized_stats);
        let create_sql = store.get(id)?.create_index_sql();

        Some(EvaluatedCandidate { candidate: candidate.clone(), benefit, create_sql, stats: synthesized_stats })
    }
}

struct EvaluatedCandidate {
    candidate: Candidate,
    benefit: f64,
    create_sql: String,
    stats: SynthesizedStats,
}
