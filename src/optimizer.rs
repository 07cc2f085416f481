// Top-level entry point: hint parsing -> logical plan construction ->
// rule-driven rewriting -> join reordering -> physical lowering, with the
// enhanced variant adding a plan cache in front of the pipeline.
//
// `Optimizer` is a closed sum type rather than the dynamically-typed
// base/enhanced swap an earlier design used: both variants share the
// `OptimizePipeline` trait, so callers that don't care which one they
// have can still call `optimize` directly, while callers that do care
// can match on the enum without a downcast.

use crate::ast::SqlStatement;
use crate::cache::{fingerprint, PlanCache};
use crate::catalog::DataSource;
use crate::config::OptimizerConfig;
use crate::converter::PlanConverter;
use crate::cost::{CostModel, HardwareProfile};
use crate::error::OptError;
use crate::hints::OptimizerHints;
use crate::join_reorder::reorder_joins;
use crate::physical::PhysicalPlan;
use crate::plan::builder::PlanBuilder;
use crate::rules::{RuleContext, RuleSet};
use std::sync::Arc;
use tracing::{info_span, instrument};

pub trait OptimizePipeline {
    fn optimize(&self, stmt: &SqlStatement) -> Result<PhysicalPlan, OptError>;
}

/// Table(s) a statement reads or writes, used by the enhanced optimizer to
/// tag cache entries for dependency-tracked invalidation.
fn tables_referenced(stmt: &SqlStatement) -> Vec<String> {
    match stmt {
        SqlStatement::Select(s) => {
            let mut tables: Vec<String> = s.from_table.iter().cloned().collect();
            tables.extend(s.joins.iter().map(|j| j.table.clone()));
            tables
        }
        SqlStatement::Insert(s) => vec![s.table.clone()],
        SqlStatement::Update(s) => vec![s.table.clone()],
        SqlStatement::Delete(s) => vec![s.table.clone()],
    }
}

fn hint_text(stmt: &SqlStatement) -> Option<&str> {
    match stmt {
        SqlStatement::Select(s) => s.hints.as_deref(),
        _ => None,
    }
}

fn run_pipeline(
    stmt: &SqlStatement,
    source: &dyn DataSource,
    config: &OptimizerConfig,
    cost_model: &CostModel,
) -> Result<PhysicalPlan, OptError> {
    let hints = hint_text(stmt).map(OptimizerHints::from_raw).unwrap_or_default();
    if !hints.unknown.is_empty() {
        tracing::warn!(unknown = ?hints.unknown, "statement carried unrecognized hints");
    }

    let logical = PlanBuilder::new(source).build(stmt)?;

    let rule_ctx = RuleContext { config, hints: &hints };
    let rewritten = RuleSet::standard().apply_to_fixed_point(logical, &rule_ctx);

    let reordered = reorder_joins(rewritten, source, cost_model, &hints, config.dp_join_limit);

    let converter = PlanConverter::new(source, cost_model, &hints, config);
    Ok(converter.convert(&reordered))
}

/// No plan cache, no index advisor: every call re-runs the full pipeline.
/// Appropriate for one-shot or ad hoc statements where caching overhead
/// isn't worth it.
pub struct BaseOptimizer {
    source: Arc<dyn DataSource>,
    config: OptimizerConfig,
    cost_model: CostModel,
}

impl BaseOptimizer {
    pub fn new(source: Arc<dyn DataSource>, config: OptimizerConfig) -> Self {
        let cost_model = CostModel::new(HardwareProfile::detect());
        Self { source, config, cost_model }
    }
}

impl OptimizePipeline for BaseOptimizer {
    #[instrument(skip_all)]
    fn optimize(&self, stmt: &SqlStatement) -> Result<PhysicalPlan, OptError> {
        run_pipeline(stmt, self.source.as_ref(), &self.config, &self.cost_model)
    }
}

/// Adds a fingerprint-keyed plan cache in front of the base pipeline.
pub struct EnhancedOptimizer {
    source: Arc<dyn DataSource>,
    config: OptimizerConfig,
    cost_model: CostModel,
    cache: PlanCache,
}

impl EnhancedOptimizer {
    pub fn new(source: Arc<dyn DataSource>, config: OptimizerConfig) -> Self {
        let cost_model = CostModel::new(HardwareProfile::detect());
        let cache = PlanCache::new(config.plan_cache_capacity);
        Self { source, config, cost_model, cache }
    }

    /// Evicts every cached plan depending on `table`. Called by the
    /// embedder when a statistics delta for that table crosses its
    /// invalidation threshold.
    pub fn invalidate_table(&self, table: &str) {
        self.cache.invalidate_table(table);
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

impl OptimizePipeline for EnhancedOptimizer {
    #[instrument(skip_all)]
    fn optimize(&self, stmt: &SqlStatement) -> Result<PhysicalPlan, OptError> {
        let key = fingerprint(stmt);
        if let Some(cached) = self.cache.get(&key) {
            tracing::trace!(%key, "plan cache hit");
            return Ok((*cached).clone());
        }

        let span = info_span!("plan_cache_miss", %key);
        let _guard = span.enter();
        let physical = run_pipeline(stmt, self.source.as_ref(), &self.config, &self.cost_model)?;
        self.cache.insert(key, Arc::new(physical.clone()), tables_referenced(stmt));
        Ok(physical)
    }
}

/// Closed sum type over the two pipeline variants, selected once at
/// construction time by `config.use_enhanced_optimizer`.
pub enum Optimizer {
    Base(BaseOptimizer),
    Enhanced(EnhancedOptimizer),
}

impl Optimizer {
    pub fn new(source: Arc<dyn DataSource>, config: OptimizerConfig) -> Self {
        if config.use_enhanced_optimizer {
            Optimizer::Enhanced(EnhancedOptimizer::new(source, config))
        } else {
            Optimizer::Base(BaseOptimizer::new(source, config))
        }
    }
}

impl OptimizePipeline for Optimizer {
    fn optimize(&self, stmt: &SqlStatement) -> Result<PhysicalPlan, OptError> {
        match self {
            Optimizer::Base(o) => o.optimize(stmt),
            Optimizer::Enhanced(o) => o.optimize(stmt),
        }
    }
}
