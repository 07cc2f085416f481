// Rule-driven rewrite engine. Rules run to a structural fixed point,
// bounded by `max_rule_iterations`; a rule that fails to apply reverts the
// plan to its pre-rule state and the next rule still runs.

pub mod column_pruning;
pub mod decorrelate;
pub mod hint_aware;
pub mod max_min;
pub mod predicate_pushdown;
pub mod projection_elimination;
pub mod semi_join_rewrite;
pub mod subquery_flatten;
pub mod topn;
pub mod union_split;

use crate::config::OptimizerConfig;
use crate::hints::OptimizerHints;
use crate::plan::LogicalPlan;
use tracing::{trace, warn};

/// A single rewrite rule. `matches` is a cheap pre-check; `apply` performs
/// the actual rewrite and may fail (in which case the engine discards the
/// attempt and keeps the prior plan).
pub trait Rule: Send + Sync {
    fn name(&self) -> &'static str;
    fn matches(&self, plan: &LogicalPlan) -> bool;
    fn apply(&self, plan: &LogicalPlan, ctx: &RuleContext) -> Option<LogicalPlan>;
}

/// Shared, read-only context threaded through every rule application.
pub struct RuleContext<'a> {
    pub config: &'a OptimizerConfig,
    pub hints: &'a OptimizerHints,
}

pub struct RuleSet {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleSet {
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    /// Canonicalizing rules first so
    /// later stages see the shallowest possible tree, then hint-aware rules
    /// so cost-based decisions already see hint-forced choices, then the
    /// reducing/reordering rules, finishing with the rules that tidy up
    /// whatever the earlier passes left behind.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(subquery_flatten::SubqueryFlattening),
            Box::new(decorrelate::Decorrelate),
            Box::new(hint_aware::HintAwareJoin),
            Box::new(hint_aware::HintAwareIndex),
            Box::new(hint_aware::HintAwareAggregation),
            Box::new(predicate_pushdown::PredicatePushdown),
            Box::new(column_pruning::ColumnPruning),
            Box::new(union_split::OrToUnionSplit),
            Box::new(semi_join_rewrite::SemiJoinRewrite),
            Box::new(topn::TopNPushdown),
            Box::new(topn::DeriveTopNFromWindow),
            Box::new(max_min::MaxMinElimination),
            Box::new(projection_elimination::ProjectionElimination),
        ])
    }

    /// Apply every rule once to the whole tree, then repeat until the tree
    /// stops changing or `max_rule_iterations` is reached.
    pub fn apply_to_fixed_point(&self, plan: LogicalPlan, ctx: &RuleContext) -> LogicalPlan {
        let mut current = plan;
        for iteration in 0..ctx.config.max_rule_iterations {
            let before = format!("{current:?}");
            for rule in &self.rules {
                current = self.apply_rule_recursively(rule.as_ref(), current, ctx);
            }
            if format!("{current:?}") == before {
                trace!(iteration, "rule engine reached a fixed point");
                break;
            }
        }
        current
    }

    /// Apply one rule to every node in the tree, bottom-up, reverting to
    /// the original node whenever `apply` returns `None` or post-rewrite
    /// validation fails — a rule failure aborts only that one application.
    fn apply_rule_recursively(&self, rule: &dyn Rule, plan: LogicalPlan, ctx: &RuleContext) -> LogicalPlan {
        let plan = rewrite_children(plan, &mut |child| self.apply_rule_recursively(rule, child, ctx));
        if rule.matches(&plan) {
            match rule.apply(&plan, ctx) {
                Some(rewritten) => {
                    let required: Vec<String> = plan.schema().columns.iter().map(|c| c.name.clone()).collect();
                    if preserves_required_columns(&plan, &rewritten, &required) {
                        rewritten
                    } else {
                        plan
                    }
                }
                None => plan,
            }
        } else {
            plan
        }
    }
}

/// Rebuild `plan` with `f` applied to each of its direct children, without
/// touching the node's own operator-specific fields.
pub fn rewrite_children(mut plan: LogicalPlan, f: &mut impl FnMut(LogicalPlan) -> LogicalPlan) -> LogicalPlan {
    match &mut plan {
        LogicalPlan::DataSource(_) | LogicalPlan::Insert(_) => {}
        LogicalPlan::Selection(n) => replace_boxed(&mut n.input, f),
        LogicalPlan::Projection(n) => replace_boxed(&mut n.input, f),
        LogicalPlan::Join(n) => {
            replace_boxed(&mut n.left, f);
            replace_boxed(&mut n.right, f);
        }
        LogicalPlan::Aggregate(n) => replace_boxed(&mut n.input, f),
        LogicalPlan::Sort(n) => replace_boxed(&mut n.input, f),
        LogicalPlan::Limit(n) => replace_boxed(&mut n.input, f),
        LogicalPlan::TopN(n) => replace_boxed(&mut n.input, f),
        LogicalPlan::Window(n) => replace_boxed(&mut n.input, f),
        LogicalPlan::Apply(n) => {
            replace_boxed(&mut n.outer, f);
            replace_boxed(&mut n.inner, f);
        }
        LogicalPlan::Union(n) => {
            let inputs = std::mem::take(&mut n.inputs);
            n.inputs = inputs.into_iter().map(|p| f(p)).collect();
        }
        LogicalPlan::Update(n) => replace_boxed(&mut n.input, f),
        LogicalPlan::Delete(n) => replace_boxed(&mut n.input, f),
    }
    plan
}

fn replace_boxed(b: &mut Box<LogicalPlan>, f: &mut impl FnMut(LogicalPlan) -> LogicalPlan) {
    let taken = std::mem::replace(b.as_mut(), LogicalPlan::Union(crate::plan::UnionNode { inputs: vec![], distinct: false }));
    *b = Box::new(f(taken));
}

/// Checks a rewrite against the invariant that it must not drop a column
/// the parent still needs; callers `warn!` and discard the rewrite when it
/// fails rather than emitting an invalid plan.
pub fn preserves_required_columns(original: &LogicalPlan, rewritten: &LogicalPlan, required: &[String]) -> bool {
    let schema = rewritten.schema();
    let ok = required.iter().all(|c| schema.contains(c));
    if !ok {
        warn!(rule_output = ?rewritten.explain(), original = ?original.explain(), "rewrite dropped a required column, reverting");
    }
    ok
}
