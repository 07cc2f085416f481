// Join reorder. Not a `Rule`: it needs table statistics
// and a cost model, neither of which a `RuleContext` carries, so the
// top-level optimizer runs it as its own pass between column pruning and
// the rest of the reducing rules.

use crate::ast::JoinType;
use crate::catalog::DataSource;
use crate::cost::CostModel;
use crate::expr::{Expression, Op};
use crate::hints::OptimizerHints;
use crate::plan::{DataSourceNode, JoinNode, LogicalPlan};
use crate::rules::rewrite_children;
use crate::stats::CardinalityEstimator;
use std::collections::{HashMap, HashSet};

/// Walk `plan`, reordering every maximal chain of `Inner`/`Cross` joins it
/// finds. Anything that isn't part of such a chain (a single scan, an
/// outer join, a subtree under a `Selection`) is left untouched and
/// recursed into looking for chains nested further down.
pub fn reorder_joins(plan: LogicalPlan, source: &dyn DataSource, cost_model: &CostModel, hints: &OptimizerHints, dp_join_limit: usize) -> LogicalPlan {
    if let Some((leaves, conds)) = flatten(&plan) {
        if leaves.len() >= 2 {
            return build_best_tree(leaves, conds, source, cost_model, hints, dp_join_limit);
        }
    }
    rewrite_children(plan, &mut |child| reorder_joins(child, source, cost_model, hints, dp_join_limit))
}

/// Pulls a left-to-right list of scan leaves and join conditions out of a
/// chain of `Inner`/`Cross` joins. `None` means `plan` isn't (entirely)
/// such a chain — e.g. it bottoms out in something other than a scan, or
/// one of the joins along the way is outer.
fn flatten(plan: &LogicalPlan) -> Option<(Vec<LogicalPlan>, Vec<Expression>)> {
    match plan {
        LogicalPlan::Join(n) if matches!(n.join_type, JoinType::Inner | JoinType::Cross) => {
            let (mut leaves, mut conds) = flatten(&n.left)?;
            let (right_leaves, right_conds) = flatten(&n.right)?;
            leaves.extend(right_leaves);
            conds.extend(right_conds);
            if let Some(c) = &n.condition {
                conds.extend(c.split_conjuncts());
            }
            Some((leaves, conds))
        }
        LogicalPlan::DataSource(_) => Some((vec![plan.clone()], vec![])),
        _ => None,
    }
}

#[derive(Clone)]
struct Entry {
    plan: LogicalPlan,
    rows: u64,
    cost: f64,
    leaf_count: usize,
}

fn build_best_tree(
    leaves: Vec<LogicalPlan>,
    conds: Vec<Expression>,
    source: &dyn DataSource,
    cost_model: &CostModel,
    hints: &OptimizerHints,
    dp_join_limit: usize,
) -> LogicalPlan {
    let n = leaves.len();
    let leaf_of = leaf_index_by_column(&leaves);
    let card = CardinalityEstimator::new();

    if !hints.straight_join && hints.leading.is_empty() && n <= dp_join_limit {
        dp_reorder(&leaves, &conds, &leaf_of, source, cost_model, &card)
    } else if hints.straight_join || !hints.leading.is_empty() {
        let order = leading_order(&leaves, hints);
        left_deep(&leaves, &conds, &order, &leaf_of, source, cost_model, &card)
    } else {
        greedy_reorder(&leaves, &conds, &leaf_of, source, cost_model, &card)
    }
}

/// `LEADING(t1, t2, ...)` (or `STRAIGHT_JOIN` with the as-written order)
/// pins the initial join order, bypassing cost-based reordering entirely.
fn leading_order(leaves: &[LogicalPlan], hints: &OptimizerHints) -> Vec<usize> {
    if hints.leading.is_empty() {
        return (0..leaves.len()).collect();
    }
    let table_name = |i: usize| match &leaves[i] {
        LogicalPlan::DataSource(n) => n.table.as_str(),
        _ => "",
    };
    let mut order: Vec<usize> = hints
        .leading
        .iter()
        .filter_map(|name| (0..leaves.len()).find(|&i| table_name(i) == name))
        .collect();
    for i in 0..leaves.len() {
        if !order.contains(&i) {
            order.push(i);
        }
    }
    order
}

/// Bare column name -> owning leaf index, used to resolve join conditions
/// back to the scans they connect. Ambiguous names (the same bare name in
/// two joined tables) resolve to the first match — the upstream AST never
/// table-qualifies a `Column` expression, so this is the best this crate
/// can do without catalog-level disambiguation.
fn leaf_index_by_column(leaves: &[LogicalPlan]) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (i, leaf) in leaves.iter().enumerate() {
        if let LogicalPlan::DataSource(n) = leaf {
            for col in &n.schema.columns {
                map.entry(col.name.clone()).or_insert(i);
            }
        }
    }
    map
}

fn table_name(leaf: &LogicalPlan) -> &str {
    match leaf {
        LogicalPlan::DataSource(n) => n.table.as_str(),
        _ => "",
    }
}

/// Base cardinality/cost of a leaf scan, accounting for any predicate
/// already pushed onto it by `PredicatePushdown`.
fn leaf_stats(leaf: &LogicalPlan, source: &dyn DataSource, cost_model: &CostModel, card: &CardinalityEstimator) -> (u64, f64) {
    let LogicalPlan::DataSource(n) = leaf else { return (1000, cost_model.scan_cost(1000).0) };
    let stats = source.get_table_stats(&n.table);
    let base_rows = stats.as_ref().map(|s| s.row_count).unwrap_or(1000);
    let selectivity = n.pushed_predicates.as_ref().map(|p| card.filter_selectivity(stats.as_ref(), p)).unwrap_or(1.0);
    let rows = ((base_rows as f64) * selectivity).round().max(1.0) as u64;
    let cost = cost_model.scan_cost(base_rows).0 + n.pushed_predicates.as_ref().map(|_| cost_model.filter_cost(base_rows, selectivity).0).unwrap_or(0.0);
    (rows, cost)
}

/// `col_a = col_b` extraction, used both for join-graph connectivity and
/// for looking up each side's NDV.
fn equi_columns(expr: &Expression) -> Option<(&str, &str)> {
    match expr {
        Expression::Operator { op: Op::Eq, left, right } => match (left.as_ref(), right.as_ref()) {
            (Expression::Column(a), Expression::Column(b)) => Some((a.as_str(), b.as_str())),
            _ => None,
        },
        _ => None,
    }
}

fn condition_leaves(expr: &Expression, leaf_of: &HashMap<String, usize>) -> HashSet<usize> {
    expr.referenced_columns().iter().filter_map(|c| leaf_of.get(c).copied()).collect()
}

/// Every condition that connects exactly two distinct leaves, keyed by the
/// unordered leaf pair.
fn pair_conditions(conds: &[Expression], leaf_of: &HashMap<String, usize>) -> HashMap<(usize, usize), Vec<Expression>> {
    let mut map: HashMap<(usize, usize), Vec<Expression>> = HashMap::new();
    for cond in conds {
        let leaves = condition_leaves(cond, leaf_of);
        if leaves.len() == 2 {
            let mut it = leaves.into_iter();
            let (a, b) = (it.next().unwrap(), it.next().unwrap());
            let key = if a < b { (a, b) } else { (b, a) };
            map.entry(key).or_default().push(cond.clone());
        }
    }
    map
}

fn adjacency(n: usize, pair_conds: &HashMap<(usize, usize), Vec<Expression>>) -> Vec<HashSet<usize>> {
    let mut adj = vec![HashSet::new(); n];
    for &(a, b) in pair_conds.keys() {
        adj[a].insert(b);
        adj[b].insert(a);
    }
    adj
}

fn leaves_of_mask(mask: u32, n: usize) -> Vec<usize> {
    (0..n).filter(|i| mask & (1 << i) != 0).collect()
}

fn any_edge(sub: u32, other: u32, n: usize, adj: &[HashSet<usize>]) -> bool {
    leaves_of_mask(sub, n).iter().any(|&i| adj[i].iter().any(|&j| other & (1 << j) != 0))
}

/// Condition connecting exactly the leaves split across `sub`/`other`
/// (there may be several — AND them together), plus the join cardinality
/// that condition implies.
fn join_condition_and_cardinality(
    sub: u32,
    other: u32,
    n: usize,
    pair_conds: &HashMap<(usize, usize), Vec<Expression>>,
    leaves: &[LogicalPlan],
    source: &dyn DataSource,
    card: &CardinalityEstimator,
    left_rows: u64,
    right_rows: u64,
) -> (Option<Expression>, u64) {
    let mut exprs = Vec::new();
    for &i in &leaves_of_mask(sub, n) {
        for &j in &leaves_of_mask(other, n) {
            let key = if i < j { (i, j) } else { (j, i) };
            if let Some(cs) = pair_conds.get(&key) {
                exprs.extend(cs.iter().cloned());
            }
        }
    }
    if exprs.is_empty() {
        return (None, card.cross_join_cardinality(left_rows, right_rows));
    }
    let ndv = exprs.iter().find_map(|e| equi_columns(e)).and_then(|(a, b)| {
        let (li, lj) = (leaves.iter().find(|l| matches!(l, LogicalPlan::DataSource(n) if n.schema.contains(a)))?, leaves.iter().find(|l| matches!(l, LogicalPlan::DataSource(n) if n.schema.contains(b)))?);
        let left_ndv = source.get_column_stats(table_name(li), a).map(|s| s.ndv);
        let right_ndv = source.get_column_stats(table_name(lj), b).map(|s| s.ndv);
        Some((left_ndv, right_ndv))
    });
    let rows = match ndv {
        Some((l, r)) => card.join_cardinality(left_rows, right_rows, l, r),
        None => card.join_cardinality(left_rows, right_rows, None, None),
    };
    (Expression::from_conjuncts(exprs), rows)
}

fn join_plan(a: &Entry, b: &Entry, condition: Option<Expression>) -> LogicalPlan {
    LogicalPlan::Join(JoinNode {
        left: Box::new(a.plan.clone()),
        right: Box::new(b.plan.clone()),
        join_type: if condition.is_some() { JoinType::Inner } else { JoinType::Cross },
        condition,
        hint_applied: None,
    })
}

/// Bitset DP over connected subsets, preferring a balanced (bushy) split
/// among near-tied partitions once the join has enough tables for
/// parallel subtree execution to matter.
fn dp_reorder(
    leaves: &[LogicalPlan],
    conds: &[Expression],
    leaf_of: &HashMap<String, usize>,
    source: &dyn DataSource,
    cost_model: &CostModel,
    card: &CardinalityEstimator,
) -> LogicalPlan {
    let n = leaves.len();
    let pair_conds = pair_conditions(conds, leaf_of);
    let adj = adjacency(n, &pair_conds);

    let mut best: HashMap<u32, Entry> = HashMap::new();
    for (i, leaf) in leaves.iter().enumerate() {
        let (rows, cost) = leaf_stats(leaf, source, cost_model, card);
        best.insert(1 << i, Entry { plan: leaf.clone(), rows, cost, leaf_count: 1 });
    }

    let mut masks_by_size: Vec<Vec<u32>> = vec![Vec::new(); n + 1];
    for mask in 1u32..(1 << n) {
        masks_by_size[mask.count_ones() as usize].push(mask);
    }

    for size in 2..=n {
        for &mask in &masks_by_size[size] {
            let mut candidates: Vec<(u32, u32, f64)> = Vec::new();
            let mut sub = (mask.wrapping_sub(1)) & mask;
            while sub != 0 {
                let other = mask & !sub;
                if sub < other {
                    sub = (sub.wrapping_sub(1)) & mask;
                    continue;
                }
                if let (Some(a), Some(b)) = (best.get(&sub), best.get(&other)) {
                    if any_edge(sub, other, n, &adj) {
                        let (_, join_rows) = join_condition_and_cardinality(sub, other, n, &pair_conds, leaves, source, card, a.rows, b.rows);
                        let join_cost = cost_model.hash_join_cost(a.rows, b.rows, join_rows).0;
                        candidates.push((sub, other, a.cost + b.cost + join_cost));
                    }
                }
                sub = (sub.wrapping_sub(1)) & mask;
            }
            if candidates.is_empty() {
                // No single edge connects a sub-partition of this subset
                // yet; it'll be completed once a larger, connected superset
                // of it is built (or left for the cross-join cleanup below
                // if the whole graph is disconnected).
                continue;
            }
            candidates.sort_by(|x, y| x.2.partial_cmp(&y.2).unwrap());
            let min_cost = candidates[0].2;
            let chosen = if size >= 5 {
                candidates
                    .iter()
                    .filter(|c| c.2 <= min_cost * 1.05)
                    .min_by_key(|c| {
                        let la = best[&c.0].leaf_count as i64;
                        let lb = best[&c.1].leaf_count as i64;
                        (la - lb).abs()
                    })
                    .unwrap()
            } else {
                &candidates[0]
            };
            let (a_mask, b_mask, cost) = *chosen;
            let a = best[&a_mask].clone();
            let b = best[&b_mask].clone();
            let (condition, rows) = join_condition_and_cardinality(a_mask, b_mask, n, &pair_conds, leaves, source, card, a.rows, b.rows);
            best.insert(mask, Entry { plan: join_plan(&a, &b, condition), rows, cost, leaf_count: a.leaf_count + b.leaf_count });
        }
    }

    let full = (1u32 << n) - 1;
    match best.remove(&full) {
        Some(entry) => entry.plan,
        // Disconnected join graph (e.g. two unrelated tables with no
        // predicate between them): combine whatever maximal connected
        // components DP did manage to build via cross join.
        None => cross_join_remaining_components(&best, n),
    }
}

fn cross_join_remaining_components(best: &HashMap<u32, Entry>, n: usize) -> LogicalPlan {
    let mut covered = 0u32;
    let mut components = Vec::new();
    let mut masks: Vec<u32> = best.keys().copied().collect();
    masks.sort_by_key(|m| std::cmp::Reverse(m.count_ones()));
    for mask in masks {
        if mask & covered == 0 {
            components.push(best[&mask].clone());
            covered |= mask;
        }
    }
    debug_assert_eq!(covered, (1u32 << n) - 1);
    let mut iter = components.into_iter();
    let first = iter.next().expect("at least one component");
    iter.fold(first.plan, |acc, next| {
        LogicalPlan::Join(JoinNode { left: Box::new(acc), right: Box::new(next.plan), join_type: JoinType::Cross, condition: None, hint_applied: None })
    })
}

fn left_deep(
    leaves: &[LogicalPlan],
    conds: &[Expression],
    order: &[usize],
    leaf_of: &HashMap<String, usize>,
    source: &dyn DataSource,
    cost_model: &CostModel,
    card: &CardinalityEstimator,
) -> LogicalPlan {
    let n = leaves.len();
    let pair_conds = pair_conditions(conds, leaf_of);
    let mut acc_mask = 1u32 << order[0];
    let (rows0, cost0) = leaf_stats(&leaves[order[0]], source, cost_model, card);
    let mut acc = Entry { plan: leaves[order[0]].clone(), rows: rows0, cost: cost0, leaf_count: 1 };
    for &idx in &order[1..] {
        let (rows, _) = leaf_stats(&leaves[idx], source, cost_model, card);
        let next = Entry { plan: leaves[idx].clone(), rows, cost: 0.0, leaf_count: 1 };
        let next_mask = 1u32 << idx;
        let (condition, join_rows) = join_condition_and_cardinality(acc_mask, next_mask, n, &pair_conds, leaves, source, card, acc.rows, next.rows);
        acc = Entry { plan: join_plan(&acc, &next, condition), rows: join_rows, cost: 0.0, leaf_count: acc.leaf_count + 1 };
        acc_mask |= next_mask;
    }
    acc.plan
}

/// For `n > dp_join_limit`: repeatedly merge the pair of partial plans
/// whose join would produce the smallest estimated cardinality.
fn greedy_reorder(
    leaves: &[LogicalPlan],
    conds: &[Expression],
    leaf_of: &HashMap<String, usize>,
    source: &dyn DataSource,
    cost_model: &CostModel,
    card: &CardinalityEstimator,
) -> LogicalPlan {
    let n = leaves.len();
    let pair_conds = pair_conditions(conds, leaf_of);
    let mut partials: Vec<(u32, Entry)> = leaves
        .iter()
        .enumerate()
        .map(|(i, leaf)| {
            let (rows, cost) = leaf_stats(leaf, source, cost_model, card);
            (1u32 << i, Entry { plan: leaf.clone(), rows, cost, leaf_count: 1 })
        })
        .collect();

    while partials.len() > 1 {
        let mut best_pair = (0usize, 1usize, u64::MAX);
        for i in 0..partials.len() {
            for j in (i + 1)..partials.len() {
                let (_, rows) = join_condition_and_cardinality(partials[i].0, partials[j].0, n, &pair_conds, leaves, source, card, partials[i].1.rows, partials[j].1.rows);
                if rows < best_pair.2 {
                    best_pair = (i, j, rows);
                }
            }
        }
        let (i, j, _) = best_pair;
        let (mask_j, entry_j) = partials.remove(j);
        let (mask_i, entry_i) = partials.remove(i);
        let (condition, rows) = join_condition_and_cardinality(mask_i, mask_j, n, &pair_conds, leaves, source, card, entry_i.rows, entry_j.rows);
        let merged = Entry { plan: join_plan(&entry_i, &entry_j, condition), rows, cost: entry_i.cost + entry_j.cost, leaf_count: entry_i.leaf_count + entry_j.leaf_count };
        partials.push((mask_i | mask_j, merged));
    }
    partials.pop().unwrap().1.plan
}
