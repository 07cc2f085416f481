// Recursive-descent parser for `/*+ ... */` optimizer hint blocks.
//
// Grammar: `Hint ::= IDENT('(' args ')')?`, `args ::= IDENT(',' IDENT)*`.
// Unknown hints are collected into a diagnostic list and never fail the
// parse: they are logged and ignored so optimization can proceed.

use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct RawHint {
    pub name: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct HintParseResult {
    pub hints: Vec<RawHint>,
    /// Hint names this parser didn't recognize, logged but not fatal.
    pub unknown: Vec<String>,
}

pub struct HintParser;

impl HintParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse the raw text found inside `/*+ ... */` (delimiters already
    /// stripped by the caller, or present — both are tolerated).
    pub fn parse(&self, raw: &str) -> HintParseResult {
        let text = raw.trim().trim_start_matches("/*+").trim_end_matches("*/").trim();
        let mut result = HintParseResult::default();
        let mut chars = text.chars().peekable();

        loop {
            skip_whitespace(&mut chars);
            if chars.peek().is_none() {
                break;
            }
            let Some(name) = read_ident(&mut chars) else {
                warn!(text = %text, "could not parse hint token, stopping");
                break;
            };
            skip_whitespace(&mut chars);
            let mut args = Vec::new();
            if chars.peek() == Some(&'(') {
                chars.next();
                loop {
                    skip_whitespace(&mut chars);
                    if chars.peek() == Some(&')') {
                        chars.next();
                        break;
                    }
                    match read_ident(&mut chars) {
                        Some(arg) => args.push(arg),
                        None => {
                            warn!(hint = %name, "malformed argument list, ignoring hint");
                            break;
                        }
                    }
                    skip_whitespace(&mut chars);
                    if chars.peek() == Some(&',') {
                        chars.next();
                    }
                }
            }
            if KNOWN_HINTS.contains(&name.to_uppercase().as_str()) {
                result.hints.push(RawHint { name: name.to_uppercase(), args });
            } else {
                warn!(hint = %name, "unknown hint, ignored");
                result.unknown.push(name);
            }
        }

        result
    }
}

impl Default for HintParser {
    fn default() -> Self {
        Self::new()
    }
}

fn skip_whitespace(chars: &mut std::iter::Peekable<std::str::Chars>) {
    while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == ',') {
        chars.next();
    }
}

fn read_ident(chars: &mut std::iter::Peekable<std::str::Chars>) -> Option<String> {
    let mut ident = String::new();
    while matches!(chars.peek(), Some(c) if c.is_alphanumeric() || *c == '_' || *c == '.') {
        ident.push(chars.next().unwrap());
    }
    if ident.is_empty() {
        None
    } else {
        Some(ident)
    }
}

const KNOWN_HINTS: &[&str] = &[
    "HASH_JOIN",
    "MERGE_JOIN",
    "INL_JOIN",
    "NO_HASH_JOIN",
    "LEADING",
    "STRAIGHT_JOIN",
    "USE_INDEX",
    "FORCE_INDEX",
    "IGNORE_INDEX",
    "ORDER_INDEX",
    "NO_ORDER_INDEX",
    "HASH_AGG",
    "STREAM_AGG",
    "SEMI_JOIN_REWRITE",
    "NO_DECORRELATE",
    "USE_TOJA",
    "QB_NAME",
    "MAX_EXECUTION_TIME",
    "MEMORY_QUOTA",
    "READ_CONSISTENT_REPLICA",
];

/// Priority for conflicting index hints on the same table, highest first
///.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexHintPriority {
    NoOrderIndex,
    OrderIndex,
    IgnoreIndex,
    UseIndex,
    ForceIndex,
}

#[derive(Debug, Clone, Default)]
pub struct IndexHints {
    pub force: Option<String>,
    pub allowed: Vec<String>,
    pub ignored: Vec<String>,
    pub order_index: Option<String>,
    pub no_order_index: bool,
}

/// Structured view of a parsed hint block, built by folding [`RawHint`]s
/// per-table/per-join, used by the hint-aware rewrite rules.
#[derive(Debug, Clone, Default)]
pub struct OptimizerHints {
    pub hash_join_pairs: Vec<(String, String)>,
    pub merge_join: bool,
    pub inl_join: bool,
    pub no_hash_join: bool,
    pub leading: Vec<String>,
    pub straight_join: bool,
    pub index_hints: std::collections::HashMap<String, IndexHints>,
    pub hash_agg: bool,
    pub stream_agg: bool,
    pub semi_join_rewrite: bool,
    pub no_decorrelate: bool,
    pub use_toja: Option<bool>,
    pub qb_name: Option<String>,
    pub max_execution_time_ms: Option<u64>,
    pub memory_quota_bytes: Option<u64>,
    pub read_consistent_replica: bool,
    pub unknown: Vec<String>,
}

impl OptimizerHints {
    pub fn from_raw(text: &str) -> Self {
        let parsed = HintParser::new().parse(text);
        let mut hints = OptimizerHints { unknown: parsed.unknown, ..Default::default() };

        for hint in parsed.hints {
            match hint.name.as_str() {
                "HASH_JOIN" if hint.args.len() == 2 => {
                    hints.hash_join_pairs.push((hint.args[0].clone(), hint.args[1].clone()))
                }
                "MERGE_JOIN" => hints.merge_join = true,
                "INL_JOIN" => hints.inl_join = true,
                "NO_HASH_JOIN" => hints.no_hash_join = true,
                "LEADING" => hints.leading = hint.args,
                "STRAIGHT_JOIN" => hints.straight_join = true,
                "USE_INDEX" if !hint.args.is_empty() => {
                    let table = hint.args[0].clone();
                    let entry = hints.index_hints.entry(table).or_default();
                    entry.allowed.extend(hint.args[1..].iter().cloned());
                }
                "FORCE_INDEX" if hint.args.len() >= 2 => {
                    let entry = hints.index_hints.entry(hint.args[0].clone()).or_default();
                    entry.force = Some(hint.args[1].clone());
                }
                "IGNORE_INDEX" if !hint.args.is_empty() => {
                    let table = hint.args[0].clone();
                    let entry = hints.index_hints.entry(table).or_default();
                    entry.ignored.extend(hint.args[1..].iter().cloned());
                }
                "ORDER_INDEX" if hint.args.len() >= 2 => {
                    let entry = hints.index_hints.entry(hint.args[0].clone()).or_default();
                    entry.order_index = Some(hint.args[1].clone());
                }
                "NO_ORDER_INDEX" if !hint.args.is_empty() => {
                    let entry = hints.index_hints.entry(hint.args[0].clone()).or_default();
                    entry.no_order_index = true;
                }
                "HASH_AGG" => hints.hash_agg = true,
                "STREAM_AGG" => hints.stream_agg = true,
                "SEMI_JOIN_REWRITE" => hints.semi_join_rewrite = true,
                "NO_DECORRELATE" => hints.no_decorrelate = true,
                "USE_TOJA" if !hint.args.is_empty() => {
                    hints.use_toja = Some(hint.args[0].eq_ignore_ascii_case("true"));
                }
                "QB_NAME" if !hint.args.is_empty() => hints.qb_name = Some(hint.args[0].clone()),
                "MAX_EXECUTION_TIME" if !hint.args.is_empty() => {
                    hints.max_execution_time_ms = hint.args[0].parse().ok();
                }
                "MEMORY_QUOTA" if !hint.args.is_empty() => {
                    hints.memory_quota_bytes = hint.args[0].parse().ok();
                }
                "READ_CONSISTENT_REPLICA" => hints.read_consistent_replica = true,
                _ => warn!(hint = %hint.name, args = ?hint.args, "hint arguments did not match expected arity"),
            }
        }

        hints
    }

    /// Resolve the index hint priority for a table, per the documented ordering:
    /// FORCE_INDEX > USE_INDEX > IGNORE_INDEX > ORDER_INDEX > NO_ORDER_INDEX.
    pub fn index_priority_for(&self, table: &str) -> Option<IndexHintPriority> {
        let h = self.index_hints.get(table)?;
        if h.force.is_some() {
            Some(IndexHintPriority::ForceIndex)
        } else if !h.allowed.is_empty() {
            Some(IndexHintPriority::UseIndex)
        } else if !h.ignored.is_empty() {
            Some(IndexHintPriority::IgnoreIndex)
        } else if h.order_index.is_some() {
            Some(IndexHintPriority::OrderIndex)
        } else if h.no_order_index {
            Some(IndexHintPriority::NoOrderIndex)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hash_join_and_use_index() {
        let hints = OptimizerHints::from_raw("/*+ HASH_JOIN(t1,t2) USE_INDEX(orders, idx_customer) */");
        assert_eq!(hints.hash_join_pairs, vec![("t1".to_string(), "t2".to_string())]);
        assert_eq!(hints.index_hints.get("orders").unwrap().allowed, vec!["idx_customer"]);
    }

    #[test]
    fn unknown_hint_is_collected_not_fatal() {
        let hints = OptimizerHints::from_raw("/*+ TOTALLY_MADE_UP(x) */");
        assert_eq!(hints.unknown, vec!["TOTALLY_MADE_UP"]);
    }

    #[test]
    fn index_hint_priority_prefers_force_over_use() {
        let hints = OptimizerHints::from_raw("/*+ FORCE_INDEX(t, idx_a) USE_INDEX(t, idx_b) */");
        assert_eq!(hints.index_priority_for("t"), Some(IndexHintPriority::ForceIndex));
    }

    #[test]
    fn empty_block_parses_to_no_hints() {
        let hints = OptimizerHints::from_raw("/*+ */");
        assert!(hints.hash_join_pairs.is_empty());
        assert!(hints.unknown.is_empty());
    }
}
