// rusty-optimizer: cost-based SQL query optimizer core.
//
// Consumes a parsed `SqlStatement` and a `DataSource` (metadata +
// statistics) implemented by the embedding application, and produces a
// serializable `PhysicalPlan` for an external execution engine. Parsing,
// execution, storage, and catalog persistence are all handled upstream,
// outside this crate's boundary.

pub mod advisor;
pub mod ast;
pub mod cache;
pub mod catalog;
pub mod common;
pub mod config;
pub mod converter;
pub mod cost;
pub mod error;
pub mod expr;
pub mod hints;
pub mod join_reorder;
pub mod physical;
pub mod plan;
pub mod rules;
pub mod schema;
pub mod stats;
pub mod value;

mod optimizer;

pub use error::{OptError, Result};
pub use optimizer::{BaseOptimizer, EnhancedOptimizer, OptimizePipeline, Optimizer};
