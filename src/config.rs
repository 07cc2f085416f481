// Optimizer-level configuration.

/// Degree of parallelism requested by the embedder. `Auto` resolves to
/// `min(cores, 8)` at the point of use; an explicit value is clamped to
/// `[1, 8]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parallelism {
    Auto,
    Fixed(usize),
}

impl Parallelism {
    pub fn resolve(self, cores: usize) -> usize {
        match self {
            Parallelism::Auto => cores.min(8).max(1),
            Parallelism::Fixed(n) => n.clamp(1, 8),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    pub use_enhanced_optimizer: bool,
    pub max_rule_iterations: usize,
    pub dp_join_limit: usize,
    pub plan_cache_capacity: usize,
    pub advisor_max_indexes: usize,
    pub advisor_max_columns: usize,
    pub advisor_population: usize,
    pub advisor_generations: usize,
    pub advisor_timeout: std::time::Duration,
    pub advisor_max_total_size: u64,
    pub parallelism: Parallelism,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            use_enhanced_optimizer: true,
            max_rule_iterations: 10,
            dp_join_limit: 10,
            plan_cache_capacity: 1024,
            advisor_max_indexes: 5,
            advisor_max_columns: 3,
            advisor_population: 50,
            advisor_generations: 100,
            advisor_timeout: std::time::Duration::from_secs(30),
            advisor_max_total_size: 10 * 1024 * 1024 * 1024,
            parallelism: Parallelism::Auto,
        }
    }
}

/// Fluent builder, used mostly by tests that only want to override one
/// or two fields.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: OptimizerConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self { config: OptimizerConfig::default() }
    }

    pub fn use_enhanced_optimizer(mut self, v: bool) -> Self {
        self.config.use_enhanced_optimizer = v;
        self
    }

    pub fn max_rule_iterations(mut self, v: usize) -> Self {
        self.config.max_rule_iterations = v;
        self
    }

    pub fn dp_join_limit(mut self, v: usize) -> Self {
        self.config.dp_join_limit = v;
        self
    }

    pub fn plan_cache_capacity(mut self, v: usize) -> Self {
        self.config.plan_cache_capacity = v;
        self
    }

    pub fn advisor_max_indexes(mut self, v: usize) -> Self {
        self.config.advisor_max_indexes = v;
        self
    }

    pub fn build(self) -> OptimizerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = OptimizerConfig::default();
        assert!(cfg.use_enhanced_optimizer);
        assert_eq!(cfg.max_rule_iterations, 10);
        assert_eq!(cfg.dp_join_limit, 10);
        assert_eq!(cfg.plan_cache_capacity, 1024);
        assert_eq!(cfg.advisor_max_indexes, 5);
        assert_eq!(cfg.advisor_max_columns, 3);
        assert_eq!(cfg.advisor_population, 50);
        assert_eq!(cfg.advisor_generations, 100);
    }

    #[test]
    fn parallelism_auto_clamps_to_eight() {
        assert_eq!(Parallelism::Auto.resolve(32), 8);
        assert_eq!(Parallelism::Auto.resolve(2), 2);
        assert_eq!(Parallelism::Fixed(0).resolve(32), 1);
        assert_eq!(Parallelism::Fixed(99).resolve(32), 8);
    }

    #[test]
    fn builder_overrides_single_field() {
        let cfg = ConfigBuilder::new().dp_join_limit(4).build();
        assert_eq!(cfg.dp_join_limit, 4);
        assert_eq!(cfg.max_rule_iterations, 10);
    }
}
