// Hardware-calibrated cost model.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskClass {
    Nvme,
    Ssd,
    Hdd,
}

impl DiskClass {
    /// Relative throughput used to scale the IO factor; NVMe is fastest.
    fn throughput_weight(self) -> f64 {
        match self {
            DiskClass::Nvme => 8.0,
            DiskClass::Ssd => 3.0,
            DiskClass::Hdd => 1.0,
        }
    }
}

/// Hardware characteristics detected once at startup and held immutable
/// thereafter.
#[derive(Debug, Clone, Copy)]
pub struct HardwareProfile {
    pub cores: usize,
    pub cpu_freq_mhz: u64,
    pub memory_mb: u64,
    pub disk_class: DiskClass,
    pub cloud: bool,
}

impl HardwareProfile {
    /// Detect via `sys-info`/`num_cpus`, degrading to documented defaults
    /// on any platform where detection is partial or unavailable — must
    /// never panic.
    pub fn detect() -> Self {
        let cores = num_cpus::get().max(1);
        let cpu_freq_mhz = sys_info::cpu_speed().unwrap_or(2_000);
        let memory_mb = sys_info::mem_info().map(|m| m.total / 1024).unwrap_or(8_192);
        Self {
            cores,
            cpu_freq_mhz,
            memory_mb,
            disk_class: DiskClass::Ssd,
            cloud: false,
        }
    }

    pub fn with_disk_class(mut self, disk_class: DiskClass) -> Self {
        self.disk_class = disk_class;
        self
    }

    pub fn with_cloud(mut self, cloud: bool) -> Self {
        self.cloud = cloud;
        self
    }

    fn io_factor(&self) -> f64 {
        1.0 / self.disk_class.throughput_weight()
    }

    fn cpu_factor(&self) -> f64 {
        let ghz = (self.cpu_freq_mhz as f64 / 1000.0).max(0.1);
        1.0 / (self.cores as f64 * ghz)
    }

    fn mem_factor(&self) -> f64 {
        1.0 / (self.memory_mb as f64 / 1024.0).max(0.1)
    }

    fn network_factor(&self) -> f64 {
        let base = 0.01;
        if self.cloud {
            base * 1.5
        } else {
            base
        }
    }
}

impl Default for HardwareProfile {
    fn default() -> Self {
        Self { cores: 4, cpu_freq_mhz: 2_500, memory_mb: 8_192, disk_class: DiskClass::Ssd, cloud: false }
    }
}

/// Per-statement cost accumulator; values are abstract units, not seconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cost(pub f64);

impl Cost {
    pub fn zero() -> Self {
        Cost(0.0)
    }
}

impl std::ops::Add for Cost {
    type Output = Cost;
    fn add(self, rhs: Self) -> Self::Output {
        Cost(self.0 + rhs.0)
    }
}

pub struct CostModel {
    hw: HardwareProfile,
}

impl CostModel {
    pub fn new(hw: HardwareProfile) -> Self {
        Self { hw }
    }

    pub fn hardware(&self) -> &HardwareProfile {
        &self.hw
    }

    /// Full scan (no index): `rows * (io_factor + cpu_factor)`.
    pub fn scan_cost(&self, rows: u64) -> Cost {
        Cost(rows as f64 * (self.hw.io_factor() + self.hw.cpu_factor()))
    }

    /// Scan through an index: `rows*selectivity*(io+cpu) + lookup_constant*matches`.
    pub fn index_scan_cost(&self, rows: u64, selectivity: f64, lookup_constant: f64) -> Cost {
        let matches = rows as f64 * selectivity;
        Cost(matches * (self.hw.io_factor() + self.hw.cpu_factor()) + lookup_constant * matches)
    }

    /// Selection: `rows*cpu_factor + (rows*selectivity)*output_cpu_factor`.
    pub fn filter_cost(&self, rows: u64, selectivity: f64) -> Cost {
        let output_cpu_factor = self.hw.cpu_factor() * 0.5;
        Cost(rows as f64 * self.hw.cpu_factor() + (rows as f64 * selectivity) * output_cpu_factor)
    }

    /// Hash join: build side is the smaller input.
    pub fn hash_join_cost(&self, left_rows: u64, right_rows: u64, output_rows: u64) -> Cost {
        let (build_rows, probe_rows) = if left_rows <= right_rows {
            (left_rows, right_rows)
        } else {
            (right_rows, left_rows)
        };
        let build = build_rows as f64 * (self.hw.cpu_factor() + self.hw.mem_factor());
        let probe = probe_rows as f64 * self.hw.cpu_factor();
        let output = output_rows as f64 * self.hw.cpu_factor();
        Cost(build + probe + output)
    }

    /// Merge join over inputs assumed sorted; pass a non-zero `sort_cost`
    /// for each side that isn't.
    pub fn merge_join_cost(&self, left_rows: u64, right_rows: u64, extra_sort_cost: Cost) -> Cost {
        let merge = (left_rows + right_rows) as f64 * self.hw.cpu_factor();
        Cost(merge) + extra_sort_cost
    }

    /// Nested-loop / index-nested-loop: `outer * inner_lookup_cost`.
    pub fn nested_loop_cost(&self, outer_rows: u64, inner_lookup_cost: Cost) -> Cost {
        Cost(outer_rows as f64 * inner_lookup_cost.0)
    }

    /// Aggregate: `rows*cpu*(1+group_by_cols) + hash table mem term ∝ groups`.
    pub fn aggregate_cost(&self, rows: u64, group_by_cols: usize, estimated_groups: u64) -> Cost {
        let cpu = rows as f64 * self.hw.cpu_factor() * (1.0 + group_by_cols as f64);
        let mem = estimated_groups as f64 * self.hw.mem_factor();
        Cost(cpu + mem)
    }

    /// Sort: `rows*log(rows)*cpu + rows*mem`.
    pub fn sort_cost(&self, rows: u64) -> Cost {
        if rows == 0 {
            return Cost::zero();
        }
        let n = rows as f64;
        Cost(n * n.log2() * self.hw.cpu_factor() + n * self.hw.mem_factor())
    }

    /// Projection: `rows * num_output_cols * cpu`.
    pub fn projection_cost(&self, rows: u64, num_output_cols: usize) -> Cost {
        Cost(rows as f64 * num_output_cols as f64 * self.hw.cpu_factor())
    }

    /// Network transfer cost for a distributed/remote operator.
    pub fn network_cost(&self, rows: u64, row_width_bytes: u64) -> Cost {
        Cost((rows * row_width_bytes) as f64 * self.hw.network_factor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_never_panics() {
        let hw = HardwareProfile::detect();
        assert!(hw.cores >= 1);
    }

    #[test]
    fn hash_join_builds_from_smaller_side() {
        let model = CostModel::new(HardwareProfile::default());
        let a = model.hash_join_cost(10, 1_000_000, 10);
        let b = model.hash_join_cost(1_000_000, 10, 10);
        assert!((a.0 - b.0).abs() < 1e-6);
    }

    #[test]
    fn faster_disk_lowers_scan_cost() {
        let nvme = CostModel::new(HardwareProfile::default().with_disk_class(DiskClass::Nvme));
        let hdd = CostModel::new(HardwareProfile::default().with_disk_class(DiskClass::Hdd));
        assert!(nvme.scan_cost(10_000).0 < hdd.scan_cost(10_000).0);
    }

    #[test]
    fn cloud_network_costs_more() {
        let cloud = CostModel::new(HardwareProfile::default().with_cloud(true));
        let onprem = CostModel::new(HardwareProfile::default().with_cloud(false));
        assert!(cloud.network_cost(1000, 100).0 > onprem.network_cost(1000, 100).0);
    }
}
