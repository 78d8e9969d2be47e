//! Engine configuration (§6.3). All tuning happens through `init`'s parameters; there is no
//! environment-variable or file-based configuration layer because the crate has no CLI front
//! end, but the struct derives `serde::{Serialize, Deserialize}` behind the `serde` feature so
//! an embedding application can load it from its own config file.

use crate::error::{EngineError, Result};

/// Default node store size: 2^24 slots (16 bytes/slot => 256 MiB of virtual address space).
pub const DEFAULT_NODE_CAPACITY: u64 = 1 << 24;
/// Default operation cache size: 2^20 entries.
pub const DEFAULT_CACHE_CAPACITY: u64 = 1 << 20;
/// Minimum node store capacity; below this the region allocator (§3.2) cannot carve even one
/// 512-slot region per worker on an 8-worker pool.
pub const MIN_NODE_CAPACITY: u64 = 1 << 16;
/// Maximum node store capacity, bounded by the 40-bit index space of §3.1.
pub const MAX_NODE_CAPACITY: u64 = 1 << 40;

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    /// Total bytes reserved for the node store's virtual mapping; rounded down to a power-of-two
    /// slot count by `Engine::init`.
    pub node_bytes: u64,
    /// Total bytes reserved for the operation cache.
    pub cache_bytes: u64,
    /// Fraction of `node_bytes` that may be occupied before the GC coordinator grows the table
    /// (§4.2 "Resize"). Expressed as a ratio in `(0.0, 1.0]`.
    pub table_ratio: f64,
    /// Number of OS worker threads. Defaults to the available parallelism.
    pub workers: usize,
    /// Whether complement edges are enabled for BDD/MTBDD (§9 "Complement edges").
    pub complement_edges: bool,
    /// Whether the task runtime and node store collect lightweight event counters (steals,
    /// rehash failures, GC counts). Has no effect on correctness, only on `Engine::stats`.
    pub collect_stats: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            node_bytes: DEFAULT_NODE_CAPACITY * 16,
            cache_bytes: DEFAULT_CACHE_CAPACITY * 32,
            table_ratio: 0.75,
            workers: num_cpus::get(),
            complement_edges: true,
            collect_stats: false,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    pub(crate) fn node_capacity(&self) -> Result<u64> {
        let slots = (self.node_bytes / 16).next_power_of_two();
        if slots < MIN_NODE_CAPACITY || slots > MAX_NODE_CAPACITY {
            return Err(EngineError::InvalidNodeCapacity {
                actual: slots,
                min: MIN_NODE_CAPACITY,
                max: MAX_NODE_CAPACITY,
            });
        }
        Ok(slots)
    }

    pub(crate) fn cache_capacity(&self) -> Result<u64> {
        let entries = (self.cache_bytes / 32).next_power_of_two().max(1024);
        Ok(entries)
    }
}

/// Builder for `EngineConfig`, following the same fluent style as the rest of the public API
/// (`Engine::init` takes the finished config by value).
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    inner: OptionalConfig,
}

#[derive(Debug, Clone, Default)]
struct OptionalConfig {
    node_bytes: Option<u64>,
    cache_bytes: Option<u64>,
    table_ratio: Option<f64>,
    workers: Option<usize>,
    complement_edges: Option<bool>,
    collect_stats: Option<bool>,
}

impl EngineConfigBuilder {
    pub fn node_bytes(mut self, bytes: u64) -> Self {
        self.inner.node_bytes = Some(bytes);
        self
    }

    pub fn cache_bytes(mut self, bytes: u64) -> Self {
        self.inner.cache_bytes = Some(bytes);
        self
    }

    pub fn table_ratio(mut self, ratio: f64) -> Self {
        self.inner.table_ratio = Some(ratio);
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.inner.workers = Some(workers);
        self
    }

    pub fn complement_edges(mut self, enabled: bool) -> Self {
        self.inner.complement_edges = Some(enabled);
        self
    }

    pub fn collect_stats(mut self, enabled: bool) -> Self {
        self.inner.collect_stats = Some(enabled);
        self
    }

    pub fn build(self) -> Result<EngineConfig> {
        let defaults = EngineConfig::default();
        let workers = self.inner.workers.unwrap_or(defaults.workers);
        if workers == 0 {
            return Err(EngineError::InvalidWorkerCount { actual: workers });
        }
        Ok(EngineConfig {
            node_bytes: self.inner.node_bytes.unwrap_or(defaults.node_bytes),
            cache_bytes: self.inner.cache_bytes.unwrap_or(defaults.cache_bytes),
            table_ratio: self.inner.table_ratio.unwrap_or(defaults.table_ratio),
            workers,
            complement_edges: self.inner.complement_edges.unwrap_or(defaults.complement_edges),
            collect_stats: self.inner.collect_stats.unwrap_or(defaults.collect_stats),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = EngineConfig::default();
        assert!(cfg.node_capacity().is_ok());
        assert!(cfg.cache_capacity().is_ok());
    }

    #[test]
    fn builder_rejects_zero_workers() {
        let result = EngineConfig::builder().workers(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn node_capacity_is_rounded_to_power_of_two() {
        let cfg = EngineConfig::builder().node_bytes(17 * 16).build().unwrap();
        let cap = cfg.node_capacity().unwrap();
        assert_eq!(cap, cap.next_power_of_two());
        assert!(cap >= MIN_NODE_CAPACITY);
    }
}
