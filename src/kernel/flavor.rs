//! Which reduction rule `makenode` applies (§3.1). All four flavors share one node store, one
//! operation cache, and the same `Handle`/`NodeBody` encoding — `Flavor` only selects behavior at
//! construction time, never a different storage layout.

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Flavor {
    /// Complement edges enabled if `EngineConfig::complement_edges` is set.
    Bdd,
    /// Multi-terminal BDD: same skip-node rule as `Bdd`, but leaves carry typed payloads instead
    /// of just boolean 0/1, so complement edges are never used (negating a non-boolean leaf is
    /// undefined).
    Mtbdd,
    /// Zero-suppression rule; no complement edges.
    Zdd,
    /// Combined BDD skip-node + ZDD zero-suppression rule, plus tag propagation on the returned
    /// edge. No complement edges (kept disjoint from the tag bits in the same handle).
    Tbdd,
}

impl Flavor {
    pub fn allows_complement(self) -> bool {
        matches!(self, Flavor::Bdd)
    }

    pub fn uses_zero_suppression(self) -> bool {
        matches!(self, Flavor::Zdd | Flavor::Tbdd)
    }

    pub fn uses_tags(self) -> bool {
        matches!(self, Flavor::Tbdd)
    }

    /// Inverse of the `flavor as u64` cast used to pack a flavor into a `TaskArgs` slot for a
    /// spawned sub-task.
    pub fn from_code(code: u64) -> Flavor {
        match code {
            0 => Flavor::Bdd,
            1 => Flavor::Mtbdd,
            2 => Flavor::Zdd,
            3 => Flavor::Tbdd,
            _ => unreachable!("flavor code packed by this module only"),
        }
    }
}
