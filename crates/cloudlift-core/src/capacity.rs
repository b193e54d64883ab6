//! Capacity checks: decide whether a size-limited destination must be skipped.

use std::collections::HashMap;

use crate::destinations::{DestinationSet, Provider};

/// Per-destination size ceilings. Destinations without a limit never exceed.
#[derive(Debug, Clone, Default)]
pub struct CapacityChecker {
    limits: HashMap<Provider, u64>,
}

impl CapacityChecker {
    pub fn new(limits: impl IntoIterator<Item = (Provider, u64)>) -> Self {
        Self {
            limits: limits.into_iter().collect(),
        }
    }

    /// Collect the limits carried by the enabled destinations.
    pub fn from_destinations(set: &DestinationSet) -> Self {
        Self::new(
            set.enabled()
                .iter()
                .filter_map(|d| d.size_limit.map(|limit| (d.provider, limit))),
        )
    }

    pub fn limit(&self, provider: Provider) -> Option<u64> {
        self.limits.get(&provider).copied()
    }

    /// True if `size_bytes` is over the destination's limit.
    pub fn exceeds(&self, provider: Provider, size_bytes: u64) -> bool {
        self.excess(provider, size_bytes).is_some()
    }

    /// Bytes over the limit, or None when the size fits (or there is no limit).
    pub fn excess(&self, provider: Provider, size_bytes: u64) -> Option<u64> {
        let limit = self.limit(provider)?;
        (size_bytes > limit).then(|| size_bytes - limit)
    }

    /// Human-readable skip reason for the job record.
    pub fn skip_reason(&self, provider: Provider, size_bytes: u64) -> Option<String> {
        let over = self.excess(provider, size_bytes)?;
        let limit = self.limit(provider)?;
        Some(format!(
            "skipped: {:.2} GiB would exceed the {:.2} GiB limit by {:.2} GiB",
            gib(size_bytes),
            gib(limit),
            gib(over)
        ))
    }
}

fn gib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0 * 1024.0)
}
