//! Process-wide circuit breakers, keyed by downstream endpoint name.

use std::sync::Arc;

use dashmap::DashMap;

use crate::resilience::circuit_breaker::{BreakerSettings, BreakerSnapshot, CircuitBreaker};
use crate::resilience::clock::{Clock, SystemClock};

/// Lazily creates one breaker per endpoint and keeps it for the process lifetime.
#[derive(Debug, Clone)]
pub struct BreakerRegistry {
    settings: BreakerSettings,
    clock: Arc<dyn Clock>,
    breakers: Arc<DashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new(settings: BreakerSettings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    pub fn with_clock(settings: BreakerSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            clock,
            breakers: Arc::new(DashMap::new()),
        }
    }

    /// Breaker for `endpoint`, created on first use.
    pub fn get(&self, endpoint: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(endpoint) {
            return existing.value().clone();
        }
        self.breakers
            .entry(endpoint.to_string())
            .or_insert_with(|| {
                tracing::debug!(endpoint = %endpoint, "Creating circuit breaker");
                Arc::new(CircuitBreaker::new(endpoint, self.settings, self.clock.clone()))
            })
            .value()
            .clone()
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Snapshots of every breaker, sorted by endpoint.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<_> = self.breakers.iter().map(|r| r.value().snapshot()).collect();
        snapshots.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        snapshots
    }
}
