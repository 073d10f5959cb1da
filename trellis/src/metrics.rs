use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;

use crate::{ComponentInfo, DescriptorId};

/// Construction counters of one component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentStats {
    pub component: ComponentInfo,
    /// Number of successful constructions.
    pub constructions: usize,
    /// Time spent in the constructor across all constructions.
    pub total_time: Duration,
}

impl ComponentStats {
    pub fn average_time(&self) -> Duration {
        match u32::try_from(self.constructions) {
            Ok(0) => Duration::ZERO,
            Ok(n) => self.total_time / n,
            Err(_) => self.total_time.div_f64(self.constructions as f64),
        }
    }
}

/// Snapshot of the whole context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContextStats {
    pub registered_components: usize,
    pub active_singletons: usize,
    pub constructions: usize,
    pub resolution_errors: usize,
}

#[derive(Default)]
pub(crate) struct Metrics {
    components: DashMap<DescriptorId, ComponentStats>,
    constructions: AtomicUsize,
    errors: AtomicUsize,
}

impl Metrics {
    pub(crate) fn record_construction(&self, component: ComponentInfo, elapsed: Duration) {
        self.constructions.fetch_add(1, Ordering::Relaxed);
        let mut stats = self
            .components
            .entry(component.id())
            .or_insert(ComponentStats {
                component,
                constructions: 0,
                total_time: Duration::ZERO,
            });
        stats.constructions += 1;
        stats.total_time += elapsed;
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn component(&self, id: DescriptorId) -> Option<ComponentStats> {
        self.components.get(&id).map(|stats| *stats)
    }

    /// Returns per-component counters ordered by total construction time, slowest first.
    pub(crate) fn components(&self) -> Vec<ComponentStats> {
        let mut stats: Vec<_> = self.components.iter().map(|s| *s).collect();
        stats.sort_by(|a, b| {
            b.total_time
                .cmp(&a.total_time)
                .then_with(|| a.component.id().cmp(&b.component.id()))
        });
        stats
    }

    pub(crate) fn constructions(&self) -> usize {
        self.constructions.load(Ordering::Relaxed)
    }

    pub(crate) fn errors(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    pub(crate) fn clear(&self) {
        self.components.clear();
        self.constructions.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_times_accumulate() {
        let metrics = Metrics::default();
        let component = ComponentInfo::new(DescriptorId::next(), "Slow");
        metrics.record_construction(component, Duration::from_millis(10));
        metrics.record_construction(component, Duration::from_millis(30));
        let stats = metrics.component(component.id()).unwrap();
        assert_eq!(stats.constructions, 2);
        assert_eq!(stats.total_time, Duration::from_millis(40));
        assert_eq!(stats.average_time(), Duration::from_millis(20));
        assert_eq!(metrics.constructions(), 2);
    }

    #[test]
    fn components_are_sorted_slowest_first() {
        let metrics = Metrics::default();
        let fast = ComponentInfo::new(DescriptorId::next(), "Fast");
        let slow = ComponentInfo::new(DescriptorId::next(), "Slow");
        metrics.record_construction(fast, Duration::from_millis(1));
        metrics.record_construction(slow, Duration::from_millis(5));
        let names: Vec<_> = metrics
            .components()
            .iter()
            .map(|s| s.component.name())
            .collect();
        assert_eq!(names, ["Slow", "Fast"]);
    }
}
