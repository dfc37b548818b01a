//! Optional per-pass benchmarking mode (`spec.md` §4.3), grounded in the
//! source's `Performance`/`CalculatedItemPerformance`/`CalculatedPerformance`
//! classes: per-Node wall-time samples reduced to mean/median/min/max, plus
//! a pipeline total and the "overhead" (pipeline time minus the sum of
//! per-node means).

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::node::NodeId;

/// How many of the most recent samples are kept per node.
const WINDOW: usize = 256;

#[derive(Debug, Default)]
struct Samples(Vec<Duration>);

impl Samples {
    fn push(&mut self, d: Duration) {
        if self.0.len() == WINDOW {
            self.0.remove(0);
        }
        self.0.push(d);
    }

    fn calculate(&self) -> Option<CalculatedItemPerformance> {
        if self.0.is_empty() {
            return None;
        }
        let mut sorted: Vec<f64> = self.0.iter().map(Duration::as_secs_f64).collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let sum: f64 = sorted.iter().sum();
        let mean = sum / sorted.len() as f64;
        let median = sorted[sorted.len() / 2];
        let min = sorted[0];
        let max = sorted[sorted.len() - 1];
        Some(CalculatedItemPerformance {
            mean,
            median,
            min,
            max,
        })
    }
}

/// Per-pass live accumulator, active only while benchmark mode is entered.
#[derive(Debug, Default)]
pub struct BenchmarkState {
    per_node: BTreeMap<NodeId, Samples>,
    total: Samples,
}

impl BenchmarkState {
    pub fn record_node(&mut self, node: &NodeId, elapsed: Duration) {
        self.per_node.entry(node.clone()).or_default().push(elapsed);
    }

    pub fn record_total(&mut self, elapsed: Duration) {
        self.total.push(elapsed);
    }

    #[must_use]
    pub fn calculate(&self) -> CalculatedPerformance {
        let items: BTreeMap<NodeId, CalculatedItemPerformance> = self
            .per_node
            .iter()
            .filter_map(|(id, s)| s.calculate().map(|c| (id.clone(), c)))
            .collect();
        let total = self.total.calculate();
        let overhead = total.as_ref().map(|t| {
            let sum_of_means: f64 = items.values().map(|i| i.mean).sum();
            (t.mean - sum_of_means).max(0.0)
        });
        CalculatedPerformance {
            items,
            total,
            overhead,
        }
    }
}

/// Mean/median/min/max over the samples window for one node or the whole
/// pipeline, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalculatedItemPerformance {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

impl fmt::Display for CalculatedItemPerformance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mean={:.4}s median={:.4}s min={:.4}s max={:.4}s",
            self.mean, self.median, self.min, self.max
        )
    }
}

/// The aggregated benchmark snapshot returned to a caller holding the FIFO
/// lock (entering/leaving benchmark mode and reading stats are themselves
/// lock-guarded operations, per `spec.md` §4.3).
#[derive(Debug, Clone, Default)]
pub struct CalculatedPerformance {
    pub items: BTreeMap<NodeId, CalculatedItemPerformance>,
    pub total: Option<CalculatedItemPerformance>,
    pub overhead: Option<f64>,
}

impl fmt::Display for CalculatedPerformance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline performance:")?;
        for (id, perf) in &self.items {
            writeln!(f, "  {id}: {perf}")?;
        }
        if let Some(total) = &self.total {
            writeln!(f, "  total: {total}")?;
        }
        if let Some(overhead) = self.overhead {
            writeln!(f, "  overhead: {overhead:.4}s")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_mean_median_min_max() {
        let mut state = BenchmarkState::default();
        for ms in [10, 20, 30, 40, 50] {
            state.record_node(&"n1".to_string(), Duration::from_millis(ms));
        }
        let calc = state.calculate();
        let item = calc.items.get("n1").unwrap();
        assert!((item.mean - 0.030).abs() < 1e-6);
        assert!((item.median - 0.030).abs() < 1e-6);
        assert!((item.min - 0.010).abs() < 1e-6);
        assert!((item.max - 0.050).abs() < 1e-6);
    }

    #[test]
    fn overhead_is_total_minus_sum_of_node_means() {
        let mut state = BenchmarkState::default();
        state.record_node(&"n1".to_string(), Duration::from_millis(10));
        state.record_total(Duration::from_millis(15));
        let calc = state.calculate();
        assert!((calc.overhead.unwrap() - 0.005).abs() < 1e-6);
    }
}
