//! Optional per-phase timing. Diagnostic only; nothing reads it back.

use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseTiming {
    pub calls: u64,
    pub total_ms: f64,
    pub max_ms: f64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PerfTrace {
    pub phases: FnvHashMap<String, PhaseTiming>,
}

impl PerfTrace {
    pub fn record(&mut self, name: &str, elapsed_ms: f64) {
        let entry = self.phases.entry(name.to_string()).or_default();
        entry.calls += 1;
        entry.total_ms += elapsed_ms;
        if elapsed_ms > entry.max_ms {
            entry.max_ms = elapsed_ms;
        }
    }

    pub fn get(&self, name: &str) -> Option<&PhaseTiming> {
        self.phases.get(name)
    }
}

/// Records into a `PerfTrace` only when enabled.
#[derive(Debug, Default)]
pub struct Tracer {
    trace: Option<PerfTrace>,
}

impl Tracer {
    pub fn new(enabled: bool) -> Tracer {
        Tracer {
            trace: if enabled {
                Some(PerfTrace::default())
            } else {
                None
            },
        }
    }

    /// Start a span; `None` when tracing is off.
    #[inline]
    pub fn start(&self) -> Option<Instant> {
        self.trace.as_ref().map(|_| Instant::now())
    }

    pub fn finish(&mut self, name: &str, started: Option<Instant>) {
        if let (Some(trace), Some(started)) = (self.trace.as_mut(), started) {
            trace.record(name, started.elapsed().as_secs_f64() * 1000.0);
        }
    }

    pub fn take(&mut self) -> Option<PerfTrace> {
        self.trace.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_tracks_calls_and_max() {
        let mut trace = PerfTrace::default();
        trace.record("polish", 2.0);
        trace.record("polish", 5.0);
        let timing = trace.get("polish").unwrap();
        assert_eq!(timing.calls, 2);
        assert_eq!(timing.total_ms, 7.0);
        assert_eq!(timing.max_ms, 5.0);
    }

    #[test]
    fn disabled_tracer_records_nothing() {
        let mut tracer = Tracer::new(false);
        let started = tracer.start();
        tracer.finish("anneal", started);
        assert!(tracer.take().is_none());
    }
}
