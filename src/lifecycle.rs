//! Lifecycle / memory monitor (component J): samples a memory reading on
//! an interval into a bounded sequence and drives a two-tier cleanup
//! pipeline — preventive on a warning threshold, full on critical —
//! shared with document-visibility and unload events (§4.J).

use crate::cache::{BoundedSeq, ResourceTracker};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{info, warn};

const DEFAULT_SAMPLE_CAPACITY: usize = 64;
const DEFAULT_WARNING_RATIO: f64 = 0.70;
const DEFAULT_CRITICAL_RATIO: f64 = 0.90;

/// A single memory sample: used bytes over a platform-reported limit.
/// Rust has no `performance.memory` equivalent, so callers supply a
/// reading from whatever the host process exposes (an allocator's
/// `stats()`, `/proc/self/status`, or a fixed test value); this module
/// only owns the sampling cadence, the bounded history, and the
/// threshold-triggered cleanup pipeline.
#[derive(Debug, Clone, Copy)]
pub struct MemorySample {
    pub used_bytes: u64,
    pub limit_bytes: u64,
}

impl MemorySample {
    fn ratio(&self) -> f64 {
        if self.limit_bytes == 0 {
            0.0
        } else {
            self.used_bytes as f64 / self.limit_bytes as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressureLevel {
    Normal,
    Warning,
    Critical,
}

#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub sample_capacity: usize,
    pub warning_ratio: f64,
    pub critical_ratio: f64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            sample_capacity: DEFAULT_SAMPLE_CAPACITY,
            warning_ratio: DEFAULT_WARNING_RATIO,
            critical_ratio: DEFAULT_CRITICAL_RATIO,
        }
    }
}

/// A handler invoked at a pressure tier. Preventive handlers run at
/// warning and critical; emergency handlers run only at critical (§4.J).
pub type CleanupHandler = Box<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupOutcome {
    pub level: Option<Level>,
    pub preventive_ran: u32,
    pub emergency_ran: u32,
    pub observers_disconnected: usize,
    pub timers_cleared: usize,
    pub workers_terminated: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Preventive,
    Emergency,
}

/// The visibility/unload-driven cleanup strength, distinct from
/// memory-pressure tiers but routed through the same pipeline (§4.J
/// "Document-visibility changes... drive the same cleanup pipeline").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupTrigger {
    Blur,
    Hidden,
    Unload,
    MemoryWarning,
    MemoryCritical,
}

pub struct LifecycleMonitor {
    config: LifecycleConfig,
    samples: Mutex<BoundedSeq<MemorySample>>,
    preventive_handlers: Vec<CleanupHandler>,
    emergency_handlers: Vec<CleanupHandler>,
    sample_count: AtomicU64,
}

impl LifecycleMonitor {
    pub fn new(config: LifecycleConfig) -> Self {
        let capacity = config.sample_capacity;
        Self {
            config,
            samples: Mutex::new(BoundedSeq::new(capacity)),
            preventive_handlers: Vec::new(),
            emergency_handlers: Vec::new(),
            sample_count: AtomicU64::new(0),
        }
    }

    pub fn register_preventive(&mut self, handler: CleanupHandler) {
        self.preventive_handlers.push(handler);
    }

    pub fn register_emergency(&mut self, handler: CleanupHandler) {
        self.emergency_handlers.push(handler);
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count.load(Ordering::SeqCst)
    }

    /// Record one reading (the ~30s-interval sampler calls this) and
    /// classify pressure. Does not itself run cleanup — callers decide
    /// whether to act on the returned level, e.g. invoking `cleanup()`.
    pub fn record(&self, sample: MemorySample) -> PressureLevel {
        self.samples.lock().unwrap().push(sample);
        self.sample_count.fetch_add(1, Ordering::SeqCst);

        let ratio = sample.ratio();
        if ratio >= self.config.critical_ratio {
            PressureLevel::Critical
        } else if ratio >= self.config.warning_ratio {
            PressureLevel::Warning
        } else {
            PressureLevel::Normal
        }
    }

    /// Runs the cleanup pipeline appropriate to `trigger`: light on blur
    /// (no handlers, tracker untouched), preventive on hidden/warning
    /// (preventive handlers plus trimming bounded sequences to 50%
    /// capacity), full on unload/critical (both handler tiers plus
    /// disconnecting the resource tracker).
    pub fn cleanup(&self, trigger: CleanupTrigger, tracker: &mut ResourceTracker) -> CleanupOutcome {
        match trigger {
            CleanupTrigger::Blur => CleanupOutcome::default(),
            CleanupTrigger::Hidden | CleanupTrigger::MemoryWarning => {
                let ran = self.run_preventive();
                self.samples.lock().unwrap().trim_to_half();
                info!(ran, "preventive cleanup ran");
                CleanupOutcome {
                    level: Some(Level::Preventive),
                    preventive_ran: ran,
                    ..Default::default()
                }
            }
            CleanupTrigger::Unload | CleanupTrigger::MemoryCritical => {
                let preventive_ran = self.run_preventive();
                let emergency_ran = self.run_emergency();
                let report = tracker.cleanup();
                warn!(preventive_ran, emergency_ran, "emergency cleanup ran");
                CleanupOutcome {
                    level: Some(Level::Emergency),
                    preventive_ran,
                    emergency_ran,
                    observers_disconnected: report.observers,
                    timers_cleared: report.timers,
                    workers_terminated: report.workers,
                }
            }
        }
    }

    fn run_preventive(&self) -> u32 {
        for handler in &self.preventive_handlers {
            handler();
        }
        self.preventive_handlers.len() as u32
    }

    fn run_emergency(&self) -> u32 {
        for handler in &self.emergency_handlers {
            handler();
        }
        self.emergency_handlers.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn sample(used: u64, limit: u64) -> MemorySample {
        MemorySample {
            used_bytes: used,
            limit_bytes: limit,
        }
    }

    #[test]
    fn below_warning_ratio_is_normal_pressure() {
        let monitor = LifecycleMonitor::new(LifecycleConfig::default());
        assert_eq!(monitor.record(sample(10, 100)), PressureLevel::Normal);
    }

    #[test]
    fn warning_and_critical_ratios_classify_correctly() {
        let monitor = LifecycleMonitor::new(LifecycleConfig::default());
        assert_eq!(monitor.record(sample(75, 100)), PressureLevel::Warning);
        assert_eq!(monitor.record(sample(95, 100)), PressureLevel::Critical);
    }

    #[test]
    fn critical_cleanup_runs_both_handler_tiers_and_disconnects_tracker() {
        let mut monitor = LifecycleMonitor::new(LifecycleConfig::default());
        let preventive_calls = Arc::new(AtomicUsize::new(0));
        let emergency_calls = Arc::new(AtomicUsize::new(0));
        {
            let c = preventive_calls.clone();
            monitor.register_preventive(Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }));
        }
        {
            let c = emergency_calls.clone();
            monitor.register_emergency(Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let mut tracker = ResourceTracker::new();
        tracker.register_observer("mo-1");
        tracker.register_timer("t-1");

        let outcome = monitor.cleanup(CleanupTrigger::MemoryCritical, &mut tracker);
        assert_eq!(preventive_calls.load(Ordering::SeqCst), 1);
        assert_eq!(emergency_calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.observers_disconnected, 1);
        assert_eq!(outcome.timers_cleared, 1);
        assert!(tracker.is_quiescent());
    }

    #[test]
    fn warning_cleanup_trims_samples_to_half_capacity_without_touching_tracker() {
        let monitor = LifecycleMonitor::new(LifecycleConfig {
            sample_capacity: 10,
            ..Default::default()
        });
        for _ in 0..10 {
            monitor.record(sample(1, 100));
        }
        let mut tracker = ResourceTracker::new();
        tracker.register_observer("mo-1");

        monitor.cleanup(CleanupTrigger::Hidden, &mut tracker);
        assert_eq!(monitor.samples.lock().unwrap().len(), 5);
        assert!(!tracker.is_quiescent());
    }

    #[test]
    fn blur_is_a_no_op() {
        let monitor = LifecycleMonitor::new(LifecycleConfig::default());
        let mut tracker = ResourceTracker::new();
        tracker.register_timer("t-1");
        let outcome = monitor.cleanup(CleanupTrigger::Blur, &mut tracker);
        assert_eq!(outcome, CleanupOutcome::default());
        assert!(!tracker.is_quiescent());
    }
}
