use report::PipelineStage;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Stages a run can fail in, in pipeline order.
const FAILING_STAGES: [PipelineStage; 5] = [
    PipelineStage::Searching,
    PipelineStage::Extracting,
    PipelineStage::Aggregating,
    PipelineStage::Stage1,
    PipelineStage::Stage2,
];

pub struct Metrics {
    // Counters
    total_runs: AtomicUsize,
    successful_runs: AtomicUsize,
    failed_runs: AtomicUsize,
    failures_by_stage: [AtomicUsize; FAILING_STAGES.len()],

    // Timing (in microseconds)
    total_run_time_us: AtomicU64,

    // Output sizes of successful runs
    total_step1_chars: AtomicU64,
    total_step2_chars: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_runs: AtomicUsize::new(0),
            successful_runs: AtomicUsize::new(0),
            failed_runs: AtomicUsize::new(0),
            failures_by_stage: Default::default(),
            total_run_time_us: AtomicU64::new(0),
            total_step1_chars: AtomicU64::new(0),
            total_step2_chars: AtomicU64::new(0),
        })
    }

    pub fn record_success(&self, duration: Duration, step1_chars: usize, step2_chars: usize) {
        self.record_run(duration);
        self.successful_runs.fetch_add(1, Ordering::Relaxed);
        self.total_step1_chars.fetch_add(step1_chars as u64, Ordering::Relaxed);
        self.total_step2_chars.fetch_add(step2_chars as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self, duration: Duration, stage: PipelineStage) {
        self.record_run(duration);
        self.failed_runs.fetch_add(1, Ordering::Relaxed);
        if let Some(i) = FAILING_STAGES.iter().position(|s| *s == stage) {
            self.failures_by_stage[i].fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_run(&self, duration: Duration) {
        self.total_runs.fetch_add(1, Ordering::Relaxed);
        self.total_run_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let successful = self.successful_runs.load(Ordering::Relaxed);
        MetricsSnapshot {
            total_runs: self.total_runs.load(Ordering::Relaxed),
            successful_runs: successful,
            failed_runs: self.failed_runs.load(Ordering::Relaxed),
            failures_by_stage: FAILING_STAGES
                .iter()
                .zip(&self.failures_by_stage)
                .map(|(stage, count)| StageFailures {
                    stage: *stage,
                    count: count.load(Ordering::Relaxed),
                })
                .collect(),
            avg_run_time_ms: average(&self.total_run_time_us, self.total_runs.load(Ordering::Relaxed))
                / 1000.0,
            avg_step1_chars: average(&self.total_step1_chars, successful),
            avg_step2_chars: average(&self.total_step2_chars, successful),
        }
    }
}

fn average(total: &AtomicU64, count: usize) -> f64 {
    if count > 0 {
        total.load(Ordering::Relaxed) as f64 / count as f64
    } else {
        0.0
    }
}

#[derive(Debug, Serialize)]
pub struct StageFailures {
    pub stage: PipelineStage,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_runs: usize,
    pub successful_runs: usize,
    pub failed_runs: usize,
    pub failures_by_stage: Vec<StageFailures>,
    pub avg_run_time_ms: f64,
    pub avg_step1_chars: f64,
    pub avg_step2_chars: f64,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
