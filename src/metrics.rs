use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A percentile tracker over a sliding window of measurements
#[derive(Debug, Clone)]
pub struct PercentileTracker {
    measurements: Arc<Mutex<VecDeque<u64>>>,
    window_size: usize,
}

impl PercentileTracker {
    /// Create a new percentile tracker with the given window size
    pub fn new(window_size: usize) -> Self {
        Self {
            measurements: Arc::new(Mutex::new(VecDeque::with_capacity(window_size))),
            window_size,
        }
    }

    /// Record a measurement (in nanoseconds)
    pub fn record(&self, nanos: u64) {
        let mut measurements = self.measurements.lock();
        if measurements.len() >= self.window_size {
            measurements.pop_front();
        }
        measurements.push_back(nanos);
    }

    /// Get the p50 (median) latency in microseconds
    pub fn p50_us(&self) -> f64 {
        self.percentile(0.50)
    }

    /// Get the p99 latency in microseconds
    pub fn p99_us(&self) -> f64 {
        self.percentile(0.99)
    }

    fn percentile(&self, p: f64) -> f64 {
        let measurements = self.measurements.lock();
        if measurements.is_empty() {
            return 0.0;
        }

        let mut sorted: Vec<_> = measurements.iter().copied().collect();
        sorted.sort_unstable();

        let idx = ((sorted.len() as f64 * p).ceil() as usize).saturating_sub(1);
        sorted[idx] as f64 / 1000.0
    }

    /// Get the number of measurements in the window
    pub fn count(&self) -> usize {
        self.measurements.lock().len()
    }
}

/// Per-stage counters, shared between the stage thread and the driver
#[derive(Debug, Clone)]
pub struct StageMetrics {
    name: Arc<str>,
    /// Value packets taken from the input (or produced, for a source)
    processed: Arc<AtomicU64>,
    /// Packets written to the output connection, control markers included
    emitted: Arc<AtomicU64>,
    /// Sends that had to wait on a full connection
    blocks: Arc<AtomicU64>,
    latency_tracker: PercentileTracker,
    start_time: Instant,
}

impl StageMetrics {
    /// Create zeroed metrics for the named stage
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            processed: Arc::new(AtomicU64::new(0)),
            emitted: Arc::new(AtomicU64::new(0)),
            blocks: Arc::new(AtomicU64::new(0)),
            latency_tracker: PercentileTracker::new(1000),
            start_time: Instant::now(),
        }
    }

    /// Name of the stage these metrics belong to
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record one input value handled
    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the output side of a finished stage
    pub fn record_output(&self, emitted: u64, blocks: u64) {
        self.emitted.fetch_add(emitted, Ordering::Relaxed);
        self.blocks.fetch_add(blocks, Ordering::Relaxed);
    }

    /// Record a latency measurement in nanoseconds
    pub fn record_latency(&self, nanos: u64) {
        self.latency_tracker.record(nanos);
    }

    /// Get total values processed
    pub fn total_processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Get total packets emitted, control markers included
    pub fn total_emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Get total sends that waited on a full connection
    pub fn total_blocks(&self) -> u64 {
        self.blocks.load(Ordering::Relaxed)
    }

    /// Values processed per second since the metrics were created
    pub fn throughput_mps(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            0.0
        } else {
            self.total_processed() as f64 / elapsed
        }
    }

    /// Take a point-in-time copy of the counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            stage: self.name.to_string(),
            total_processed: self.total_processed(),
            total_emitted: self.total_emitted(),
            total_blocks: self.total_blocks(),
            throughput_mps: self.throughput_mps(),
            latency_p50_us: self.latency_tracker.p50_us(),
            latency_p99_us: self.latency_tracker.p99_us(),
            elapsed: self.start_time.elapsed(),
        }
    }
}

/// A snapshot of one stage's metrics
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub stage: String,
    pub total_processed: u64,
    pub total_emitted: u64,
    pub total_blocks: u64,
    pub throughput_mps: f64,
    pub latency_p50_us: f64,
    pub latency_p99_us: f64,
    pub elapsed: Duration,
}

impl MetricsSnapshot {
    /// Format metrics as a human-readable string
    pub fn format(&self) -> String {
        format!(
            "{}: Processed: {}, Emitted: {}, Blocks: {}, Throughput: {:.2} pkt/s, \
             Latency P50: {:.2}µs, P99: {:.2}µs, Elapsed: {:.2}s",
            self.stage,
            self.total_processed,
            self.total_emitted,
            self.total_blocks,
            self.throughput_mps,
            self.latency_p50_us,
            self.latency_p99_us,
            self.elapsed.as_secs_f64()
        )
    }
}
