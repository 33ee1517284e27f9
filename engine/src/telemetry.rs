// Telemetry sinks for the matcher and ingress threads
//
// All counters are relaxed atomics: the matcher updates them from its own
// thread and observer threads read monotonically-consistent snapshots.
// Latencies land in a fixed-bin histogram rather than a raw sample vector
// so percentile extraction is safe while the engine is running.

use common::time::{nanos_since, now_nanos, Nanos};
use std::sync::atomic::{AtomicU64, Ordering};

/// Histogram bin width in nanoseconds.
pub const BIN_WIDTH_NS: u64 = 100;
/// Latencies above this are clamped into the last bin.
pub const MAX_TRACK_NS: u64 = 10_000_000;
const NUM_BINS: usize = (MAX_TRACK_NS / BIN_WIDTH_NS + 1) as usize;

/// Fixed-bin latency histogram with relaxed atomic bins.
pub struct LatencyHistogram {
    bins: Box<[AtomicU64]>,
    count: AtomicU64,
}

impl LatencyHistogram {
    pub fn new() -> Self {
        Self {
            bins: (0..NUM_BINS).map(|_| AtomicU64::new(0)).collect(),
            count: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record(&self, ns: u64) {
        let idx = ((ns / BIN_WIDTH_NS) as usize).min(NUM_BINS - 1);
        self.bins[idx].fetch_add(1, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Returns the lower bound of the bin containing the p-quantile,
    /// in nanoseconds. Returns 0 when empty.
    pub fn percentile(&self, p: f64) -> u64 {
        let count = self.count();
        if count == 0 {
            return 0;
        }
        let target = ((p * count as f64) as u64).min(count - 1);
        let mut cumulative = 0u64;
        for (idx, bin) in self.bins.iter().enumerate() {
            cumulative += bin.load(Ordering::Relaxed);
            if cumulative > target {
                return idx as u64 * BIN_WIDTH_NS;
            }
        }
        MAX_TRACK_NS
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Matcher-side telemetry: order/match/cancel counters, allocator reuse
/// accounting, and the per-order latency distribution.
pub struct Telemetry {
    total_orders: AtomicU64,
    matched_orders: AtomicU64,
    cancelled_orders: AtomicU64,
    stale_cancels: AtomicU64,
    errors: AtomicU64,
    total_allocs: AtomicU64,
    reused_allocs: AtomicU64,
    total_latency_ns: AtomicU64,
    max_latency_ns: AtomicU64,
    hist: LatencyHistogram,
}

impl Telemetry {
    pub fn new() -> Self {
        Self {
            total_orders: AtomicU64::new(0),
            matched_orders: AtomicU64::new(0),
            cancelled_orders: AtomicU64::new(0),
            stale_cancels: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            total_allocs: AtomicU64::new(0),
            reused_allocs: AtomicU64::new(0),
            total_latency_ns: AtomicU64::new(0),
            max_latency_ns: AtomicU64::new(0),
            hist: LatencyHistogram::new(),
        }
    }

    #[inline]
    pub fn record_order(&self) {
        self.total_orders.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_match(&self) {
        self.matched_orders.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cancel(&self) {
        self.cancelled_orders.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_stale_cancel(&self) {
        self.stale_cancels.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_alloc(&self, reused: bool) {
        self.total_allocs.fetch_add(1, Ordering::Relaxed);
        if reused {
            self.reused_allocs.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_latency(&self, ns: u64) {
        self.hist.record(ns);
        self.total_latency_ns.fetch_add(ns, Ordering::Relaxed);
        let mut prev = self.max_latency_ns.load(Ordering::Relaxed);
        while prev < ns {
            match self.max_latency_ns.compare_exchange_weak(
                prev,
                ns,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(current) => prev = current,
            }
        }
    }

    #[inline]
    pub fn orders(&self) -> u64 {
        self.total_orders.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn matched(&self) -> u64 {
        self.matched_orders.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn cancelled(&self) -> u64 {
        self.cancelled_orders.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn stale_cancels(&self) -> u64 {
        self.stale_cancels.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn allocs(&self) -> u64 {
        self.total_allocs.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn max_latency_ns(&self) -> u64 {
        self.max_latency_ns.load(Ordering::Relaxed)
    }

    pub fn avg_latency_ns(&self) -> f64 {
        let total = self.orders();
        if total == 0 {
            0.0
        } else {
            self.total_latency_ns.load(Ordering::Relaxed) as f64 / total as f64
        }
    }

    /// Fraction of allocations served from the free list, in percent.
    pub fn reuse_ratio(&self) -> f64 {
        let total = self.allocs();
        if total == 0 {
            0.0
        } else {
            100.0 * self.reused_allocs.load(Ordering::Relaxed) as f64 / total as f64
        }
    }

    #[inline]
    pub fn percentile(&self, p: f64) -> u64 {
        self.hist.percentile(p)
    }

    /// Prints the end-of-run report.
    pub fn dump(&self, elapsed_s: f64) {
        let orders = self.orders();
        let throughput = if elapsed_s > 0.0 {
            orders as f64 / elapsed_s
        } else {
            0.0
        };
        println!("[matcher telemetry]");
        println!(
            "orders={} matched={} cancelled={} stale_cancels={} errors={}",
            orders,
            self.matched(),
            self.cancelled(),
            self.stale_cancels(),
            self.errors()
        );
        println!(
            "avg_latency={:.2} ns  max_latency={} ns",
            self.avg_latency_ns(),
            self.max_latency_ns()
        );
        println!("throughput={:.2} ops/s", throughput);
        println!(
            "allocations={} reused={:.2}%",
            self.allocs(),
            self.reuse_ratio()
        );
        if self.hist.count() > 0 {
            println!(
                "p50={} ns  p90={} ns  p99={} ns  p999={} ns",
                self.percentile(0.50),
                self.percentile(0.90),
                self.percentile(0.99),
                self.percentile(0.999)
            );
        }
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

/// Records elapsed nanoseconds into a `Telemetry` when dropped.
pub struct ScopedTimer<'a> {
    telemetry: &'a Telemetry,
    start: Nanos,
}

impl<'a> ScopedTimer<'a> {
    #[inline]
    pub fn new(telemetry: &'a Telemetry) -> Self {
        Self {
            telemetry,
            start: now_nanos(),
        }
    }
}

impl Drop for ScopedTimer<'_> {
    #[inline]
    fn drop(&mut self) {
        self.telemetry.record_latency(nanos_since(self.start));
    }
}

/// Ingress-side telemetry: per-message handling latency plus drop and
/// reject counters for the framing layer.
pub struct IngressTelemetry {
    total_msgs: AtomicU64,
    dropped_full: AtomicU64,
    rejected_frames: AtomicU64,
    total_latency_ns: AtomicU64,
    hist: LatencyHistogram,
}

impl IngressTelemetry {
    pub fn new() -> Self {
        Self {
            total_msgs: AtomicU64::new(0),
            dropped_full: AtomicU64::new(0),
            rejected_frames: AtomicU64::new(0),
            total_latency_ns: AtomicU64::new(0),
            hist: LatencyHistogram::new(),
        }
    }

    /// Records one decoded-and-enqueued message and its handling latency.
    #[inline]
    pub fn record_message(&self, ns: u64) {
        self.hist.record(ns);
        self.total_latency_ns.fetch_add(ns, Ordering::Relaxed);
        self.total_msgs.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a message dropped because the ring was full.
    #[inline]
    pub fn record_drop(&self) {
        self.dropped_full.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a frame rejected at decode.
    #[inline]
    pub fn record_reject(&self) {
        self.rejected_frames.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn messages(&self) -> u64 {
        self.total_msgs.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped_full.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn rejected(&self) -> u64 {
        self.rejected_frames.load(Ordering::Relaxed)
    }

    pub fn avg_latency_ns(&self) -> f64 {
        let total = self.messages();
        if total == 0 {
            0.0
        } else {
            self.total_latency_ns.load(Ordering::Relaxed) as f64 / total as f64
        }
    }

    pub fn dump(&self, elapsed_s: f64) {
        let msgs = self.messages();
        let throughput = if elapsed_s > 0.0 {
            msgs as f64 / elapsed_s
        } else {
            0.0
        };
        println!("[ingress telemetry]");
        println!(
            "messages={} dropped={} rejected={} avg_latency={:.2} ns throughput={:.2} msg/s",
            msgs,
            self.dropped(),
            self.rejected(),
            self.avg_latency_ns(),
            throughput
        );
    }
}

impl Default for IngressTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let t = Telemetry::new();
        t.record_order();
        t.record_order();
        t.record_match();
        t.record_cancel();
        t.record_stale_cancel();
        t.record_error();

        assert_eq!(t.orders(), 2);
        assert_eq!(t.matched(), 1);
        assert_eq!(t.cancelled(), 1);
        assert_eq!(t.stale_cancels(), 1);
        assert_eq!(t.errors(), 1);
    }

    #[test]
    fn test_alloc_reuse_ratio() {
        let t = Telemetry::new();
        assert_eq!(t.reuse_ratio(), 0.0);

        t.record_alloc(false);
        t.record_alloc(true);
        t.record_alloc(true);
        t.record_alloc(true);

        assert_eq!(t.allocs(), 4);
        assert_eq!(t.reuse_ratio(), 75.0);
    }

    #[test]
    fn test_latency_max_and_avg() {
        let t = Telemetry::new();
        t.record_order();
        t.record_order();
        t.record_latency(100);
        t.record_latency(300);

        assert_eq!(t.max_latency_ns(), 300);
        assert_eq!(t.avg_latency_ns(), 200.0);
    }

    #[test]
    fn test_histogram_percentiles() {
        let h = LatencyHistogram::new();
        assert_eq!(h.percentile(0.50), 0);

        // 100 samples at 100ns, one outlier at 5000ns
        for _ in 0..100 {
            h.record(100);
        }
        h.record(5000);

        assert_eq!(h.percentile(0.50), 100);
        assert_eq!(h.percentile(0.99), 100);
        assert_eq!(h.percentile(0.999), 5000);
    }

    #[test]
    fn test_histogram_clamps_outliers() {
        let h = LatencyHistogram::new();
        h.record(u64::MAX);
        assert_eq!(h.count(), 1);
        assert_eq!(h.percentile(0.5), MAX_TRACK_NS);
    }

    #[test]
    fn test_scoped_timer_records() {
        let t = Telemetry::new();
        {
            let _timer = ScopedTimer::new(&t);
            for _ in 0..100 {
                std::hint::black_box(0);
            }
        }
        assert_eq!(t.hist.count(), 1);
    }

    #[test]
    fn test_ingress_telemetry() {
        let t = IngressTelemetry::new();
        t.record_message(100);
        t.record_message(200);
        t.record_drop();
        t.record_reject();

        assert_eq!(t.messages(), 2);
        assert_eq!(t.dropped(), 1);
        assert_eq!(t.rejected(), 1);
        assert_eq!(t.avg_latency_ns(), 150.0);
    }
}
