//! Lightweight timing for instrumentation.
//!
//! Uses `web_time` so the same code measures with `Performance.now()` in the
//! browser and `std::time::Instant` natively.

use web_time::Instant;

/// Measures consecutive phases of one operation.
///
/// ```
/// let mut watch = easel_common::perf::Stopwatch::start();
/// // export...
/// let export_ms = watch.lap_ms();
/// // write...
/// let write_ms = watch.lap_ms();
/// assert!(export_ms >= 0.0 && write_ms >= 0.0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
    lap: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            lap: now,
        }
    }

    /// Milliseconds since the previous lap (or start), then begin a new lap.
    pub fn lap_ms(&mut self) -> f64 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.lap);
        self.lap = now;
        elapsed.as_secs_f64() * 1000.0
    }

    /// Milliseconds since start.
    pub fn total_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }
}
