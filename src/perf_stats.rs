//! Per-frame timing, printed the way the teacher's main loop prints its own
//! one-line status updates (`println!` diagnostics, no metrics exporter).

use std::time::{Duration, Instant};

/// Accumulates a rolling average over `window` frames and prints it once the
/// window fills, then resets.
pub struct FrameTimer {
    window: usize,
    started_at: Option<Instant>,
    accumulated: Duration,
    count: usize,
}

impl FrameTimer {
    pub fn new(window: usize) -> Self {
        FrameTimer {
            window: window.max(1),
            started_at: None,
            accumulated: Duration::ZERO,
            count: 0,
        }
    }

    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
    }

    /// Ends timing for the current frame. Returns `Some(avg_millis)` when the
    /// window just filled.
    pub fn stop(&mut self) -> Option<f64> {
        let started_at = self.started_at.take()?;
        self.accumulated += started_at.elapsed();
        self.count += 1;
        if self.count >= self.window {
            let avg_millis = self.accumulated.as_secs_f64() * 1000.0 / self.count as f64;
            self.accumulated = Duration::ZERO;
            self.count = 0;
            Some(avg_millis)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_window_and_resets() {
        let mut timer = FrameTimer::new(2);
        timer.start();
        assert!(timer.stop().is_none());
        timer.start();
        assert!(timer.stop().is_some());
    }
}
