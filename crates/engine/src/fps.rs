//! Instantaneous (not rolling-averaged) frames-per-second counter.
//!
//! Grounded in the source's `opsi.util.fps.FPS`, which deliberately computes
//! `1 / elapsed` on every update rather than a moving average — the source
//! carries a `TODO` noting a rolling average was considered and rejected.

use std::time::Instant;

#[derive(Debug, Default)]
pub struct FpsCounter {
    last: Option<Instant>,
    fps: f64,
}

impl FpsCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last {
            let dt = now.duration_since(last).as_secs_f64();
            if dt > 0.0 {
                self.fps = 1.0 / dt;
            }
        }
        self.last = Some(now);
    }

    #[must_use]
    pub fn fps(&self) -> f64 {
        self.fps
    }
}
