// Path: crates/bridge-telemetry/src/time.rs
use std::time::Instant;

/// RAII timer that reports elapsed wall-clock seconds to a closure on drop.
///
/// Used at the top of a scheduler tick, a chain push, or a tracker poll to record
/// its duration regardless of which return path is taken.
pub struct ScopeTimer<F: FnMut(f64)> {
    start: Instant,
    on_drop: Option<F>,
}

impl<F: FnMut(f64)> ScopeTimer<F> {
    pub fn new(on_drop: F) -> Self {
        Self {
            start: Instant::now(),
            on_drop: Some(on_drop),
        }
    }
}

impl<F: FnMut(f64)> Drop for ScopeTimer<F> {
    fn drop(&mut self) {
        if let Some(mut f) = self.on_drop.take() {
            f(self.start.elapsed().as_secs_f64());
        }
    }
}