use std::time::Instant;

use log::info;


/// Logs a line each time another tenth of `total` items has been processed.
pub struct Progress {
    label: &'static str,
    total: usize,
    step: usize,
    next: usize,
    started: Instant,
    with_elapsed: bool,
}

impl Progress {
    pub fn new(label: &'static str, total: usize, with_elapsed: bool) -> Self {
        Progress {
            label,
            total,
            step: (total / 10).max(1),
            next: 0,
            started: Instant::now(),
            with_elapsed,
        }
    }

    /// Marks item `index` as reached; returns the logged percentage, if any.
    pub fn advance_to(&mut self, index: usize) -> Option<usize> {
        if index < self.next || index >= self.total {
            return None;
        }

        let milestone = index - index % self.step;
        self.next = milestone + self.step;
        let percent = milestone * 100 / self.total;

        if self.with_elapsed {
            info!(
                "{}: {}% ({} ms)",
                self.label,
                percent,
                self.started.elapsed().as_millis()
            );
        } else {
            info!("{}: {}%", self.label, percent);
        }

        Some(percent)
    }
}
