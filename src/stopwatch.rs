//! Named timing splits for a pipeline run.

use std::time::{Duration, Instant};

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepTiming {
    pub name: String,
    pub elapsed_ms: u64,
}

/// Records how long each named split took since the previous one.
#[derive(Debug)]
pub struct Stopwatch {
    start: Instant,
    last: Instant,
    splits: Vec<StepTiming>,
}

impl Stopwatch {
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            splits: Vec::new(),
        }
    }

    /// Close the current split under `name` and start the next one.
    pub fn split(&mut self, name: impl Into<String>) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last);
        self.last = now;
        self.splits.push(StepTiming {
            name: name.into(),
            elapsed_ms: millis(elapsed),
        });
        elapsed
    }

    /// All splits plus the total since [`Stopwatch::start`], in milliseconds.
    pub fn finish(self) -> (Vec<StepTiming>, u64) {
        let total = millis(self.start.elapsed());
        (self.splits, total)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
