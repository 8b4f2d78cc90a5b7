use std::time::Duration;
use tokio::time::Instant;

// Far enough to never fire within a CLI session.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Elapsed time since the start of a wait, on tokio's monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started_at: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            started_at: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn has_exceeded(&self, timeout: Duration) -> bool {
        self.elapsed() > timeout
    }

    pub fn remaining(&self, timeout: Duration) -> Duration {
        timeout.saturating_sub(self.elapsed())
    }

    pub fn deadline(&self, timeout: Duration) -> Instant {
        self.started_at
            .checked_add(timeout)
            .unwrap_or_else(|| self.started_at + FAR_FUTURE)
    }
}

/// `12.3s`
pub fn format_secs(elapsed: Duration) -> String {
    format!("{:.1}s", elapsed.as_secs_f64())
}
