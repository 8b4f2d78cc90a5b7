use super::clock::{Stopwatch, format_secs};
use super::{JobState, ProgressSink, WaitError, WaitOutcome, cancelled};
use crate::logging::*;
use std::future::Future;
use std::result::Result;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[cfg(test)]
mod tests;

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(2000);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(300_000);

type Predicate<'a, T> = Box<dyn Fn(&T) -> bool + Send + Sync + 'a>;
type ErrorExtractor<'a, T> = Box<dyn Fn(&T) -> Option<String> + Send + Sync + 'a>;
type UpdateCallback<'a, T> = Box<dyn FnMut(&T, Duration) + Send + 'a>;

pub struct PollOptions<'a, T> {
    is_complete: Predicate<'a, T>,
    is_failed: Predicate<'a, T>,
    get_error: ErrorExtractor<'a, T>,
    on_update: Option<UpdateCallback<'a, T>>,
    interval: Duration,
    timeout: Duration,
    progress: Option<&'a dyn ProgressSink>,
    cancel: Option<CancellationToken>,
}

impl<'a, T> PollOptions<'a, T> {
    pub fn new(is_complete: impl Fn(&T) -> bool + Send + Sync + 'a) -> Self {
        Self {
            is_complete: Box::new(is_complete),
            is_failed: Box::new(|_| false),
            get_error: Box::new(|_| None),
            on_update: None,
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            progress: None,
            cancel: None,
        }
    }

    pub fn is_failed(mut self, is_failed: impl Fn(&T) -> bool + Send + Sync + 'a) -> Self {
        self.is_failed = Box::new(is_failed);
        self
    }

    pub fn get_error(
        mut self,
        get_error: impl Fn(&T) -> Option<String> + Send + Sync + 'a,
    ) -> Self {
        self.get_error = Box::new(get_error);
        self
    }

    /// Called after every fetch, including the first and the terminal one.
    pub fn on_update(mut self, on_update: impl FnMut(&T, Duration) + Send + 'a) -> Self {
        self.on_update = Some(Box::new(on_update));
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn progress(mut self, sink: &'a dyn ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

impl<'a, T: JobState + 'a> PollOptions<'a, T> {
    pub fn for_state() -> Self {
        Self::new(T::is_complete)
            .is_failed(T::is_failed)
            .get_error(T::failure_reason)
    }
}

/// Fetches the state until it is complete, failed, or the timeout passes.
///
/// The first fetch happens immediately. The timeout is checked before each
/// fetch, so a fetch that is already in flight at the deadline is allowed
/// to finish and its state is still evaluated. Errors from `fetch` are
/// returned unchanged and never retried.
pub async fn poll<T, F, Fut>(
    mut fetch: F,
    mut options: PollOptions<'_, T>,
) -> Result<WaitOutcome<T>, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let log = DEFAULT.new(o!(
        "function" => "completion::poll",
        "interval" => format!("{:?}", options.interval),
        "timeout" => format!("{:?}", options.timeout),
    ));
    let stopwatch = Stopwatch::start();
    let mut attempt = 0u32;

    loop {
        if stopwatch.has_exceeded(options.timeout) {
            debug!(log, "timed out"; "attempts" => attempt);
            return Err(WaitError::Timeout);
        }

        attempt += 1;
        let state = tokio::select! {
            biased;
            _ = cancelled(options.cancel.as_ref()) => {
                debug!(log, "cancelled"; "attempt" => attempt);
                return Err(WaitError::Cancelled);
            }
            // lazy, so a cancelled wait never invokes `fetch`
            state = async { fetch().await } => state?,
        };
        let elapsed = stopwatch.elapsed();
        trace!(log, "fetched"; "attempt" => attempt, "elapsed" => ?elapsed);

        if let Some(on_update) = options.on_update.as_mut() {
            on_update(&state, elapsed);
        }

        if (options.is_complete)(&state) {
            debug!(log, "completed"; "attempts" => attempt);
            return Ok(WaitOutcome {
                result: state,
                elapsed,
            });
        }

        if (options.is_failed)(&state) {
            debug!(log, "failed"; "attempts" => attempt);
            return Err(WaitError::failed((options.get_error)(&state)));
        }

        if let Some(sink) = options.progress {
            sink.set_text(format!("Generating... ({})", format_secs(elapsed)));
        }

        tokio::select! {
            biased;
            _ = cancelled(options.cancel.as_ref()) => {
                debug!(log, "cancelled"; "attempt" => attempt);
                return Err(WaitError::Cancelled);
            }
            _ = tokio::time::sleep(options.interval) => {}
        }
    }
}
