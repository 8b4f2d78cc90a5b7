//! Waiting for server-side jobs to reach a terminal state.
//!
//! Two strategies share one contract. [`poller::poll`] asks for the job
//! state on a fixed cadence, [`listener::Listener`] subscribes to push
//! notifications and only fetches the result once the job is done. Both
//! resolve to a [`WaitOutcome`] or fail with a [`WaitError`], so callers
//! pick a [`WaitStrategy`] and never branch on which one ran.

pub mod clock;
pub mod listener;
pub mod poller;
pub mod update;

#[cfg(test)]
pub(crate) mod testing;

use crate::logging::*;
use crate::notify::ChannelConnector;
use clock::Stopwatch;
use listener::{ListenOptions, Listener};
use poller::PollOptions;
use std::fmt;
use std::future::Future;
use std::result::Result;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("Operation timed out")]
    Timeout,
    #[error("{0}")]
    Failed(String),
    #[error("WebSocket connection failed: {0}")]
    Transport(String),
    #[error("Operation cancelled")]
    Cancelled,
    /// The caller-supplied fetch failed; its error is passed through as is.
    #[error(transparent)]
    Fetch(#[from] anyhow::Error),
}

impl WaitError {
    pub(crate) fn failed(reason: Option<String>) -> Self {
        WaitError::Failed(reason.unwrap_or_else(|| "Operation failed".to_owned()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitOutcome<T> {
    pub result: T,
    /// Measured from the start of the wait, not from job submission.
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        JobId(value)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        JobId(value.to_owned())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job domain. Identifiers may collide across domains, so notifications
/// are matched on both the id and this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Image,
    Video,
}

impl JobKind {
    pub fn tag(&self) -> &'static str {
        match self {
            JobKind::Image => "IMAGE",
            JobKind::Video => "VIDEO",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRef {
    pub id: JobId,
    pub kind: JobKind,
}

impl JobRef {
    pub fn new(id: impl Into<JobId>, kind: JobKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

/// Terminal-state predicates of a polled job state.
pub trait JobState {
    fn is_complete(&self) -> bool;

    fn is_failed(&self) -> bool {
        false
    }

    fn failure_reason(&self) -> Option<String> {
        None
    }
}

/// Write-only progress display. Never read back by the wait logic.
pub trait ProgressSink: Send + Sync {
    fn set_text(&self, text: String);
}

pub(crate) async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending::<()>().await,
    }
}

pub struct WaitRequest<'a> {
    pub job: JobRef,
    pub timeout: Duration,
    pub progress: Option<&'a dyn ProgressSink>,
    pub cancel: Option<CancellationToken>,
}

impl<'a> WaitRequest<'a> {
    pub fn new(job: JobRef, timeout: Duration) -> Self {
        Self {
            job,
            timeout,
            progress: None,
            cancel: None,
        }
    }

    pub fn progress(mut self, sink: &'a dyn ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn listen_options(&self) -> ListenOptions<'a> {
        ListenOptions {
            task_id: self.job.id.clone(),
            task_type: self.job.kind,
            timeout: self.timeout,
            progress: self.progress,
            cancel: self.cancel.clone(),
        }
    }

    fn poll_options<T: JobState + 'a>(
        &self,
        interval: Duration,
        timeout: Duration,
    ) -> PollOptions<'a, T> {
        let mut options = PollOptions::for_state().interval(interval).timeout(timeout);
        if let Some(sink) = self.progress {
            options = options.progress(sink);
        }
        if let Some(token) = &self.cancel {
            options = options.cancel_on(token.clone());
        }
        options
    }
}

/// How to wait for a job.
///
/// `fetch` passed to [`WaitStrategy::wait`] is the state fetcher when
/// polling and the authoritative result getter when listening.
pub enum WaitStrategy<C> {
    Poll {
        interval: Duration,
    },
    Push(Listener<C>),
    /// Listen for notifications; poll with the remaining budget if the
    /// notification channel cannot be used.
    PushThenPoll {
        listener: Listener<C>,
        interval: Duration,
    },
}

impl<C: ChannelConnector> WaitStrategy<C> {
    pub fn name(&self) -> &'static str {
        match self {
            WaitStrategy::Poll { .. } => "poll",
            WaitStrategy::Push(_) => "push",
            WaitStrategy::PushThenPoll { .. } => "push-then-poll",
        }
    }

    pub async fn wait<'a, T, F, Fut>(
        &self,
        request: WaitRequest<'a>,
        mut fetch: F,
    ) -> Result<WaitOutcome<T>, WaitError>
    where
        T: JobState + 'a,
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let log = DEFAULT.new(o!(
            "function" => "completion::WaitStrategy::wait",
            "strategy" => self.name(),
            "job" => request.job.id.to_string(),
            "kind" => request.job.kind.tag(),
        ));
        debug!(log, "waiting"; "timeout" => ?request.timeout);

        match self {
            WaitStrategy::Poll { interval } => {
                poller::poll(fetch, request.poll_options(*interval, request.timeout)).await
            }
            WaitStrategy::Push(listener) => {
                listener
                    .wait_for_completion(request.listen_options(), fetch)
                    .await
            }
            WaitStrategy::PushThenPoll { listener, interval } => {
                let stopwatch = Stopwatch::start();
                match listener
                    .wait_for_completion(request.listen_options(), &mut fetch)
                    .await
                {
                    Err(WaitError::Transport(reason)) => {
                        warn!(log, "notification channel unavailable, falling back to polling";
                            "reason" => reason,
                        );
                        let remaining = stopwatch.remaining(request.timeout);
                        let outcome =
                            poller::poll(fetch, request.poll_options(*interval, remaining)).await?;
                        Ok(WaitOutcome {
                            result: outcome.result,
                            elapsed: stopwatch.elapsed(),
                        })
                    }
                    other => other,
                }
            }
        }
    }
}
