use super::clock::Stopwatch;
use super::poller::DEFAULT_TIMEOUT;
use super::update::{
    CompletionUpdate, ResourceStatus, Signal, TASK_UPDATE_EVENT, resource_status_event,
};
use super::{JobId, JobKind, ProgressSink, WaitError, WaitOutcome, cancelled};
use crate::logging::*;
use crate::notify::{ChannelConnector, ChannelEvent, NotificationChannel};
use std::future::Future;
use std::result::Result;
use std::time::Duration;
use tokio_util::sync::CancellationToken;


pub struct ListenOptions<'a> {
    pub task_id: JobId,
    pub task_type: JobKind,
    pub timeout: Duration,
    pub progress: Option<&'a dyn ProgressSink>,
    pub cancel: Option<CancellationToken>,
}

impl<'a> ListenOptions<'a> {
    pub fn new(task_id: impl Into<JobId>, task_type: JobKind) -> Self {
        Self {
            task_id: task_id.into(),
            task_type,
            timeout: DEFAULT_TIMEOUT,
            progress: None,
            cancel: None,
        }
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

/// Waits for a job by subscribing to its completion notifications.
pub struct Listener<C> {
    connector: C,
}

impl<C> Listener<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }
}

impl<C: ChannelConnector> Listener<C> {
    /// Resolves once a matching `completed` notification arrives, then
    /// fetches the authoritative result with `get_result`.
    ///
    /// The timeout runs from the call, so connection setup counts against
    /// it. It stops applying once a terminal notification is seen; the
    /// channel is closed before `get_result` runs. An opened channel is
    /// disconnected exactly once whatever the outcome.
    pub async fn wait_for_completion<T, G, Fut>(
        &self,
        options: ListenOptions<'_>,
        get_result: G,
    ) -> Result<WaitOutcome<T>, WaitError>
    where
        G: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let log = DEFAULT.new(o!(
            "function" => "completion::Listener::wait_for_completion",
            "task_id" => options.task_id.to_string(),
            "task_type" => options.task_type.tag(),
        ));
        let stopwatch = Stopwatch::start();
        let deadline = stopwatch.deadline(options.timeout);

        let mut channel = tokio::select! {
            biased;
            _ = cancelled(options.cancel.as_ref()) => return Err(WaitError::Cancelled),
            _ = tokio::time::sleep_until(deadline) => {
                debug!(log, "timed out while connecting");
                return Err(WaitError::Timeout);
            }
            opened = self.connector.open() => opened.map_err(|reason| {
                debug!(log, "cannot open channel"; "reason" => &reason);
                WaitError::Transport(reason)
            })?,
        };

        let settled = tokio::select! {
            biased;
            _ = cancelled(options.cancel.as_ref()) => Err(WaitError::Cancelled),
            _ = tokio::time::sleep_until(deadline) => Err(WaitError::Timeout),
            settled = watch(&mut channel, &options, &log) => settled,
        };
        channel.disconnect().await;
        debug!(log, "settled"; "ok" => settled.is_ok(), "elapsed" => ?stopwatch.elapsed());
        settled?;

        let result = get_result().await?;
        Ok(WaitOutcome {
            result,
            elapsed: stopwatch.elapsed(),
        })
    }
}

/// Consumes events until one settles the awaited job.
async fn watch<Ch: NotificationChannel>(
    channel: &mut Ch,
    options: &ListenOptions<'_>,
    log: &Logger,
) -> Result<(), WaitError> {
    let resource_event = resource_status_event(&options.task_id);

    loop {
        let signal = match channel.next_event().await {
            ChannelEvent::Connected => {
                debug!(log, "subscribed");
                None
            }
            ChannelEvent::ConnectError(reason) => return Err(WaitError::Transport(reason)),
            ChannelEvent::Closed(reason) => {
                let reason = reason.unwrap_or_else(|| "connection closed".to_owned());
                return Err(WaitError::Transport(reason));
            }
            ChannelEvent::Message { event, payload } if event == TASK_UPDATE_EVENT => {
                match serde_json::from_value::<CompletionUpdate>(payload) {
                    Ok(update) if update.concerns(&options.task_id, options.task_type) => {
                        update.signal()
                    }
                    Ok(_) => None,
                    Err(err) => {
                        warn!(log, "ignoring malformed update"; "error" => %err);
                        None
                    }
                }
            }
            ChannelEvent::Message { event, payload } if event == resource_event => {
                match serde_json::from_value::<ResourceStatus>(payload) {
                    Ok(status) => status.signal(),
                    Err(err) => {
                        warn!(log, "ignoring malformed status"; "error" => %err);
                        None
                    }
                }
            }
            ChannelEvent::Message { event, .. } => {
                trace!(log, "ignoring event"; "event" => event);
                None
            }
        };

        match signal {
            Some(Signal::Completed) => return Ok(()),
            Some(Signal::Failed(reason)) => return Err(WaitError::failed(reason)),
            Some(Signal::Progress(progress)) => {
                if let Some(sink) = options.progress {
                    sink.set_text(match progress {
                        Some(percent) => format!("Processing... {percent:.0}%"),
                        None => "Processing...".to_owned(),
                    });
                }
            }
            None => {}
        }
    }
}
