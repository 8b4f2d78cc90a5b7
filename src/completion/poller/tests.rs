use super::*;
use crate::completion::testing::RecordingSink;
use assertables::*;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Clone, PartialEq)]
struct Job {
    status: &'static str,
    message: Option<String>,
}

impl Job {
    fn pending() -> Self {
        Job {
            status: "pending",
            message: None,
        }
    }

    fn complete() -> Self {
        Job {
            status: "complete",
            message: None,
        }
    }

    fn error(message: Option<&str>) -> Self {
        Job {
            status: "error",
            message: message.map(str::to_owned),
        }
    }
}

fn is_complete(job: &Job) -> bool {
    job.status == "complete"
}

fn is_error(job: &Job) -> bool {
    job.status == "error"
}

/// Pending for the first `n - 1` calls, complete from the `n`th on.
fn complete_on(calls: &AtomicU32, n: u32) -> impl FnMut() -> std::future::Ready<anyhow::Result<Job>> + '_ {
    move || {
        let count = calls.fetch_add(1, Ordering::SeqCst) + 1;
        let job = if count >= n {
            Job::complete()
        } else {
            Job::pending()
        };
        std::future::ready(Ok(job))
    }
}

#[tokio::test(start_paused = true)]
async fn test_returns_immediately_when_complete() {
    let calls = AtomicU32::new(0);

    let outcome = poll(complete_on(&calls, 1), PollOptions::new(is_complete))
        .await
        .unwrap();

    assert_eq!(outcome.result, Job::complete());
    assert_eq!(outcome.elapsed, Duration::ZERO);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_polls_until_complete_spaced_by_interval() {
    let calls = AtomicU32::new(0);
    let seen = Mutex::new(Vec::new());

    let options = PollOptions::new(is_complete)
        .interval(Duration::from_millis(1000))
        .on_update(|_, elapsed| seen.lock().unwrap().push(elapsed));
    let outcome = poll(complete_on(&calls, 3), options).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(outcome.elapsed, Duration::from_millis(2000));
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            Duration::ZERO,
            Duration::from_millis(1000),
            Duration::from_millis(2000),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_times_out_when_never_complete() {
    let calls = AtomicU32::new(0);

    let options = PollOptions::new(|_: &Job| false)
        .interval(Duration::from_millis(1000))
        .timeout(Duration::from_millis(5000));
    let err = poll(complete_on(&calls, u32::MAX), options)
        .await
        .unwrap_err();

    assert!(matches!(err, WaitError::Timeout));
    assert_eq!(err.to_string(), "Operation timed out");
    // ticks at 0s..=5s, the check at 6s fails before fetching
    assert_eq!(calls.load(Ordering::SeqCst), 6);
}

#[tokio::test(start_paused = true)]
async fn test_uses_default_interval_and_timeout() {
    let calls = AtomicU32::new(0);
    let outcome = poll(complete_on(&calls, 2), PollOptions::new(is_complete))
        .await
        .unwrap();
    assert_eq!(outcome.elapsed, DEFAULT_INTERVAL);

    let calls = AtomicU32::new(0);
    let options = PollOptions::new(|_: &Job| false).interval(Duration::from_millis(150_000));
    let started = tokio::time::Instant::now();
    let err = poll(complete_on(&calls, u32::MAX), options)
        .await
        .unwrap_err();

    assert!(matches!(err, WaitError::Timeout));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_gt!(started.elapsed(), DEFAULT_TIMEOUT);
}

#[tokio::test(start_paused = true)]
async fn test_fails_with_generic_message() {
    let options = PollOptions::new(is_complete).is_failed(is_error);

    let err = poll(|| std::future::ready(Ok(Job::error(None))), options)
        .await
        .unwrap_err();

    assert!(matches!(err, WaitError::Failed(_)));
    assert_eq!(err.to_string(), "Operation failed");
}

#[tokio::test(start_paused = true)]
async fn test_fails_with_extracted_message() {
    let options = PollOptions::new(is_complete)
        .is_failed(is_error)
        .get_error(|job: &Job| job.message.clone());

    let err = poll(
        || std::future::ready(Ok(Job::error(Some("Custom error")))),
        options,
    )
    .await
    .unwrap_err();

    assert_eq!(err.to_string(), "Custom error");
}

#[tokio::test(start_paused = true)]
async fn test_complete_wins_over_failed() {
    let options = PollOptions::new(|_: &Job| true).is_failed(|_| true);

    let outcome = poll(|| std::future::ready(Ok(Job::pending())), options).await;

    assert!(outcome.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_on_update_sees_every_state() {
    let calls = AtomicU32::new(0);
    let statuses = Mutex::new(Vec::new());

    let options = PollOptions::new(is_complete)
        .interval(Duration::from_millis(1000))
        .on_update(|job: &Job, _| statuses.lock().unwrap().push(job.status));
    poll(complete_on(&calls, 2), options).await.unwrap();

    assert_eq!(*statuses.lock().unwrap(), vec!["pending", "complete"]);
}

#[tokio::test(start_paused = true)]
async fn test_progress_sink_shows_elapsed_time() {
    let calls = AtomicU32::new(0);
    let sink = RecordingSink::default();

    let options = PollOptions::new(is_complete)
        .interval(Duration::from_millis(1000))
        .progress(&sink);
    poll(complete_on(&calls, 3), options).await.unwrap();

    assert_eq!(
        sink.texts(),
        vec!["Generating... (0.0s)", "Generating... (1.0s)"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_fetch_error_propagates_unchanged() {
    let calls = AtomicU32::new(0);
    let fetch = || {
        calls.fetch_add(1, Ordering::SeqCst);
        std::future::ready(Err::<Job, _>(anyhow::anyhow!("connection reset")))
    };

    let err = poll(fetch, PollOptions::new(is_complete)).await.unwrap_err();

    assert!(matches!(err, WaitError::Fetch(_)));
    assert_eq!(err.to_string(), "connection reset");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_fetch_finishes_past_deadline() {
    let fetch = || async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(Job::complete())
    };
    let options = PollOptions::new(is_complete).timeout(Duration::from_secs(1));

    let outcome = poll(fetch, options).await.unwrap();

    assert_eq!(outcome.elapsed, Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_waiting() {
    let calls = AtomicU32::new(0);
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(2500)).await;
        trigger.cancel();
    });

    let options = PollOptions::new(is_complete)
        .interval(Duration::from_millis(1000))
        .cancel_on(token);
    let err = poll(complete_on(&calls, u32::MAX), options)
        .await
        .unwrap_err();

    assert!(matches!(err, WaitError::Cancelled));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_token_never_fetches() {
    let calls = AtomicU32::new(0);
    let token = CancellationToken::new();
    token.cancel();

    let options = PollOptions::new(is_complete).cancel_on(token);
    let err = poll(complete_on(&calls, 1), options).await.unwrap_err();

    assert!(matches!(err, WaitError::Cancelled));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_polls_are_independent() {
    let fast_calls = AtomicU32::new(0);
    let slow_calls = AtomicU32::new(0);

    let fast = poll(
        complete_on(&fast_calls, 2),
        PollOptions::new(is_complete).interval(Duration::from_millis(100)),
    );
    let slow = poll(
        complete_on(&slow_calls, 2),
        PollOptions::new(is_complete).interval(Duration::from_millis(700)),
    );
    let (fast, slow) = tokio::join!(fast, slow);

    assert_eq!(fast.unwrap().elapsed, Duration::from_millis(100));
    assert_eq!(slow.unwrap().elapsed, Duration::from_millis(700));
    assert_eq!(fast_calls.load(Ordering::SeqCst), 2);
    assert_eq!(slow_calls.load(Ordering::SeqCst), 2);
}
