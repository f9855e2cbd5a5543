use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Sleep, sleep};

use super::RateLimitConfig;
use crate::transport::{PendingRequest, Transport};
use crate::{ErrorKind, RawResponse, Result};

/// A request waiting in the scheduler queue together with its reply channel
struct Job {
    request: PendingRequest,
    reply: oneshot::Sender<Result<RawResponse>>,
}

/// Values published by the dispatcher after every state change.
/// Only the dispatcher writes them.
#[derive(Debug, Default)]
struct Counters {
    available: AtomicUsize,
    queued: AtomicUsize,
    dispatched: AtomicUsize,
}

/// A point-in-time view of the scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSnapshot {
    /// Slots free for dispatching right now
    pub available: usize,
    /// Requests waiting in the queue
    pub queued: usize,
    /// Requests handed to the transport since the scheduler started
    pub dispatched: usize,
}

/// Completion handle of a submitted request.
///
/// Resolves to the transport's response. Dropping the handle, or calling
/// [`ResponseHandle::cancel`], cancels the request: a queued request is
/// skipped without using a slot, an in-flight request is abandoned.
#[derive(Debug)]
#[must_use = "dropping a ResponseHandle cancels the request"]
pub struct ResponseHandle {
    receiver: oneshot::Receiver<Result<RawResponse>>,
}

impl ResponseHandle {
    /// Cancel the request
    pub fn cancel(mut self) {
        self.receiver.close();
    }
}

impl Future for ResponseHandle {
    type Output = Result<RawResponse>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(ErrorKind::Cancelled)))
    }
}

/// Rate-limited FIFO request scheduler.
///
/// Requests are dispatched to the transport in submission order. Each
/// dispatch takes one of `max_clients` slots; the slot is returned `period`
/// after the dispatch, no matter how long the request itself takes or
/// whether it fails. This admits at most `max_clients` dispatches in any
/// window of length `period`.
///
/// The queue and the slot counter are owned by a single dispatcher task.
/// [`Scheduler::submit`] only sends the request to that task, so concurrent
/// submitters never race on the queue. The dispatcher runs until every
/// clone of the scheduler is dropped and the queue is drained.
#[derive(Debug, Clone)]
pub struct Scheduler {
    sender: mpsc::UnboundedSender<Job>,
    counters: Arc<Counters>,
    config: RateLimitConfig,
}

impl Scheduler {
    /// Start a scheduler on the current Tokio runtime
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, config: RateLimitConfig) -> Self {
        Self::with_runtime(transport, config, &Handle::current())
    }

    /// Start a scheduler whose dispatcher runs on `runtime`
    #[must_use]
    pub fn with_runtime(
        transport: Arc<dyn Transport>,
        config: RateLimitConfig,
        runtime: &Handle,
    ) -> Self {
        let config = config.effective();
        let (sender, receiver) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());
        counters.available.store(config.max_clients, Ordering::Relaxed);

        let dispatcher = Dispatcher {
            receiver,
            transport,
            config,
            queue: VecDeque::new(),
            available: config.max_clients,
            dispatched: 0,
            cooldowns: FuturesUnordered::new(),
            counters: Arc::clone(&counters),
        };
        runtime.spawn(dispatcher.run());

        Self {
            sender,
            counters,
            config,
        }
    }

    /// Queue a request and return immediately
    pub fn submit(&self, request: PendingRequest) -> ResponseHandle {
        let (reply, receiver) = oneshot::channel();
        if let Err(mpsc::error::SendError(job)) = self.sender.send(Job { request, reply }) {
            let _ = job.reply.send(Err(ErrorKind::SchedulerClosed));
        }
        ResponseHandle { receiver }
    }

    /// The effective rate limiting configuration
    #[must_use]
    pub const fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Current slot, queue and dispatch counts
    #[must_use]
    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            available: self.counters.available.load(Ordering::Relaxed),
            queued: self.counters.queued.load(Ordering::Relaxed),
            dispatched: self.counters.dispatched.load(Ordering::Relaxed),
        }
    }
}

/// The task owning the queue and the slot counter
struct Dispatcher {
    receiver: mpsc::UnboundedReceiver<Job>,
    transport: Arc<dyn Transport>,
    config: RateLimitConfig,
    queue: VecDeque<Job>,
    available: usize,
    dispatched: usize,
    cooldowns: FuturesUnordered<Sleep>,
    counters: Arc<Counters>,
}

impl Dispatcher {
    async fn run(mut self) {
        let mut open = true;
        loop {
            self.drain();
            self.publish();
            if !open && self.queue.is_empty() {
                break;
            }

            tokio::select! {
                job = self.receiver.recv(), if open => match job {
                    Some(job) => self.queue.push_back(job),
                    None => open = false,
                },
                Some(()) = self.cooldowns.next(), if !self.cooldowns.is_empty() => {
                    self.available += 1;
                    log::trace!("Rate limit slot released, {} available", self.available);
                },
                else => break,
            }
        }
        log::debug!(
            "Request scheduler stopped after {} dispatches",
            self.dispatched
        );
    }

    /// Dispatch queued requests while slots are available
    fn drain(&mut self) {
        while self.available > 0 {
            let Some(job) = self.queue.pop_front() else {
                break;
            };
            if job.reply.is_closed() {
                log::debug!(
                    "Dropping cancelled request {} {}",
                    job.request.http_method,
                    job.request.url.path()
                );
                continue;
            }
            self.available -= 1;
            self.dispatched += 1;
            self.cooldowns.push(sleep(self.config.period));
            self.dispatch(job);
        }
    }

    fn dispatch(&self, job: Job) {
        let Job {
            request,
            mut reply,
        } = job;
        log::debug!("Fetching {} {}", request.http_method, request.url.path());
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            tokio::select! {
                result = transport.execute(request) => {
                    let _ = reply.send(result);
                }
                () = reply.closed() => {
                    log::debug!("Request cancelled while in flight");
                }
            }
        });
    }

    fn publish(&self) {
        self.counters
            .available
            .store(self.available, Ordering::Relaxed);
        self.counters
            .queued
            .store(self.queue.len(), Ordering::Relaxed);
        self.counters
            .dispatched
            .store(self.dispatched, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{RecordingTransport, get_request};
    use futures::future::join_all;
    use std::time::Duration;
    use tokio::time::Instant;

    fn scheduler(transport: &RecordingTransport, max_clients: usize, period_ms: u64) -> Scheduler {
        Scheduler::new(
            Arc::new(transport.clone()),
            RateLimitConfig {
                max_clients,
                period: Duration::from_millis(period_ms),
            },
        )
    }

    /// Assert that no window of `period` contains more than `n` dispatches
    fn assert_rate(times: &[Instant], n: usize, period: Duration) {
        for k in 0..times.len().saturating_sub(n) {
            let gap = times[k + n] - times[k];
            assert!(
                gap >= period,
                "dispatch {} came {gap:?} after dispatch {k}",
                k + n
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifo_and_rate_bound() {
        let transport = RecordingTransport::new();
        let scheduler = scheduler(&transport, 5, 1000);

        let handles: Vec<_> = (0..12)
            .map(|i| scheduler.submit(get_request(&format!("/r/{i}"))))
            .collect();
        let start = Instant::now();
        for result in join_all(handles).await {
            result.unwrap();
        }

        let paths: Vec<String> = transport
            .requests()
            .iter()
            .map(|r| r.url.path().to_string())
            .collect();
        let expected: Vec<String> = (0..12).map(|i| format!("/r/{i}")).collect();
        assert_eq!(paths, expected);

        let times = transport.dispatch_times();
        assert_rate(&times, 5, Duration::from_secs(1));
        assert!(times[4] - start < Duration::from_millis(10));
        assert!(times[5] - start >= Duration::from_secs(1));
        assert!(times[10] - start >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slot_released_while_request_in_flight() {
        let transport = RecordingTransport::new().with_delay(Duration::from_secs(5));
        let scheduler = scheduler(&transport, 2, 1000);

        let start = Instant::now();
        let handles: Vec<_> = (0..4)
            .map(|i| scheduler.submit(get_request(&format!("/slow/{i}"))))
            .collect();
        join_all(handles).await;

        let times = transport.dispatch_times();
        assert_eq!(times.len(), 4);
        let third = times[2] - start;
        assert!(third >= Duration::from_secs(1));
        assert!(third < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_affect_slots() {
        let transport = RecordingTransport::new().failing();
        let scheduler = scheduler(&transport, 1, 500);

        let first = scheduler.submit(get_request("/a"));
        let second = scheduler.submit(get_request("/b"));
        assert!(first.await.unwrap_err().is_transport());
        assert!(second.await.unwrap_err().is_transport());

        let times = transport.dispatch_times();
        let gap = times[1] - times[0];
        assert!(gap >= Duration::from_millis(500) && gap < Duration::from_millis(600));

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(scheduler.snapshot().available, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_submitters() {
        let transport = RecordingTransport::new();
        let scheduler = scheduler(&transport, 3, 1000);

        let tasks: Vec<_> = (0..15)
            .map(|i| {
                let scheduler = scheduler.clone();
                tokio::spawn(async move { scheduler.submit(get_request(&format!("/c/{i}"))).await })
            })
            .collect();
        for task in join_all(tasks).await {
            task.unwrap().unwrap();
        }

        let times = transport.dispatch_times();
        assert_eq!(times.len(), 15);
        assert_rate(&times, 3, Duration::from_secs(1));
        assert_eq!(scheduler.snapshot().dispatched, 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_queued_request_is_skipped() {
        let transport = RecordingTransport::new();
        let scheduler = scheduler(&transport, 1, 1000);

        let first = scheduler.submit(get_request("/first"));
        let cancelled = scheduler.submit(get_request("/cancelled"));
        let third = scheduler.submit(get_request("/third"));
        cancelled.cancel();

        let start = Instant::now();
        first.await.unwrap();
        third.await.unwrap();

        let paths: Vec<String> = transport
            .requests()
            .iter()
            .map(|r| r.url.path().to_string())
            .collect();
        assert_eq!(paths, vec!["/first", "/third"]);
        assert!(Instant::now() - start < Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_in_flight_request_never_completes() {
        let transport = RecordingTransport::new().with_delay(Duration::from_secs(3));
        let scheduler = scheduler(&transport, 1, 1000);

        let handle = scheduler.submit(get_request("/slow"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.requests().len(), 1);
        drop(handle);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(transport.completed(), 0);
        assert_eq!(scheduler.snapshot().available, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_max_clients_still_dispatches() {
        let transport = RecordingTransport::new();
        let scheduler = scheduler(&transport, 0, 100);
        assert_eq!(scheduler.config().max_clients, 1);

        scheduler.submit(get_request("/a")).await.unwrap();
        scheduler.submit(get_request("/b")).await.unwrap();
        let times = transport.dispatch_times();
        assert!(times[1] - times[0] >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_tracks_slots() {
        let transport = RecordingTransport::new();
        let scheduler = scheduler(&transport, 2, 1000);
        assert_eq!(scheduler.snapshot().available, 2);

        let handles: Vec<_> = (0..3)
            .map(|i| scheduler.submit(get_request(&format!("/s/{i}"))))
            .collect();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let snapshot = scheduler.snapshot();
        assert_eq!(snapshot.available, 0);
        assert_eq!(snapshot.queued, 1);
        assert_eq!(snapshot.dispatched, 2);

        join_all(handles).await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(scheduler.snapshot().available, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_drained_after_scheduler_dropped() {
        let transport = RecordingTransport::new();
        let scheduler = scheduler(&transport, 1, 1000);

        let handles: Vec<_> = (0..3)
            .map(|i| scheduler.submit(get_request(&format!("/d/{i}"))))
            .collect();
        drop(scheduler);

        for result in join_all(handles).await {
            result.unwrap();
        }
        assert_eq!(transport.requests().len(), 3);
    }
}
