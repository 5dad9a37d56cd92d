//! FIFO event queue with batched, per-subscriber fan-out.
//!
//! The dispatcher owns its queue exclusively inside a single `tokio::spawn`-ed
//! task and talks to callers through an `mpsc` channel — the "actor-owned
//! state behind a request channel" shape this crate uses in place of the
//! original's GenServer (see DESIGN.md). Fan-out itself is the same
//! spawn-one-task-per-unit-of-work-then-collect idiom used for parallel
//! agent execution elsewhere in this stack, generalized from "one task per
//! agent" to "one task per (event, subscriber) pair."

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;

use crate::error::CoreError;
use crate::event::{Event, EventKind};
use crate::router::Router;

/// Tunables for an [`AsyncDispatcher`]. `batch_size` of 1 preserves strict
/// per-subscriber enqueue order across the whole run; larger batches trade
/// that guarantee for throughput since events within a batch fan out
/// concurrently.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub batch_size: usize,
    pub tick: Duration,
    /// `Some(n)` caps the queue at `n` events: once full, newly pushed or
    /// re-enqueued events are dropped (and logged) rather than accepted.
    /// `dispatch` itself stays non-blocking either way — this bounds queue
    /// growth without turning `dispatch` into an awaiting call. `None` (the
    /// default) keeps the queue unbounded.
    pub bounded_queue: Option<usize>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            batch_size: 8,
            tick: Duration::from_millis(100),
            bounded_queue: None,
        }
    }
}

enum Msg<K, P> {
    Push(Event<K, P>),
    /// Outcome of one subscriber's `receive_event` call, fed back into the
    /// actor so the resulting events are merged into the queue in the same
    /// loop iteration that retires the pending-task count — avoids a
    /// window where `queue_size + pending_tasks` reports zero with a
    /// derived event still in flight between tasks.
    Result(Result<Vec<Event<K, P>>, CoreError>),
    QueueSize(oneshot::Sender<usize>),
    Stop,
}

/// Handle to a running dispatcher. Cheap to clone; all clones talk to the
/// same underlying actor task.
pub struct AsyncDispatcher<K, P> {
    tx: mpsc::UnboundedSender<Msg<K, P>>,
    pending_tasks: Arc<AtomicUsize>,
}

impl<K, P> Clone for AsyncDispatcher<K, P> {
    fn clone(&self) -> Self {
        AsyncDispatcher {
            tx: self.tx.clone(),
            pending_tasks: self.pending_tasks.clone(),
        }
    }
}

impl<K, P> AsyncDispatcher<K, P>
where
    K: EventKind,
    P: Clone + Send + Sync + 'static,
{
    /// Spawns the dispatcher's drain loop and returns a handle to it.
    pub fn spawn(router: Arc<Router<K, P>>, config: DispatcherConfig) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Msg<K, P>>();
        let pending_tasks = Arc::new(AtomicUsize::new(0));
        let pending_tasks_actor = pending_tasks.clone();
        let self_tx = tx.clone();

        tokio::spawn(async move {
            let mut queue: VecDeque<Event<K, P>> = VecDeque::new();
            let mut stopping = false;
            let mut ticker = interval(config.tick);

            fn enqueue<K: EventKind, P>(
                queue: &mut VecDeque<Event<K, P>>,
                stopping: &mut bool,
                bounded_queue: Option<usize>,
                mut event: Event<K, P>,
            ) {
                if *stopping {
                    return;
                }
                if let Some(cap) = bounded_queue {
                    if queue.len() >= cap {
                        log::warn!(
                            "dispatcher queue at configured capacity ({cap}), dropping event"
                        );
                        return;
                    }
                }
                event.ensure_correlation_id();
                if event.kind.is_terminate() {
                    *stopping = true;
                }
                queue.push_back(event);
            }

            loop {
                tokio::select! {
                    biased;
                    msg = rx.recv() => {
                        match msg {
                            Some(Msg::Push(event)) => {
                                enqueue(&mut queue, &mut stopping, config.bounded_queue, event);
                            }
                            Some(Msg::Result(outcome)) => {
                                match outcome {
                                    Ok(events) => {
                                        for event in events {
                                            enqueue(&mut queue, &mut stopping, config.bounded_queue, event);
                                        }
                                    }
                                    Err(err) => {
                                        log::warn!("subscriber invocation failed, dropping: {err}");
                                    }
                                }
                                pending_tasks_actor.fetch_sub(1, Ordering::SeqCst);
                            }
                            Some(Msg::QueueSize(reply)) => {
                                let _ = reply.send(
                                    queue.len() + pending_tasks_actor.load(Ordering::SeqCst),
                                );
                            }
                            Some(Msg::Stop) => {
                                stopping = true;
                            }
                            None => break,
                        }
                    }
                    _ = ticker.tick() => {
                        let batch_len = config.batch_size.min(queue.len());
                        for _ in 0..batch_len {
                            if let Some(event) = queue.pop_front() {
                                let subscribers = router.get_subscribers(&event.kind).await;
                                for subscriber in subscribers {
                                    let event = event.clone();
                                    let result_tx = self_tx.clone();
                                    pending_tasks_actor.fetch_add(1, Ordering::SeqCst);
                                    tokio::spawn(async move {
                                        let outcome = subscriber.receive_event(event).await;
                                        let _ = result_tx.send(Msg::Result(outcome));
                                    });
                                }
                            }
                        }
                        if stopping && queue.is_empty() && pending_tasks_actor.load(Ordering::SeqCst) == 0 {
                            break;
                        }
                    }
                }
            }
        });

        AsyncDispatcher { tx, pending_tasks }
    }

    /// Enqueues `event`. Never blocks on subscriber execution; returns as
    /// soon as the event is pushed onto the internal channel. Silently
    /// dropped (logged) if the dispatcher has already been stopped.
    pub fn dispatch(&self, event: Event<K, P>) {
        if self.tx.send(Msg::Push(event)).is_err() {
            log::warn!("dispatch called on a dispatcher whose actor task has exited");
        }
    }

    /// Requests a shutdown: no further pushed events are accepted, but
    /// everything already queued still drains and its fan-out tasks still
    /// run to completion. Does not cancel in-flight subscriber tasks.
    pub fn stop(&self) {
        if self.tx.send(Msg::Stop).is_err() {
            log::warn!("stop called on a dispatcher whose actor task has already exited");
        }
    }

    /// Reported queue depth per spec §4.2: `len(queue) + pending_tasks`, not
    /// just the events still sitting in the FIFO. A derived event in flight
    /// between a finishing fan-out task and its merge back into the queue
    /// must still count, or a caller polling this could observe a false
    /// zero.
    pub async fn get_queue_size(&self) -> usize {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(Msg::QueueSize(reply_tx)).is_err() {
            return 0;
        }
        reply_rx.await.unwrap_or(0)
    }

    /// Returns the number of subscriber fan-out tasks currently in flight.
    pub fn pending_task_count(&self) -> usize {
        self.pending_tasks.load(Ordering::SeqCst)
    }

    /// Polls `get_queue_size` at up to 100ms intervals until it reports
    /// zero (queue empty and no fan-out task in flight) or `timeout`
    /// elapses.
    pub async fn wait_for_empty(&self, timeout: Duration) -> Result<(), CoreError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.get_queue_size().await == 0 {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(CoreError::Timeout);
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            tokio::time::sleep(remaining.min(Duration::from_millis(100))).await;
        }
    }
}
