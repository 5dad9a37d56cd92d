//! Correlation-id-keyed event accumulation with a pluggable, idempotent
//! reducer and blocking waiters.
//!
//! Implemented as the same actor-owned-state-behind-a-channel shape as
//! [`crate::dispatcher::AsyncDispatcher`]; the aggregator itself implements
//! [`crate::router::AsyncSubscriber`] so it can be registered directly with
//! a [`crate::router::Router`] like any other subscriber.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::error::CoreError;
use crate::event::{Event, EventKind};
use crate::router::AsyncSubscriber;

/// Result of reducing the events accumulated so far for one correlation id.
pub enum ReduceOutcome<K, P> {
    /// Not enough events yet; keep accumulating.
    Pending,
    /// The correlation id is resolved; these are the events delivered to
    /// every current and future waiter.
    Complete(Vec<Event<K, P>>),
    /// The correlation id failed; every waiter (current and future) is
    /// failed with `reason` (see DESIGN.md for why this crate does not
    /// leave them blocked forever).
    Error(String),
}

/// A reducer is invoked with the full slice of events accumulated so far
/// for a correlation id, every time a new one arrives. It must be
/// idempotent: called again with the same prefix of events, it must
/// produce the same outcome, since the aggregator may re-evaluate it
/// after every single ingested event.
pub type Reducer<K, P> = Arc<dyn Fn(&[Event<K, P>]) -> ReduceOutcome<K, P> + Send + Sync>;

type WaitReply<K, P> = oneshot::Sender<Result<Vec<Event<K, P>>, CoreError>>;

enum State<K, P> {
    Partial {
        events: Vec<Event<K, P>>,
        waiters: Vec<WaitReply<K, P>>,
    },
    Complete(Vec<Event<K, P>>),
    Failed(String),
}

enum Msg<K, P> {
    Ingest { event: Event<K, P>, reply: WaitReply<K, P> },
    Wait { id: String, reply: WaitReply<K, P> },
}

pub struct AsyncAggregator<K, P> {
    tx: mpsc::UnboundedSender<Msg<K, P>>,
}

impl<K, P> Clone for AsyncAggregator<K, P> {
    fn clone(&self) -> Self {
        AsyncAggregator { tx: self.tx.clone() }
    }
}

impl<K, P> AsyncAggregator<K, P>
where
    K: EventKind,
    P: Clone + Send + Sync + 'static,
{
    pub fn spawn(reducer: Reducer<K, P>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Msg<K, P>>();

        tokio::spawn(async move {
            let mut states: HashMap<String, State<K, P>> = HashMap::new();

            while let Some(msg) = rx.recv().await {
                match msg {
                    Msg::Ingest { event, reply } => {
                        let Some(id) = event.correlation_id.clone() else {
                            log::warn!("aggregator received an event with no correlation id");
                            let _ = reply.send(Ok(Vec::new()));
                            continue;
                        };
                        // Already resolved for this id: hand back the cached
                        // outcome synchronously without touching the reducer.
                        match states.get(&id) {
                            Some(State::Complete(output)) => {
                                let _ = reply.send(Ok(output.clone()));
                                continue;
                            }
                            Some(State::Failed(reason)) => {
                                let _ = reply.send(Err(CoreError::ReducerFailed(reason.clone())));
                                continue;
                            }
                            _ => {}
                        }
                        let entry = states.entry(id.clone()).or_insert_with(|| State::Partial {
                            events: Vec::new(),
                            waiters: Vec::new(),
                        });
                        match entry {
                            State::Partial { events, waiters } => {
                                events.push(event);
                                match (reducer)(events) {
                                    ReduceOutcome::Pending => {
                                        let _ = reply.send(Ok(Vec::new()));
                                    }
                                    ReduceOutcome::Complete(output) => {
                                        let _ = reply.send(Ok(output.clone()));
                                        for waiter in waiters.drain(..) {
                                            let _ = waiter.send(Ok(output.clone()));
                                        }
                                        states.insert(id, State::Complete(output));
                                    }
                                    ReduceOutcome::Error(reason) => {
                                        let _ =
                                            reply.send(Err(CoreError::ReducerFailed(reason.clone())));
                                        for waiter in waiters.drain(..) {
                                            let _ = waiter.send(Err(CoreError::ReducerFailed(
                                                reason.clone(),
                                            )));
                                        }
                                        states.insert(id, State::Failed(reason));
                                    }
                                }
                            }
                            State::Complete(_) | State::Failed(_) => unreachable!(
                                "handled above before the Partial match"
                            ),
                        }
                    }
                    Msg::Wait { id, reply } => match states.get_mut(&id) {
                        Some(State::Complete(output)) => {
                            let _ = reply.send(Ok(output.clone()));
                        }
                        Some(State::Failed(reason)) => {
                            let _ = reply.send(Err(CoreError::ReducerFailed(reason.clone())));
                        }
                        Some(State::Partial { waiters, .. }) => {
                            waiters.push(reply);
                        }
                        None => {
                            states.insert(
                                id,
                                State::Partial {
                                    events: Vec::new(),
                                    waiters: vec![reply],
                                },
                            );
                        }
                    },
                }
            }
        });

        AsyncAggregator { tx }
    }

    /// Blocks until the correlation id's reducer has produced a `Complete`
    /// or `Error` outcome, or `timeout` elapses.
    pub async fn wait_for_events(
        &self,
        correlation_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Vec<Event<K, P>>, CoreError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .tx
            .send(Msg::Wait {
                id: correlation_id.into(),
                reply: reply_tx,
            })
            .is_err()
        {
            return Err(CoreError::GatewayError(
                "aggregator actor has exited".to_string(),
            ));
        }
        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CoreError::GatewayError(
                "aggregator actor dropped the reply channel".to_string(),
            )),
            Err(_) => Err(CoreError::Timeout),
        }
    }
}

#[async_trait]
impl<K, P> AsyncSubscriber<K, P> for AsyncAggregator<K, P>
where
    K: EventKind,
    P: Clone + Send + Sync + 'static,
{
    /// Per spec §4.3: empty if the needed set is still incomplete, the
    /// reducer's output if `event` completed it, or the cached output if
    /// this correlation id was already resolved.
    async fn receive_event(&self, event: Event<K, P>) -> Result<Vec<Event<K, P>>, CoreError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(Msg::Ingest { event, reply: reply_tx }).is_err() {
            return Err(CoreError::GatewayError(
                "receive_event called on an aggregator whose actor has exited".to_string(),
            ));
        }
        reply_rx.await.map_err(|_| {
            CoreError::GatewayError("aggregator actor dropped the reply channel".to_string())
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    enum K {
        Partial,
        Terminate,
    }

    impl EventKind for K {
        fn is_terminate(&self) -> bool {
            matches!(self, K::Terminate)
        }
    }

    fn complete_after_two() -> Reducer<K, i64> {
        Arc::new(|events: &[Event<K, i64>]| {
            if events.len() >= 2 {
                ReduceOutcome::Complete(events.to_vec())
            } else {
                ReduceOutcome::Pending
            }
        })
    }

    #[tokio::test]
    async fn receive_event_reports_pending_then_completion_then_cached() {
        let aggregator: AsyncAggregator<K, i64> = AsyncAggregator::spawn(complete_after_two());
        let id = "corr-1";

        let first = aggregator
            .receive_event(Event::new(K::Partial, 1).with_correlation_id(id))
            .await
            .unwrap();
        assert!(first.is_empty(), "incomplete set must report no output events yet");

        let second = aggregator
            .receive_event(Event::new(K::Partial, 2).with_correlation_id(id))
            .await
            .unwrap();
        assert_eq!(second.len(), 2, "the call that completes the set gets the reducer's output");

        let result = aggregator
            .wait_for_events(id, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(result.len(), 2);

        // A third event for the same id is dropped by the reducer but still
        // synchronously returns the cached completion (spec §8 scenario 3),
        // proving the reducer only fired once.
        let third = aggregator
            .receive_event(Event::new(K::Partial, 3).with_correlation_id(id))
            .await
            .unwrap();
        assert_eq!(third, second, "cached result must match the original completion payload");
    }

    #[tokio::test]
    async fn waiter_registered_before_completion_is_released() {
        let aggregator: AsyncAggregator<K, i64> = AsyncAggregator::spawn(complete_after_two());
        let id = "corr-2".to_string();
        let agg_clone = aggregator.clone();
        let id_clone = id.clone();
        let waiter = tokio::spawn(async move {
            agg_clone
                .wait_for_events(id_clone, Duration::from_secs(2))
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        aggregator
            .receive_event(Event::new(K::Partial, 1).with_correlation_id(&id))
            .await
            .unwrap();
        aggregator
            .receive_event(Event::new(K::Partial, 2).with_correlation_id(&id))
            .await
            .unwrap();

        let result = waiter.await.unwrap().unwrap();
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn error_outcome_fails_the_triggering_call_and_waiters_instead_of_hanging() {
        let reducer: Reducer<K, i64> =
            Arc::new(|_events: &[Event<K, i64>]| ReduceOutcome::Error("boom".to_string()));
        let aggregator: AsyncAggregator<K, i64> = AsyncAggregator::spawn(reducer);
        let id = "corr-3";

        let immediate = aggregator
            .receive_event(Event::new(K::Partial, 1).with_correlation_id(id))
            .await;
        assert!(matches!(immediate, Err(CoreError::ReducerFailed(ref reason)) if reason == "boom"));

        let result = aggregator.wait_for_events(id, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(CoreError::ReducerFailed(reason)) if reason == "boom"));
    }

    #[tokio::test]
    async fn wait_for_events_times_out_when_never_completed() {
        let aggregator: AsyncAggregator<K, i64> = AsyncAggregator::spawn(complete_after_two());
        let result = aggregator
            .wait_for_events("missing", Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(CoreError::Timeout)));
    }
}
