//! Integration coverage for Router + AsyncDispatcher + AsyncAggregator
//! working together, exercising the public crate API rather than
//! module-private internals.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use agentcore::aggregator::{AsyncAggregator, ReduceOutcome, Reducer};
use agentcore::dispatcher::{AsyncDispatcher, DispatcherConfig};
use agentcore::error::CoreError;
use agentcore::event::{Event, EventKind};
use agentcore::router::{AsyncSubscriber, Router};
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Kind {
    WorkItem,
    B,
    C,
    Combined,
    Terminate,
}

impl EventKind for Kind {
    fn is_terminate(&self) -> bool {
        matches!(self, Kind::Terminate)
    }
}

fn collect_all() -> Reducer<Kind, serde_json::Value> {
    Arc::new(|events| {
        if events.len() >= 3 {
            ReduceOutcome::Complete(events.to_vec())
        } else {
            ReduceOutcome::Pending
        }
    })
}

/// Records every event it receives, by payload, for assertions. Used as the
/// downstream sink proving an aggregator's combined output event actually
/// flows back through the dispatcher and router rather than only being
/// observable via `wait_for_events`.
struct Sink(Arc<StdMutex<Vec<serde_json::Value>>>);

#[async_trait]
impl AsyncSubscriber<Kind, serde_json::Value> for Sink {
    async fn receive_event(
        &self,
        event: Event<Kind, serde_json::Value>,
    ) -> Result<Vec<Event<Kind, serde_json::Value>>, CoreError> {
        self.0.lock().unwrap().push(event.payload);
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn dispatcher_fans_out_into_aggregator_by_correlation_id() {
    let router: Arc<Router<Kind, serde_json::Value>> = Arc::new(Router::new());
    let aggregator: AsyncAggregator<Kind, serde_json::Value> =
        AsyncAggregator::spawn(collect_all());
    router
        .add_route(Kind::WorkItem, Arc::new(aggregator.clone()))
        .await;

    let dispatcher = AsyncDispatcher::spawn(
        router,
        DispatcherConfig {
            batch_size: 4,
            tick: Duration::from_millis(10),
            bounded_queue: None,
        },
    );

    let correlation_id = "run-42";
    for i in 0..3 {
        dispatcher.dispatch(
            Event::new(Kind::WorkItem, serde_json::json!({ "step": i }))
                .with_correlation_id(correlation_id),
        );
    }

    let events = aggregator
        .wait_for_events(correlation_id, Duration::from_secs(2))
        .await
        .expect("aggregator should complete once three events arrive");
    assert_eq!(events.len(), 3);
}

#[tokio::test]
async fn events_without_a_correlation_id_get_one_assigned_on_dispatch() {
    let router: Arc<Router<Kind, serde_json::Value>> = Arc::new(Router::new());
    let aggregator: AsyncAggregator<Kind, serde_json::Value> =
        AsyncAggregator::spawn(Arc::new(|events: &[Event<Kind, serde_json::Value>]| {
            ReduceOutcome::Complete(events.to_vec())
        }));
    router
        .add_route(Kind::WorkItem, Arc::new(aggregator.clone()))
        .await;

    let mut event = Event::new(Kind::WorkItem, serde_json::json!({}));
    assert!(event.correlation_id.is_none());

    let dispatcher = AsyncDispatcher::spawn(router, DispatcherConfig::default());
    // The dispatcher assigns the id internally; we can't observe it from
    // here directly, so instead assert the behavior at the Event level,
    // which is what the dispatcher calls internally.
    let assigned = event.ensure_correlation_id().to_string();
    assert!(!assigned.is_empty());
    dispatcher.dispatch(event);
    dispatcher
        .wait_for_empty(Duration::from_secs(1))
        .await
        .unwrap();
}

#[tokio::test]
async fn wait_for_empty_reports_success_once_all_fanned_out_work_completes() {
    let router: Arc<Router<Kind, serde_json::Value>> = Arc::new(Router::new());
    let dispatcher = AsyncDispatcher::spawn(
        router,
        DispatcherConfig {
            batch_size: 1,
            tick: Duration::from_millis(5),
            bounded_queue: None,
        },
    );

    for i in 0..20 {
        dispatcher.dispatch(Event::new(Kind::WorkItem, serde_json::json!(i)));
    }

    dispatcher
        .wait_for_empty(Duration::from_secs(2))
        .await
        .expect("queue should fully drain within the timeout");
    assert_eq!(dispatcher.get_queue_size().await, 0);
    assert_eq!(dispatcher.pending_task_count(), 0);
}

#[tokio::test]
async fn aggregator_completion_event_flows_back_through_the_router_to_a_downstream_sink() {
    // spec §8 scenarios 2 & 3: needed={B, C}; reducer emits one Combined
    // event. A downstream Combined-sink must see it, and a later duplicate
    // B must synchronously yield the cached Combined payload rather than
    // re-running the reducer.
    let router: Arc<Router<Kind, serde_json::Value>> = Arc::new(Router::new());

    let needed_complete: Reducer<Kind, serde_json::Value> = Arc::new(|events| {
        let has_b = events.iter().any(|e| e.kind == Kind::B);
        let has_c = events.iter().any(|e| e.kind == Kind::C);
        if has_b && has_c {
            let correlation_id = events[0].correlation_id.clone();
            let mut combined = Event::new(Kind::Combined, serde_json::json!({"merged": true}));
            if let Some(id) = correlation_id {
                combined = combined.with_correlation_id(id);
            }
            ReduceOutcome::Complete(vec![combined])
        } else {
            ReduceOutcome::Pending
        }
    });
    let aggregator: AsyncAggregator<Kind, serde_json::Value> =
        AsyncAggregator::spawn(needed_complete);
    router.add_route(Kind::B, Arc::new(aggregator.clone())).await;
    router.add_route(Kind::C, Arc::new(aggregator.clone())).await;

    let combined_seen = Arc::new(StdMutex::new(Vec::new()));
    router
        .add_route(Kind::Combined, Arc::new(Sink(combined_seen.clone())))
        .await;

    let dispatcher = AsyncDispatcher::spawn(
        router,
        DispatcherConfig {
            batch_size: 4,
            tick: Duration::from_millis(10),
            bounded_queue: None,
        },
    );

    let correlation_id = "x";
    dispatcher.dispatch(Event::new(Kind::B, serde_json::json!({})).with_correlation_id(correlation_id));
    dispatcher.dispatch(Event::new(Kind::C, serde_json::json!({})).with_correlation_id(correlation_id));
    dispatcher
        .wait_for_empty(Duration::from_secs(2))
        .await
        .expect("dispatcher should drain once the aggregator's Combined event is processed");

    {
        let seen = combined_seen.lock().unwrap();
        assert_eq!(seen.len(), 1, "exactly one Combined event must reach the sink");
    }

    // A duplicate B for the same correlation id does not re-run the reducer
    // (see reducer_fires_exactly_once coverage in aggregator.rs), but the
    // dispatcher treats the aggregator's cached reply the same as a fresh
    // one and re-enqueues it, so the sink observes the Combined payload
    // again. See DESIGN.md's "Cached aggregator output on repeat delivery".
    dispatcher.dispatch(Event::new(Kind::B, serde_json::json!({})).with_correlation_id(correlation_id));
    dispatcher
        .wait_for_empty(Duration::from_secs(2))
        .await
        .unwrap();
    let seen = combined_seen.lock().unwrap();
    assert_eq!(
        seen.len(),
        2,
        "cached completion is returned on every subsequent receive_event, so it reaches the sink again"
    );
}
