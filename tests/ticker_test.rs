//! Tests for the periodic auto-dispatcher.

use std::time::Duration;

use ticket_dispatch::engine::{AutoDispatcher, DispatchEngine, TickerConfig};
use ticket_dispatch::model::{CallClass, ClientClass, NewAgent, NewTicket};

fn fast() -> TickerConfig {
    TickerConfig {
        interval: Duration::from_millis(20),
    }
}

#[test]
fn default_interval_is_ten_seconds() {
    assert_eq!(TickerConfig::default().interval, Duration::from_secs(10));
}

#[test]
fn tick_dispatches_one_ticket() {
    let engine = DispatchEngine::detached();
    engine
        .register_agent(NewAgent::new("a", "Ana", [CallClass::Question]))
        .unwrap();
    for _ in 0..2 {
        engine
            .add_ticket(NewTicket::of("Acme", ClientClass::Standard, CallClass::Question))
            .unwrap();
    }

    let dispatcher = AutoDispatcher::new(engine.clone(), fast());
    let d = dispatcher.tick().expect("queue not empty");

    assert_eq!(d.assigned_to.as_deref(), Some("a"));
    assert_eq!(engine.pending_len(), 1);
}

#[test]
fn tick_on_empty_queue_is_none() {
    let dispatcher = AutoDispatcher::new(DispatchEngine::detached(), fast());
    assert!(dispatcher.tick().is_none());
}

#[tokio::test]
async fn run_drains_queue_until_shutdown() {
    let engine = DispatchEngine::detached();
    for _ in 0..3 {
        engine
            .add_ticket(NewTicket::of("Acme", ClientClass::Priority, CallClass::ServerDown))
            .unwrap();
    }

    let dispatcher = AutoDispatcher::new(engine.clone(), fast());
    let runner = dispatcher.clone();
    let handle = tokio::spawn(async move { runner.run().await });

    tokio::time::timeout(Duration::from_secs(5), async {
        while engine.pending_len() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("queue drained");

    dispatcher.shutdown();
    let dispatched = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("dispatcher stopped")
        .unwrap();

    assert_eq!(dispatched, 3);
    // No agents, so every ticket waits for an operator.
    assert_eq!(engine.snapshot().awaiting_agent.len(), 3);
}

#[tokio::test]
async fn shutdown_before_run_stops_immediately() {
    let dispatcher = AutoDispatcher::new(
        DispatchEngine::detached(),
        TickerConfig {
            interval: Duration::from_secs(3600),
        },
    );
    dispatcher.shutdown();

    let dispatched = tokio::time::timeout(Duration::from_secs(5), dispatcher.run())
        .await
        .expect("run returned");
    assert_eq!(dispatched, 0);
}
