// ABOUTME: Topic-addressed fan-out to registered subscribers with per-delivery retry and backoff
// ABOUTME: Registry is written only at startup; publishing is read-only and safe to share across connections

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::position::Position;

pub const TOPIC_POSITION_RECEIVED: &str = "position.received";
pub const TOPIC_CLOSE_CONNECTION: &str = "close.connection";

#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Position(Position),
    CloseConnection,
}

/// One publication. `topic` is the base name (`position.received` or
/// `close.connection`); the bus composes the full
/// `<base>.<subscriber-name>` topic string per delivery, matching the wire
/// contract subscribers are registered under.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub topic: &'static str,
    pub payload: EventPayload,
}

impl Event {
    pub fn position(position: Position) -> Self {
        Event { topic: TOPIC_POSITION_RECEIVED, payload: EventPayload::Position(position) }
    }

    pub fn close_connection() -> Self {
        Event { topic: TOPIC_CLOSE_CONNECTION, payload: EventPayload::CloseConnection }
    }
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("subscriber error: {0}")]
    Handler(String),
    #[error("delivery canceled")]
    Canceled,
}

/// External consumer of `Position` and lifecycle events. Subscribers are
/// shared across every connection's handler task and MUST be internally
/// concurrency-safe (a pooled database client suffices).
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Identity used to compose this subscriber's slice of each topic
    /// (`<base>.<name>`), and for logging.
    fn name(&self) -> &str;

    /// The closed set of base event names this subscriber accepts.
    fn topics(&self) -> &[&str];

    async fn handle(&self, event: &Event) -> Result<(), BusError>;
}

/// Retry policy for one delivery attempt sequence. The original design uses
/// unbounded retry bounded only by the caller's deadline; `max_attempts`
/// keeps that data-driven per the design notes while defaulting high enough
/// to behave as "unbounded in practice" under any reasonable idle timeout.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig { max_attempts: u32::MAX, base_delay: Duration::from_secs(1) }
    }
}

/// Fan-out bus. Registration happens once at startup; `publish` is read-only
/// from then on and safe to call concurrently from many connection tasks.
pub struct EventBus {
    subscribers: Vec<Arc<dyn Subscriber>>,
    retry: RetryConfig,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus { subscribers: Vec::new(), retry: RetryConfig::default() }
    }

    pub fn with_retry(retry: RetryConfig) -> Self {
        EventBus { subscribers: Vec::new(), retry }
    }

    pub fn register(&mut self, subscriber: Arc<dyn Subscriber>) {
        self.subscribers.push(subscriber);
    }

    pub fn subscribers(&self) -> &[Arc<dyn Subscriber>] {
        &self.subscribers
    }

    /// Attempts delivery of `event` to every subscriber registered for its
    /// topic. Each delivery runs on its own task under `deadline`; this
    /// method does not block on delivery completion — it is the "dispatch
    /// asynchronously" half of the handler's publish step. No ordering is
    /// guaranteed across the returned deliveries.
    pub fn publish(&self, event: Event, deadline: Duration) {
        for subscriber in &self.subscribers {
            if !subscriber.topics().contains(&event.topic) {
                continue;
            }
            let subscriber = Arc::clone(subscriber);
            let event = event.clone();
            let retry = self.retry;
            tokio::spawn(async move {
                deliver_with_retry(subscriber, event, retry, deadline).await;
            });
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Retries `subscriber.handle(event)` with exponential backoff
/// (`base_delay * 2^attempt`) until it succeeds, `max_attempts` is
/// exhausted, or `deadline` elapses. The outcome is logged and discarded —
/// there is no dead-letter storage, matching the bus's observable contract.
async fn deliver_with_retry(
    subscriber: Arc<dyn Subscriber>,
    event: Event,
    retry: RetryConfig,
    deadline: Duration,
) {
    let topic = format!("{}.{}", event.topic, subscriber.name());
    let attempts = async {
        let mut attempt: u32 = 0;
        loop {
            match subscriber.handle(&event).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    attempt += 1;
                    if attempt >= retry.max_attempts {
                        return Err(err);
                    }
                    let delay = retry.base_delay * 2u32.saturating_pow(attempt.min(20));
                    tracing::warn!(topic = %topic, attempt, %err, "subscriber delivery failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    };

    match tokio::time::timeout(deadline, attempts).await {
        Ok(Ok(())) => tracing::debug!(topic = %topic, "event delivered"),
        Ok(Err(err)) => tracing::error!(topic = %topic, %err, "subscriber delivery exhausted retries"),
        Err(_) => tracing::warn!(topic = %topic, "subscriber delivery canceled at deadline"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSubscriber {
        name: &'static str,
        topics: &'static [&'static str],
        calls: Arc<AtomicUsize>,
        fail_times: usize,
    }

    #[async_trait]
    impl Subscriber for CountingSubscriber {
        fn name(&self) -> &str {
            self.name
        }

        fn topics(&self) -> &[&str] {
            self.topics
        }

        async fn handle(&self, _event: &Event) -> Result<(), BusError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                return Err(BusError::Handler("transient".into()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn publish_reaches_only_matching_subscribers() {
        let calls_pos = Arc::new(AtomicUsize::new(0));
        let calls_close = Arc::new(AtomicUsize::new(0));
        let mut bus = EventBus::with_retry(RetryConfig { max_attempts: 3, base_delay: Duration::from_millis(1) });
        bus.register(Arc::new(CountingSubscriber {
            name: "sink",
            topics: &[TOPIC_POSITION_RECEIVED],
            calls: calls_pos.clone(),
            fail_times: 0,
        }));
        bus.register(Arc::new(CountingSubscriber {
            name: "lifecycle",
            topics: &[TOPIC_CLOSE_CONNECTION],
            calls: calls_close.clone(),
            fail_times: 0,
        }));

        let position = Position::new("egts", "42", crate::position::Location::xy(37.6, 55.7, true));
        bus.publish(Event::position(position), Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(calls_pos.load(Ordering::SeqCst), 1);
        assert_eq!(calls_close.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn retries_until_success_within_deadline() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut bus = EventBus::with_retry(RetryConfig { max_attempts: 5, base_delay: Duration::from_millis(1) });
        bus.register(Arc::new(CountingSubscriber {
            name: "flaky",
            topics: &[TOPIC_POSITION_RECEIVED],
            calls: calls.clone(),
            fail_times: 2,
        }));

        let position = Position::new("egts", "42", crate::position::Location::xy(0.0, 0.0, true));
        bus.publish(Event::position(position), Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
