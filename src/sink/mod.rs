// ABOUTME: Optional relational Subscriber implementations consuming Position events
// ABOUTME: Feature-gated behind `postgres-sink` since it pulls in sqlx and a live database dependency

#[cfg(feature = "postgres-sink")]
mod postgres;

#[cfg(feature = "postgres-sink")]
pub use postgres::{PostgresSink, SinkError};
