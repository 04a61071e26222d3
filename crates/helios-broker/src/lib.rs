//! Coordination-substrate clients for Helios: the two-priority job
//! queue, the per-task log pub/sub, and the task status store.
//!
//! Each concern is a trait with a Redis-backed implementation and an
//! in-memory fake for tests, so the manager and worker never hardcode
//! a specific broker.

pub mod config;
pub mod fake;
pub mod pubsub;
pub mod queue;
pub mod status_store;

pub use config::RedisConfig;
pub use pubsub::{LogPublisher, LogSubscriber, LogStream};
pub use queue::{JobQueue, Lease};
pub use status_store::StatusStore;
