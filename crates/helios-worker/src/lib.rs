//! Library half of the worker binary, split out so integration tests
//! can drive the per-job protocol against `executor::FakeRuntime` and
//! `helios_broker`'s fakes without a Docker daemon or Redis.

pub mod config;
pub mod executor;
pub mod job;
