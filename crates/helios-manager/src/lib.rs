//! Library half of the manager binary, split out so integration tests
//! can build an `http::router` over `helios_broker`'s fakes without a
//! real Redis.

pub mod config;
pub mod fanout;
pub mod http;
pub mod staging;
pub mod state;
