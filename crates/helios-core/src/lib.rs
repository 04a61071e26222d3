//! Shared types for the Helios remote-execution platform.
//!
//! This crate has no I/O of its own: it is the vocabulary that the
//! manager, the worker, and the broker client all speak, so that a
//! `TaskDescriptor` serialized by one process deserializes identically
//! in another.

pub mod error;
pub mod path_safety;
pub mod resources;
pub mod signal;
pub mod status;
pub mod task;
pub mod wire;

pub use error::{AdmissionError, ExecutionError};
pub use path_safety::safe_relative_path;
pub use resources::{RawResources, Resources};
pub use signal::TerminalMarker;
pub use status::TaskStatus;
pub use task::{Priority, TaskDescriptor, TaskId};
