//! Core domain types, errors, and constants for the fanout dispatch system.
//!
//! Everything the client-side crates (invoker, wait engine) and the remote
//! handler agree on lives here: call identifiers, the dispatch payload wire
//! shape, the status record a handler writes, the client-side future state
//! machine, and the `StatusStore` seam both sides coordinate through.
//!
//! ## Key Components
//!
//! - **`errors`**: the primary `Error` enum and `Result` alias, centralizing
//!   all failure modes across the workspace.
//! - **`types`**: call/callset identifiers, the dispatch `Payload`, and the
//!   runtime artifact descriptor.
//! - **`status`**: the write-once `StatusRecord` and its tagged `Outcome`.
//! - **`future`**: the `CallFuture` state machine and its shared handle.
//! - **`store`**: the `StatusStore` trait the dispatch and execution sides
//!   coordinate through.

pub mod constants;
pub mod errors;
pub mod future;
pub mod status;
pub mod store;
pub mod types;

pub use self::{
    constants::*,
    errors::{Error, Result},
    future::{CallFuture, CallHandle, JobState, LifecycleTimestamps},
    status::{FailureKind, Outcome, ServerInfo, StatusRecord},
    store::{LocalExecutor, StatusStore},
    types::{unix_now, BackendConfig, CallId, CallsetId, InvocationKind, Payload, RuntimeDescriptor},
};
