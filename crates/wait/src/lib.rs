//! Completion polling for dispatched futures.
//!
//! Given a collection of [`CallHandle`]s, the [`WaitEngine`] decides which
//! are done using a two-phase probe per round: a cheap bulk listing of the
//! callsets involved, then bounded, shuffled direct status reads for the
//! rest. Three return policies are supported; see [`WaitMode`].
//!
//! [`CallHandle`]: fanout_core::CallHandle

mod engine;

pub use engine::{WaitEngine, WaitMode};
