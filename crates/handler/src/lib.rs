//! The remote execution handler.
//!
//! Runs inside the compute backend, one instance per invocation. Given one
//! dispatched payload it stages the embedded modules, ensures the runtime
//! artifact is cached locally, executes the worker in a sandboxed process
//! group under a wall-clock budget, and writes exactly one status record on
//! every exit path. The status write is the handler's sole observable side
//! effect besides the artifact cache it leaves on disk.

pub mod artifact;
pub mod config;
pub mod exec;
pub mod handler;
pub mod local;
pub mod report;
pub mod staging;

pub use artifact::{ArtifactSource, HttpArtifactSource};
pub use config::HandlerConfig;
pub use handler::handle;
pub use local::LocalRunner;
