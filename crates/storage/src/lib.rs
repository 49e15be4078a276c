//! Status store implementations.
//!
//! The [`StatusStore`] trait itself lives in `fanout-core`; this crate
//! provides the concrete stores a client process can be constructed with:
//! a directory-backed [`LocalStore`] and an in-memory [`MemoryStore`] whose
//! bulk listing can be made to lag for eventual-consistency tests.

mod local;
mod memory;

pub use local::LocalStore;
pub use memory::MemoryStore;

pub use fanout_core::store::StatusStore;
