//! Authoritative in-memory notification store.
//!
//! All mutations flow through a single-writer actor task, which makes store
//! appends linearizable without locks on the hot path. Readers get
//! consistent snapshots through the handle. Every mutation emits a
//! `MutationEvent` on a broadcast channel so the delivery fan-out can
//! reconcile connected clients.

pub mod error;
pub mod store;

pub use error::{Result, StoreError};
pub use store::{
    spawn_store, AppendOutcome, ListQuery, StoreConfig, StoreHandle, StoreStats,
};
