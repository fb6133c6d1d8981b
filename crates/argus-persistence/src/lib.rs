//! On-disk snapshots for ARGUS.
//!
//! Two small files survive a restart:
//! - the per-source tracking snapshot (cursors + dedup rings), so pollers
//!   replay a minimal window of duplicates after a restart
//! - the opaque provider credential snapshot, loaded read-only at startup
//!
//! Both are JSON written atomically (tmp file + rename); partial writes
//! never corrupt the previous snapshot.

pub mod credentials;
pub mod error;
pub mod snapshot;

pub use credentials::CredentialStore;
pub use error::{PersistenceError, PersistenceResult};
pub use snapshot::{SnapshotFile, SourceSnapshot};
