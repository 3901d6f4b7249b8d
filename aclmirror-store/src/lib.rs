//! SQLite mirror cache for aclmirror.
//!
//! Holds the last known snapshot of the remote workspace's principal groups
//! and containers. The cache is authoritative for nothing: it is rebuilt by a
//! full reconcile and kept fresh by push events, and read by the UI layer.

mod error;
mod mirror_store;

pub use error::{StoreError, StoreResult};
pub use mirror_store::{MirrorStore, ReplaceStats};
