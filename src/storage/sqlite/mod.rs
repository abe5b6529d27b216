//! `SQLite` storage adapter.
//!
//! ## Module Structure
//!
//! - [`connection`]: Connection handling (`Mutex<Connection>`, lock acquisition, configuration)
//! - [`schema`]: Type hierarchy and table naming
//! - [`metrics`]: Per-operation metrics recording
//! - [`store`]: [`SqliteVersionStore`], the [`VersionStore`](crate::storage::VersionStore) implementation

mod connection;
mod metrics;
mod schema;
mod store;

pub use connection::{BUSY_TIMEOUT_MS, acquire_lock, configure_connection};
pub use metrics::record_operation_metrics;
pub use schema::{LIVE_SUFFIX, TYPES_TABLE, TypeSchema, VERSIONS_SUFFIX, is_valid_identifier};
pub use store::SqliteVersionStore;
