//! Remote synchronization plumbing.
//!
//! # Responsibility
//! - Encode/decode remote rows.
//! - Define the remote store contract.
//! - Queue local mutations until the remote acknowledges them.
//!
//! # Invariants
//! - Local state is the source of truth for reads; remote failures never roll
//!   back local mutations.

pub mod outbox;
pub mod remote;
pub mod row;

pub use outbox::{PendingOp, SyncOp, SyncOutbox};
pub use remote::{InMemoryRemoteStore, RemoteError, RemoteResult, RemoteStore};
pub use row::{decode_row, decode_rows, encode_row, RowDecodeError, TaskRow};
