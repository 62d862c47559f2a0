// ABOUTME: Persistence layer for worldlog, owning the single SQLite connection.
// ABOUTME: Exposes async insert/select operations serialized through an actor thread.

pub mod db;
pub mod shutdown;

pub use db::{Database, RegionQuery, StoreError};
pub use shutdown::ShutdownSignal;
