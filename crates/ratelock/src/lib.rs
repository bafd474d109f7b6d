//! Rate-lock persistence for the fixed-rate flow

pub mod error;
pub mod rate_lock;
pub mod sqlite_store;
pub mod store;

pub use error::*;
pub use rate_lock::RateLockStore;
pub use sqlite_store::SqliteLockRepository;
pub use store::{InMemoryLockRepository, LockRepository};
