//! Address validation, order submission and status tracking

pub mod address;
pub mod session;
pub mod submit;
pub mod tracker;

pub use address::AddressValidator;
pub use session::{AnonymousSession, SessionContext, StaticSession};
pub use submit::OrderSubmitter;
pub use tracker::{StatusSubscription, StatusTracker, StatusUpdate, TrackerConfig};
