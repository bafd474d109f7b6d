//! Core types for the Swapdesk quote-and-order engine
//!
//! Everything here is plain data: currencies, quote requests and results,
//! rate locks, orders and their status machine, address validations, and the
//! error taxonomy shared by every other crate in the workspace.

pub mod address;
pub mod currency;
pub mod error;
pub mod lock;
pub mod order;
pub mod quote;

pub use address::*;
pub use currency::*;
pub use error::*;
pub use lock::*;
pub use order::*;
pub use quote::*;
