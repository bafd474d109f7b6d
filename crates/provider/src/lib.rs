//! Outbound gateway to the exchange provider.
//!
//! [`ExchangeProvider`] is the seam the rest of the engine programs against.
//! [`HttpProvider`] speaks the gateway's JSON API; [`MockProvider`] is a
//! scripted stand-in for tests.

pub mod envelope;
pub mod error;
pub mod http;
pub mod mock;
pub mod traits;

pub use envelope::Envelope;
pub use error::*;
pub use http::{HttpProvider, ProviderSettings};
pub use mock::{Endpoint, MockProvider};
pub use traits::*;
