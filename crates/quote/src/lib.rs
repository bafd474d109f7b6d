//! Currency catalog and quote negotiation

pub mod bounds;
pub mod catalog;
pub mod negotiator;

pub use bounds::BoundsCache;
pub use catalog::{resolve_catalog, CurrencyCatalog};
pub use negotiator::{NegotiatorConfig, QuoteNegotiator};
