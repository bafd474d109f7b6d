//! Swapdesk: quote-and-order lifecycle engine for an exchange storefront.
//!
//! [`SwapDesk`] bundles the currency catalog, quote negotiator, rate-lock
//! store, address validator, order submitter and status tracker. Build it
//! from an [`AppConfig`](swapdesk_config::AppConfig) with
//! [`SwapDesk::from_config`], or from injected parts with
//! [`SwapDesk::builder`].

mod desk;
mod error;
pub mod telemetry;

pub use desk::{negotiator_config, provider_settings, tracker_config, SwapDesk, SwapDeskBuilder};
pub use error::SwapDeskError;

pub use swapdesk_config as config;
pub use swapdesk_order::{
    AnonymousSession, SessionContext, StaticSession, StatusSubscription, StatusUpdate,
};
pub use swapdesk_provider as provider;
pub use swapdesk_types as types;
