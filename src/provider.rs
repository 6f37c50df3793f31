//! Provider-facing strategies (behavior).
//!
//! `strategy` defines [`ProviderStrategy`], the hook the broker uses to decorate outgoing
//! authorization requests and to map provider `error` codes into renewal outcomes that either
//! stay with the caller or escalate to interactive login.

pub mod strategy;

pub use strategy::*;
