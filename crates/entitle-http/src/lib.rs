//! HTTP remote store
//!
//! Speaks JSON to the entitlement service:
//!
//! ```text
//! GET  {base}/users/{id}/entitlement     -> EntitlementSnapshot
//! PUT  {base}/users/{id}/credits         {"credits": n}
//! POST {base}/users/{id}/subscriptions   {"planId": "..."} -> SubscriptionPayload
//! ```
//!
//! Requests are sent once. Retrying is left to the user, since replaying a
//! credit write could spend a credit twice.

#![warn(missing_docs)]

pub mod client;
pub mod config;

pub use client::HttpEntitlementStore;
pub use config::HttpStoreConfig;
