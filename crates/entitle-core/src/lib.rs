//! Entitle - Client-Side Entitlement Manager
//!
//! Tracks a user's subscription tier and consumable credits, and guards
//! every metered action behind a read-check-decrement protocol.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        ENTITLEMENT SESSION                              │
//! │   credits | tier | status | loading | error | decrement | subscribe     │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                  GUARDED DECREMENT PROTOCOL                      │  │
//! │  │   Idle ─► Checking ─► Denied | Requesting ─► Granted | Failed    │  │
//! │  └───────────────┬───────────────────────────────┬──────────────────┘  │
//! │                  │ read                          │ write               │
//! │  ┌───────────────▼──────────────┐  ┌─────────────▼──────────────────┐  │
//! │  │      ENTITLEMENT CACHE       │◄─┤     ENTITLEMENT MUTATOR        │  │
//! │  │  user_id ─► snapshot + stale │  │  set_credits | subscribe       │  │
//! │  └───────────────┬──────────────┘  └─────────────┬──────────────────┘  │
//! │                  │                               │                     │
//! │  ┌───────────────▼───────────────────────────────▼──────────────────┐  │
//! │  │                 REMOTE STORE (authoritative)                      │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod cache;
pub mod error;
pub mod guard;
pub mod model;
pub mod mutator;
pub mod notify;
pub mod session;
pub mod store;

pub use cache::EntitlementCache;
pub use error::{EntitlementError, EntitlementResult};
pub use guard::{DecrementOutcome, GuardedDecrement};
pub use model::{
    EntitlementSnapshot, PlanId, SubscriptionPayload, SubscriptionStatus, SubscriptionTier, UserId,
};
pub use mutator::EntitlementMutator;
pub use notify::{Notification, NotificationSink, RecordingNotifier, Severity, TracingNotifier};
pub use session::EntitlementSession;
pub use store::{InMemoryStore, RemoteStore};
