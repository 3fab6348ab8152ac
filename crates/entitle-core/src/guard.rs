//! Guarded Decrement Protocol
//!
//! The single entry point for consuming one credit:
//!
//! ```text
//! Idle ─► Checking ─┬─► Denied (no user / no snapshot)
//!                   ├─► Denied (no credits)        no remote call
//!                   └─► Requesting ─┬─► Granted    cache invalidated
//!                                   └─► Failed     nothing assumed
//! ```
//!
//! The local check only rejects obviously invalid attempts. The remote store
//! remains the authority on the floor at zero.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::cache::EntitlementCache;
use crate::model::UserId;
use crate::mutator::EntitlementMutator;
use crate::notify::{Notification, NotificationSink};
use crate::EntitlementError;

/// Terminal state of one decrement attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecrementOutcome {
    /// Credit consumed
    Granted {
        /// Credit count written to the store
        remaining: u32,
    },
    /// No signed-in user
    NoUser,
    /// No snapshot could be read for the user
    NoSnapshot,
    /// Snapshot shows zero credits
    NoCredits,
    /// Reading or writing the remote store failed
    Failed(EntitlementError),
}

impl DecrementOutcome {
    /// Whether a credit was consumed
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }
}

/// Claim on a user's decrement lock. Dropping it releases the map entry once
/// no other caller holds the lock, whether the attempt finished or was
/// abandoned mid-await.
struct InFlight<'a> {
    map: &'a DashMap<UserId, Arc<Mutex<()>>>,
    user_id: UserId,
    lock: Arc<Mutex<()>>,
}

impl<'a> InFlight<'a> {
    fn claim(map: &'a DashMap<UserId, Arc<Mutex<()>>>, user_id: &UserId) -> Self {
        let lock = map.entry(user_id.clone()).or_default().clone();
        Self {
            map,
            user_id: user_id.clone(),
            lock,
        }
    }

    fn lock(&self) -> &Mutex<()> {
        &self.lock
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        // The map's handle and ours are the only ones left
        self.map.remove_if(&self.user_id, |_, lock| {
            Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2
        });
    }
}

/// Read-check-write guard around credit consumption
pub struct GuardedDecrement {
    cache: Arc<EntitlementCache>,
    mutator: Arc<EntitlementMutator>,
    notifier: Arc<dyn NotificationSink>,
    /// Serialises read-check-write per user so a second caller sees the
    /// first caller's invalidation.
    in_flight: DashMap<UserId, Arc<Mutex<()>>>,
}

impl GuardedDecrement {
    /// Guard reading through `cache` and writing through `mutator`
    pub fn new(
        cache: Arc<EntitlementCache>,
        mutator: Arc<EntitlementMutator>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            cache,
            mutator,
            notifier,
            in_flight: DashMap::new(),
        }
    }

    /// Consume one credit for `user_id` if the cached snapshot allows it
    pub async fn decrement(&self, user_id: Option<&UserId>) -> DecrementOutcome {
        let Some(user_id) = user_id else {
            tracing::debug!("decrement refused: no user");
            return DecrementOutcome::NoUser;
        };

        let slot = InFlight::claim(&self.in_flight, user_id);
        let _held = slot.lock().lock().await;
        self.check_and_consume(user_id).await
    }

    async fn check_and_consume(&self, user_id: &UserId) -> DecrementOutcome {
        let snapshot = match self.cache.get(Some(user_id)).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return DecrementOutcome::NoSnapshot,
            Err(e) => {
                self.notifier.notify(Notification::destructive(
                    "Could not check credits",
                    e.to_string(),
                ));
                return DecrementOutcome::Failed(e);
            }
        };

        if snapshot.credits == 0 {
            tracing::info!(user = %user_id, "decrement refused: no credits remaining");
            self.notifier.notify(Notification::destructive(
                "No credits remaining",
                "You have used all of your credits. Upgrade your plan to continue.",
            ));
            return DecrementOutcome::NoCredits;
        }

        let remaining = snapshot.credits - 1;
        match self.mutator.set_credits(Some(user_id), remaining).await {
            Ok(()) => {
                tracing::info!(user = %user_id, remaining, "credit consumed");
                DecrementOutcome::Granted { remaining }
            }
            // The mutator has already notified
            Err(e) => DecrementOutcome::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntitlementSnapshot, SubscriptionStatus, SubscriptionTier};
    use crate::notify::{RecordingNotifier, Severity};
    use crate::store::InMemoryStore;
    use std::time::Duration;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn guard_over(
        store: Arc<InMemoryStore>,
    ) -> (Arc<GuardedDecrement>, Arc<EntitlementCache>, Arc<RecordingNotifier>) {
        let cache = Arc::new(EntitlementCache::new(store.clone()));
        let notifier = Arc::new(RecordingNotifier::new());
        let mutator = Arc::new(EntitlementMutator::new(
            cache.clone(),
            store,
            notifier.clone(),
        ));
        let guard = Arc::new(GuardedDecrement::new(cache.clone(), mutator, notifier.clone()));
        (guard, cache, notifier)
    }

    fn store_with(credits: u32) -> Arc<InMemoryStore> {
        let store = InMemoryStore::new();
        store.insert(EntitlementSnapshot {
            user_id: user("u1"),
            credits,
            active: true,
            subscription_tier: SubscriptionTier::Pro,
            subscription_status: SubscriptionStatus::Active,
        });
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_grants_and_writes_n_minus_one() {
        let store = store_with(3);
        let (guard, cache, notifier) = guard_over(store.clone());

        let outcome = guard.decrement(Some(&user("u1"))).await;

        assert_eq!(outcome, DecrementOutcome::Granted { remaining: 2 });
        assert_eq!(store.updates(), vec![(user("u1"), 2)]);
        assert!(cache.is_stale(&user("u1")));
        assert!(notifier.is_empty());
    }

    #[tokio::test]
    async fn test_zero_credits_denied_without_remote_write() {
        let store = store_with(0);
        let (guard, _, notifier) = guard_over(store.clone());

        let outcome = guard.decrement(Some(&user("u1"))).await;

        assert_eq!(outcome, DecrementOutcome::NoCredits);
        assert_eq!(store.update_count(), 0);
        let notes = notifier.notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].severity, Severity::Destructive);
    }

    #[tokio::test]
    async fn test_no_user_is_silent() {
        let store = store_with(3);
        let (guard, _, notifier) = guard_over(store.clone());

        assert_eq!(guard.decrement(None).await, DecrementOutcome::NoUser);
        assert_eq!(store.fetch_count(), 0);
        assert_eq!(store.update_count(), 0);
        assert!(notifier.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_fails_closed() {
        let store = store_with(3);
        store.fail_next_fetch(EntitlementError::Network("offline".into()));
        let (guard, _, notifier) = guard_over(store.clone());

        let outcome = guard.decrement(Some(&user("u1"))).await;

        assert!(matches!(outcome, DecrementOutcome::Failed(EntitlementError::Network(_))));
        assert_eq!(store.update_count(), 0);
        assert_eq!(notifier.len(), 1);
    }

    #[tokio::test]
    async fn test_write_failure_notifies_once() {
        let store = store_with(3);
        store.fail_next_update(EntitlementError::Remote("conflict".into()));
        let (guard, cache, notifier) = guard_over(store.clone());

        let outcome = guard.decrement(Some(&user("u1"))).await;

        assert!(!outcome.is_granted());
        assert_eq!(notifier.len(), 1);
        assert!(notifier.notifications()[0].description.contains("conflict"));
        assert!(!cache.is_stale(&user("u1")));
        assert_eq!(cache.peek(&user("u1")).unwrap().credits, 3);
    }

    #[tokio::test]
    async fn test_concurrent_decrements_do_not_overspend() {
        let store = Arc::new(
            InMemoryStore::new().with_latency(Duration::from_millis(20)),
        );
        store.insert(EntitlementSnapshot {
            credits: 1,
            ..EntitlementSnapshot::free(user("u1"))
        });
        let (guard, _, _) = guard_over(store.clone());

        let u1 = user("u1");
        let (a, b) = tokio::join!(guard.decrement(Some(&u1)), guard.decrement(Some(&u1)));

        let granted = [a, b].iter().filter(|o| o.is_granted()).count();
        assert_eq!(granted, 1);
        assert_eq!(store.updates(), vec![(u1.clone(), 0)]);
        assert!(guard.in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_decrements_release_locks() {
        let store = Arc::new(
            InMemoryStore::new().with_latency(Duration::from_millis(100)),
        );
        let (guard, _, _) = guard_over(store.clone());

        for i in 0..5 {
            let u = user(&format!("u{i}"));
            let attempt =
                tokio::time::timeout(Duration::from_millis(5), guard.decrement(Some(&u))).await;
            assert!(attempt.is_err());
        }

        assert!(guard.in_flight.is_empty());
        assert_eq!(store.update_count(), 0);
    }
}
