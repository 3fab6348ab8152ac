//! Entitlement Mutator
//!
//! State-changing calls against the remote store. Success invalidates the
//! user's cache entry; failure is reported once through the notification
//! sink and never retried here, since a replayed credit write could charge
//! the user twice.

use std::sync::Arc;

use crate::cache::EntitlementCache;
use crate::model::{PlanId, SubscriptionPayload, UserId};
use crate::notify::{Notification, NotificationSink};
use crate::store::RemoteStore;
use crate::{EntitlementError, EntitlementResult};

/// Entitlement mutator
pub struct EntitlementMutator {
    cache: Arc<EntitlementCache>,
    store: Arc<dyn RemoteStore>,
    notifier: Arc<dyn NotificationSink>,
}

impl EntitlementMutator {
    /// Mutator writing to `store` and invalidating `cache`
    pub fn new(
        cache: Arc<EntitlementCache>,
        store: Arc<dyn RemoteStore>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            cache,
            store,
            notifier,
        }
    }

    /// Overwrite the user's credit count.
    ///
    /// `credits` is trusted as given; callers are responsible for checking it
    /// against the current snapshot first.
    pub async fn set_credits(&self, user_id: Option<&UserId>, credits: u32) -> EntitlementResult<()> {
        let user_id = self.require_user(user_id, "Could not update credits")?;

        tracing::info!(user = %user_id, credits, "updating credits");

        match self.store.update_credits(user_id, credits).await {
            Ok(()) => {
                self.cache.invalidate(user_id);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(user = %user_id, error = %e, "credit update failed");
                self.report("Could not update credits", &e);
                Err(e)
            }
        }
    }

    /// Start a subscription and hand the processor's payload back to the caller
    pub async fn create_subscription(
        &self,
        user_id: Option<&UserId>,
        plan_id: &PlanId,
    ) -> EntitlementResult<SubscriptionPayload> {
        let user_id = self.require_user(user_id, "Could not create subscription")?;

        tracing::info!(user = %user_id, plan = %plan_id, "creating subscription");

        match self.store.create_subscription(user_id, plan_id).await {
            Ok(payload) => {
                self.cache.invalidate(user_id);
                Ok(payload)
            }
            Err(e) => {
                tracing::warn!(user = %user_id, plan = %plan_id, error = %e, "subscription failed");
                self.report("Could not create subscription", &e);
                Err(e)
            }
        }
    }

    fn require_user<'a>(
        &self,
        user_id: Option<&'a UserId>,
        title: &str,
    ) -> EntitlementResult<&'a UserId> {
        user_id.ok_or_else(|| {
            let e = EntitlementError::Unauthenticated;
            self.report(title, &e);
            e
        })
    }

    fn report(&self, title: &str, error: &EntitlementError) {
        self.notifier
            .notify(Notification::destructive(title, error.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntitlementSnapshot, SubscriptionStatus, SubscriptionTier};
    use crate::notify::{RecordingNotifier, Severity};
    use crate::store::InMemoryStore;

    struct Fixture {
        store: Arc<InMemoryStore>,
        cache: Arc<EntitlementCache>,
        notifier: Arc<RecordingNotifier>,
        mutator: EntitlementMutator,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        store.insert(EntitlementSnapshot {
            credits: 3,
            ..EntitlementSnapshot::free(user("u1"))
        });
        let cache = Arc::new(EntitlementCache::new(store.clone()));
        let notifier = Arc::new(RecordingNotifier::new());
        let mutator = EntitlementMutator::new(cache.clone(), store.clone(), notifier.clone());
        Fixture {
            store,
            cache,
            notifier,
            mutator,
        }
    }

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    #[tokio::test]
    async fn test_set_credits_invalidates() {
        let f = fixture();
        let u1 = user("u1");
        f.cache.get(Some(&u1)).await.unwrap();

        f.mutator.set_credits(Some(&u1), 7).await.unwrap();

        assert_eq!(f.store.updates(), vec![(u1.clone(), 7)]);
        assert!(f.cache.is_stale(&u1));
        assert!(f.notifier.is_empty());

        let refreshed = f.cache.get(Some(&u1)).await.unwrap().unwrap();
        assert_eq!(refreshed.credits, 7);
        assert_eq!(f.store.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_unauthenticated_makes_no_call() {
        let f = fixture();

        let result = f.mutator.set_credits(None, 1).await;
        assert_eq!(result, Err(EntitlementError::Unauthenticated));

        let result = f
            .mutator
            .create_subscription(None, &PlanId::new("pro").unwrap())
            .await;
        assert_eq!(result, Err(EntitlementError::Unauthenticated));

        assert_eq!(f.store.update_count(), 0);
        assert_eq!(f.store.subscription_count(), 0);
        assert_eq!(f.notifier.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_update_notifies_and_keeps_cache() {
        let f = fixture();
        let u1 = user("u1");
        f.cache.get(Some(&u1)).await.unwrap();
        f.store
            .fail_next_update(EntitlementError::Remote("credits locked".into()));

        let result = f.mutator.set_credits(Some(&u1), 2).await;
        assert!(result.is_err());

        let notes = f.notifier.notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].severity, Severity::Destructive);
        assert!(notes[0].description.contains("credits locked"));

        assert!(!f.cache.is_stale(&u1));
        assert_eq!(f.store.update_count(), 1);
    }

    #[tokio::test]
    async fn test_subscription_invalidates_exactly_once() {
        let f = fixture();
        let u1 = user("u1");
        f.cache.get(Some(&u1)).await.unwrap();
        let before = f.store.fetch_count();

        let payload = f
            .mutator
            .create_subscription(Some(&u1), &PlanId::new("enterprise").unwrap())
            .await
            .unwrap();
        assert!(payload.subscription_id.is_some());
        assert_eq!(f.store.fetch_count(), before);

        let snapshot = f.cache.get(Some(&u1)).await.unwrap().unwrap();
        assert_eq!(f.store.fetch_count(), before + 1);
        assert_eq!(snapshot.subscription_tier, SubscriptionTier::Enterprise);
        assert_eq!(snapshot.subscription_status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn test_failed_subscription_is_not_retried() {
        let f = fixture();
        f.store
            .fail_next_subscription(EntitlementError::Remote("card declined".into()));

        let result = f
            .mutator
            .create_subscription(Some(&user("u1")), &PlanId::new("pro").unwrap())
            .await;

        assert!(result.is_err());
        assert_eq!(f.store.subscription_count(), 1);
        assert_eq!(f.notifier.len(), 1);
        assert!(f.notifier.notifications()[0].description.contains("card declined"));
    }
}
