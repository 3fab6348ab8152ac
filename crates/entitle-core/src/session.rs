//! Entitlement Session - consumer-facing state for one signed-in identity

use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::cache::EntitlementCache;
use crate::guard::{DecrementOutcome, GuardedDecrement};
use crate::model::*;
use crate::mutator::EntitlementMutator;
use crate::notify::NotificationSink;
use crate::store::RemoteStore;
use crate::{EntitlementError, EntitlementResult};

/// Identity and the snapshot read for it live under one lock, so a snapshot
/// can only be stored while its owner is still the current user.
#[derive(Debug, Default)]
struct SessionState {
    user: Option<UserId>,
    snapshot: Option<EntitlementSnapshot>,
    error: Option<EntitlementError>,
}

/// Counts a read as in flight until dropped, including when the read's
/// future is abandoned mid-fetch.
struct Loading<'a>(&'a AtomicUsize);

impl<'a> Loading<'a> {
    fn start(pending: &'a AtomicUsize) -> Self {
        pending.fetch_add(1, Ordering::SeqCst);
        Self(pending)
    }
}

impl Drop for Loading<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Entitlement session
///
/// Holds the identity currently signed in and the last snapshot read for it.
/// Getters fall back to free-tier defaults while no snapshot is available.
pub struct EntitlementSession {
    cache: Arc<EntitlementCache>,
    mutator: Arc<EntitlementMutator>,
    guard: Arc<GuardedDecrement>,
    state: RwLock<SessionState>,
    pending: AtomicUsize,
}

impl EntitlementSession {
    /// Build the full stack over `store`, reporting failures to `notifier`
    pub fn new(store: Arc<dyn RemoteStore>, notifier: Arc<dyn NotificationSink>) -> Self {
        let cache = Arc::new(EntitlementCache::new(store.clone()));
        let mutator = Arc::new(EntitlementMutator::new(
            cache.clone(),
            store,
            notifier.clone(),
        ));
        let guard = Arc::new(GuardedDecrement::new(cache.clone(), mutator.clone(), notifier));
        Self::from_parts(cache, mutator, guard)
    }

    /// Build a session over layers shared with other consumers
    pub fn from_parts(
        cache: Arc<EntitlementCache>,
        mutator: Arc<EntitlementMutator>,
        guard: Arc<GuardedDecrement>,
    ) -> Self {
        Self {
            cache,
            mutator,
            guard,
            state: RwLock::new(SessionState::default()),
            pending: AtomicUsize::new(0),
        }
    }

    /// Currently signed-in user
    pub fn user_id(&self) -> Option<UserId> {
        self.state.read().user.clone()
    }

    /// Cache backing this session
    pub fn cache(&self) -> &Arc<EntitlementCache> {
        &self.cache
    }

    /// Last snapshot read for the current user
    pub fn snapshot(&self) -> Option<EntitlementSnapshot> {
        self.state.read().snapshot.clone()
    }

    /// Remaining credits, 0 without a snapshot
    pub fn credits(&self) -> u32 {
        self.state.read().snapshot.as_ref().map(|s| s.credits).unwrap_or(0)
    }

    /// Whether a paid subscription is in force
    pub fn has_active_subscription(&self) -> bool {
        self.state.read().snapshot.as_ref().map(|s| s.active).unwrap_or(false)
    }

    /// Current tier, free without a snapshot
    pub fn subscription_tier(&self) -> SubscriptionTier {
        self.state
            .read()
            .snapshot
            .as_ref()
            .map(|s| s.subscription_tier)
            .unwrap_or_default()
    }

    /// Current lifecycle status, free without a snapshot
    pub fn subscription_status(&self) -> SubscriptionStatus {
        self.state
            .read()
            .snapshot
            .as_ref()
            .map(|s| s.subscription_status)
            .unwrap_or_default()
    }

    /// A read from the store is in flight
    pub fn is_loading(&self) -> bool {
        self.pending.load(Ordering::SeqCst) > 0
    }

    /// Error from the most recent read, if it failed
    pub fn error(&self) -> Option<EntitlementError> {
        self.state.read().error.clone()
    }

    /// Switch identity. The previous identity's cache entry is evicted and
    /// the new one is invalidated then read. `None` signs out.
    pub async fn set_user(&self, user_id: Option<UserId>) -> EntitlementResult<()> {
        let previous = {
            let mut state = self.state.write();
            if state.user == user_id {
                return Ok(());
            }
            let previous = state.user.take();
            *state = SessionState {
                user: user_id.clone(),
                ..SessionState::default()
            };
            previous
        };

        if let Some(previous) = previous {
            tracing::info!(user = %previous, "signing out entitlement session");
            self.cache.evict(&previous);
        }

        match user_id {
            Some(user_id) => {
                tracing::info!(user = %user_id, "entitlement session bound");
                self.cache.invalidate(&user_id);
                self.refresh().await
            }
            None => Ok(()),
        }
    }

    /// Re-read the snapshot for the current identity.
    ///
    /// On failure the previous snapshot stays visible and `error()` is set.
    /// A result that arrives after the identity changed is dropped.
    pub async fn refresh(&self) -> EntitlementResult<()> {
        let Some(user_id) = self.user_id() else {
            return Ok(());
        };

        let result = {
            let _loading = Loading::start(&self.pending);
            self.cache.get(Some(&user_id)).await
        };

        let mut state = self.state.write();
        if state.user.as_ref() != Some(&user_id) {
            tracing::debug!(user = %user_id, "identity changed during refresh, discarding");
            return Ok(());
        }

        match result {
            Ok(snapshot) => {
                state.snapshot = snapshot;
                state.error = None;
                Ok(())
            }
            Err(e) => {
                state.error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Consume one credit; `true` only when the store accepted the decrement
    pub async fn decrement_credits(&self) -> bool {
        self.try_decrement().await.is_granted()
    }

    /// Consume one credit, reporting why it was refused
    pub async fn try_decrement(&self) -> DecrementOutcome {
        let user_id = self.user_id();
        let outcome = self.guard.decrement(user_id.as_ref()).await;
        if outcome.is_granted() {
            self.refresh_after_mutation().await;
        }
        outcome
    }

    /// Overwrite the credit count
    pub async fn update_credits(&self, credits: u32) -> EntitlementResult<()> {
        let user_id = self.user_id();
        self.mutator.set_credits(user_id.as_ref(), credits).await?;
        self.refresh_after_mutation().await;
        Ok(())
    }

    /// Start a subscription; the processor payload drives any follow-up flow
    pub async fn create_subscription(&self, plan_id: &PlanId) -> EntitlementResult<SubscriptionPayload> {
        let user_id = self.user_id();
        let payload = self
            .mutator
            .create_subscription(user_id.as_ref(), plan_id)
            .await?;
        self.refresh_after_mutation().await;
        Ok(payload)
    }

    async fn refresh_after_mutation(&self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "refresh after mutation failed");
        }
    }
}
