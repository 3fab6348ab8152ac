//! Remote Store - Boundary to the authoritative entitlement service
//!
//! The store is the source of truth for credits and subscription state.
//! Everything on the client side is a possibly-stale copy of it.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::model::*;
use crate::{EntitlementError, EntitlementResult};

/// Remote entitlement store
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the current snapshot for a user
    async fn fetch_entitlement(&self, user_id: &UserId) -> EntitlementResult<EntitlementSnapshot>;

    /// Overwrite the user's credit count
    async fn update_credits(&self, user_id: &UserId, credits: u32) -> EntitlementResult<()>;

    /// Start a subscription for a plan through the payment processor
    async fn create_subscription(
        &self,
        user_id: &UserId,
        plan_id: &PlanId,
    ) -> EntitlementResult<SubscriptionPayload>;
}

/// In-memory store (for testing and development)
pub struct InMemoryStore {
    snapshots: RwLock<HashMap<UserId, EntitlementSnapshot>>,
    latency: Option<Duration>,
    fetches: AtomicU64,
    updates: AtomicU64,
    subscriptions: AtomicU64,
    update_log: Mutex<Vec<(UserId, u32)>>,
    next_fetch_error: Mutex<Option<EntitlementError>>,
    next_update_error: Mutex<Option<EntitlementError>>,
    next_subscription_error: Mutex<Option<EntitlementError>>,
}

impl InMemoryStore {
    /// Empty store with no latency
    pub fn new() -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
            latency: None,
            fetches: AtomicU64::new(0),
            updates: AtomicU64::new(0),
            subscriptions: AtomicU64::new(0),
            update_log: Mutex::new(Vec::new()),
            next_fetch_error: Mutex::new(None),
            next_update_error: Mutex::new(None),
            next_subscription_error: Mutex::new(None),
        }
    }

    /// Delay every call, so concurrent callers interleave
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Seed or replace a user's snapshot
    pub fn insert(&self, snapshot: EntitlementSnapshot) {
        self.snapshots.write().insert(snapshot.user_id.clone(), snapshot);
    }

    /// Stored snapshot, bypassing the call counters
    pub fn stored(&self, user_id: &UserId) -> Option<EntitlementSnapshot> {
        self.snapshots.read().get(user_id).cloned()
    }

    /// Calls to `fetch_entitlement`, failed ones included
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Calls to `update_credits`
    pub fn update_count(&self) -> u64 {
        self.updates.load(Ordering::SeqCst)
    }

    /// Calls to `create_subscription`
    pub fn subscription_count(&self) -> u64 {
        self.subscriptions.load(Ordering::SeqCst)
    }

    /// Every `update_credits` call received, in order
    pub fn updates(&self) -> Vec<(UserId, u32)> {
        self.update_log.lock().clone()
    }

    /// Fail the next fetch with `error`
    pub fn fail_next_fetch(&self, error: EntitlementError) {
        *self.next_fetch_error.lock() = Some(error);
    }

    /// Fail the next credit update with `error`
    pub fn fail_next_update(&self, error: EntitlementError) {
        *self.next_update_error.lock() = Some(error);
    }

    /// Fail the next subscription creation with `error`
    pub fn fail_next_subscription(&self, error: EntitlementError) {
        *self.next_subscription_error.lock() = Some(error);
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn fetch_entitlement(&self, user_id: &UserId) -> EntitlementResult<EntitlementSnapshot> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if let Some(error) = self.next_fetch_error.lock().take() {
            return Err(error);
        }

        Ok(self
            .snapshots
            .read()
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| EntitlementSnapshot::free(user_id.clone())))
    }

    async fn update_credits(&self, user_id: &UserId, credits: u32) -> EntitlementResult<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.update_log.lock().push((user_id.clone(), credits));
        self.simulate_latency().await;

        if let Some(error) = self.next_update_error.lock().take() {
            return Err(error);
        }

        self.snapshots
            .write()
            .entry(user_id.clone())
            .or_insert_with(|| EntitlementSnapshot::free(user_id.clone()))
            .credits = credits;
        Ok(())
    }

    async fn create_subscription(
        &self,
        user_id: &UserId,
        plan_id: &PlanId,
    ) -> EntitlementResult<SubscriptionPayload> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if let Some(error) = self.next_subscription_error.lock().take() {
            return Err(error);
        }

        let tier: SubscriptionTier = plan_id
            .as_str()
            .parse()
            .map_err(|_| EntitlementError::Remote(format!("unknown plan: {}", plan_id)))?;

        let mut snapshots = self.snapshots.write();
        let snapshot = snapshots
            .entry(user_id.clone())
            .or_insert_with(|| EntitlementSnapshot::free(user_id.clone()));
        snapshot.subscription_tier = tier;
        snapshot.subscription_status = SubscriptionStatus::Active;
        snapshot.active = tier.is_paid();

        let id = uuid::Uuid::new_v4().simple().to_string();
        Ok(SubscriptionPayload {
            subscription_id: Some(format!("sub_{}", id)),
            client_secret: Some(format!("sub_{}_secret", id)),
            status: Some(SubscriptionStatus::Active.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_user_is_free() {
        let store = InMemoryStore::new();

        let snapshot = store.fetch_entitlement(&user("ghost")).await.unwrap();
        assert_eq!(snapshot, EntitlementSnapshot::free(user("ghost")));
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_scripted_failure_is_one_shot() {
        let store = InMemoryStore::new();
        store.fail_next_update(EntitlementError::Remote("boom".into()));

        assert!(store.update_credits(&user("u1"), 5).await.is_err());
        assert!(store.update_credits(&user("u1"), 5).await.is_ok());
        assert_eq!(store.update_count(), 2);
        assert_eq!(store.stored(&user("u1")).unwrap().credits, 5);
    }

    #[tokio::test]
    async fn test_subscription_upgrades_tier() {
        let store = InMemoryStore::new();

        let payload = store
            .create_subscription(&user("u1"), &PlanId::new("pro").unwrap())
            .await
            .unwrap();
        assert!(payload.client_secret.is_some());

        let stored = store.stored(&user("u1")).unwrap();
        assert_eq!(stored.subscription_tier, SubscriptionTier::Pro);
        assert_eq!(stored.subscription_status, SubscriptionStatus::Active);
        assert!(stored.active);
    }

    #[tokio::test]
    async fn test_unknown_plan_rejected() {
        let store = InMemoryStore::new();

        let result = store
            .create_subscription(&user("u1"), &PlanId::new("platinum").unwrap())
            .await;
        assert!(matches!(result, Err(EntitlementError::Remote(_))));
        assert!(store.stored(&user("u1")).is_none());
    }
}
