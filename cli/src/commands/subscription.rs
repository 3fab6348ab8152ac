//! Subscription commands

use entitle_core::{EntitlementSession, PlanId, SubscriptionPayload};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{AlreadyReported, OutputFormat};

#[derive(Debug, Serialize, Tabled)]
pub struct SubscriptionView {
    pub subscription: String,
    pub client_secret: String,
    pub status: String,
    pub tier: String,
}

impl SubscriptionView {
    fn new(payload: SubscriptionPayload, session: &EntitlementSession) -> Self {
        let unset = || "-".to_string();
        Self {
            subscription: payload.subscription_id.unwrap_or_else(unset),
            client_secret: payload.client_secret.unwrap_or_else(unset),
            status: payload.status.unwrap_or_else(unset),
            tier: session.subscription_tier().to_string(),
        }
    }
}

pub async fn subscribe(
    session: &EntitlementSession,
    plan: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let plan_id = PlanId::new(plan)?;
    let payload = session
        .create_subscription(&plan_id)
        .await
        .map_err(|e| AlreadyReported(e.to_string()))?;
    format.print(&SubscriptionView::new(payload, session))
}
