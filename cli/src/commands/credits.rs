//! Credit commands

use anyhow::bail;
use entitle_core::{DecrementOutcome, EntitlementSession};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{AlreadyReported, OutputFormat};

#[derive(Debug, Serialize, Tabled)]
pub struct StatusView {
    pub user: String,
    pub credits: u32,
    pub active: bool,
    pub tier: String,
    pub status: String,
}

impl StatusView {
    pub fn of(session: &EntitlementSession) -> Self {
        Self {
            user: session
                .user_id()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "(signed out)".into()),
            credits: session.credits(),
            active: session.has_active_subscription(),
            tier: session.subscription_tier().to_string(),
            status: session.subscription_status().to_string(),
        }
    }
}

pub fn status(session: &EntitlementSession, format: OutputFormat) -> anyhow::Result<()> {
    if let Some(e) = session.error() {
        bail!("could not load entitlements: {}", e);
    }
    format.print(&StatusView::of(session))
}

pub async fn consume(session: &EntitlementSession) -> anyhow::Result<()> {
    match session.try_decrement().await {
        DecrementOutcome::Granted { remaining } => {
            println!("Credit consumed, {} remaining", remaining);
            Ok(())
        }
        DecrementOutcome::NoUser => bail!("not signed in; pass --user or set user_id"),
        DecrementOutcome::NoSnapshot => bail!("no entitlement data available"),
        // Both were already notified by the guard or mutator
        DecrementOutcome::NoCredits => Err(AlreadyReported("no credits remaining".into()).into()),
        DecrementOutcome::Failed(e) => Err(AlreadyReported(e.to_string()).into()),
    }
}

pub async fn set(session: &EntitlementSession, credits: u32) -> anyhow::Result<()> {
    session
        .update_credits(credits)
        .await
        .map_err(|e| AlreadyReported(e.to_string()))?;
    println!("Credits set to {}", session.credits());
    Ok(())
}
