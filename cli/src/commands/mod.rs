//! CLI Commands

pub mod config;
pub mod credits;
pub mod subscription;

use std::sync::Arc;

use anyhow::Context;
use entitle_core::{EntitlementSession, UserId};
use entitle_http::{HttpEntitlementStore, HttpStoreConfig};

use crate::output::TerminalNotifier;

/// Where to connect and as whom
pub struct Target {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub user: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Open a session against the entitlement service and bind the user
pub async fn connect(target: &Target) -> anyhow::Result<EntitlementSession> {
    let mut store_config = HttpStoreConfig::default();
    if let Some(url) = &target.api_url {
        store_config.base_url = url.clone();
    }
    if let Some(secs) = target.timeout_secs {
        store_config.timeout_secs = secs;
    }
    store_config.api_key = target.api_key.clone();

    let store = HttpEntitlementStore::new(&store_config).context("configuring entitlement store")?;
    let session = EntitlementSession::new(Arc::new(store), Arc::new(TerminalNotifier));

    let user = UserId::parse_optional(target.user.as_deref());
    if user.is_none() {
        tracing::debug!("no user configured, running signed out");
    }
    if let Err(e) = session.set_user(user).await {
        // Surfaced through session.error(); commands decide how to report it
        tracing::warn!(error = %e, "initial entitlement read failed");
    }

    Ok(session)
}
