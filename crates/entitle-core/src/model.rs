//! Entitlement data model
//!
//! Snapshots are immutable copies of the authoritative remote state. They are
//! replaced wholesale after every refetch and never patched in place.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::EntitlementError;

/// User identifier
///
/// # Invariants
/// - Must be non-empty after trimming
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Create new user ID
    pub fn new(id: impl Into<String>) -> Result<Self, EntitlementError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(EntitlementError::Config("user id cannot be empty".into()));
        }
        Ok(Self(id))
    }

    /// Parse an optional raw identifier, treating empty input as absent
    pub fn parse_optional(raw: Option<&str>) -> Option<Self> {
        raw.and_then(|id| Self::new(id).ok())
    }

    /// Raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = EntitlementError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Plan identifier forwarded to the payment processor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlanId(String);

impl PlanId {
    /// Create new plan ID
    pub fn new(id: impl Into<String>) -> Result<Self, EntitlementError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(EntitlementError::Config("plan id cannot be empty".into()));
        }
        Ok(Self(id))
    }

    /// Raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PlanId {
    type Error = EntitlementError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PlanId> for String {
    fn from(id: PlanId) -> Self {
        id.0
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Subscription tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    /// No paid plan
    #[default]
    Free,
    /// Entry paid plan
    Starter,
    /// Pro plan
    Pro,
    /// Enterprise plan
    Enterprise,
}

impl SubscriptionTier {
    /// Wire name of the tier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Starter => "starter",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }

    /// Whether the tier is billed
    pub fn is_paid(&self) -> bool {
        !matches!(self, Self::Free)
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionTier {
    type Err = EntitlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "starter" => Ok(Self::Starter),
            "pro" => Ok(Self::Pro),
            "enterprise" => Ok(Self::Enterprise),
            other => Err(EntitlementError::Config(format!("unknown tier: {}", other))),
        }
    }
}

/// Subscription lifecycle status, independent of `active`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Never subscribed
    #[default]
    Free,
    /// Paid and current
    Active,
    /// In a trial period
    Trialing,
    /// Payment failed, grace period running
    PastDue,
    /// Canceled by the user
    Canceled,
    /// Payment failed and grace period over
    Unpaid,
}

impl SubscriptionStatus {
    /// Wire name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Unpaid => "unpaid",
        }
    }

    /// Paid and currently honoured
    pub fn is_in_good_standing(&self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last known subscription/credit state for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementSnapshot {
    /// Owner of this state
    pub user_id: UserId,
    /// Remaining credits
    #[serde(deserialize_with = "clamp_credits")]
    pub credits: u32,
    /// A paid subscription is in force
    #[serde(default)]
    pub active: bool,
    /// Plan level
    #[serde(default)]
    pub subscription_tier: SubscriptionTier,
    /// Billing lifecycle state
    #[serde(default)]
    pub subscription_status: SubscriptionStatus,
}

impl EntitlementSnapshot {
    /// Snapshot for a user with no subscription and no credits
    pub fn free(user_id: UserId) -> Self {
        Self {
            user_id,
            credits: 0,
            active: false,
            subscription_tier: SubscriptionTier::Free,
            subscription_status: SubscriptionStatus::Free,
        }
    }

    /// At least one credit left
    pub fn has_credits(&self) -> bool {
        self.credits > 0
    }
}

/// Negative counts from the wire read as zero; oversized counts saturate.
fn clamp_credits<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum WireCount {
        Unsigned(u64),
        Signed(i64),
        Float(f64),
    }

    Ok(match WireCount::deserialize(deserializer)? {
        WireCount::Unsigned(n) => u32::try_from(n).unwrap_or(u32::MAX),
        WireCount::Signed(n) => n.clamp(0, u32::MAX as i64) as u32,
        // `as` saturates and maps NaN to 0
        WireCount::Float(n) => n as u32,
    })
}

/// Processor response returned from subscription creation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPayload {
    /// Processor-side subscription id
    #[serde(default)]
    pub subscription_id: Option<String>,
    /// Secret for completing payment client-side
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Processor status string, passed through unparsed
    #[serde(default)]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_rejects_blank() {
        assert!(UserId::new("").is_err());
        assert!(UserId::new("   ").is_err());
        assert_eq!(UserId::new("u1").unwrap().as_str(), "u1");
        assert!(UserId::parse_optional(Some("")).is_none());
        assert!(UserId::parse_optional(None).is_none());
    }

    #[test]
    fn test_snapshot_wire_format() {
        let json = r#"{
            "userId": "u1",
            "credits": 3,
            "active": true,
            "subscriptionTier": "pro",
            "subscriptionStatus": "past_due"
        }"#;
        let snapshot: EntitlementSnapshot = serde_json::from_str(json).unwrap();

        assert_eq!(snapshot.user_id.as_str(), "u1");
        assert_eq!(snapshot.credits, 3);
        assert!(snapshot.active);
        assert_eq!(snapshot.subscription_tier, SubscriptionTier::Pro);
        assert_eq!(snapshot.subscription_status, SubscriptionStatus::PastDue);
    }

    #[test]
    fn test_negative_credits_clamped() {
        let json = r#"{"userId": "u1", "credits": -4}"#;
        let snapshot: EntitlementSnapshot = serde_json::from_str(json).unwrap();

        assert_eq!(snapshot.credits, 0);
        assert!(!snapshot.has_credits());
        assert_eq!(snapshot.subscription_tier, SubscriptionTier::Free);
        assert_eq!(snapshot.subscription_status, SubscriptionStatus::Free);
    }

    #[test]
    fn test_credits_accept_floats_and_saturate() {
        let credits = |raw: &str| {
            let json = format!(r#"{{"userId": "u1", "credits": {}}}"#, raw);
            serde_json::from_str::<EntitlementSnapshot>(&json).map(|s| s.credits)
        };

        assert_eq!(credits("3.0").unwrap(), 3);
        assert_eq!(credits("-2.5").unwrap(), 0);
        assert_eq!(credits("1e20").unwrap(), u32::MAX);
        assert_eq!(credits("4294967296").unwrap(), u32::MAX);
        assert_eq!(credits("18446744073709551615").unwrap(), u32::MAX);
        assert!(credits("\"3\"").is_err());
    }

    #[test]
    fn test_empty_user_id_rejected_on_decode() {
        let json = r#"{"userId": "", "credits": 1}"#;
        assert!(serde_json::from_str::<EntitlementSnapshot>(json).is_err());
    }

    #[test]
    fn test_tier_parse() {
        assert_eq!("Pro".parse::<SubscriptionTier>().unwrap(), SubscriptionTier::Pro);
        assert!("platinum".parse::<SubscriptionTier>().is_err());
        assert!(SubscriptionTier::Starter.is_paid());
        assert!(!SubscriptionTier::default().is_paid());
    }
}
