//! Plan - subscription plan catalog
//!
//! Plans form a fixed set looked up by tier; they are configuration, not
//! stored entities, and are never synthesized at runtime.

use serde::{Deserialize, Serialize};

/// Subscription tier identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    /// Entry tier, no charge
    Free,
    /// Personal / light professional use
    Basic,
    /// Power users and professionals
    Pro,
    /// Teams and organizations
    Enterprise,
}

impl PlanTier {
    /// Returns the string representation of the tier
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Basic => "basic",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }

    /// All tiers, cheapest first
    #[must_use]
    pub fn all() -> [PlanTier; 4] {
        [Self::Free, Self::Basic, Self::Pro, Self::Enterprise]
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "basic" => Ok(Self::Basic),
            "pro" => Ok(Self::Pro),
            "enterprise" => Ok(Self::Enterprise),
            _ => Err(format!("unknown plan tier: {s}")),
        }
    }
}

/// A subscription plan's limits, overage pricing and display metadata
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionPlan {
    /// Tier this plan belongs to
    pub tier: PlanTier,
    /// Display name
    pub name: &'static str,
    /// Display description
    pub description: &'static str,
    /// Tokens included per month
    pub monthly_token_limit: u64,
    /// Tool calls included per month
    pub tool_call_limit: u64,
    /// USD per extra token beyond the limit
    pub extra_token_price: f64,
    /// USD per extra tool call beyond the limit
    pub extra_tool_call_price: f64,
    /// Monthly price in USD
    pub monthly_price: f64,
    /// Yearly price in USD
    pub yearly_price: f64,
    /// Feature blurbs for display
    pub features: &'static [&'static str],
}

static PLANS: [SubscriptionPlan; 4] = [
    SubscriptionPlan {
        tier: PlanTier::Free,
        name: "Free Plan",
        description: "Get started with basic access to AI assistants",
        monthly_token_limit: 500_000,
        tool_call_limit: 50,
        extra_token_price: 0.002,
        extra_tool_call_price: 0.1,
        monthly_price: 0.0,
        yearly_price: 0.0,
        features: &[
            "Access to basic models",
            "Limited monthly tokens",
            "Limited tool calls",
            "Standard response times",
        ],
    },
    SubscriptionPlan {
        tier: PlanTier::Basic,
        name: "Basic Plan",
        description: "Ideal for personal or light professional use",
        monthly_token_limit: 2_000_000,
        tool_call_limit: 300,
        extra_token_price: 0.0015,
        extra_tool_call_price: 0.08,
        monthly_price: 9.99,
        yearly_price: 99.90,
        features: &[
            "All Free features",
            "Access to standard models",
            "Increased token limit",
            "More tool calls",
            "Priority response times",
        ],
    },
    SubscriptionPlan {
        tier: PlanTier::Pro,
        name: "Pro Plan",
        description: "For power users and professionals",
        monthly_token_limit: 5_000_000,
        tool_call_limit: 1000,
        extra_token_price: 0.001,
        extra_tool_call_price: 0.05,
        monthly_price: 19.99,
        yearly_price: 199.90,
        features: &[
            "All Basic features",
            "Access to advanced models",
            "High token limit",
            "Extensive tool calls",
            "Faster response times",
            "Early access to new features",
        ],
    },
    SubscriptionPlan {
        tier: PlanTier::Enterprise,
        name: "Enterprise Plan",
        description: "Custom solutions for teams and organizations",
        monthly_token_limit: 20_000_000,
        tool_call_limit: 5000,
        extra_token_price: 0.0008,
        extra_tool_call_price: 0.03,
        monthly_price: 49.99,
        yearly_price: 499.90,
        features: &[
            "All Pro features",
            "Access to all models",
            "Custom token limit",
            "Unlimited tool calls",
            "Dedicated support",
            "Custom feature development",
            "Team management",
        ],
    },
];

/// Look up the plan for a tier
#[must_use]
pub fn plan(tier: PlanTier) -> &'static SubscriptionPlan {
    match tier {
        PlanTier::Free => &PLANS[0],
        PlanTier::Basic => &PLANS[1],
        PlanTier::Pro => &PLANS[2],
        PlanTier::Enterprise => &PLANS[3],
    }
}

/// Monthly token ceiling for a tier plus purchased overage
#[must_use]
pub fn token_limit(tier: PlanTier, extra_tokens: u64) -> u64 {
    plan(tier).monthly_token_limit + extra_tokens
}

/// Monthly tool-call ceiling for a tier plus purchased overage
#[must_use]
pub fn tool_call_limit(tier: PlanTier, extra_tool_calls: u64) -> u64 {
    plan(tier).tool_call_limit + extra_tool_calls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_roundtrip() {
        for tier in PlanTier::all() {
            let parsed: PlanTier = tier.as_str().parse().unwrap();
            assert_eq!(tier, parsed);
        }
        assert!("platinum".parse::<PlanTier>().is_err());
    }

    #[test]
    fn test_catalog_limits() {
        assert_eq!(plan(PlanTier::Free).monthly_token_limit, 500_000);
        assert_eq!(plan(PlanTier::Basic).monthly_token_limit, 2_000_000);
        assert_eq!(plan(PlanTier::Pro).monthly_token_limit, 5_000_000);
        assert_eq!(plan(PlanTier::Enterprise).monthly_token_limit, 20_000_000);

        assert_eq!(plan(PlanTier::Free).tool_call_limit, 50);
        assert_eq!(plan(PlanTier::Enterprise).tool_call_limit, 5000);
    }

    #[test]
    fn test_catalog_matches_tiers() {
        for tier in PlanTier::all() {
            assert_eq!(plan(tier).tier, tier);
        }
    }

    #[test]
    fn test_limits_include_overage() {
        assert_eq!(token_limit(PlanTier::Free, 0), 500_000);
        assert_eq!(token_limit(PlanTier::Free, 100_000), 600_000);
        assert_eq!(tool_call_limit(PlanTier::Basic, 20), 320);
    }
}
