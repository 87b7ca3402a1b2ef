//! VIP Tier Eligibility
//!
//! Pure arithmetic over the tier catalog and cumulative verified deposits.
//! By construction the calculator is handed deposit totals only - earned and
//! bonus funds never count toward tier affordability.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A catalog entry defining an investment level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VipTier {
    pub name: String,
    /// Required cumulative deposit amount in the quote unit
    pub cost: Decimal,
    /// Daily earning amount at this tier
    pub daily_earning: Decimal,
}

impl VipTier {
    pub fn new(name: impl Into<String>, cost: impl Into<Decimal>, daily: impl Into<Decimal>) -> Self {
        Self {
            name: name.into(),
            cost: cost.into(),
            daily_earning: daily.into(),
        }
    }
}

/// Derived upgrade information toward the next tier
#[derive(Debug, Clone, Serialize)]
pub struct UpgradeInfo {
    pub next_tier: VipTier,
    /// Absolute cost of the next tier minus the current tier's cost
    pub upgrade_cost: Decimal,
    /// Deposits still needed to reach the next tier, floored at zero
    pub amount_needed: Decimal,
    pub can_afford: bool,
    /// Deposits over next-tier cost, as a percentage clamped to [0, 100]
    pub progress_percentage: Decimal,
}

/// Upgrade computation result.
///
/// `MaxTier` is a distinct terminal state so callers can render it apart from
/// "no tiers configured at all", which is the only case yielding `None` from
/// [`compute_upgrade`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "path", rename_all = "snake_case")]
pub enum UpgradePath {
    Upgrade(UpgradeInfo),
    MaxTier,
}

/// Compute upgrade eligibility from the tier catalog, the currently held tier
/// (if any), and cumulative verified deposits.
///
/// Sorts the catalog ascending by cost defensively. Downgrade validity is a
/// caller precondition; this function has no notion of downgrades.
pub fn compute_upgrade(
    tiers: &[VipTier],
    current: Option<&VipTier>,
    cumulative_deposits: Decimal,
) -> Option<UpgradePath> {
    if tiers.is_empty() {
        return None;
    }

    let mut sorted: Vec<&VipTier> = tiers.iter().collect();
    sorted.sort_by(|a, b| a.cost.cmp(&b.cost));

    let current_cost = current.map(|t| t.cost).unwrap_or(Decimal::ZERO);

    let next = match sorted.iter().find(|t| t.cost > current_cost) {
        Some(tier) => (*tier).clone(),
        None => return Some(UpgradePath::MaxTier),
    };

    let upgrade_cost = next.cost - current_cost;
    let amount_needed = (next.cost - cumulative_deposits).max(Decimal::ZERO);
    let can_afford = cumulative_deposits >= next.cost;
    let progress_percentage = (cumulative_deposits / next.cost * Decimal::from(100))
        .clamp(Decimal::ZERO, Decimal::from(100));

    Some(UpgradePath::Upgrade(UpgradeInfo {
        next_tier: next,
        upgrade_cost,
        amount_needed,
        can_afford,
        progress_percentage,
    }))
}

/// The product's tier table
pub fn default_tier_catalog() -> Vec<VipTier> {
    vec![
        VipTier::new("VIP1", 100, 3),
        VipTier::new("VIP2", 300, 10),
        VipTier::new("VIP3", 1_000, 35),
        VipTier::new("VIP4", 3_000, 110),
        VipTier::new("VIP5", 10_000, 380),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(cost: i64) -> VipTier {
        VipTier::new(format!("T{}", cost), cost, 1)
    }

    fn upgrade(path: Option<UpgradePath>) -> UpgradeInfo {
        match path {
            Some(UpgradePath::Upgrade(info)) => info,
            other => panic!("expected upgrade, got {:?}", other),
        }
    }

    #[test]
    fn test_partial_progress_toward_next_tier() {
        let tiers = vec![tier(100), tier(150), tier(500)];
        let current = tier(100);

        let info = upgrade(compute_upgrade(&tiers, Some(&current), Decimal::from(120)));

        assert_eq!(info.next_tier.cost, Decimal::from(150));
        assert_eq!(info.upgrade_cost, Decimal::from(50));
        assert_eq!(info.amount_needed, Decimal::from(30));
        assert!(!info.can_afford);
        assert_eq!(info.progress_percentage, Decimal::from(80));
    }

    #[test]
    fn test_exact_cost_is_affordable_at_full_progress() {
        let tiers = vec![tier(100), tier(150)];
        let current = tier(100);

        let info = upgrade(compute_upgrade(&tiers, Some(&current), Decimal::from(150)));

        assert!(info.can_afford);
        assert_eq!(info.amount_needed, Decimal::ZERO);
        assert_eq!(info.progress_percentage, Decimal::from(100));
    }

    #[test]
    fn test_progress_clamps_at_100() {
        let tiers = vec![tier(100)];

        let info = upgrade(compute_upgrade(&tiers, None, Decimal::from(250)));
        assert_eq!(info.progress_percentage, Decimal::from(100));
    }

    #[test]
    fn test_no_current_tier_pays_full_cost() {
        let tiers = vec![tier(300), tier(100)];

        let info = upgrade(compute_upgrade(&tiers, None, Decimal::ZERO));
        // Defensive sort: cheapest tier wins even though the input is unsorted
        assert_eq!(info.next_tier.cost, Decimal::from(100));
        assert_eq!(info.upgrade_cost, Decimal::from(100));
        assert_eq!(info.progress_percentage, Decimal::ZERO);
    }

    #[test]
    fn test_max_tier_is_distinct_from_empty_catalog() {
        let tiers = vec![tier(100), tier(300)];
        let current = tier(300);

        assert!(matches!(
            compute_upgrade(&tiers, Some(&current), Decimal::from(1_000)),
            Some(UpgradePath::MaxTier)
        ));

        assert!(compute_upgrade(&[], None, Decimal::from(1_000)).is_none());
    }

    #[test]
    fn test_progress_is_monotonic_in_deposits() {
        let tiers = vec![tier(100), tier(150)];
        let current = tier(100);

        let mut last = Decimal::MIN;
        for deposits in [0i64, 30, 75, 149, 150, 151, 400] {
            let info = upgrade(compute_upgrade(&tiers, Some(&current), Decimal::from(deposits)));
            assert!(info.progress_percentage >= last);
            assert!(info.progress_percentage >= Decimal::ZERO);
            assert!(info.progress_percentage <= Decimal::from(100));
            last = info.progress_percentage;
        }
    }

    #[test]
    fn test_default_catalog_is_strictly_ascending() {
        let catalog = default_tier_catalog();
        assert!(!catalog.is_empty());
        for pair in catalog.windows(2) {
            assert!(pair[0].cost < pair[1].cost);
        }
    }
}
