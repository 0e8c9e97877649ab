//! Subscription plan arithmetic
//!
//! Plans never stack: subscribing computes expiry from the start instant alone.
//! There is no background sweep; expiry is judged lazily by the entitlement check.

use chrono::{DateTime, Months, Utc};

use crate::model::SubscriptionPlan;

impl SubscriptionPlan {
    /// Length of the plan in calendar months, `None` for the free plan
    pub fn months(&self) -> Option<u32> {
        match self {
            SubscriptionPlan::Free => None,
            SubscriptionPlan::Monthly => Some(1),
            SubscriptionPlan::SemiAnnual => Some(6),
            SubscriptionPlan::Yearly => Some(12),
        }
    }
}

/// Expiry of a plan started at `start`.
///
/// Month arithmetic clamps to the last day of shorter months (Jan 31 + 1 month
/// is Feb 28/29).
pub fn expiry_for(plan: SubscriptionPlan, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let months = plan.months()?;
    start
        .checked_add_months(Months::new(months))
        .or(Some(DateTime::<Utc>::MAX_UTC))
}

/// Whether a plan/expiry pair grants a paid subscription at `now`
pub fn is_active(
    plan: SubscriptionPlan,
    expiry: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    plan.is_paid() && expiry.map_or(true, |e| e > now)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    #[test]
    fn test_free_plan_has_no_expiry() {
        assert_eq!(expiry_for(SubscriptionPlan::Free, Utc::now()), None);
    }

    #[test]
    fn test_plan_lengths() {
        let start = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();

        assert_eq!(
            expiry_for(SubscriptionPlan::Monthly, start),
            Some(Utc.with_ymd_and_hms(2024, 4, 15, 12, 0, 0).unwrap())
        );
        assert_eq!(
            expiry_for(SubscriptionPlan::SemiAnnual, start),
            Some(Utc.with_ymd_and_hms(2024, 9, 15, 12, 0, 0).unwrap())
        );
        assert_eq!(
            expiry_for(SubscriptionPlan::Yearly, start),
            Some(Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_month_end_clamps() {
        let start = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();
        assert_eq!(
            expiry_for(SubscriptionPlan::Monthly, start),
            Some(Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_is_active() {
        let now = Utc::now();
        assert!(is_active(SubscriptionPlan::Yearly, Some(now + Duration::hours(1)), now));
        assert!(!is_active(SubscriptionPlan::Yearly, Some(now), now));
        assert!(!is_active(SubscriptionPlan::Free, None, now));
    }
}
