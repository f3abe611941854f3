//! Daily spend-cap tracking: running sum of committed intent `max_usd`
//! per `(delegation_id, UTC day)`.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpendCapTracker {
    spent_by_day: HashMap<(String, NaiveDate), f64>,
}

impl SpendCapTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `amount_usd` would push the delegation's spend for
    /// `now`'s UTC day over `cap_usd`; if not, record it. Atomic: never
    /// partially applies.
    pub fn check_and_record(
        &mut self,
        delegation_id: &str,
        cap_usd: Option<f64>,
        amount_usd: f64,
        now: DateTime<Utc>,
    ) -> Result<(), PolicyError> {
        let day = now.date_naive();
        let key = (delegation_id.to_string(), day);
        let current = *self.spent_by_day.get(&key).unwrap_or(&0.0);
        if let Some(cap) = cap_usd {
            if current + amount_usd > cap {
                return Err(PolicyError::SpendCapExceeded);
            }
        }
        self.spent_by_day.insert(key, current + amount_usd);
        Ok(())
    }

    pub fn spent_today(&self, delegation_id: &str, now: DateTime<Utc>) -> f64 {
        let key = (delegation_id.to_string(), now.date_naive());
        *self.spent_by_day.get(&key).unwrap_or(&0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spend_within_cap_is_recorded() {
        let mut tracker = SpendCapTracker::new();
        let now = Utc::now();
        tracker
            .check_and_record("del-1", Some(500.0), 200.0, now)
            .unwrap();
        assert_eq!(tracker.spent_today("del-1", now), 200.0);
    }

    #[test]
    fn spend_exceeding_cap_is_rejected_and_not_recorded() {
        let mut tracker = SpendCapTracker::new();
        let now = Utc::now();
        tracker
            .check_and_record("del-1", Some(500.0), 400.0, now)
            .unwrap();
        let err = tracker
            .check_and_record("del-1", Some(500.0), 150.0, now)
            .unwrap_err();
        assert!(matches!(err, PolicyError::SpendCapExceeded));
        assert_eq!(tracker.spent_today("del-1", now), 400.0);
    }

    #[test]
    fn no_cap_never_rejects() {
        let mut tracker = SpendCapTracker::new();
        let now = Utc::now();
        tracker
            .check_and_record("del-1", None, 1_000_000.0, now)
            .unwrap();
    }
}
