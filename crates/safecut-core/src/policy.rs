//! Daily quota decision.

use crate::types::UsageRecord;
use serde::{Deserialize, Serialize};

/// Free analyses per calendar day before bonus credits are consumed.
pub const DAILY_LIMIT: u32 = 5;

/// Decides whether another analysis may run today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsagePolicy {
    pub daily_limit: u32,
}

impl Default for UsagePolicy {
    fn default() -> Self {
        Self {
            daily_limit: DAILY_LIMIT,
        }
    }
}

impl UsagePolicy {
    pub fn new(daily_limit: u32) -> Self {
        Self { daily_limit }
    }

    /// Total analyses allowed today: the daily limit plus earned credits.
    pub fn allowance(&self, usage: &UsageRecord) -> u64 {
        u64::from(self.daily_limit) + u64::from(usage.bonus_credits)
    }

    /// True iff `count < daily_limit + bonus_credits`.
    pub fn is_allowed(&self, usage: &UsageRecord) -> bool {
        u64::from(usage.count) < self.allowance(usage)
    }

    /// Analyses left today, for display.
    ///
    /// Not clamped: goes negative if the count ever overshoots the allowance.
    pub fn remaining(&self, usage: &UsageRecord) -> i64 {
        self.allowance(usage) as i64 - i64::from(usage.count)
    }
}
