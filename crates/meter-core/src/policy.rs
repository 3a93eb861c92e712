//! Warning and termination policy

use meter_api::WarningKind;
use meter_config::WarningThresholds;
use rust_decimal::Decimal;
use std::collections::HashSet;

/// Minutes of talk time the balance buys at `rate_per_minute`
pub fn minutes_remaining(balance: Decimal, rate_per_minute: Decimal) -> Decimal {
    balance
        .checked_div(rate_per_minute)
        .unwrap_or(Decimal::ZERO)
}

/// Map minutes remaining to a warning band, most severe first
pub fn classify(minutes_remaining: Decimal, thresholds: &WarningThresholds) -> Option<WarningKind> {
    if minutes_remaining <= Decimal::ZERO {
        Some(WarningKind::ZeroBalance)
    } else if minutes_remaining <= thresholds.one_minute {
        Some(WarningKind::OneMinute)
    } else if minutes_remaining <= thresholds.two_minute {
        Some(WarningKind::TwoMinute)
    } else {
        None
    }
}

/// Per-session record of warnings already surfaced
#[derive(Debug, Clone, Default)]
pub struct WarningTracker {
    issued: HashSet<WarningKind>,
}

impl WarningTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_issued(&mut self, kind: WarningKind) {
        self.issued.insert(kind);
    }

    pub fn has_issued(&self, kind: WarningKind) -> bool {
        self.issued.contains(&kind)
    }
}
