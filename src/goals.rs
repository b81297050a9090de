use crate::catalog::Locale;
use serde::Serialize;

/// Named speed thresholds, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GoalTier {
    Easy,
    Medium,
    Hard,
    Expert,
    Master,
    Guru,
}

pub const TIERS: [GoalTier; 6] = [
    GoalTier::Easy,
    GoalTier::Medium,
    GoalTier::Hard,
    GoalTier::Expert,
    GoalTier::Master,
    GoalTier::Guru,
];

/// Chars-per-minute thresholds, one per tier in `TIERS` order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierTable {
    thresholds: [u32; 6],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Goal {
    pub tier: GoalTier,
    pub threshold: u32,
}

impl TierTable {
    pub const fn new(thresholds: [u32; 6]) -> Self {
        Self { thresholds }
    }

    /// Built-in table for a locale
    pub fn for_locale(locale: Locale) -> Self {
        match locale {
            Locale::Ru => Self::new([50, 100, 150, 200, 250, 300]),
            Locale::En => Self::new([40, 80, 120, 160, 200, 240]),
        }
    }

    pub fn threshold(&self, tier: GoalTier) -> u32 {
        self.thresholds[tier as usize]
    }

    /// Highest tier whose threshold is at or below `average_speed`, or the
    /// lowest tier when none is reached
    pub fn next_goal(&self, average_speed: u32) -> Goal {
        let tier = TIERS
            .iter()
            .rev()
            .copied()
            .find(|&tier| average_speed >= self.threshold(tier))
            .unwrap_or(GoalTier::Easy);

        Goal {
            tier,
            threshold: self.threshold(tier),
        }
    }
}
