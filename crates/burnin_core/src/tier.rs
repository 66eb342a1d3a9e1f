//! Burn-in duration tiers and the fixed advancement ladder.
//!
//! Devices start at the longest burn-in (24h) and step down one tier at a
//! time. The ladder is a small ordered table so the advancement check is a
//! single lookup plus comparison.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Burn-in duration tier. Ordering follows the ladder (24h first, 2h last).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "24h")]
    Hours24,
    #[serde(rename = "12h")]
    Hours12,
    #[serde(rename = "6h")]
    Hours6,
    #[serde(rename = "3h")]
    Hours3,
    #[serde(rename = "2h")]
    Hours2,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::Hours24,
        Tier::Hours12,
        Tier::Hours6,
        Tier::Hours3,
        Tier::Hours2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Hours24 => "24h",
            Tier::Hours12 => "12h",
            Tier::Hours6 => "6h",
            Tier::Hours3 => "3h",
            Tier::Hours2 => "2h",
        }
    }

    /// The tier immediately following this one, `None` for the terminal tier.
    pub fn next(&self) -> Option<Tier> {
        match self {
            Tier::Hours24 => Some(Tier::Hours12),
            Tier::Hours12 => Some(Tier::Hours6),
            Tier::Hours6 => Some(Tier::Hours3),
            Tier::Hours3 => Some(Tier::Hours2),
            Tier::Hours2 => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next().is_none()
    }
}

impl Default for Tier {
    fn default() -> Self {
        Tier::Hours24
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Tier::ALL
            .iter()
            .copied()
            .find(|tier| tier.as_str() == normalized)
            .ok_or_else(|| format!("Unknown tier '{}' (expected one of 24h, 12h, 6h, 3h, 2h)", s))
    }
}

/// Units required to leave each non-terminal tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierRequirements {
    #[serde(rename = "24h_to_12h", default = "default_24h_to_12h")]
    pub h24_to_h12: u64,
    #[serde(rename = "12h_to_6h", default = "default_12h_to_6h")]
    pub h12_to_h6: u64,
    #[serde(rename = "6h_to_3h", default = "default_6h_to_3h")]
    pub h6_to_h3: u64,
    #[serde(rename = "3h_to_2h", default = "default_3h_to_2h")]
    pub h3_to_h2: u64,
}

fn default_24h_to_12h() -> u64 {
    250
}

fn default_12h_to_6h() -> u64 {
    500
}

fn default_6h_to_3h() -> u64 {
    1000
}

fn default_3h_to_2h() -> u64 {
    2000
}

impl Default for TierRequirements {
    fn default() -> Self {
        Self {
            h24_to_h12: default_24h_to_12h(),
            h12_to_h6: default_12h_to_6h(),
            h6_to_h3: default_6h_to_3h(),
            h3_to_h2: default_3h_to_2h(),
        }
    }
}

impl TierRequirements {
    fn as_array(&self) -> [u64; 4] {
        [self.h24_to_h12, self.h12_to_h6, self.h6_to_h3, self.h3_to_h2]
    }
}

/// One rung of the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierStep {
    pub from: Tier,
    pub to: Tier,
    pub threshold: u64,
}

/// The ordered `{tier, next, threshold}` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierLadder {
    steps: [TierStep; 4],
}

impl TierLadder {
    pub fn new(requirements: &TierRequirements) -> Self {
        let thresholds = requirements.as_array();
        let step = |i: usize| TierStep {
            from: Tier::ALL[i],
            to: Tier::ALL[i + 1],
            threshold: thresholds[i],
        };
        Self {
            steps: [step(0), step(1), step(2), step(3)],
        }
    }

    /// The step leaving `tier`, `None` at the terminal tier.
    pub fn step_from(&self, tier: Tier) -> Option<&TierStep> {
        self.steps.iter().find(|step| step.from == tier)
    }
}

impl Default for TierLadder {
    fn default() -> Self {
        Self::new(&TierRequirements::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_follows_fixed_sequence() {
        assert_eq!(Tier::Hours24.next(), Some(Tier::Hours12));
        assert_eq!(Tier::Hours3.next(), Some(Tier::Hours2));
        assert!(Tier::Hours2.is_terminal());
        assert!(!Tier::Hours6.is_terminal());
    }

    #[test]
    fn parse_and_display() {
        assert_eq!("12h".parse::<Tier>().unwrap(), Tier::Hours12);
        assert_eq!(" 2H ".parse::<Tier>().unwrap(), Tier::Hours2);
        assert!("1h".parse::<Tier>().is_err());
        assert_eq!(Tier::Hours6.to_string(), "6h");
    }

    #[test]
    fn serde_uses_hour_labels() {
        assert_eq!(serde_json::to_string(&Tier::Hours24).unwrap(), "\"24h\"");
        let tier: Tier = serde_json::from_str("\"3h\"").unwrap();
        assert_eq!(tier, Tier::Hours3);
    }

    #[test]
    fn requirements_use_legacy_keys() {
        let json = r#"{"24h_to_12h": 10, "3h_to_2h": 40}"#;
        let req: TierRequirements = serde_json::from_str(json).unwrap();
        assert_eq!(req.h24_to_h12, 10);
        assert_eq!(req.h12_to_h6, 500);
        assert_eq!(req.h3_to_h2, 40);
    }

    #[test]
    fn ladder_lookup_per_transition() {
        let ladder = TierLadder::default();
        let step = ladder.step_from(Tier::Hours24).unwrap();
        assert_eq!((step.to, step.threshold), (Tier::Hours12, 250));
        let step = ladder.step_from(Tier::Hours12).unwrap();
        assert_eq!((step.to, step.threshold), (Tier::Hours6, 500));
        let step = ladder.step_from(Tier::Hours6).unwrap();
        assert_eq!((step.to, step.threshold), (Tier::Hours3, 1000));
        let step = ladder.step_from(Tier::Hours3).unwrap();
        assert_eq!((step.to, step.threshold), (Tier::Hours2, 2000));
        assert!(ladder.step_from(Tier::Hours2).is_none());
    }
}
