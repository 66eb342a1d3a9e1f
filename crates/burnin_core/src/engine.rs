//! Advancement Engine: one table lookup and one comparison per device.
//!
//! The engine never changes a tier. It only reports that a device has earned
//! the next step; the approval workflow turns that into a pending request.

use crate::device::DeviceState;
use crate::tier::{Tier, TierLadder, TierStep};
use serde::Serialize;

/// Why a device is not eligible this scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Hold {
    /// Waiting on an open approval request
    Pending,
    /// Already at the last tier
    Terminal,
    /// Tier listed in `excluded_tiers`
    Excluded,
    /// Device configured to stop before the last tier
    FinalTierExcluded,
    /// Count below the step threshold
    BelowThreshold { remaining: u64 },
}

/// Outcome of one eligibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advancement {
    Eligible(TierStep),
    Hold(Hold),
}

impl Advancement {
    pub fn step(&self) -> Option<&TierStep> {
        match self {
            Advancement::Eligible(step) => Some(step),
            Advancement::Hold(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdvancementEngine {
    ladder: TierLadder,
    excluded_tiers: Vec<Tier>,
}

impl AdvancementEngine {
    pub fn new(ladder: TierLadder, excluded_tiers: Vec<Tier>) -> Self {
        Self {
            ladder,
            excluded_tiers,
        }
    }

    pub fn ladder(&self) -> &TierLadder {
        &self.ladder
    }

    /// Whether `tier` may advance at all for a device with the given flag.
    pub fn blocked_at(&self, tier: Tier, exclude_final_tier: bool) -> Option<Hold> {
        let step = match self.ladder.step_from(tier) {
            Some(step) => step,
            None => return Some(Hold::Terminal),
        };
        if self.excluded_tiers.contains(&tier) {
            return Some(Hold::Excluded);
        }
        if exclude_final_tier && step.to.is_terminal() {
            return Some(Hold::FinalTierExcluded);
        }
        None
    }

    pub fn check(&self, device: &DeviceState, exclude_final_tier: bool) -> Advancement {
        if device.is_pending() {
            return Advancement::Hold(Hold::Pending);
        }
        if let Some(hold) = self.blocked_at(device.current_tier, exclude_final_tier) {
            return Advancement::Hold(hold);
        }
        let step = match self.ladder.step_from(device.current_tier) {
            Some(step) => *step,
            None => return Advancement::Hold(Hold::Terminal),
        };
        if device.count >= step.threshold {
            Advancement::Eligible(step)
        } else {
            Advancement::Hold(Hold::BelowThreshold {
                remaining: step.threshold - device.count,
            })
        }
    }
}
