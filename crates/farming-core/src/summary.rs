use serde::{Deserialize, Serialize};

use crate::classifier::FarmingCondition;

/// Per-rating day counts for a run of assessments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionSummary {
    pub excellent: usize,
    pub good: usize,
    pub fair: usize,
    pub poor: usize,
}

impl ConditionSummary {
    pub fn from_conditions<I>(conditions: I) -> Self
    where
        I: IntoIterator<Item = FarmingCondition>,
    {
        let mut summary = Self::default();
        for condition in conditions {
            summary.record(condition);
        }
        summary
    }

    pub fn record(&mut self, condition: FarmingCondition) {
        *self.slot_mut(condition) += 1;
    }

    pub fn count(&self, condition: FarmingCondition) -> usize {
        match condition {
            FarmingCondition::Excellent => self.excellent,
            FarmingCondition::Good => self.good,
            FarmingCondition::Fair => self.fair,
            FarmingCondition::Poor => self.poor,
        }
    }

    pub fn total(&self) -> usize {
        self.excellent + self.good + self.fair + self.poor
    }

    /// Most frequent rating. Ties go to the more favorable rating.
    pub fn dominant(&self) -> Option<FarmingCondition> {
        let mut best: Option<(FarmingCondition, usize)> = None;
        for condition in FarmingCondition::ALL {
            let count = self.count(condition);
            if count == 0 {
                continue;
            }
            match best {
                Some((_, best_count)) if best_count >= count => {}
                _ => best = Some((condition, count)),
            }
        }
        best.map(|(condition, _)| condition)
    }

    fn slot_mut(&mut self, condition: FarmingCondition) -> &mut usize {
        match condition {
            FarmingCondition::Excellent => &mut self.excellent,
            FarmingCondition::Good => &mut self.good,
            FarmingCondition::Fair => &mut self.fair,
            FarmingCondition::Poor => &mut self.poor,
        }
    }
}
