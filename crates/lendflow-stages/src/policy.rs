//! Lending policy tiers

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyTier {
    pub policy_id: String,
    pub min_credit_score: u32,
    pub max_loan_amount: f64,
    /// `[min, max]` annual rate in percent.
    pub interest_rate_range: [f64; 2],
    pub term_months: u32,
}

impl PolicyTier {
    pub fn min_rate(&self) -> f64 {
        self.interest_rate_range[0].min(self.interest_rate_range[1])
    }

    pub fn max_rate(&self) -> f64 {
        self.interest_rate_range[0].max(self.interest_rate_range[1])
    }

    pub fn midpoint_rate(&self) -> f64 {
        (self.min_rate() + self.max_rate()) / 2.0
    }

    /// Round to two decimals and clamp into the tier's range.
    pub fn clamp_rate(&self, rate: f64) -> f64 {
        let rounded = (rate * 100.0).round() / 100.0;
        rounded.max(self.min_rate()).min(self.max_rate())
    }

    /// Reject tiers whose numbers cannot price an offer.
    pub fn validate(&self) -> Result<(), String> {
        let [low, high] = self.interest_rate_range;
        if !low.is_finite() || !high.is_finite() {
            return Err(format!("{}: interest rate range must be finite", self.policy_id));
        }
        if low > high {
            return Err(format!("{}: interest rate range [{}, {}] is inverted", self.policy_id, low, high));
        }
        if !self.max_loan_amount.is_finite() || self.max_loan_amount < 0.0 {
            return Err(format!("{}: max loan amount must be a non-negative number", self.policy_id));
        }
        if self.term_months == 0 {
            return Err(format!("{}: term must be at least one month", self.policy_id));
        }
        Ok(())
    }
}

/// Tiers ordered by descending minimum score; the first match wins.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyTable {
    tiers: Vec<PolicyTier>,
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::new(default_tiers())
    }
}

impl PolicyTable {
    pub fn new(mut tiers: Vec<PolicyTier>) -> Self {
        tiers.sort_by(|a, b| b.min_credit_score.cmp(&a.min_credit_score));
        Self { tiers }
    }

    pub fn tiers(&self) -> &[PolicyTier] {
        &self.tiers
    }

    /// Best tier the score qualifies for, ignoring amount.
    pub fn for_score(&self, score: u32) -> Option<&PolicyTier> {
        self.tiers.iter().find(|t| score >= t.min_credit_score)
    }

    /// Best tier admitting both the score and the requested amount.
    pub fn for_application(&self, score: u32, amount: f64) -> Option<&PolicyTier> {
        self.tiers
            .iter()
            .find(|t| score >= t.min_credit_score && amount <= t.max_loan_amount)
    }
}

pub fn default_tiers() -> Vec<PolicyTier> {
    vec![
        PolicyTier {
            policy_id: "PREMIUM-750".into(),
            min_credit_score: 750,
            max_loan_amount: 1_000_000.0,
            interest_rate_range: [8.5, 10.5],
            term_months: 36,
        },
        PolicyTier {
            policy_id: "STANDARD-700".into(),
            min_credit_score: 700,
            max_loan_amount: 500_000.0,
            interest_rate_range: [10.5, 13.0],
            term_months: 36,
        },
        PolicyTier {
            policy_id: "BASIC-650".into(),
            min_credit_score: 650,
            max_loan_amount: 200_000.0,
            interest_rate_range: [13.0, 16.0],
            term_months: 24,
        },
    ]
}
