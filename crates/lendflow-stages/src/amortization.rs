//! EMI amortization

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Installment {
    pub month: u32,
    pub emi: f64,
    pub principal: f64,
    pub interest: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmiSchedule {
    pub monthly_emi: f64,
    pub installments: Vec<Installment>,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Unrounded EMI: `P·r·(1+r)^n / ((1+r)^n − 1)` with `r` the monthly rate.
pub fn emi(principal: f64, annual_rate: f64, months: u32) -> f64 {
    if months == 0 {
        return principal;
    }
    let r = annual_rate / 12.0 / 100.0;
    if r <= 0.0 {
        return principal / months as f64;
    }
    let growth = (1.0 + r).powi(months as i32);
    principal * r * growth / (growth - 1.0)
}

pub fn schedule(principal: f64, annual_rate: f64, months: u32) -> EmiSchedule {
    let r = (annual_rate / 12.0 / 100.0).max(0.0);
    let payment = emi(principal, annual_rate, months);
    let mut balance = principal;
    let mut installments = Vec::with_capacity(months as usize);

    for month in 1..=months {
        let interest = balance * r;
        let principal_part = payment - interest;
        balance -= principal_part;
        installments.push(Installment {
            month,
            emi: round2(payment),
            principal: round2(principal_part),
            interest: round2(interest),
            balance: round2(balance).max(0.0),
        });
    }

    EmiSchedule {
        monthly_emi: round2(payment),
        installments,
    }
}
