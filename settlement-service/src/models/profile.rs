//! Dealer profile model.
//!
//! A profile is a per-tenant configuration record supplying the tax rate and
//! default fee values for calculations. Profiles are administered elsewhere;
//! this service only ever reads them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealerProfile {
    pub dealer_code: String,
    /// Withholding/VAT rate as a decimal fraction, e.g. 0.133.
    pub tax_rate: f64,
    pub default_sim_fee: f64,
    pub default_mnp_discount: f64,
    pub status: ProfileStatus,
}

impl DealerProfile {
    pub fn is_active(&self) -> bool {
        self.status == ProfileStatus::Active
    }
}
