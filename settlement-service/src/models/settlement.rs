//! Settlement input/output value types.
//!
//! `SettlementInput` is parsed field-by-field from a JSON row rather than
//! through a derived `Deserialize` so that a present-but-non-numeric field
//! can be reported precisely and unknown fields are ignored. `simCardFee`
//! and `newOrTransferAdjustment` keep their presence bit: profile defaults
//! only fill values the row genuinely omitted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default withholding rate when no dealer profile is supplied.
pub const DEFAULT_TAX_RATE: f64 = 0.133;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementInput {
    pub face_value: f64,
    pub addon_amount: f64,
    pub verbal1: f64,
    pub verbal2: f64,
    pub grade_amount: f64,
    pub document_cash_activation: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sim_card_fee: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_or_transfer_adjustment: Option<f64>,
    pub deduction: f64,
    pub cash_received: f64,
    pub payback: f64,
}

impl SettlementInput {
    /// Parse one row from a JSON object.
    ///
    /// `faceValue` is required and must be non-negative; every other field
    /// defaults to 0 when absent. Signed fields are expected to already
    /// carry their sign. `cashReceivedAdjustment` is accepted as an alias
    /// for `payback`.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let obj = value
            .as_object()
            .ok_or_else(|| "row must be a JSON object".to_string())?;

        let face_value = match num_field(obj, "faceValue")? {
            Some(v) => v,
            None => return Err("required field `faceValue` is missing".to_string()),
        };
        if face_value < 0.0 {
            return Err(format!("`faceValue` must not be negative (got {})", face_value));
        }

        let payback = match num_field(obj, "payback")? {
            Some(v) => v,
            None => num_field(obj, "cashReceivedAdjustment")?.unwrap_or(0.0),
        };

        Ok(SettlementInput {
            face_value,
            addon_amount: num_field(obj, "addonAmount")?.unwrap_or(0.0),
            verbal1: num_field(obj, "verbal1")?.unwrap_or(0.0),
            verbal2: num_field(obj, "verbal2")?.unwrap_or(0.0),
            grade_amount: num_field(obj, "gradeAmount")?.unwrap_or(0.0),
            document_cash_activation: num_field(obj, "documentCashActivation")?.unwrap_or(0.0),
            sim_card_fee: num_field(obj, "simCardFee")?,
            new_or_transfer_adjustment: num_field(obj, "newOrTransferAdjustment")?,
            deduction: num_field(obj, "deduction")?.unwrap_or(0.0),
            cash_received: num_field(obj, "cashReceived")?.unwrap_or(0.0),
            payback,
        })
    }
}

fn num_field(obj: &serde_json::Map<String, Value>, name: &str) -> Result<Option<f64>, String> {
    match obj.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| format!("field `{}` is not numeric", name)),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResult {
    pub rebate_total: f64,
    pub settlement_amount: f64,
    pub tax_amount: f64,
    pub margin_before_tax: f64,
    pub margin_after_tax: f64,
    /// Echo of the input, with profile defaults already substituted.
    pub input: SettlementInput,
    /// Dealer code of the profile applied, or "default".
    pub profile_used: String,
    pub calculation_time_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Internal,
    External,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchOptions {
    pub format: OutputFormat,
    pub include_performance: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRowOutcome {
    pub index: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SettlementResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub success: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutput {
    pub results: Vec<BatchRowOutcome>,
    pub summary: BatchSummary,
}
