//! Bidirectional field-name mapping between the external (client-facing,
//! snake_case) schema and the internal (camelCase) schema the calculator
//! consumes.
//!
//! The dictionary is static and exhaustively enumerated; `validate_dictionary`
//! runs at startup to reject any edit that breaks the bijection. Fields not
//! present in the dictionary pass through unchanged in both directions, so
//! `to_external(to_internal(x)) == x` for every object.

use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use settlement_core::error::AppError;
use std::collections::HashMap;

/// (external, internal) pairs. Input fields first, then result fields.
const FIELD_PAIRS: &[(&str, &str)] = &[
    ("face_value", "faceValue"),
    ("addon_amount", "addonAmount"),
    ("verbal_bonus_1", "verbal1"),
    ("verbal_bonus_2", "verbal2"),
    ("grade_amount", "gradeAmount"),
    ("document_cash_activation", "documentCashActivation"),
    ("sim_card_fee", "simCardFee"),
    ("mnp_adjustment", "newOrTransferAdjustment"),
    ("deduction_amount", "deduction"),
    ("cash_received", "cashReceived"),
    ("payback_amount", "payback"),
    ("cash_received_adjustment", "cashReceivedAdjustment"),
    ("rebate_total", "rebateTotal"),
    ("settlement_amount", "settlementAmount"),
    ("tax_amount", "taxAmount"),
    ("margin_before_tax", "marginBeforeTax"),
    ("margin_after_tax", "marginAfterTax"),
    ("profile_used", "profileUsed"),
    ("calculation_time_ms", "calculationTimeMs"),
    ("input_echo", "input"),
];

static EXTERNAL_TO_INTERNAL: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| FIELD_PAIRS.iter().copied().collect());

static INTERNAL_TO_EXTERNAL: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| FIELD_PAIRS.iter().map(|(ext, int)| (*int, *ext)).collect());

/// Verify the dictionary is a bijection. Called once at startup.
pub fn validate_dictionary() -> Result<(), AppError> {
    if EXTERNAL_TO_INTERNAL.len() != FIELD_PAIRS.len() {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "field dictionary has a duplicate external name"
        )));
    }
    if INTERNAL_TO_EXTERNAL.len() != FIELD_PAIRS.len() {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "field dictionary has a duplicate internal name"
        )));
    }
    for (ext, int) in FIELD_PAIRS {
        if INTERNAL_TO_EXTERNAL.get(int) != Some(ext) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "field dictionary is not invertible at '{}'",
                ext
            )));
        }
    }
    Ok(())
}

fn rename_keys(value: &Value, dictionary: &HashMap<&'static str, &'static str>) -> Value {
    match value {
        Value::Object(obj) => {
            let mut out = Map::with_capacity(obj.len());
            for (key, val) in obj {
                let mapped = dictionary.get(key.as_str()).copied();
                out.insert(mapped.unwrap_or(key).to_string(), val.clone());
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// Translate an external-schema object to the internal schema.
pub fn to_internal(value: &Value) -> Value {
    rename_keys(value, &EXTERNAL_TO_INTERNAL)
}

/// Translate an internal-schema object to the external schema.
pub fn to_external(value: &Value) -> Value {
    rename_keys(value, &INTERNAL_TO_EXTERNAL)
}

pub fn to_internal_array(values: &[Value]) -> Vec<Value> {
    values.iter().map(to_internal).collect()
}

pub fn to_external_array(values: &[Value]) -> Vec<Value> {
    values.iter().map(to_external).collect()
}
