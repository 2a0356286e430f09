//! Settlement calculation engine.
//!
//! A fixed four-stage arithmetic pipeline; later stages consume earlier
//! totals, so the order is load-bearing:
//!
//! 1. rebate total   = faceValue + addonAmount + verbal1 + gradeAmount + verbal2
//! 2. settlement     = rebate total - documentCashActivation + simCardFee
//!                     + newOrTransferAdjustment + deduction
//! 3. tax            = round(settlement * taxRate), half away from zero
//! 4. marginBeforeTax = settlement - tax + cashReceived + payback
//!    marginAfterTax  = tax + marginBeforeTax
//!
//! Everything in this module is a pure function of its arguments: no I/O,
//! no shared state, reproducible for regression testing.

use crate::models::{
    BatchOutput, BatchRowOutcome, BatchSummary, DealerProfile, SettlementInput, SettlementResult,
    DEFAULT_TAX_RATE,
};
use serde_json::Value;
use settlement_core::error::AppError;
use std::time::Instant;

/// Compute one row with the default tax rate and no profile defaults.
pub fn compute(input: &SettlementInput) -> SettlementResult {
    run_pipeline(input.clone(), DEFAULT_TAX_RATE, "default")
}

/// Compute one row under a dealer profile.
///
/// Profile defaults substitute `simCardFee` / `newOrTransferAdjustment`
/// only when the row omitted them; the profile's tax rate always applies.
pub fn compute_with_profile(
    input: &SettlementInput,
    profile: &DealerProfile,
) -> Result<SettlementResult, AppError> {
    if !profile.is_active() {
        return Err(AppError::ProfileInactive(profile.dealer_code.clone()));
    }

    let mut resolved = input.clone();
    if resolved.sim_card_fee.is_none() {
        resolved.sim_card_fee = Some(profile.default_sim_fee);
    }
    if resolved.new_or_transfer_adjustment.is_none() {
        resolved.new_or_transfer_adjustment = Some(profile.default_mnp_discount);
    }

    Ok(run_pipeline(
        resolved,
        profile.tax_rate,
        &profile.dealer_code,
    ))
}

/// Compute a batch of JSON rows, isolating failures per row.
///
/// A malformed row becomes an error entry; its siblings still compute.
/// Output order matches input order.
pub fn compute_batch(rows: &[Value], profile: Option<&DealerProfile>) -> BatchOutput {
    let mut results = Vec::with_capacity(rows.len());
    let mut success = 0usize;
    let mut errors = 0usize;

    for (index, row) in rows.iter().enumerate() {
        let outcome = SettlementInput::from_value(row)
            .map_err(AppError::InvalidInput)
            .and_then(|input| match profile {
                Some(profile) => compute_with_profile(&input, profile),
                None => Ok(compute(&input)),
            });

        match outcome {
            Ok(result) => {
                success += 1;
                results.push(BatchRowOutcome {
                    index,
                    success: true,
                    result: Some(result),
                    error: None,
                });
            }
            Err(err) => {
                errors += 1;
                results.push(BatchRowOutcome {
                    index,
                    success: false,
                    result: None,
                    error: Some(err.to_string()),
                });
            }
        }
    }

    BatchOutput {
        results,
        summary: BatchSummary {
            total: rows.len(),
            success,
            errors,
        },
    }
}

fn run_pipeline(input: SettlementInput, tax_rate: f64, profile_used: &str) -> SettlementResult {
    let start = Instant::now();

    let sim_card_fee = input.sim_card_fee.unwrap_or(0.0);
    let mnp_adjustment = input.new_or_transfer_adjustment.unwrap_or(0.0);

    let rebate_total = input.face_value
        + input.addon_amount
        + input.verbal1
        + input.grade_amount
        + input.verbal2;

    let settlement_amount = rebate_total - input.document_cash_activation
        + sim_card_fee
        + mnp_adjustment
        + input.deduction;

    // f64::round is half-away-from-zero, the required currency rounding.
    let tax_amount = (settlement_amount * tax_rate).round();

    let margin_before_tax = settlement_amount - tax_amount + input.cash_received + input.payback;
    let margin_after_tax = tax_amount + margin_before_tax;

    SettlementResult {
        rebate_total,
        settlement_amount,
        tax_amount,
        margin_before_tax,
        margin_after_tax,
        input,
        profile_used: profile_used.to_string(),
        calculation_time_ms: start.elapsed().as_secs_f64() * 1000.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProfileStatus;
    use serde_json::json;

    fn reference_row() -> Value {
        json!({
            "faceValue": 150000, "addonAmount": 10000, "verbal1": 50000,
            "gradeAmount": 20000, "verbal2": 30000, "documentCashActivation": 0,
            "simCardFee": 5500, "newOrTransferAdjustment": -800, "deduction": 0,
            "cashReceived": 50000, "payback": -30000
        })
    }

    fn profile(code: &str, status: ProfileStatus) -> DealerProfile {
        DealerProfile {
            dealer_code: code.to_string(),
            tax_rate: 0.1,
            default_sim_fee: 7700.0,
            default_mnp_discount: -1000.0,
            status,
        }
    }

    #[test]
    fn reference_scenario_matches_expected_figures() {
        let input = SettlementInput::from_value(&reference_row()).unwrap();
        let result = compute(&input);

        assert_eq!(result.rebate_total, 260000.0);
        assert_eq!(result.settlement_amount, 264700.0);
        assert_eq!(result.tax_amount, 35205.0);
        assert_eq!(result.margin_before_tax, 249495.0);
        assert_eq!(result.margin_after_tax, 284700.0);
        assert_eq!(result.profile_used, "default");
    }

    #[test]
    fn margin_after_tax_identity_holds() {
        let input = SettlementInput::from_value(&reference_row()).unwrap();
        let result = compute(&input);
        assert_eq!(
            result.margin_after_tax,
            result.tax_amount + result.margin_before_tax
        );
    }

    #[test]
    fn settlement_amount_identity_holds() {
        let input = SettlementInput::from_value(&reference_row()).unwrap();
        let result = compute(&input);
        assert_eq!(
            result.settlement_amount,
            result.rebate_total - result.input.document_cash_activation
                + result.input.sim_card_fee.unwrap()
                + result.input.new_or_transfer_adjustment.unwrap()
                + result.input.deduction
        );
    }

    #[test]
    fn compute_is_idempotent() {
        let input = SettlementInput::from_value(&reference_row()).unwrap();
        let first = compute(&input);
        let second = compute(&input);
        assert_eq!(first.rebate_total, second.rebate_total);
        assert_eq!(first.settlement_amount, second.settlement_amount);
        assert_eq!(first.tax_amount, second.tax_amount);
        assert_eq!(first.margin_before_tax, second.margin_before_tax);
        assert_eq!(first.margin_after_tax, second.margin_after_tax);
    }

    #[test]
    fn tax_rounds_half_away_from_zero() {
        // 500 * 0.133 = 66.5 -> 67, and symmetric for negatives.
        let input =
            SettlementInput::from_value(&json!({"faceValue": 500, "simCardFee": 0})).unwrap();
        let result = compute(&input);
        assert_eq!(result.tax_amount, 67.0);

        let negative = SettlementInput::from_value(
            &json!({"faceValue": 0, "deduction": -500, "simCardFee": 0}),
        )
        .unwrap();
        assert_eq!(compute(&negative).tax_amount, -67.0);
    }

    #[test]
    fn profile_tax_rate_overrides_default() {
        let input = SettlementInput::from_value(&reference_row()).unwrap();
        let result = compute_with_profile(&input, &profile("D-001", ProfileStatus::Active)).unwrap();
        assert_eq!(result.tax_amount, 26470.0);
        assert_eq!(result.profile_used, "D-001");
    }

    #[test]
    fn profile_defaults_fill_only_omitted_fields() {
        let input = SettlementInput::from_value(&json!({"faceValue": 100000})).unwrap();
        let result = compute_with_profile(&input, &profile("D-001", ProfileStatus::Active)).unwrap();
        assert_eq!(result.input.sim_card_fee, Some(7700.0));
        assert_eq!(result.input.new_or_transfer_adjustment, Some(-1000.0));

        let explicit =
            SettlementInput::from_value(&json!({"faceValue": 100000, "simCardFee": 0})).unwrap();
        let result = compute_with_profile(&explicit, &profile("D-001", ProfileStatus::Active))
            .unwrap();
        assert_eq!(result.input.sim_card_fee, Some(0.0));
    }

    #[test]
    fn inactive_profile_is_rejected() {
        let input = SettlementInput::from_value(&reference_row()).unwrap();
        let err = compute_with_profile(&input, &profile("D-002", ProfileStatus::Inactive))
            .unwrap_err();
        assert!(matches!(err, AppError::ProfileInactive(_)));
    }

    #[test]
    fn batch_isolates_the_failing_row() {
        let rows = vec![
            json!({"faceValue": 1000}),
            json!({"faceValue": "not-a-number"}),
            json!({"faceValue": 2000}),
        ];
        let output = compute_batch(&rows, None);

        assert_eq!(output.summary.total, 3);
        assert_eq!(output.summary.success, 2);
        assert_eq!(output.summary.errors, 1);
        assert_eq!(output.results.len(), 3);
        assert!(output.results[0].success);
        assert!(!output.results[1].success);
        assert!(output.results[1].error.as_deref().unwrap().contains("faceValue"));
        assert!(output.results[2].success);
        // Order is index-addressable.
        assert_eq!(output.results[2].index, 2);
    }

    #[test]
    fn batch_of_all_valid_rows_has_no_errors() {
        let rows: Vec<Value> = (0..10).map(|i| json!({"faceValue": i * 1000})).collect();
        let output = compute_batch(&rows, Some(&profile("D-001", ProfileStatus::Active)));
        assert_eq!(output.summary.success, 10);
        assert_eq!(output.summary.errors, 0);
    }
}
