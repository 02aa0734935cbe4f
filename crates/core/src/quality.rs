//! Per-record quality scoring.
//!
//! The score starts at `1.0`, loses [`ERROR_PENALTY`] per validation error
//! and [`MISSING_FIELD_PENALTY`] per missing important field of the target
//! entity, and is clamped to `[0, 1]`.

use crate::entity::TargetEntity;
use crate::error::CoreError;
use crate::field_value::RawRecord;

/// Penalty per validation (or transformation) error.
pub const ERROR_PENALTY: f64 = 0.2;

/// Penalty per missing important field.
pub const MISSING_FIELD_PENALTY: f64 = 0.1;

/// Default minimum score for a record to be imported.
pub const DEFAULT_QUALITY_THRESHOLD: f64 = 0.95;

/// Compute the quality score from an error count and a missing-field count.
///
/// Non-increasing in both arguments.
pub fn quality_score(error_count: usize, missing_important: usize) -> f64 {
    let raw = 1.0
        - ERROR_PENALTY * error_count as f64
        - MISSING_FIELD_PENALTY * missing_important as f64;
    // Round away float noise so 1.0 - 0.1 compares equal to 0.9.
    ((raw * 1000.0).round() / 1000.0).clamp(0.0, 1.0)
}

/// Important fields of `entity` that are absent or empty in `data`.
pub fn missing_important_fields(data: &RawRecord, entity: TargetEntity) -> Vec<&'static str> {
    entity
        .important_fields()
        .iter()
        .copied()
        .filter(|f| data.get(*f).map_or(true, |v| v.is_empty()))
        .collect()
}

/// Score a transformed record.
pub fn score_record(data: &RawRecord, entity: TargetEntity, error_count: usize) -> f64 {
    quality_score(error_count, missing_important_fields(data, entity).len())
}

/// Whether `score` clears `threshold`.
pub fn meets_threshold(score: f64, threshold: f64) -> bool {
    score >= threshold
}

/// Validate a configured quality threshold.
pub fn validate_threshold(threshold: f64) -> Result<(), CoreError> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(CoreError::Validation(format!(
            "Quality threshold must be between 0 and 1, got {threshold}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_value::FieldValue;

    fn record(pairs: &[(&str, &str)]) -> RawRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), FieldValue::from_cell(v)))
            .collect()
    }

    #[test]
    fn perfect_record_scores_one() {
        assert_eq!(quality_score(0, 0), 1.0);
    }

    #[test]
    fn one_missing_field_scores_point_nine() {
        let data = record(&[("name", "Acme"), ("type", "company")]);
        assert_eq!(score_record(&data, TargetEntity::Client, 0), 0.9);
        assert!(!meets_threshold(0.9, DEFAULT_QUALITY_THRESHOLD));
    }

    #[test]
    fn score_is_floored_at_zero() {
        assert_eq!(quality_score(10, 3), 0.0);
    }

    #[test]
    fn score_is_non_increasing() {
        let mut last = f64::INFINITY;
        for errors in 0..6 {
            for missing in 0..4 {
                let s = quality_score(errors, missing);
                assert!((0.0..=1.0).contains(&s));
                assert!(s <= quality_score(errors.saturating_sub(1), missing));
                assert!(s <= quality_score(errors, missing.saturating_sub(1)));
            }
            let row_max = quality_score(errors, 0);
            assert!(row_max <= last);
            last = row_max;
        }
    }

    #[test]
    fn blank_values_count_as_missing() {
        let data = record(&[("name", " "), ("email", "a@b.co"), ("type", "company")]);
        assert_eq!(missing_important_fields(&data, TargetEntity::Client), vec!["name"]);
    }

    #[test]
    fn threshold_bounds() {
        assert!(validate_threshold(0.95).is_ok());
        assert!(validate_threshold(1.2).is_err());
        assert!(validate_threshold(-0.1).is_err());
    }
}
