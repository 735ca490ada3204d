//! Composite confidence scoring.
//!
//! Combines five raw per-field signals into one composite score in [0,1].
//! Pure functions of their inputs: a missing signal is substituted with a
//! conservative default instead of failing the computation.

use crate::domain::models::{
    ConfidenceBreakdown, ConfidenceSignals, ConfidenceWeights, ExtractionRecord, FieldConfidence,
    VerdictClass,
};

/// Conservative stand-in for any absent signal.
pub const MISSING_SIGNAL_DEFAULT: f64 = 0.5;

/// Score assigned to a field whose extracted value is null or absent.
pub const MISSING_VALUE_SCORE: f64 = 0.1;

/// Component value when a known corner case matched the document. A match
/// means the default logic was overridden, so the value is less certain.
const CORNER_CASE_MATCHED: f64 = 0.3;
const CORNER_CASE_UNMATCHED: f64 = 0.7;

/// One (breakdown, verdict) pair used to calibrate weights.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationSample {
    pub breakdown: ConfidenceBreakdown,
    pub verdict: VerdictClass,
}

/// Weighted composite confidence evaluator.
#[derive(Debug, Clone)]
pub struct ConfidenceEvaluator {
    weights: ConfidenceWeights,
}

impl Default for ConfidenceEvaluator {
    fn default() -> Self {
        Self::new(ConfidenceWeights::default())
    }
}

impl ConfidenceEvaluator {
    pub fn new(weights: ConfidenceWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ConfidenceWeights {
        &self.weights
    }

    /// Composite score for one field value.
    ///
    /// `value_present` is false when extraction produced null/nothing; such
    /// fields get a fixed floor score rather than a weighted composite.
    pub fn score_field(&self, value_present: bool, signals: &ConfidenceSignals) -> FieldConfidence {
        let breakdown = ConfidenceBreakdown {
            self_confidence: signals.self_confidence.unwrap_or(MISSING_SIGNAL_DEFAULT),
            method_prior: signals.method_prior.unwrap_or(MISSING_SIGNAL_DEFAULT),
            historical_accuracy: signals.historical_accuracy.unwrap_or(MISSING_SIGNAL_DEFAULT),
            source_clarity: signals.source_clarity.unwrap_or(MISSING_SIGNAL_DEFAULT),
            corner_case_match: match signals.corner_case_matched {
                Some(true) => CORNER_CASE_MATCHED,
                Some(false) => CORNER_CASE_UNMATCHED,
                None => MISSING_SIGNAL_DEFAULT,
            },
        };

        let score = if value_present {
            let w = &self.weights;
            let total = w.self_confidence * breakdown.self_confidence
                + w.method_prior * breakdown.method_prior
                + w.historical_accuracy * breakdown.historical_accuracy
                + w.source_clarity * breakdown.source_clarity
                + w.corner_case_match * breakdown.corner_case_match;
            total.clamp(0.0, 1.0)
        } else {
            MISSING_VALUE_SCORE
        };

        FieldConfidence { score, breakdown }
    }

    /// Fill in per-field composites and the overall mean on a freshly built
    /// record, from the values and raw signals it carries.
    pub fn score_record(&self, record: &mut ExtractionRecord) {
        let signals = record.signals.clone();
        for (field, field_signals) in &signals {
            let value_present = record
                .fields
                .get(field)
                .is_some_and(|v| !v.is_null());
            record
                .field_confidences
                .insert(field.clone(), self.score_field(value_present, field_signals));
        }
        record.overall_confidence = overall(record);
    }

    /// Adjust weights against review verdicts.
    ///
    /// Components whose values separate correct from incorrect verdicts gain
    /// weight; components that do not discriminate lose it. This is the
    /// engine's only continuous-learning signal. Returns the current weights
    /// unchanged when the sample set lacks both classes.
    pub fn calibrate(&self, samples: &[CalibrationSample], learning_rate: f64) -> ConfidenceWeights {
        let (correct, incorrect): (Vec<_>, Vec<_>) = samples
            .iter()
            .partition(|s| s.verdict == VerdictClass::Correct);

        if correct.is_empty() || incorrect.is_empty() {
            return self.weights;
        }

        let mean = |set: &[&CalibrationSample], f: fn(&ConfidenceBreakdown) -> f64| -> f64 {
            set.iter().map(|s| f(&s.breakdown)).sum::<f64>() / set.len() as f64
        };

        let adjust = |weight: f64, f: fn(&ConfidenceBreakdown) -> f64| -> f64 {
            let separation = mean(&correct, f) - mean(&incorrect, f);
            (weight * (1.0 + learning_rate * separation)).clamp(0.05, 0.60)
        };

        let mut weights = ConfidenceWeights {
            self_confidence: adjust(self.weights.self_confidence, |b| b.self_confidence),
            method_prior: adjust(self.weights.method_prior, |b| b.method_prior),
            historical_accuracy: adjust(self.weights.historical_accuracy, |b| b.historical_accuracy),
            source_clarity: adjust(self.weights.source_clarity, |b| b.source_clarity),
            corner_case_match: adjust(self.weights.corner_case_match, |b| b.corner_case_match),
        };
        weights.normalize();
        weights
    }
}

/// Mean of the per-field composites, if any were computed.
pub fn overall(record: &ExtractionRecord) -> Option<f64> {
    if record.field_confidences.is_empty() {
        return None;
    }
    let sum: f64 = record.field_confidences.values().map(|c| c.score).sum();
    Some(sum / record.field_confidences.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn full_signals() -> ConfidenceSignals {
        ConfidenceSignals {
            self_confidence: Some(0.9),
            method_prior: Some(0.7),
            historical_accuracy: Some(0.8),
            source_clarity: Some(0.8),
            corner_case_matched: Some(false),
        }
    }

    #[test]
    fn test_weighted_sum_with_defaults() {
        let evaluator = ConfidenceEvaluator::default();
        let fc = evaluator.score_field(true, &full_signals());
        // 0.3*0.9 + 0.15*0.7 + 0.25*0.8 + 0.2*0.8 + 0.1*0.7 = 0.805
        assert!((fc.score - 0.805).abs() < 1e-9);
    }

    #[test]
    fn test_missing_signals_never_fail() {
        let evaluator = ConfidenceEvaluator::default();
        let fc = evaluator.score_field(true, &ConfidenceSignals::default());
        assert!(fc.score > 0.0 && fc.score <= 1.0);
        assert!((fc.breakdown.self_confidence - MISSING_SIGNAL_DEFAULT).abs() < 1e-9);
        assert!((fc.breakdown.historical_accuracy - MISSING_SIGNAL_DEFAULT).abs() < 1e-9);
    }

    #[test]
    fn test_score_always_in_unit_interval() {
        let evaluator = ConfidenceEvaluator::default();
        let extremes = [0.0, 1.0, 0.5];
        for &a in &extremes {
            for &b in &extremes {
                let signals = ConfidenceSignals {
                    self_confidence: Some(a),
                    method_prior: Some(b),
                    historical_accuracy: Some(a),
                    source_clarity: Some(b),
                    corner_case_matched: Some(a > 0.5),
                };
                let fc = evaluator.score_field(true, &signals);
                assert!((0.0..=1.0).contains(&fc.score));
            }
        }
    }

    #[test]
    fn test_null_value_floor() {
        let evaluator = ConfidenceEvaluator::default();
        let fc = evaluator.score_field(false, &full_signals());
        assert!((fc.score - MISSING_VALUE_SCORE).abs() < 1e-9);
    }

    #[test]
    fn test_corner_case_match_lowers_score() {
        let evaluator = ConfidenceEvaluator::default();
        let mut signals = full_signals();
        let unmatched = evaluator.score_field(true, &signals).score;
        signals.corner_case_matched = Some(true);
        let matched = evaluator.score_field(true, &signals).score;
        assert!(matched < unmatched);
    }

    #[test]
    fn test_score_record_fills_overall() {
        let evaluator = ConfidenceEvaluator::default();
        let mut record = ExtractionRecord::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), 0);
        record.fields.insert("date".into(), serde_json::json!("2024-01-01"));
        record.fields.insert("amount".into(), serde_json::Value::Null);
        record.signals.insert("date".into(), full_signals());
        record.signals.insert("amount".into(), ConfidenceSignals::default());

        evaluator.score_record(&mut record);

        assert_eq!(record.field_confidences.len(), 2);
        let overall = record.overall_confidence.unwrap();
        assert!((0.0..=1.0).contains(&overall));
        assert!((record.field_confidences["amount"].score - MISSING_VALUE_SCORE).abs() < 1e-9);
    }

    #[test]
    fn test_calibration_rewards_discriminating_component() {
        let evaluator = ConfidenceEvaluator::default();
        let high = ConfidenceBreakdown {
            self_confidence: 0.9,
            method_prior: 0.5,
            historical_accuracy: 0.5,
            source_clarity: 0.5,
            corner_case_match: 0.5,
        };
        let low = ConfidenceBreakdown { self_confidence: 0.2, ..high };

        let samples: Vec<CalibrationSample> = (0..10)
            .map(|i| {
                if i % 2 == 0 {
                    CalibrationSample { breakdown: high, verdict: VerdictClass::Correct }
                } else {
                    CalibrationSample { breakdown: low, verdict: VerdictClass::Incorrect }
                }
            })
            .collect();

        let calibrated = evaluator.calibrate(&samples, 0.5);
        assert!(calibrated.self_confidence > evaluator.weights().self_confidence);
        assert!((calibrated.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_calibration_noop_without_both_classes() {
        let evaluator = ConfidenceEvaluator::default();
        let samples = vec![CalibrationSample {
            breakdown: ConfidenceBreakdown {
                self_confidence: 0.9,
                method_prior: 0.5,
                historical_accuracy: 0.5,
                source_clarity: 0.5,
                corner_case_match: 0.5,
            },
            verdict: VerdictClass::Correct,
        }];
        let calibrated = evaluator.calibrate(&samples, 0.5);
        assert_eq!(calibrated, *evaluator.weights());
    }
}
