use proptest::prelude::*;

use anyextract::domain::models::{ConfidenceSignals, ConfidenceWeights};
use anyextract::services::ConfidenceEvaluator;

fn arb_signal() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![Just(None), (0.0f64..=1.0).prop_map(Some)]
}

fn arb_signals() -> impl Strategy<Value = ConfidenceSignals> {
    (
        arb_signal(),
        arb_signal(),
        arb_signal(),
        arb_signal(),
        proptest::option::of(any::<bool>()),
    )
        .prop_map(|(self_confidence, method_prior, historical_accuracy, source_clarity, corner)| {
            ConfidenceSignals {
                self_confidence,
                method_prior,
                historical_accuracy,
                source_clarity,
                corner_case_matched: corner,
            }
        })
}

fn arb_weights() -> impl Strategy<Value = ConfidenceWeights> {
    (
        0.0f64..=1.0,
        0.0f64..=1.0,
        0.0f64..=1.0,
        0.0f64..=1.0,
        0.0f64..=1.0,
    )
        .prop_map(|(a, b, c, d, e)| ConfidenceWeights {
            self_confidence: a,
            method_prior: b,
            historical_accuracy: c,
            source_clarity: d,
            corner_case_match: e,
        })
}

proptest! {
    #[test]
    fn composite_score_stays_in_unit_interval(
        weights in arb_weights(),
        signals in arb_signals(),
        value_present in any::<bool>(),
    ) {
        let evaluator = ConfidenceEvaluator::new(weights);
        let confidence = evaluator.score_field(value_present, &signals);
        prop_assert!((0.0..=1.0).contains(&confidence.score));
    }

    #[test]
    fn missing_value_scores_lower_than_any_present_value(
        signals in arb_signals(),
    ) {
        let evaluator = ConfidenceEvaluator::default();
        let absent = evaluator.score_field(false, &signals);
        prop_assert!((absent.score - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn all_signals_missing_defaults_to_midpoint_components(
        value_present in any::<bool>(),
    ) {
        let evaluator = ConfidenceEvaluator::default();
        let confidence = evaluator.score_field(value_present, &ConfidenceSignals::default());
        prop_assert!((confidence.breakdown.self_confidence - 0.5).abs() < f64::EPSILON);
        prop_assert!((confidence.breakdown.source_clarity - 0.5).abs() < f64::EPSILON);
    }
}
