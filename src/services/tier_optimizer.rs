//! Per-field model-tier optimization.
//!
//! Walks each field down the worker-model ladder one step at a time as
//! review evidence accumulates, and walks it straight back up on regression.
//! A downgrade needs a sustained accuracy record at the current tier; a
//! rollback needs only a regression signal, because cost savings never
//! outrank accuracy.

use std::collections::{BTreeMap, HashSet};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::models::FieldStrategy;

/// Accuracy a tier must sustain before the next cheaper tier is tried.
pub const ACCURACY_BAR: f64 = 0.95;

/// Review observations required before the accuracy record counts.
pub const MIN_OBSERVATIONS: u32 = 20;

/// Downgrade gate tunables.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TierPolicy {
    pub accuracy_bar: f64,
    pub min_observations: u32,
}

impl Default for TierPolicy {
    fn default() -> Self {
        Self { accuracy_bar: ACCURACY_BAR, min_observations: MIN_OBSERVATIONS }
    }
}

/// Review-backed accuracy record for one field at one tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccuracyStats {
    pub observations: u32,
    pub correct: u32,
}

impl AccuracyStats {
    pub fn record(&mut self, correct: bool) {
        self.observations += 1;
        if correct {
            self.correct += 1;
        }
    }

    pub fn accuracy(&self) -> Option<f64> {
        if self.observations == 0 {
            return None;
        }
        Some(f64::from(self.correct) / f64::from(self.observations))
    }

    /// Whether this record clears the downgrade gate.
    pub fn meets(&self, policy: &TierPolicy) -> bool {
        self.observations >= policy.min_observations
            && self.accuracy().is_some_and(|a| a >= policy.accuracy_bar)
    }
}

/// Mutable tier-tracking state for one field across evolving cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldTierState {
    pub field: String,
    pub current: usize,
    /// Tier to restore on regression. Always at or above `current`.
    pub last_known_good: usize,
    stats: BTreeMap<usize, AccuracyStats>,
    downgraded_this_cycle: bool,
}

impl FieldTierState {
    pub fn new(field: impl Into<String>, tier: usize) -> Self {
        Self {
            field: field.into(),
            current: tier,
            last_known_good: tier,
            stats: BTreeMap::new(),
            downgraded_this_cycle: false,
        }
    }

    /// Record one review outcome for this field at the tier that produced it.
    pub fn record_outcome(&mut self, tier: usize, correct: bool) {
        self.stats.entry(tier).or_default().record(correct);
    }

    pub fn stats_at(&self, tier: usize) -> AccuracyStats {
        self.stats.get(&tier).copied().unwrap_or_default()
    }

    /// Reset the per-cycle downgrade latch. Call once at the start of each
    /// evolving cycle; the latch is what keeps downgrades single-step.
    pub fn begin_cycle(&mut self) {
        self.downgraded_this_cycle = false;
    }
}

/// Outcome of evaluating one field in one evolving cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TierDecision {
    Hold,
    /// Try the next cheaper tier; `from` becomes the rollback target.
    Downgrade { from: usize, to: usize },
    /// Regression after a downgrade: restore the last tier known to hold the
    /// accuracy bar.
    Rollback { from: usize, to: usize },
}

/// One-step-at-a-time ladder walker.
#[derive(Debug, Clone)]
pub struct TierOptimizer {
    policy: TierPolicy,
    ladder_len: usize,
}

impl TierOptimizer {
    pub fn new(policy: TierPolicy, ladder_len: usize) -> Self {
        Self { policy, ladder_len }
    }

    /// Decide the field's tier for the next iteration and update state to
    /// match. Rollback wins over everything; a downgrade requires a cleared
    /// accuracy record and at most one step per cycle.
    pub fn evaluate(&self, state: &mut FieldTierState, regression_detected: bool) -> TierDecision {
        if regression_detected && state.current > state.last_known_good {
            let from = state.current;
            let to = state.last_known_good;
            state.current = to;
            // The cheaper tier failed in production; its record starts over.
            state.stats.remove(&from);
            return TierDecision::Rollback { from, to };
        }

        if state.downgraded_this_cycle {
            return TierDecision::Hold;
        }
        let next = state.current + 1;
        if next >= self.ladder_len {
            return TierDecision::Hold;
        }
        if !state.stats_at(state.current).meets(&self.policy) {
            return TierDecision::Hold;
        }

        let from = state.current;
        state.last_known_good = from;
        state.current = next;
        state.downgraded_this_cycle = true;
        TierDecision::Downgrade { from, to: next }
    }

    /// Evaluate every tracked field. `regressed_fields` come from the
    /// diagnosis pass (a failure signature on a field currently running
    /// below its last known good tier).
    pub fn decide_all(
        &self,
        states: &mut BTreeMap<String, FieldTierState>,
        regressed_fields: &HashSet<String>,
    ) -> Vec<(String, TierDecision)> {
        let mut decisions = Vec::new();
        for (field, state) in states.iter_mut() {
            state.begin_cycle();
            let regressed = regressed_fields.contains(field);
            let decision = self.evaluate(state, regressed);
            if decision != TierDecision::Hold {
                decisions.push((field.clone(), decision));
            }
        }
        decisions
    }
}

/// Candidate capture patterns for migrating a field off inference entirely.
/// A field qualifies only when every reviewed-correct value matches the same
/// pattern; the produced strategy keeps the current tier as fallback.
const MIGRATION_TEMPLATES: &[&str] = &[
    r"^\d{4}-\d{2}-\d{2}$",
    r"^\d+\.\d{2}$",
    r"^\d+$",
    r"^[A-Z]{2,5}-\d+$",
];

/// Infer a deterministic capture rule covering all observed values, if one of
/// the known templates does.
pub fn migration_candidate(values: &[&str]) -> Option<String> {
    if values.is_empty() {
        return None;
    }
    for template in MIGRATION_TEMPLATES {
        let re = Regex::new(template).ok()?;
        if values.iter().all(|v| re.is_match(v)) {
            return Some((*template).to_string());
        }
    }
    None
}

/// Strategy replacing a model tier with a deterministic rule. The fallback
/// tier stays at the field's current position so an unmatched document still
/// resolves.
pub fn migrated_strategy(pattern: String, state: &FieldTierState) -> FieldStrategy {
    FieldStrategy::DeterministicRule { pattern, fallback_tier: state.current }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder4() -> TierOptimizer {
        TierOptimizer::new(TierPolicy::default(), 4)
    }

    fn state_with_record(tier: usize, correct: u32, total: u32) -> FieldTierState {
        let mut state = FieldTierState::new("broker_name", tier);
        for i in 0..total {
            state.record_outcome(tier, i < correct);
        }
        state
    }

    #[test]
    fn test_downgrade_after_sustained_accuracy() {
        let optimizer = ladder4();
        let mut state = state_with_record(0, 20, 20);
        let decision = optimizer.evaluate(&mut state, false);
        assert_eq!(decision, TierDecision::Downgrade { from: 0, to: 1 });
        assert_eq!(state.current, 1);
        assert_eq!(state.last_known_good, 0);
    }

    #[test]
    fn test_no_downgrade_below_min_observations() {
        // 19 perfect observations is one short of the evidence floor.
        let optimizer = ladder4();
        let mut state = state_with_record(0, 19, 19);
        assert_eq!(optimizer.evaluate(&mut state, false), TierDecision::Hold);
        assert_eq!(state.current, 0);
    }

    #[test]
    fn test_no_downgrade_below_accuracy_bar() {
        // 94% over 50 observations.
        let optimizer = ladder4();
        let mut state = state_with_record(0, 47, 50);
        assert_eq!(optimizer.evaluate(&mut state, false), TierDecision::Hold);
    }

    #[test]
    fn test_single_step_per_cycle() {
        let optimizer = ladder4();
        let mut state = state_with_record(0, 25, 25);
        assert!(matches!(optimizer.evaluate(&mut state, false), TierDecision::Downgrade { .. }));

        // Even with a perfect (stale) record at the new tier, no second step
        // until a new cycle begins.
        for _ in 0..30 {
            state.record_outcome(1, true);
        }
        assert_eq!(optimizer.evaluate(&mut state, false), TierDecision::Hold);

        state.begin_cycle();
        assert_eq!(optimizer.evaluate(&mut state, false), TierDecision::Downgrade { from: 1, to: 2 });
    }

    #[test]
    fn test_bottom_of_ladder_holds() {
        let optimizer = ladder4();
        let mut state = state_with_record(3, 40, 40);
        assert_eq!(optimizer.evaluate(&mut state, false), TierDecision::Hold);
    }

    #[test]
    fn test_regression_restores_prior_tier() {
        let optimizer = ladder4();
        let mut state = state_with_record(0, 25, 25);
        optimizer.evaluate(&mut state, false);
        assert_eq!(state.current, 1);

        state.begin_cycle();
        state.record_outcome(1, false);
        let decision = optimizer.evaluate(&mut state, true);
        assert_eq!(decision, TierDecision::Rollback { from: 1, to: 0 });
        assert_eq!(state.current, 0);
        // The failed tier's record is discarded.
        assert_eq!(state.stats_at(1), AccuracyStats::default());
    }

    #[test]
    fn test_regression_at_last_known_good_is_hold() {
        // A failure signature on a field that never downgraded is a pipeline
        // problem, not a tier problem.
        let optimizer = ladder4();
        let mut state = state_with_record(0, 10, 20);
        assert_eq!(optimizer.evaluate(&mut state, true), TierDecision::Hold);
    }

    #[test]
    fn test_decide_all_skips_holds() {
        let optimizer = ladder4();
        let mut states = BTreeMap::new();
        states.insert("date".to_string(), state_with_record(0, 25, 25));
        states.insert("amount".to_string(), state_with_record(0, 3, 10));

        let decisions = optimizer.decide_all(&mut states, &HashSet::new());
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].0, "date");
    }

    #[test]
    fn test_migration_candidate_inference() {
        assert_eq!(
            migration_candidate(&["2024-01-01", "2023-12-31"]).as_deref(),
            Some(r"^\d{4}-\d{2}-\d{2}$")
        );
        assert_eq!(migration_candidate(&["10.50", "3.99"]).as_deref(), Some(r"^\d+\.\d{2}$"));
        assert_eq!(migration_candidate(&["2024-01-01", "free text"]), None);
        assert_eq!(migration_candidate(&[]), None);
    }

    #[test]
    fn test_migrated_strategy_keeps_fallback() {
        let state = state_with_record(2, 25, 25);
        let strategy = migrated_strategy(r"^\d+$".to_string(), &state);
        assert_eq!(strategy, FieldStrategy::DeterministicRule {
            pattern: r"^\d+$".to_string(),
            fallback_tier: 2,
        });
        assert!(strategy.is_zero_inference());
    }
}
