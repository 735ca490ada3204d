//! Adaptive review sampling.
//!
//! Chooses which extraction records receive an independent review verdict,
//! under a budget that shrinks as the task stabilises. Low-confidence
//! records are taken first; the remaining budget is filled with independent
//! random draws so a silent regression in a uniformly-confident field can
//! still surface. Selection is reproducible given a seeded random source.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::{ExecutionStatus, ExtractionRecord, SamplingReason};

/// Floor rate used for iterations 10+ and for locked tasks.
pub const FLOOR_RATE: f64 = 0.05;

/// Review budget as a fraction of the run, by iteration number.
pub fn base_rate(iteration: u32) -> f64 {
    match iteration {
        0 => 1.0,
        1..=3 => 0.5,
        4..=9 => 0.2,
        _ => FLOOR_RATE,
    }
}

/// Thresholds deciding which records are priority-sampled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Overall confidence below which a record is priority tier.
    pub low_confidence_threshold: f64,
    /// Any single field below this floor puts the record in priority tier.
    pub field_confidence_floor: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            low_confidence_threshold: 0.6,
            field_confidence_floor: 0.5,
        }
    }
}

/// One (record, reason) pair in a sampling manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSelection {
    pub extraction_id: Uuid,
    pub reason: SamplingReason,
}

/// The set of records requiring review for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingManifest {
    pub iteration: u32,
    pub rate: f64,
    pub selections: Vec<SampleSelection>,
}

impl SamplingManifest {
    pub fn contains(&self, extraction_id: Uuid) -> bool {
        self.selections.iter().any(|s| s.extraction_id == extraction_id)
    }

    pub fn reason_for(&self, extraction_id: Uuid) -> Option<SamplingReason> {
        self.selections
            .iter()
            .find(|s| s.extraction_id == extraction_id)
            .map(|s| s.reason)
    }
}

/// Review-budget sampler.
#[derive(Debug, Clone, Default)]
pub struct AdaptiveSampler {
    config: SamplerConfig,
}

impl AdaptiveSampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    /// Select records for review at the iteration's base rate.
    ///
    /// `regression_fields` are fields flagged for renewed full sampling
    /// after a tier rollback: every record carrying one of them is selected
    /// outside the rate budget.
    pub fn select(
        &self,
        records: &[ExtractionRecord],
        iteration: u32,
        regression_fields: &HashSet<String>,
        force_full: bool,
        rng: &mut StdRng,
    ) -> SamplingManifest {
        let rate = if force_full { 1.0 } else { base_rate(iteration) };
        self.select_at_rate(records, iteration, rate, regression_fields, rng)
    }

    /// Select at the floor rate regardless of iteration. Used for locked
    /// tasks, which keep regression detection but no longer evolve.
    pub fn select_floor(
        &self,
        records: &[ExtractionRecord],
        iteration: u32,
        regression_fields: &HashSet<String>,
        rng: &mut StdRng,
    ) -> SamplingManifest {
        self.select_at_rate(records, iteration, FLOOR_RATE, regression_fields, rng)
    }

    fn select_at_rate(
        &self,
        records: &[ExtractionRecord],
        iteration: u32,
        rate: f64,
        regression_fields: &HashSet<String>,
        rng: &mut StdRng,
    ) -> SamplingManifest {
        let mut manifest = SamplingManifest { iteration, rate, selections: Vec::new() };
        if records.is_empty() {
            return manifest;
        }

        // Regression re-checks are selected first, outside the rate budget.
        let mut taken: HashSet<Uuid> = HashSet::new();
        for record in records {
            let flagged = record
                .fields
                .keys()
                .any(|field| regression_fields.contains(field));
            if flagged {
                taken.insert(record.id);
                manifest.selections.push(SampleSelection {
                    extraction_id: record.id,
                    reason: SamplingReason::RegressionCheck,
                });
            }
        }

        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let budget = ((records.len() as f64 * rate) as usize).max(1);

        let (priority, normal): (Vec<&ExtractionRecord>, Vec<&ExtractionRecord>) = records
            .iter()
            .filter(|r| !taken.contains(&r.id))
            .partition(|r| self.is_priority(r));

        // Priority tier first, up to the budget.
        for record in priority.iter().take(budget) {
            taken.insert(record.id);
            manifest.selections.push(SampleSelection {
                extraction_id: record.id,
                reason: SamplingReason::Priority,
            });
        }

        if rate >= 1.0 {
            // Full review: everything not yet taken.
            for record in records.iter().filter(|r| !taken.contains(&r.id)) {
                manifest.selections.push(SampleSelection {
                    extraction_id: record.id,
                    reason: SamplingReason::Full,
                });
            }
            return manifest;
        }

        // Fill the remaining budget with independent random draws, with a
        // floor of one draw per run so regression detection never starves.
        let remaining = budget.saturating_sub(priority.len().min(budget)).max(1);
        let drawn = normal.choose_multiple(rng, remaining.min(normal.len()));
        for record in drawn {
            manifest.selections.push(SampleSelection {
                extraction_id: record.id,
                reason: SamplingReason::Random,
            });
        }

        manifest
    }

    fn is_priority(&self, record: &ExtractionRecord) -> bool {
        if record.status == ExecutionStatus::Failed {
            return true;
        }
        if let Some(overall) = record.overall_confidence {
            if overall < self.config.low_confidence_threshold {
                return true;
            }
        }
        record.any_field_below(self.config.field_confidence_floor)
    }
}
