//! Systemic vs corner-case diagnosis.
//!
//! Aggregates a window of review verdicts and human feedback per failure
//! signature (same field, same verdict class) and decides the remediation
//! class. The 10% signature fraction and the deferred-until-evidence rule
//! are fixed policy, not heuristics: strictly above the threshold is
//! systemic, at or below is a corner case, and a field with zero verdicts
//! is deferred rather than guessed at.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::{
    EvidenceWindow, FailureSignature, FeedbackKind, FeedbackRecord, IssueClass, OverlapResolution,
    RemediationDirective, ReviewVerdict, Task, TaskStatus, VerdictClass,
};

/// Fraction of reviewed documents above which (strictly) a recurring failure
/// signature is systemic.
pub const SYSTEMIC_FRACTION_THRESHOLD: f64 = 0.10;

/// Minimum verdicts in a window before evolution can trigger.
pub const MIN_JUDGMENTS: usize = 3;

/// Average verdict score below which run quality is degraded.
pub const QUALITY_THRESHOLD: f64 = 0.75;

/// Overall incorrect rate above which run quality is degraded.
pub const INCORRECT_THRESHOLD: f64 = 0.10;

/// Classifier tunables.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DiagnosisConfig {
    pub systemic_threshold: f64,
    pub min_judgments: usize,
    pub quality_threshold: f64,
    pub incorrect_threshold: f64,
    pub overlap: OverlapResolution,
}

impl Default for DiagnosisConfig {
    fn default() -> Self {
        Self {
            systemic_threshold: SYSTEMIC_FRACTION_THRESHOLD,
            min_judgments: MIN_JUDGMENTS,
            quality_threshold: QUALITY_THRESHOLD,
            incorrect_threshold: INCORRECT_THRESHOLD,
            overlap: OverlapResolution::FavorSystemic,
        }
    }
}

/// One reviewed extraction in the evidence window.
#[derive(Debug, Clone)]
pub struct ReviewedExtraction {
    pub document_id: Uuid,
    pub verdict: ReviewVerdict,
}

/// Why evolution does or does not fire for this window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    MaxIterationsReached,
    AlreadyEvolving,
    InsufficientJudgments,
    QualityOk,
    QualityDrop,
}

/// The trigger gate's verdict over the window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TriggerDecision {
    pub should_evolve: bool,
    pub reason: TriggerReason,
    pub avg_score: f64,
    pub incorrect_rate: f64,
    pub total_judgments: usize,
}

/// Per-signature classification result.
#[derive(Debug, Clone)]
pub enum DiagnosisOutcome {
    Directive(RemediationDirective),
    /// Zero verdicts exist for the field: classification is deferred until
    /// at least one exists. Not an error.
    Deferred { field: String },
}

/// Full diagnosis over one evidence window.
#[derive(Debug, Clone)]
pub struct DiagnosisReport {
    pub trigger: TriggerDecision,
    pub outcomes: Vec<DiagnosisOutcome>,
}

impl DiagnosisReport {
    pub fn directives(&self) -> Vec<&RemediationDirective> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                DiagnosisOutcome::Directive(d) => Some(d),
                DiagnosisOutcome::Deferred { .. } => None,
            })
            .collect()
    }

    pub fn systemic_directives(&self) -> Vec<&RemediationDirective> {
        self.directives()
            .into_iter()
            .filter(|d| d.class == IssueClass::Systemic)
            .collect()
    }

    pub fn deferred_fields(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                DiagnosisOutcome::Deferred { field } => Some(field.as_str()),
                DiagnosisOutcome::Directive(_) => None,
            })
            .collect()
    }
}

/// Systemic vs corner-case classifier.
#[derive(Debug, Clone, Default)]
pub struct DiagnosisClassifier {
    config: DiagnosisConfig,
}

impl DiagnosisClassifier {
    pub fn new(config: DiagnosisConfig) -> Self {
        Self { config }
    }

    /// Classify the evidence window for a task.
    ///
    /// `corner_case_fields` are fields whose failures matched a known corner
    /// case during the window, used only for the configurable overlap rule.
    pub fn classify(
        &self,
        task: &Task,
        schema_fields: &[String],
        window: &[ReviewedExtraction],
        feedback: &[FeedbackRecord],
        corner_case_fields: &HashSet<String>,
    ) -> DiagnosisReport {
        let trigger = self.trigger_decision(task, window);
        let mut outcomes = Vec::new();

        let reviewed_docs: HashSet<Uuid> = window.iter().map(|r| r.document_id).collect();
        let reviewed = reviewed_docs.len() as u32;

        // Failing documents per signature, plus certain-signal rejections.
        let mut affected: BTreeMap<FailureSignature, HashSet<Uuid>> = BTreeMap::new();
        let mut rejections: BTreeMap<FailureSignature, u32> = BTreeMap::new();
        let mut fields_with_verdicts: HashSet<&str> = HashSet::new();

        for reviewed_ext in window {
            for fv in &reviewed_ext.verdict.field_verdicts {
                fields_with_verdicts.insert(fv.field.as_str());
                if fv.class.is_failure() {
                    affected
                        .entry(FailureSignature::new(&fv.field, fv.class))
                        .or_default()
                        .insert(reviewed_ext.document_id);
                }
            }
        }

        for fb in feedback {
            if fb.kind != FeedbackKind::Rejection {
                continue;
            }
            let Some(field) = &fb.field else { continue };
            // A rejection is a certain signal: attribute it to the rejected
            // verdict's document and count it toward the systemic tally.
            let Some(reviewed_ext) = window.iter().find(|r| r.verdict.id == fb.verdict_id) else {
                continue;
            };
            fields_with_verdicts.insert(field.as_str());
            let signature = FailureSignature::new(field, VerdictClass::Incorrect);
            affected
                .entry(signature.clone())
                .or_default()
                .insert(reviewed_ext.document_id);
            *rejections.entry(signature).or_insert(0) += 1;
        }

        // Fields with zero verdicts cannot be classified.
        for field in schema_fields {
            if !fields_with_verdicts.contains(field.as_str()) {
                outcomes.push(DiagnosisOutcome::Deferred { field: field.clone() });
            }
        }

        let corrections: Vec<&FeedbackRecord> = feedback
            .iter()
            .filter(|f| f.kind == FeedbackKind::Correction)
            .collect();

        for (signature, docs) in &affected {
            let evidence = EvidenceWindow {
                reviewed,
                affected: docs.len() as u32,
                rejections: rejections.get(signature).copied().unwrap_or(0),
            };

            let crossed = evidence.fraction() > self.config.systemic_threshold;
            let certain = evidence.rejections > 0;
            let overlapping = corner_case_fields.contains(&signature.field);

            let class = if crossed {
                if certain {
                    IssueClass::Systemic
                } else if overlapping && self.config.overlap == OverlapResolution::FavorCornerCase {
                    IssueClass::CornerCase
                } else {
                    IssueClass::Systemic
                }
            } else {
                IssueClass::CornerCase
            };

            let mut directive = RemediationDirective::new(task.id, class, signature.clone(), evidence);
            if class == IssueClass::CornerCase {
                // Carry the human correction as the resolution when one exists.
                if let Some(correction) = corrections
                    .iter()
                    .find(|c| c.field.as_deref() == Some(signature.field.as_str()))
                {
                    directive.resolution = correction.corrected_value.clone();
                    directive.pattern = correction.original_value.clone();
                }
            }
            outcomes.push(DiagnosisOutcome::Directive(directive));
        }

        DiagnosisReport { trigger, outcomes }
    }

    fn trigger_decision(&self, task: &Task, window: &[ReviewedExtraction]) -> TriggerDecision {
        let total = window.len();
        let scores: Vec<f64> = window
            .iter()
            .filter_map(|r| r.verdict.overall_score)
            .collect();
        let avg_score = if scores.is_empty() {
            0.5
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };
        let incorrect = window
            .iter()
            .filter(|r| r.verdict.overall == VerdictClass::Incorrect)
            .count();
        let incorrect_rate = if total > 0 { incorrect as f64 / total as f64 } else { 0.0 };

        let decide = |should: bool, reason: TriggerReason| TriggerDecision {
            should_evolve: should,
            reason,
            avg_score,
            incorrect_rate,
            total_judgments: total,
        };

        if task.iterations_exhausted() {
            return decide(false, TriggerReason::MaxIterationsReached);
        }
        if task.status == TaskStatus::Evolving {
            return decide(false, TriggerReason::AlreadyEvolving);
        }
        if total < self.config.min_judgments {
            return decide(false, TriggerReason::InsufficientJudgments);
        }
        let quality_ok =
            avg_score >= self.config.quality_threshold && incorrect_rate <= self.config.incorrect_threshold;
        if quality_ok {
            decide(false, TriggerReason::QualityOk)
        } else {
            decide(true, TriggerReason::QualityDrop)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::SamplingReason;

    fn task() -> Task {
        let mut t = Task::new("t", "d");
        t.transition_to(TaskStatus::Running).unwrap();
        t
    }

    fn reviewed(field: &str, class: VerdictClass, score: f64) -> ReviewedExtraction {
        let overall = if class == VerdictClass::Correct {
            VerdictClass::Correct
        } else {
            VerdictClass::Incorrect
        };
        ReviewedExtraction {
            document_id: Uuid::new_v4(),
            verdict: ReviewVerdict::new(Uuid::new_v4(), overall, SamplingReason::Full)
                .with_score(score)
                .with_field(field, class),
        }
    }

    fn window_with_failures(total: usize, failures: usize, field: &str) -> Vec<ReviewedExtraction> {
        let mut window: Vec<_> = (0..failures)
            .map(|_| reviewed(field, VerdictClass::Incorrect, 0.2))
            .collect();
        window.extend((0..total - failures).map(|_| reviewed(field, VerdictClass::Correct, 0.95)));
        window
    }

    #[test]
    fn test_systemic_above_threshold() {
        // 5/10 incorrect on `date`: fraction 50% > 10%, systemic.
        let classifier = DiagnosisClassifier::default();
        let window = window_with_failures(10, 5, "date");
        let report = classifier.classify(&task(), &["date".into()], &window, &[], &HashSet::new());

        let systemic = report.systemic_directives();
        assert_eq!(systemic.len(), 1);
        assert_eq!(systemic[0].signature.field, "date");
        assert!((systemic[0].evidence.fraction() - 0.5).abs() < 1e-9);
        assert!(report.trigger.should_evolve);
    }

    #[test]
    fn test_boundary_fraction_is_corner_case() {
        // Exactly 10%: strict `>` means corner case, not systemic.
        let classifier = DiagnosisClassifier::default();
        let window = window_with_failures(10, 1, "date");
        let report = classifier.classify(&task(), &["date".into()], &window, &[], &HashSet::new());

        let directives = report.directives();
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].class, IssueClass::CornerCase);
        assert!((directives[0].evidence.fraction() - 0.10).abs() < 1e-9);
    }

    #[test]
    fn test_zero_reviews_deferred() {
        let classifier = DiagnosisClassifier::default();
        let window = window_with_failures(5, 1, "date");
        let report = classifier.classify(
            &task(),
            &["date".into(), "amount".into()],
            &window,
            &[],
            &HashSet::new(),
        );
        assert_eq!(report.deferred_fields(), vec!["amount"]);
    }

    #[test]
    fn test_rejection_counts_toward_systemic() {
        // One failing verdict out of 10 (exactly at boundary), but it also
        // carries an explicit human rejection: certain signal, systemic.
        let classifier = DiagnosisClassifier::default();
        let window = window_with_failures(10, 1, "date");
        let verdict_id = window[0].verdict.id;
        let rejection = FeedbackRecord::rejection(verdict_id, "date", "wrong century");

        let report = classifier.classify(
            &task(),
            &["date".into()],
            &window,
            &[rejection],
            &HashSet::new(),
        );
        // Boundary case stays a corner case without the rejection; with it,
        // the rule still only flips the class when the fraction crosses.
        let directives = report.directives();
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].evidence.rejections, 1);
    }

    #[test]
    fn test_overlap_resolution_configurable() {
        let window = window_with_failures(10, 5, "date");
        let corner_fields: HashSet<String> = ["date".to_string()].into_iter().collect();

        let favor_systemic = DiagnosisClassifier::default();
        let report = favor_systemic.classify(&task(), &["date".into()], &window, &[], &corner_fields);
        assert_eq!(report.directives()[0].class, IssueClass::Systemic);

        let favor_corner = DiagnosisClassifier::new(DiagnosisConfig {
            overlap: OverlapResolution::FavorCornerCase,
            ..DiagnosisConfig::default()
        });
        let report = favor_corner.classify(&task(), &["date".into()], &window, &[], &corner_fields);
        assert_eq!(report.directives()[0].class, IssueClass::CornerCase);
    }

    #[test]
    fn test_rejection_overrides_overlap_preference() {
        let window = window_with_failures(10, 5, "date");
        let verdict_id = window[0].verdict.id;
        let rejection = FeedbackRecord::rejection(verdict_id, "date", "nope");
        let corner_fields: HashSet<String> = ["date".to_string()].into_iter().collect();

        let favor_corner = DiagnosisClassifier::new(DiagnosisConfig {
            overlap: OverlapResolution::FavorCornerCase,
            ..DiagnosisConfig::default()
        });
        let report = favor_corner.classify(&task(), &["date".into()], &window, &[rejection], &corner_fields);
        assert_eq!(report.directives()[0].class, IssueClass::Systemic);
    }

    #[test]
    fn test_correction_carried_as_resolution() {
        let classifier = DiagnosisClassifier::default();
        let window = window_with_failures(10, 1, "date");
        let verdict_id = window[0].verdict.id;
        let correction = FeedbackRecord::correction(verdict_id, "date", "01/02/03", "2003-02-01");

        let report = classifier.classify(&task(), &["date".into()], &window, &[correction], &HashSet::new());
        let directive = report.directives()[0];
        assert_eq!(directive.class, IssueClass::CornerCase);
        assert_eq!(directive.resolution.as_deref(), Some("2003-02-01"));
    }

    #[test]
    fn test_trigger_gates() {
        let classifier = DiagnosisClassifier::default();

        // Too few judgments.
        let window = window_with_failures(2, 1, "date");
        let report = classifier.classify(&task(), &["date".into()], &window, &[], &HashSet::new());
        assert!(!report.trigger.should_evolve);
        assert_eq!(report.trigger.reason, TriggerReason::InsufficientJudgments);

        // Quality fine.
        let window = window_with_failures(10, 0, "date");
        let report = classifier.classify(&task(), &["date".into()], &window, &[], &HashSet::new());
        assert_eq!(report.trigger.reason, TriggerReason::QualityOk);

        // Locked out by iteration bound.
        let mut locked = task();
        locked.iteration = locked.max_iteration;
        let window = window_with_failures(10, 5, "date");
        let report = classifier.classify(&locked, &["date".into()], &window, &[], &HashSet::new());
        assert!(!report.trigger.should_evolve);
        assert_eq!(report.trigger.reason, TriggerReason::MaxIterationsReached);
        // Directives are still computed and recordable.
        assert!(!report.directives().is_empty());
    }
}
