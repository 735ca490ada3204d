//! The evolution control loop.
//!
//! Owns the bootstrap -> run <-> evolve -> lock lifecycle for every task.
//! Evolving cycles for one task are serialized behind a per-task lock;
//! different tasks evolve independently. Cancellation is honored only
//! between state transitions, never mid-mutation, so an aborted cycle
//! leaves the previous workflow version active and intact.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::try_join_all;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    CornerCase, Document, EngineConfig, EventKind, EvolutionEvent, ExtractionRecord, FieldDef,
    FieldStrategy, IssueClass, RemediationDirective, ResolutionKind, ReviewVerdict, SchemaVersion,
    Task, TaskStatus, VerdictClass, WorkflowVersion,
};
use crate::domain::ports::{
    CornerCaseRepository, DocumentRepository, EventRepository, ExtractionRepository, ReviewJudge,
    ReviewRepository, TaskRepository, WorkflowRepository, WorkflowRewriter,
};
use crate::services::confidence::{CalibrationSample, ConfidenceEvaluator};
use crate::services::diagnosis::{DiagnosisClassifier, DiagnosisConfig, DiagnosisReport, ReviewedExtraction, TriggerReason};
use crate::services::sampler::{AdaptiveSampler, SamplerConfig, SamplingManifest};
use crate::services::strategy::StrategyExecutor;
use crate::services::tier_optimizer::{
    migrated_strategy, migration_candidate, FieldTierState, TierDecision, TierOptimizer, TierPolicy,
};

/// Multiplicative step used when calibrating confidence weights.
const CALIBRATION_RATE: f64 = 0.3;

/// Documents probed during post-rewrite re-verification when no bootstrap
/// sample set exists.
const REVERIFY_PROBE_LIMIT: usize = 3;

/// Everything the engine persists through or delegates to.
#[derive(Clone)]
pub struct EngineDeps {
    pub tasks: Arc<dyn TaskRepository>,
    pub documents: Arc<dyn DocumentRepository>,
    pub extractions: Arc<dyn ExtractionRepository>,
    pub reviews: Arc<dyn ReviewRepository>,
    pub workflows: Arc<dyn WorkflowRepository>,
    pub corner_cases: Arc<dyn CornerCaseRepository>,
    pub events: Arc<dyn EventRepository>,
    pub judge: Arc<dyn ReviewJudge>,
    pub rewriter: Arc<dyn WorkflowRewriter>,
}

/// Summary of one extraction run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub iteration: u32,
    pub extracted: usize,
    pub reviewed: usize,
    pub manifest: SamplingManifest,
}

/// Result of one evolve attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum EvolutionOutcome {
    /// The trigger gate did not fire.
    NotTriggered { reason: TriggerReason },
    /// The task is locked: directives were recorded but not applied.
    LockedRefusal { directives_recorded: usize },
    /// Diagnosis ran but produced no change to apply.
    NoChange,
    /// A successor workflow version was activated and survived
    /// re-verification.
    Applied { workflow_version: u32 },
    /// The successor failed re-verification; the prior version is active
    /// again.
    RolledBack { restored_version: u32 },
}

pub struct EvolutionEngine {
    deps: EngineDeps,
    executor: StrategyExecutor,
    sampler: AdaptiveSampler,
    config: EngineConfig,
    tier_ladder: Vec<String>,
    task_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
    tier_states: Mutex<HashMap<Uuid, BTreeMap<String, FieldTierState>>>,
    regression_fields: Mutex<HashMap<Uuid, HashSet<String>>>,
    cancel_requested: AtomicBool,
}

impl EvolutionEngine {
    pub fn new(
        deps: EngineDeps,
        executor: StrategyExecutor,
        config: EngineConfig,
        tier_ladder: Vec<String>,
    ) -> Self {
        let sampler = AdaptiveSampler::new(SamplerConfig {
            low_confidence_threshold: config.low_confidence_threshold,
            field_confidence_floor: config.field_confidence_floor,
        });
        Self {
            deps,
            executor,
            sampler,
            config,
            tier_ladder,
            task_locks: Mutex::new(HashMap::new()),
            tier_states: Mutex::new(HashMap::new()),
            regression_fields: Mutex::new(HashMap::new()),
            cancel_requested: AtomicBool::new(false),
        }
    }

    /// Request that the in-flight or next evolving cycle stop at its next
    /// transition boundary. Never interrupts a mutation in progress.
    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
    }

    fn take_cancel(&self) -> bool {
        self.cancel_requested.swap(false, Ordering::SeqCst)
    }

    async fn guard(&self, task_id: Uuid) -> Arc<Mutex<()>> {
        self.task_locks
            .lock()
            .await
            .entry(task_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn load_task(&self, task_id: Uuid) -> DomainResult<Task> {
        self.deps
            .tasks
            .get(task_id)
            .await?
            .ok_or(DomainError::TaskNotFound(task_id))
    }

    fn classifier(&self) -> DiagnosisClassifier {
        DiagnosisClassifier::new(DiagnosisConfig {
            systemic_threshold: self.config.systemic_threshold,
            min_judgments: self.config.min_judgments as usize,
            quality_threshold: self.config.quality_threshold,
            incorrect_threshold: self.config.incorrect_threshold,
            overlap: self.config.overlap_resolution,
        })
    }

    fn optimizer(&self) -> TierOptimizer {
        TierOptimizer::new(
            TierPolicy {
                accuracy_bar: self.config.accuracy_bar,
                min_observations: self.config.min_observations,
            },
            self.tier_ladder.len(),
        )
    }

    /// Derive the initial schema and workflow from the supplied field set and
    /// move the task into `Running`. Every field starts at the top of the
    /// model ladder.
    #[instrument(skip(self, fields))]
    pub async fn bootstrap(&self, task_id: Uuid, fields: Vec<FieldDef>) -> DomainResult<Task> {
        let lock = self.guard(task_id).await;
        let _held = lock.lock().await;

        let mut task = self.load_task(task_id).await?;
        if fields.is_empty() {
            return Err(DomainError::ValidationFailed(
                "bootstrap requires at least one field".to_string(),
            ));
        }

        let mut schema = SchemaVersion::new(task.id, 1, fields);
        schema.is_active = true;
        self.deps.workflows.insert_schema(&schema).await?;
        self.deps.workflows.activate_schema(task.id, schema.id).await?;

        let strategies: BTreeMap<String, FieldStrategy> = schema
            .fields
            .iter()
            .map(|f| (f.name.clone(), FieldStrategy::ModelTier { tier: 0 }))
            .collect();
        let mut workflow = WorkflowVersion::new(
            task.id,
            1,
            strategies,
            self.tier_ladder.clone(),
            crate::domain::models::ConfidenceWeights::default(),
        );
        workflow.is_active = true;
        self.deps.workflows.insert_workflow(&workflow).await?;
        self.deps.workflows.activate_workflow(task.id, workflow.id).await?;

        task.active_schema_version = Some(schema.id);
        task.active_workflow_version = Some(workflow.id);
        task.transition_to(TaskStatus::Running)?;
        self.deps.tasks.update(&task).await?;

        self.deps
            .events
            .append(
                &EvolutionEvent::new(task.id, EventKind::Bootstrap, task.iteration).with_mutation(
                    serde_json::json!({
                        "schema_version": schema.version,
                        "workflow_version": workflow.version,
                        "snapshot_hash": workflow.snapshot_hash,
                    }),
                ),
            )
            .await?;

        info!(task = %task.name, "bootstrapped");
        Ok(task)
    }

    /// One extraction run over the task's documents under the active
    /// workflow, followed by adaptive review of the sampled subset. Locked
    /// tasks still run, at the floor sampling rate.
    #[instrument(skip(self))]
    pub async fn run(
        &self,
        task_id: Uuid,
        force_full_review: bool,
        seed: Option<u64>,
    ) -> DomainResult<RunReport> {
        let lock = self.guard(task_id).await;
        let _held = lock.lock().await;

        let task = self.load_task(task_id).await?;
        if !matches!(task.status, TaskStatus::Running | TaskStatus::Locked) {
            return Err(DomainError::InvalidStateTransition {
                from: task.status.as_str().to_string(),
                to: TaskStatus::Running.as_str().to_string(),
                reason: "extraction runs only while running or locked".to_string(),
            });
        }

        let schema = self
            .deps
            .workflows
            .active_schema(task.id)
            .await?
            .ok_or(DomainError::NoActiveSchema(task.id))?;
        let workflow = self
            .deps
            .workflows
            .active_workflow(task.id)
            .await?
            .ok_or(DomainError::NoActiveWorkflow(task.id))?;

        let documents = self.deps.documents.list_for_task(task.id).await?;
        let corner_cases = self.deps.corner_cases.list_for_task(task.id).await?;
        let evaluator = ConfidenceEvaluator::new(workflow.confidence_weights);

        let historical = self.historical_accuracy(task.id, &workflow).await;

        let doc_index: HashMap<Uuid, &Document> =
            documents.iter().map(|d| (d.id, d)).collect();

        // Documents are independent until the aggregation barrier, so they
        // fan out concurrently; scoring and persistence stay ordered.
        let mut records = try_join_all(documents.iter().map(|document| {
            self.executor
                .run_document(&workflow, &schema, document, &corner_cases, task.iteration, &historical)
        }))
        .await?;
        for record in &mut records {
            evaluator.score_record(record);
            self.deps.extractions.insert(record).await?;
        }

        let regression: HashSet<String> = self
            .regression_fields
            .lock()
            .await
            .get(&task.id)
            .cloned()
            .unwrap_or_default();

        let mut rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        let manifest = if task.status == TaskStatus::Locked {
            self.sampler
                .select_floor(&records, task.iteration, &regression, &mut rng)
        } else {
            self.sampler
                .select(&records, task.iteration, &regression, force_full_review, &mut rng)
        };

        let mut reviewed = 0usize;
        for selection in &manifest.selections {
            let Some(record) = records.iter().find(|r| r.id == selection.extraction_id) else {
                continue;
            };
            let Some(document) = doc_index.get(&record.document_id) else {
                continue;
            };
            let assessment = self.deps.judge.assess(record, document, &schema).await?;
            let mut verdict = ReviewVerdict::new(record.id, assessment.overall, selection.reason);
            verdict.overall_score = assessment.overall_score;
            verdict.field_verdicts = assessment.field_verdicts;
            verdict.reasoning = assessment.reasoning;
            self.deps.reviews.insert_verdict(&verdict).await?;
            reviewed += 1;
        }

        // Flagged fields got their renewed pass; the flag is spent.
        self.regression_fields.lock().await.remove(&task.id);

        Ok(RunReport {
            iteration: task.iteration,
            extracted: records.len(),
            reviewed,
            manifest,
        })
    }

    /// Diagnose the current iteration's review evidence and, when warranted,
    /// apply one evolving cycle: rewrite, re-verify, activate or roll back.
    #[instrument(skip(self))]
    pub async fn evolve(&self, task_id: Uuid) -> DomainResult<EvolutionOutcome> {
        let lock = self.guard(task_id).await;
        let _held = lock.lock().await;

        let mut task = self.load_task(task_id).await?;

        let schema = self
            .deps
            .workflows
            .active_schema(task.id)
            .await?
            .ok_or(DomainError::NoActiveSchema(task.id))?;
        let field_names: Vec<String> = schema.fields.iter().map(|f| f.name.clone()).collect();

        let verdicts = self
            .deps
            .reviews
            .verdicts_for_iteration(task.id, task.iteration)
            .await?;
        let feedback = self
            .deps
            .reviews
            .feedback_for_iteration(task.id, task.iteration)
            .await?;
        let records = self
            .deps
            .extractions
            .list_for_iteration(task.id, task.iteration)
            .await?;
        let by_extraction: HashMap<Uuid, &ExtractionRecord> =
            records.iter().map(|r| (r.id, r)).collect();

        let window: Vec<ReviewedExtraction> = verdicts
            .iter()
            .filter_map(|v| {
                by_extraction.get(&v.extraction_id).map(|r| ReviewedExtraction {
                    document_id: r.document_id,
                    verdict: v.clone(),
                })
            })
            .collect();

        let corner_cases = self.deps.corner_cases.list_for_task(task.id).await?;
        let corner_fields: HashSet<String> =
            corner_cases.iter().map(|c| c.field.clone()).collect();

        let report =
            self.classifier()
                .classify(&task, &field_names, &window, &feedback, &corner_fields);

        if task.status == TaskStatus::Locked || task.iterations_exhausted() {
            return self.record_refusal(&mut task, &report).await;
        }
        if !report.trigger.should_evolve {
            return Ok(EvolutionOutcome::NotTriggered { reason: report.trigger.reason });
        }

        if self.take_cancel() {
            return Err(DomainError::CycleAborted { stage: "evolving transition".to_string() });
        }

        task.transition_to(TaskStatus::Evolving)?;
        self.deps.tasks.update(&task).await?;
        self.deps
            .events
            .append(
                &EvolutionEvent::new(task.id, EventKind::EvolutionTriggered, task.iteration)
                    .with_trigger(serde_json::json!({
                        "avg_score": report.trigger.avg_score,
                        "incorrect_rate": report.trigger.incorrect_rate,
                        "judgments": report.trigger.total_judgments,
                    })),
            )
            .await?;

        match self
            .apply_cycle(&mut task, &schema, &report, &window, &by_extraction, corner_cases)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                warn!(task = %task.name, error = %err, "evolving cycle failed");
                task.fail();
                self.deps.tasks.update(&task).await?;
                self.deps
                    .events
                    .append(
                        &EvolutionEvent::new(task.id, EventKind::TaskFailed, task.iteration)
                            .with_outcome(serde_json::json!({ "error": err.to_string() })),
                    )
                    .await?;
                Err(err)
            }
        }
    }

    /// Extend a locked task's iteration bound and re-open it. This is the
    /// only path out of `Locked`.
    pub async fn override_lock(&self, task_id: Uuid, additional_iterations: u32) -> DomainResult<Task> {
        let lock = self.guard(task_id).await;
        let _held = lock.lock().await;

        let mut task = self.load_task(task_id).await?;
        if task.status != TaskStatus::Locked {
            return Err(DomainError::ValidationFailed(format!(
                "task '{}' is not locked",
                task.name
            )));
        }
        if additional_iterations == 0 {
            return Err(DomainError::ValidationFailed(
                "lock override must extend the iteration bound".to_string(),
            ));
        }

        task.max_iteration += additional_iterations;
        task.transition_to(TaskStatus::Evolving)?;
        task.transition_to(TaskStatus::Running)?;
        self.deps.tasks.update(&task).await?;
        self.deps
            .events
            .append(
                &EvolutionEvent::new(task.id, EventKind::LockOverridden, task.iteration)
                    .with_mutation(serde_json::json!({ "max_iteration": task.max_iteration })),
            )
            .await?;
        Ok(task)
    }

    async fn record_refusal(
        &self,
        task: &mut Task,
        report: &DiagnosisReport,
    ) -> DomainResult<EvolutionOutcome> {
        let directives = report.directives();
        for directive in &directives {
            self.deps
                .events
                .append(
                    &EvolutionEvent::new(task.id, EventKind::EvolutionRefused, task.iteration)
                        .with_trigger(serde_json::to_value(directive)?),
                )
                .await?;
        }
        if task.status == TaskStatus::Running && task.iterations_exhausted() {
            task.transition_to(TaskStatus::Locked)?;
            self.deps.tasks.update(task).await?;
            self.deps
                .events
                .append(&EvolutionEvent::new(task.id, EventKind::TaskLocked, task.iteration))
                .await?;
        }
        info!(task = %task.name, recorded = directives.len(), "locked task: directives recorded, not applied");
        Ok(EvolutionOutcome::LockedRefusal { directives_recorded: directives.len() })
    }

    #[allow(clippy::too_many_lines)]
    async fn apply_cycle(
        &self,
        task: &mut Task,
        schema: &SchemaVersion,
        report: &DiagnosisReport,
        window: &[ReviewedExtraction],
        by_extraction: &HashMap<Uuid, &ExtractionRecord>,
        mut corner_cases: Vec<CornerCase>,
    ) -> DomainResult<EvolutionOutcome> {
        let current = self
            .deps
            .workflows
            .active_workflow(task.id)
            .await?
            .ok_or(DomainError::NoActiveWorkflow(task.id))?;
        let directives: Vec<RemediationDirective> =
            report.directives().into_iter().cloned().collect();

        // Record new corner cases before the rewrite so the rewriter can
        // route their fields through the lookup table.
        for directive in directives.iter().filter(|d| d.class == IssueClass::CornerCase) {
            let field = &directive.signature.field;
            let mut case = CornerCase::new(
                task.id,
                field,
                format!(
                    "{} on {} of {} reviewed documents",
                    directive.signature, directive.evidence.affected, directive.evidence.reviewed
                ),
            );
            if let Some(pattern) = &directive.pattern {
                case = case.with_pattern(regex::escape(pattern));
            }
            if let Some(resolution) = &directive.resolution {
                case = case.with_resolution(resolution.clone(), ResolutionKind::Value);
            }
            self.deps.corner_cases.insert(&case).await?;
            self.deps
                .events
                .append(
                    &EvolutionEvent::new(task.id, EventKind::CornerCaseAdded, task.iteration)
                        .with_mutation(serde_json::json!({ "field": field, "case_id": case.id })),
                )
                .await?;
            corner_cases.push(case);
        }

        // Tier bookkeeping from this window's verdicts.
        let assignments = current.tier_assignments();
        let (decisions, migrations) = {
            let mut states_map = self.tier_states.lock().await;
            let states = states_map.entry(task.id).or_default();
            for (field, tier) in &assignments {
                states
                    .entry(field.clone())
                    .or_insert_with(|| FieldTierState::new(field.clone(), *tier));
            }
            for reviewed in window {
                for fv in &reviewed.verdict.field_verdicts {
                    if let Some(state) = states.get_mut(&fv.field) {
                        let tier = assignments.get(&fv.field).copied().unwrap_or(0);
                        state.record_outcome(tier, fv.class == VerdictClass::Correct);
                    }
                }
            }

            // A systemic signature on a field running below its last known
            // good tier is a regression, not a pipeline defect.
            let regressed: HashSet<String> = directives
                .iter()
                .filter(|d| d.class == IssueClass::Systemic)
                .map(|d| d.signature.field.clone())
                .filter(|f| {
                    states
                        .get(f)
                        .is_some_and(|s| s.current > s.last_known_good)
                })
                .collect();

            let optimizer = self.optimizer();
            let decisions = optimizer.decide_all(states, &regressed);

            // Fields with a sustained-accuracy record whose correct values
            // all fit one capture template migrate off inference.
            let policy = TierPolicy {
                accuracy_bar: self.config.accuracy_bar,
                min_observations: self.config.min_observations,
            };
            let mut migrations: Vec<(String, FieldStrategy)> = Vec::new();
            for (field, state) in states.iter() {
                if directives.iter().any(|d| &d.signature.field == field) {
                    continue;
                }
                if !matches!(current.strategies.get(field), Some(FieldStrategy::ModelTier { .. })) {
                    continue;
                }
                if !state.stats_at(state.current).meets(&policy) {
                    continue;
                }
                let values: Vec<String> = window
                    .iter()
                    .filter(|r| r.verdict.field_class(field) == Some(VerdictClass::Correct))
                    .filter_map(|r| by_extraction.get(&r.verdict.extraction_id))
                    .filter_map(|rec| rec.fields.get(field))
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect();
                let refs: Vec<&str> = values.iter().map(String::as_str).collect();
                if let Some(pattern) = migration_candidate(&refs) {
                    migrations.push((field.clone(), migrated_strategy(pattern, state)));
                }
            }
            (decisions, migrations)
        };

        for (field, decision) in &decisions {
            match decision {
                TierDecision::Downgrade { from, to } => {
                    self.deps
                        .events
                        .append(
                            &EvolutionEvent::new(task.id, EventKind::ModelDowngrade, task.iteration)
                                .with_mutation(serde_json::json!({
                                    "field": field, "from": from, "to": to,
                                })),
                        )
                        .await?;
                }
                TierDecision::Rollback { from, to } => {
                    self.regression_fields
                        .lock()
                        .await
                        .entry(task.id)
                        .or_default()
                        .insert(field.clone());
                    self.deps
                        .events
                        .append(
                            &EvolutionEvent::new(task.id, EventKind::TierRollback, task.iteration)
                                .with_mutation(serde_json::json!({
                                    "field": field, "from": from, "to": to,
                                })),
                        )
                        .await?;
                }
                TierDecision::Hold => {}
            }
        }

        // Weight calibration against this window's verdicts.
        let evaluator = ConfidenceEvaluator::new(current.confidence_weights);
        let samples: Vec<CalibrationSample> = window
            .iter()
            .filter_map(|r| {
                let record = by_extraction.get(&r.verdict.extraction_id)?;
                Some(r.verdict.field_verdicts.iter().filter_map(|fv| {
                    record.field_confidences.get(&fv.field).map(|fc| CalibrationSample {
                        breakdown: fc.breakdown,
                        verdict: fv.class,
                    })
                }))
            })
            .flatten()
            .collect();
        let weights = evaluator.calibrate(&samples, CALIBRATION_RATE);
        if weights != current.confidence_weights {
            self.deps
                .events
                .append(
                    &EvolutionEvent::new(task.id, EventKind::WeightsCalibrated, task.iteration)
                        .with_mutation(serde_json::to_value(weights)?),
                )
                .await?;
        }

        // The rewrite proper.
        let mut strategies = self
            .deps
            .rewriter
            .rewrite(&current, &directives, &corner_cases)
            .await?;
        for (field, decision) in &decisions {
            let has_systemic = directives
                .iter()
                .any(|d| d.class == IssueClass::Systemic && &d.signature.field == field);
            match decision {
                TierDecision::Downgrade { to, .. } if !has_systemic => {
                    strategies.insert(field.clone(), FieldStrategy::ModelTier { tier: *to });
                }
                TierDecision::Rollback { to, .. } => {
                    strategies.insert(field.clone(), FieldStrategy::ModelTier { tier: *to });
                }
                _ => {}
            }
        }
        for (field, strategy) in migrations {
            self.deps
                .events
                .append(
                    &EvolutionEvent::new(task.id, EventKind::CodeMigration, task.iteration)
                        .with_mutation(serde_json::to_value(&strategy)?),
                )
                .await?;
            strategies.insert(field, strategy);
        }

        if strategies == current.strategies && weights == current.confidence_weights {
            return self.finish_cycle(task, EvolutionOutcome::NoChange).await;
        }

        if self.take_cancel() {
            // Nothing has been activated; the previous version stays intact.
            task.transition_to(TaskStatus::Running)?;
            self.deps.tasks.update(task).await?;
            return Err(DomainError::CycleAborted { stage: "version activation".to_string() });
        }

        let successor = WorkflowVersion::new(
            task.id,
            current.version + 1,
            strategies,
            current.tier_ladder.clone(),
            weights,
        );
        self.deps.workflows.insert_workflow(&successor).await?;
        self.deps.workflows.activate_workflow(task.id, successor.id).await?;
        task.active_workflow_version = Some(successor.id);
        self.deps.tasks.update(task).await?;
        self.deps
            .events
            .append(
                &EvolutionEvent::new(task.id, EventKind::VersionActivated, task.iteration)
                    .with_mutation(serde_json::json!({
                        "version": successor.version,
                        "snapshot_hash": successor.snapshot_hash,
                    })),
            )
            .await?;

        // Re-verify against the sample set before the cycle counts.
        let passed = self
            .reverify(task, schema, &successor, &corner_cases)
            .await?;
        if passed {
            self.deps
                .events
                .append(
                    &EvolutionEvent::new(task.id, EventKind::WorkflowUpdate, task.iteration)
                        .with_outcome(serde_json::json!({ "version": successor.version })),
                )
                .await?;
            self.finish_cycle(task, EvolutionOutcome::Applied { workflow_version: successor.version })
                .await
        } else {
            self.deps.workflows.activate_workflow(task.id, current.id).await?;
            task.active_workflow_version = Some(current.id);
            self.deps.tasks.update(task).await?;
            self.deps
                .events
                .append(
                    &EvolutionEvent::new(task.id, EventKind::VersionRolledBack, task.iteration)
                        .with_outcome(serde_json::json!({
                            "rejected_version": successor.version,
                            "restored_version": current.version,
                        })),
                )
                .await?;
            self.finish_cycle(task, EvolutionOutcome::RolledBack { restored_version: current.version })
                .await
        }
    }

    /// Close the evolving cycle: back to `Running`, count the iteration,
    /// lock if the bound is now reached. The iteration advances exactly once
    /// per completed cycle, rollback included.
    async fn finish_cycle(
        &self,
        task: &mut Task,
        outcome: EvolutionOutcome,
    ) -> DomainResult<EvolutionOutcome> {
        task.transition_to(TaskStatus::Running)?;
        task.advance_iteration();
        if task.iterations_exhausted() {
            task.transition_to(TaskStatus::Locked)?;
            self.deps.tasks.update(task).await?;
            self.deps
                .events
                .append(&EvolutionEvent::new(task.id, EventKind::TaskLocked, task.iteration))
                .await?;
        } else {
            self.deps.tasks.update(task).await?;
        }
        Ok(outcome)
    }

    async fn reverify(
        &self,
        task: &Task,
        schema: &SchemaVersion,
        workflow: &WorkflowVersion,
        corner_cases: &[CornerCase],
    ) -> DomainResult<bool> {
        let documents = self.deps.documents.list_for_task(task.id).await?;
        let mut probes: Vec<&Document> = documents.iter().filter(|d| d.is_sample).collect();
        if probes.is_empty() {
            probes = documents.iter().take(REVERIFY_PROBE_LIMIT).collect();
        }
        if probes.is_empty() {
            return Ok(true);
        }

        let evaluator = ConfidenceEvaluator::new(workflow.confidence_weights);
        let historical = self.historical_accuracy(task.id, workflow).await;
        let mut total = 0.0;
        for document in &probes {
            let mut record = self
                .executor
                .run_document(workflow, schema, document, corner_cases, task.iteration, &historical)
                .await?;
            evaluator.score_record(&mut record);
            let assessment = self.deps.judge.assess(&record, document, schema).await?;
            total += assessment.overall_score.unwrap_or(match assessment.overall {
                VerdictClass::Correct => 1.0,
                VerdictClass::Partial => 0.5,
                VerdictClass::Incorrect | VerdictClass::Missing => 0.0,
            });
        }
        let mean = total / probes.len() as f64;
        Ok(mean >= self.config.quality_threshold)
    }

    async fn historical_accuracy(
        &self,
        task_id: Uuid,
        workflow: &WorkflowVersion,
    ) -> HashMap<String, f64> {
        let states_map = self.tier_states.lock().await;
        let Some(states) = states_map.get(&task_id) else {
            return HashMap::new();
        };
        workflow
            .tier_assignments()
            .into_iter()
            .filter_map(|(field, tier)| {
                states
                    .get(&field)
                    .and_then(|s| s.stats_at(tier).accuracy())
                    .map(|a| (field, a))
            })
            .collect()
    }
}
