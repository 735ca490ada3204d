//! Field-strategy execution through a handler registry.
//!
//! Every workflow behavior is a registered handler resolved by strategy kind.
//! Adding behavior means registering a new handler implementation; nothing is
//! code-generated or evaluated at runtime.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ConfidenceSignals, CornerCase, Document, ExecutionStatus, ExtractionRecord, FieldDef,
    FieldStrategy, ResolutionKind, SchemaVersion, WorkflowVersion,
};
use crate::domain::ports::{FieldRequest, ModelClient};

/// Method priors fed into the confidence composite. A deterministic capture
/// is the most trustworthy path, a fixed corner-case value close behind,
/// model inference last.
pub const RULE_PRIOR: f64 = 0.95;
pub const CORNER_VALUE_PRIOR: f64 = 0.90;
pub const MODEL_PRIOR: f64 = 0.75;

/// Everything a handler may consult for one (field, document) execution.
pub struct FieldContext<'a> {
    pub field: &'a FieldDef,
    pub strategy: &'a FieldStrategy,
    pub ladder: &'a [String],
    pub document: &'a Document,
    pub corner_cases: &'a [CornerCase],
    /// Review-backed accuracy of this field at its current tier, when known.
    pub historical_accuracy: Option<f64>,
}

/// Result of executing one field against one document.
#[derive(Debug, Clone)]
pub struct FieldOutcome {
    pub value: Option<serde_json::Value>,
    pub signals: ConfidenceSignals,
    pub model_calls: u32,
    pub tokens: u64,
}

impl FieldOutcome {
    fn zero_inference(value: Option<serde_json::Value>, mut signals: ConfidenceSignals) -> Self {
        signals.self_confidence = signals.self_confidence.or(Some(1.0));
        Self { value, signals, model_calls: 0, tokens: 0 }
    }
}

/// One registered strategy behavior.
#[async_trait]
pub trait FieldHandler: Send + Sync {
    /// Strategy kind this handler resolves, matching the serialized tag.
    fn kind(&self) -> &'static str;

    async fn execute(&self, ctx: &FieldContext<'_>) -> DomainResult<FieldOutcome>;
}

/// Kind-keyed handler table.
pub struct StrategyRegistry {
    handlers: HashMap<&'static str, Arc<dyn FieldHandler>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self { handlers: HashMap::new() }
    }

    /// Registry with the three built-in handlers wired to one model client.
    pub fn with_builtins(client: Arc<dyn ModelClient>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ModelTierHandler { client: client.clone() }));
        registry.register(Arc::new(DeterministicRuleHandler { client: client.clone() }));
        registry.register(Arc::new(CornerCaseLookupHandler { client }));
        registry
    }

    pub fn register(&mut self, handler: Arc<dyn FieldHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    pub fn resolve(&self, strategy: &FieldStrategy) -> Option<Arc<dyn FieldHandler>> {
        self.handlers.get(strategy_kind(strategy)).cloned()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn strategy_kind(strategy: &FieldStrategy) -> &'static str {
    match strategy {
        FieldStrategy::ModelTier { .. } => "model_tier",
        FieldStrategy::DeterministicRule { .. } => "deterministic_rule",
        FieldStrategy::CornerCaseLookup { .. } => "corner_case_lookup",
    }
}

/// Corner cases for the field whose pattern matches the document text.
fn matching_cases<'a>(ctx: &'a FieldContext<'_>, text: &str) -> Vec<&'a CornerCase> {
    ctx.corner_cases
        .iter()
        .filter(|c| c.field == ctx.field.name)
        .filter(|c| match &c.pattern {
            Some(pattern) => Regex::new(pattern).is_ok_and(|re| re.is_match(text)),
            None => false,
        })
        .collect()
}

async fn invoke_model(
    client: &dyn ModelClient,
    ctx: &FieldContext<'_>,
    tier: usize,
    hints: Vec<String>,
    corner_case_matched: bool,
) -> DomainResult<FieldOutcome> {
    let model = ctx.ladder.get(tier).ok_or_else(|| DomainError::UnknownTier {
        field: ctx.field.name.clone(),
        tier: tier.to_string(),
    })?;

    let request = FieldRequest {
        model: model.clone(),
        field: ctx.field.clone(),
        document_text: ctx.document.full_text(),
        hints,
    };
    let response = client.extract_field(&request).await?;

    Ok(FieldOutcome {
        value: response.value,
        signals: ConfidenceSignals {
            self_confidence: response.self_confidence,
            method_prior: Some(MODEL_PRIOR),
            historical_accuracy: ctx.historical_accuracy,
            source_clarity: Some(ctx.document.mean_clarity()),
            corner_case_matched: Some(corner_case_matched),
        },
        model_calls: 1,
        tokens: response.tokens,
    })
}

/// Invokes the worker model at the strategy's ladder position, carrying any
/// matching prompt-kind corner cases as extra instructions.
pub struct ModelTierHandler {
    client: Arc<dyn ModelClient>,
}

#[async_trait]
impl FieldHandler for ModelTierHandler {
    fn kind(&self) -> &'static str {
        "model_tier"
    }

    async fn execute(&self, ctx: &FieldContext<'_>) -> DomainResult<FieldOutcome> {
        let FieldStrategy::ModelTier { tier } = ctx.strategy else {
            return Err(DomainError::InvalidFieldRule {
                field: ctx.field.name.clone(),
                reason: "handler kind mismatch".to_string(),
            });
        };
        let text = ctx.document.full_text();
        let matched = matching_cases(ctx, &text);
        let hints: Vec<String> = matched
            .iter()
            .filter(|c| c.resolution_kind == ResolutionKind::Prompt)
            .filter_map(|c| c.resolution.clone())
            .collect();
        invoke_model(self.client.as_ref(), ctx, *tier, hints, !matched.is_empty()).await
    }
}

/// Applies a capture rule to the source text; falls back to the model tier
/// when the rule does not match.
pub struct DeterministicRuleHandler {
    client: Arc<dyn ModelClient>,
}

#[async_trait]
impl FieldHandler for DeterministicRuleHandler {
    fn kind(&self) -> &'static str {
        "deterministic_rule"
    }

    async fn execute(&self, ctx: &FieldContext<'_>) -> DomainResult<FieldOutcome> {
        let FieldStrategy::DeterministicRule { pattern, fallback_tier } = ctx.strategy else {
            return Err(DomainError::InvalidFieldRule {
                field: ctx.field.name.clone(),
                reason: "handler kind mismatch".to_string(),
            });
        };
        let re = Regex::new(pattern).map_err(|e| DomainError::InvalidFieldRule {
            field: ctx.field.name.clone(),
            reason: e.to_string(),
        })?;

        let text = ctx.document.full_text();
        if let Some(captures) = re.captures(&text) {
            let captured = captures.get(1).or_else(|| captures.get(0));
            if let Some(m) = captured {
                let signals = ConfidenceSignals {
                    self_confidence: Some(1.0),
                    method_prior: Some(RULE_PRIOR),
                    historical_accuracy: ctx.historical_accuracy,
                    source_clarity: Some(ctx.document.mean_clarity()),
                    corner_case_matched: Some(false),
                };
                return Ok(FieldOutcome::zero_inference(
                    Some(serde_json::Value::String(m.as_str().to_string())),
                    signals,
                ));
            }
        }

        debug!(field = %ctx.field.name, "capture rule missed, falling back to model tier");
        invoke_model(self.client.as_ref(), ctx, *fallback_tier, Vec::new(), false).await
    }
}

/// Resolves the field through the task's corner-case table; unmatched
/// documents fall back to the model tier.
pub struct CornerCaseLookupHandler {
    client: Arc<dyn ModelClient>,
}

#[async_trait]
impl FieldHandler for CornerCaseLookupHandler {
    fn kind(&self) -> &'static str {
        "corner_case_lookup"
    }

    async fn execute(&self, ctx: &FieldContext<'_>) -> DomainResult<FieldOutcome> {
        let FieldStrategy::CornerCaseLookup { fallback_tier } = ctx.strategy else {
            return Err(DomainError::InvalidFieldRule {
                field: ctx.field.name.clone(),
                reason: "handler kind mismatch".to_string(),
            });
        };
        let text = ctx.document.full_text();
        let matched = matching_cases(ctx, &text);

        for case in &matched {
            let Some(resolution) = &case.resolution else { continue };
            match case.resolution_kind {
                ResolutionKind::Value => {
                    let signals = ConfidenceSignals {
                        self_confidence: Some(1.0),
                        method_prior: Some(CORNER_VALUE_PRIOR),
                        historical_accuracy: ctx.historical_accuracy,
                        source_clarity: Some(ctx.document.mean_clarity()),
                        corner_case_matched: Some(true),
                    };
                    return Ok(FieldOutcome::zero_inference(
                        Some(serde_json::Value::String(resolution.clone())),
                        signals,
                    ));
                }
                ResolutionKind::Regex => {
                    let re = Regex::new(resolution).map_err(|e| DomainError::InvalidFieldRule {
                        field: ctx.field.name.clone(),
                        reason: e.to_string(),
                    })?;
                    if let Some(captures) = re.captures(&text) {
                        if let Some(m) = captures.get(1).or_else(|| captures.get(0)) {
                            let signals = ConfidenceSignals {
                                self_confidence: Some(1.0),
                                method_prior: Some(RULE_PRIOR),
                                historical_accuracy: ctx.historical_accuracy,
                                source_clarity: Some(ctx.document.mean_clarity()),
                                corner_case_matched: Some(true),
                            };
                            return Ok(FieldOutcome::zero_inference(
                                Some(serde_json::Value::String(m.as_str().to_string())),
                                signals,
                            ));
                        }
                    }
                }
                ResolutionKind::Prompt => {}
            }
        }

        let hints: Vec<String> = matched
            .iter()
            .filter(|c| c.resolution_kind == ResolutionKind::Prompt)
            .filter_map(|c| c.resolution.clone())
            .collect();
        invoke_model(self.client.as_ref(), ctx, *fallback_tier, hints, !matched.is_empty()).await
    }
}

/// Runs an active workflow version over one document, producing the
/// extraction record the confidence evaluator then scores.
pub struct StrategyExecutor {
    registry: StrategyRegistry,
}

impl StrategyExecutor {
    pub fn new(registry: StrategyRegistry) -> Self {
        Self { registry }
    }

    pub async fn run_document(
        &self,
        workflow: &WorkflowVersion,
        schema: &SchemaVersion,
        document: &Document,
        corner_cases: &[CornerCase],
        iteration: u32,
        historical_accuracy: &HashMap<String, f64>,
    ) -> DomainResult<ExtractionRecord> {
        let mut record = ExtractionRecord::new(document.id, workflow.id, schema.id, iteration);
        let mut failures = 0usize;

        for field in &schema.fields {
            let Some(strategy) = workflow.strategies.get(&field.name) else {
                // Unassigned fields run at the top of the ladder.
                warn!(field = %field.name, "no registered strategy, defaulting to top tier");
                record.signals.insert(field.name.clone(), ConfidenceSignals::default());
                continue;
            };
            let handler = self.registry.resolve(strategy).ok_or_else(|| {
                DomainError::InvalidFieldRule {
                    field: field.name.clone(),
                    reason: format!("no handler registered for kind '{}'", strategy_kind(strategy)),
                }
            })?;

            let ctx = FieldContext {
                field,
                strategy,
                ladder: &workflow.tier_ladder,
                document,
                corner_cases,
                historical_accuracy: historical_accuracy.get(&field.name).copied(),
            };

            match handler.execute(&ctx).await {
                Ok(outcome) => {
                    record.cost.add(outcome.model_calls, outcome.tokens);
                    record.signals.insert(field.name.clone(), outcome.signals);
                    record
                        .fields
                        .insert(field.name.clone(), outcome.value.unwrap_or(serde_json::Value::Null));
                }
                Err(err) => {
                    warn!(field = %field.name, error = %err, "field execution failed");
                    failures += 1;
                    record.fields.insert(field.name.clone(), serde_json::Value::Null);
                    record.signals.insert(field.name.clone(), ConfidenceSignals::default());
                    record.error = Some(err.to_string());
                }
            }
        }

        record.status = if failures == 0 {
            ExecutionStatus::Success
        } else if failures < schema.fields.len() {
            ExecutionStatus::Partial
        } else {
            ExecutionStatus::Failed
        };
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ConfidenceWeights, ParsedPage};
    use crate::domain::ports::FieldResponse;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    struct FixedClient {
        value: serde_json::Value,
    }

    #[async_trait]
    impl ModelClient for FixedClient {
        async fn extract_field(&self, request: &FieldRequest) -> DomainResult<FieldResponse> {
            assert!(!request.model.is_empty());
            Ok(FieldResponse {
                value: Some(self.value.clone()),
                self_confidence: Some(0.8),
                tokens: 100,
            })
        }
    }

    fn document(text: &str) -> Document {
        Document::new(Uuid::new_v4(), "doc.pdf", "hash").with_pages(vec![ParsedPage {
            page_number: 1,
            text: text.to_string(),
            clarity: Some(0.9),
        }])
    }

    fn workflow(strategies: BTreeMap<String, FieldStrategy>) -> WorkflowVersion {
        WorkflowVersion::new(
            Uuid::new_v4(),
            1,
            strategies,
            vec!["big-model".to_string(), "small-model".to_string()],
            ConfidenceWeights::default(),
        )
    }

    fn registry() -> StrategyRegistry {
        StrategyRegistry::with_builtins(Arc::new(FixedClient {
            value: serde_json::json!("model-answer"),
        }))
    }

    fn ctx_parts(field: &str) -> (FieldDef, Document) {
        (FieldDef::new(field, "string"), document("Invoice total: 42.50 dated 2024-03-01"))
    }

    #[tokio::test]
    async fn test_deterministic_rule_short_circuits_without_inference() {
        let (field, doc) = ctx_parts("amount");
        let strategy = FieldStrategy::DeterministicRule {
            pattern: r"total: (\d+\.\d{2})".to_string(),
            fallback_tier: 0,
        };
        let registry = registry();
        let handler = registry.resolve(&strategy).unwrap();
        let ctx = FieldContext {
            field: &field,
            strategy: &strategy,
            ladder: &["big-model".to_string()],
            document: &doc,
            corner_cases: &[],
            historical_accuracy: None,
        };

        let outcome = handler.execute(&ctx).await.unwrap();
        assert_eq!(outcome.value, Some(serde_json::json!("42.50")));
        assert_eq!(outcome.model_calls, 0);
        assert_eq!(outcome.tokens, 0);
        assert_eq!(outcome.signals.method_prior, Some(RULE_PRIOR));
    }

    #[tokio::test]
    async fn test_rule_miss_falls_back_to_model() {
        let (field, doc) = ctx_parts("amount");
        let strategy = FieldStrategy::DeterministicRule {
            pattern: r"subtotal: (\d+)".to_string(),
            fallback_tier: 1,
        };
        let registry = registry();
        let handler = registry.resolve(&strategy).unwrap();
        let ladder = vec!["big-model".to_string(), "small-model".to_string()];
        let ctx = FieldContext {
            field: &field,
            strategy: &strategy,
            ladder: &ladder,
            document: &doc,
            corner_cases: &[],
            historical_accuracy: None,
        };

        let outcome = handler.execute(&ctx).await.unwrap();
        assert_eq!(outcome.value, Some(serde_json::json!("model-answer")));
        assert_eq!(outcome.model_calls, 1);
        assert_eq!(outcome.signals.method_prior, Some(MODEL_PRIOR));
    }

    #[tokio::test]
    async fn test_invalid_pattern_is_rejected() {
        let (field, doc) = ctx_parts("amount");
        let strategy = FieldStrategy::DeterministicRule {
            pattern: "([unclosed".to_string(),
            fallback_tier: 0,
        };
        let registry = registry();
        let handler = registry.resolve(&strategy).unwrap();
        let ladder = vec!["big-model".to_string()];
        let ctx = FieldContext {
            field: &field,
            strategy: &strategy,
            ladder: &ladder,
            document: &doc,
            corner_cases: &[],
            historical_accuracy: None,
        };

        let err = handler.execute(&ctx).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidFieldRule { .. }));
    }

    #[tokio::test]
    async fn test_corner_case_value_resolution() {
        let (field, doc) = ctx_parts("amount");
        let task_id = Uuid::new_v4();
        let case = CornerCase::new(task_id, "amount", "handwritten totals")
            .with_pattern("Invoice")
            .with_resolution("0.00", ResolutionKind::Value);
        let strategy = FieldStrategy::CornerCaseLookup { fallback_tier: 0 };
        let registry = registry();
        let handler = registry.resolve(&strategy).unwrap();
        let ladder = vec!["big-model".to_string()];
        let ctx = FieldContext {
            field: &field,
            strategy: &strategy,
            ladder: &ladder,
            document: &doc,
            corner_cases: std::slice::from_ref(&case),
            historical_accuracy: None,
        };

        let outcome = handler.execute(&ctx).await.unwrap();
        assert_eq!(outcome.value, Some(serde_json::json!("0.00")));
        assert_eq!(outcome.model_calls, 0);
        assert_eq!(outcome.signals.corner_case_matched, Some(true));
    }

    #[tokio::test]
    async fn test_out_of_range_tier_is_rejected() {
        let (field, doc) = ctx_parts("amount");
        let strategy = FieldStrategy::ModelTier { tier: 9 };
        let registry = registry();
        let handler = registry.resolve(&strategy).unwrap();
        let ladder = vec!["big-model".to_string()];
        let ctx = FieldContext {
            field: &field,
            strategy: &strategy,
            ladder: &ladder,
            document: &doc,
            corner_cases: &[],
            historical_accuracy: None,
        };

        let err = handler.execute(&ctx).await.unwrap_err();
        assert!(matches!(err, DomainError::UnknownTier { .. }));
    }

    #[tokio::test]
    async fn test_executor_builds_record() {
        let mut strategies = BTreeMap::new();
        strategies.insert("amount".to_string(), FieldStrategy::DeterministicRule {
            pattern: r"total: (\d+\.\d{2})".to_string(),
            fallback_tier: 0,
        });
        strategies.insert("date".to_string(), FieldStrategy::ModelTier { tier: 0 });
        let wf = workflow(strategies);
        let schema = SchemaVersion::new(
            wf.task_id,
            1,
            vec![FieldDef::new("amount", "number"), FieldDef::new("date", "date")],
        );
        let doc = document("Invoice total: 42.50 dated 2024-03-01");

        let executor = StrategyExecutor::new(registry());
        let record = executor
            .run_document(&wf, &schema, &doc, &[], 0, &HashMap::new())
            .await
            .unwrap();

        assert_eq!(record.status, ExecutionStatus::Success);
        assert_eq!(record.fields["amount"], serde_json::json!("42.50"));
        assert_eq!(record.fields["date"], serde_json::json!("model-answer"));
        // Only the model-tier field billed inference.
        assert_eq!(record.cost.model_calls, 1);
    }
}
