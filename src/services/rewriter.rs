//! Deterministic workflow rewriter.
//!
//! Turns remediation directives into the successor strategy set. Systemic
//! directives re-pin the failing field to the most capable tier so accuracy
//! recovers before cost optimization resumes; corner-case directives route
//! the field through the corner-case table. Fields without a directive are
//! left untouched.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::info;

use crate::domain::errors::DomainResult;
use crate::domain::models::{CornerCase, FieldStrategy, IssueClass, RemediationDirective, WorkflowVersion};
use crate::domain::ports::WorkflowRewriter;

pub struct StrategyRewriter;

impl StrategyRewriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StrategyRewriter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowRewriter for StrategyRewriter {
    async fn rewrite(
        &self,
        current: &WorkflowVersion,
        directives: &[RemediationDirective],
        corner_cases: &[CornerCase],
    ) -> DomainResult<BTreeMap<String, FieldStrategy>> {
        let mut strategies = current.strategies.clone();

        for directive in directives {
            let field = &directive.signature.field;
            let existing_tier = strategies
                .get(field)
                .map_or(0, FieldStrategy::effective_tier);

            let replacement = match directive.class {
                // A systemic failure discards whatever shortcut the field was
                // running on and re-pins it to the top of the ladder.
                IssueClass::Systemic => FieldStrategy::ModelTier { tier: 0 },
                IssueClass::CornerCase => {
                    let has_case = corner_cases.iter().any(|c| &c.field == field);
                    if has_case {
                        FieldStrategy::CornerCaseLookup { fallback_tier: existing_tier }
                    } else {
                        // Directive without a recorded case yet: keep the
                        // current strategy until the case lands.
                        continue;
                    }
                }
            };

            info!(
                field = %field,
                class = directive.class.as_str(),
                "rewriting field strategy"
            );
            strategies.insert(field.clone(), replacement);
        }

        Ok(strategies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{
        ConfidenceWeights, EvidenceWindow, FailureSignature, ResolutionKind, VerdictClass,
    };
    use uuid::Uuid;

    fn workflow() -> WorkflowVersion {
        let mut strategies = BTreeMap::new();
        strategies.insert("date".to_string(), FieldStrategy::ModelTier { tier: 2 });
        strategies.insert("amount".to_string(), FieldStrategy::ModelTier { tier: 1 });
        WorkflowVersion::new(
            Uuid::new_v4(),
            1,
            strategies,
            vec!["xl".into(), "l".into(), "m".into(), "s".into()],
            ConfidenceWeights::default(),
        )
    }

    fn directive(task_id: Uuid, field: &str, class: IssueClass) -> RemediationDirective {
        RemediationDirective::new(
            task_id,
            class,
            FailureSignature::new(field, VerdictClass::Incorrect),
            EvidenceWindow { reviewed: 10, affected: 5, rejections: 0 },
        )
    }

    #[tokio::test]
    async fn test_systemic_repins_to_top_tier() {
        let wf = workflow();
        let rewriter = StrategyRewriter::new();
        let d = directive(wf.task_id, "date", IssueClass::Systemic);

        let strategies = rewriter.rewrite(&wf, &[d], &[]).await.unwrap();
        assert_eq!(strategies["date"], FieldStrategy::ModelTier { tier: 0 });
        // Untouched field keeps its strategy.
        assert_eq!(strategies["amount"], FieldStrategy::ModelTier { tier: 1 });
    }

    #[tokio::test]
    async fn test_corner_case_routes_through_lookup() {
        let wf = workflow();
        let rewriter = StrategyRewriter::new();
        let d = directive(wf.task_id, "date", IssueClass::CornerCase);
        let case = CornerCase::new(wf.task_id, "date", "two-digit years")
            .with_pattern(r"\d{2}/\d{2}/\d{2}")
            .with_resolution("interpret as 20xx", ResolutionKind::Prompt);

        let strategies = rewriter.rewrite(&wf, &[d], &[case]).await.unwrap();
        assert_eq!(strategies["date"], FieldStrategy::CornerCaseLookup { fallback_tier: 2 });
    }

    #[tokio::test]
    async fn test_corner_case_without_recorded_case_is_noop() {
        let wf = workflow();
        let rewriter = StrategyRewriter::new();
        let d = directive(wf.task_id, "date", IssueClass::CornerCase);

        let strategies = rewriter.rewrite(&wf, &[d], &[]).await.unwrap();
        assert_eq!(strategies["date"], FieldStrategy::ModelTier { tier: 2 });
    }
}
