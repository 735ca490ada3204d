use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::workflow::FieldStrategy;
use crate::domain::models::{CornerCase, RemediationDirective, WorkflowVersion};

/// Port for the pipeline-rewrite collaborator.
///
/// Consumes remediation directives and produces the strategy set of the
/// successor workflow version. The engine decides whether and why a rewrite
/// happens; the rewriter decides what the rewritten strategies are.
#[async_trait]
pub trait WorkflowRewriter: Send + Sync {
    async fn rewrite(
        &self,
        current: &WorkflowVersion,
        directives: &[RemediationDirective],
        corner_cases: &[CornerCase],
    ) -> DomainResult<BTreeMap<String, FieldStrategy>>;
}
