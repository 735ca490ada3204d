use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Document, ExtractionRecord, FieldVerdict, SchemaVersion, VerdictClass};

/// Raw assessment from the reviewer, before it is stamped with the sampling
/// reason and persisted as a [`crate::domain::models::ReviewVerdict`].
#[derive(Debug, Clone)]
pub struct Assessment {
    pub overall: VerdictClass,
    pub overall_score: Option<f64>,
    pub field_verdicts: Vec<FieldVerdict>,
    pub reasoning: Option<String>,
}

/// Port for the independent review collaborator (LLM-as-judge or human).
#[async_trait]
pub trait ReviewJudge: Send + Sync {
    async fn assess(
        &self,
        record: &ExtractionRecord,
        document: &Document,
        schema: &SchemaVersion,
    ) -> DomainResult<Assessment>;
}
