use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainResult;
use crate::domain::models::workflow::FieldDef;

/// One field-extraction request against a named model.
#[derive(Debug, Clone)]
pub struct FieldRequest {
    pub model: String,
    pub field: FieldDef,
    pub document_text: String,
    /// Extra instructions, e.g. corner-case prompt resolutions.
    pub hints: Vec<String>,
}

/// Model answer for one field: a value plus the model's own confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldResponse {
    pub value: Option<serde_json::Value>,
    /// Self-reported confidence in [0,1], when the model supplies one.
    pub self_confidence: Option<f64>,
    pub tokens: u64,
}

/// Port for the model-invocation collaborator.
///
/// The engine never talks to a network itself; it consumes already
/// materialized responses through this trait.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn extract_field(&self, request: &FieldRequest) -> DomainResult<FieldResponse>;
}
