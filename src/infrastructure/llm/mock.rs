//! Deterministic offline stand-ins for the model and judge ports.
//!
//! Used by the CLI's offline mode and by integration tests that exercise the
//! engine without a network.

use async_trait::async_trait;
use regex::Regex;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Document, ExtractionRecord, SchemaVersion, VerdictClass};
use crate::domain::ports::{Assessment, FieldRequest, FieldResponse, ModelClient, ReviewJudge};

/// Extracts by field type with fixed patterns. No network, no tokens billed
/// beyond a nominal count.
pub struct OfflineModelClient;

impl OfflineModelClient {
    fn pattern_for(field_type: &str) -> Option<&'static str> {
        match field_type {
            "date" => Some(r"\d{4}-\d{2}-\d{2}"),
            "number" => Some(r"\d+(?:\.\d+)?"),
            _ => None,
        }
    }
}

#[async_trait]
impl ModelClient for OfflineModelClient {
    async fn extract_field(&self, request: &FieldRequest) -> DomainResult<FieldResponse> {
        let value = Self::pattern_for(&request.field.field_type)
            .and_then(|p| Regex::new(p).ok())
            .and_then(|re| re.find(&request.document_text))
            .map(|m| serde_json::Value::String(m.as_str().to_string()))
            .or_else(|| {
                // Fall back to the line labelled with the field name.
                request
                    .document_text
                    .lines()
                    .find(|line| line.to_lowercase().contains(&request.field.name.to_lowercase()))
                    .and_then(|line| line.split(':').nth(1))
                    .map(|rest| serde_json::Value::String(rest.trim().to_string()))
            });

        Ok(FieldResponse {
            self_confidence: value.as_ref().map(|_| 0.8),
            value,
            tokens: 10,
        })
    }
}

/// Marks every reviewed extraction fully correct.
pub struct ApprovingJudge;

#[async_trait]
impl ReviewJudge for ApprovingJudge {
    async fn assess(
        &self,
        record: &ExtractionRecord,
        _document: &Document,
        _schema: &SchemaVersion,
    ) -> DomainResult<Assessment> {
        let field_verdicts = record
            .fields
            .keys()
            .map(|field| crate::domain::models::FieldVerdict {
                field: field.clone(),
                class: VerdictClass::Correct,
                expected: None,
                reasoning: None,
                score: Some(1.0),
            })
            .collect();

        Ok(Assessment {
            overall: VerdictClass::Correct,
            overall_score: Some(1.0),
            field_verdicts,
            reasoning: None,
        })
    }
}
