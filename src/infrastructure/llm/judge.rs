//! LLM-as-judge reviewer.
//!
//! Assessment runs against the source document and the extracted values
//! only; the judge never sees the extraction path's confidence signals, so
//! its verdicts stay independent.

use async_trait::async_trait;
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Document, ExtractionRecord, FieldVerdict, SchemaVersion, VerdictClass,
};
use crate::domain::ports::{Assessment, ReviewJudge};
use crate::infrastructure::llm::client::OpenAiCompatClient;

const JUDGE_SYSTEM_PROMPT: &str = "You are a strict reviewer of document extraction results. \
Compare each extracted field against the source document. Respond with only a JSON object: \
{\"overall\": \"correct|partial|incorrect|missing\", \"overall_score\": <0..1>, \
\"reasoning\": <short string>, \"fields\": [{\"field\": <name>, \
\"class\": \"correct|partial|incorrect|missing\", \"expected\": <value or null>, \
\"reasoning\": <short string or null>, \"score\": <0..1>}]}";

#[derive(Debug, serde::Deserialize)]
struct JudgeAnswer {
    overall: String,
    overall_score: Option<f64>,
    reasoning: Option<String>,
    #[serde(default)]
    fields: Vec<JudgeFieldAnswer>,
}

#[derive(Debug, serde::Deserialize)]
struct JudgeFieldAnswer {
    field: String,
    class: String,
    expected: Option<serde_json::Value>,
    reasoning: Option<String>,
    score: Option<f64>,
}

pub struct LlmJudge {
    client: OpenAiCompatClient,
    model: String,
}

impl LlmJudge {
    pub fn new(client: OpenAiCompatClient, model: impl Into<String>) -> Self {
        Self { client, model: model.into() }
    }

    fn build_prompt(record: &ExtractionRecord, document: &Document, schema: &SchemaVersion) -> String {
        let mut prompt = String::from("Schema fields:\n");
        for field in &schema.fields {
            prompt.push_str(&format!(
                "- {} ({}){}\n",
                field.name,
                field.field_type,
                field
                    .description
                    .as_deref()
                    .map(|d| format!(": {d}"))
                    .unwrap_or_default()
            ));
        }

        prompt.push_str("\nExtracted values:\n");
        for (name, value) in &record.fields {
            prompt.push_str(&format!("- {name}: {value}\n"));
        }

        prompt.push_str("\nSource document:\n");
        prompt.push_str(&document.full_text());
        prompt
    }
}

#[async_trait]
impl ReviewJudge for LlmJudge {
    async fn assess(
        &self,
        record: &ExtractionRecord,
        document: &Document,
        schema: &SchemaVersion,
    ) -> DomainResult<Assessment> {
        let prompt = Self::build_prompt(record, document, schema);
        let (content, tokens) = self
            .client
            .chat(&self.model, JUDGE_SYSTEM_PROMPT, &prompt)
            .await
            .map_err(|e| DomainError::ReviewFailed(e.to_string()))?;

        debug!(extraction = %record.id, tokens, "judge answered");

        let start = content.find('{');
        let end = content.rfind('}');
        let json = match (start, end) {
            (Some(s), Some(e)) if e > s => &content[s..=e],
            _ => return Err(DomainError::ReviewFailed("judge reply contained no JSON".to_string())),
        };

        let answer: JudgeAnswer = serde_json::from_str(json)
            .map_err(|e| DomainError::ReviewFailed(format!("unparseable judge reply: {e}")))?;

        let overall = VerdictClass::from_str(&answer.overall)
            .ok_or_else(|| DomainError::ReviewFailed(format!("unknown verdict '{}'", answer.overall)))?;

        let field_verdicts = answer
            .fields
            .into_iter()
            .filter_map(|f| {
                let class = VerdictClass::from_str(&f.class)?;
                Some(FieldVerdict {
                    field: f.field,
                    class,
                    expected: f.expected.map(|v| match v {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    }),
                    reasoning: f.reasoning,
                    score: f.score.map(|s| s.clamp(0.0, 1.0)),
                })
            })
            .collect();

        Ok(Assessment {
            overall,
            overall_score: answer.overall_score.map(|s| s.clamp(0.0, 1.0)),
            field_verdicts,
            reasoning: answer.reasoning,
        })
    }
}
