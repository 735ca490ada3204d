//! Document domain model.
//!
//! Documents arrive already parsed: the parsing collaborator yields
//! page-level text records which the engine only reads, never produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One page of parsed document content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedPage {
    pub page_number: u32,
    pub text: String,
    /// Parser's own quality estimate for this page, in [0,1].
    pub clarity: Option<f64>,
}

/// A document registered under a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub task_id: Uuid,
    pub filename: String,
    /// Content hash of the source file, for dedup across re-registration.
    pub file_hash: String,
    /// Parsed page-level content from the parsing collaborator.
    pub pages: Vec<ParsedPage>,
    /// Whether this document belongs to the bootstrap sample set.
    pub is_sample: bool,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn new(task_id: Uuid, filename: impl Into<String>, file_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            filename: filename.into(),
            file_hash: file_hash.into(),
            pages: Vec::new(),
            is_sample: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_pages(mut self, pages: Vec<ParsedPage>) -> Self {
        self.pages = pages;
        self
    }

    pub fn as_sample(mut self) -> Self {
        self.is_sample = true;
        self
    }

    /// All page text joined, used as model context.
    pub fn full_text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Mean parser clarity across pages; missing estimates default to 0.5.
    pub fn mean_clarity(&self) -> f64 {
        if self.pages.is_empty() {
            return 0.5;
        }
        let sum: f64 = self.pages.iter().map(|p| p.clarity.unwrap_or(0.5)).sum();
        sum / self.pages.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_clarity_defaults() {
        let doc = Document::new(Uuid::new_v4(), "a.pdf", "abc").with_pages(vec![
            ParsedPage { page_number: 1, text: "x".into(), clarity: Some(0.9) },
            ParsedPage { page_number: 2, text: "y".into(), clarity: None },
        ]);
        let clarity = doc.mean_clarity();
        assert!((clarity - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_empty_document_clarity() {
        let doc = Document::new(Uuid::new_v4(), "a.pdf", "abc");
        assert!((doc.mean_clarity() - 0.5).abs() < 1e-9);
    }
}
