//! `anyextract doc` - document registration.
//!
//! Documents arrive already parsed. A registered file is either a plain
//! text file (one page) or a JSON array of page records from the parsing
//! collaborator.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::cli::output::{output, truncate, CommandOutput};
use crate::domain::models::{Document, ParsedPage};
use crate::domain::ports::DocumentRepository;
use crate::infrastructure::database::{SqliteDocumentRepository, SqliteTaskRepository};

#[derive(Args, Debug)]
pub struct DocArgs {
    #[command(subcommand)]
    pub command: DocCommands,
}

#[derive(Subcommand, Debug)]
pub enum DocCommands {
    /// Register a parsed document under a task
    Add {
        /// Task name or ID
        task: String,
        /// Path to a text file or a JSON page array
        path: PathBuf,
        /// Mark the document as part of the bootstrap sample set
        #[arg(long)]
        sample: bool,
    },
    /// List documents registered under a task
    List {
        /// Task name or ID
        task: String,
    },
}

#[derive(Debug, serde::Serialize)]
struct DocAddOutput {
    id: String,
    filename: String,
    file_hash: String,
    pages: usize,
    is_sample: bool,
}

impl CommandOutput for DocAddOutput {
    fn to_human(&self) -> String {
        format!(
            "Registered {} ({} page(s), hash {})",
            self.filename,
            self.pages,
            &self.file_hash[..12]
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
struct DocListOutput {
    documents: Vec<DocListEntry>,
    total: usize,
}

#[derive(Debug, serde::Serialize)]
struct DocListEntry {
    id: String,
    filename: String,
    pages: usize,
    is_sample: bool,
    created_at: String,
}

impl CommandOutput for DocListOutput {
    fn to_human(&self) -> String {
        if self.documents.is_empty() {
            return "No documents registered.".to_string();
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(["ID", "FILENAME", "PAGES", "SAMPLE", "REGISTERED"]);
        for doc in &self.documents {
            table.add_row([
                doc.id[..8].to_string(),
                truncate(&doc.filename, 32),
                doc.pages.to_string(),
                if doc.is_sample { "yes" } else { "" }.to_string(),
                doc.created_at.clone(),
            ]);
        }
        format!("{table}")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn parse_pages(path: &Path, raw: &str) -> Result<Vec<ParsedPage>> {
    let is_json = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        serde_json::from_str(raw)
            .with_context(|| format!("{} is not a valid page array", path.display()))
    } else {
        Ok(vec![ParsedPage {
            page_number: 1,
            text: raw.to_string(),
            clarity: None,
        }])
    }
}

pub async fn execute(args: DocArgs, json_mode: bool) -> Result<()> {
    let config = super::load_config()?;
    let pool = super::open_database(&config).await?;
    let tasks = SqliteTaskRepository::new(pool.clone());
    let docs = SqliteDocumentRepository::new(pool);

    match args.command {
        DocCommands::Add { task, path, sample } => {
            let task = super::resolve_task(&tasks, &task).await?;

            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let file_hash = format!("{:x}", Sha256::digest(raw.as_bytes()));

            if let Some(existing) = docs.get_by_hash(task.id, &file_hash).await? {
                anyhow::bail!(
                    "Identical content already registered as {} ({})",
                    existing.filename,
                    existing.id
                );
            }

            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let pages = parse_pages(&path, &raw)?;

            let mut document = Document::new(task.id, filename, file_hash).with_pages(pages);
            if sample {
                document = document.as_sample();
            }
            docs.insert(&document).await?;

            let out = DocAddOutput {
                id: document.id.to_string(),
                filename: document.filename,
                file_hash: document.file_hash,
                pages: document.pages.len(),
                is_sample: document.is_sample,
            };
            output(&out, json_mode);
        }

        DocCommands::List { task } => {
            let task = super::resolve_task(&tasks, &task).await?;
            let documents = docs.list_for_task(task.id).await?;
            let out = DocListOutput {
                total: documents.len(),
                documents: documents
                    .into_iter()
                    .map(|d| DocListEntry {
                        id: d.id.to_string(),
                        filename: d.filename,
                        pages: d.pages.len(),
                        is_sample: d.is_sample,
                        created_at: d.created_at.format("%Y-%m-%d %H:%M").to_string(),
                    })
                    .collect(),
            };
            output(&out, json_mode);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pages_plain_text() {
        let pages = parse_pages(Path::new("invoice.txt"), "Total: 42.00").unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page_number, 1);
        assert_eq!(pages[0].clarity, None);
    }

    #[test]
    fn test_parse_pages_json_array() {
        let raw = r#"[{"page_number":1,"text":"a","clarity":0.9},{"page_number":2,"text":"b","clarity":null}]"#;
        let pages = parse_pages(Path::new("invoice.json"), raw).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].clarity, Some(0.9));
    }

    #[test]
    fn test_parse_pages_rejects_bad_json() {
        assert!(parse_pages(Path::new("bad.json"), "not json").is_err());
    }
}
