//! Docling conversion service client.
//!
//! `POST {base}/convert` takes a multipart PDF and returns the document as
//! markdown plus its table grids. `GET {base}/health` answers 200 when up.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

pub const DOCLING_DEFAULT_URL: &str = "http://localhost:8003";

/// Anything that turns a PDF into markdown plus tables.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn convert(&self, pdf_path: &Path) -> Result<ConvertedDocument>;
}

/// Docling service client.
pub struct DoclingClient {
    base_url: String,
    client: Client,
}

impl DoclingClient {
    pub fn new(base_url: Option<&str>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url
                .unwrap_or(DOCLING_DEFAULT_URL)
                .trim_end_matches('/')
                .to_string(),
            client: Client::builder()
                .timeout(timeout)
                .build()
                .context("building Docling HTTP client")?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if the Docling service is healthy.
    pub async fn health_check(&self) -> Result<bool> {
        let resp = self.client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;

        Ok(resp.status().is_success())
    }
}

#[async_trait]
impl DocumentConverter for DoclingClient {
    async fn convert(&self, pdf_path: &Path) -> Result<ConvertedDocument> {
        let file_bytes = fs::read(pdf_path)
            .await
            .with_context(|| format!("reading {}", pdf_path.display()))?;
        let filename = pdf_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document.pdf");

        let part = reqwest::multipart::Part::bytes(file_bytes)
            .file_name(filename.to_string())
            .mime_str("application/pdf")?;

        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self.client
            .post(format!("{}/convert", self.base_url))
            .multipart(form)
            .send()
            .await
            .context("Docling request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error = resp.text().await.unwrap_or_default();
            anyhow::bail!("Docling convert failed [{}]: {}", status, error);
        }

        let doc: ConvertedDocument = resp.json().await.context("decoding Docling response")?;
        debug!(
            file = %doc.filename,
            markdown_chars = doc.markdown.chars().count(),
            tables = doc.tables.len(),
            "Docling conversion complete"
        );
        Ok(doc)
    }
}

/// Converted document from Docling.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConvertedDocument {
    pub filename: String,
    pub markdown: String,
    #[serde(default)]
    pub tables: Vec<TableBlock>,
}

/// One table as a grid of cell text, header row first.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TableBlock {
    pub index: usize,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

impl TableBlock {
    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|r| r.iter().all(|c| c.trim().is_empty()))
    }

    /// CSV rendering. Ragged rows are written as-is.
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        for row in &self.rows {
            writer.write_record(row)?;
        }
        let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!(e.to_string()))?;
        Ok(String::from_utf8(bytes)?)
    }
}

impl ConvertedDocument {
    pub fn non_empty_tables(&self) -> impl Iterator<Item = &TableBlock> {
        self.tables.iter().filter(|t| !t.is_empty())
    }

    /// All non-empty tables as `Table N:` blocks of CSV, the form the
    /// extraction prompt expects.
    pub fn tables_as_csv(&self) -> Result<String> {
        let mut out = String::new();
        for table in self.non_empty_tables() {
            out.push_str(&format!("\n\nTable {}:\n", table.index));
            if let Some(caption) = table.caption.as_deref().filter(|c| !c.trim().is_empty()) {
                out.push_str(caption.trim());
                out.push('\n');
            }
            out.push_str(&table.to_csv()?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(index: usize, rows: &[&[&str]]) -> TableBlock {
        TableBlock {
            index,
            caption: None,
            rows: rows.iter().map(|r| r.iter().map(|c| c.to_string()).collect()).collect(),
        }
    }

    #[test]
    fn test_table_csv_quotes_cells() {
        let t = table(1, &[&["Region", "FW (mean ± SD)"], &["Putamen, left", "0.21 ± 0.03"]]);
        assert_eq!(t.to_csv().unwrap(), "Region,FW (mean ± SD)\n\"Putamen, left\",0.21 ± 0.03\n");
    }

    #[test]
    fn test_empty_tables_skipped() {
        let doc = ConvertedDocument {
            filename: "a.pdf".into(),
            markdown: "# A".into(),
            tables: vec![table(1, &[&["", " "]]), table(2, &[&["TR", "TE"], &["8000", "89"]])],
        };
        let csv = doc.tables_as_csv().unwrap();
        assert!(!csv.contains("Table 1:"));
        assert!(csv.contains("Table 2:\nTR,TE\n8000,89\n"));
    }

    #[test]
    fn test_response_shape_deserialises() {
        let json = r#"{"filename": "a.pdf", "markdown": "text",
            "tables": [{"index": 1, "caption": "Demographics", "rows": [["N", "40"]]}]}"#;
        let doc: ConvertedDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.tables[0].caption.as_deref(), Some("Demographics"));
        assert_eq!(doc.tables[0].rows[0][1], "40");
    }

    #[test]
    fn test_base_url_trimmed() {
        let c = DoclingClient::new(Some("http://docling:8003/"), Duration::from_secs(5)).unwrap();
        assert_eq!(c.base_url(), "http://docling:8003");
    }
}
