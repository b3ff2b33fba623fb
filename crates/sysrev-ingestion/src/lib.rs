//! sysrev-ingestion — PDF to candidates to records.
//! - Document selection (folder scan or file list)
//! - Docling conversion client and local lopdf text extraction
//! - Schema-driven extraction prompts and the response grammar
//! - Table and text source adapters
//! - Hybrid extraction pipeline with bounded concurrency
//! - Include/exclude screening

pub mod models;
pub mod docling;
pub mod pdf_parser;
pub mod metadata;
pub mod prompts;
pub mod response;
pub mod sources;
pub mod pipeline;
pub mod screening;

pub use docling::{ConvertedDocument, DoclingClient, DocumentConverter, TableBlock};
pub use models::{select_documents, Document};
pub use pipeline::{BatchOptions, ExtractionPipeline};
pub use prompts::PromptBuilder;
pub use screening::Screener;
pub use sources::{SourceAdapter, TableSource, TextSource};
