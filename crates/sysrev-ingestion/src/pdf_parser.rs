//! Local PDF text extraction with lopdf.
//!
//! Blocking; async callers go through `load_pdf_text`, which runs the parse
//! on the blocking pool.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lopdf::{Document as PdfDoc, Object};
use tracing::debug;

/// Page texts in page order, plus the document-info title when present.
#[derive(Debug, Clone, Default)]
pub struct PdfText {
    pub pages: Vec<String>,
    pub info_title: Option<String>,
}

impl PdfText {
    pub fn full_text(&self) -> String {
        self.pages.join("\n")
    }

    pub fn first_page(&self) -> &str {
        self.pages.first().map(String::as_str).unwrap_or("")
    }

    pub fn char_count(&self) -> usize {
        self.pages.iter().map(|p| p.chars().count()).sum()
    }
}

/// Parse a PDF file and extract the text of every page.
/// Pages whose text cannot be decoded are kept as empty strings.
pub fn extract_pdf_text(pdf_path: &Path) -> Result<PdfText> {
    let pdf = PdfDoc::load(pdf_path)
        .with_context(|| format!("opening PDF {}", pdf_path.display()))?;

    let mut pages = Vec::new();
    for (page_num, _) in pdf.get_pages() {
        match pdf.extract_text(&[page_num]) {
            Ok(text) => pages.push(text),
            Err(e) => {
                debug!(file = %pdf_path.display(), page = page_num, error = %e, "Page text extraction failed");
                pages.push(String::new());
            }
        }
    }

    Ok(PdfText {
        info_title: info_title(&pdf),
        pages,
    })
}

pub async fn load_pdf_text(pdf_path: PathBuf) -> Result<PdfText> {
    tokio::task::spawn_blocking(move || extract_pdf_text(&pdf_path))
        .await
        .context("PDF extraction task panicked")?
}

fn info_title(pdf: &PdfDoc) -> Option<String> {
    let info_id = pdf.trailer.get(b"Info").ok()?.as_reference().ok()?;
    let info = pdf.get_object(info_id).ok()?.as_dict().ok()?;
    match info.get(b"Title").ok()? {
        Object::String(bytes, _) => {
            let title = decode_pdf_string(bytes);
            let title = title.trim();
            (!title.is_empty()).then(|| title.to_string())
        }
        _ => None,
    }
}

/// PDF text strings are UTF-16BE with a BOM, or single-byte otherwise.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf16_title() {
        let bytes = [0xFE, 0xFF, 0x00, 0x46, 0x00, 0x57];
        assert_eq!(decode_pdf_string(&bytes), "FW");
    }

    #[test]
    fn test_decode_latin1_fallback() {
        assert_eq!(decode_pdf_string(&[0x4D, 0xE9, 0x64]), "Méd");
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(extract_pdf_text(Path::new("/nonexistent/paper.pdf")).is_err());
    }

    #[test]
    fn test_page_helpers() {
        let t = PdfText { pages: vec!["one".into(), "two".into()], info_title: None };
        assert_eq!(t.full_text(), "one\ntwo");
        assert_eq!(t.first_page(), "one");
        assert_eq!(t.char_count(), 6);
    }
}
