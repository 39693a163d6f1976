//! PDF text extraction

use thiserror::Error;

const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("Not a PDF document")]
    NotPdf,
    #[error("Could not extract text: {0}")]
    Extract(String),
    #[error("Document contains no extractable text")]
    NoText,
}

/// Whether the bytes start with the PDF header.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// Extract plain text from a PDF on the blocking pool.
pub async fn extract_text(bytes: Vec<u8>) -> Result<String, PdfError> {
    tokio::task::spawn_blocking(move || extract_text_blocking(&bytes))
        .await
        .map_err(|e| PdfError::Extract(e.to_string()))?
}

fn extract_text_blocking(bytes: &[u8]) -> Result<String, PdfError> {
    if !looks_like_pdf(bytes) {
        return Err(PdfError::NotPdf);
    }
    let raw = pdf_extract::extract_text_from_mem(bytes).map_err(|e| PdfError::Extract(e.to_string()))?;
    let text = tidy_text(&raw);
    if text.is_empty() {
        return Err(PdfError::NoText);
    }
    Ok(text)
}

/// Trim lines and collapse runs of blank lines to one.
fn tidy_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0;
    for line in raw.lines().map(str::trim_end) {
        if line.trim().is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run > 0 { "\n\n" } else { "\n" });
        }
        out.push_str(line);
        blank_run = 0;
    }
    out
}
