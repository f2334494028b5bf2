//! Deterministic in-process backends and fixtures for unit tests

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::embeddings::EmbeddingBackend;
use crate::synthesis::GenerationBackend;
use crate::{RagError, Result};

pub const VOCABULARY: &[&str] = &[
    "breakfast", "oatmeal", "lunch", "salad", "dinner", "fish", "water", "protein", "engine",
    "piston", "fuel", "brake",
];

/// Bag-of-keywords embedder: one dimension per vocabulary word plus a small
/// constant so no vector is all zeros
#[derive(Debug, Clone, Default)]
pub struct KeywordEmbedder {
    pub fail: Arc<AtomicBool>,
    pub calls: Arc<AtomicUsize>,
}

impl KeywordEmbedder {
    pub fn failing() -> Self {
        let embedder = Self::default();
        embedder.fail.store(true, Ordering::SeqCst);
        embedder
    }
}

pub fn keyword_vector(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let mut vector: Vec<f32> = VOCABULARY
        .iter()
        .map(|word| lower.matches(word).count() as f32)
        .collect();
    vector.push(0.05);
    vector
}

impl EmbeddingBackend for KeywordEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(RagError::EmbeddingBackend(
                "connection refused".to_string(),
            ));
        }
        Ok(keyword_vector(text))
    }
}

/// Generator that echoes how many context passages it was given
#[derive(Debug, Clone, Default)]
pub struct EchoGenerator {
    pub fail: Arc<AtomicBool>,
}

impl GenerationBackend for EchoGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RagError::GenerationBackend(
                "model is loading".to_string(),
            ));
        }
        let passages = prompt.lines().filter(|line| line.starts_with('[')).count();
        Ok(format!("Answer based on {passages} passages."))
    }
}

/// Hand-assembled PDF with one Helvetica text line per page. Only `/F1` is
/// defined in the page resources; any other `font` name is left dangling.
pub fn pdf_with_pages(lines: &[&str], font: &str) -> Vec<u8> {
    let page_count = lines.len();
    let font_id = 3 + 2 * page_count;
    let mut objects: Vec<String> = Vec::new();

    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    let kids: Vec<String> = (0..page_count).map(|i| format!("{} 0 R", 3 + 2 * i)).collect();
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        page_count
    ));
    for (i, line) in lines.iter().enumerate() {
        let content_id = 4 + 2 * i;
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {content_id} 0 R /Resources << /Font << /F1 {font_id} 0 R >> >> >>"
        ));
        let stream = format!("BT /{font} 12 Tf 100 700 Td ({line}) Tj ET");
        objects.push(format!(
            "<< /Length {} >> stream\n{}\nendstream",
            stream.len(),
            stream
        ));
    }
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());

    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj {} endobj\n", i + 1, body).as_bytes());
    }
    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}
