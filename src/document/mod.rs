//! Document loading
//!
//! A document is read into pages: PDF files page by page, anything else as
//! UTF-8 text with form feeds treated as page breaks.


use std::any::Any;
use std::collections::BTreeMap;
use std::panic;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::embeddings::chunking::{Chunk, TextSplitter};
use crate::{RagError, Result};

const PAGE_BREAK: char = '\u{000C}';

/// One page of extracted text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number
    pub number: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    pub path: PathBuf,
    pub pages: Vec<Page>,
}

impl LoadedDocument {
    #[inline]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Split every non-blank page into chunks. Overlap never crosses a page
    /// boundary and ordinals run across the whole document.
    #[inline]
    pub fn chunk(&self, splitter: &TextSplitter) -> Result<Vec<Chunk>> {
        let source = self.path.display().to_string();
        let total_pages = self.page_count().to_string();
        let mut chunks = Vec::new();

        for page in &self.pages {
            if page.text.trim().is_empty() {
                debug!("Skipping blank page {}", page.number);
                continue;
            }

            let metadata = BTreeMap::from([
                ("source".to_string(), source.clone()),
                ("page".to_string(), page.number.to_string()),
                ("total_pages".to_string(), total_pages.clone()),
            ]);
            let page_chunks = splitter.split_with_metadata(&page.text, &metadata, chunks.len())?;
            chunks.extend(page_chunks);
        }

        debug!(
            "Chunked {} pages of {} into {} chunks",
            self.page_count(),
            source,
            chunks.len()
        );
        Ok(chunks)
    }
}

/// Read the document at `path` into pages
///
/// # Errors
/// * [`RagError::DocumentNotFound`] if nothing exists at `path`
/// * [`RagError::DocumentParse`] if the file cannot be decoded
#[inline]
pub fn load_document(path: &Path) -> Result<LoadedDocument> {
    if !path.exists() {
        return Err(RagError::DocumentNotFound(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(RagError::DocumentParse(format!(
            "{} is not a regular file",
            path.display()
        )));
    }

    let texts = if is_pdf(path) {
        read_pdf_pages(path)?
    } else {
        read_text_pages(path)?
    };

    let pages: Vec<Page> = texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| Page { number: i + 1, text })
        .collect();

    info!("Loaded {} pages from {}", pages.len(), path.display());

    Ok(LoadedDocument {
        path: path.to_path_buf(),
        pages,
    })
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

fn read_pdf_pages(path: &Path) -> Result<Vec<String>> {
    let bytes = std::fs::read(path)?;

    // pdf-extract panics on some malformed inputs (e.g. an undefined font resource)
    let extracted = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(&bytes)
    }))
    .map_err(|payload| {
        RagError::DocumentParse(format!(
            "PDF extraction aborted for {}: {}",
            path.display(),
            panic_message(payload.as_ref())
        ))
    })?;

    extracted.map_err(|e| {
        RagError::DocumentParse(format!("Failed to extract PDF text from {}: {}", path.display(), e))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown extraction error".to_string()
    }
}

fn read_text_pages(path: &Path) -> Result<Vec<String>> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8(bytes).map_err(|_| {
        RagError::DocumentParse(format!("{} is not valid UTF-8 text", path.display()))
    })?;

    Ok(split_pages(&text))
}

/// Split text on form feeds. A trailing form feed does not open a new page.
fn split_pages(text: &str) -> Vec<String> {
    let body = text.strip_suffix(PAGE_BREAK).unwrap_or(text);
    body.split(PAGE_BREAK).map(str::to_string).collect()
}
