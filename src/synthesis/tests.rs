use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::*;
use crate::embeddings::chunking::Chunk;

struct RecordingGenerator {
    reply: Result<String>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl GenerationBackend for RecordingGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .expect("prompt log lock")
            .push(prompt.to_string());
        match &self.reply {
            Ok(answer) => Ok(answer.clone()),
            Err(e) => Err(RagError::GenerationBackend(e.to_string())),
        }
    }
}

fn synthesizer(reply: Result<String>) -> (AnswerSynthesizer, Arc<Mutex<Vec<String>>>) {
    let prompts = Arc::new(Mutex::new(Vec::new()));
    let generator = RecordingGenerator {
        reply,
        prompts: Arc::clone(&prompts),
    };
    (AnswerSynthesizer::new(Box::new(generator)), prompts)
}

fn passage(text: &str, page: Option<&str>) -> SearchResult {
    let mut metadata = BTreeMap::new();
    if let Some(page) = page {
        metadata.insert("page".to_string(), page.to_string());
    }
    SearchResult {
        chunk: Chunk {
            text: text.to_string(),
            ordinal: 0,
            overlap: 0,
            metadata,
        },
        score: 0.9,
    }
}

#[test]
fn prompt_contains_question_and_context() {
    let passages = vec![
        passage("Breakfast is oatmeal with berries.", Some("2")),
        passage("Dinner is grilled fish.", None),
    ];

    let prompt = build_prompt("  What is for breakfast? ", &passages);

    assert!(prompt.contains("[1] (page 2)\nBreakfast is oatmeal with berries."));
    assert!(prompt.contains("[2]\nDinner is grilled fish."));
    assert!(prompt.contains("berries.\n\n[2]"));
    assert!(prompt.contains("Context:\n[1]"));
    assert!(prompt.ends_with("Question: What is for breakfast?\nAnswer:"));
    assert!(prompt.contains("Avoid repeating"));
}

#[test]
fn prompt_without_passages_says_so() {
    let prompt = build_prompt("Anything?", &[]);
    assert!(prompt.contains("no relevant passages"));
}

#[test]
fn synthesize_calls_backend_once() {
    let (synthesizer, prompts) = synthesizer(Ok("  Oatmeal with berries. \n".to_string()));
    let passages = vec![passage("Breakfast is oatmeal with berries.", Some("1"))];

    let synthesis = synthesizer
        .synthesize("What is for breakfast?", &passages)
        .expect("synthesis should succeed");

    assert_eq!(synthesis.answer, "Oatmeal with berries.");
    assert_eq!(synthesis.sources_used, 1);
    assert_eq!(prompts.lock().expect("prompt log lock").len(), 1);
}

#[test]
fn backend_failure_is_reported() {
    let (synthesizer, _) = synthesizer(Err(RagError::GenerationBackend(
        "connection refused".to_string(),
    )));

    let result = synthesizer.synthesize("question", &[]);

    assert!(matches!(result, Err(RagError::GenerationBackend(_))));
}

#[test]
fn empty_answer_is_an_error() {
    let (synthesizer, _) = synthesizer(Ok("\n  \n".to_string()));

    let result = synthesizer.synthesize("question", &[passage("text", None)]);

    assert!(matches!(result, Err(RagError::GenerationBackend(_))));
}
