use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::embeddings::OllamaClient;
use crate::session::{LoadResponse, QueryResponse, SessionController};

const EXIT_COMMANDS: &[&str] = &["exit", "quit", "q"];

/// Load a document into a fresh session and report the outcome
///
/// Returns whether the load succeeded.
#[inline]
pub async fn load_document(config: &Config, path: &Path, json: bool) -> Result<bool> {
    let mut session = SessionController::from_config(config)
        .context("Failed to create session from configuration")?;

    let response = load_with_spinner(&mut session, path).await;
    print_load_response(&response, json)?;
    if response.success && !json {
        print_index_status(&session).await;
    }
    Ok(response.success)
}

/// Load a document and answer a single question about it
#[inline]
pub async fn ask_question(config: &Config, path: &Path, question: &str, json: bool) -> Result<bool> {
    let mut session = SessionController::from_config(config)
        .context("Failed to create session from configuration")?;

    let loaded = load_with_spinner(&mut session, path).await;
    if !loaded.success {
        print_load_response(&loaded, json)?;
        return Ok(false);
    }
    if !json {
        print_load_response(&loaded, false)?;
    }

    let response = query_with_spinner(&session, question).await;
    print_query_response(&response, json)?;
    Ok(response.success)
}

/// Load a document and answer questions read from the terminal until the user
/// leaves with an empty line or `exit`
#[inline]
pub async fn chat(config: &Config, path: &Path) -> Result<bool> {
    let mut session = SessionController::from_config(config)
        .context("Failed to create session from configuration")?;

    let loaded = load_with_spinner(&mut session, path).await;
    print_load_response(&loaded, false)?;
    if !loaded.success {
        return Ok(false);
    }

    eprintln!();
    eprintln!(
        "{}",
        style("Ask questions about the document. Press Enter on an empty line to quit.").dim()
    );

    loop {
        let question: String = Input::new()
            .with_prompt("Question")
            .allow_empty(true)
            .interact_text()?;
        let question = question.trim();

        if question.is_empty() || EXIT_COMMANDS.contains(&question.to_lowercase().as_str()) {
            break;
        }

        let response = query_with_spinner(&session, question).await;
        print_query_response(&response, false)?;
        eprintln!();
    }

    info!("Chat session ended");
    Ok(true)
}

/// Check that Ollama is reachable and serves both configured models
#[inline]
pub fn check_health(config: &Config) -> Result<bool> {
    let client = OllamaClient::new(&config.ollama)?;

    let bar = spinner(format!("Contacting Ollama at {}", client.base_url()));
    if let Err(e) = client.ping() {
        bar.finish_and_clear();
        println!(
            "{} Ollama is not reachable at {}: {:#}",
            style("✗").red(),
            client.base_url(),
            e
        );
        return Ok(false);
    }
    let result = client.health_check();
    bar.finish_and_clear();

    match result {
        Ok(()) => {
            println!(
                "{} Ollama is reachable at {}",
                style("✓").green(),
                style(client.base_url()).cyan()
            );
            println!("  Embedding model: {}", style(client.embedding_model()).cyan());
            println!(
                "  Generation model: {}",
                style(client.generation_model()).cyan()
            );
            Ok(true)
        }
        Err(e) => {
            println!("{} Health check failed: {:#}", style("✗").red(), e);
            Ok(false)
        }
    }
}

async fn load_with_spinner(session: &mut SessionController, path: &Path) -> LoadResponse {
    let bar = spinner(format!("Loading {}", path.display()));
    let response = session.load_document(path).await;
    bar.finish_and_clear();
    response
}

async fn query_with_spinner(session: &SessionController, question: &str) -> QueryResponse {
    let bar = spinner("Thinking...".to_string());
    let response = session.query(question).await;
    bar.finish_and_clear();
    response
}

fn spinner(message: String) -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new_spinner().with_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

async fn print_index_status(session: &SessionController) {
    match session.index_status().await {
        Ok(status) => println!(
            "  Index: {} chunks stored at {} (epoch {})",
            style(status.num_chunks).cyan(),
            style(status.location.display()).cyan(),
            status.epoch
        ),
        Err(e) => warn!("Could not read index status: {}", e),
    }
}

fn print_load_response(response: &LoadResponse, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }

    if response.success {
        println!(
            "{} {}",
            style("✓").green(),
            response.message.as_deref().unwrap_or("Document loaded")
        );
    } else {
        println!(
            "{} {}",
            style("✗").red(),
            response.error.as_deref().unwrap_or("Failed to load document")
        );
    }
    Ok(())
}

fn print_query_response(response: &QueryResponse, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }

    if !response.success {
        println!(
            "{} {}",
            style("✗").red(),
            response.error.as_deref().unwrap_or("Query failed")
        );
        return Ok(());
    }

    println!();
    println!("{}", response.answer.as_deref().unwrap_or_default());

    let sources = response.sources.as_deref().unwrap_or_default();
    if sources.is_empty() {
        return Ok(());
    }

    println!();
    println!("{}", style(format!("Sources ({}):", sources.len())).bold().yellow());
    for (i, source) in sources.iter().enumerate() {
        let page = source
            .metadata
            .get("page")
            .map_or_else(String::new, |page| format!(" page {page}"));
        println!(
            "  [{}]{} {}",
            i + 1,
            page,
            style(format!("(similarity {:.2})", source.score)).dim()
        );
        println!("      {}", source.content.replace('\n', " "));
    }
    Ok(())
}
