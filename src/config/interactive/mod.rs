
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input};
use std::path::{Path, PathBuf};

use super::{Config, ConfigError, OllamaConfig};
use crate::embeddings::chunking::ChunkingConfig;

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 Doc Query Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir);

    eprintln!("{}", style("Ollama Configuration").bold().yellow());
    eprintln!("Configure the Ollama instance used for embeddings and answers.");
    eprintln!();

    configure_ollama(&mut config.ollama)?;

    eprintln!();
    eprintln!("{}", style("Retrieval Configuration").bold().yellow());
    configure_chunking(&mut config.chunking)?;
    configure_retrieval(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Storage Configuration").bold().yellow());
    configure_storage(&mut config)?;

    config
        .validate()
        .context("Configuration is not valid")?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_ollama_connection(&config.ollama) {
        eprintln!("{}", style("✓ Ollama connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not connect to Ollama").yellow()
        );
        eprintln!("You can continue, but make sure Ollama is running before loading documents.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    match config.ollama.ollama_url() {
        Ok(url) => eprintln!("  URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!(
        "  Embedding Model: {}",
        style(&config.ollama.embedding_model).cyan()
    );
    eprintln!(
        "  Generation Model: {}",
        style(&config.ollama.generation_model).cyan()
    );
    eprintln!("  Batch Size: {}", style(config.ollama.batch_size).cyan());
    eprintln!("  Temperature: {}", style(config.ollama.temperature).cyan());
    eprintln!(
        "  Timeout: {}s",
        style(config.ollama.timeout_seconds).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Chunking:").bold().yellow());
    eprintln!("  Chunk Size: {}", style(config.chunking.chunk_size).cyan());
    eprintln!(
        "  Chunk Overlap: {}",
        style(config.chunking.chunk_overlap).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());
    eprintln!(
        "  Similarity Threshold: {}",
        style(config.retrieval.similarity_threshold).cyan()
    );
    eprintln!(
        "  Duplicate Prefix: {} chars",
        style(config.retrieval.dedup_prefix_chars).cyan()
    );
    eprintln!(
        "  Source Preview: {} chars",
        style(config.retrieval.preview_chars).cyan()
    );

    eprintln!();
    eprintln!(
        "Index location: {}",
        style(config.index_path().display()).cyan()
    );
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config(config_dir: &Path) -> Config {
    Config::load(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Config::with_base_dir(config_dir)
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            config
        },
    )
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("Ollama URL")
        .default(ollama.base_url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OllamaConfig {
                base_url: input.clone(),
                ..OllamaConfig::default()
            };
            temp_config.ollama_url()?;
            Ok(())
        })
        .interact_text()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(ollama.embedding_model.clone())
        .validate_with(|input: &String| non_empty(input))
        .interact_text()?;

    let generation_model: String = Input::new()
        .with_prompt("Generation model")
        .default(ollama.generation_model.clone())
        .validate_with(|input: &String| non_empty(input))
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(ollama.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 1000 {
                Err("Batch size must be 1000 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let temperature: f32 = Input::new()
        .with_prompt("Generation temperature")
        .default(ollama.temperature)
        .validate_with(|input: &f32| -> Result<(), &str> {
            if (0.0..=2.0).contains(input) {
                Ok(())
            } else {
                Err("Temperature must be between 0 and 2")
            }
        })
        .interact_text()?;

    let timeout_seconds: u64 = Input::new()
        .with_prompt("Request timeout (seconds)")
        .default(ollama.timeout_seconds)
        .validate_with(|input: &u64| -> Result<(), &str> {
            if (1..=3600).contains(input) {
                Ok(())
            } else {
                Err("Timeout must be between 1 and 3600 seconds")
            }
        })
        .interact_text()?;

    ollama.set_base_url(base_url)?;
    ollama.set_embedding_model(embedding_model)?;
    ollama.set_generation_model(generation_model)?;
    ollama.set_batch_size(batch_size)?;
    ollama.set_temperature(temperature)?;
    ollama.set_timeout_seconds(timeout_seconds)?;

    Ok(())
}

fn configure_chunking(chunking: &mut ChunkingConfig) -> Result<()> {
    chunking.chunk_size = Input::new()
        .with_prompt("Chunk size (characters)")
        .default(chunking.chunk_size)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=100_000).contains(input) {
                Ok(())
            } else {
                Err("Chunk size must be between 1 and 100000")
            }
        })
        .interact_text()?;

    let chunk_size = chunking.chunk_size;
    chunking.chunk_overlap = Input::new()
        .with_prompt("Chunk overlap (characters)")
        .default(chunking.chunk_overlap.min(chunk_size - 1))
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input < chunk_size {
                Ok(())
            } else {
                Err("Overlap must be smaller than the chunk size")
            }
        })
        .interact_text()?;

    Ok(())
}

fn configure_retrieval(config: &mut Config) -> Result<()> {
    let top_k: usize = Input::new()
        .with_prompt("Passages retrieved per question")
        .default(config.retrieval.top_k)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input == 0 {
                Err("At least one passage must be retrieved")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let similarity_threshold: f32 = Input::new()
        .with_prompt("Minimum similarity (-1 to 1)")
        .default(config.retrieval.similarity_threshold)
        .validate_with(|input: &f32| -> Result<(), &str> {
            if (-1.0..=1.0).contains(input) {
                Ok(())
            } else {
                Err("Similarity must be between -1 and 1")
            }
        })
        .interact_text()?;

    let dedup_prefix_chars: usize = Input::new()
        .with_prompt("Characters compared when dropping duplicate passages")
        .default(config.retrieval.dedup_prefix_chars)
        .validate_with(|input: &usize| at_least_one(*input))
        .interact_text()?;

    let preview_chars: usize = Input::new()
        .with_prompt("Characters shown per source preview")
        .default(config.retrieval.preview_chars)
        .validate_with(|input: &usize| at_least_one(*input))
        .interact_text()?;

    config.set_top_k(top_k)?;
    config.set_similarity_threshold(similarity_threshold)?;
    config.set_dedup_prefix_chars(dedup_prefix_chars)?;
    config.set_preview_chars(preview_chars)?;

    Ok(())
}

fn configure_storage(config: &mut Config) -> Result<()> {
    let current = config
        .storage
        .persist_location
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_default();

    eprintln!(
        "Leave empty to keep the index in {}",
        style(Config::with_base_dir(config.base_dir()).index_path().display()).dim()
    );
    let location: String = Input::new()
        .with_prompt("Index location")
        .default(current)
        .allow_empty(true)
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let mut candidate = config.clone();
            candidate.set_persist_location(persist_location(input))
        })
        .interact_text()?;

    config.set_persist_location(persist_location(&location))?;
    Ok(())
}

/// Blank input means the default location under the config directory
fn persist_location(input: &str) -> Option<PathBuf> {
    let trimmed = input.trim();
    (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
}

fn at_least_one(input: usize) -> Result<(), &'static str> {
    if input == 0 {
        Err("Value must be at least 1")
    } else {
        Ok(())
    }
}

fn non_empty(input: &str) -> Result<(), &'static str> {
    if input.trim().is_empty() {
        Err("Model name cannot be empty")
    } else {
        Ok(())
    }
}

fn test_ollama_connection(ollama: &OllamaConfig) -> bool {
    let Ok(base_url) = ollama.ollama_url() else {
        return false;
    };
    let Ok(url) = base_url.join("api/version") else {
        return false;
    };

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(url.as_str()).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}
