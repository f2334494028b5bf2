use clap::{Parser, Subcommand};
use doc_query::Result;
use doc_query::commands::{ask_question, chat, check_health, load_document};
use doc_query::config::{Config, get_config_dir, run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "doc-query")]
#[command(about = "Ask questions about a single document using a local Ollama model")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the default index location
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection, chunking and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Load a document and build its index
    Load {
        /// Path to a PDF or text document
        path: PathBuf,
        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load a document and answer one question about it
    Ask {
        /// Path to a PDF or text document
        path: PathBuf,
        /// The question to answer
        question: String,
        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load a document and answer questions interactively
    Chat {
        /// Path to a PDF or text document
        path: PathBuf,
    },
    /// Check that Ollama and the configured models are available
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };

    let success = match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
            true
        }
        Commands::Load { path, json } => {
            let config = Config::load(&config_dir)?;
            load_document(&config, &path, json).await?
        }
        Commands::Ask {
            path,
            question,
            json,
        } => {
            let config = Config::load(&config_dir)?;
            ask_question(&config, &path, &question, json).await?
        }
        Commands::Chat { path } => {
            let config = Config::load(&config_dir)?;
            chat(&config, &path).await?
        }
        Commands::Health => {
            let config = Config::load(&config_dir)?;
            check_health(&config)?
        }
    };

    if !success {
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn load_command() {
        let cli = Cli::try_parse_from(["doc-query", "load", "plan.pdf"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(parsed.config_dir.is_none());
            if let Commands::Load { path, json } = parsed.command {
                assert_eq!(path, PathBuf::from("plan.pdf"));
                assert!(!json);
            } else {
                panic!("expected load command");
            }
        }
    }

    #[test]
    fn ask_command_with_json() {
        let cli = Cli::try_parse_from([
            "doc-query",
            "ask",
            "plan.pdf",
            "What is for breakfast?",
            "--json",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ask {
                path,
                question,
                json,
            } = parsed.command
            {
                assert_eq!(path, PathBuf::from("plan.pdf"));
                assert_eq!(question, "What is for breakfast?");
                assert!(json);
            } else {
                panic!("expected ask command");
            }
        }
    }

    #[test]
    fn ask_requires_question() {
        let cli = Cli::try_parse_from(["doc-query", "ask", "plan.pdf"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        }
    }

    #[test]
    fn config_dir_is_global() {
        let cli = Cli::try_parse_from(["doc-query", "chat", "plan.txt", "--config-dir", "/tmp/dq"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert_eq!(parsed.config_dir, Some(PathBuf::from("/tmp/dq")));
            assert!(matches!(parsed.command, Commands::Chat { .. }));
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["doc-query", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn health_command() {
        let cli = Cli::try_parse_from(["doc-query", "health"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Health));
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["doc-query", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["doc-query", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
