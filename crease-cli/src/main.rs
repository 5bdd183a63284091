mod session;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use crease_core::config::Config;
use crease_core::state;

const VALID_SECTIONS: &[&str] = &["models", "chat", "search", "storage", "advisor"];

#[derive(Parser)]
#[command(name = "crease", about = "Fantasy IPL advisor")]
struct Cli {
    /// Path to the config file
    #[arg(long, default_value = "crease.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Refresh the static data, then answer questions interactively
    Chat,
    /// Answer a single question
    Ask {
        /// The question to answer
        query: String,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Pull news, injury reports and player stats into the vector store
    Refresh,
    /// Print vector store statistics
    Stats,
    /// View and validate configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Pretty-print the effective config as TOML
    Show {
        /// Optional section name to display
        section: Option<String>,
    },
    /// Validate the config file
    Validate,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Chat => chat(&cli.config).await,
        Command::Ask { query, json } => ask(&cli.config, &query, json).await,
        Command::Refresh => refresh(&cli.config).await,
        Command::Stats => stats(&cli.config).await,
        Command::Config { action } => match action {
            ConfigAction::Show { section } => show_config(&cli.config, section.as_deref()),
            ConfigAction::Validate => validate_config(&cli.config),
        },
    };

    match result {
        Ok(output) => print!("{output}"),
        Err(msg) => {
            eprintln!("{msg}");
            process::exit(1);
        }
    }
}

fn load_config(config_path: &Path) -> Result<Config, String> {
    Config::load_or_default(config_path).map_err(|e| format!("Config error: {e}"))
}

async fn chat(config_path: &Path) -> Result<String, String> {
    let config = load_config(config_path)?;
    let advisor = state::build_advisor(&config)?;

    println!("Initializing advisor with latest data...");
    let summary = advisor
        .refresh_static_data()
        .await
        .map_err(|e| format!("Refresh failed: {e}"))?;
    println!(
        "Data refresh complete: {} news, {} injury reports, {} player stats",
        summary.news_count, summary.injury_reports_count, summary.player_stats_count
    );

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let session = session::run_chat(&advisor, stdin, &mut stdout)
        .await
        .map_err(|e| format!("Terminal error: {e}"))?;

    advisor
        .store()
        .flush()
        .await
        .map_err(|e| format!("Failed to flush vector store: {e}"))?;
    Ok(format!(
        "\n{}\nThank you for using Fantasy IPL Advisor!\n",
        session.render()
    ))
}

async fn ask(config_path: &Path, query: &str, json: bool) -> Result<String, String> {
    let config = load_config(config_path)?;
    let advisor = state::build_advisor(&config)?;
    let result = advisor
        .get_advice(query)
        .await
        .map_err(|e| format!("Error: {e}"))?;
    advisor
        .store()
        .flush()
        .await
        .map_err(|e| format!("Failed to flush vector store: {e}"))?;

    if json {
        let body = serde_json::to_string_pretty(&result).map_err(|e| format!("Error: {e}"))?;
        return Ok(format!("{body}\n"));
    }
    Ok(format!(
        "{}\n\nConfidence: {:.2} ({})\n",
        result.response_text, result.confidence_score, result.query_type
    ))
}

async fn refresh(config_path: &Path) -> Result<String, String> {
    let config = load_config(config_path)?;
    let advisor = state::build_advisor(&config)?;
    let summary = advisor
        .refresh_static_data()
        .await
        .map_err(|e| format!("Refresh failed: {e}"))?;
    advisor
        .store()
        .flush()
        .await
        .map_err(|e| format!("Failed to flush vector store: {e}"))?;
    let body = serde_json::to_string_pretty(&summary).map_err(|e| format!("Error: {e}"))?;
    Ok(format!("{body}\n"))
}

async fn stats(config_path: &Path) -> Result<String, String> {
    let config = load_config(config_path)?;
    let embedder = state::build_embedder(&config)?;
    let store = state::build_vector_store(&config, embedder)?;
    let stats = store.get_stats().await;
    let body = serde_json::to_string_pretty(&stats).map_err(|e| format!("Error: {e}"))?;
    Ok(format!("{body}\n"))
}

fn show_config(config_path: &Path, section: Option<&str>) -> Result<String, String> {
    let config = load_config(config_path)?;

    match section {
        None => Ok(config.to_toml_string()),
        Some(name) => {
            if !VALID_SECTIONS.contains(&name) {
                return Err(format!(
                    "Unknown section '{name}'. Valid sections: {}",
                    VALID_SECTIONS.join(", ")
                ));
            }
            // Serialize the full config to a TOML Value, then extract the section
            let full_toml: toml::Value = toml::de::from_str(&config.to_toml_string())
                .map_err(|e| format!("Config error: {e}"))?;
            let section_value = full_toml
                .get(name)
                .cloned()
                .unwrap_or_else(|| toml::Value::Table(toml::map::Map::new()));
            let mut wrapper = toml::map::Map::new();
            wrapper.insert(name.to_string(), section_value);
            toml::to_string_pretty(&wrapper).map_err(|e| format!("Config error: {e}"))
        }
    }
}

fn validate_config(config_path: &Path) -> Result<String, String> {
    if !config_path.exists() {
        return Err(format!(
            "Config file not found: {}. Use --config to specify the path.",
            config_path.display()
        ));
    }
    Config::from_file(config_path).map_err(|e| format!("Config error: {e}"))?;
    Ok("Configuration is valid.\n".to_string())
}
