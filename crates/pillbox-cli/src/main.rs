#![deny(unsafe_code)]

//! pillbox CLI: the tag grammar and asset server from the shell.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pillbox_config::AppConfig;
use pillbox_core::api::{BrowseResponse, TagSuggestion, trigger_words};
use pillbox_core::codec::{NoGroups, format_text};
use pillbox_core::menu::highlight_matches;
use pillbox_core::{AssetApi, AssetKind, CachedGroupResolver, TagCollection, parse_text, serialize};

/// pillbox: structured prompt tags backed by an asset server.
#[derive(Parser)]
#[command(name = "pillbox", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "pillbox.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse prompt text into a JSON tag collection.
    Parse {
        /// Prompt text; read from stdin when omitted or `-`.
        text: Option<String>,
    },

    /// Serialize a JSON tag collection into prompt text, expanding groups.
    Format {
        /// Collection file; read from stdin when omitted or `-`.
        input: Option<PathBuf>,

        /// Treat the input as prompt text instead of JSON.
        #[arg(long)]
        text: bool,

        /// Separator between tags (defaults to `[tags] separator`).
        #[arg(long)]
        separator: Option<String>,

        /// Do not contact the server; group references contribute nothing.
        #[arg(long)]
        offline: bool,

        /// Print the editable form: inactive tags kept, groups unexpanded.
        #[arg(long, conflicts_with = "offline")]
        editable: bool,
    },

    /// Search the tag database.
    Search {
        query: String,

        /// Maximum number of results (defaults to `[tags] search_limit`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// List one folder of an asset category.
    Browse {
        /// Asset category: lora, embedding or group.
        kind: AssetKind,

        /// Folder relative to the category root.
        #[arg(default_value = "")]
        path: String,

        /// Only list entries matching this filter.
        #[arg(long, default_value = "")]
        query: String,
    },

    /// Show trigger word candidates for a LoRA file.
    Triggers {
        /// Model file, including extension.
        file: String,

        #[arg(long, default_value_t = 16)]
        limit: usize,
    },

    /// Print a group file, or replace it with `--save`.
    Group {
        name: String,

        /// JSON collection to write as the group's contents.
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config).await?;

    let filter = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Parse { text } => cmd_parse(text)?,
        Commands::Format {
            input,
            text,
            separator,
            offline,
            editable,
        } => {
            let separator = separator.unwrap_or_else(|| config.tags.separator.clone());
            let raw = read_input(input.as_deref())?;
            let collection = if text {
                parse_text(&raw, None)
            } else {
                TagCollection::from_json(&raw).context("input is not a tag collection")?
            };
            let out = if editable {
                format_text(&collection, &separator)
            } else if offline {
                serialize(&collection, &separator, &NoGroups).await
            } else {
                let resolver = CachedGroupResolver::new(connect(&config)?);
                serialize(&collection, &separator, &resolver).await
            };
            println!("{out}");
        }
        Commands::Search { query, limit } => {
            let limit = limit.unwrap_or(config.tags.search_limit);
            let results = connect(&config)?.search_tags(&query, limit).await?;
            print!("{}", render_suggestions(&query, &results));
        }
        Commands::Browse { kind, path, query } => {
            let listing = connect(&config)?.search_files(kind, &path, &query).await?;
            print!("{}", render_listing(kind, &listing));
        }
        Commands::Triggers { file, limit } => {
            match connect(&config)?.lora_metadata(&file).await? {
                Some(metadata) => {
                    for (word, count) in trigger_words(&metadata, limit) {
                        println!("{count:>6}  {word}");
                    }
                }
                None => eprintln!("No metadata for '{file}'."),
            }
        }
        Commands::Group { name, save } => cmd_group(&config, &name, save.as_deref()).await?,
        Commands::Config { show } => cmd_config(&cli.config, &config, show)?,
    }

    Ok(())
}

fn connect(config: &AppConfig) -> Result<AssetApi> {
    AssetApi::from_config(&config.server).context("invalid [server] configuration")
}

fn cmd_parse(text: Option<String>) -> Result<()> {
    let text = match text.as_deref() {
        None | Some("-") => read_stdin()?,
        Some(text) => text.to_string(),
    };
    let collection = parse_text(&text, None);
    println!("{}", collection.to_json_pretty()?);
    Ok(())
}

async fn cmd_group(config: &AppConfig, name: &str, save: Option<&Path>) -> Result<()> {
    let api = connect(config)?;
    match save {
        Some(path) => {
            let raw = read_input(Some(path))?;
            let collection =
                TagCollection::from_json(&raw).context("input is not a tag collection")?;
            api.save_group(name, &collection).await?;
            info!(group = %name, "group written");
        }
        None => {
            let collection = api.group(name, None).await?;
            println!("{}", collection.to_json_pretty()?);
        }
    }
    Ok(())
}

fn cmd_config(config_path: &Path, config: &AppConfig, show: bool) -> Result<()> {
    if show {
        let toml_str =
            toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {e}"))?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

async fn load_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        AppConfig::load(path).await.map_err(|e| anyhow::anyhow!(e))
    } else {
        Ok(AppConfig::default())
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        None => read_stdin(),
        Some(p) if p == Path::new("-") => read_stdin(),
        Some(p) => {
            std::fs::read_to_string(p).with_context(|| format!("cannot read {}", p.display()))
        }
    }
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("cannot read stdin")?;
    Ok(buf)
}

/// Bracket the parts of `text` matching `query`.
fn mark_matches(text: &str, query: &str) -> String {
    highlight_matches(text, query)
        .into_iter()
        .map(|segment| {
            if segment.emphasized {
                format!("[{}]", segment.text)
            } else {
                segment.text
            }
        })
        .collect()
}

/// One line per result; matches in the name and in each alias are bracketed.
fn render_suggestions(query: &str, results: &[TagSuggestion]) -> String {
    let mut out = String::new();
    for result in results {
        let count = result.count.map(|c| c.to_string()).unwrap_or_default();
        out.push_str(&format!("{count:>8}  {}", mark_matches(&result.name, query)));
        if !result.aliases.is_empty() {
            let aliases: Vec<String> =
                result.aliases.iter().map(|a| mark_matches(a, query)).collect();
            out.push_str(&format!("  ({})", aliases.join(", ")));
        }
        out.push('\n');
    }
    out
}

fn render_listing(kind: AssetKind, listing: &BrowseResponse) -> String {
    let mut out = format!("{} /{}\n", kind.label(), listing.current_path);
    if listing.parent_path.is_some() {
        out.push_str("  ../\n");
    }
    for item in &listing.items {
        if item.is_folder() {
            out.push_str(&format!("  {}/\n", item.name));
        } else {
            let ext = item.extension.as_deref().unwrap_or_default();
            out.push_str(&format!("  {}{ext}\n", item.name));
        }
    }
    out
}
