use std::path::Path;

use anyhow::Result;
use console::style;
use dialoguer::Input;
use dialoguer::theme::ColorfulTheme;
use tracing::error;

use crate::config::Config;
use crate::embeddings::OllamaClient;
use crate::generation::{Mode, PromptLibrary, build_prompt, save_response};
use crate::indexer::Indexer;
use crate::ingest::import_keep_exports;
use crate::retriever::Retriever;

/// Show the active configuration, or write a default config file to edit.
#[inline]
pub fn run_config(config: &Config, show: bool) -> Result<()> {
    if show {
        let content = toml::to_string_pretty(config)?;
        println!("# {}", config.config_file_path().display());
        println!("{content}");
    } else {
        config.save()?;
        println!(
            "Wrote configuration to {}",
            config.config_file_path().display()
        );
    }
    Ok(())
}

/// Convert a directory of Google Keep JSON exports into the notes CSV.
#[inline]
pub fn import_keep(config: &Config, dir: &Path) -> Result<()> {
    let count = import_keep_exports(dir, &config.notes_csv_path())?;
    println!(
        "Imported {} notes into {}",
        style(count).bold(),
        config.notes_csv_path().display()
    );
    Ok(())
}

/// Run the build pipeline: chunk the notes, embed every chunk, and persist
/// the index/metadata pair.
#[inline]
pub fn build(config: Config) -> Result<()> {
    let indexer = Indexer::new(config)?;
    let stats = indexer.build()?;
    println!(
        "Indexed {} chunks from {} notes ({} vectors, dimension {})",
        style(stats.chunks).bold(),
        stats.notes,
        stats.embedded,
        stats.dimension
    );
    Ok(())
}

/// Retrieve the top-k chunks for a query and print them with distances.
#[inline]
pub fn query(config: &Config, text: &str, top_k: Option<usize>) -> Result<()> {
    let retriever = Retriever::open(config)?;
    let top_k = top_k.unwrap_or(config.retrieval.top_k);
    let results = retriever.retrieve(text, top_k)?;

    if results.is_empty() {
        println!("No relevant notes found.");
        return Ok(());
    }

    for (rank, result) in results.iter().enumerate() {
        println!(
            "{} {}",
            style(format!("{}.", rank + 1)).bold(),
            style(format!("(distance: {:.4}, chunk {})", result.distance, result.chunk_id)).dim()
        );
        println!("{}", result.text);
        println!();
    }
    Ok(())
}

/// Retrieve chunks for a query, generate an answer, and save it.
#[inline]
pub fn ask(config: &Config, text: &str, mode: Mode) -> Result<()> {
    let retriever = Retriever::open(config)?;
    let client = OllamaClient::new(&config.ollama)?;
    let prompts = PromptLibrary::load(&config.prompts_dir())?;

    answer_query(config, &retriever, &client, &prompts, text, mode)
}

/// Interactive read-query loop with mode switching.
#[inline]
pub fn shell(config: &Config) -> Result<()> {
    let retriever = Retriever::open(config)?;
    let client = OllamaClient::new(&config.ollama)?;
    let prompts = PromptLibrary::load(&config.prompts_dir())?;

    println!("Loaded {} chunks. Modes: analysis, summary, patterns.", retriever.len());
    println!("Type a query, 'mode:<name>' to switch mode, or 'quit' to exit.");
    println!();

    let mut mode = Mode::Analysis;
    loop {
        let input: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("query ({mode})"))
            .allow_empty(true)
            .interact_text()?;
        let input = input.trim();

        if input.is_empty() {
            continue;
        }
        if matches!(input, "quit" | "exit" | "q") {
            println!("Goodbye!");
            break;
        }
        if let Some(name) = input.strip_prefix("mode:") {
            match name.parse::<Mode>() {
                Ok(parsed) => {
                    mode = parsed;
                    println!("Mode changed to: {mode}");
                }
                Err(err) => println!("{err}"),
            }
            continue;
        }

        if let Err(err) = answer_query(config, &retriever, &client, &prompts, input, mode) {
            // Keep the shell alive on per-query failures.
            error!("Query failed: {err:#}");
            println!("{} {err:#}", style("Error:").red().bold());
        }
        println!();
    }
    Ok(())
}

fn answer_query(
    config: &Config,
    retriever: &Retriever,
    client: &OllamaClient,
    prompts: &PromptLibrary,
    text: &str,
    mode: Mode,
) -> Result<()> {
    let results = retriever.retrieve(text, config.retrieval.top_k)?;
    if results.is_empty() {
        println!("No relevant notes found.");
        return Ok(());
    }

    println!("Retrieved {} chunks, generating...", results.len());
    let prompt = build_prompt(prompts.template(mode), text, &results);

    // Generation failures are user-visible messages, never retrieval
    // failures.
    match client.generate(&prompt) {
        Ok(response) => {
            let saved = save_response(&config.responses_dir(), text, &response)?;
            println!();
            println!("{response}");
            println!();
            println!("Response saved to: {}", saved.display());
        }
        Err(err) => {
            println!("{} {err:#}", style("Generation failed:").red().bold());
        }
    }
    Ok(())
}

/// Report artifact presence and consistency.
#[inline]
pub fn status(config: &Config) -> Result<()> {
    let artifacts = [
        ("Notes CSV", config.notes_csv_path()),
        ("Chunk list", config.chunk_list_path()),
        ("Vector index", config.index_path()),
        ("Metadata store", config.metadata_path()),
    ];

    let mut all_present = true;
    for (name, path) in &artifacts {
        let present = path.exists();
        all_present &= present;
        let marker = if present {
            style("ok").green()
        } else {
            style("missing").red()
        };
        println!("{:>14}: {} ({})", name, marker, path.display());
    }

    if !all_present {
        println!();
        println!("Run the build command to create the missing artifacts.");
        return Ok(());
    }

    let report = Indexer::verify_consistency(config)?;
    println!();
    println!(
        "{} chunks, {} vectors, {} metadata records",
        report.chunk_count, report.index_count, report.metadata_count
    );
    if report.is_consistent() {
        println!("{}", style("Artifacts are consistent.").green());
    } else {
        for issue in &report.issues {
            println!("{} {issue}", style("issue:").yellow());
        }
    }
    Ok(())
}
