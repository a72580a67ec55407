use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::agent::{Answer, Concierge};
use crate::config::Config;
use crate::embeddings::GeminiClient;
use crate::index::IndexStore;
use crate::ingest::Ingestor;

/// Rebuild the index from the configured document, or from `path` when given
#[inline]
pub fn ingest_document(config: &Config, path: Option<PathBuf>) -> Result<()> {
    let document = path.unwrap_or_else(|| config.paths.document_path.clone());
    info!("Ingesting {}", document.display());

    let embedder = GeminiClient::new(config)?;
    let store = IndexStore::from_config(config);

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(0).with_style(
            ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} Embedding chunks")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };

    let report = Ingestor::from_config(&embedder, &store, config)
        .with_progress(bar)
        .ingest(&document)
        .with_context(|| format!("Failed to ingest {}", document.display()))?;

    println!(
        "{}",
        style(format!(
            "✓ Ingested {} chunks from {} pages",
            report.chunks_written, report.pages_loaded
        ))
        .green()
    );
    println!("  Dimension: {}", report.dimension);
    println!("  Generation: {}", report.generation);
    println!("  Index: {}", report.index_path.display());

    Ok(())
}

/// Answer a single question
#[inline]
pub fn ask(config: Config, query: &str, json: bool) -> Result<()> {
    let concierge = Concierge::from_config(config)?;
    let answer = concierge.answer(query)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        print_answer(&answer);
    }

    Ok(())
}

/// Interactive question loop; `exit` or `quit` leaves
#[inline]
pub fn chat(config: Config) -> Result<()> {
    let concierge = Concierge::from_config(config)?;
    let snapshot = concierge.index().snapshot();
    if snapshot.is_empty() {
        eprintln!(
            "{}",
            style("⚠ No index found. Document questions will be answered without context; run `ingest` first.")
                .yellow()
        );
    }
    drop(snapshot);

    eprintln!("{}", style("🍷 Vine Concierge").bold().cyan());
    eprintln!("Ask about the wines, the weather, or anything else. Type `exit` to leave.");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        eprint!("{} ", style(">").bold());
        io::stderr().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let query = line.trim();

        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("exit") || query.eq_ignore_ascii_case("quit") {
            break;
        }

        match concierge.answer(query) {
            Ok(answer) => print_answer(&answer),
            Err(e) => {
                warn!("Query failed: {}", e);
                eprintln!("{}", style(format!("✗ {e}")).red());
            }
        }
        println!();
    }

    Ok(())
}

/// Current weather for `city`, or the configured default city
#[inline]
pub fn weather(config: Config, city: Option<&str>) -> Result<()> {
    let concierge = Concierge::from_config(config)?;
    let answer = concierge.weather_for(city.unwrap_or_default())?;
    println!("{}", answer.answer);
    Ok(())
}

#[inline]
pub fn show_status(config: &Config) -> Result<()> {
    let store = IndexStore::from_config(config);

    println!("📊 Vine Concierge Status");
    println!("{}", "=".repeat(50));
    println!();

    println!("🔍 Index:");
    match store.load() {
        Ok(Some(index)) => {
            println!("   ✅ Present at {}", store.path().display());
            println!("   📄 Source: {}", index.source());
            println!("   🧩 Chunks: {}", index.len());
            println!("   🔢 Dimension: {}", index.dimension());
            println!("   🤖 Embedding model: {}", index.embedding_model());
            println!(
                "   🕒 Created: {}",
                index.created_at().format("%Y-%m-%d %H:%M:%S UTC")
            );
            if index.embedding_model() != config.google.embedding_model {
                println!(
                    "   ⚠️  Configured embedding model is {}; re-ingest before asking questions",
                    config.google.embedding_model
                );
            }
        }
        Ok(None) => println!("   💤 Not built yet (run `ingest`)"),
        Err(e) => println!("   ❌ Unreadable: {}", e),
    }

    println!();
    println!("🔑 Services:");
    print_credential("Gemini", config.require_google_key().is_ok());
    print_credential("Tavily", config.require_tavily_key().is_ok());
    print_credential("OpenWeather", config.require_openweather_key().is_ok());

    println!();
    println!("📁 Document: {}", config.paths.document_path.display());

    Ok(())
}

#[inline]
pub fn delete_index(config: &Config) -> Result<()> {
    let store = IndexStore::from_config(config);
    if store.delete()? {
        println!("Deleted index at {}", store.path().display());
    } else {
        println!("No index at {}", store.path().display());
    }
    Ok(())
}

fn print_credential(service: &str, configured: bool) {
    if configured {
        println!("   ✅ {service}: API key configured");
    } else {
        println!("   ❌ {service}: API key missing");
    }
}

fn print_answer(answer: &Answer) {
    eprintln!("{}", style(format!("[{}]", answer.mode)).dim());
    println!("{}", answer.answer);

    if !answer.citations.is_empty() {
        println!();
        println!("{}", style("Sources:").bold());
        for citation in &answer.citations {
            println!("  {}", style(truncate(citation, 120)).dim());
        }
    }

    if !answer.links.is_empty() {
        println!();
        println!("{}", style("Links:").bold());
        for (i, link) in answer.links.iter().enumerate() {
            println!("  [{}] {} {}", i + 1, link.title, style(&link.url).cyan());
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate("Sémillon", 20), "Sémillon");
        assert_eq!(truncate("Sémillon blend", 5), "Sémi…");
    }
}
