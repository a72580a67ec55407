use itertools::Itertools;

use crate::index::Chunk;
use crate::providers::{SearchResult, Units, WeatherReport};

/// Collapse all whitespace runs to single spaces
pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().join(" ")
}

/// Numbered citation lines, one per retrieved chunk, in rank order
pub(crate) fn citations<'a>(chunks: impl IntoIterator<Item = &'a Chunk>) -> Vec<String> {
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "Source[{}] p{}: {}",
                i + 1,
                chunk.page_label(),
                normalize_whitespace(&chunk.text)
            )
        })
        .collect()
}

pub(crate) fn document_prompt(question: &str, citations: &[String]) -> String {
    format!(
        "You are a helpful assistant for a Napa Valley wine business. \
         Answer strictly based on the provided context. \
         Cite sources as [1], [2], ... corresponding to the excerpts. \
         If the context does not contain the answer, say you don't know.\n\n\
         Question: {}\n\nContext:\n{}",
        question,
        citations.join("\n\n")
    )
}

/// Numbered block for one search hit
pub(crate) fn format_search_result(position: usize, result: &SearchResult) -> String {
    format!(
        "[{}] {}\n   URL: {}\n   Summary: {}\n",
        position, result.title, result.url, result.snippet
    )
}

pub(crate) fn search_prompt(question: &str, results: &[SearchResult]) -> String {
    let blocks = results
        .iter()
        .enumerate()
        .map(|(i, result)| format_search_result(i + 1, result))
        .join("\n");
    format!(
        "Based on the web search results below, give a clear, well-formatted answer to the \
         user's question. Use line breaks and bullet points where they help. \
         Cite sources as [1], [2], etc. Keep the response concise but informative.\n\n\
         Question: {}\n\nSearch Results:\n{}",
        question, blocks
    )
}

fn reading(value: Option<f64>, unit: &str) -> String {
    value.map_or_else(|| "unknown".to_string(), |v| format!("{v}{unit}"))
}

pub(crate) fn weather_summary(city: &str, report: &WeatherReport, units: Units) -> String {
    format!(
        "Weather for {}: {}{}, {}. Humidity {}, wind {}.",
        city,
        report.temperature,
        units.temperature_symbol(),
        report.conditions,
        reading(report.humidity, "%"),
        reading(report.wind_speed, &format!(" {}", units.speed_symbol())),
    )
}
