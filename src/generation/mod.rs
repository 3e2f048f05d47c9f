
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::DateTime;
use itertools::Itertools;
use tracing::debug;

use crate::RagError;
use crate::retriever::RetrievedChunk;

const DEFAULT_ANALYSIS_PROMPT: &str = "\
You are analyzing a personal collection of notes. Below are excerpts \
retrieved because they are relevant to the question.

Notes:
{retrieved_notes}

Question: {query}

Give a thoughtful analysis grounded only in the notes above: identify the \
main themes, how they connect, and any insights the notes suggest. Quote or \
paraphrase specific notes where it helps.";

const DEFAULT_SUMMARY_PROMPT: &str = "\
You are summarizing a personal collection of notes. Below are excerpts \
retrieved because they are relevant to the question.

Notes:
{retrieved_notes}

Question: {query}

Write a condensed narrative summary of what these notes say about the \
question. Keep it short and faithful to the notes; do not invent details.";

const DEFAULT_PATTERNS_PROMPT: &str = "\
You are looking for recurring patterns in a personal collection of notes. \
Below are excerpts retrieved because they are relevant to the question.

Notes:
{retrieved_notes}

Question: {query}

Point out repeated beliefs, recurring concerns, and thought loops that show \
up across the notes. Note when the same idea resurfaces at different times.";

/// Prompt flavor used when turning retrieved chunks into a generation
/// request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Analysis,
    Summary,
    Patterns,
}

impl Mode {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Analysis => "analysis",
            Mode::Summary => "summary",
            Mode::Patterns => "patterns",
        }
    }
}

impl fmt::Display for Mode {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = RagError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "analysis" => Ok(Mode::Analysis),
            "summary" => Ok(Mode::Summary),
            "patterns" => Ok(Mode::Patterns),
            other => Err(RagError::Generation(format!(
                "Unknown mode '{}'. Use: analysis, summary, or patterns",
                other
            ))),
        }
    }
}

/// Prompt templates for each mode, loaded from the prompts directory with
/// built-in defaults as fallback.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    analysis: String,
    summary: String,
    patterns: String,
}

impl PromptLibrary {
    /// Load templates, preferring `<prompts_dir>/<mode>.txt` over the
    /// built-in default for each mode.
    #[inline]
    pub fn load(prompts_dir: &Path) -> Result<Self> {
        Ok(Self {
            analysis: load_template(prompts_dir, "analysis", DEFAULT_ANALYSIS_PROMPT)?,
            summary: load_template(prompts_dir, "summary", DEFAULT_SUMMARY_PROMPT)?,
            patterns: load_template(prompts_dir, "patterns", DEFAULT_PATTERNS_PROMPT)?,
        })
    }

    #[inline]
    pub fn template(&self, mode: Mode) -> &str {
        match mode {
            Mode::Analysis => &self.analysis,
            Mode::Summary => &self.summary,
            Mode::Patterns => &self.patterns,
        }
    }
}

impl Default for PromptLibrary {
    #[inline]
    fn default() -> Self {
        Self {
            analysis: DEFAULT_ANALYSIS_PROMPT.to_string(),
            summary: DEFAULT_SUMMARY_PROMPT.to_string(),
            patterns: DEFAULT_PATTERNS_PROMPT.to_string(),
        }
    }
}

fn load_template(prompts_dir: &Path, name: &str, default: &str) -> Result<String> {
    let path = prompts_dir.join(format!("{name}.txt"));
    if path.exists() {
        debug!("Using prompt template override: {}", path.display());
        fs::read_to_string(&path)
            .with_context(|| format!("Failed to read prompt template: {}", path.display()))
    } else {
        Ok(default.to_string())
    }
}

/// Fill a template's `{query}` and `{retrieved_notes}` placeholders.
#[inline]
pub fn build_prompt(template: &str, query: &str, chunks: &[RetrievedChunk]) -> String {
    template
        .replace("{retrieved_notes}", &format_retrieved_notes(chunks))
        .replace("{query}", query)
}

/// Render retrieved chunks as plain text, annotating each with a readable
/// creation date when one is available.
fn format_retrieved_notes(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| {
            match chunk.created_at.and_then(timestamp_to_readable) {
                Some(date) => format!("{}\n(Created: {})", chunk.text, date),
                None => chunk.text.clone(),
            }
        })
        .join("\n\n")
}

/// Convert an epoch timestamp to "Month YYYY".
///
/// Values above 1e12 are treated as microseconds, anything smaller as
/// seconds, matching how note exports store their timestamps.
fn timestamp_to_readable(timestamp: i64) -> Option<String> {
    let seconds = if timestamp > 1_000_000_000_000 {
        timestamp / 1_000_000
    } else {
        timestamp
    };
    DateTime::from_timestamp(seconds, 0).map(|dt| dt.format("%B %Y").to_string())
}

/// Derive a response filename from the query: up to five words slugified,
/// suffixed with a timestamp for uniqueness.
fn response_filename(query: &str) -> String {
    let cleaned: String = query
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect();
    let slug = cleaned.split_whitespace().take(5).join("_");

    let slug = if slug.chars().count() < 3 {
        "query".to_string()
    } else {
        slug.chars().take(50).collect()
    };

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    format!("{slug}_{timestamp}.md")
}

/// Save a generated response as Markdown with the query at the top.
/// Returns the path of the saved file.
#[inline]
pub fn save_response(responses_dir: &Path, query: &str, response_text: &str) -> Result<PathBuf> {
    fs::create_dir_all(responses_dir).with_context(|| {
        format!(
            "Failed to create responses directory: {}",
            responses_dir.display()
        )
    })?;

    let path = responses_dir.join(response_filename(query));
    let content = format!("# Query\n\n{query}\n\n---\n\n{response_text}");
    fs::write(&path, content)
        .with_context(|| format!("Failed to write response: {}", path.display()))?;

    Ok(path)
}
