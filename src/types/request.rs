//! Units of work and the requests derived from them.

use std::sync::Arc;

use super::params::GenerationParams;

/// Where a unit's excerpt came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    /// A lecture note file.
    Lecture,
    /// A concept note reached through a wikilink.
    Concept,
}

/// One note-derived input to be turned into flashcards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    /// Position in the run. Output sections are ordered by this.
    pub seq: usize,
    /// Human-readable identifier (file stem or concept name).
    pub name: String,
    pub kind: UnitKind,
    /// Extracted, wikilink-cleaned summary text.
    pub excerpt: String,
}

impl WorkUnit {
    pub fn new(seq: usize, name: impl Into<String>, kind: UnitKind, excerpt: impl Into<String>) -> Self {
        Self {
            seq,
            name: name.into(),
            kind,
            excerpt: excerpt.into(),
        }
    }

    /// Heading used for this unit in the output document.
    pub fn heading(&self) -> String {
        match self.kind {
            UnitKind::Lecture => self.name.trim_end_matches(".md").to_string(),
            UnitKind::Concept => format!("Concept: {}", self.name),
        }
    }
}

/// Immutable input to one generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Source excerpt, already truncated to the configured bound.
    pub excerpt: String,
    /// Number of questions to ask for.
    pub question_count: usize,
    pub params: Arc<GenerationParams>,
}

impl GenerationRequest {
    /// Build a request, truncating `excerpt` to at most `max_chars`
    /// characters (on a char boundary).
    pub fn new(
        excerpt: &str,
        max_chars: usize,
        question_count: usize,
        params: Arc<GenerationParams>,
    ) -> Self {
        Self {
            excerpt: truncate_chars(excerpt, max_chars).to_string(),
            question_count,
            params,
        }
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
