//! Structural validation of generated MCQ text.
//!
//! The expected shape of one question block is:
//!
//! ```text
//! Which statement is true?
//! 1. First option
//! 2. Second option
//! 3. Third option
//! 4. Fourth option
//! ?
//! **Answer:** 2) Second option
//! > **Explanation:** Why it is correct.
//! ```
//!
//! Parsing is deliberately lenient about spacing, option punctuation (`1.`
//! or `1)`), bold stems and blockquote markers, and strict about the four
//! properties that make a card usable.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{DefectKind, ValidationResult};

static OPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)[.)](?:\s+|$)").expect("valid regex"));
static ANSWER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^>?\s*\*\*answer:?\*\*:?\s*\(?(?:option\s+)?(\d+)?").expect("valid regex")
});
static EXPLANATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^>?\s*\*\*explanation:?\*\*:?\s*(.*)$").expect("valid regex")
});

#[derive(Debug, Default)]
struct Block {
    stem: String,
    options: usize,
    /// `Some(None)` when an answer line exists without a parseable index.
    answer: Option<Option<u32>>,
    /// `Some(text)` once an explanation marker was seen.
    explanation: Option<String>,
}

impl Block {
    fn is_empty(&self) -> bool {
        self.stem.is_empty() && self.options == 0 && self.answer.is_none() && self.explanation.is_none()
    }

    fn has_body(&self) -> bool {
        self.options > 0 || self.answer.is_some() || self.explanation.is_some()
    }

    fn push_stem(&mut self, line: &str) {
        if !self.stem.is_empty() {
            self.stem.push(' ');
        }
        self.stem.push_str(line);
    }

    fn defects(&self, out: &mut Vec<DefectKind>) {
        if self.options != 4 {
            out.push(DefectKind::WrongOptionCount);
        }
        if !matches!(self.answer, Some(Some(1..=4))) {
            out.push(DefectKind::MissingOrInvalidAnswerIndex);
        }
        if self.explanation.as_deref().is_none_or(|e| e.trim().is_empty()) {
            out.push(DefectKind::MissingExplanation);
        }
        let stem = self.stem.trim_end_matches(['*', '_', ' ']);
        if stem.is_empty() || !stem.ends_with('?') {
            out.push(DefectKind::MalformedQuestionTerminator);
        }
    }
}

/// Numbered lines in the run starting at `lines[start]`, blank lines skipped.
fn numbered_run(lines: &[&str], start: usize) -> usize {
    lines[start..]
        .iter()
        .filter(|line| !line.is_empty())
        .take_while(|line| OPTION.is_match(line))
        .count()
}

fn split_blocks(text: &str) -> Vec<Block> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let mut blocks = Vec::new();
    let mut current = Block::default();

    for (i, &line) in lines.iter().enumerate() {
        if line.is_empty() || line == "?" || line == "---" {
            continue;
        }

        if let Some(caps) = EXPLANATION.captures(line) {
            let body = caps.get(1).map_or("", |m| m.as_str()).trim().to_string();
            current.explanation = Some(body);
            continue;
        }

        if let Some(caps) = ANSWER.captures(line) {
            let index = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
            current.answer = Some(index);
            continue;
        }

        // Blockquote continuation of an explanation.
        if let Some(rest) = line.strip_prefix('>')
            && let Some(explanation) = current.explanation.as_mut()
        {
            if !explanation.is_empty() {
                explanation.push(' ');
            }
            explanation.push_str(rest.trim());
            continue;
        }

        if OPTION.is_match(line) {
            if current.answer.is_some() || current.explanation.is_some() {
                blocks.push(std::mem::take(&mut current));
            }
            // A numbered question at the head of a block is its stem, and so
            // is the head of a run with more numbered lines than options.
            if current.stem.is_empty()
                && current.options == 0
                && (line.ends_with('?') || numbered_run(&lines, i) > 4)
            {
                current.push_stem(OPTION.replace(line, "").trim());
            } else {
                current.options += 1;
            }
            continue;
        }

        if current.has_body() {
            blocks.push(std::mem::take(&mut current));
        }
        current.push_stem(line);
    }

    if !current.is_empty() {
        // Trailing prose after a complete question is commentary, not a question.
        let commentary = !current.has_body() && !blocks.is_empty();
        if !commentary {
            blocks.push(current);
        }
    }
    blocks
}

/// Validate generated text, reporting every distinct defect in one pass.
///
/// Defects are deduplicated across question blocks and returned in
/// [`DefectKind`] declaration order. Text with no question at all reports
/// all four.
pub fn validate(text: &str) -> ValidationResult {
    let blocks = split_blocks(text);

    let mut defects = Vec::new();
    if blocks.is_empty() {
        defects.extend(DefectKind::ALL);
    }
    for block in &blocks {
        block.defects(&mut defects);
    }
    defects.sort();
    defects.dedup();

    ValidationResult {
        accepted: defects.is_empty(),
        defects,
        questions: blocks.len(),
    }
}
