//! Note discovery and excerpt extraction.
//!
//! Lecture notes live under `<subject>/Recorded Lectures` and
//! `<subject>/Live Lectures`, named with a week marker (`W03 ...`,
//! `Week 3 ...`). Concept notes live flat in a concept directory and are
//! reached through wikilinks in the lecture notes.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::cleaner::clean_wikilinks;
use crate::types::{UnitKind, WorkUnit};
use crate::{ForgeError, Result};

/// Lecture folders searched inside a subject directory.
pub const LECTURE_DIRS: [&str; 2] = ["Recorded Lectures", "Live Lectures"];

/// Valid week numbers.
pub const WEEK_RANGE: std::ops::RangeInclusive<u32> = 1..=52;

static LINK_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[([^|#\]]+)(?:[|#][^\]]+)?\]\]").expect("valid regex literal")
});
static WEEK_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:week|w)\s?0?(\d+)").expect("valid regex literal"));

fn heading_text(line: &str) -> Option<&str> {
    let rest = line.trim_start_matches('#');
    (rest.len() < line.len() && (rest.is_empty() || rest.starts_with(' '))).then(|| rest.trim())
}

/// Summary text for a note.
///
/// Uses the body of the first "Key Concepts" section (any heading depth,
/// case-insensitive) up to the next heading; falls back to the whole note.
/// Wikilinks are reduced to their visible text.
pub fn extract_summary(content: &str) -> String {
    let mut section: Option<Vec<&str>> = None;
    for line in content.lines() {
        let heading = heading_text(line);
        match section.as_mut() {
            None => {
                if heading.is_some_and(|t| t.to_ascii_lowercase().starts_with("key concepts")) {
                    section = Some(Vec::new());
                }
            }
            Some(_) if heading.is_some() => break,
            Some(lines) => lines.push(line),
        }
    }

    let body = section
        .map(|lines| lines.join("\n").trim().to_string())
        .filter(|s| !s.is_empty());
    clean_wikilinks(body.as_deref().unwrap_or(content).trim())
}

/// Wikilink targets in `content`, without alias or anchor.
pub fn extract_links(content: &str) -> BTreeSet<String> {
    LINK_TARGET
        .captures_iter(content)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Week number encoded in a note file name (`W3`, `W03`, `Week 3`).
pub fn week_of(file_name: &str) -> Option<u32> {
    WEEK_MARKER
        .captures(file_name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Parse a week selection such as `3`, `1-4`, `1,3,5` or `1-3,7`.
///
/// `ALL` (or an empty string) selects every week and yields `None`.
pub fn parse_weeks(selection: &str) -> Result<Option<Vec<u32>>> {
    let selection = selection.trim();
    if selection.is_empty() || selection.eq_ignore_ascii_case("all") {
        return Ok(None);
    }

    let parse = |s: &str| -> Result<u32> {
        s.trim()
            .parse::<u32>()
            .map_err(|_| ForgeError::InvalidInput(format!("invalid week '{}'", s.trim())))
    };
    let check = |w: u32| -> Result<u32> {
        if WEEK_RANGE.contains(&w) {
            Ok(w)
        } else {
            Err(ForgeError::InvalidInput(format!(
                "week {w} out of range (must be 1-52)"
            )))
        }
    };

    let mut weeks = BTreeSet::new();
    for part in selection.split(',') {
        match part.split_once('-') {
            Some((start, end)) => {
                let (start, end) = (check(parse(start)?)?, check(parse(end)?)?);
                if start > end {
                    return Err(ForgeError::InvalidInput(format!(
                        "invalid week range '{}' (start > end)",
                        part.trim()
                    )));
                }
                weeks.extend(start..=end);
            }
            None => {
                weeks.insert(check(parse(part)?)?);
            }
        }
    }
    Ok(Some(weeks.into_iter().collect()))
}

/// Group the markdown lecture notes of a subject by week.
///
/// `weeks = None` keeps every week found. Files without a week marker are
/// ignored. Files within a week are sorted by path.
pub fn discover_week_files(
    subject_dir: &Path,
    weeks: Option<&[u32]>,
) -> Result<BTreeMap<u32, Vec<PathBuf>>> {
    if !subject_dir.is_dir() {
        return Err(ForgeError::Configuration(format!(
            "subject directory not found: {}",
            subject_dir.display()
        )));
    }

    let mut by_week: BTreeMap<u32, Vec<PathBuf>> = BTreeMap::new();
    for dir in LECTURE_DIRS.iter().map(|d| subject_dir.join(d)) {
        if !dir.is_dir() {
            continue;
        }
        for dirent in WalkDir::new(&dir).follow_links(true) {
            let dirent = match dirent {
                Ok(d) => d,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable path");
                    continue;
                }
            };
            let path = dirent.path();
            if !dirent.file_type().is_file() || path.extension().is_none_or(|e| e != "md") {
                continue;
            }
            let Some(week) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(week_of)
            else {
                continue;
            };
            if weeks.is_some_and(|ws| !ws.contains(&week)) {
                continue;
            }
            by_week.entry(week).or_default().push(path.to_path_buf());
        }
    }
    for files in by_week.values_mut() {
        files.sort();
    }
    Ok(by_week)
}

/// Turn lecture files and the concepts they link to into work units.
///
/// Lectures come first (in the given order), then linked concepts sorted
/// by name, truncated to `concept_limit` when it is non-zero. Concepts
/// without a note in `concept_dir` are skipped, as are unreadable files.
pub fn build_units(
    lecture_files: &[PathBuf],
    concept_dir: Option<&Path>,
    concept_limit: usize,
) -> Vec<WorkUnit> {
    let mut units = Vec::new();
    let mut concepts = BTreeSet::new();

    for path in lecture_files {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read lecture note");
                continue;
            }
        };
        concepts.extend(extract_links(&content));
        let summary = extract_summary(&content);
        if summary.is_empty() {
            continue;
        }
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        units.push(WorkUnit::new(units.len(), name, UnitKind::Lecture, summary));
    }

    let Some(concept_dir) = concept_dir else {
        return units;
    };
    let take = if concept_limit == 0 {
        concepts.len()
    } else {
        concept_limit
    };
    for concept in concepts.into_iter().take(take) {
        let path = concept_dir.join(format!("{concept}.md"));
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                debug!(concept = %concept, error = %e, "no readable concept note");
                continue;
            }
        };
        let summary = extract_summary(&content);
        if !summary.is_empty() {
            units.push(WorkUnit::new(units.len(), concept, UnitKind::Concept, summary));
        }
    }
    units
}
