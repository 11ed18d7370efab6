//! Flashcard document rendering and writing.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::types::{GenerationParams, UnitReport};
use crate::{ForgeError, Result};

/// Week tag as used in file names and tags (`W03`).
pub fn week_tag(week: u32) -> String {
    format!("W{week:02}")
}

/// File name for a subject/week document.
///
/// `ACCT1001_W03_MCQ_apply_medium.md`; unconstrained levels are omitted and
/// dev runs get a `_dev` suffix.
pub fn output_file_name(subject: &str, week: u32, params: &GenerationParams, dev: bool) -> String {
    let mut name = format!("{subject}_{}_MCQ", week_tag(week));
    if let Some(bloom) = params.bloom {
        name.push('_');
        name.push_str(bloom.as_str());
    }
    if let Some(difficulty) = params.difficulty {
        name.push('_');
        name.push_str(difficulty.as_str());
    }
    if dev {
        name.push_str("_dev");
    }
    name.push_str(".md");
    name
}

/// Render the document: front-matter tag, heading, then one section per
/// `(heading, text)` pair in the order given.
pub fn render_document<'a, I>(subject: &str, week: u32, sections: I) -> String
where
    I: IntoIterator<Item = (String, &'a str)>,
{
    let tag = week_tag(week);
    let mut doc = format!("---\ntags:\n- flashcard/{subject}/{tag}\n---\n## MCQs: {subject} - {tag}\n\n");
    for (heading, text) in sections {
        doc.push_str(&format!("### {heading}\n\n{}\n\n---\n", text.trim()));
    }
    doc
}

/// Write `content` to `path` atomically (temp file in the same directory,
/// then rename), creating parent directories as needed.
pub fn write_document(path: &Path, content: &str) -> Result<PathBuf> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| ForgeError::io(parent, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| ForgeError::io(parent, e))?;
    tmp.write_all(content.as_bytes())
        .map_err(|e| ForgeError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| ForgeError::io(path, e.error))?;
    Ok(path.to_path_buf())
}

/// Create `dir` if needed and check that files can be created in it.
pub fn ensure_writable_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| ForgeError::io(dir, e))?;
    tempfile::NamedTempFile::new_in(dir).map_err(|e| ForgeError::io(dir, e))?;
    Ok(())
}

/// Failure log file name: `ERROR_20240301_142233_ECON1101_W01 Scarcity.txt`.
///
/// Characters that are not valid in file names on common platforms are
/// dropped from the unit name.
pub fn failure_log_name(subject: &str, unit_name: &str, at: DateTime<Utc>) -> String {
    let stem = unit_name.strip_suffix(".md").unwrap_or(unit_name);
    let stem: String = stem
        .chars()
        .filter(|c| !matches!(*c, '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|'))
        .collect();
    format!("ERROR_{}_{subject}_{stem}.txt", at.format("%Y%m%d_%H%M%S"))
}

/// Render the failure reason, defects and last rejected text of a unit.
pub fn render_failure_log(report: &UnitReport) -> String {
    let outcome = &report.outcome;
    let defects: Vec<&str> = outcome.last_defects.iter().map(|d| d.as_str()).collect();
    let mut log = format!(
        "Unit: {}\nError: {}\nAttempts: {} ({} refine)\n",
        outcome.unit_id,
        outcome.error.as_deref().unwrap_or("unknown"),
        outcome.attempts,
        outcome.refines
    );
    if !defects.is_empty() {
        log.push_str(&format!("Defects: {}\n", defects.join(", ")));
    }
    if let Some(text) = report.rejected.as_deref() {
        log.push_str(&format!("\nRejected output:\n{text}\n"));
    }
    log
}

/// Write the failure log for `report` into `dir`.
pub fn write_failure_log(dir: &Path, subject: &str, report: &UnitReport) -> Result<PathBuf> {
    let path = dir.join(failure_log_name(subject, &report.unit.name, Utc::now()));
    write_document(&path, &render_failure_log(report))
}
