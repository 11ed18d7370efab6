//! Text cleanup for note excerpts and accepted model output.

use std::sync::LazyLock;

use regex::Regex;

macro_rules! regex {
    ($name:ident, $pattern:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($pattern).expect("valid regex literal"));
    };
}

regex!(WIKILINK, r"\[\[(?:[^|\]]*\|)?([^\]]+)\]\]");

regex!(SOURCE_REFERENCE, r"(?i)(according to|based on) the (text|provided|summary).*?[.,]\s*");
regex!(PREAMBLE_LINE, r"(?m)^(Verification:|Here are|I have generated|I will generate).*$");
regex!(HERE_ARE, r"(?i)Here are .*?questions.*?:");
regex!(BOLD_QUESTION_LABEL, r"(?m)^\*\*Question.*?\*\*.*$");
regex!(QUESTION_PREFIX, r"(?m)^Question\s+\d+[:.]\s*");
regex!(NOTE_LINE, r"(?m)^Note:.*$");

regex!(PAREN_OPTION, r"(?m)^(\d+)\)");
regex!(DOTTED_OPTION, r"(?m)^(\d+\.\s*)(?:\*\*)?\s*\.+\s*");
regex!(DOT_LINE, r"(?m)^[ \t]*\.+[ \t]*");
regex!(ANSWER_INDEX, r"(?m)^(\*\*Answer:\*\*\s*)(\d+)[\\.)]\s*");

regex!(GAP_BEFORE_FIRST_OPTION, r"\n\s*\n(1\.)");
regex!(GAP_BEFORE_SEPARATOR, r"\n\s*\n(\?)");
regex!(GAP_BEFORE_ANSWER, r"(\?.*)\n\s*\n(\*\*Answer:)");
regex!(GAP_BEFORE_EXPLANATION, r"(\*\*Answer:.*)\n\s*\n(> \*\*Explanation:)");
regex!(EXCESS_BLANK_LINES, r"\n{3,}");

regex!(NUMBERED_LINE, r"^\d+\.");

/// Replace `[[Target]]` with `Target` and `[[Target|Alias]]` with `Alias`.
pub fn clean_wikilinks(text: &str) -> String {
    WIKILINK.replace_all(text, "$1").into_owned()
}

/// Normalise accepted model output into the flashcard layout.
///
/// Strips meta-commentary and source references, normalises option and
/// answer numbering, makes sure every answer is preceded by a `?`
/// separator line, quotes explanations and compacts blank lines.
pub fn clean_ai_output(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let mut text = text.replace(['[', ']'], "");
    text = drop_verification_blocks(&text);
    for re in [
        &*SOURCE_REFERENCE,
        &*PREAMBLE_LINE,
        &*HERE_ARE,
        &*BOLD_QUESTION_LABEL,
        &*QUESTION_PREFIX,
        &*NOTE_LINE,
    ] {
        text = re.replace_all(&text, "").into_owned();
    }

    text = PAREN_OPTION.replace_all(&text, "$1.").into_owned();
    text = DOTTED_OPTION.replace_all(&text, "$1").into_owned();
    text = DOT_LINE.replace_all(&text, "").into_owned();
    text = ANSWER_INDEX.replace_all(&text, "${1}${2}) ").into_owned();

    text = insert_separators(&text);

    text = GAP_BEFORE_FIRST_OPTION.replace_all(&text, "\n$1").into_owned();
    text = GAP_BEFORE_SEPARATOR.replace_all(&text, "\n$1").into_owned();
    text = GAP_BEFORE_ANSWER.replace_all(&text, "$1\n$2").into_owned();
    text = GAP_BEFORE_EXPLANATION.replace_all(&text, "$1\n$2").into_owned();
    text = EXCESS_BLANK_LINES.replace_all(&text, "\n\n").into_owned();

    hard_break_separators(&text).trim().to_string()
}

/// Drop `**Verification:**` sections up to the next numbered line.
fn drop_verification_blocks(text: &str) -> String {
    let mut out = Vec::new();
    let mut skipping = false;
    for line in text.split('\n') {
        if let Some(pos) = line.find("**Verification:**") {
            skipping = true;
            let head = &line[..pos];
            if !head.trim().is_empty() {
                out.push(head);
            }
            continue;
        }
        if skipping && NUMBERED_LINE.is_match(line) {
            skipping = false;
        }
        if !skipping {
            out.push(line);
        }
    }
    out.join("\n")
}

/// Insert a `?` line before answers that lack one and quote explanations.
fn insert_separators(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for line in text.split('\n') {
        if line.contains("**Answer:**") {
            let has_separator = lines
                .iter()
                .rev()
                .find(|l| !l.trim().is_empty())
                .is_some_and(|l| l.contains('?'));
            if !has_separator {
                lines.push("?  ".to_string());
            }
            lines.push(line.to_string());
        } else if line.contains("**Explanation:**") && !line.trim_start().starts_with('>') {
            lines.push(format!("> {}", line.trim()));
        } else {
            lines.push(line.to_string());
        }
    }
    lines.join("\n")
}

/// Normalise separator lines to `?  ` and end the line before each with a
/// Markdown hard break.
fn hard_break_separators(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for line in text.split('\n') {
        if line.trim_start().starts_with('?') {
            if let Some(prev) = lines.last_mut()
                && !prev.trim().is_empty()
                && !prev.ends_with("  ")
            {
                *prev = format!("{}  ", prev.trim_end());
            }
            lines.push("?  ".to_string());
        } else {
            lines.push(line.to_string());
        }
    }
    lines.join("\n")
}
