//! Validation result types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A structural defect in generated MCQ text.
///
/// Declaration order is the order defects are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DefectKind {
    /// A question block does not have exactly four options.
    WrongOptionCount,
    /// The answer line is missing or names an option outside 1-4.
    MissingOrInvalidAnswerIndex,
    /// No non-empty explanation follows the answer.
    MissingExplanation,
    /// The question stem does not end with a question mark.
    MalformedQuestionTerminator,
}

impl DefectKind {
    pub const ALL: [DefectKind; 4] = [
        Self::WrongOptionCount,
        Self::MissingOrInvalidAnswerIndex,
        Self::MissingExplanation,
        Self::MalformedQuestionTerminator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WrongOptionCount => "wrong-option-count",
            Self::MissingOrInvalidAnswerIndex => "missing-or-invalid-answer-index",
            Self::MissingExplanation => "missing-explanation",
            Self::MalformedQuestionTerminator => "malformed-question-terminator",
        }
    }

    /// Instruction telling the model how to fix this defect.
    pub fn fix_instruction(&self) -> &'static str {
        match self {
            Self::WrongOptionCount => {
                "Every question must have exactly 4 options numbered 1. to 4."
            }
            Self::MissingOrInvalidAnswerIndex => {
                "Every question needs a line '**Answer:** N) <option text>' where N is 1, 2, 3 or 4."
            }
            Self::MissingExplanation => {
                "Every answer must be followed by a line '> **Explanation:** <why it is correct>'."
            }
            Self::MalformedQuestionTerminator => {
                "Every question stem must end with a question mark '?'."
            }
        }
    }
}

impl fmt::Display for DefectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of validating one piece of generated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub accepted: bool,
    /// Distinct defects in declaration order. Empty iff `accepted`.
    pub defects: Vec<DefectKind>,
    /// Number of question blocks found.
    pub questions: usize,
}

impl ValidationResult {
    pub fn has(&self, defect: DefectKind) -> bool {
        self.defects.contains(&defect)
    }
}
