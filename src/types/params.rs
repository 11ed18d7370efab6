//! Strongly typed generation parameters.
//!
//! Study-mode presets, Bloom's taxonomy levels, difficulty and subject
//! personas are closed enumerations. They are parsed once at startup and
//! resolved into a [`GenerationParams`] value, so nothing in the pipeline
//! dispatches on raw strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ForgeError;

/// Cognitive level targeted by the generated questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BloomLevel {
    Remember,
    Understand,
    Apply,
    Analyze,
    Evaluate,
    Create,
}

impl BloomLevel {
    /// All levels, lowest to highest.
    pub const ALL: [BloomLevel; 6] = [
        Self::Remember,
        Self::Understand,
        Self::Apply,
        Self::Analyze,
        Self::Evaluate,
        Self::Create,
    ];

    /// Stable lowercase label (used in cache keys and file names).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remember => "remember",
            Self::Understand => "understand",
            Self::Apply => "apply",
            Self::Analyze => "analyze",
            Self::Evaluate => "evaluate",
            Self::Create => "create",
        }
    }
}

impl fmt::Display for BloomLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BloomLevel {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == needle)
            .ok_or_else(|| ForgeError::InvalidInput(format!("unknown Bloom level '{s}'")))
    }
}

/// Target difficulty of distractors and scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Self::Easy, Self::Medium, Self::Hard];

    /// Stable lowercase label (used in cache keys and file names).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == needle)
            .ok_or_else(|| ForgeError::InvalidInput(format!("unknown difficulty '{s}'")))
    }
}

/// Named study mode bundling a Bloom level and a difficulty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Apply + medium. Realistic exam-style questions.
    #[default]
    Exam,
    /// Remember + easy. Quick recall practice.
    Review,
    /// Analyze + hard. Comparisons and edge cases.
    Deep,
    /// No constraint on level or difficulty.
    Mixed,
}

impl Preset {
    pub const ALL: [Preset; 4] = [Self::Exam, Self::Review, Self::Deep, Self::Mixed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exam => "exam",
            Self::Review => "review",
            Self::Deep => "deep",
            Self::Mixed => "mixed",
        }
    }

    /// One-line description for help output.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Exam => "Exam Prep - Apply + Medium",
            Self::Review => "Quick Review - Remember + Easy",
            Self::Deep => "Deep Study - Analyze + Hard",
            Self::Mixed => "Mixed - no level or difficulty constraint",
        }
    }

    /// Bloom level and difficulty this preset stands for.
    pub fn levels(&self) -> (Option<BloomLevel>, Option<Difficulty>) {
        match self {
            Self::Exam => (Some(BloomLevel::Apply), Some(Difficulty::Medium)),
            Self::Review => (Some(BloomLevel::Remember), Some(Difficulty::Easy)),
            Self::Deep => (Some(BloomLevel::Analyze), Some(Difficulty::Hard)),
            Self::Mixed => (None, None),
        }
    }
}

impl FromStr for Preset {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == needle)
            .ok_or_else(|| ForgeError::InvalidInput(format!("unknown preset '{s}'")))
    }
}

/// Subject-specific tutor persona for the system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Persona {
    Accounting,
    Communication,
    Mathematics,
    Economics,
    General,
}

impl Persona {
    /// Pick the persona whose discipline code appears in the subject code
    /// (`ACCT1001` → accounting). Falls back to [`Persona::General`].
    pub fn for_subject(subject: &str) -> Self {
        let subject = subject.to_ascii_uppercase();
        [
            ("ACCT", Self::Accounting),
            ("COMM", Self::Communication),
            ("MATH", Self::Mathematics),
            ("ECON", Self::Economics),
        ]
        .into_iter()
        .find(|(code, _)| subject.contains(code))
        .map_or(Self::General, |(_, persona)| persona)
    }

    pub fn role(&self) -> &'static str {
        match self {
            Self::Accounting => "Strict Accounting Professor",
            Self::Communication => "Communication Expert",
            Self::Mathematics => "Mathematics Professor",
            Self::Economics => "Economics Professor",
            Self::General => "University Professor",
        }
    }

    pub fn focus(&self) -> &'static str {
        match self {
            Self::Accounting => {
                "Focus on precise accounting standards (IFRS/GAAP). Distinguish clearly between Bookkeeping and Accounting."
            }
            Self::Communication => {
                "Focus on business etiquette, theory, and precise terminology."
            }
            Self::Mathematics => "Focus on logic, formulas, and absolute precision.",
            Self::Economics => {
                "Focus on micro/macro theories and standard economic definitions."
            }
            Self::General => "Focus on academic accuracy.",
        }
    }
}

/// Fully resolved parameters for one run.
///
/// Everything here that can change model output participates in the
/// cache key, together with the subject and the excerpt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationParams {
    pub model: String,
    pub bloom: Option<BloomLevel>,
    pub difficulty: Option<Difficulty>,
    pub subject: String,
    pub persona: Persona,
}

impl GenerationParams {
    /// Resolve a preset plus optional explicit overrides for a subject.
    pub fn resolve(
        model: impl Into<String>,
        subject: &str,
        preset: Preset,
        bloom: Option<BloomLevel>,
        difficulty: Option<Difficulty>,
    ) -> Self {
        let (preset_bloom, preset_difficulty) = preset.levels();
        let subject = subject.trim().to_ascii_uppercase();
        Self {
            model: model.into(),
            bloom: bloom.or(preset_bloom),
            difficulty: difficulty.or(preset_difficulty),
            persona: Persona::for_subject(&subject),
            subject,
        }
    }

    /// Label for the Bloom level, `"mixed"` when unconstrained.
    pub fn bloom_label(&self) -> &'static str {
        self.bloom.map_or("mixed", |b| b.as_str())
    }

    /// Label for the difficulty, `"mixed"` when unconstrained.
    pub fn difficulty_label(&self) -> &'static str {
        self.difficulty.map_or("mixed", |d| d.as_str())
    }
}
