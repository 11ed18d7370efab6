use mcqforge::cache::{CacheKey, derive_key, key_for, normalize_excerpt};
use mcqforge::{BloomLevel, Difficulty, GenerationParams, Preset};

const EXCERPT: &str = "Opportunity cost is the value of the next best alternative forgone.";

#[test]
fn key_is_deterministic() {
    let a = derive_key("llama3:8b", "apply", "medium", "ECON1101", EXCERPT);
    let b = derive_key("llama3:8b", "apply", "medium", "ECON1101", EXCERPT);
    assert_eq!(a, b);
    assert_eq!(a.as_str().len(), 64);
    assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

#[test]
fn each_input_changes_the_key() {
    let base = derive_key("llama3:8b", "apply", "medium", "ECON1101", EXCERPT);
    let variants = [
        derive_key("mistral", "apply", "medium", "ECON1101", EXCERPT),
        derive_key("llama3:8b", "analyze", "medium", "ECON1101", EXCERPT),
        derive_key("llama3:8b", "apply", "hard", "ECON1101", EXCERPT),
        derive_key("llama3:8b", "apply", "medium", "ACCT1001", EXCERPT),
        derive_key("llama3:8b", "apply", "medium", "ECON1101", "Something else entirely."),
    ];
    for variant in &variants {
        assert_ne!(&base, variant);
    }
}

#[test]
fn field_boundaries_are_unambiguous() {
    // Shifting characters between adjacent fields must not collide.
    let a = derive_key("ab", "c", "medium", "S", EXCERPT);
    let b = derive_key("a", "bc", "medium", "S", EXCERPT);
    assert_ne!(a, b);
}

#[test]
fn difficulty_change_gives_distinct_keys() {
    let medium = GenerationParams::resolve("llama3:8b", "ECON1101", Preset::Exam, None, None);
    let hard = GenerationParams::resolve(
        "llama3:8b",
        "ECON1101",
        Preset::Exam,
        None,
        Some(Difficulty::Hard),
    );
    assert_ne!(key_for(&medium, EXCERPT), key_for(&hard, EXCERPT));
}

#[test]
fn whitespace_and_link_markup_do_not_change_the_key() {
    let params = GenerationParams::resolve("llama3:8b", "ECON1101", Preset::Exam, None, None);
    let plain = "Scarcity forces choices about Opportunity Cost.";
    let noisy = "  Scarcity   forces\n\nchoices about [[Opportunity Cost]].  ";
    let aliased = "Scarcity forces choices about [[Cost Concepts#Opportunity|Opportunity Cost]].";
    assert_eq!(key_for(&params, plain), key_for(&params, noisy));
    assert_eq!(key_for(&params, plain), key_for(&params, aliased));
}

#[test]
fn normalization_keeps_visible_text() {
    assert_eq!(
        normalize_excerpt(" [[Ledger]]\tand [[Accrual Basis|accruals]] "),
        "Ledger and accruals"
    );
}

#[test]
fn mixed_preset_matches_explicit_mixed_labels() {
    let mixed = GenerationParams::resolve("llama3:8b", "MATH1131", Preset::Mixed, None, None);
    assert_eq!(
        key_for(&mixed, EXCERPT),
        derive_key("llama3:8b", "mixed", "mixed", "MATH1131", EXCERPT)
    );
}

#[test]
fn subject_is_case_insensitive_through_params() {
    let lower = GenerationParams::resolve(
        "llama3:8b",
        "econ1101",
        Preset::Deep,
        Some(BloomLevel::Evaluate),
        None,
    );
    let upper = GenerationParams::resolve(
        "llama3:8b",
        "ECON1101",
        Preset::Deep,
        Some(BloomLevel::Evaluate),
        None,
    );
    assert_eq!(key_for(&lower, EXCERPT), key_for(&upper, EXCERPT));
}

#[test]
fn digest_parsing() {
    let key = derive_key("m", "b", "d", "s", "e");
    assert_eq!(CacheKey::from_digest(key.as_str()), Some(key.clone()));
    assert_eq!(CacheKey::from_digest("not-a-digest"), None);
    assert_eq!(CacheKey::from_digest(&key.as_str().to_uppercase()), None);
}
