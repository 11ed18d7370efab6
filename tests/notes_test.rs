use std::fs;
use std::path::Path;

use mcqforge::UnitKind;
use mcqforge::notes::{
    build_units, discover_week_files, extract_links, extract_summary, parse_weeks,
};

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Subject folder with two weeks of lectures and a concept folder.
fn vault() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let subject = dir.path().join("ECON1101");
    write(
        &subject.join("Recorded Lectures").join("W01 Scarcity.md"),
        "# Scarcity\n\nIntro text.\n\n## Key Concepts\n\
         - [[Opportunity Cost|the cost of choosing]]\n\
         - [[Scarcity]] forces trade-offs\n\n\
         ## Readings\nChapter 1",
    );
    write(
        &subject.join("Live Lectures").join("Week 1 Tutorial.md"),
        "Worked examples on [[Production Possibility Frontier#Shape]].",
    );
    write(
        &subject.join("Live Lectures").join("Week 02 Markets.md"),
        "Supply meets demand at equilibrium.",
    );
    write(
        &subject.join("Recorded Lectures").join("Overview.md"),
        "No week marker here.",
    );
    write(
        &subject.join("Recorded Lectures").join("W01 slides.pdf"),
        "binary",
    );

    let concepts = dir.path().join("Concepts");
    write(
        &concepts.join("Opportunity Cost.md"),
        "## Key Concepts\nThe value of the next best alternative.",
    );
    write(&concepts.join("Scarcity.md"), "Resources are limited.");
    dir
}

#[test]
fn summary_prefers_key_concepts_section() {
    let content = "# Title\nintro\n### key concepts\nfirst [[Link|shown]]\nsecond\n## Next\nignored";
    assert_eq!(extract_summary(content), "first shown\nsecond");
}

#[test]
fn summary_falls_back_to_whole_note() {
    assert_eq!(
        extract_summary("  Plain note with [[Link]].  "),
        "Plain note with Link."
    );
}

#[test]
fn links_drop_alias_and_anchor() {
    let links = extract_links("[[A]] [[B|alias]] [[C#Section]] [[A]]");
    assert_eq!(links.into_iter().collect::<Vec<_>>(), ["A", "B", "C"]);
}

#[test]
fn week_selections() {
    assert_eq!(parse_weeks("3").unwrap(), Some(vec![3]));
    assert_eq!(parse_weeks("1-3,5").unwrap(), Some(vec![1, 2, 3, 5]));
    assert_eq!(parse_weeks("5, 1-2 ,2").unwrap(), Some(vec![1, 2, 5]));
    assert_eq!(parse_weeks("ALL").unwrap(), None);
    assert_eq!(parse_weeks("").unwrap(), None);

    assert!(parse_weeks("0").is_err());
    assert!(parse_weeks("53").is_err());
    assert!(parse_weeks("4-2").is_err());
    assert!(parse_weeks("one").is_err());
}

#[test]
fn discovery_groups_markdown_files_by_week() {
    let vault = vault();
    let weeks = discover_week_files(&vault.path().join("ECON1101"), None).unwrap();

    assert_eq!(weeks.keys().copied().collect::<Vec<_>>(), [1, 2]);
    let week1: Vec<String> = weeks[&1]
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(week1, ["Week 1 Tutorial.md", "W01 Scarcity.md"]);
}

#[test]
fn discovery_filters_requested_weeks() {
    let vault = vault();
    let weeks = discover_week_files(&vault.path().join("ECON1101"), Some(&[2][..])).unwrap();
    assert_eq!(weeks.len(), 1);
    assert!(weeks.contains_key(&2));
}

#[test]
fn missing_subject_is_an_error() {
    let vault = vault();
    assert!(discover_week_files(&vault.path().join("MATH1131"), None).is_err());
}

#[test]
fn units_cover_lectures_then_linked_concepts() {
    let vault = vault();
    let weeks = discover_week_files(&vault.path().join("ECON1101"), Some(&[1][..])).unwrap();
    let concepts = vault.path().join("Concepts");

    let units = build_units(&weeks[&1], Some(concepts.as_path()), 0);

    let names: Vec<&str> = units.iter().map(|u| u.name.as_str()).collect();
    // Production Possibility Frontier has no note and is skipped
    assert_eq!(
        names,
        [
            "Week 1 Tutorial.md",
            "W01 Scarcity.md",
            "Opportunity Cost",
            "Scarcity"
        ]
    );
    assert_eq!(units[1].kind, UnitKind::Lecture);
    assert!(units[1].excerpt.contains("the cost of choosing"));
    assert!(!units[1].excerpt.contains("Chapter 1"));
    assert_eq!(units[2].kind, UnitKind::Concept);
    assert_eq!(units[2].heading(), "Concept: Opportunity Cost");
    assert_eq!(
        units.iter().map(|u| u.seq).collect::<Vec<_>>(),
        [0, 1, 2, 3]
    );
}

#[test]
fn concept_limit_caps_linked_notes() {
    let vault = vault();
    let weeks = discover_week_files(&vault.path().join("ECON1101"), Some(&[1][..])).unwrap();
    let concepts = vault.path().join("Concepts");

    let units = build_units(&weeks[&1], Some(concepts.as_path()), 1);
    let concept_units = units.iter().filter(|u| u.kind == UnitKind::Concept).count();
    assert_eq!(concept_units, 1);
}

#[test]
fn without_concept_dir_only_lectures_are_built() {
    let vault = vault();
    let weeks = discover_week_files(&vault.path().join("ECON1101"), None).unwrap();
    let units = build_units(&weeks[&2], None, 0);
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].excerpt, "Supply meets demand at equilibrium.");
}
