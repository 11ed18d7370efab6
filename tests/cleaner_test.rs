use mcqforge::cleaner::{clean_ai_output, clean_wikilinks};

#[test]
fn wikilinks_reduce_to_visible_text() {
    assert_eq!(clean_wikilinks("[[Target]]"), "Target");
    assert_eq!(clean_wikilinks("[[Target|Alias]]"), "Alias");
    assert_eq!(
        clean_wikilinks("Both [[Supply]] and [[Demand Curve|demand]] matter."),
        "Both Supply and demand matter."
    );
    assert_eq!(clean_wikilinks("no links here"), "no links here");
}

#[test]
fn chatty_output_is_normalised() {
    let raw = "Here are 2 questions:\n\n\
               Question 1: What is revenue?\n\
               1) Income\n\
               2) Cost\n\
               3) Asset\n\
               4) Liability\n\n\
               **Answer:** 1. Income\n\
               **Explanation:** Revenue is income.";

    assert_eq!(
        clean_ai_output(raw),
        "What is revenue?\n\
         1. Income\n\
         2. Cost\n\
         3. Asset\n\
         4. Liability  \n\
         ?  \n\
         **Answer:** 1) Income\n\
         > **Explanation:** Revenue is income."
    );
}

#[test]
fn existing_separator_is_not_duplicated() {
    let raw = "What is cost?\n1. A\n2. B\n3. C\n4. D\n?\n**Answer:** 3) C\n> **Explanation:** E";
    let cleaned = clean_ai_output(raw);
    assert_eq!(cleaned.matches("?  \n").count(), 1);
    assert!(cleaned.contains("4. D  \n?  \n**Answer:** 3) C"));
}

#[test]
fn notes_and_source_references_are_removed() {
    let raw = "According to the text, what is GDP?\n\
               1. A\n2. B\n3. C\n4. D\n\
               **Answer:** 2) B\n\
               > **Explanation:** E\n\
               Note: these questions cover week 1.";
    let cleaned = clean_ai_output(raw);
    assert!(cleaned.starts_with("what is GDP?"), "{cleaned}");
    assert!(!cleaned.contains("Note:"));
}

#[test]
fn verification_sections_are_dropped() {
    let raw = "**Verification:** all answers checked\nLooks good.\n\
               1. What is GDP?\n1. A\n2. B\n3. C\n4. D\n?\n**Answer:** 1) A\n> **Explanation:** E";
    let cleaned = clean_ai_output(raw);
    assert!(!cleaned.contains("Verification"));
    assert!(!cleaned.contains("Looks good"));
    assert!(cleaned.starts_with("1. What is GDP?"));
}

#[test]
fn blank_line_runs_are_collapsed() {
    let raw = "Q1?\n1. A\n2. B\n3. C\n4. D\n?\n**Answer:** 1) A\n> **Explanation:** E\n\n\n\n\nQ2?\n1. A";
    let cleaned = clean_ai_output(raw);
    assert!(!cleaned.contains("\n\n\n"));
    assert!(cleaned.contains("E\n\nQ2?"));
}
