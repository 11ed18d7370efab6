//! Prompt construction for generation and refinement.

use crate::providers::Prompt;
use crate::types::{BloomLevel, DefectKind, Difficulty, GenerationParams, GenerationRequest, Persona};

const FORMAT_EXAMPLE: &str = "\
[Your question here]?
1. Option 1
2. Option 2
3. Option 3
4. Option 4
?
**Answer:** 2) Option 2 Text
> **Explanation:** Short explanation of why this is the correct answer.";

fn bloom_instruction(level: BloomLevel) -> &'static str {
    match level {
        BloomLevel::Remember => {
            "COGNITIVE LEVEL: REMEMBER - Focus on RECALL and RECOGNITION. Ask about facts, terms, basic concepts, and definitions that can be directly retrieved from the text."
        }
        BloomLevel::Understand => {
            "COGNITIVE LEVEL: UNDERSTAND - Focus on COMPREHENSION. Ask students to explain, summarize, interpret, or describe concepts in their own words."
        }
        BloomLevel::Apply => {
            "COGNITIVE LEVEL: APPLY - Focus on APPLICATION. Ask students to use concepts, theories, or procedures in new situations or practical scenarios."
        }
        BloomLevel::Analyze => {
            "COGNITIVE LEVEL: ANALYZE - Focus on ANALYSIS. Ask students to compare, contrast, categorize, or examine relationships between concepts."
        }
        BloomLevel::Evaluate => {
            "COGNITIVE LEVEL: EVALUATE - Focus on EVALUATION. Ask students to judge, critique, assess, or justify decisions based on criteria."
        }
        BloomLevel::Create => {
            "COGNITIVE LEVEL: CREATE - Focus on CREATION. Ask students to design, construct, formulate, or propose new solutions or approaches."
        }
    }
}

fn difficulty_instruction(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Easy => {
            "DIFFICULTY: EASY - Use straightforward scenarios with common cases. Distractors should be clearly wrong to someone who studied."
        }
        Difficulty::Medium => {
            "DIFFICULTY: MEDIUM - Use realistic scenarios typical of exams. Distractors should be plausible but distinguishable with proper understanding."
        }
        Difficulty::Hard => {
            "DIFFICULTY: HARD - Use complex scenarios with edge cases. Distractors should be very plausible, requiring deep understanding to eliminate."
        }
    }
}

/// System prompt for a subject persona.
pub fn system_prompt(persona: Persona) -> String {
    format!(
        "You are an expert university-level tutor specializing in {role}.\n\
         Your goal is to create high-quality, exam-style multiple-choice questions (MCQs) \
         that test deep understanding, critical thinking, and application of concepts.\n\n\
         {focus}\n\n\
         You must output ONLY valid Markdown.\n",
        role = persona.role(),
        focus = persona.focus(),
    )
}

/// Prompt for a fresh generation.
pub fn generation_prompt(request: &GenerationRequest) -> Prompt {
    let params = &request.params;
    let mut instructions = String::new();
    if let Some(level) = params.bloom {
        instructions.push_str(bloom_instruction(level));
        instructions.push('\n');
    }
    if let Some(difficulty) = params.difficulty {
        instructions.push_str(difficulty_instruction(difficulty));
        instructions.push('\n');
    }

    let user = format!(
        "CONTEXT:\n{context}\n\n\
         INSTRUCTIONS:\n\
         Create {count} multiple-choice questions based on the above context.\n\n\
         {instructions}\n\
         STRICT FORMATTING RULES:\n\
         1. Output MUST be in valid Markdown.\n\
         2. Each question must follow this EXACT format:\n\n\
         {FORMAT_EXAMPLE}\n\n\
         3. Do NOT include any conversational text (e.g., \"Here are the questions\").\n\
         4. Ensure there is a blank line between questions.\n\
         5. The separator '?' must be on its own line before the answer.\n\
         6. The answer line must start with \"**Answer:**\".\n\
         7. The explanation line must start with \"> **Explanation:**\".\n",
        context = request.excerpt,
        count = request.question_count,
    );

    Prompt {
        model: params.model.clone(),
        system: Some(system_prompt(params.persona)),
        user,
    }
}

/// Prompt asking the model to fix `previous`, listing every defect found.
pub fn refine_prompt(params: &GenerationParams, previous: &str, defects: &[DefectKind]) -> Prompt {
    let problems: String = defects
        .iter()
        .enumerate()
        .map(|(i, d)| format!("{}. {}\n", i + 1, d.fix_instruction()))
        .collect();

    let user = format!(
        "The previous output did not match the required MCQ format.\n\
         Please REFORMAT the following content to match the exact format required. \
         Keep the questions and their meaning; only fix the structure.\n\n\
         CONTENT TO FIX:\n{previous}\n\n\
         PROBLEMS FOUND:\n{problems}\n\
         REQUIRED FORMAT:\n{FORMAT_EXAMPLE}\n\n\
         Output only the corrected questions.\n",
    );

    Prompt {
        model: params.model.clone(),
        system: Some(system_prompt(params.persona)),
        user,
    }
}
