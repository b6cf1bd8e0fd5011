//! Response Parser: turns free-text model output into typed structures.
//!
//! Every function here is total: a miss degrades to a default (0, the trimmed input, an
//! empty list) and is logged at debug level. Nothing in the pipeline aborts on a parse miss;
//! a score of 0 simply routes the run down the low-match branch.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::analysis::models::{ComparisonResult, MissingSkill, Question};

/// 1-3 digits, optional whitespace, `/`, optional whitespace, `100`.
static SCORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,3})\s*/\s*100").expect("Should compile: SCORE_RE")
});

static SUMMARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Summary of Alignment[:*]*(.*?)[*#\s]*Match Score")
        .expect("Should compile: SUMMARY_RE")
});

/// `* **<category>:** <description>` (also `**<category>**: ...`, `-` bullets).
static SKILL_BULLET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[*\-•]\s+\*\*(.+?)\*\*\s*(.*)$").expect("Should compile: SKILL_BULLET_RE")
});

/// Any `*`, `-` or `•` list item, bold or not.
static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[*\-•]\s").expect("Should compile: BULLET_RE"));

/// `**Question 3: Some Topic**`
static QUESTION_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*Question\s+\d+\s*:[^\n]*?\*\*").expect("Should compile: QUESTION_HEADER_RE")
});

static QUESTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\*\*Question:\*\*\s*(.*?)\*\*Expected Answer:\*\*")
        .expect("Should compile: QUESTION_RE")
});

/// Answer runs to the first blank-line gap or the end of the block.
static ANSWER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\*\*Expected Answer:\*\*\s*(.*?)(?:\n[ \t]*\n|\z)")
        .expect("Should compile: ANSWER_RE")
});

/// First `N/100` occurrence, clamped to 0 – 100. Later score-like numbers are ignored.
pub fn extract_score(text: &str) -> u32 {
    match SCORE_RE
        .captures(text)
        .and_then(|caps| caps[1].parse::<u32>().ok())
    {
        Some(score) => score.min(100),
        None => {
            debug!("Parse miss: no N/100 score in {} chars", text.len());
            0
        }
    }
}

/// Structural sanity check that the backend followed the comparison format contract.
pub fn has_match_score(text: &str) -> bool {
    text.to_lowercase().contains("match score")
}

/// Text between "Summary of Alignment" and "Match Score"; the whole input when either
/// header is missing, so callers must cope with an unstructured summary.
pub fn extract_summary(text: &str) -> String {
    match SUMMARY_RE.captures(text) {
        Some(caps) => caps[1].trim().to_string(),
        None => {
            debug!("Parse miss: no alignment summary section, using full text");
            text.trim().to_string()
        }
    }
}

/// Raw body of the "Matching Skills" section, empty when absent.
pub fn extract_matching_skills(text: &str) -> String {
    section_body(text, "Matching Skills")
        .map(|body| body.trim().to_string())
        .unwrap_or_default()
}

pub fn extract_missing_skills(text: &str) -> Vec<MissingSkill> {
    let Some(section) = section_body(text, "Missing Skills") else {
        debug!("Parse miss: no Missing Skills section");
        return Vec::new();
    };

    let mut skills: Vec<MissingSkill> = Vec::new();
    let mut continuing = false;

    for line in section.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continuing = false;
            continue;
        }

        if let Some(caps) = SKILL_BULLET_RE.captures(line) {
            skills.push(MissingSkill {
                category: caps[1].trim().trim_end_matches(':').trim().to_string(),
                description: caps[2].trim().trim_start_matches(':').trim().to_string(),
            });
            continuing = true;
        } else if BULLET_RE.is_match(line) {
            // an unlabeled bullet ends the previous description
            continuing = false;
        } else if continuing {
            if let Some(last) = skills.last_mut() {
                if !last.description.is_empty() {
                    last.description.push(' ');
                }
                last.description.push_str(trimmed);
            }
        }
    }

    skills
}

/// Splits on `**Question N: ...**` markers and keeps blocks holding both a question and an
/// expected answer, in source order. Blocks that don't match are skipped silently.
pub fn parse_questions(text: &str) -> Vec<Question> {
    let questions: Vec<Question> = QUESTION_HEADER_RE
        .split(text)
        .filter_map(|block| {
            let question = QUESTION_RE.captures(block)?;
            let answer = ANSWER_RE.captures(block)?;
            Some(Question {
                question_text: collapse_lines(&question[1]),
                expected_answer: collapse_lines(&answer[1]),
            })
        })
        .collect();

    if questions.is_empty() {
        debug!("Parse miss: no question blocks in {} chars", text.len());
    }
    questions
}

pub fn parse_comparison(text: &str) -> ComparisonResult {
    ComparisonResult {
        matching_skills: extract_matching_skills(text),
        missing_skills: extract_missing_skills(text),
        alignment_summary: extract_summary(text),
        score: extract_score(text),
    }
}

/// Body of a section from just after `header` to the next top-level header or end of text.
fn section_body<'a>(text: &'a str, header: &str) -> Option<&'a str> {
    let start = text.find(header)? + header.len();
    let rest = text[start..].trim_start_matches(|c: char| matches!(c, ':' | '*' | ' ' | '\t'));
    let end = next_header_offset(rest).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Byte offset of the first line after the current one that opens a new top-level section.
fn next_header_offset(text: &str) -> Option<usize> {
    let mut offset = 0;
    for (i, line) in text.split_inclusive('\n').enumerate() {
        if i > 0 && (line.starts_with("**") || line.starts_with('#') || line.starts_with("---")) {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}

fn collapse_lines(text: &str) -> String {
    text.split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
