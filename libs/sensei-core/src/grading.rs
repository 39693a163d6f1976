//! Answer matching and quiz scoring.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{MatchingMode, QuestionType};

/// Similarity a short answer needs to count as correct.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.8;

/// Result of comparing a given answer to the correct answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    /// Whether the answer is considered correct.
    pub is_correct: bool,
    /// Similarity score between 0.0 and 1.0.
    pub similarity: f64,
    /// The matching mode used.
    pub matching_mode: MatchingMode,
}

/// Compare a given answer to the correct answer.
pub fn compare_answers(
    given: &str,
    correct: &str,
    mode: MatchingMode,
    fuzzy_threshold: f64,
) -> MatchResult {
    let given = normalize_whitespace(given);
    let correct = normalize_whitespace(correct);

    let (is_correct, similarity) = match mode {
        MatchingMode::Exact => {
            let same = given == correct;
            (same, if same { 1.0 } else { 0.0 })
        }
        MatchingMode::CaseInsensitive => {
            let same = given.to_lowercase() == correct.to_lowercase();
            (same, if same { 1.0 } else { 0.0 })
        }
        MatchingMode::Fuzzy => {
            let similarity = normalized_similarity(&given.to_lowercase(), &correct.to_lowercase());
            (similarity >= fuzzy_threshold, similarity)
        }
    };

    MatchResult {
        is_correct,
        similarity,
        matching_mode: mode,
    }
}

/// Trim and collapse runs of whitespace.
fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Calculate Levenshtein distance between two strings.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    let m = a_chars.len();
    let n = b_chars.len();

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    let mut prev = (0..=n).collect::<Vec<_>>();
    let mut curr = vec![0; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// Normalized similarity (0.0 to 1.0) based on Levenshtein distance.
///
/// Lengths are counted in characters so multi-byte text compares fairly.
pub fn normalized_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }

    let distance = levenshtein_distance(a, b);
    1.0 - (distance as f64 / max_len as f64)
}

/// What the grader needs to know about one stored question.
#[derive(Debug, Clone)]
pub struct AnswerKey {
    pub question_id: i64,
    pub question_type: QuestionType,
    pub correct_answer: String,
    pub explanation: Option<String>,
}

/// Outcome for one question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradedQuestion {
    pub question_id: i64,
    pub given_answer: Option<String>,
    pub correct_answer: String,
    pub is_correct: bool,
    pub similarity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Outcome for a whole submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizGrade {
    pub total: usize,
    pub correct: usize,
    /// Percentage of correct answers, 0.0 to 100.0.
    pub score: f64,
    pub results: Vec<GradedQuestion>,
}

/// Grade answers (keyed by question id) against the answer keys.
///
/// Unanswered questions count as incorrect; answers to unknown ids are ignored.
pub fn grade_quiz(keys: &[AnswerKey], answers: &HashMap<i64, String>) -> QuizGrade {
    let results: Vec<GradedQuestion> = keys
        .iter()
        .map(|key| {
            let given = answers
                .get(&key.question_id)
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty());
            let outcome = given.as_deref().map(|answer| {
                compare_answers(
                    answer,
                    &key.correct_answer,
                    key.question_type.matching_mode(),
                    DEFAULT_FUZZY_THRESHOLD,
                )
            });
            GradedQuestion {
                question_id: key.question_id,
                given_answer: given,
                correct_answer: key.correct_answer.clone(),
                is_correct: outcome.as_ref().map(|m| m.is_correct).unwrap_or(false),
                similarity: outcome.map(|m| m.similarity).unwrap_or(0.0),
                explanation: key.explanation.clone(),
            }
        })
        .collect();

    let total = results.len();
    let correct = results.iter().filter(|r| r.is_correct).count();
    let score = if total == 0 {
        0.0
    } else {
        (correct as f64 / total as f64) * 100.0
    };

    QuizGrade {
        total,
        correct,
        score,
        results,
    }
}
