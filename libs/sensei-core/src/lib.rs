//! Core library for the Scrum Sensei learning service.
//!
//! Provides:
//! - Best-effort recovery of malformed JSON returned by language models
//! - Validation of recovered values into typed generated quizzes
//! - Answer comparison and quiz grading (Levenshtein-based fuzzy matching)
//! - Shared domain types (materials, questions, advice)

pub mod error;
pub mod grading;
pub mod quiz;
pub mod salvage;
pub mod types;

pub use error::{QuizShapeError, SalvageError};
pub use grading::{
    compare_answers, grade_quiz, levenshtein_distance, normalized_similarity, AnswerKey,
    GradedQuestion, MatchResult, QuizGrade, DEFAULT_FUZZY_THRESHOLD,
};
pub use quiz::{GeneratedQuestion, GeneratedQuiz};
pub use salvage::{extract_quiz_fragments, salvage_json, RepairStage, Salvaged};
pub use types::{AdviceType, MatchingMode, MaterialStatus, MaterialType, QuestionType};
