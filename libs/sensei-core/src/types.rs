//! Core domain types shared by the backend and its tests.

use serde::{Deserialize, Serialize};

/// Kind of learning material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialType {
    Pdf,
    Quiz,
    Audio,
    Text,
}

impl MaterialType {
    /// Get the type name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Quiz => "quiz",
            Self::Audio => "audio",
            Self::Text => "text",
        }
    }

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pdf" => Some(Self::Pdf),
            "quiz" => Some(Self::Quiz),
            "audio" => Some(Self::Audio),
            "text" => Some(Self::Text),
            _ => None,
        }
    }

    /// Whether quizzes and audio lectures can be generated from this kind.
    pub fn is_generation_source(&self) -> bool {
        matches!(self, Self::Pdf | Self::Text)
    }
}

impl Default for MaterialType {
    fn default() -> Self {
        Self::Text
    }
}

/// Publish status of a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialStatus {
    Draft,
    Published,
}

impl MaterialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            _ => None,
        }
    }
}

impl Default for MaterialStatus {
    fn default() -> Self {
        Self::Draft
    }
}

/// Question format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MultipleChoice => "multiple_choice",
            Self::TrueFalse => "true_false",
            Self::ShortAnswer => "short_answer",
        }
    }

    /// Parse from string, accepting the spellings language models tend to use.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "multiple_choice" | "multiplechoice" | "choice" | "mcq" => Some(Self::MultipleChoice),
            "true_false" | "truefalse" | "boolean" => Some(Self::TrueFalse),
            "short_answer" | "shortanswer" | "text" | "open" => Some(Self::ShortAnswer),
            _ => None,
        }
    }

    /// Matching mode used when grading an answer to this kind of question.
    pub fn matching_mode(&self) -> MatchingMode {
        match self {
            Self::MultipleChoice | Self::TrueFalse => MatchingMode::CaseInsensitive,
            Self::ShortAnswer => MatchingMode::Fuzzy,
        }
    }
}

impl Default for QuestionType {
    fn default() -> Self {
        Self::MultipleChoice
    }
}

/// Category of a coaching message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdviceType {
    StudyTip,
    QuizFeedback,
    Motivation,
    General,
}

impl AdviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StudyTip => "study_tip",
            Self::QuizFeedback => "quiz_feedback",
            Self::Motivation => "motivation",
            Self::General => "general",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "study_tip" => Some(Self::StudyTip),
            "quiz_feedback" => Some(Self::QuizFeedback),
            "motivation" => Some(Self::Motivation),
            "general" => Some(Self::General),
            _ => None,
        }
    }

    /// One-line instruction appended to the advice prompt.
    pub fn focus(&self) -> &'static str {
        match self {
            Self::StudyTip => "Give one concrete study technique the learner should try next.",
            Self::QuizFeedback => {
                "Comment on the learner's quiz results and name the weakest area to revisit."
            }
            Self::Motivation => "Encourage the learner based on what they have already completed.",
            Self::General => "Give short, practical coaching on how to continue learning Scrum.",
        }
    }
}

impl Default for AdviceType {
    fn default() -> Self {
        Self::General
    }
}

/// Matching mode for typed answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingMode {
    Exact,
    CaseInsensitive,
    Fuzzy,
}

impl Default for MatchingMode {
    fn default() -> Self {
        Self::Fuzzy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_type_round_trip_names() {
        for t in [MaterialType::Pdf, MaterialType::Quiz, MaterialType::Audio, MaterialType::Text] {
            assert_eq!(MaterialType::from_str(t.as_str()), Some(t));
        }
        assert_eq!(MaterialType::from_str("video"), None);
    }

    #[test]
    fn test_question_type_aliases() {
        assert_eq!(QuestionType::from_str("Multiple Choice"), Some(QuestionType::MultipleChoice));
        assert_eq!(QuestionType::from_str("true-false"), Some(QuestionType::TrueFalse));
        assert_eq!(QuestionType::from_str("short_answer"), Some(QuestionType::ShortAnswer));
        assert_eq!(QuestionType::from_str("essay"), None);
    }

    #[test]
    fn test_material_status_serde() {
        let json = serde_json::to_string(&MaterialStatus::Published).unwrap();
        assert_eq!(json, "\"published\"");
    }

    #[test]
    fn test_generation_sources() {
        assert!(MaterialType::Pdf.is_generation_source());
        assert!(MaterialType::Text.is_generation_source());
        assert!(!MaterialType::Audio.is_generation_source());
    }
}
