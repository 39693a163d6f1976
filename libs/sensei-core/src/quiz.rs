//! Validation of model output into a typed quiz.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::QuizShapeError;
use crate::salvage::{extract_quiz_fragments, salvage_json, RepairStage};
use crate::types::QuestionType;

/// A question accepted from generated output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub question: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub options: Vec<String>,
    pub correct_answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Quiz recovered from model output, with reasons for any dropped entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuiz {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub questions: Vec<GeneratedQuestion>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<String>,
}

impl GeneratedQuiz {
    /// Salvage and validate raw completion text.
    ///
    /// When the salvaged value does not hold any usable question, the raw text
    /// is scanned once more for question fragments before giving up.
    pub fn from_model_output(raw: &str) -> Result<(Self, RepairStage), QuizShapeError> {
        let salvaged = salvage_json(raw)?;
        match Self::from_value(&salvaged.value) {
            Ok(quiz) => Ok((quiz, salvaged.stage)),
            Err(err) if salvaged.stage != RepairStage::Extracted => {
                match extract_quiz_fragments(raw).and_then(|v| Self::from_value(&v).ok()) {
                    Some(quiz) => Ok((quiz, RepairStage::Extracted)),
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Validate an untrusted value.
    ///
    /// Accepts `{"questions": [...]}` (optionally nested under `"quiz"`) or a
    /// bare array of questions.
    pub fn from_value(value: &Value) -> Result<Self, QuizShapeError> {
        let (title, items) = match value {
            Value::Array(items) => (None, items),
            Value::Object(map) => {
                let map = match map.get("quiz") {
                    Some(Value::Object(inner)) => inner,
                    _ => map,
                };
                let items = match map.get("questions") {
                    Some(Value::Array(items)) => items,
                    _ => return Err(QuizShapeError::UnexpectedRoot("object without questions")),
                };
                let title = string_field(map, &["title", "name"]);
                (title, items)
            }
            other => return Err(QuizShapeError::UnexpectedRoot(kind_name(other))),
        };

        let mut questions = Vec::new();
        let mut rejected = Vec::new();
        for (idx, item) in items.iter().enumerate() {
            match parse_question(item) {
                Ok(q) => questions.push(q),
                Err(reason) => rejected.push(format!("question {}: {}", idx + 1, reason)),
            }
        }

        if questions.is_empty() {
            return Err(QuizShapeError::NoValidQuestions { rejected });
        }

        Ok(Self {
            title,
            questions,
            rejected,
        })
    }

    /// Keep at most `max` questions.
    pub fn truncate(&mut self, max: usize) {
        self.questions.truncate(max);
    }
}

fn parse_question(item: &Value) -> Result<GeneratedQuestion, String> {
    let map = item
        .as_object()
        .ok_or_else(|| format!("expected an object, got {}", kind_name(item)))?;

    let question = string_field(map, &["question", "text", "prompt"])
        .ok_or_else(|| "missing question text".to_string())?;

    let mut options: Vec<String> = match map.get("options").or_else(|| map.get("choices")) {
        Some(Value::Array(values)) => values.iter().filter_map(option_text).collect(),
        _ => Vec::new(),
    };

    let answer = ["correct_answer", "correctAnswer", "answer"]
        .iter()
        .find_map(|key| map.get(*key))
        .filter(|v| !v.is_null())
        .ok_or_else(|| "missing correct answer".to_string())?;

    let declared_type = string_field(map, &["type", "question_type"])
        .and_then(|t| QuestionType::from_str(&t));
    let question_type = declared_type.unwrap_or_else(|| infer_type(&options, answer));

    let correct_answer = match question_type {
        QuestionType::MultipleChoice => {
            if options.is_empty() {
                return Err("multiple choice question without options".to_string());
            }
            resolve_choice(&options, answer)
                .ok_or_else(|| "correct answer is not one of the options".to_string())?
        }
        QuestionType::TrueFalse => {
            let truth = match answer {
                Value::Bool(b) => Some(*b),
                Value::String(s) => parse_truth(s),
                _ => None,
            }
            .ok_or_else(|| "true/false question without a boolean answer".to_string())?;
            if options.is_empty() {
                options = vec!["True".to_string(), "False".to_string()];
            }
            if truth { "True" } else { "False" }.to_string()
        }
        QuestionType::ShortAnswer => {
            scalar_text(answer).ok_or_else(|| "correct answer is empty".to_string())?
        }
    };

    Ok(GeneratedQuestion {
        question,
        question_type,
        options,
        correct_answer,
        explanation: string_field(map, &["explanation", "rationale"]),
    })
}

fn infer_type(options: &[String], answer: &Value) -> QuestionType {
    if !options.is_empty() {
        return QuestionType::MultipleChoice;
    }
    let is_truth = match answer {
        Value::Bool(_) => true,
        Value::String(s) => parse_truth(s).is_some(),
        _ => false,
    };
    if is_truth {
        QuestionType::TrueFalse
    } else {
        QuestionType::ShortAnswer
    }
}

/// Map an answer given as option text, letter or zero-based index to the option text.
fn resolve_choice(options: &[String], answer: &Value) -> Option<String> {
    match answer {
        Value::Number(n) => {
            let idx = n.as_u64()? as usize;
            options.get(idx).cloned()
        }
        Value::String(s) => {
            let wanted = s.trim();
            if let Some(found) = options.iter().find(|o| o.trim().eq_ignore_ascii_case(wanted)) {
                return Some(found.clone());
            }
            if let Some(idx) = letter_index(wanted) {
                if let Some(found) = options.get(idx) {
                    return Some(found.clone());
                }
            }
            let unlabeled = strip_option_label(wanted);
            options
                .iter()
                .find(|o| strip_option_label(o.trim()).eq_ignore_ascii_case(unlabeled))
                .cloned()
        }
        _ => None,
    }
}

/// `"B"`, `"b)"`, `"C."` → zero-based index.
fn letter_index(s: &str) -> Option<usize> {
    let mut chars = s.chars();
    let letter = chars.next()?;
    let rest = chars.as_str().trim();
    if !letter.is_ascii_alphabetic() || !(rest.is_empty() || rest == ")" || rest == ".") {
        return None;
    }
    Some((letter.to_ascii_uppercase() as u8 - b'A') as usize)
}

/// `"A) Scrum Master"` → `"Scrum Master"`.
fn strip_option_label(s: &str) -> &str {
    let mut chars = s.char_indices();
    match (chars.next(), chars.next()) {
        (Some((_, letter)), Some((idx, sep)))
            if letter.is_ascii_alphabetic() && matches!(sep, ')' | '.' | ':') =>
        {
            s[idx + 1..].trim_start()
        }
        _ => s,
    }
}

fn parse_truth(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "yes" | "correct" => Some(true),
        "false" | "no" | "incorrect" => Some(false),
        _ => None,
    }
}

fn option_text(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => string_field(map, &["text", "label", "value"]),
        other => scalar_text(other),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn string_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
