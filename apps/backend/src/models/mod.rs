//! Database models and API types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use std::collections::HashMap;

pub use sensei_core::grading::QuizGrade;
pub use sensei_core::types::{AdviceType, MaterialStatus, MaterialType, QuestionType};

use crate::services::storage::StorageService;

// === Database Entity Types ===

/// Material row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbMaterial {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    #[sqlx(rename = "type")]
    pub material_type: String,
    pub status: String,
    pub file_path: Option<String>,
    pub content: Option<String>,
    pub source_material_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbMaterial {
    pub fn kind(&self) -> MaterialType {
        MaterialType::from_str(&self.material_type).unwrap_or_default()
    }

    pub fn publish_status(&self) -> MaterialStatus {
        MaterialStatus::from_str(&self.status).unwrap_or_default()
    }

    /// Parsed `content` blob. Text that is not JSON is returned as a JSON string.
    pub fn content_value(&self) -> Option<Value> {
        self.content.as_deref().map(|raw| {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
        })
    }

    /// Convert to API material type
    pub fn to_api(&self) -> Material {
        Material {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            material_type: self.kind(),
            status: self.publish_status(),
            file_path: self.file_path.clone(),
            file_url: self.file_path.as_deref().map(StorageService::public_url),
            content: self.content_value(),
            source_material_id: self.source_material_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Fields for a new material row
#[derive(Debug, Clone)]
pub struct NewMaterial {
    pub title: String,
    pub description: Option<String>,
    pub material_type: MaterialType,
    pub status: MaterialStatus,
    pub file_path: Option<String>,
    pub content: Option<String>,
    pub source_material_id: Option<i64>,
}

/// Question row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbQuestion {
    pub id: i64,
    pub material_id: i64,
    pub question: String,
    #[sqlx(rename = "type")]
    pub question_type: String,
    pub correct_answer: String,
    pub options: Option<String>,
    pub explanation: Option<String>,
    pub position: i64,
}

impl DbQuestion {
    pub fn kind(&self) -> QuestionType {
        QuestionType::from_str(&self.question_type).unwrap_or_default()
    }

    pub fn to_api(&self) -> Question {
        Question {
            id: self.id,
            material_id: self.material_id,
            question: self.question.clone(),
            question_type: self.kind(),
            correct_answer: self.correct_answer.clone(),
            options: parse_options(self.id, self.options.as_deref()),
            explanation: self.explanation.clone(),
            position: self.position,
        }
    }

    /// Question as shown to someone taking the quiz (no answer, no explanation).
    pub fn to_quiz_item(&self) -> QuizItem {
        QuizItem {
            id: self.id,
            question: self.question.clone(),
            question_type: self.kind(),
            options: parse_options(self.id, self.options.as_deref()),
        }
    }
}

/// Decode the stored `options` column into a list.
///
/// Absent or blank → empty list. Values written twice-encoded (a JSON string
/// holding a JSON array) are unwrapped once. Unreadable values are logged and
/// treated as empty.
pub fn parse_options(question_id: i64, raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Vec::new();
    };

    let value = match serde_json::from_str::<Value>(raw) {
        Ok(Value::String(inner)) => serde_json::from_str::<Value>(&inner).ok(),
        Ok(value) => Some(value),
        Err(_) => None,
    };

    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
        _ => {
            tracing::warn!(question_id, "question options are not a JSON list; returning none");
            Vec::new()
        }
    }
}

/// Fields for a new question row
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub question: String,
    pub question_type: QuestionType,
    pub correct_answer: String,
    pub options: Vec<String>,
    pub explanation: Option<String>,
}

impl NewQuestion {
    /// JSON text for the `options` column; `None` when there are no options.
    pub fn options_json(&self) -> Option<String> {
        if self.options.is_empty() {
            None
        } else {
            serde_json::to_string(&self.options).ok()
        }
    }
}

impl From<sensei_core::GeneratedQuestion> for NewQuestion {
    fn from(q: sensei_core::GeneratedQuestion) -> Self {
        Self {
            question: q.question,
            question_type: q.question_type,
            correct_answer: q.correct_answer,
            options: q.options,
            explanation: q.explanation,
        }
    }
}

/// Legacy quiz row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbQuiz {
    pub id: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Per-user progress on one piece of content
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbProgress {
    pub id: i64,
    pub user_id: String,
    pub content_id: String,
    pub completed: bool,
    pub progress_percent: f64,
    pub score: Option<f64>,
    pub attempts: i64,
    pub time_spent_seconds: i64,
    pub updated_at: DateTime<Utc>,
}

impl DbProgress {
    /// Empty progress record for a user/content pair.
    pub fn new_for(user_id: &str, content_id: &str) -> Self {
        Self {
            id: 0,
            user_id: user_id.to_string(),
            content_id: content_id.to_string(),
            completed: false,
            progress_percent: 0.0,
            score: None,
            attempts: 0,
            time_spent_seconds: 0,
            updated_at: Utc::now(),
        }
    }
}

/// Coaching message row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbAdvice {
    pub id: i64,
    pub user_id: String,
    #[sqlx(rename = "type")]
    pub advice_type: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl DbAdvice {
    pub fn to_api(&self) -> Advice {
        Advice {
            id: self.id,
            user_id: self.user_id.clone(),
            advice_type: AdviceType::from_str(&self.advice_type).unwrap_or_default(),
            content: self.content.clone(),
            created_at: self.created_at,
        }
    }
}

/// Aggregate progress for a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub user_id: String,
    pub total_items: i64,
    pub completed_items: i64,
    pub average_score: Option<f64>,
    pub total_time_spent_seconds: i64,
}

// === API Types ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub material_type: MaterialType,
    pub status: MaterialStatus,
    pub file_path: Option<String>,
    pub file_url: Option<String>,
    pub content: Option<Value>,
    pub source_material_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub material_id: i64,
    pub question: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub correct_answer: String,
    pub options: Vec<String>,
    pub explanation: Option<String>,
    pub position: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizItem {
    pub id: i64,
    pub question: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Advice {
    pub id: i64,
    pub user_id: String,
    #[serde(rename = "type")]
    pub advice_type: AdviceType,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// `{ "success": true, ...payload }`
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

// Material types
#[derive(Debug, Serialize, Deserialize)]
pub struct MaterialListQuery {
    #[serde(rename = "type")]
    pub material_type: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateMaterialRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub material_type: Option<String>,
    pub status: Option<String>,
    pub file_path: Option<String>,
    pub content: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateMaterialRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub file_path: Option<String>,
    pub content: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MaterialResponse {
    pub material: Material,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MaterialListResponse {
    pub materials: Vec<Material>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusChangeResponse {
    pub changed: bool,
    pub message: String,
    pub material: Material,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub id: i64,
    pub message: String,
    /// Whether an associated file was removed from the public directory.
    pub file_removed: bool,
}

// Question types
#[derive(Debug, Serialize, Deserialize)]
pub struct QuestionRequest {
    pub question: Option<String>,
    #[serde(rename = "type")]
    pub question_type: Option<String>,
    pub correct_answer: Option<String>,
    pub options: Option<Vec<String>>,
    pub explanation: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub question: Question,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuestionListResponse {
    pub material_id: i64,
    pub questions: Vec<Question>,
}

// Quiz types
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateQuizRequest {
    pub material_id: Option<i64>,
    pub question_count: Option<usize>,
    pub title: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeneratedQuizResponse {
    pub material: Material,
    pub questions: Vec<Question>,
    /// Repair stage the model output needed before it parsed.
    pub repair_stage: sensei_core::RepairStage,
    /// Entries dropped during validation.
    pub rejected: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuizView {
    pub material: Material,
    pub questions: Vec<QuizItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitQuizRequest {
    pub user_id: Option<String>,
    #[serde(default)]
    pub answers: HashMap<i64, String>,
    pub time_spent_seconds: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitQuizResponse {
    pub grade: QuizGrade,
    pub progress: DbProgress,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateLegacyQuizRequest {
    pub title: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LegacyQuizResponse {
    pub quiz: DbQuiz,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LegacyQuizListResponse {
    pub quizzes: Vec<DbQuiz>,
}

// Audio types
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateAudioRequest {
    pub material_id: Option<i64>,
    pub title: Option<String>,
}

// Upload types
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub material: Material,
    pub file_name: String,
    pub size: usize,
}

// Progress types
#[derive(Debug, Serialize, Deserialize)]
pub struct UserQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateProgressRequest {
    pub user_id: Option<String>,
    pub content_id: Option<String>,
    pub completed: Option<bool>,
    pub progress_percent: Option<f64>,
    pub score: Option<f64>,
    pub time_spent_seconds: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub progress: DbProgress,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressListResponse {
    pub progress: Vec<DbProgress>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressSummaryResponse {
    pub summary: ProgressSummary,
}

// Advice types
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateAdviceRequest {
    pub user_id: Option<String>,
    #[serde(rename = "type")]
    pub advice_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdviceResponse {
    pub advice: Advice,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdviceListResponse {
    pub advice: Vec<Advice>,
}
