//! AI content pipelines: quizzes, audio lectures and coaching advice.
//!
//! Each pipeline reads a source from the database, calls the configured
//! vendors and persists the result. Nothing is written until every vendor
//! call has succeeded.

use serde_json::json;
use sensei_core::{GeneratedQuiz, RepairStage};

use crate::error::{ApiError, Result};
use crate::models::*;
use crate::services::ai::AiError;
use crate::services::pdf;
use crate::services::storage::{StorageService, AUDIO_DIR};
use crate::AppState;

pub const DEFAULT_QUESTION_COUNT: usize = 5;
pub const MAX_QUESTION_COUNT: usize = 20;

/// Progress rows included in an advice prompt.
const ADVICE_HISTORY_LIMIT: usize = 10;

const QUIZ_SYSTEM_PROMPT: &str = "You are a Scrum trainer who writes exam-style quiz questions. \
Reply with JSON only, no Markdown and no commentary.";

const LECTURE_SYSTEM_PROMPT: &str = "You are a friendly Scrum coach recording a short audio lecture. \
Write plain spoken text only: no headings, lists, Markdown or stage directions.";

const ADVICE_SYSTEM_PROMPT: &str = "You are a supportive Scrum learning coach. \
Answer in two to four sentences of plain text addressed directly to the learner.";

/// Outcome of a quiz generation run.
pub struct QuizGeneration {
    pub material: DbMaterial,
    pub questions: Vec<DbQuestion>,
    pub repair_stage: RepairStage,
    pub rejected: Vec<String>,
}

/// Generate a quiz from a PDF or text material and store it as a draft.
pub async fn generate_quiz(
    state: &AppState,
    material_id: i64,
    question_count: usize,
    title: Option<String>,
) -> Result<QuizGeneration> {
    if !(1..=MAX_QUESTION_COUNT).contains(&question_count) {
        return Err(ApiError::BadRequest(format!(
            "question_count must be between 1 and {MAX_QUESTION_COUNT}"
        )));
    }

    let llm = state.llm()?;
    let source = load_source(state, material_id).await?;
    let text = source_text(state, &source).await?;

    let raw = llm
        .generate(QUIZ_SYSTEM_PROMPT, &quiz_prompt(&text, question_count))
        .await?;

    let (mut quiz, repair_stage) = GeneratedQuiz::from_model_output(&raw).map_err(|e| {
        tracing::warn!(material_id, error = %e, "Model output could not be turned into a quiz");
        AiError::UnexpectedShape(format!("model output was not a usable quiz: {e}"))
    })?;

    if !quiz.rejected.is_empty() {
        tracing::warn!(material_id, rejected = ?quiz.rejected, "Dropped invalid generated questions");
    }
    if quiz.questions.len() < question_count {
        tracing::info!(
            material_id,
            requested = question_count,
            received = quiz.questions.len(),
            "Model returned fewer questions than requested"
        );
    }
    quiz.truncate(question_count);

    let title = non_blank(title)
        .or_else(|| quiz.title.clone())
        .unwrap_or_else(|| format!("Quiz: {}", source.title));

    let material = NewMaterial {
        title,
        description: Some(format!("Generated from \"{}\"", source.title)),
        material_type: MaterialType::Quiz,
        status: MaterialStatus::Draft,
        file_path: None,
        content: Some(
            json!({
                "source_material_id": source.id,
                "question_count": quiz.questions.len(),
                "repair_stage": repair_stage,
            })
            .to_string(),
        ),
        source_material_id: Some(source.id),
    };
    let questions: Vec<NewQuestion> = quiz.questions.into_iter().map(NewQuestion::from).collect();

    let (material, questions) = state.db.create_quiz_with_questions(&material, &questions).await?;

    tracing::info!(
        quiz_id = material.id,
        source_id = source.id,
        questions = questions.len(),
        stage = ?repair_stage,
        "Generated quiz"
    );

    Ok(QuizGeneration {
        material,
        questions,
        repair_stage,
        rejected: quiz.rejected,
    })
}

/// Generate a lecture script and its narration, then store both as a draft audio material.
///
/// Files written for a generation are removed again if the database insert fails.
pub async fn generate_audio_lecture(
    state: &AppState,
    material_id: i64,
    title: Option<String>,
) -> Result<DbMaterial> {
    let llm = state.llm()?;
    let tts = state.tts()?;
    let source = load_source(state, material_id).await?;
    let text = source_text(state, &source).await?;

    let script = llm
        .generate(LECTURE_SYSTEM_PROMPT, &lecture_prompt(&source.title, &text))
        .await?
        .trim()
        .to_string();

    let audio = tts.synthesize(&script).await?;

    let title = non_blank(title).unwrap_or_else(|| format!("Lecture: {}", source.title));
    let audio_key = StorageService::make_key(AUDIO_DIR, "mp3");
    let script_key = script_key_for(&audio_key);

    let script_doc = json!({
        "title": title,
        "source_material_id": source.id,
        "script": script,
        "generated_at": chrono::Utc::now(),
    });
    let script_bytes = serde_json::to_vec_pretty(&script_doc)
        .map_err(|e| ApiError::Internal(format!("serialize lecture script: {e}")))?;

    state.storage.save_file(&audio_key, &audio).await?;
    if let Err(e) = state.storage.save_file(&script_key, &script_bytes).await {
        state.storage.delete_file_best_effort(&audio_key).await;
        return Err(e.into());
    }

    let material = NewMaterial {
        title,
        description: Some(format!("Audio lecture generated from \"{}\"", source.title)),
        material_type: MaterialType::Audio,
        status: MaterialStatus::Draft,
        file_path: Some(audio_key.clone()),
        content: Some(
            json!({
                "script": script,
                "script_path": script_key,
            })
            .to_string(),
        ),
        source_material_id: Some(source.id),
    };

    match state.db.create_material(&material).await {
        Ok(stored) => {
            tracing::info!(
                audio_id = stored.id,
                source_id = source.id,
                bytes = audio.len(),
                "Generated audio lecture"
            );
            Ok(stored)
        }
        Err(e) => {
            state.storage.delete_file_best_effort(&audio_key).await;
            state.storage.delete_file_best_effort(&script_key).await;
            Err(e)
        }
    }
}

/// Generate coaching advice from a user's recorded progress.
pub async fn generate_advice(
    state: &AppState,
    user_id: &str,
    advice_type: AdviceType,
) -> Result<DbAdvice> {
    let llm = state.llm()?;

    let summary = state.db.progress_summary(user_id).await?;
    let history = state.db.list_progress(user_id).await?;

    let prompt = advice_prompt(&summary, &history, advice_type);
    let content = llm.generate(ADVICE_SYSTEM_PROMPT, &prompt).await?.trim().to_string();
    if content.is_empty() {
        return Err(AiError::UnexpectedShape("model returned empty advice".to_string()).into());
    }

    let advice = state.db.insert_advice(user_id, advice_type, &content).await?;
    tracing::info!(advice_id = advice.id, user_id, kind = advice_type.as_str(), "Generated advice");
    Ok(advice)
}

/// Load a material usable as generation input (PDF or text).
async fn load_source(state: &AppState, material_id: i64) -> Result<DbMaterial> {
    let material = state
        .db
        .get_material(material_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Material {material_id} not found")))?;

    if !material.kind().is_generation_source() {
        return Err(ApiError::BadRequest(format!(
            "Material {} is a {} material; only pdf and text materials can be used as a source",
            material.id,
            material.kind().as_str()
        )));
    }

    Ok(material)
}

/// Text of a source material, cut to the configured prompt budget.
pub async fn source_text(state: &AppState, material: &DbMaterial) -> Result<String> {
    let text = match material.kind() {
        MaterialType::Pdf => {
            let key = material.file_path.as_deref().ok_or_else(|| {
                ApiError::BadRequest(format!("Material {} has no stored file", material.id))
            })?;
            let bytes = state.storage.read_file(key).await?;
            pdf::extract_text(bytes)
                .await
                .map_err(|e| ApiError::BadRequest(format!("Material {}: {e}", material.id)))?
        }
        _ => text_content(material),
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Material {} has no text to generate from",
            material.id
        )));
    }

    Ok(clip_chars(text, state.config.max_source_chars).to_string())
}

/// Text held in a material's `content` column.
///
/// A JSON string is unwrapped; an object contributes its `text` or `body` field.
fn text_content(material: &DbMaterial) -> String {
    match material.content_value() {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Object(map)) => ["text", "body"]
            .iter()
            .find_map(|k| map.get(*k).and_then(|v| v.as_str()))
            .map(str::to_string)
            .unwrap_or_default(),
        _ => String::new(),
    }
}

fn clip_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// `audio/x.mp3` → `audio/x.json`
fn script_key_for(audio_key: &str) -> String {
    match audio_key.rsplit_once('.') {
        Some((stem, _)) => format!("{stem}.json"),
        None => format!("{audio_key}.json"),
    }
}

fn quiz_prompt(text: &str, question_count: usize) -> String {
    format!(
        r#"Write {question_count} quiz questions that test understanding of the material below.

Return a JSON object of this form:
{{"title": "short quiz title",
  "questions": [
    {{"question": "...",
      "type": "multiple_choice" | "true_false" | "short_answer",
      "options": ["...", "...", "...", "..."],
      "correct_answer": "exact text of the correct option",
      "explanation": "one sentence on why"}}
  ]}}

Multiple choice questions have four options. True/false questions use the options ["True", "False"]. Short answer questions have no options.

Material:
"""
{text}
""""#
    )
}

fn lecture_prompt(title: &str, text: &str) -> String {
    format!(
        "Write a three to five minute spoken lecture titled \"{title}\" that explains the key ideas \
         of the material below to a Scrum learner. Open with what they will learn and close with a \
         short recap.\n\nMaterial:\n\"\"\"\n{text}\n\"\"\""
    )
}

fn advice_prompt(summary: &ProgressSummary, history: &[DbProgress], advice_type: AdviceType) -> String {
    let mut prompt = format!(
        "Learner progress:\n- items started: {}\n- items completed: {}\n- average quiz score: {}\n- total study time: {} minutes\n",
        summary.total_items,
        summary.completed_items,
        summary
            .average_score
            .map(|s| format!("{s:.0}%"))
            .unwrap_or_else(|| "no quizzes taken".to_string()),
        summary.total_time_spent_seconds / 60,
    );

    if !history.is_empty() {
        prompt.push_str("\nRecent activity:\n");
        for item in history.iter().take(ADVICE_HISTORY_LIMIT) {
            prompt.push_str(&format!(
                "- content {}: {:.0}% done{}{}\n",
                item.content_id,
                item.progress_percent,
                item.score.map(|s| format!(", score {s:.0}%")).unwrap_or_default(),
                if item.attempts > 1 {
                    format!(", {} attempts", item.attempts)
                } else {
                    String::new()
                },
            ));
        }
    }

    prompt.push('\n');
    prompt.push_str(advice_type.focus());
    prompt
}
