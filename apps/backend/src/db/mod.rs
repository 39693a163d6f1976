//! SQLite database operations

use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::error::Result;
use crate::models::*;

const MATERIAL_COLUMNS: &str = "id, title, description, type, status, file_path, content, \
                                source_material_id, created_at, updated_at";
const QUESTION_COLUMNS: &str =
    "id, material_id, question, type, correct_answer, options, explanation, position";
const PROGRESS_COLUMNS: &str = "id, user_id, content_id, completed, progress_percent, score, \
                                attempts, time_spent_seconds, updated_at";

/// Filters for listing materials
#[derive(Debug, Clone, Copy, Default)]
pub struct MaterialFilter {
    pub material_type: Option<MaterialType>,
    pub status: Option<MaterialStatus>,
}

/// Database wrapper with connection pool
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the SQLite database and build the pool.
    ///
    /// The parent directory of a file-backed database is created as well.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(sqlx::Error::Io)?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every pooled connection. Used on shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // === Material Repository ===

    pub async fn create_material(&self, material: &NewMaterial) -> Result<DbMaterial> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, DbMaterial>(&format!(
            r#"
            INSERT INTO materials (title, description, type, status, file_path, content,
                                   source_material_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {MATERIAL_COLUMNS}
            "#
        ))
        .bind(&material.title)
        .bind(&material.description)
        .bind(material.material_type.as_str())
        .bind(material.status.as_str())
        .bind(&material.file_path)
        .bind(&material.content)
        .bind(material.source_material_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_material(&self, id: i64) -> Result<Option<DbMaterial>> {
        let row = sqlx::query_as::<_, DbMaterial>(&format!(
            "SELECT {MATERIAL_COLUMNS} FROM materials WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// List materials, newest first.
    pub async fn list_materials(&self, filter: MaterialFilter) -> Result<Vec<DbMaterial>> {
        let material_type = filter.material_type.map(|t| t.as_str());
        let status = filter.status.map(|s| s.as_str());

        let rows = sqlx::query_as::<_, DbMaterial>(&format!(
            r#"
            SELECT {MATERIAL_COLUMNS}
            FROM materials
            WHERE (? IS NULL OR type = ?)
              AND (? IS NULL OR status = ?)
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(material_type)
        .bind(material_type)
        .bind(status)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Write back the editable fields of a material and bump `updated_at`.
    pub async fn update_material(&self, material: &DbMaterial) -> Result<Option<DbMaterial>> {
        let row = sqlx::query_as::<_, DbMaterial>(&format!(
            r#"
            UPDATE materials
            SET title = ?, description = ?, file_path = ?, content = ?, updated_at = ?
            WHERE id = ?
            RETURNING {MATERIAL_COLUMNS}
            "#
        ))
        .bind(&material.title)
        .bind(&material.description)
        .bind(&material.file_path)
        .bind(&material.content)
        .bind(Utc::now())
        .bind(material.id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn set_material_status(
        &self,
        id: i64,
        status: MaterialStatus,
    ) -> Result<Option<DbMaterial>> {
        let row = sqlx::query_as::<_, DbMaterial>(&format!(
            r#"
            UPDATE materials
            SET status = ?, updated_at = ?
            WHERE id = ?
            RETURNING {MATERIAL_COLUMNS}
            "#
        ))
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Delete a material and its questions in one transaction.
    ///
    /// # Returns
    /// false if no material had that id
    pub async fn delete_material(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM questions WHERE material_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM materials WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    // === Question Repository ===

    pub async fn list_questions(&self, material_id: i64) -> Result<Vec<DbQuestion>> {
        let rows = sqlx::query_as::<_, DbQuestion>(&format!(
            r#"
            SELECT {QUESTION_COLUMNS}
            FROM questions
            WHERE material_id = ?
            ORDER BY position, id
            "#
        ))
        .bind(material_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn get_question(&self, id: i64) -> Result<Option<DbQuestion>> {
        let row = sqlx::query_as::<_, DbQuestion>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Append a question to the end of a material's list.
    pub async fn insert_question(&self, material_id: i64, question: &NewQuestion) -> Result<DbQuestion> {
        let row = sqlx::query_as::<_, DbQuestion>(&format!(
            r#"
            INSERT INTO questions (material_id, question, type, correct_answer, options, explanation, position)
            VALUES (?, ?, ?, ?, ?, ?,
                    (SELECT COALESCE(MAX(position) + 1, 0) FROM questions WHERE material_id = ?))
            RETURNING {QUESTION_COLUMNS}
            "#
        ))
        .bind(material_id)
        .bind(&question.question)
        .bind(question.question_type.as_str())
        .bind(&question.correct_answer)
        .bind(question.options_json())
        .bind(&question.explanation)
        .bind(material_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn update_question(&self, id: i64, question: &NewQuestion) -> Result<Option<DbQuestion>> {
        let row = sqlx::query_as::<_, DbQuestion>(&format!(
            r#"
            UPDATE questions
            SET question = ?, type = ?, correct_answer = ?, options = ?, explanation = ?
            WHERE id = ?
            RETURNING {QUESTION_COLUMNS}
            "#
        ))
        .bind(&question.question)
        .bind(question.question_type.as_str())
        .bind(&question.correct_answer)
        .bind(question.options_json())
        .bind(&question.explanation)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn delete_question(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM questions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Insert a quiz material and all its questions atomically.
    ///
    /// Either the material and every question are stored, or nothing is.
    pub async fn create_quiz_with_questions(
        &self,
        material: &NewMaterial,
        questions: &[NewQuestion],
    ) -> Result<(DbMaterial, Vec<DbQuestion>)> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let stored = sqlx::query_as::<_, DbMaterial>(&format!(
            r#"
            INSERT INTO materials (title, description, type, status, file_path, content,
                                   source_material_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {MATERIAL_COLUMNS}
            "#
        ))
        .bind(&material.title)
        .bind(&material.description)
        .bind(material.material_type.as_str())
        .bind(material.status.as_str())
        .bind(&material.file_path)
        .bind(&material.content)
        .bind(material.source_material_id)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let mut stored_questions = Vec::with_capacity(questions.len());
        for (position, question) in questions.iter().enumerate() {
            let row = sqlx::query_as::<_, DbQuestion>(&format!(
                r#"
                INSERT INTO questions (material_id, question, type, correct_answer, options, explanation, position)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                RETURNING {QUESTION_COLUMNS}
                "#
            ))
            .bind(stored.id)
            .bind(&question.question)
            .bind(question.question_type.as_str())
            .bind(&question.correct_answer)
            .bind(question.options_json())
            .bind(&question.explanation)
            .bind(position as i64)
            .fetch_one(&mut *tx)
            .await?;
            stored_questions.push(row);
        }

        tx.commit().await?;
        Ok((stored, stored_questions))
    }

    // === Legacy Quiz Repository ===

    pub async fn create_legacy_quiz(&self, title: &str) -> Result<DbQuiz> {
        let row = sqlx::query_as::<_, DbQuiz>(
            r#"
            INSERT INTO quizzes (title, created_at)
            VALUES (?, ?)
            RETURNING id, title, created_at
            "#,
        )
        .bind(title)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn list_legacy_quizzes(&self) -> Result<Vec<DbQuiz>> {
        let rows = sqlx::query_as::<_, DbQuiz>(
            "SELECT id, title, created_at FROM quizzes ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // === Progress Repository ===

    pub async fn get_progress(&self, user_id: &str, content_id: &str) -> Result<Option<DbProgress>> {
        let row = sqlx::query_as::<_, DbProgress>(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM progress WHERE user_id = ? AND content_id = ?"
        ))
        .bind(user_id)
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Insert or replace the record for `(user_id, content_id)`.
    pub async fn upsert_progress(&self, progress: &DbProgress) -> Result<DbProgress> {
        let row = sqlx::query_as::<_, DbProgress>(&format!(
            r#"
            INSERT INTO progress (user_id, content_id, completed, progress_percent, score,
                                  attempts, time_spent_seconds, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (user_id, content_id) DO UPDATE SET
                completed = excluded.completed,
                progress_percent = excluded.progress_percent,
                score = excluded.score,
                attempts = excluded.attempts,
                time_spent_seconds = excluded.time_spent_seconds,
                updated_at = excluded.updated_at
            RETURNING {PROGRESS_COLUMNS}
            "#
        ))
        .bind(&progress.user_id)
        .bind(&progress.content_id)
        .bind(progress.completed)
        .bind(progress.progress_percent)
        .bind(progress.score)
        .bind(progress.attempts)
        .bind(progress.time_spent_seconds)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// All progress records for a user, most recently updated first.
    pub async fn list_progress(&self, user_id: &str) -> Result<Vec<DbProgress>> {
        let rows = sqlx::query_as::<_, DbProgress>(&format!(
            r#"
            SELECT {PROGRESS_COLUMNS}
            FROM progress
            WHERE user_id = ?
            ORDER BY updated_at DESC, id DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn progress_summary(&self, user_id: &str) -> Result<ProgressSummary> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total_items,
                   COALESCE(SUM(CASE WHEN completed THEN 1 ELSE 0 END), 0) AS completed_items,
                   AVG(score) AS average_score,
                   COALESCE(SUM(time_spent_seconds), 0) AS total_time_spent_seconds
            FROM progress
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(ProgressSummary {
            user_id: user_id.to_string(),
            total_items: row.try_get("total_items")?,
            completed_items: row.try_get("completed_items")?,
            average_score: row.try_get("average_score")?,
            total_time_spent_seconds: row.try_get("total_time_spent_seconds")?,
        })
    }

    // === Advice Repository ===

    pub async fn insert_advice(
        &self,
        user_id: &str,
        advice_type: AdviceType,
        content: &str,
    ) -> Result<DbAdvice> {
        let row = sqlx::query_as::<_, DbAdvice>(
            r#"
            INSERT INTO advice (user_id, type, content, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, user_id, type, content, created_at
            "#,
        )
        .bind(user_id)
        .bind(advice_type.as_str())
        .bind(content)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Advice for a user, newest first.
    pub async fn list_advice(&self, user_id: &str) -> Result<Vec<DbAdvice>> {
        let rows = sqlx::query_as::<_, DbAdvice>(
            r#"
            SELECT id, user_id, type, content, created_at
            FROM advice
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn delete_advice(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM advice WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
