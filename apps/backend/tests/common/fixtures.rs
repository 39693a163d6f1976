//! Request bodies and canned model output.

use serde_json::{json, Value};

pub const SCRUM_NOTES: &str = "Scrum defines three accountabilities: the Product Owner, \
the Scrum Master and the Developers. The Product Owner orders the Product Backlog. \
Each Sprint ends with a Sprint Review and a Sprint Retrospective.";

/// Completion wrapped in prose and a Markdown fence.
pub const FENCED_QUIZ_REPLY: &str = r#"Here is your quiz:
```json
{
  "title": "Scrum Basics",
  "questions": [
    {
      "question": "Who orders the Product Backlog?",
      "type": "multiple_choice",
      "options": ["Scrum Master", "Product Owner", "Developers", "Stakeholders"],
      "correct_answer": "B",
      "explanation": "The Product Owner is accountable for ordering the backlog."
    },
    {
      "question": "The Sprint Retrospective happens before the Sprint Review.",
      "type": "true_false",
      "correct_answer": false
    },
    {
      "question": "Which event is used to inspect the Increment with stakeholders?",
      "type": "short_answer",
      "correct_answer": "Sprint Review"
    }
  ]
}
```
Good luck!"#;

pub const LECTURE_SCRIPT: &str = "Welcome! Today we look at the three Scrum accountabilities.";

/// Bytes that pass the upload check (PDF header) without being a full document.
pub fn pdf_bytes() -> Vec<u8> {
    b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\ntrailer\n<< /Root 1 0 R >>\n%%EOF\n".to_vec()
}

pub fn create_material_request(title: &str, material_type: &str, content: Value) -> Value {
    json!({
        "title": title,
        "type": material_type,
        "content": content,
    })
}

pub fn question_request(question: &str, kind: &str, answer: &str, options: &[&str]) -> Value {
    json!({
        "question": question,
        "type": kind,
        "correct_answer": answer,
        "options": options,
    })
}

pub fn progress_request(user_id: &str, content_id: &str, percent: f64) -> Value {
    json!({
        "user_id": user_id,
        "content_id": content_id,
        "progress_percent": percent,
    })
}
