//! Best-effort recovery of JSON produced by language models.
//!
//! Completions are often wrapped in Markdown fences, carry stray backslashes
//! or raw newlines inside strings, miss commas between values, or are cut off
//! mid-object. [`salvage_json`] runs a fixed series of repairs and returns the
//! first one that parses, falling back to regex extraction of quiz fields.
//!
//! The input is only ever treated as data. The result is untrusted and must be
//! validated by the caller (see [`crate::quiz::GeneratedQuiz::from_value`]).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::SalvageError;

/// Repair stage that produced a parseable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStage {
    /// Input was valid JSON as given.
    Strict,
    /// Valid after removing fences, labels and surrounding prose.
    Unwrapped,
    /// Valid after escaping stray backslashes and control characters.
    Sanitized,
    /// Valid after structural repair (commas, closers, truncation).
    Repaired,
    /// Rebuilt from regex-extracted question fragments.
    Extracted,
}

/// A recovered value and how it was obtained.
#[derive(Debug, Clone)]
pub struct Salvaged {
    pub value: Value,
    pub stage: RepairStage,
}

/// Recover a JSON value from possibly malformed model output.
pub fn salvage_json(raw: &str) -> Result<Salvaged, SalvageError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SalvageError::Empty);
    }

    let mut last_error = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => {
            return Ok(Salvaged {
                value,
                stage: RepairStage::Strict,
            })
        }
        Err(e) => e.to_string(),
    };

    let unwrapped = strip_wrappers(trimmed);
    let sanitized = sanitize_strings(&unwrapped);
    let repaired = repair_structure(&sanitized);

    let attempts = [
        (unwrapped.as_str(), RepairStage::Unwrapped),
        (sanitized.as_str(), RepairStage::Sanitized),
        (repaired.as_str(), RepairStage::Repaired),
    ];
    for (candidate, stage) in attempts {
        match serde_json::from_str::<Value>(candidate) {
            Ok(value) => return Ok(Salvaged { value, stage }),
            Err(e) => last_error = e.to_string(),
        }
    }

    match extract_quiz_fragments(trimmed) {
        Some(value) => Ok(Salvaged {
            value,
            stage: RepairStage::Extracted,
        }),
        None => Err(SalvageError::Unrecoverable(last_error)),
    }
}

/// Remove Markdown fences, a leading `json` label and prose around the payload.
fn strip_wrappers(input: &str) -> String {
    let mut text = input;

    if let Some(fence) = text.find("```") {
        let after_fence = &text[fence + 3..];
        // skip the language tag on the opening fence line
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(after_fence.len());
        let body = &after_fence[body_start..];
        text = match body.find("```") {
            Some(end) => &body[..end],
            None => body,
        };
    }

    let mut text = text.trim();
    for label in ["json:", "JSON:", "json", "JSON"] {
        if let Some(rest) = text.strip_prefix(label) {
            text = rest.trim_start();
            break;
        }
    }

    let Some(start) = text.find(['{', '[']) else {
        return text.to_string();
    };
    let body = &text[start..];
    match balanced_end(body) {
        Some(end) => body[..end].to_string(),
        None => body.to_string(),
    }
}

/// Byte offset just past the first complete top-level value, if it completes.
fn balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, c) in s.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(idx + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Escape stray backslashes, raw control characters and unescaped inner quotes
/// inside string literals.
fn sanitize_strings(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 16);
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if !in_string {
            out.push(c);
            if c == '"' {
                in_string = true;
            }
            i += 1;
            continue;
        }

        match c {
            '\\' => match chars.get(i + 1) {
                Some('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't') => {
                    out.push(c);
                    out.push(chars[i + 1]);
                    i += 2;
                    continue;
                }
                Some('u') if is_unicode_escape(&chars[i + 2..]) => {
                    out.push(c);
                    i += 1;
                    continue;
                }
                _ => out.push_str("\\\\"),
            },
            '"' => {
                if closes_string(&chars[i + 1..]) {
                    in_string = false;
                    out.push('"');
                } else {
                    out.push_str("\\\"");
                }
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
        i += 1;
    }

    out
}

fn is_unicode_escape(rest: &[char]) -> bool {
    rest.len() >= 4 && rest[..4].iter().all(|c| c.is_ascii_hexdigit())
}

/// A quote closes its string when the next significant character could follow
/// a complete string value or key. A bare key (`name:`) also counts, so a
/// missing comma before an unquoted key does not swallow the rest of the object.
fn closes_string(rest: &[char]) -> bool {
    let Some(start) = rest.iter().position(|c| !c.is_whitespace()) else {
        return true;
    };
    match rest[start] {
        ',' | ':' | '}' | ']' | '"' => true,
        c if c.is_ascii_alphabetic() || matches!(c, '_' | '$') => {
            let end = rest[start..]
                .iter()
                .position(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '$')))
                .map_or(rest.len(), |n| start + n);
            next_significant(&rest[end..]) == Some(':')
        }
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Key,
    Colon,
    Value,
    AfterValue,
}

#[derive(Debug)]
struct Frame {
    closer: char,
    slot: Slot,
    /// Output offset where the current member or element began.
    item_start: usize,
    /// Output offset of a bare literal in the current item, if any.
    literal_start: Option<usize>,
}

impl Frame {
    fn is_object(&self) -> bool {
        self.closer == '}'
    }

    fn reset_item(&mut self, at: usize) {
        self.slot = if self.is_object() { Slot::Key } else { Slot::Value };
        self.item_start = at;
        self.literal_start = None;
    }
}

/// Structural repair over already-sanitised text.
///
/// Inserts missing commas and colons, quotes bare object keys, drops trailing
/// and doubled commas, skips stray closers, and at end of input closes an open
/// string, removes an incomplete trailing member and appends missing closers.
fn repair_structure(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 8);
    let mut stack: Vec<Frame> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        match c {
            c if c.is_whitespace() => out.push(c),
            '{' | '[' => {
                before_value(&mut stack, &mut out);
                out.push(c);
                let closer = if c == '{' { '}' } else { ']' };
                let mut frame = Frame {
                    closer,
                    slot: Slot::Value,
                    item_start: out.len(),
                    literal_start: None,
                };
                frame.reset_item(out.len());
                stack.push(frame);
            }
            '}' | ']' => {
                if stack.iter().any(|f| f.closer == c) {
                    while let Some(frame) = stack.pop() {
                        close_frame(&frame, &mut out);
                        if frame.closer == c {
                            break;
                        }
                    }
                    if let Some(parent) = stack.last_mut() {
                        parent.slot = Slot::AfterValue;
                    }
                }
            }
            '"' => {
                let is_key = if let Some(frame) = stack.last_mut().filter(|f| f.is_object()) {
                    match frame.slot {
                        Slot::AfterValue => {
                            out.push(',');
                            frame.reset_item(out.len());
                            true
                        }
                        Slot::Key => true,
                        Slot::Colon => {
                            out.push(':');
                            false
                        }
                        Slot::Value => false,
                    }
                } else {
                    before_value(&mut stack, &mut out);
                    false
                };
                if let Some(frame) = stack.last_mut() {
                    frame.slot = if is_key { Slot::Colon } else { Slot::AfterValue };
                }
                out.push('"');
                in_string = true;
            }
            ':' => {
                if let Some(frame) = stack.last_mut() {
                    if frame.is_object() && frame.slot == Slot::Colon {
                        out.push(':');
                        frame.slot = Slot::Value;
                    }
                }
            }
            ',' => match stack.last_mut() {
                Some(frame) if frame.slot == Slot::AfterValue => {
                    out.push(',');
                    frame.reset_item(out.len());
                }
                Some(_) => {}
                None => out.push(','),
            },
            c if is_literal_char(c) => {
                let start = i;
                while i < chars.len() && is_literal_char(chars[i]) {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();

                let bare_key = matches!(
                    stack.last(),
                    Some(frame) if frame.is_object() && matches!(frame.slot, Slot::Key | Slot::AfterValue)
                ) && i < chars.len()
                    && next_significant(&chars[i..]) == Some(':');

                if bare_key {
                    if let Some(frame) = stack.last_mut() {
                        if frame.slot == Slot::AfterValue {
                            out.push(',');
                            frame.reset_item(out.len());
                        }
                        frame.slot = Slot::Colon;
                    }
                    out.push('"');
                    out.push_str(&literal);
                    out.push('"');
                } else {
                    let needs_colon = matches!(
                        stack.last(),
                        Some(frame) if frame.is_object() && frame.slot == Slot::Colon
                    );
                    if needs_colon {
                        out.push(':');
                    } else {
                        before_value(&mut stack, &mut out);
                    }
                    if let Some(frame) = stack.last_mut() {
                        frame.literal_start = Some(out.len());
                        frame.slot = Slot::AfterValue;
                    }
                    out.push_str(&literal);
                }
                continue;
            }
            // anything else outside a string is noise
            _ => {}
        }
        i += 1;
    }

    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }

    while let Some(frame) = stack.pop() {
        let incomplete_member = frame.is_object() && matches!(frame.slot, Slot::Colon | Slot::Value);
        let invalid_literal = frame
            .literal_start
            .map(|start| serde_json::from_str::<Value>(out[start..].trim()).is_err())
            .unwrap_or(false);
        if incomplete_member || invalid_literal {
            out.truncate(frame.item_start);
        }
        close_frame(&frame, &mut out);
    }

    out
}

/// Prepare the enclosing frame for a new value, inserting a missing comma.
fn before_value(stack: &mut [Frame], out: &mut String) {
    if let Some(frame) = stack.last_mut() {
        match frame.slot {
            Slot::AfterValue => {
                out.push(',');
                frame.reset_item(out.len());
                if frame.is_object() {
                    // a value where a key belongs; keep it as the member value
                    frame.slot = Slot::Value;
                }
            }
            Slot::Colon => out.push(':'),
            Slot::Key | Slot::Value => {}
        }
        frame.literal_start = None;
        frame.slot = Slot::AfterValue;
    }
}

/// Append a frame's closer after dropping a trailing comma.
fn close_frame(frame: &Frame, out: &mut String) {
    let kept = out.trim_end().len();
    out.truncate(kept);
    if out.ends_with(',') {
        out.pop();
    }
    out.push(frame.closer);
}

fn is_literal_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.' | '_' | '$')
}

fn next_significant(rest: &[char]) -> Option<char> {
    rest.iter().copied().find(|c| !c.is_whitespace())
}

const STRING_BODY: &str = r#""((?:[^"\\]|\\.)*)""#;

static QUESTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""question"\s*:\s*""#).expect("valid regex"));
static OPTIONS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""(?:options|choices)"\s*:\s*\[([^\]]*)"#).expect("valid regex"));
static STRING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(STRING_BODY).expect("valid regex"));
static ANSWER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r#""(?:correct_answer|correctAnswer|answer)"\s*:\s*(?:{STRING_BODY}|(true|false|-?\d+))"#
    ))
    .expect("valid regex")
});
static EXPLANATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""explanation"\s*:\s*""#).expect("valid regex"));
static TYPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r#""type"\s*:\s*{STRING_BODY}"#)).expect("valid regex"));

/// Rebuild `{"questions": [...]}` from whatever question fragments survive.
///
/// Works on raw text, so it also recovers questions from output whose
/// structure repaired into something other than a quiz.
pub fn extract_quiz_fragments(text: &str) -> Option<Value> {
    let starts: Vec<usize> = QUESTION_RE.find_iter(text).map(|m| m.start()).collect();
    if starts.is_empty() {
        return None;
    }

    let mut questions = Vec::with_capacity(starts.len());
    for (n, &start) in starts.iter().enumerate() {
        let end = starts.get(n + 1).copied().unwrap_or(text.len());
        let block = &text[start..end];

        let Some(question) = QUESTION_RE
            .find(block)
            .map(|m| unescape(value_body(&block[m.end()..])))
        else {
            continue;
        };
        let mut entry = Map::new();
        entry.insert("question".to_string(), json!(question));

        if let Some(caps) = OPTIONS_RE.captures(block) {
            let options: Vec<String> = STRING_RE
                .captures_iter(&caps[1])
                .map(|c| unescape(&c[1]))
                .collect();
            entry.insert("options".to_string(), json!(options));
        }
        if let Some(caps) = ANSWER_RE.captures(block) {
            let answer = match (caps.get(1), caps.get(2)) {
                (Some(s), _) => json!(unescape(s.as_str())),
                (None, Some(lit)) => serde_json::from_str(lit.as_str()).unwrap_or(Value::Null),
                (None, None) => Value::Null,
            };
            entry.insert("correct_answer".to_string(), answer);
        }
        if let Some(m) = EXPLANATION_RE.find(block) {
            entry.insert("explanation".to_string(), json!(unescape(value_body(&block[m.end()..]))));
        }
        if let Some(caps) = TYPE_RE.captures(block) {
            entry.insert("type".to_string(), json!(unescape(&caps[1])));
        }

        questions.push(Value::Object(entry));
    }

    if questions.is_empty() {
        None
    } else {
        Some(json!({ "questions": questions }))
    }
}

/// Body of a free-text string value whose opening quote was just consumed.
///
/// A quote ends the value unless the text right after it continues the
/// sentence (a word or a colon on the same line). An unterminated value ends
/// at the line break.
fn value_body(rest: &str) -> &str {
    let mut escaped = false;
    for (idx, c) in rest.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '\n' => return &rest[..idx],
            '"' if ends_value(&rest[idx + 1..]) => return &rest[..idx],
            _ => {}
        }
    }
    rest
}

fn ends_value(after: &str) -> bool {
    match after.trim_start_matches(|c| c == ' ' || c == '\t').chars().next() {
        None | Some('\n' | '\r') => true,
        Some(c) => !(c.is_alphanumeric() || c == ':'),
    }
}

/// Decode JSON escapes in a captured body; raw inner quotes are kept.
fn unescape(body: &str) -> String {
    let mut quoted = String::with_capacity(body.len() + 2);
    quoted.push('"');
    let mut escaped = false;
    for c in body.chars() {
        if c == '"' && !escaped {
            quoted.push('\\');
        }
        escaped = c == '\\' && !escaped;
        quoted.push(c);
    }
    quoted.push('"');
    serde_json::from_str::<String>(&quoted).unwrap_or_else(|_| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_valid_json_passes_through() {
        let input = r#"{"title": "Sprint basics", "questions": [{"question": "Q?", "options": ["a", "b"]}]}"#;
        let result = salvage_json(input).unwrap();
        assert_eq!(result.stage, RepairStage::Strict);
        assert_eq!(result.value, serde_json::from_str::<Value>(input).unwrap());
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(salvage_json("   \n"), Err(SalvageError::Empty)));
    }

    #[test]
    fn test_missing_comma_between_fields() {
        let result = salvage_json(r#"{"title": "Roles" "count": 3}"#).unwrap();
        assert_eq!(result.stage, RepairStage::Repaired);
        assert_eq!(result.value, json!({"title": "Roles", "count": 3}));
    }

    #[test]
    fn test_missing_comma_across_lines() {
        let input = "{\n  \"a\": 1\n  \"b\": [1, 2]\n  \"c\": true\n}";
        let result = salvage_json(input).unwrap();
        assert_eq!(result.value, json!({"a": 1, "b": [1, 2], "c": true}));
    }

    #[test]
    fn test_missing_comma_between_objects() {
        let result = salvage_json(r#"[{"q": "one"} {"q": "two"}]"#).unwrap();
        assert_eq!(result.value, json!([{"q": "one"}, {"q": "two"}]));
    }

    #[test]
    fn test_strips_markdown_fence() {
        let input = "Here is your quiz:\n```json\n{\"questions\": []}\n```\nGood luck!";
        let result = salvage_json(input).unwrap();
        assert_eq!(result.stage, RepairStage::Unwrapped);
        assert_eq!(result.value, json!({"questions": []}));
    }

    #[test]
    fn test_strips_label_and_trailing_prose() {
        let result = salvage_json("json {\"ok\": true} hope this helps").unwrap();
        assert_eq!(result.value, json!({"ok": true}));
    }

    #[test]
    fn test_escapes_control_characters_and_backslashes() {
        let input = "{\"text\": \"line one\nline two\", \"path\": \"C:\\dir\"}";
        let result = salvage_json(input).unwrap();
        assert_eq!(result.stage, RepairStage::Sanitized);
        assert_eq!(result.value["text"], "line one\nline two");
        assert_eq!(result.value["path"], "C:\\dir");
    }

    #[test]
    fn test_escapes_inner_quotes() {
        let input = r#"{"question": "What does "done" mean?", "answer": "DoD"}"#;
        let result = salvage_json(input).unwrap();
        assert_eq!(result.value["question"], "What does \"done\" mean?");
    }

    #[test]
    fn test_trailing_commas_removed() {
        let result = salvage_json(r#"{"a": [1, 2, 3,], "b": 2,}"#).unwrap();
        assert_eq!(result.value, json!({"a": [1, 2, 3], "b": 2}));
    }

    #[test]
    fn test_truncated_in_string_value() {
        let input = r#"{"questions": [{"question": "Who owns the backlog?", "answer": "The Product Own"#;
        let result = salvage_json(input).unwrap();
        assert_eq!(result.stage, RepairStage::Repaired);
        assert_eq!(result.value["questions"][0]["answer"], "The Product Own");
    }

    #[test]
    fn test_truncated_after_key_drops_member() {
        let input = r#"{"questions": [{"question": "Q1", "answer": "A1"}, {"question": "Q2", "expl"#;
        let result = salvage_json(input).unwrap();
        assert_eq!(
            result.value,
            json!({"questions": [{"question": "Q1", "answer": "A1"}, {"question": "Q2"}]})
        );
    }

    #[test]
    fn test_truncated_literal_dropped() {
        let result = salvage_json(r#"{"a": 1, "b": tr"#).unwrap();
        assert_eq!(result.value, json!({"a": 1}));
    }

    #[test]
    fn test_bare_keys_quoted() {
        let result = salvage_json(r#"{question: "Q?", answer: "A"}"#).unwrap();
        assert_eq!(result.value, json!({"question": "Q?", "answer": "A"}));
    }

    #[test]
    fn test_regex_extraction_fallback() {
        let input = r#"1) "question": "What is a sprint?" -- "correctAnswer": "A timebox" -- "explanation": "Fixed length."
2) "question": "Who orders the backlog?" -- "answer": "Product Owner""#;
        let result = salvage_json(input).unwrap();
        assert_eq!(result.stage, RepairStage::Extracted);
        let questions = result.value["questions"].as_array().unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0]["question"], "What is a sprint?");
        assert_eq!(questions[0]["correct_answer"], "A timebox");
        assert_eq!(questions[0]["explanation"], "Fixed length.");
        assert_eq!(questions[1]["correct_answer"], "Product Owner");
    }

    #[test]
    fn test_fragment_extraction_reads_options() {
        let text = r#"{"question": "Pick one", "options": ["Daily Scrum", "Retro\"spective"], "answer": 1"#;
        let value = extract_quiz_fragments(text).unwrap();
        let q = &value["questions"][0];
        assert_eq!(q["options"], json!(["Daily Scrum", "Retro\"spective"]));
        assert_eq!(q["correct_answer"], 1);
    }

    #[test]
    fn test_missing_comma_before_bare_key() {
        let result = salvage_json("{\"a\": \"x\"\n  b: 1}").unwrap();
        assert_eq!(result.stage, RepairStage::Repaired);
        assert_eq!(result.value, json!({"a": "x", "b": 1}));
    }

    #[test]
    fn test_inner_quote_before_word_stays_in_string() {
        let input = r#"{"question": "Is the "Sprint Goal" fixed?", "answer": "yes"}"#;
        let result = salvage_json(input).unwrap();
        assert_eq!(result.value["question"], "Is the \"Sprint Goal\" fixed?");
    }

    #[test]
    fn test_fragment_extraction_keeps_inner_quotes() {
        let text = r#"{"question": "What is "Sprint": a timebox?", "answer": "yes", "explanation": "See the "Events" page."
"#;
        let value = extract_quiz_fragments(text).unwrap();
        let q = &value["questions"][0];
        assert_eq!(q["question"], "What is \"Sprint\": a timebox?");
        assert_eq!(q["correct_answer"], "yes");
        assert_eq!(q["explanation"], "See the \"Events\" page.");
    }

    #[test]
    fn test_garbage_is_rejected() {
        let result = salvage_json("this is not json at all; require('child_process')");
        assert!(matches!(result, Err(SalvageError::Unrecoverable(_))));
    }

    #[test]
    fn test_code_is_never_evaluated() {
        // an expression that only a JavaScript evaluator would turn into an object
        let result = salvage_json("(() => ({ pwned: process.exit(1) }))()");
        assert!(matches!(result, Err(SalvageError::Unrecoverable(_))));
    }
}
