//! Normalization boundary for the CBT API.
//!
//! The legacy backend emits several spellings for the same concept
//! (camelCase and snake_case, numbers as strings, timestamps in more than
//! one shape). Each endpoint decodes through exactly one function here;
//! the rest of the crate only ever sees the canonical `domain` types.

use serde_json::{json, Value};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime,
    PrimitiveDateTime,
};

use crate::authoring::QuestionDraft;
use crate::domain::{
    AnswerOption, BoardItem, BoardSlot, DragDropQuestion, KeyPair, QuestionVariant, ResultSummary,
    SessionBundle, SessionQuestion, SessionToken,
};

/// `GET /sessions/{token}/questions`
pub(crate) fn decode_session_bundle(
    token: &SessionToken,
    payload: &Value,
) -> Result<SessionBundle, String> {
    let entries = field(payload, &["questions", "data"])
        .and_then(Value::as_array)
        .ok_or("missing questions array")?;

    let mut questions = Vec::with_capacity(entries.len());
    for (index, raw) in entries.iter().enumerate() {
        questions.push(decode_session_question(index, raw)?);
    }
    questions.sort_by_key(|question| question.question_number);

    let deadline = field(payload, &["deadline", "endTime", "end_time", "expiresAt", "expires_at"])
        .and_then(parse_deadline)
        .ok_or("missing or unparseable deadline")?;

    let total_questions =
        u32_field(payload, &["totalQuestions", "total_questions"]).unwrap_or(questions.len() as u32);
    let answered_count = u32_field(payload, &["answeredCount", "answered_count"])
        .unwrap_or_else(|| {
            questions.iter().filter(|question| question.selected_option.is_some()).count() as u32
        });

    Ok(SessionBundle { token: token.clone(), questions, deadline, answered_count, total_questions })
}

fn decode_session_question(index: usize, raw: &Value) -> Result<SessionQuestion, String> {
    let question_number =
        u32_field(raw, &["questionNumber", "question_number", "number"]).unwrap_or(index as u32 + 1);
    let prompt_text = string_field(raw, &["promptText", "prompt_text", "prompt", "question", "text"])
        .ok_or_else(|| format!("question {} has no prompt text", index + 1))?;
    let options = decode_options(raw);
    let selected_option = string_field(raw, &["selectedOption", "selected_option", "answer"]);

    Ok(SessionQuestion { question_number, prompt_text, options, selected_option })
}

fn decode_options(raw: &Value) -> Vec<AnswerOption> {
    let Some(options_value) = field(raw, &["options", "choices"]) else {
        return Vec::new();
    };

    match options_value {
        Value::Array(entries) => entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| match entry {
                Value::String(text) => {
                    Some(AnswerOption { key: option_key_for_index(index), text: text.clone() })
                }
                Value::Object(_) => {
                    let key = string_field(entry, &["key", "letter", "option"])
                        .unwrap_or_else(|| option_key_for_index(index));
                    let text = string_field(entry, &["text", "label", "value"])?;
                    Some(AnswerOption { key, text })
                }
                _ => None,
            })
            .collect(),
        Value::Object(map) => {
            let mut options: Vec<AnswerOption> = map
                .iter()
                .filter_map(|(key, text)| {
                    text.as_str()
                        .map(|text| AnswerOption { key: key.clone(), text: text.to_string() })
                })
                .collect();
            options.sort_by(|a, b| a.key.cmp(&b.key));
            options
        }
        _ => Vec::new(),
    }
}

fn option_key_for_index(index: usize) -> String {
    char::from(b'A' + (index % 26) as u8).to_string()
}

/// `POST /sessions/{token}/answers`
pub(crate) fn encode_record_answer(question_number: u32, option: &str) -> Value {
    json!({ "questionNumber": question_number, "selectedOption": option })
}

/// `POST /sessions/{token}/clear-answer`
pub(crate) fn encode_clear_answer(question_number: u32) -> Value {
    json!({ "questionNumber": question_number })
}

/// `POST /sessions/{token}/complete`. The ack body is optional; a summary
/// block is extracted when one is present.
pub(crate) fn decode_result_summary(payload: &Value) -> ResultSummary {
    let container = field(payload, &["result", "summary"]).unwrap_or(payload);

    ResultSummary {
        score: f64_field(container, &["score", "percentage"]),
        correct_count: u32_field(container, &["correctCount", "correct_count", "correct"]),
        total_questions: u32_field(container, &["totalQuestions", "total_questions", "total"]),
    }
}

/// `GET /drag-drop-questions`
pub(crate) fn decode_drag_drop_questions(payload: &Value) -> Result<Vec<DragDropQuestion>, String> {
    let entries =
        field(payload, &["questions", "data", "dragDropQuestions", "drag_drop_questions"])
            .and_then(Value::as_array)
            .ok_or("missing questions array")?;

    entries
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            decode_drag_drop_question(raw).map_err(|reason| format!("question {}: {reason}", index + 1))
        })
        .collect()
}

/// `POST`/`PUT /drag-drop-questions` response.
pub(crate) fn decode_drag_drop_question(raw: &Value) -> Result<DragDropQuestion, String> {
    let container = raw.get("question").unwrap_or(raw);

    let id = string_field(container, &["id", "questionId", "question_id"]).ok_or("missing id")?;
    let prompt_text = string_field(container, &["promptText", "prompt_text", "prompt", "text"])
        .ok_or("missing prompt text")?;
    let variant_raw = string_field(container, &["variant", "type", "questionType", "question_type"])
        .ok_or("missing variant")?;
    let variant = QuestionVariant::parse(&variant_raw)
        .ok_or_else(|| format!("unknown variant {variant_raw:?}"))?;

    let items = decode_items(container)?;
    let slots = decode_slots(container);
    let answer_key = decode_answer_key(container);

    let mut question = DragDropQuestion { id, prompt_text, variant, items, slots, answer_key };
    question.ensure_position_slots();
    Ok(question)
}

fn decode_items(container: &Value) -> Result<Vec<BoardItem>, String> {
    let entries = field(container, &["items"]).and_then(Value::as_array).ok_or("missing items")?;

    let mut items = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let id = string_field(entry, &["id", "itemId", "item_id"])
            .ok_or_else(|| format!("item {} has no id", index + 1))?;
        let label = string_field(entry, &["label", "text", "name"]).unwrap_or_default();
        let image = string_field(entry, &["image", "imageUrl", "image_url"]);
        let item_order = u32_field(entry, &["itemOrder", "item_order", "order", "position"])
            .unwrap_or(index as u32 + 1);
        items.push(BoardItem { id, label, image, item_order });
    }
    items.sort_by_key(|item| item.item_order);
    Ok(items)
}

// Slots may be absent entirely for ORDERING payloads.
fn decode_slots(container: &Value) -> Vec<BoardSlot> {
    let Some(entries) = field(container, &["slots"]).and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut slots: Vec<BoardSlot> = entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let id = string_field(entry, &["id", "slotId", "slot_id"])?;
            let label = string_field(entry, &["label", "text", "name"]).unwrap_or_default();
            let image = string_field(entry, &["image", "imageUrl", "image_url"]);
            let slot_order = u32_field(entry, &["slotOrder", "slot_order", "order", "position"])
                .unwrap_or(index as u32 + 1);
            Some(BoardSlot { id, label, image, slot_order })
        })
        .collect();
    slots.sort_by_key(|slot| slot.slot_order);
    slots
}

fn decode_answer_key(container: &Value) -> Vec<KeyPair> {
    let Some(entries) =
        field(container, &["correctAnswers", "correct_answers", "answerKey", "answer_key"])
            .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::Array(pair) if pair.len() == 2 => {
                Some(KeyPair { item_order: as_u32(&pair[0])?, slot_order: as_u32(&pair[1])? })
            }
            Value::Object(_) => Some(KeyPair {
                item_order: u32_field(entry, &["itemOrder", "item_order"])?,
                slot_order: u32_field(entry, &["slotOrder", "slot_order"])?,
            }),
            _ => None,
        })
        .collect()
}

/// `POST`/`PUT /drag-drop-questions` request. Items, slots and key pairs are
/// keyed by position, so drafts never carry server ids for them.
pub(crate) fn encode_question_draft(draft: &QuestionDraft) -> Value {
    json!({
        "promptText": draft.prompt_text,
        "variant": draft.variant.as_str(),
        "items": draft
            .items
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                json!({
                    "label": entry.label,
                    "image": entry.image,
                    "itemOrder": index as u32 + 1,
                })
            })
            .collect::<Vec<_>>(),
        "slots": draft
            .slots
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                json!({
                    "label": entry.label,
                    "image": entry.image,
                    "slotOrder": index as u32 + 1,
                })
            })
            .collect::<Vec<_>>(),
        "correctAnswers": draft
            .key_pairs
            .iter()
            .map(|pair| json!({ "itemOrder": pair.item_order, "slotOrder": pair.slot_order }))
            .collect::<Vec<_>>(),
    })
}

fn field<'a>(value: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| value.get(name)).filter(|found| !found.is_null())
}

fn string_field(value: &Value, names: &[&str]) -> Option<String> {
    field(value, names).and_then(|found| match found {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

fn u32_field(value: &Value, names: &[&str]) -> Option<u32> {
    field(value, names).and_then(as_u32)
}

fn as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|wide| u32::try_from(wide).ok()),
        Value::String(text) => text.trim().parse::<u32>().ok(),
        _ => None,
    }
}

fn f64_field(value: &Value, names: &[&str]) -> Option<f64> {
    field(value, names).and_then(|found| match found {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    })
}

fn parse_deadline(value: &Value) -> Option<OffsetDateTime> {
    match value {
        Value::String(raw) => parse_deadline_text(raw),
        Value::Number(number) => {
            number.as_i64().and_then(|epoch| epoch_to_datetime(epoch).ok())
        }
        _ => None,
    }
}

fn parse_deadline_text(raw: &str) -> Option<OffsetDateTime> {
    let trimmed = raw.trim();
    if let Ok(value) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Some(value);
    }

    // Bare "YYYY-MM-DDTHH:MM[:SS]" without a timezone is treated as UTC.
    if let Ok(value) = PrimitiveDateTime::parse(
        trimmed,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Some(value.assume_utc());
    }
    if let Ok(value) = PrimitiveDateTime::parse(
        trimmed,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]"),
    ) {
        return Some(value.assume_utc());
    }

    trimmed.parse::<i64>().ok().and_then(|epoch| epoch_to_datetime(epoch).ok())
}

// Values past the year ~5138 as seconds are taken to be milliseconds.
fn epoch_to_datetime(epoch: i64) -> Result<OffsetDateTime, time::error::ComponentRange> {
    let seconds = if epoch > 100_000_000_000 { epoch / 1000 } else { epoch };
    OffsetDateTime::from_unix_timestamp(seconds)
}
