//! Drag-and-drop question drafts for the author tool.
//!
//! A draft keeps items and slots as plain vectors; the board position of an
//! entry is its index plus one, so removals renumber the survivors for free
//! and the answer key only has to follow.

use std::path::Path;

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use validator::Validate;

use crate::domain::{KeyPair, QuestionVariant};

#[derive(Debug, Error)]
pub(crate) enum DraftError {
    #[error("failed to read draft file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("draft file {path} is not valid JSON: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write draft file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("draft for {path} could not be encoded: {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown question variant {0:?}")]
    UnknownVariant(String),
    #[error("drafts need a prompt")]
    EmptyPrompt,
    #[error(transparent)]
    Fields(#[from] validator::ValidationErrors),
    #[error("drafts need at least two items")]
    TooFewItems,
    #[error("MATCHING drafts need at least two slots")]
    TooFewSlots,
    #[error("item {item_order} has no answer-key pair")]
    MissingKeyPair { item_order: u32 },
    #[error("item {item_order} has more than one answer-key pair")]
    DuplicateKeyPair { item_order: u32 },
    #[error("answer key references unknown item position {item_order}")]
    UnknownItemPosition { item_order: u32 },
    #[error("answer key references unknown slot position {slot_order}")]
    UnknownSlotPosition { slot_order: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DraftEntry {
    pub(crate) label: String,
    pub(crate) image: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QuestionDraft {
    /// Present when editing an existing question; selects update over create.
    pub(crate) id: Option<String>,
    pub(crate) prompt_text: String,
    pub(crate) variant: QuestionVariant,
    pub(crate) items: Vec<DraftEntry>,
    pub(crate) slots: Vec<DraftEntry>,
    pub(crate) key_pairs: Vec<KeyPair>,
}

impl QuestionDraft {
    pub(crate) fn add_item(&mut self, label: impl Into<String>, image: Option<String>) {
        self.items.push(DraftEntry { label: label.into(), image });
    }

    pub(crate) fn add_slot(&mut self, label: impl Into<String>, image: Option<String>) {
        self.slots.push(DraftEntry { label: label.into(), image });
    }

    /// Removes the item at `position` (1-based). Later items slide down one
    /// position; key pairs at the removed position are stripped and pairs
    /// past it follow their renumbered item.
    pub(crate) fn remove_item(&mut self, position: u32) -> bool {
        let Some(index) = position.checked_sub(1).map(|zero_based| zero_based as usize) else {
            return false;
        };
        if index >= self.items.len() {
            return false;
        }
        self.items.remove(index);
        self.key_pairs.retain(|pair| pair.item_order != position);
        for pair in &mut self.key_pairs {
            if pair.item_order > position {
                pair.item_order -= 1;
            }
        }
        true
    }

    pub(crate) fn remove_slot(&mut self, position: u32) -> bool {
        let Some(index) = position.checked_sub(1).map(|zero_based| zero_based as usize) else {
            return false;
        };
        if index >= self.slots.len() {
            return false;
        }
        self.slots.remove(index);
        self.key_pairs.retain(|pair| pair.slot_order != position);
        for pair in &mut self.key_pairs {
            if pair.slot_order > position {
                pair.slot_order -= 1;
            }
        }
        true
    }

    /// Declares the correct slot for an item, replacing any previous pair for
    /// that item so each item keeps exactly one mapping.
    pub(crate) fn set_key_pair(&mut self, item_order: u32, slot_order: u32) -> Result<(), DraftError> {
        if item_order == 0 || item_order as usize > self.items.len() {
            return Err(DraftError::UnknownItemPosition { item_order });
        }
        if slot_order == 0 || slot_order as usize > self.slot_capacity() {
            return Err(DraftError::UnknownSlotPosition { slot_order });
        }
        self.key_pairs.retain(|pair| pair.item_order != item_order);
        self.key_pairs.push(KeyPair { item_order, slot_order });
        self.key_pairs.sort_by_key(|pair| pair.item_order);
        Ok(())
    }

    pub(crate) fn clear_key_pair(&mut self, item_order: u32) -> bool {
        let before = self.key_pairs.len();
        self.key_pairs.retain(|pair| pair.item_order != item_order);
        self.key_pairs.len() != before
    }

    /// Submission gate: MATCHING needs exactly one declared pair per item;
    /// ORDERING needs nothing beyond two items because sequence position is
    /// the answer.
    pub(crate) fn validate(&self) -> Result<(), DraftError> {
        if self.prompt_text.trim().is_empty() {
            return Err(DraftError::EmptyPrompt);
        }
        if self.items.len() < 2 {
            return Err(DraftError::TooFewItems);
        }

        for pair in &self.key_pairs {
            if pair.item_order == 0 || pair.item_order as usize > self.items.len() {
                return Err(DraftError::UnknownItemPosition { item_order: pair.item_order });
            }
            if pair.slot_order == 0 || pair.slot_order as usize > self.slot_capacity() {
                return Err(DraftError::UnknownSlotPosition { slot_order: pair.slot_order });
            }
        }

        if self.variant == QuestionVariant::Matching {
            if self.slots.len() < 2 {
                return Err(DraftError::TooFewSlots);
            }
            for item_order in 1..=self.items.len() as u32 {
                let declared =
                    self.key_pairs.iter().filter(|pair| pair.item_order == item_order).count();
                match declared {
                    0 => return Err(DraftError::MissingKeyPair { item_order }),
                    1 => {}
                    _ => return Err(DraftError::DuplicateKeyPair { item_order }),
                }
            }
        }

        Ok(())
    }

    // ORDERING slots are positional, one per item, whether or not the draft
    // spells them out.
    fn slot_capacity(&self) -> usize {
        match self.variant {
            QuestionVariant::Ordering => self.items.len().max(self.slots.len()),
            QuestionVariant::Matching => self.slots.len(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
struct DraftFile {
    #[serde(default)]
    id: Option<String>,
    #[serde(alias = "promptText", alias = "prompt")]
    #[validate(length(min = 1, message = "prompt_text must not be empty"))]
    prompt_text: String,
    #[serde(alias = "type")]
    variant: String,
    #[validate(nested)]
    items: Vec<DraftEntryFile>,
    #[serde(default)]
    #[validate(nested)]
    slots: Vec<DraftEntryFile>,
    #[serde(default, alias = "correctAnswers", alias = "answerKey", alias = "answer_key")]
    correct_answers: Vec<DraftPairFile>,
}

#[derive(Debug, Deserialize, Validate)]
struct DraftEntryFile {
    #[validate(length(min = 1, message = "label must not be empty"))]
    label: String,
    #[serde(default, alias = "imageUrl", alias = "image_url")]
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DraftPairFile {
    Positions([u32; 2]),
    Keyed {
        #[serde(alias = "itemOrder")]
        item_order: u32,
        #[serde(alias = "slotOrder")]
        slot_order: u32,
    },
}

impl DraftPairFile {
    fn into_key_pair(self) -> KeyPair {
        match self {
            Self::Positions([item_order, slot_order]) => KeyPair { item_order, slot_order },
            Self::Keyed { item_order, slot_order } => KeyPair { item_order, slot_order },
        }
    }
}

/// Reads, field-validates and structurally validates a draft file.
pub(crate) fn load_draft(path: &Path) -> Result<QuestionDraft, DraftError> {
    let shown_path = path.display().to_string();
    let raw = std::fs::read_to_string(path)
        .map_err(|source| DraftError::Io { path: shown_path.clone(), source })?;
    let file: DraftFile = serde_json::from_str(&raw)
        .map_err(|source| DraftError::Parse { path: shown_path, source })?;
    file.validate()?;

    let variant = QuestionVariant::parse(&file.variant)
        .ok_or_else(|| DraftError::UnknownVariant(file.variant.clone()))?;

    let draft = QuestionDraft {
        id: file.id,
        prompt_text: file.prompt_text,
        variant,
        items: file
            .items
            .into_iter()
            .map(|entry| DraftEntry { label: entry.label, image: entry.image })
            .collect(),
        slots: file
            .slots
            .into_iter()
            .map(|entry| DraftEntry { label: entry.label, image: entry.image })
            .collect(),
        key_pairs: file.correct_answers.into_iter().map(DraftPairFile::into_key_pair).collect(),
    };
    draft.validate()?;
    Ok(draft)
}

/// Writes a draft in the same JSON shape `load_draft` accepts.
pub(crate) fn save_draft(path: &Path, draft: &QuestionDraft) -> Result<(), DraftError> {
    let entries = |list: &[DraftEntry]| -> Vec<serde_json::Value> {
        list.iter()
            .map(|entry| match &entry.image {
                Some(image) => json!({ "label": entry.label, "image": image }),
                None => json!({ "label": entry.label }),
            })
            .collect()
    };

    let mut body = json!({
        "prompt_text": draft.prompt_text,
        "variant": draft.variant.as_str(),
        "items": entries(&draft.items),
        "slots": entries(&draft.slots),
        "correct_answers": draft
            .key_pairs
            .iter()
            .map(|pair| json!([pair.item_order, pair.slot_order]))
            .collect::<Vec<_>>(),
    });
    if let Some(id) = &draft.id {
        body["id"] = json!(id);
    }

    let shown_path = path.display().to_string();
    let raw = serde_json::to_string_pretty(&body)
        .map_err(|source| DraftError::Encode { path: shown_path.clone(), source })?;
    std::fs::write(path, raw).map_err(|source| DraftError::Write { path: shown_path, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn matching_draft() -> QuestionDraft {
        QuestionDraft {
            id: None,
            prompt_text: "Match countries to capitals".to_string(),
            variant: QuestionVariant::Matching,
            items: vec![
                DraftEntry { label: "Paris".to_string(), image: None },
                DraftEntry { label: "Rome".to_string(), image: None },
                DraftEntry { label: "Berlin".to_string(), image: None },
            ],
            slots: vec![
                DraftEntry { label: "France".to_string(), image: None },
                DraftEntry { label: "Italy".to_string(), image: None },
                DraftEntry { label: "Germany".to_string(), image: None },
            ],
            key_pairs: vec![
                KeyPair { item_order: 1, slot_order: 1 },
                KeyPair { item_order: 2, slot_order: 2 },
                KeyPair { item_order: 3, slot_order: 3 },
            ],
        }
    }

    #[test]
    fn removing_an_item_renumbers_and_strips_its_pair() {
        let mut draft = matching_draft();
        assert!(draft.remove_item(2));

        assert_eq!(draft.items.len(), 2);
        assert_eq!(draft.items[1].label, "Berlin");
        // The pair for the removed item is gone; the pair for the old third
        // item followed it down to position 2.
        assert_eq!(
            draft.key_pairs,
            vec![KeyPair { item_order: 1, slot_order: 1 }, KeyPair { item_order: 2, slot_order: 3 }]
        );
    }

    #[test]
    fn removing_a_slot_renumbers_the_slot_side() {
        let mut draft = matching_draft();
        assert!(draft.remove_slot(1));

        assert_eq!(draft.slots[0].label, "Italy");
        assert_eq!(
            draft.key_pairs,
            vec![KeyPair { item_order: 2, slot_order: 1 }, KeyPair { item_order: 3, slot_order: 2 }]
        );
    }

    #[test]
    fn remove_out_of_range_is_a_no_op() {
        let mut draft = matching_draft();
        assert!(!draft.remove_item(0));
        assert!(!draft.remove_item(9));
        assert_eq!(draft.items.len(), 3);
        assert_eq!(draft.key_pairs.len(), 3);
    }

    #[test]
    fn set_key_pair_replaces_the_previous_mapping() {
        let mut draft = matching_draft();
        draft.set_key_pair(2, 3).unwrap();

        let pairs_for_item: Vec<_> =
            draft.key_pairs.iter().filter(|pair| pair.item_order == 2).collect();
        assert_eq!(pairs_for_item.len(), 1);
        assert_eq!(pairs_for_item[0].slot_order, 3);
    }

    #[test]
    fn matching_validation_requires_exactly_one_pair_per_item() {
        let mut draft = matching_draft();
        draft.clear_key_pair(3);
        assert!(matches!(draft.validate(), Err(DraftError::MissingKeyPair { item_order: 3 })));

        let mut draft = matching_draft();
        draft.key_pairs.push(KeyPair { item_order: 1, slot_order: 2 });
        assert!(matches!(draft.validate(), Err(DraftError::DuplicateKeyPair { item_order: 1 })));
    }

    #[test]
    fn matching_validation_rejects_out_of_range_pairs() {
        let mut draft = matching_draft();
        draft.key_pairs[0].slot_order = 9;
        assert!(matches!(
            draft.validate(),
            Err(DraftError::UnknownSlotPosition { slot_order: 9 })
        ));
    }

    #[test]
    fn ordering_needs_two_items_and_no_pairs() {
        let mut draft = QuestionDraft {
            id: None,
            prompt_text: "Order the steps".to_string(),
            variant: QuestionVariant::Ordering,
            items: vec![DraftEntry { label: "Boil water".to_string(), image: None }],
            slots: Vec::new(),
            key_pairs: Vec::new(),
        };
        assert!(matches!(draft.validate(), Err(DraftError::TooFewItems)));

        draft.add_item("Add pasta", None);
        assert!(draft.validate().is_ok());
    }

    fn write_temp_draft(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("draft-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn load_draft_accepts_both_pair_spellings() {
        let path = write_temp_draft(
            r#"{
                "promptText": "Match",
                "variant": "matching",
                "items": [{"label": "Paris"}, {"label": "Rome"}],
                "slots": [{"label": "France"}, {"label": "Italy"}],
                "correctAnswers": [[1, 1], {"itemOrder": 2, "slotOrder": 2}]
            }"#,
        );

        let draft = load_draft(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(draft.variant, QuestionVariant::Matching);
        assert_eq!(
            draft.key_pairs,
            vec![KeyPair { item_order: 1, slot_order: 1 }, KeyPair { item_order: 2, slot_order: 2 }]
        );
    }

    #[test]
    fn load_draft_rejects_unknown_variants_and_bad_json() {
        let path = write_temp_draft(
            r#"{"promptText": "x", "variant": "ESSAY", "items": [{"label": "a"}, {"label": "b"}]}"#,
        );
        let err = load_draft(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, DraftError::UnknownVariant(variant) if variant == "ESSAY"));

        let path = write_temp_draft("not json at all");
        let err = load_draft(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, DraftError::Parse { .. }));
    }

    #[test]
    fn load_draft_runs_field_validation() {
        let path = write_temp_draft(
            r#"{"promptText": "", "variant": "ORDERING", "items": [{"label": "a"}, {"label": "b"}]}"#,
        );
        let err = load_draft(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, DraftError::Fields(_)));
    }

    #[test]
    fn validation_requires_a_prompt() {
        let mut draft = matching_draft();
        draft.prompt_text = "  ".to_string();
        assert!(matches!(draft.validate(), Err(DraftError::EmptyPrompt)));
    }

    #[test]
    fn saved_drafts_load_back_unchanged() {
        let mut draft = matching_draft();
        draft.id = Some("q-77".to_string());
        draft.items[1].image = Some("https://img.example/rome.png".to_string());

        let path = std::env::temp_dir().join(format!("draft-{}.json", uuid::Uuid::new_v4()));
        save_draft(&path, &draft).unwrap();
        let loaded = load_draft(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, draft);
    }
}
