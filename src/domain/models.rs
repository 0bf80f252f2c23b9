use time::OffsetDateTime;

use super::types::{QuestionVariant, SessionToken};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BoardItem {
    pub(crate) id: String,
    pub(crate) label: String,
    pub(crate) image: Option<String>,
    pub(crate) item_order: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BoardSlot {
    pub(crate) id: String,
    pub(crate) label: String,
    pub(crate) image: Option<String>,
    pub(crate) slot_order: u32,
}

/// One answer-key entry: the item at `item_order` belongs in the slot at
/// `slot_order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KeyPair {
    pub(crate) item_order: u32,
    pub(crate) slot_order: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DragDropQuestion {
    pub(crate) id: String,
    pub(crate) prompt_text: String,
    pub(crate) variant: QuestionVariant,
    pub(crate) items: Vec<BoardItem>,
    pub(crate) slots: Vec<BoardSlot>,
    pub(crate) answer_key: Vec<KeyPair>,
}

impl DragDropQuestion {
    pub(crate) fn item(&self, item_id: &str) -> Option<&BoardItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub(crate) fn slot(&self, slot_id: &str) -> Option<&BoardSlot> {
        self.slots.iter().find(|slot| slot.id == slot_id)
    }

    /// ORDERING questions may arrive with no slots at all; a positional slot
    /// is then derived locally for each item.
    pub(crate) fn ensure_position_slots(&mut self) {
        if self.variant != QuestionVariant::Ordering || !self.slots.is_empty() {
            return;
        }
        self.slots = (1..=self.items.len() as u32)
            .map(|position| BoardSlot {
                id: format!("position-{position}"),
                label: position.to_string(),
                image: None,
                slot_order: position,
            })
            .collect();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AnswerOption {
    pub(crate) key: String,
    pub(crate) text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SessionQuestion {
    pub(crate) question_number: u32,
    pub(crate) prompt_text: String,
    pub(crate) options: Vec<AnswerOption>,
    /// Server-known answer at fetch time, if the student answered before a
    /// reload.
    pub(crate) selected_option: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct SessionBundle {
    pub(crate) token: SessionToken,
    pub(crate) questions: Vec<SessionQuestion>,
    pub(crate) deadline: OffsetDateTime,
    pub(crate) answered_count: u32,
    pub(crate) total_questions: u32,
}

/// Optional score block some deployments attach to the completion ack.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ResultSummary {
    pub(crate) score: Option<f64>,
    pub(crate) correct_count: Option<u32>,
    pub(crate) total_questions: Option<u32>,
}

impl ResultSummary {
    pub(crate) fn is_empty(&self) -> bool {
        self.score.is_none() && self.correct_count.is_none() && self.total_questions.is_none()
    }
}
