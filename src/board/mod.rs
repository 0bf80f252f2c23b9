//! Item-to-slot assignment state for drag-and-drop questions.
//!
//! The board owns one question and a mapping `item_id -> slot_id`. ORDERING
//! slots hold at most one item (assigning into an occupied slot evicts the
//! occupant); MATCHING slots hold any number. An item occupies at most one
//! slot in either variant because the mapping is keyed by item.

pub(crate) mod gesture;

use std::collections::BTreeMap;

use crate::domain::{BoardItem, BoardSlot, DragDropQuestion, KeyPair, QuestionVariant};

#[derive(Debug, Clone)]
pub(crate) struct AnswerBoard {
    question: DragDropQuestion,
    assignment: BTreeMap<String, String>,
}

/// Shape submitted for a finished board; mirrors what the server's answer
/// key is expressed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SubmissionPayload {
    /// Item ids in slot-position order. One entry per filled slot.
    Ordering(Vec<String>),
    /// `(item_order, slot_order)` pairs sorted by item position.
    Matching(Vec<KeyPair>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BoardScore {
    pub(crate) correct: usize,
    pub(crate) total: usize,
}

impl AnswerBoard {
    pub(crate) fn new(mut question: DragDropQuestion) -> Self {
        question.ensure_position_slots();
        Self { question, assignment: BTreeMap::new() }
    }

    pub(crate) fn question(&self) -> &DragDropQuestion {
        &self.question
    }

    /// Applies an "item dropped on slot" mutation. Ids that do not belong to
    /// this question are ignored: the gesture simply had no valid target.
    /// Returns whether the board changed.
    pub(crate) fn assign(&mut self, item_id: &str, slot_id: &str) -> bool {
        if self.question.item(item_id).is_none() || self.question.slot(slot_id).is_none() {
            return false;
        }
        if self.assignment.get(item_id).map(String::as_str) == Some(slot_id) {
            return false;
        }

        if self.question.variant == QuestionVariant::Ordering {
            self.assignment.retain(|_, occupant_slot| occupant_slot != slot_id);
        }
        self.assignment.insert(item_id.to_string(), slot_id.to_string());
        true
    }

    /// Idempotent removal of one item's placement.
    pub(crate) fn unassign(&mut self, item_id: &str) -> bool {
        self.assignment.remove(item_id).is_some()
    }

    /// Clears every item currently placed in the slot. Returns how many were
    /// removed.
    pub(crate) fn unassign_all(&mut self, slot_id: &str) -> usize {
        let before = self.assignment.len();
        self.assignment.retain(|_, occupant_slot| occupant_slot != slot_id);
        before - self.assignment.len()
    }

    /// Items not yet placed, in their original item order.
    pub(crate) fn unassigned_items(&self) -> Vec<&BoardItem> {
        self.question
            .items
            .iter()
            .filter(|item| !self.assignment.contains_key(&item.id))
            .collect()
    }

    /// Items placed in the slot, in item order. Single or empty for ORDERING.
    pub(crate) fn occupants_of(&self, slot_id: &str) -> Vec<&BoardItem> {
        self.question
            .items
            .iter()
            .filter(|item| self.assignment.get(&item.id).map(String::as_str) == Some(slot_id))
            .collect()
    }

    pub(crate) fn slot_for(&self, item_id: &str) -> Option<&BoardSlot> {
        let slot_id = self.assignment.get(item_id)?;
        self.question.slot(slot_id)
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.assignment.len() == self.question.items.len()
    }

    pub(crate) fn assignment(&self) -> &BTreeMap<String, String> {
        &self.assignment
    }

    pub(crate) fn submission_payload(&self) -> SubmissionPayload {
        match self.question.variant {
            QuestionVariant::Ordering => {
                let mut ordered = Vec::with_capacity(self.question.slots.len());
                for slot in &self.question.slots {
                    if let Some(item) = self.occupants_of(&slot.id).first() {
                        ordered.push(item.id.clone());
                    }
                }
                SubmissionPayload::Ordering(ordered)
            }
            QuestionVariant::Matching => {
                let mut pairs: Vec<KeyPair> = self
                    .assignment
                    .iter()
                    .filter_map(|(item_id, slot_id)| {
                        let item = self.question.item(item_id)?;
                        let slot = self.question.slot(slot_id)?;
                        Some(KeyPair { item_order: item.item_order, slot_order: slot.slot_order })
                    })
                    .collect();
                pairs.sort_by_key(|pair| pair.item_order);
                SubmissionPayload::Matching(pairs)
            }
        }
    }

    /// Grades a complete board against the question's answer key. ORDERING is
    /// always gradable (position is the key); MATCHING needs the payload to
    /// carry its key pairs, otherwise `None`.
    pub(crate) fn score_against_key(&self) -> Option<BoardScore> {
        let total = self.question.items.len();
        match self.question.variant {
            QuestionVariant::Ordering => {
                let correct = self
                    .question
                    .slots
                    .iter()
                    .filter(|slot| {
                        self.occupants_of(&slot.id)
                            .first()
                            .is_some_and(|item| item.item_order == slot.slot_order)
                    })
                    .count();
                Some(BoardScore { correct, total })
            }
            QuestionVariant::Matching => {
                if self.question.answer_key.is_empty() {
                    return None;
                }
                let SubmissionPayload::Matching(pairs) = self.submission_payload() else {
                    return None;
                };
                let correct =
                    pairs.iter().filter(|pair| self.question.answer_key.contains(pair)).count();
                Some(BoardScore { correct, total })
            }
        }
    }
}
