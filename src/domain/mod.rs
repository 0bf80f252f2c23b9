mod models;
mod types;

pub(crate) use models::{
    AnswerOption, BoardItem, BoardSlot, DragDropQuestion, KeyPair, ResultSummary, SessionBundle,
    SessionQuestion,
};
pub(crate) use types::{QuestionVariant, SessionToken};
