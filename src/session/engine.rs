//! Pure state machine for a test-taking session: answers, navigation,
//! countdown and the finish lifecycle. All time-dependent transitions take
//! an explicit `now` so the machine can be driven deterministically.

use std::collections::BTreeMap;

use time::OffsetDateTime;

use crate::core::time::remaining_seconds;
use crate::domain::{SessionBundle, SessionQuestion, SessionToken};
use crate::resume::ResumeSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FinishMode {
    ManualSubmit,
    AutoDeadline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionPhase {
    InProgress,
    Finishing { mode: FinishMode },
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CountdownWarning {
    FiveMinutes,
    OneMinute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    /// Still counting down. The warning is present at most once per
    /// threshold for the whole session.
    Running { remaining_seconds: i64, warning: Option<CountdownWarning> },
    /// The deadline passed on this tick; the machine is now finishing with
    /// [`FinishMode::AutoDeadline`]. Emitted exactly once.
    Expired,
    /// Not in progress; the timer has nothing to do.
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FinishDisposition {
    /// Auto-submission must eventually succeed; keep retrying.
    RetryAuto,
    /// Manual submission failed; the student stays in the session and may
    /// retry on their own.
    BackToInProgress,
}

#[derive(Debug)]
pub(crate) struct SessionEngine {
    token: SessionToken,
    questions: Vec<SessionQuestion>,
    answers: BTreeMap<u32, String>,
    deadline: OffsetDateTime,
    phase: SessionPhase,
    current_index: usize,
    warned_five_minutes: bool,
    warned_one_minute: bool,
}

impl SessionEngine {
    /// Builds the machine from one fetched bundle, overlaying the resume
    /// cache on top of server-reported answers. The cache wins on conflict
    /// because it reflects the last action before an unexpected restart.
    pub(crate) fn from_bundle(bundle: SessionBundle, cached: Option<ResumeSnapshot>) -> Self {
        let mut answers: BTreeMap<u32, String> = bundle
            .questions
            .iter()
            .filter_map(|question| {
                question.selected_option.clone().map(|option| (question.question_number, option))
            })
            .collect();

        let mut current_index = 0;
        if let Some(snapshot) = cached {
            for (question_number, option) in snapshot.answers {
                answers.insert(question_number, option);
            }
            current_index = snapshot.current_question_index;
        }
        if !bundle.questions.is_empty() {
            current_index = current_index.min(bundle.questions.len() - 1);
        } else {
            current_index = 0;
        }

        Self {
            token: bundle.token,
            questions: bundle.questions,
            answers,
            deadline: bundle.deadline,
            phase: SessionPhase::InProgress,
            current_index,
            warned_five_minutes: false,
            warned_one_minute: false,
        }
    }

    pub(crate) fn token(&self) -> &SessionToken {
        &self.token
    }

    pub(crate) fn questions(&self) -> &[SessionQuestion] {
        &self.questions
    }

    pub(crate) fn current_index(&self) -> usize {
        self.current_index
    }

    pub(crate) fn current_question(&self) -> Option<&SessionQuestion> {
        self.questions.get(self.current_index)
    }

    pub(crate) fn deadline(&self) -> OffsetDateTime {
        self.deadline
    }

    pub(crate) fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub(crate) fn answers(&self) -> &BTreeMap<u32, String> {
        &self.answers
    }

    pub(crate) fn answer_for(&self, question_number: u32) -> Option<&str> {
        self.answers.get(&question_number).map(String::as_str)
    }

    pub(crate) fn answered_count(&self) -> usize {
        self.answers.len()
    }

    pub(crate) fn remaining_at(&self, now: OffsetDateTime) -> i64 {
        remaining_seconds(self.deadline, now)
    }

    fn knows_question(&self, question_number: u32) -> bool {
        self.questions.iter().any(|question| question.question_number == question_number)
    }

    /// Optimistic local update; the caller issues the background persist.
    /// Rejected outside `InProgress` and for unknown question numbers.
    pub(crate) fn record_answer(&mut self, question_number: u32, option: &str) -> bool {
        if self.phase != SessionPhase::InProgress || !self.knows_question(question_number) {
            return false;
        }
        self.answers.insert(question_number, option.to_string());
        true
    }

    pub(crate) fn clear_answer(&mut self, question_number: u32) -> bool {
        if self.phase != SessionPhase::InProgress {
            return false;
        }
        self.answers.remove(&question_number).is_some()
    }

    pub(crate) fn goto(&mut self, index: usize) -> bool {
        if self.phase != SessionPhase::InProgress
            || index >= self.questions.len()
            || index == self.current_index
        {
            return false;
        }
        self.current_index = index;
        true
    }

    pub(crate) fn next(&mut self) -> bool {
        self.goto(self.current_index + 1)
    }

    pub(crate) fn prev(&mut self) -> bool {
        match self.current_index.checked_sub(1) {
            Some(index) => self.goto(index),
            None => false,
        }
    }

    /// One countdown step. Remaining time is recomputed from the absolute
    /// deadline every call, so a late or coalesced tick cannot drift the
    /// clock. The transition into auto-finishing happens on the first tick
    /// at or past the deadline and never again.
    pub(crate) fn on_tick(&mut self, now: OffsetDateTime) -> TickOutcome {
        if self.phase != SessionPhase::InProgress {
            return TickOutcome::Idle;
        }
        if now >= self.deadline {
            self.phase = SessionPhase::Finishing { mode: FinishMode::AutoDeadline };
            return TickOutcome::Expired;
        }
        let remaining = self.remaining_at(now);
        let warning = self.take_warning(remaining);
        TickOutcome::Running { remaining_seconds: remaining, warning }
    }

    fn take_warning(&mut self, remaining: i64) -> Option<CountdownWarning> {
        if remaining <= 60 && !self.warned_one_minute {
            self.warned_one_minute = true;
            self.warned_five_minutes = true;
            return Some(CountdownWarning::OneMinute);
        }
        if remaining <= 300 && !self.warned_five_minutes {
            self.warned_five_minutes = true;
            return Some(CountdownWarning::FiveMinutes);
        }
        None
    }

    /// Guards the finishing flag: only one attempt may be in flight, and a
    /// manual request while auto-submit is running is ignored rather than
    /// queued.
    pub(crate) fn begin_finish(&mut self, mode: FinishMode) -> bool {
        if self.phase != SessionPhase::InProgress {
            return false;
        }
        self.phase = SessionPhase::Finishing { mode };
        true
    }

    pub(crate) fn finish_succeeded(&mut self) {
        self.phase = SessionPhase::Completed;
    }

    pub(crate) fn finish_failed(&mut self) -> FinishDisposition {
        match self.phase {
            SessionPhase::Finishing { mode: FinishMode::AutoDeadline } => {
                FinishDisposition::RetryAuto
            }
            SessionPhase::Finishing { mode: FinishMode::ManualSubmit } => {
                self.phase = SessionPhase::InProgress;
                FinishDisposition::BackToInProgress
            }
            _ => FinishDisposition::BackToInProgress,
        }
    }

    pub(crate) fn resume_snapshot(&self) -> ResumeSnapshot {
        ResumeSnapshot {
            current_question_index: self.current_index,
            answers: self.answers.clone(),
        }
    }
}
