//! Event loop around the session engine.
//!
//! One task owns the engine and multiplexes three inputs: console commands,
//! the countdown interval and the process shutdown watch. Answer persists
//! are spawned fire-and-forget; they observe a cancellation watch whose
//! sender lives on the runner, so dropping the runner abandons whatever is
//! still in flight.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use time::OffsetDateTime;
use tokio::sync::{mpsc, watch};

use super::engine::{
    CountdownWarning, FinishDisposition, FinishMode, SessionEngine, TickOutcome,
};
use crate::backend::SessionTransport;
use crate::core::time::now_utc;
use crate::domain::{ResultSummary, SessionQuestion};
use crate::resume::ResumeStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SessionCommand {
    Answer { question_number: u32, option: String },
    Clear { question_number: u32 },
    Goto { index: usize },
    Next,
    Prev,
    Finish,
    Render,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ViewSnapshot {
    pub(crate) current_index: usize,
    pub(crate) total: usize,
    pub(crate) question: Option<SessionQuestion>,
    pub(crate) answer: Option<String>,
    pub(crate) answered: usize,
    pub(crate) answered_questions: Vec<u32>,
    pub(crate) remaining_seconds: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SessionEvent {
    Snapshot(ViewSnapshot),
    Notice(String),
    Warning(CountdownWarning),
    Countdown { remaining_seconds: i64 },
    AutoSubmitStarted,
    FinishFailed { auto: bool, detail: String },
    Completed { summary: Option<ResultSummary> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionOutcome {
    Completed,
    Quit,
    Shutdown,
}

pub(crate) struct SessionRunner<T: SessionTransport> {
    engine: SessionEngine,
    transport: Arc<T>,
    store: ResumeStore,
    commands: mpsc::Receiver<SessionCommand>,
    events: mpsc::Sender<SessionEvent>,
    shutdown: watch::Receiver<bool>,
    tick_interval: Duration,
    finish_retry: Duration,
    _cancel_tx: watch::Sender<bool>,
    cancel_rx: watch::Receiver<bool>,
}

impl<T: SessionTransport> SessionRunner<T> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        engine: SessionEngine,
        transport: Arc<T>,
        store: ResumeStore,
        commands: mpsc::Receiver<SessionCommand>,
        events: mpsc::Sender<SessionEvent>,
        shutdown: watch::Receiver<bool>,
        tick_interval: Duration,
        finish_retry: Duration,
    ) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self {
            engine,
            transport,
            store,
            commands,
            events,
            shutdown,
            tick_interval,
            finish_retry,
            _cancel_tx: cancel_tx,
            cancel_rx,
        }
    }

    pub(crate) async fn run(mut self) -> Result<SessionOutcome> {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tracing::info!(
            token = %self.engine.token(),
            deadline = %self.engine.deadline(),
            questions = self.engine.questions().len(),
            "session runner started"
        );
        self.emit_snapshot(now_utc()).await;

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        tracing::info!("session runner stopping on shutdown signal");
                        return Ok(SessionOutcome::Shutdown);
                    }
                }
                _ = ticker.tick() => {
                    if let Some(outcome) = self.handle_tick().await {
                        return Ok(outcome);
                    }
                }
                command = self.commands.recv() => {
                    match command {
                        None => return Ok(SessionOutcome::Quit),
                        Some(command) => {
                            if let Some(outcome) = self.handle_command(command).await {
                                return Ok(outcome);
                            }
                        }
                    }
                }
            }
        }
    }

    async fn handle_tick(&mut self) -> Option<SessionOutcome> {
        match self.engine.on_tick(now_utc()) {
            TickOutcome::Running { remaining_seconds, warning } => {
                self.send_event(SessionEvent::Countdown { remaining_seconds }).await;
                if let Some(warning) = warning {
                    self.send_event(SessionEvent::Warning(warning)).await;
                }
                None
            }
            TickOutcome::Expired => {
                tracing::info!(token = %self.engine.token(), "deadline reached, auto-submitting");
                self.send_event(SessionEvent::AutoSubmitStarted).await;
                self.drive_finish(FinishMode::AutoDeadline).await
            }
            TickOutcome::Idle => None,
        }
    }

    async fn handle_command(&mut self, command: SessionCommand) -> Option<SessionOutcome> {
        match command {
            SessionCommand::Answer { question_number, option } => {
                if self.engine.record_answer(question_number, &option) {
                    self.persist_snapshot().await;
                    self.spawn_answer_persist(question_number, Some(option));
                    self.emit_snapshot(now_utc()).await;
                } else {
                    self.send_event(SessionEvent::Notice(format!(
                        "cannot answer question {question_number} right now"
                    )))
                    .await;
                }
                None
            }
            SessionCommand::Clear { question_number } => {
                if self.engine.clear_answer(question_number) {
                    self.persist_snapshot().await;
                    self.spawn_answer_persist(question_number, None);
                    self.emit_snapshot(now_utc()).await;
                } else {
                    self.send_event(SessionEvent::Notice(format!(
                        "question {question_number} has no answer to clear"
                    )))
                    .await;
                }
                None
            }
            SessionCommand::Goto { index } => {
                if self.engine.goto(index) {
                    self.persist_snapshot().await;
                }
                self.emit_snapshot(now_utc()).await;
                None
            }
            SessionCommand::Next => {
                if self.engine.next() {
                    self.persist_snapshot().await;
                }
                self.emit_snapshot(now_utc()).await;
                None
            }
            SessionCommand::Prev => {
                if self.engine.prev() {
                    self.persist_snapshot().await;
                }
                self.emit_snapshot(now_utc()).await;
                None
            }
            SessionCommand::Finish => {
                if self.engine.begin_finish(FinishMode::ManualSubmit) {
                    self.drive_finish(FinishMode::ManualSubmit).await
                } else {
                    self.send_event(SessionEvent::Notice(
                        "submission is already in progress".to_string(),
                    ))
                    .await;
                    None
                }
            }
            SessionCommand::Render => {
                self.emit_snapshot(now_utc()).await;
                None
            }
            SessionCommand::Quit => Some(SessionOutcome::Quit),
        }
    }

    /// Issues the completion call for the current finishing mode. Manual
    /// failures hand control back to the student; auto-deadline failures
    /// retry at a fixed delay until the submission lands or the process is
    /// told to shut down.
    async fn drive_finish(&mut self, mode: FinishMode) -> Option<SessionOutcome> {
        loop {
            match self.transport.complete_session(self.engine.token()).await {
                Ok(summary) => {
                    self.engine.finish_succeeded();
                    self.store.delete(self.engine.token()).await;
                    let summary = if summary.is_empty() { None } else { Some(summary) };
                    self.send_event(SessionEvent::Completed { summary }).await;
                    return Some(SessionOutcome::Completed);
                }
                Err(err) => {
                    let auto = mode == FinishMode::AutoDeadline;
                    tracing::warn!(error = %err, auto, "session completion failed");
                    self.send_event(SessionEvent::FinishFailed { auto, detail: err.to_string() })
                        .await;
                    match self.engine.finish_failed() {
                        FinishDisposition::BackToInProgress => {
                            tracing::debug!(
                                phase = ?self.engine.phase(),
                                "manual finish rolled back, answers stay editable"
                            );
                            return None;
                        }
                        FinishDisposition::RetryAuto => {
                            tokio::select! {
                                _ = tokio::time::sleep(self.finish_retry) => {}
                                _ = self.shutdown.changed() => {
                                    if *self.shutdown.borrow() {
                                        return Some(SessionOutcome::Shutdown);
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    /// Background persist for one answer change. Carries the full new value
    /// keyed by question number, so out-of-order completion against other
    /// changes is harmless. Failures surface as a notice; local state is
    /// deliberately not rolled back.
    fn spawn_answer_persist(&self, question_number: u32, option: Option<String>) {
        let transport = Arc::clone(&self.transport);
        let token = self.engine.token().clone();
        let events = self.events.clone();
        let mut cancel = self.cancel_rx.clone();

        tokio::spawn(async move {
            let call = async {
                match &option {
                    Some(option) => transport.record_answer(&token, question_number, option).await,
                    None => transport.clear_answer(&token, question_number).await,
                }
            };
            tokio::select! {
                result = call => {
                    if let Err(err) = result {
                        tracing::warn!(error = %err, question_number, "failed to persist answer");
                        let notice = match option {
                            Some(_) => {
                                format!("could not save answer for question {question_number}: {err}")
                            }
                            None => {
                                format!("could not clear answer for question {question_number}: {err}")
                            }
                        };
                        events.send(SessionEvent::Notice(notice)).await.ok();
                    }
                }
                _ = cancel.changed() => {
                    tracing::debug!(question_number, "abandoning in-flight answer persist");
                }
            }
        });
    }

    async fn persist_snapshot(&self) {
        self.store.save(self.engine.token(), &self.engine.resume_snapshot()).await;
    }

    async fn emit_snapshot(&self, now: OffsetDateTime) {
        let question = self.engine.current_question().cloned();
        let answer = question.as_ref().and_then(|question| {
            self.engine.answer_for(question.question_number).map(ToString::to_string)
        });
        let snapshot = ViewSnapshot {
            current_index: self.engine.current_index(),
            total: self.engine.questions().len(),
            question,
            answer,
            answered: self.engine.answered_count(),
            answered_questions: self.engine.answers().keys().copied().collect(),
            remaining_seconds: self.engine.remaining_at(now),
        };
        self.send_event(SessionEvent::Snapshot(snapshot)).await;
    }

    async fn send_event(&self, event: SessionEvent) {
        if self.events.send(event).await.is_err() {
            tracing::debug!("session event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::domain::{SessionBundle, SessionToken};
    use crate::test_support::FakeTransport;
    use time::Duration as TimeDuration;

    struct Harness {
        commands: mpsc::Sender<SessionCommand>,
        events: mpsc::Receiver<SessionEvent>,
        shutdown_tx: watch::Sender<bool>,
        transport: Arc<FakeTransport>,
        store: ResumeStore,
        token: SessionToken,
        handle: tokio::task::JoinHandle<Result<SessionOutcome>>,
    }

    fn bundle(token: &SessionToken, deadline_in_ms: i64) -> SessionBundle {
        let questions = (1..=3)
            .map(|number| SessionQuestion {
                question_number: number,
                prompt_text: format!("Question {number}"),
                options: Vec::new(),
                selected_option: None,
            })
            .collect();
        SessionBundle {
            token: token.clone(),
            questions,
            deadline: now_utc() + TimeDuration::milliseconds(deadline_in_ms),
            answered_count: 0,
            total_questions: 3,
        }
    }

    fn spawn_harness(deadline_in_ms: i64, transport: FakeTransport) -> Harness {
        let token = SessionToken::new(format!("tok-{}", uuid::Uuid::new_v4()));
        let transport = Arc::new(transport);
        let store = ResumeStore::new(
            std::env::temp_dir().join(format!("cbt-runner-{}", uuid::Uuid::new_v4())),
        );
        let engine = SessionEngine::from_bundle(bundle(&token, deadline_in_ms), None);

        let (command_tx, command_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::channel(64);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let runner = SessionRunner::new(
            engine,
            Arc::clone(&transport),
            store.clone(),
            command_rx,
            event_tx,
            shutdown_rx,
            Duration::from_millis(10),
            Duration::from_millis(10),
        );
        let handle = tokio::spawn(runner.run());

        Harness { commands: command_tx, events: event_rx, shutdown_tx, transport, store, token, handle }
    }

    async fn wait_for<F>(harness: &mut Harness, mut matches: F) -> SessionEvent
    where
        F: FnMut(&SessionEvent) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let event = harness.events.recv().await.expect("event channel closed");
                if matches(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    #[tokio::test]
    async fn deadline_expiry_submits_exactly_once() {
        let mut harness = spawn_harness(40, FakeTransport::default());

        wait_for(&mut harness, |event| matches!(event, SessionEvent::AutoSubmitStarted)).await;
        wait_for(&mut harness, |event| matches!(event, SessionEvent::Completed { .. })).await;

        let outcome = harness.handle.await.unwrap().unwrap();
        assert_eq!(outcome, SessionOutcome::Completed);
        assert_eq!(harness.transport.complete_calls(), 1);
    }

    #[tokio::test]
    async fn auto_submit_retries_until_the_backend_accepts() {
        let transport = FakeTransport::default();
        transport.script_complete(Err(BackendError::Status {
            endpoint: "complete session",
            status: 503,
            detail: "unavailable".to_string(),
        }));
        transport.script_complete(Err(BackendError::Status {
            endpoint: "complete session",
            status: 503,
            detail: "unavailable".to_string(),
        }));
        let mut harness = spawn_harness(20, transport);

        wait_for(&mut harness, |event| {
            matches!(event, SessionEvent::FinishFailed { auto: true, .. })
        })
        .await;
        wait_for(&mut harness, |event| matches!(event, SessionEvent::Completed { .. })).await;

        assert_eq!(harness.handle.await.unwrap().unwrap(), SessionOutcome::Completed);
        assert_eq!(harness.transport.complete_calls(), 3);
    }

    #[tokio::test]
    async fn manual_finish_failure_keeps_the_session_editable() {
        let transport = FakeTransport::default();
        transport.script_complete(Err(BackendError::Status {
            endpoint: "complete session",
            status: 500,
            detail: "boom".to_string(),
        }));
        let mut harness = spawn_harness(60_000, transport);

        harness.commands.send(SessionCommand::Finish).await.unwrap();
        wait_for(&mut harness, |event| {
            matches!(event, SessionEvent::FinishFailed { auto: false, .. })
        })
        .await;

        // Still in progress: answers are accepted and reflected.
        harness
            .commands
            .send(SessionCommand::Answer { question_number: 1, option: "A".to_string() })
            .await
            .unwrap();
        let event = wait_for(&mut harness, |event| {
            matches!(event, SessionEvent::Snapshot(snapshot) if snapshot.answer.is_some())
        })
        .await;
        if let SessionEvent::Snapshot(snapshot) = event {
            assert_eq!(snapshot.answer.as_deref(), Some("A"));
        }

        // A retried submission succeeds with the scripted failure used up.
        harness.commands.send(SessionCommand::Finish).await.unwrap();
        wait_for(&mut harness, |event| matches!(event, SessionEvent::Completed { .. })).await;
        assert_eq!(harness.handle.await.unwrap().unwrap(), SessionOutcome::Completed);
        assert_eq!(harness.transport.complete_calls(), 2);
    }

    #[tokio::test]
    async fn answers_reach_the_store_and_the_transport() {
        let mut harness = spawn_harness(60_000, FakeTransport::default());

        harness
            .commands
            .send(SessionCommand::Answer { question_number: 2, option: "B".to_string() })
            .await
            .unwrap();
        wait_for(&mut harness, |event| {
            matches!(event, SessionEvent::Snapshot(snapshot) if snapshot.answered == 1)
        })
        .await;

        let snapshot = harness.store.load(&harness.token).await.expect("resume entry written");
        assert_eq!(snapshot.answers.get(&2).map(String::as_str), Some("B"));

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if harness.transport.recorded_answers().contains(&(2, Some("B".to_string()))) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("persist call never reached the transport");

        harness.commands.send(SessionCommand::Quit).await.unwrap();
        assert_eq!(harness.handle.await.unwrap().unwrap(), SessionOutcome::Quit);
    }

    #[tokio::test]
    async fn navigation_updates_the_resume_entry() {
        let mut harness = spawn_harness(60_000, FakeTransport::default());

        harness.commands.send(SessionCommand::Next).await.unwrap();
        wait_for(&mut harness, |event| {
            matches!(event, SessionEvent::Snapshot(snapshot) if snapshot.current_index == 1)
        })
        .await;

        let snapshot = harness.store.load(&harness.token).await.expect("resume entry written");
        assert_eq!(snapshot.current_question_index, 1);

        harness.commands.send(SessionCommand::Quit).await.unwrap();
        harness.handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn completion_deletes_the_resume_entry() {
        let mut harness = spawn_harness(60_000, FakeTransport::default());

        harness
            .commands
            .send(SessionCommand::Answer { question_number: 1, option: "C".to_string() })
            .await
            .unwrap();
        wait_for(&mut harness, |event| {
            matches!(event, SessionEvent::Snapshot(snapshot) if snapshot.answered == 1)
        })
        .await;
        assert!(harness.store.load(&harness.token).await.is_some());

        harness.commands.send(SessionCommand::Finish).await.unwrap();
        wait_for(&mut harness, |event| matches!(event, SessionEvent::Completed { .. })).await;

        assert_eq!(harness.store.load(&harness.token).await, None);
        harness.handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn shutdown_stops_the_runner() {
        let harness = spawn_harness(60_000, FakeTransport::default());

        harness.shutdown_tx.send(true).unwrap();
        assert_eq!(harness.handle.await.unwrap().unwrap(), SessionOutcome::Shutdown);
    }

    #[tokio::test]
    async fn completion_summary_is_forwarded() {
        let transport = FakeTransport::default();
        transport.script_complete(Ok(ResultSummary {
            score: Some(90.0),
            correct_count: Some(9),
            total_questions: Some(10),
        }));
        let mut harness = spawn_harness(60_000, transport);

        harness.commands.send(SessionCommand::Finish).await.unwrap();
        let event =
            wait_for(&mut harness, |event| matches!(event, SessionEvent::Completed { .. })).await;
        match event {
            SessionEvent::Completed { summary: Some(summary) } => {
                assert_eq!(summary.correct_count, Some(9));
            }
            other => panic!("expected a summary, got {other:?}"),
        }
        harness.handle.await.unwrap().unwrap();
    }
}
