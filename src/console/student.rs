//! Interactive console for a timed answer session.
//!
//! Keyboard input and runner events are multiplexed on one task. The
//! countdown repaints a single status line; everything else appends, so
//! scrollback keeps the session history.

use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::AsyncBufReadExt;
use tokio::sync::{mpsc, watch};

use crate::backend::BackendClient;
use crate::core::config::Settings;
use crate::core::time::format_clock;
use crate::domain::SessionToken;
use crate::resume::ResumeStore;
use crate::session::{
    CountdownWarning, SessionCommand, SessionEngine, SessionEvent, SessionOutcome, SessionRunner,
    ViewSnapshot,
};

pub(crate) async fn run_session(settings: &Settings, token: SessionToken) -> Result<()> {
    let client = BackendClient::from_settings(settings.backend())?;
    let store = ResumeStore::new(settings.resume().dir.clone());

    let bundle = client
        .fetch_session_questions(&token)
        .await
        .context("Failed to load session questions")?;
    let cached = store.load(&token).await;
    if cached.is_some() {
        tracing::info!(token = %token, "resuming session from the local cache");
    }
    let engine = SessionEngine::from_bundle(bundle, cached);

    let (command_tx, command_rx) = mpsc::channel(16);
    let (event_tx, event_rx) = mpsc::channel(64);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        crate::core::shutdown::shutdown_signal().await;
        shutdown_tx.send(true).ok();
    });

    let runner = SessionRunner::new(
        engine,
        Arc::new(client),
        store,
        command_rx,
        event_tx,
        shutdown_rx,
        Duration::from_secs(settings.session().tick_interval_seconds),
        Duration::from_secs(settings.session().finish_retry_seconds),
    );
    let runner_handle = tokio::spawn(runner.run());

    println!("Session {token} loaded. Type h for the command list.");
    drive_console(command_tx, event_rx).await?;

    let outcome = runner_handle.await.context("session runner task panicked")??;
    match outcome {
        SessionOutcome::Completed => println!("Goodbye."),
        SessionOutcome::Quit => {
            println!("Exiting. Your answers stay saved here and on the server.");
        }
        SessionOutcome::Shutdown => {
            println!("\nInterrupted. Your answers stay saved; run again to resume.");
        }
    }
    Ok(())
}

/// Reads stdin lines and renders runner events until the runner hangs up.
async fn drive_console(
    commands: mpsc::Sender<SessionCommand>,
    mut events: mpsc::Receiver<SessionEvent>,
) -> Result<()> {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut view: Option<ViewSnapshot> = None;
    let mut awaiting_confirm = false;
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                render_event(event, &mut view);
            }
            line = lines.next_line(), if stdin_open => {
                let Some(line) = line.context("failed to read from stdin")? else {
                    stdin_open = false;
                    commands.send(SessionCommand::Quit).await.ok();
                    continue;
                };
                if awaiting_confirm {
                    awaiting_confirm = false;
                    if line.trim().eq_ignore_ascii_case("y") {
                        commands.send(SessionCommand::Finish).await.ok();
                    } else {
                        println!("Submission cancelled.");
                    }
                    continue;
                }
                match parse_student_input(&line) {
                    Err(message) => println!("{message} (h for help)"),
                    Ok(input) => {
                        if let Some(command) = translate(input, view.as_ref(), &mut awaiting_confirm) {
                            if commands.send(command).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StudentInput {
    Choose(String),
    Clear,
    Next,
    Prev,
    Goto(u32),
    Overview,
    Finish,
    Refresh,
    Help,
    Quit,
}

pub(crate) fn parse_student_input(line: &str) -> Result<StudentInput, String> {
    let mut parts = line.split_whitespace();
    let Some(head) = parts.next() else {
        return Err("empty command".to_string());
    };
    let rest: Vec<&str> = parts.collect();

    let input = match head.to_ascii_lowercase().as_str() {
        "n" | "next" => StudentInput::Next,
        "p" | "prev" => StudentInput::Prev,
        "c" | "clear" => StudentInput::Clear,
        "o" | "overview" => StudentInput::Overview,
        "f" | "finish" => StudentInput::Finish,
        "r" => StudentInput::Refresh,
        "h" | "?" | "help" => StudentInput::Help,
        "q" | "quit" | "exit" => StudentInput::Quit,
        "g" | "goto" => {
            let Some(raw) = rest.first() else {
                return Err("goto needs a question number".to_string());
            };
            let number: u32 =
                raw.parse().map_err(|_| format!("not a question number: {raw}"))?;
            if number == 0 {
                return Err("question numbers start at 1".to_string());
            }
            return Ok(StudentInput::Goto(number));
        }
        choice if rest.is_empty() => return Ok(StudentInput::Choose(choice.to_string())),
        other => return Err(format!("unknown command: {other}")),
    };
    if !rest.is_empty() {
        return Err(format!("{head} takes no arguments"));
    }
    Ok(input)
}

/// Maps parsed input onto a runner command, using the latest snapshot to
/// resolve option keys and the current question. Inputs that only concern
/// the console (help, an invalid choice, the submit confirmation) return
/// `None`.
fn translate(
    input: StudentInput,
    view: Option<&ViewSnapshot>,
    awaiting_confirm: &mut bool,
) -> Option<SessionCommand> {
    match input {
        StudentInput::Choose(choice) => {
            let question = view.and_then(|view| view.question.as_ref())?;
            let option =
                question.options.iter().find(|option| option.key.eq_ignore_ascii_case(&choice));
            match option {
                Some(option) => Some(SessionCommand::Answer {
                    question_number: question.question_number,
                    option: option.key.clone(),
                }),
                None => {
                    println!("No option {choice} on this question.");
                    None
                }
            }
        }
        StudentInput::Clear => {
            let question = view.and_then(|view| view.question.as_ref())?;
            Some(SessionCommand::Clear { question_number: question.question_number })
        }
        StudentInput::Next => Some(SessionCommand::Next),
        StudentInput::Prev => Some(SessionCommand::Prev),
        StudentInput::Goto(number) => Some(SessionCommand::Goto { index: number as usize - 1 }),
        StudentInput::Overview => {
            if let Some(view) = view {
                render_overview(view);
            }
            None
        }
        StudentInput::Finish => {
            let unanswered = view.map(|view| view.total - view.answered).unwrap_or(0);
            if unanswered > 0 {
                println!("{unanswered} question(s) unanswered. Submit anyway? (y/n)");
                *awaiting_confirm = true;
                None
            } else {
                Some(SessionCommand::Finish)
            }
        }
        StudentInput::Refresh => Some(SessionCommand::Render),
        StudentInput::Help => {
            print_help();
            None
        }
        StudentInput::Quit => Some(SessionCommand::Quit),
    }
}

fn render_event(event: SessionEvent, view: &mut Option<ViewSnapshot>) {
    match event {
        SessionEvent::Snapshot(snapshot) => {
            render_snapshot(&snapshot);
            *view = Some(snapshot);
        }
        SessionEvent::Notice(text) => println!("! {text}"),
        SessionEvent::Warning(CountdownWarning::FiveMinutes) => {
            println!("\n*** 5 minutes remaining ***");
        }
        SessionEvent::Warning(CountdownWarning::OneMinute) => {
            println!("\n*** 1 minute remaining ***");
        }
        SessionEvent::Countdown { remaining_seconds } => {
            if let Some(view) = view.as_mut() {
                view.remaining_seconds = remaining_seconds;
            }
            print!("\r{} left   ", format_clock(remaining_seconds));
            let _ = std::io::stdout().flush();
        }
        SessionEvent::AutoSubmitStarted => {
            println!("\nTime is up. Submitting your answers...");
        }
        SessionEvent::FinishFailed { auto: true, detail } => {
            println!("Submission failed: {detail}. Retrying until it goes through...");
        }
        SessionEvent::FinishFailed { auto: false, detail } => {
            println!("Submission failed: {detail}. Your answers are still saved; try f again.");
        }
        SessionEvent::Completed { summary } => {
            println!("\nSession submitted.");
            if let Some(summary) = summary {
                if let (Some(correct), Some(total)) = (summary.correct_count, summary.total_questions)
                {
                    println!("Correct answers: {correct}/{total}");
                }
                if let Some(score) = summary.score {
                    println!("Score: {score}");
                }
            }
        }
    }
}

fn render_snapshot(snapshot: &ViewSnapshot) {
    println!();
    let Some(question) = &snapshot.question else {
        println!("This session has no questions.");
        return;
    };
    println!(
        "Question {} of {} | answered {}/{} | {} left",
        snapshot.current_index + 1,
        snapshot.total,
        snapshot.answered,
        snapshot.total,
        format_clock(snapshot.remaining_seconds),
    );
    println!("{}", question.prompt_text);
    for option in &question.options {
        let marker =
            if snapshot.answer.as_deref() == Some(option.key.as_str()) { ">" } else { " " };
        println!(" {marker} [{}] {}", option.key, option.text);
    }
}

fn render_overview(view: &ViewSnapshot) {
    if view.answered_questions.is_empty() {
        println!("No questions answered yet (0/{}).", view.total);
        return;
    }
    let listed = view
        .answered_questions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    println!("Answered {}/{}: {listed}", view.answered, view.total);
}

fn print_help() {
    println!("Commands:");
    println!("  <key>      answer the current question with that option");
    println!("  c          clear the current question's answer");
    println!("  n / p      next / previous question");
    println!("  g <n>      go to question n");
    println!("  o          overview of answered questions");
    println!("  f          finish and submit the session");
    println!("  r          repaint the current question");
    println!("  q          quit without submitting");
}
