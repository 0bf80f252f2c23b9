//! Drag-and-drop practice without a session or a clock. Placements are
//! replayed through the gesture recognizer as the pointer sequence a
//! pointing device would produce, then land on the board.

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::backend::BackendClient;
use crate::board::gesture::{DragRecognizer, DragState, PointerKind};
use crate::board::AnswerBoard;
use crate::core::config::{GestureSettings, Settings};
use crate::domain::DragDropQuestion;

pub(crate) async fn run_practice(settings: &Settings, topic: Option<String>) -> Result<()> {
    let client = BackendClient::from_settings(settings.backend())?;
    let questions = client
        .fetch_drag_drop_questions(topic.as_deref())
        .await
        .context("Failed to load drag-drop questions")?;
    if questions.is_empty() {
        println!("No drag-drop questions available.");
        return Ok(());
    }
    tracing::info!(count = questions.len(), topic = topic.as_deref(), "practice set loaded");
    println!("Loaded {} question(s). Type h for the command list.", questions.len());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut totals = PracticeTotals::default();
    for (position, question) in questions.into_iter().enumerate() {
        println!("\n=== Question {} ===", position + 1);
        match practice_one(question, settings.gesture(), &mut lines, &mut totals).await? {
            Flow::Continue => {}
            Flow::Quit => break,
        }
    }

    if totals.graded > 0 {
        println!(
            "\nPractice finished: {}/{} placements correct across {} graded question(s).",
            totals.correct, totals.placements, totals.graded
        );
    }
    Ok(())
}

#[derive(Debug, Default)]
struct PracticeTotals {
    graded: usize,
    correct: usize,
    placements: usize,
}

enum Flow {
    Continue,
    Quit,
}

async fn practice_one(
    question: DragDropQuestion,
    gesture: &GestureSettings,
    lines: &mut Lines<BufReader<Stdin>>,
    totals: &mut PracticeTotals,
) -> Result<Flow> {
    let mut board = AnswerBoard::new(question);
    let mut recognizer = DragRecognizer::new(gesture);
    let presentation = presentation_order(board.question());
    let drag_px = gesture.pointer_distance_px + 4.0;
    let mut clock_ms: u64 = 0;
    render_board(&board, &presentation);

    loop {
        let Some(line) =
            lines.next_line().await.context("failed to read from stdin")?
        else {
            return Ok(Flow::Quit);
        };
        match parse_practice_input(&line) {
            Err(message) => println!("{message} (h for help)"),
            Ok(PracticeInput::Place { item, slot }) => {
                match place_via_drag(&mut board, &mut recognizer, &mut clock_ms, drag_px, item, slot)
                {
                    Err(message) => println!("{message}"),
                    Ok(true) => render_board(&board, &presentation),
                    Ok(false) => println!("Nothing moved."),
                }
            }
            Ok(PracticeInput::Hold { item, slot }) => {
                match place_via_hold(
                    &mut board,
                    &mut recognizer,
                    &mut clock_ms,
                    gesture.touch_delay_ms,
                    item,
                    slot,
                ) {
                    Err(message) => println!("{message}"),
                    Ok(true) => render_board(&board, &presentation),
                    Ok(false) => println!("Nothing moved."),
                }
            }
            Ok(PracticeInput::ClearSlot(slot)) => {
                let slot_id = board
                    .question()
                    .slots
                    .iter()
                    .find(|candidate| candidate.slot_order == slot)
                    .map(|candidate| candidate.id.clone());
                match slot_id {
                    None => println!("No slot {slot}."),
                    Some(slot_id) => {
                        if board.unassign_all(&slot_id) > 0 {
                            render_board(&board, &presentation);
                        } else {
                            println!("Slot {slot} is already empty.");
                        }
                    }
                }
            }
            Ok(PracticeInput::Take(item)) => {
                let item_id = board
                    .question()
                    .items
                    .iter()
                    .find(|candidate| candidate.item_order == item)
                    .map(|candidate| candidate.id.clone());
                match item_id {
                    None => println!("No item {item}."),
                    Some(item_id) => {
                        if board.unassign(&item_id) {
                            render_board(&board, &presentation);
                        } else {
                            println!("Item {item} is not placed.");
                        }
                    }
                }
            }
            Ok(PracticeInput::Reset) => {
                let question = board.question().clone();
                board = AnswerBoard::new(question);
                recognizer.cancel();
                render_board(&board, &presentation);
            }
            Ok(PracticeInput::Show) => render_board(&board, &presentation),
            Ok(PracticeInput::Submit) => {
                if !board.is_complete() {
                    println!("{} item(s) still unplaced.", board.unassigned_items().len());
                    continue;
                }
                match board.score_against_key() {
                    Some(score) => {
                        println!("Result: {}/{} correct.", score.correct, score.total);
                        totals.graded += 1;
                        totals.correct += score.correct;
                        totals.placements += score.total;
                    }
                    None => println!("No answer key available for this question."),
                }
                return Ok(Flow::Continue);
            }
            Ok(PracticeInput::Skip) => return Ok(Flow::Continue),
            Ok(PracticeInput::Help) => print_practice_help(),
            Ok(PracticeInput::Quit) => return Ok(Flow::Quit),
        }
    }
}

fn find_ids(
    board: &AnswerBoard,
    item_position: u32,
    slot_position: u32,
) -> Result<(String, String), String> {
    let item_id = board
        .question()
        .items
        .iter()
        .find(|item| item.item_order == item_position)
        .map(|item| item.id.clone())
        .ok_or_else(|| format!("No item {item_position}."))?;
    let slot_id = board
        .question()
        .slots
        .iter()
        .find(|slot| slot.slot_order == slot_position)
        .map(|slot| slot.id.clone())
        .ok_or_else(|| format!("No slot {slot_position}."))?;
    Ok((item_id, slot_id))
}

/// Places one item by item and slot position, both 1-based as rendered,
/// replaying the pointer sequence of a mouse drag.
fn place_via_drag(
    board: &mut AnswerBoard,
    recognizer: &mut DragRecognizer,
    clock_ms: &mut u64,
    drag_px: f64,
    item_position: u32,
    slot_position: u32,
) -> Result<bool, String> {
    let (item_id, slot_id) = find_ids(board, item_position, slot_position)?;

    let origin_y = f64::from(item_position) * 24.0;
    recognizer.press(PointerKind::Mouse, &item_id, 0.0, origin_y, *clock_ms);
    *clock_ms += 16;
    recognizer.moved(drag_px, origin_y, *clock_ms);
    *clock_ms += 16;
    if recognizer.state() != DragState::Active {
        recognizer.cancel();
        return Ok(false);
    }
    match recognizer.release(Some(&slot_id)) {
        Some(drop) => Ok(board.assign(&drop.item_id, &drop.slot_id)),
        None => Ok(false),
    }
}

/// Same placement through the touch path: a motionless long-press that
/// activates once the press delay elapses.
fn place_via_hold(
    board: &mut AnswerBoard,
    recognizer: &mut DragRecognizer,
    clock_ms: &mut u64,
    touch_delay_ms: u64,
    item_position: u32,
    slot_position: u32,
) -> Result<bool, String> {
    let (item_id, slot_id) = find_ids(board, item_position, slot_position)?;

    let origin_y = f64::from(item_position) * 24.0;
    recognizer.press(PointerKind::Touch, &item_id, 0.0, origin_y, *clock_ms);
    *clock_ms += touch_delay_ms + 1;
    if recognizer.poll(*clock_ms) != DragState::Active {
        recognizer.cancel();
        return Ok(false);
    }
    match recognizer.release(Some(&slot_id)) {
        Some(drop) => Ok(board.assign(&drop.item_id, &drop.slot_id)),
        None => Ok(false),
    }
}

/// Listing order for the item tray, shuffled once per question so the tray
/// does not spell out an ordering key.
fn presentation_order(question: &DragDropQuestion) -> Vec<String> {
    let mut order: Vec<String> = question.items.iter().map(|item| item.id.clone()).collect();
    order.shuffle(&mut rand::thread_rng());
    order
}

fn render_board(board: &AnswerBoard, presentation: &[String]) {
    let question = board.question();
    println!("\n{} [{}]", question.prompt_text, question.variant.as_str());

    let unplaced = presentation
        .iter()
        .filter(|id| board.slot_for(id.as_str()).is_none())
        .filter_map(|id| question.items.iter().find(|item| &item.id == id))
        .map(|item| format!("{}. {}", item.item_order, item.label))
        .collect::<Vec<_>>();
    if unplaced.is_empty() {
        println!("Items: all placed");
    } else {
        println!("Items: {}", unplaced.join("  "));
    }

    for slot in &question.slots {
        let occupants = board.occupants_of(&slot.id);
        let shown = if occupants.is_empty() {
            "-".to_string()
        } else {
            occupants.iter().map(|item| item.label.clone()).collect::<Vec<_>>().join(", ")
        };
        println!("  slot {} ({}): {shown}", slot.slot_order, slot.label);
    }
    println!("Placed {}/{}.", board.assignment().len(), question.items.len());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PracticeInput {
    Place { item: u32, slot: u32 },
    Hold { item: u32, slot: u32 },
    Take(u32),
    ClearSlot(u32),
    Reset,
    Show,
    Submit,
    Skip,
    Help,
    Quit,
}

pub(crate) fn parse_practice_input(line: &str) -> Result<PracticeInput, String> {
    let mut parts = line.split_whitespace();
    let Some(head) = parts.next() else {
        return Err("empty command".to_string());
    };
    let rest: Vec<&str> = parts.collect();

    let parse_position = |raw: &str| -> Result<u32, String> {
        let number: u32 = raw.parse().map_err(|_| format!("not a position: {raw}"))?;
        if number == 0 {
            return Err("positions start at 1".to_string());
        }
        Ok(number)
    };

    match head.to_ascii_lowercase().as_str() {
        "m" | "move" => match rest.as_slice() {
            [item, slot] => {
                Ok(PracticeInput::Place { item: parse_position(item)?, slot: parse_position(slot)? })
            }
            _ => Err("move needs an item and a slot, e.g. m 2 1".to_string()),
        },
        "hold" => match rest.as_slice() {
            [item, slot] => {
                Ok(PracticeInput::Hold { item: parse_position(item)?, slot: parse_position(slot)? })
            }
            _ => Err("hold needs an item and a slot, e.g. hold 2 1".to_string()),
        },
        "t" | "take" => match rest.as_slice() {
            [item] => Ok(PracticeInput::Take(parse_position(item)?)),
            _ => Err("take needs an item, e.g. t 2".to_string()),
        },
        "clear" => match rest.as_slice() {
            [slot] => Ok(PracticeInput::ClearSlot(parse_position(slot)?)),
            _ => Err("clear needs a slot, e.g. clear 1".to_string()),
        },
        "reset" if rest.is_empty() => Ok(PracticeInput::Reset),
        "b" | "board" if rest.is_empty() => Ok(PracticeInput::Show),
        "s" | "submit" if rest.is_empty() => Ok(PracticeInput::Submit),
        "skip" if rest.is_empty() => Ok(PracticeInput::Skip),
        "h" | "?" | "help" if rest.is_empty() => Ok(PracticeInput::Help),
        "q" | "quit" | "exit" if rest.is_empty() => Ok(PracticeInput::Quit),
        other => Err(format!("unknown command: {other}")),
    }
}

fn print_practice_help() {
    println!("Commands:");
    println!("  m <item> <slot>   place item into slot (numbers as listed)");
    println!("  hold <item> <slot>  same placement via a touch long-press");
    println!("  t <item>          take an item back off the board");
    println!("  clear <slot>      empty one slot");
    println!("  reset             clear the whole board");
    println!("  b                 show the board");
    println!("  s                 submit this question for grading");
    println!("  skip              move on without grading");
    println!("  q                 leave practice");
}
