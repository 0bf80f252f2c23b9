//! Authoring commands for drag-and-drop questions: list what the backend
//! has, validate a local draft file, edit one interactively, push a draft
//! as a create or update.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::authoring::{load_draft, save_draft, QuestionDraft};
use crate::backend::BackendClient;
use crate::core::config::Settings;
use crate::domain::QuestionVariant;

const USAGE: &str =
    "usage: cbt-author <list [--topic <id>] | check <draft.json> | edit <draft.json> | push <draft.json>>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AuthorCommand {
    List { topic: Option<String> },
    Check { path: PathBuf },
    Edit { path: PathBuf },
    Push { path: PathBuf },
}

pub(crate) fn parse_author_args(mut args: impl Iterator<Item = String>) -> Result<AuthorCommand> {
    let Some(command) = args.next() else {
        return Err(anyhow!(USAGE));
    };
    match command.as_str() {
        "list" => {
            let mut topic = None;
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--topic" => {
                        topic = Some(args.next().ok_or_else(|| anyhow!("--topic missing value"))?);
                    }
                    _ => return Err(anyhow!("Unknown argument: {arg}\n{USAGE}")),
                }
            }
            Ok(AuthorCommand::List { topic })
        }
        "check" => Ok(AuthorCommand::Check { path: single_path(&mut args, "check")? }),
        "edit" => Ok(AuthorCommand::Edit { path: single_path(&mut args, "edit")? }),
        "push" => Ok(AuthorCommand::Push { path: single_path(&mut args, "push")? }),
        other => Err(anyhow!("Unknown command: {other}\n{USAGE}")),
    }
}

fn single_path(args: &mut impl Iterator<Item = String>, command: &str) -> Result<PathBuf> {
    let path = args.next().ok_or_else(|| anyhow!("{command} needs a draft file\n{USAGE}"))?;
    if let Some(extra) = args.next() {
        return Err(anyhow!("Unexpected argument: {extra}\n{USAGE}"));
    }
    Ok(PathBuf::from(path))
}

pub(crate) async fn run_author_command(settings: &Settings, command: AuthorCommand) -> Result<()> {
    match command {
        AuthorCommand::List { topic } => {
            let client = BackendClient::from_settings(settings.backend())?;
            let questions = client.fetch_drag_drop_questions(topic.as_deref()).await?;
            if questions.is_empty() {
                println!("No drag-drop questions found.");
                return Ok(());
            }
            for question in &questions {
                println!(
                    "{}  {:<8}  {:>2} items  {:>2} slots  {}",
                    question.id,
                    question.variant.as_str(),
                    question.items.len(),
                    question.slots.len(),
                    first_line(&question.prompt_text),
                );
            }
            println!("{} question(s).", questions.len());
        }
        AuthorCommand::Check { path } => {
            let draft = load_draft(&path)?;
            describe_draft(&draft);
            println!("Draft OK.");
        }
        AuthorCommand::Edit { path } => run_editor(&path).await?,
        AuthorCommand::Push { path } => {
            let draft = load_draft(&path)?;
            let client = BackendClient::from_settings(settings.backend())?;
            match &draft.id {
                Some(id) => {
                    let stored = client.update_drag_drop_question(id, &draft).await?;
                    tracing::info!(id = %stored.id, "question updated");
                    println!("Updated question {}.", stored.id);
                }
                None => {
                    let stored = client.create_drag_drop_question(&draft).await?;
                    tracing::info!(id = %stored.id, "question created");
                    println!("Created question {}.", stored.id);
                }
            }
        }
    }
    Ok(())
}

fn describe_draft(draft: &QuestionDraft) {
    let target = match &draft.id {
        Some(id) => format!("update of {id}"),
        None => "new question".to_string(),
    };
    println!("{} ({target})", first_line(&draft.prompt_text));
    match draft.variant {
        QuestionVariant::Ordering => {
            println!("ORDERING: {} items over {} positions", draft.items.len(), draft.slots.len().max(draft.items.len()));
        }
        QuestionVariant::Matching => {
            println!(
                "MATCHING: {} items, {} slots, {} key pair(s)",
                draft.items.len(),
                draft.slots.len(),
                draft.key_pairs.len()
            );
        }
    }
}

fn first_line(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default();
    let mut shown: String = line.chars().take(60).collect();
    if line.chars().count() > 60 {
        shown.push_str("...");
    }
    shown
}

/// Line-command editor over a draft file. Starts from the file when it
/// exists, otherwise from an empty MATCHING draft; `save` validates first
/// so the file on disk always loads back.
async fn run_editor(path: &Path) -> Result<()> {
    let mut draft = if path.exists() {
        let draft = load_draft(path)?;
        println!("Editing {}.", path.display());
        draft
    } else {
        println!("Nothing at {} yet; starting a new draft.", path.display());
        blank_draft()
    };
    show_draft(&draft);
    println!("Type h for the command list.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut dirty = false;
    loop {
        let Some(line) = lines.next_line().await.context("failed to read from stdin")? else {
            break;
        };
        match parse_edit_input(&line) {
            Err(message) => println!("{message} (h for help)"),
            Ok(EditInput::Change(change)) => match apply_change(&mut draft, change) {
                Ok(message) => {
                    dirty = true;
                    println!("{message}");
                }
                Err(message) => println!("{message}"),
            },
            Ok(EditInput::Show) => show_draft(&draft),
            Ok(EditInput::Save) => match draft.validate() {
                Err(err) => println!("Not saved: {err}"),
                Ok(()) => {
                    save_draft(path, &draft)?;
                    dirty = false;
                    println!("Saved {}.", path.display());
                }
            },
            Ok(EditInput::Help) => print_edit_help(),
            Ok(EditInput::Quit) => break,
        }
    }
    if dirty {
        println!("Unsaved changes were not written to {}.", path.display());
    }
    Ok(())
}

fn blank_draft() -> QuestionDraft {
    QuestionDraft {
        id: None,
        prompt_text: String::new(),
        variant: QuestionVariant::Matching,
        items: Vec::new(),
        slots: Vec::new(),
        key_pairs: Vec::new(),
    }
}

fn show_draft(draft: &QuestionDraft) {
    describe_draft(draft);
    for (index, item) in draft.items.iter().enumerate() {
        let position = index as u32 + 1;
        let mapped = draft
            .key_pairs
            .iter()
            .find(|pair| pair.item_order == position)
            .map(|pair| format!("  -> slot {}", pair.slot_order))
            .unwrap_or_default();
        println!("  item {position}: {}{mapped}", item.label);
    }
    for (index, slot) in draft.slots.iter().enumerate() {
        println!("  slot {}: {}", index + 1, slot.label);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EditInput {
    Change(DraftChange),
    Show,
    Save,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DraftChange {
    Prompt(String),
    Kind(QuestionVariant),
    AddItem(String),
    AddSlot(String),
    RemoveItem(u32),
    RemoveSlot(u32),
    SetKey { item: u32, slot: u32 },
    ClearKey(u32),
}

pub(crate) fn parse_edit_input(line: &str) -> Result<EditInput, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err("empty command".to_string());
    }
    let (head, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (trimmed, ""),
    };

    let parse_position = |raw: &str| -> Result<u32, String> {
        let number: u32 = raw.parse().map_err(|_| format!("not a position: {raw}"))?;
        if number == 0 {
            return Err("positions start at 1".to_string());
        }
        Ok(number)
    };

    match head.to_ascii_lowercase().as_str() {
        "prompt" => {
            if rest.is_empty() {
                return Err("prompt needs text, e.g. prompt Match each capital".to_string());
            }
            Ok(EditInput::Change(DraftChange::Prompt(rest.to_string())))
        }
        "kind" => match QuestionVariant::parse(rest) {
            Some(variant) => Ok(EditInput::Change(DraftChange::Kind(variant))),
            None => Err("kind is MATCHING or ORDERING".to_string()),
        },
        "item" => {
            if rest.is_empty() {
                return Err("item needs a label, e.g. item Oslo".to_string());
            }
            Ok(EditInput::Change(DraftChange::AddItem(rest.to_string())))
        }
        "slot" => {
            if rest.is_empty() {
                return Err("slot needs a label, e.g. slot Norway".to_string());
            }
            Ok(EditInput::Change(DraftChange::AddSlot(rest.to_string())))
        }
        "rmitem" => match rest.split_whitespace().collect::<Vec<_>>().as_slice() {
            [position] => Ok(EditInput::Change(DraftChange::RemoveItem(parse_position(position)?))),
            _ => Err("rmitem needs an item position, e.g. rmitem 2".to_string()),
        },
        "rmslot" => match rest.split_whitespace().collect::<Vec<_>>().as_slice() {
            [position] => Ok(EditInput::Change(DraftChange::RemoveSlot(parse_position(position)?))),
            _ => Err("rmslot needs a slot position, e.g. rmslot 2".to_string()),
        },
        "key" => match rest.split_whitespace().collect::<Vec<_>>().as_slice() {
            [item, slot] => Ok(EditInput::Change(DraftChange::SetKey {
                item: parse_position(item)?,
                slot: parse_position(slot)?,
            })),
            _ => Err("key needs an item and a slot, e.g. key 2 1".to_string()),
        },
        "unkey" => match rest.split_whitespace().collect::<Vec<_>>().as_slice() {
            [item] => Ok(EditInput::Change(DraftChange::ClearKey(parse_position(item)?))),
            _ => Err("unkey needs an item position, e.g. unkey 2".to_string()),
        },
        "show" if rest.is_empty() => Ok(EditInput::Show),
        "save" if rest.is_empty() => Ok(EditInput::Save),
        "h" | "?" | "help" if rest.is_empty() => Ok(EditInput::Help),
        "q" | "quit" | "exit" if rest.is_empty() => Ok(EditInput::Quit),
        other => Err(format!("unknown command: {other}")),
    }
}

/// Ok means the draft changed; Err reports why nothing did.
fn apply_change(draft: &mut QuestionDraft, change: DraftChange) -> Result<String, String> {
    match change {
        DraftChange::Prompt(text) => {
            draft.prompt_text = text;
            Ok("Prompt set.".to_string())
        }
        DraftChange::Kind(variant) => {
            draft.variant = variant;
            Ok(format!("Now a {} draft.", variant.as_str()))
        }
        DraftChange::AddItem(label) => {
            draft.add_item(label, None);
            Ok(format!("Item {} added.", draft.items.len()))
        }
        DraftChange::AddSlot(label) => {
            draft.add_slot(label, None);
            Ok(format!("Slot {} added.", draft.slots.len()))
        }
        DraftChange::RemoveItem(position) => {
            if draft.remove_item(position) {
                Ok(format!("Item {position} removed."))
            } else {
                Err(format!("No item {position}."))
            }
        }
        DraftChange::RemoveSlot(position) => {
            if draft.remove_slot(position) {
                Ok(format!("Slot {position} removed."))
            } else {
                Err(format!("No slot {position}."))
            }
        }
        DraftChange::SetKey { item, slot } => match draft.set_key_pair(item, slot) {
            Ok(()) => Ok(format!("Key set: item {item} -> slot {slot}.")),
            Err(err) => Err(err.to_string()),
        },
        DraftChange::ClearKey(item) => {
            if draft.clear_key_pair(item) {
                Ok(format!("Key cleared for item {item}."))
            } else {
                Err(format!("Item {item} has no key pair."))
            }
        }
    }
}

fn print_edit_help() {
    println!("Commands:");
    println!("  prompt <text>      set the question prompt");
    println!("  kind <MATCHING|ORDERING>  switch the question kind");
    println!("  item <label>       append an item");
    println!("  slot <label>       append a slot");
    println!("  rmitem <pos>       remove an item (later items renumber)");
    println!("  rmslot <pos>       remove a slot (later slots renumber)");
    println!("  key <item> <slot>  declare the correct slot for an item");
    println!("  unkey <item>       drop an item's key pair");
    println!("  show               print the draft");
    println!("  save               validate and write the file");
    println!("  q                  leave the editor");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::KeyPair;

    fn parse(args: &[&str]) -> Result<AuthorCommand> {
        parse_author_args(args.iter().map(ToString::to_string))
    }

    #[test]
    fn list_parses_with_and_without_topic() {
        assert_eq!(parse(&["list"]).unwrap(), AuthorCommand::List { topic: None });
        assert_eq!(
            parse(&["list", "--topic", "waves"]).unwrap(),
            AuthorCommand::List { topic: Some("waves".to_string()) }
        );
    }

    #[test]
    fn check_edit_and_push_take_exactly_one_path() {
        assert_eq!(
            parse(&["check", "draft.json"]).unwrap(),
            AuthorCommand::Check { path: PathBuf::from("draft.json") }
        );
        assert_eq!(
            parse(&["edit", "draft.json"]).unwrap(),
            AuthorCommand::Edit { path: PathBuf::from("draft.json") }
        );
        assert_eq!(
            parse(&["push", "q/draft.json"]).unwrap(),
            AuthorCommand::Push { path: PathBuf::from("q/draft.json") }
        );
        assert!(parse(&["check"]).is_err());
        assert!(parse(&["edit"]).is_err());
        assert!(parse(&["push", "a.json", "b.json"]).is_err());
    }

    #[test]
    fn missing_or_unknown_commands_fail_with_usage() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["frobnicate"]).is_err());
        assert!(parse(&["list", "--colour"]).is_err());
    }

    #[test]
    fn first_line_truncates_long_prompts() {
        let long = "x".repeat(80);
        assert_eq!(first_line(&long).len(), 63);
        assert_eq!(first_line("short\nsecond line"), "short");
    }

    #[test]
    fn edit_commands_parse() {
        assert_eq!(
            parse_edit_input("prompt Match each capital").unwrap(),
            EditInput::Change(DraftChange::Prompt("Match each capital".to_string()))
        );
        assert_eq!(
            parse_edit_input("kind ordering").unwrap(),
            EditInput::Change(DraftChange::Kind(QuestionVariant::Ordering))
        );
        assert_eq!(
            parse_edit_input("item Oslo").unwrap(),
            EditInput::Change(DraftChange::AddItem("Oslo".to_string()))
        );
        assert_eq!(
            parse_edit_input("key 2 1").unwrap(),
            EditInput::Change(DraftChange::SetKey { item: 2, slot: 1 })
        );
        assert_eq!(
            parse_edit_input("rmslot 1").unwrap(),
            EditInput::Change(DraftChange::RemoveSlot(1))
        );
        assert_eq!(parse_edit_input("save").unwrap(), EditInput::Save);
        assert_eq!(parse_edit_input("q").unwrap(), EditInput::Quit);
    }

    #[test]
    fn malformed_edit_commands_are_rejected() {
        assert!(parse_edit_input("prompt").is_err());
        assert!(parse_edit_input("kind matrix").is_err());
        assert!(parse_edit_input("rmitem 0").is_err());
        assert!(parse_edit_input("key 1").is_err());
        assert!(parse_edit_input("save now").is_err());
        assert!(parse_edit_input("").is_err());
    }

    #[test]
    fn apply_change_builds_a_draft_and_keys_follow_removals() {
        let mut draft = blank_draft();
        for change in [
            DraftChange::Prompt("Match each capital".to_string()),
            DraftChange::AddItem("Oslo".to_string()),
            DraftChange::AddItem("Madrid".to_string()),
            DraftChange::AddSlot("Norway".to_string()),
            DraftChange::AddSlot("Spain".to_string()),
            DraftChange::SetKey { item: 1, slot: 1 },
            DraftChange::SetKey { item: 2, slot: 2 },
        ] {
            apply_change(&mut draft, change).unwrap();
        }
        assert!(draft.validate().is_ok());

        assert_eq!(
            apply_change(&mut draft, DraftChange::RemoveItem(9)).unwrap_err(),
            "No item 9."
        );
        apply_change(&mut draft, DraftChange::RemoveItem(1)).unwrap();
        assert_eq!(draft.key_pairs, vec![KeyPair { item_order: 1, slot_order: 2 }]);
    }
}
