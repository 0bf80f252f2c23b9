pub(crate) mod author;
pub(crate) mod practice;
pub(crate) mod student;

use anyhow::{anyhow, Result};

const USAGE: &str = "usage: cbt-console [--token <session-token>] [--practice [--topic <id>]]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConsoleMode {
    Session { token: Option<String> },
    Practice { topic: Option<String> },
}

pub(crate) fn parse_console_args(mut args: impl Iterator<Item = String>) -> Result<ConsoleMode> {
    let mut token = None;
    let mut practice = false;
    let mut topic = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--token" => {
                token = Some(args.next().ok_or_else(|| anyhow!("--token missing value"))?);
            }
            "--practice" => practice = true,
            "--topic" => {
                topic = Some(args.next().ok_or_else(|| anyhow!("--topic missing value"))?);
            }
            "--help" | "-h" => return Err(anyhow!(USAGE)),
            _ => return Err(anyhow!("Unknown argument: {arg}\n{USAGE}")),
        }
    }

    if practice {
        Ok(ConsoleMode::Practice { topic })
    } else if topic.is_some() {
        Err(anyhow!("--topic only applies to --practice\n{USAGE}"))
    } else {
        Ok(ConsoleMode::Session { token })
    }
}
