pub(crate) mod authoring;
pub(crate) mod backend;
pub(crate) mod board;
pub(crate) mod console;
pub(crate) mod core;
pub(crate) mod domain;
pub(crate) mod resume;
pub(crate) mod session;

#[cfg(test)]
mod test_support;

use anyhow::anyhow;

use crate::console::ConsoleMode;
use crate::core::{config::Settings, telemetry};
use crate::domain::SessionToken;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_telemetry(settings.telemetry());

    tracing::info!(
        environment = %settings.environment().as_str(),
        backend = %settings.backend().base_url,
        "cbt-console starting"
    );

    match console::parse_console_args(std::env::args().skip(1))? {
        ConsoleMode::Session { token } => {
            let token = token.or_else(|| settings.session().token.clone()).ok_or_else(|| {
                anyhow!("no session token; pass --token or set CBT_SESSION_TOKEN")
            })?;
            console::student::run_session(&settings, SessionToken::new(token)).await
        }
        ConsoleMode::Practice { topic } => console::practice::run_practice(&settings, topic).await,
    }
}

pub async fn run_author() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_telemetry(settings.telemetry());

    let command = console::author::parse_author_args(std::env::args().skip(1))?;
    console::author::run_author_command(&settings, command).await
}
