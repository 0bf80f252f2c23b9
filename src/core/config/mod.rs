mod parsing;
mod settings;
mod types;

pub(crate) use types::{BackendSettings, GestureSettings, Settings, TelemetrySettings};
