use crate::cli::{actions::Action, commands, dispatch::handler, telemetry};
use anyhow::Result;

/// Map verbosity count to tracing level.
const fn get_verbosity_level(verbose_count: u8) -> Option<tracing::Level> {
    match verbose_count {
        0 => None,
        1 => Some(tracing::Level::INFO),
        2 => Some(tracing::Level::DEBUG),
        _ => Some(tracing::Level::TRACE),
    }
}

/// Parse CLI arguments, initialize telemetry, and produce the action to run.
///
/// # Errors
/// Returns an error if telemetry initialization or argument handling fails.
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    let verbosity_level = get_verbosity_level(matches.get_count("verbose"));
    telemetry::init(verbosity_level)?;

    handler(&matches)
}
