use error_stack::{Report, ResultExt};
use log::LevelFilter;

use crate::error::AuthError;

/// Initialize logging for the application.
/// Should be called once at the start of `main()`; later calls fail.
///
/// # Errors
///
/// Returns [`AuthError::Configuration`] if a global logger is already set.
pub fn init_logging(level: LevelFilter) -> Result<(), Report<AuthError>> {
    dispatch(level)
        .chain(std::io::stderr())
        .apply()
        .change_context(AuthError::Configuration {
            message: "Failed to initialize logger".to_string(),
        })
}

fn dispatch(level: LevelFilter) -> fern::Dispatch {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}  {} [{}] {}",
                chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
}
