//! Stage logging helpers

use std::path::Path;
use std::time::Duration;

/// Log the start of a stage that reads or writes `path`
pub fn log_operation_start(operation: &str, path: &Path) {
    log::info!("{} {}", operation, path.display());
}

/// Log the end of a stage with the number of items handled
pub fn log_operation_complete(operation: &str, path: &Path, items: usize, elapsed: Option<Duration>) {
    match elapsed {
        Some(duration) => log::info!(
            "Successfully {} {} items ({}) in {:?}",
            operation,
            items,
            path.display(),
            duration
        ),
        None => log::info!("Successfully {} {} items ({})", operation, items, path.display()),
    }
}
