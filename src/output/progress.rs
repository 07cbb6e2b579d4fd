//! Progress bar utilities.

use indicatif::{ProgressBar, ProgressStyle};

/// Spinner counting settled messages during a run.
pub fn create_message_spinner(chat: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} {pos} messages ({elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("Processing {}:", chat));
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner
}
