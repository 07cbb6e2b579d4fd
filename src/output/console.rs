//! Console output utilities.

use std::path::Path;

use console::style;

use crate::media::{MediaKind, MessageId};

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", style("INFO").cyan().bold(), message);
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", style("OK").green().bold(), message);
}

/// Print a warning message.
pub fn print_warning(message: &str) {
    println!("{} {}", style("WARN").yellow().bold(), message);
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", style("ERROR").red().bold(), message);
}

/// Print the application banner.
pub fn print_banner() {
    let banner = r#"
╔═══════════════════════════════════════════════════════╗
║     Chat Media Downloader                             ║
║     Resumable media downloads from chat history       ║
╚═══════════════════════════════════════════════════════╝
"#;
    println!("{}", style(banner).cyan());
}

/// Print configuration summary.
pub fn print_config_summary(
    chat: &str,
    media_types: &[MediaKind],
    download_dir: &Path,
    resume_after: MessageId,
    backlog: usize,
) {
    let kinds: Vec<&str> = media_types.iter().map(MediaKind::as_str).collect();

    println!();
    println!("{}", style("Configuration:").bold());
    println!("  Chat: {}", chat);
    println!("  Media: {}", kinds.join(", "));
    println!("  Directory: {}", download_dir.display());
    println!("  Resume after: message {}", resume_after);
    if backlog > 0 {
        println!("  Retry backlog: {} message(s)", backlog);
    }
    println!();
}
