//! Command-line argument definitions using clap.

use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;
use crate::error::{Error, Result};

/// Chat media downloader CLI.
#[derive(Parser, Debug)]
#[command(
    name = "chat-media-downloader",
    version,
    about = "Download media attached to chat messages",
    long_about = "Downloads audio, documents, photos, videos, voice notes and video notes \
                  from a chat's history.\n\n\
                  Progress is checkpointed after every batch, so an interrupted run resumes \
                  where it stopped. Failed downloads are retried on the next run."
)]
pub struct Args {
    /// Configuration files, one per chat. Processed in order.
    #[arg(
        short,
        long,
        num_args = 1..,
        default_value = "config.toml",
        env = "CHAT_MEDIA_CONFIG"
    )]
    pub config: Vec<PathBuf>,

    /// Chat export directory (containing result.json) to read messages from.
    #[arg(short, long, env = "CHAT_MEDIA_EXPORT")]
    pub export: Option<PathBuf>,

    /// Chat username or numeric id.
    #[arg(long)]
    pub chat: Option<String>,

    /// Base directory for downloads.
    #[arg(short = 'd', long = "directory")]
    pub download_directory: Option<PathBuf>,

    /// Move finished downloads into this directory after the run.
    #[arg(short, long)]
    pub archive: Option<PathBuf>,

    /// Messages per batch (and per checkpoint).
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Seconds to wait before retrying a timed out download.
    #[arg(long)]
    pub retry_delay: Option<u64>,

    /// Hide download progress information.
    #[arg(long, short)]
    pub quiet: bool,

    /// Enable debug logging.
    #[arg(long)]
    pub debug: bool,
}

impl Args {
    /// Reject per-chat overrides when several configs are given.
    pub fn validate(&self) -> Result<()> {
        if self.config.len() < 2 {
            return Ok(());
        }

        let per_chat = [
            ("chat", self.chat.is_some()),
            ("export", self.export.is_some()),
        ];
        match per_chat.iter().find(|(_, given)| *given) {
            Some((flag, _)) => Err(Error::ConfigValidation {
                field: format!("--{}", flag),
                message: "only allowed with a single --config".to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Merge CLI arguments into an existing config, overriding where specified.
    pub fn merge_into_config(&self, config: &mut Config) {
        if let Some(chat) = &self.chat {
            config.chat.chat_id = chat.clone();
        }

        if let Some(export) = &self.export {
            config.chat.export_directory = Some(export.clone());
        }

        if let Some(dir) = &self.download_directory {
            config.options.download_directory = Some(dir.clone());
        }

        if let Some(dir) = &self.archive {
            config.options.archive_directory = Some(dir.clone());
        }

        if let Some(page_size) = self.page_size {
            config.options.page_size = page_size;
        }

        if let Some(delay) = self.retry_delay {
            config.options.retry_delay_seconds = delay;
        }

        if self.quiet {
            config.options.show_downloads = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_overrides_only_given_values() {
        let args = Args::parse_from([
            "chat-media-downloader",
            "--export",
            "/exports/chat",
            "--chat",
            "@my_channel",
            "--page-size",
            "25",
            "--quiet",
        ]);

        let mut config = Config::default();
        config.options.retry_delay_seconds = 9;
        args.merge_into_config(&mut config);

        assert_eq!(config.chat.chat_id, "@my_channel");
        assert_eq!(
            config.chat.export_directory,
            Some(PathBuf::from("/exports/chat"))
        );
        assert_eq!(config.options.page_size, 25);
        assert_eq!(config.options.retry_delay_seconds, 9);
        assert!(!config.options.show_downloads);
        assert_eq!(config.options.archive_directory, None);
        assert_eq!(args.config, vec![PathBuf::from("config.toml")]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_several_configs() {
        let args = Args::parse_from([
            "chat-media-downloader",
            "--config",
            "books.toml",
            "music.toml",
            "--page-size",
            "10",
        ]);

        assert_eq!(
            args.config,
            vec![PathBuf::from("books.toml"), PathBuf::from("music.toml")]
        );
        assert!(args.validate().is_ok());

        let mut config = Config::default();
        config.chat.export_directory = Some(PathBuf::from("/exports/books"));
        args.merge_into_config(&mut config);
        assert_eq!(
            config.chat.export_directory,
            Some(PathBuf::from("/exports/books"))
        );
    }

    #[test]
    fn test_chat_override_needs_single_config() {
        let args = Args::parse_from([
            "chat-media-downloader",
            "-c",
            "a.toml",
            "b.toml",
            "--chat",
            "@my_channel",
        ]);

        assert!(matches!(
            args.validate(),
            Err(Error::ConfigValidation { field, .. }) if field == "--chat"
        ));
    }
}
