//! Chat media downloader - CLI entry point.

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

use chat_media_downloader::{
    cli::{ctrl_c_presses, watch_interrupts, Args},
    config::{validate_config, Config},
    download::{self, RunOptions},
    error::{exit_codes, Error, Result},
    fs::{ensure_dir, get_archive_folder, relocate},
    output::{
        create_message_spinner, print_banner, print_config_summary, print_error, print_info,
        print_relocation_summary, print_run_summary, print_success, print_warning,
    },
    source::ExportSource,
};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            print_error(&format!("{}", e));
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run() -> Result<i32> {
    // Parse CLI arguments
    let args = Args::parse();
    args.validate()?;

    // Set up logging
    let log_level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    fmt().with_env_filter(filter).with_target(false).init();

    print_banner();

    // First Ctrl-C stops at the next batch boundary, a second one quits
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if watch_interrupts(ctrl_c_presses(), on_interrupt).await {
            print_error("Interrupted again, quitting without waiting for the batch");
            std::process::exit(exit_codes::ABORT);
        }
    });

    let mut exit_code = exit_codes::SUCCESS;

    // Process each config
    for config_path in &args.config {
        if cancel.is_cancelled() {
            print_warning(&format!("Skipping {}: interrupted", config_path.display()));
            continue;
        }
        if args.config.len() > 1 {
            print_info(&format!("Processing {}", config_path.display()));
        }

        let code = match process_chat(&args, config_path, &cancel).await {
            Ok(code) => code,
            Err(e) => {
                print_error(&format!("Failed to process {}: {}", config_path.display(), e));
                e.exit_code()
            }
        };
        if exit_code == exit_codes::SUCCESS {
            exit_code = code;
        }
    }

    if cancel.is_cancelled() {
        return Ok(exit_codes::ABORT);
    }
    if exit_code == exit_codes::SUCCESS {
        print_success("All done");
    }
    Ok(exit_code)
}

/// Download one chat's media as described by the config at `config_path`.
async fn process_chat(args: &Args, config_path: &Path, cancel: &CancellationToken) -> Result<i32> {
    // Load configuration
    let mut config = if config_path.exists() {
        Config::load(config_path)?
    } else {
        print_warning(&format!(
            "Configuration file not found: {}",
            config_path.display()
        ));
        print_info("Using default configuration with CLI arguments");
        Config::default()
    };

    // Merge CLI arguments into config
    args.merge_into_config(&mut config);

    validate_config(&config)?;

    let download_dir = config.download_directory();
    ensure_dir(&download_dir).await?;

    print_config_summary(
        &config.chat.chat_id,
        &config.media.media_types,
        &download_dir,
        config.progress.last_read_message_id,
        config.progress.ids_to_retry.len(),
    );

    // Open the message source
    let export_dir = config.chat.export_directory.clone().ok_or_else(|| {
        Error::MissingConfig("chat.export_directory (or --export)".to_string())
    })?;
    let source = ExportSource::open(&export_dir)?;
    if !source.serves(&config.chat.chat_id) {
        return Err(Error::Export(format!(
            "{} does not contain chat '{}'",
            export_dir.display(),
            config.chat.chat_id
        )));
    }
    print_info(&format!(
        "Reading export of {} ({} messages)",
        source.chat_name().unwrap_or(&config.chat.chat_id),
        source.message_count()
    ));

    let progress = (!args.quiet).then(|| create_message_spinner(&config.chat.chat_id));
    let options = RunOptions {
        config_path: Some(config_path.to_path_buf()),
        cancel: cancel.clone(),
        progress: progress.clone(),
    };

    let outcome = download::run(&source, &mut config, &options).await;
    if let Some(spinner) = &progress {
        spinner.finish_and_clear();
    }
    let result = outcome?;

    print_run_summary(&result);

    if result.cancelled {
        print_warning("Run interrupted; progress was saved and the next run resumes from it");
        return Ok(exit_codes::ABORT);
    }

    if let Some(archive_folder) = get_archive_folder(&config)? {
        print_info(&format!("Moving downloads to {}", archive_folder.display()));
        let report = relocate(&download_dir, &archive_folder, &config.media.media_types).await?;
        print_relocation_summary(&report);
    }

    if !result.failed.is_empty() {
        return Ok(exit_codes::SOME_ITEMS_FAILED);
    }

    Ok(exit_codes::SUCCESS)
}
