//! layerpull - Resumable, verified image layer downloader
//!
//! Resolves an image manifest, downloads every blob with bounded concurrency
//! and prints the verified files.

mod cli;
mod display;
mod error;
mod events;
mod logging;

use crate::cli::Cli;
use crate::display::OutputRenderer;
use crate::error::CliError;
use crate::events::EventHandler;
use clap::Parser;
use layerpull_config::Config;
use layerpull_events::EventReceiver;
use layerpull_net::{PullContext, PullContextBuilder};
use layerpull_types::{ColorChoice, ImageReference, VerifiedBlobFile};
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// How long in-flight work may wind down after Ctrl-C
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    if let Err(e) = run(cli).await {
        error!("Application error: {}", e);
        if !json_mode || matches!(e, CliError::Interrupted) {
            eprintln!("Error: {e}");
        }
        process::exit(e.exit_code());
    }
}

/// Main application logic
async fn run(cli: Cli) -> Result<(), CliError> {
    // Load configuration with proper precedence:
    // 1. Start with file config (or defaults)
    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;

    // 2. Merge environment variables
    config.merge_env()?;

    // 3. Apply CLI flags (highest precedence)
    apply_cli_config(&mut config, &cli);
    config.validate()?;

    init_tracing(cli.global.json, cli.global.debug, &config.general.output_dir);
    info!("Starting layerpull v{}", env!("CARGO_PKG_VERSION"));

    let reference = ImageReference::parse(&cli.image, &config.general.registry)
        .map_err(|e| CliError::InvalidArguments(e.to_string()))?;
    let platform = config.platform();

    let colors_enabled = match config.general.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => console::Term::stderr().features().colors_supported(),
    };
    let mut event_handler = EventHandler::new(colors_enabled, cli.global.debug, cli.global.json);
    let renderer = OutputRenderer::new(cli.global.json);

    let (event_sender, event_receiver) = layerpull_events::channel();
    let cancel = CancellationToken::new();
    let ctx = Arc::new(
        PullContextBuilder::new()
            .with_config(config)
            .with_cancellation(cancel.clone())
            .with_event_sender(event_sender)
            .build()?,
    );

    let files = pull_with_events(
        &ctx,
        &reference,
        &platform,
        &cancel,
        event_receiver,
        &mut event_handler,
    )
    .await?;

    renderer.render_result(&files)?;
    info!(blobs = files.len(), "Pull completed successfully");
    Ok(())
}

/// Run the pull while rendering events; Ctrl-C cancels and waits briefly
async fn pull_with_events(
    ctx: &Arc<PullContext>,
    reference: &ImageReference,
    platform: &layerpull_types::Platform,
    cancel: &CancellationToken,
    mut event_receiver: EventReceiver,
    event_handler: &mut EventHandler,
) -> Result<Vec<VerifiedBlobFile>, CliError> {
    let mut pull_future = Box::pin(layerpull_net::pull(ctx, reference, platform));
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        select! {
            result = &mut pull_future => {
                while let Ok(event) = event_receiver.try_recv() {
                    event_handler.handle_event(event);
                }
                return result.map_err(CliError::from);
            }

            event = event_receiver.recv() => {
                if let Some(event) = event {
                    event_handler.handle_event(event);
                }
            }

            _ = &mut interrupt => {
                warn!("Interrupt received, cancelling downloads");
                cancel.cancel();
                break;
            }
        }
    }

    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        loop {
            select! {
                _ = &mut pull_future => break,
                Some(event) = event_receiver.recv() => event_handler.handle_event(event),
            }
        }
    })
    .await;
    if drained.is_err() {
        warn!("Downloads did not stop within {:?}", SHUTDOWN_GRACE);
    }
    Err(CliError::Interrupted)
}

/// Apply CLI configuration overrides (highest precedence)
fn apply_cli_config(config: &mut Config, cli: &Cli) {
    if let Some(registry) = &cli.registry {
        config.general.registry.clone_from(registry);
    }
    if let Some(threads) = cli.threads {
        config.general.concurrency = threads;
    }
    if let Some(output) = &cli.output {
        config.general.output_dir.clone_from(output);
    }
    if let Some(os) = &cli.os {
        config.general.os.clone_from(os);
    }
    if let Some(arch) = &cli.arch {
        config.general.architecture.clone_from(arch);
    }
    if cli.variant.is_some() {
        config.general.variant.clone_from(&cli.variant);
    }
    if cli.global.insecure {
        config.network.insecure = true;
    }
    if let Some(color) = cli.global.color {
        config.general.color = color;
    }
}

/// Initialize tracing/logging
fn init_tracing(json_mode: bool, debug_enabled_flag: bool, output_dir: &Path) {
    let debug_enabled = std::env::var("RUST_LOG").is_ok() || debug_enabled_flag;
    let file_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new("info,layerpull=debug,layerpull_net=debug")
        })
    };

    if debug_enabled {
        // Debug mode: structured JSON logs to file
        let log_file = output_dir.join(format!(
            "layerpull-{}.log",
            chrono::Utc::now().format("%Y%m%d-%H%M%S")
        ));
        let file = std::fs::create_dir_all(output_dir).and_then(|()| std::fs::File::create(&log_file));

        match file {
            Ok(file) => {
                tracing_subscriber::fmt()
                    .json()
                    .with_writer(file)
                    .with_env_filter(file_filter())
                    .init();
                if !json_mode {
                    eprintln!("Debug logging enabled: {}", log_file.display());
                }
                return;
            }
            Err(e) if !json_mode => {
                eprintln!("Warning: Failed to create log file: {e}");
            }
            Err(_) => {}
        }
    }

    if json_mode {
        // JSON mode: suppress all console output to avoid contaminating JSON
        tracing_subscriber::fmt()
            .with_writer(std::io::sink)
            .with_env_filter("off")
            .init();
    } else {
        // Normal mode: minimal logging to stderr
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("warn,layerpull=warn,layerpull_net=warn")
                }),
            )
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn cli_flags_override_config() {
        let cli = Cli::try_parse_from([
            "layerpull",
            "alpine",
            "-r",
            "mirror.local",
            "-t",
            "99",
            "-o",
            "/data",
            "--arch",
            "arm64",
            "--variant",
            "v8",
            "--insecure",
        ])
        .unwrap();
        let mut config = Config::default();
        apply_cli_config(&mut config, &cli);

        assert_eq!(config.general.registry, "mirror.local");
        assert_eq!(config.general.output_dir, PathBuf::from("/data"));
        assert_eq!(config.concurrency(), 20);
        assert_eq!(config.platform().to_string(), "linux/arm64/v8");
        assert!(config.network.insecure);
    }

    #[test]
    fn absent_flags_keep_config_values() {
        let cli = Cli::try_parse_from(["layerpull", "alpine"]).unwrap();
        let mut config = Config::default();
        config.general.registry = "from-file.example".to_string();
        apply_cli_config(&mut config, &cli);

        assert_eq!(config.general.registry, "from-file.example");
        assert_eq!(config.general.variant, None);
        assert!(!config.network.insecure);
    }
}
