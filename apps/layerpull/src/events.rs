//! Event handling and progress display

use crate::logging::log_event_with_tracing;
use console::{Style, Term};
use layerpull_events::{
    AppEvent, AuthEvent, DownloadEvent, EventMessage, GeneralEvent, ManifestEvent, ProgressEvent,
    ResetCause,
};

/// Percent steps printed per blob; finer updates only reach the log
const PERCENT_STEP: u8 = 25;

/// Renders events on stderr and forwards them to tracing
pub struct EventHandler {
    term: Term,
    colors_enabled: bool,
    debug_enabled: bool,
    /// `--json` keeps the console quiet
    quiet: bool,
}

impl EventHandler {
    pub fn new(colors_enabled: bool, debug_enabled: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            colors_enabled,
            debug_enabled,
            quiet,
        }
    }

    /// Handle incoming event
    pub fn handle_event(&mut self, message: EventMessage) {
        log_event_with_tracing(&message);
        if self.quiet {
            return;
        }

        match message.event {
            AppEvent::Manifest(event) => self.handle_manifest(&event),
            AppEvent::Download(event) => self.handle_download(&event),
            AppEvent::Progress(event) => self.handle_progress(&event),
            AppEvent::Auth(AuthEvent::Failed { failure, .. }) => {
                self.show_error(&format!("Authentication failed: {}", failure.message));
            }
            AppEvent::Auth(AuthEvent::TokenAcquired {
                repository, forced, ..
            }) if self.debug_enabled => {
                let how = if forced { "Refreshed" } else { "Acquired" };
                self.show_dim(&format!("{how} token for {repository}"));
            }
            AppEvent::General(GeneralEvent::Warning { message, context }) => {
                match context {
                    Some(context) => self.show_warning(&format!("Warning: {message} ({context})")),
                    None => self.show_warning(&format!("Warning: {message}")),
                }
            }
            _ => {}
        }
    }

    fn handle_manifest(&self, event: &ManifestEvent) {
        match event {
            ManifestEvent::Fetching { reference } => {
                self.show_status(&format!("Resolving {reference}"));
            }
            ManifestEvent::PlatformSelected { platform, digest, .. } => {
                self.show_dim(&format!("Selected {platform} ({})", short(digest)));
            }
            ManifestEvent::Resolved {
                blobs, total_bytes, ..
            } => {
                let size = total_bytes.map_or_else(String::new, |b| format!(", {}", format_size(b)));
                self.show_status(&format!("Found {blobs} blobs{size}"));
            }
        }
    }

    fn handle_download(&self, event: &DownloadEvent) {
        match event {
            DownloadEvent::Resuming { digest, offset, remote_size } => {
                self.show_dim(&format!(
                    "[{}] resuming at {} of {}",
                    short(digest),
                    format_size(*offset),
                    format_size(*remote_size)
                ));
            }
            DownloadEvent::Retrying {
                digest,
                attempt,
                max_attempts,
                reason,
                backoff_delay,
            } => {
                self.show_warning(&format!(
                    "[{}] attempt {attempt}/{max_attempts} failed: {reason} (retrying in {:.1}s)",
                    short(digest),
                    backoff_delay.as_secs_f64()
                ));
            }
            DownloadEvent::Reset { digest, cause, resets } => {
                let why = match cause {
                    ResetCause::Unauthorized => "credentials rejected, refreshing token",
                    ResetCause::RangeNotSatisfiable => "range rejected, restarting from zero",
                    ResetCause::CredentialsUnavailable => "token exchange failed, trying again",
                };
                self.show_warning(&format!("[{}] {why} (reset {resets})", short(digest)));
            }
            DownloadEvent::Failed { digest, failure } => {
                self.show_error(&format!("[{}] {}", short(digest), failure.message));
            }
            DownloadEvent::Started { .. }
            | DownloadEvent::Progress { .. }
            | DownloadEvent::Verifying { .. }
            | DownloadEvent::Completed { .. } => {}
        }
    }

    fn handle_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::BlobAdvanced {
                digest,
                percent: Some(percent),
                ..
            } if *percent < 100 && percent % PERCENT_STEP == 0 && *percent > 0 => {
                self.show_dim(&format!("[{}] {percent}%", short(digest)));
            }
            ProgressEvent::BlobCompleted { digest, summary, .. } => {
                self.show_success(&format!("[{}] done  {summary}", short(digest)));
            }
            _ => {}
        }
    }

    fn styled(&self, style: &Style, message: &str) -> String {
        if self.colors_enabled {
            style.apply_to(message).to_string()
        } else {
            message.to_string()
        }
    }

    fn show_status(&self, message: &str) {
        let line = self.styled(&Style::new().bold(), message);
        let _ = self.term.write_line(&line);
    }

    fn show_dim(&self, message: &str) {
        let line = self.styled(&Style::new().dim(), message);
        let _ = self.term.write_line(&line);
    }

    fn show_success(&self, message: &str) {
        let line = self.styled(&Style::new().green(), message);
        let _ = self.term.write_line(&line);
    }

    fn show_warning(&self, message: &str) {
        let line = self.styled(&Style::new().yellow(), message);
        let _ = self.term.write_line(&line);
    }

    fn show_error(&self, message: &str) {
        let line = self.styled(&Style::new().red().bold(), message);
        let _ = self.term.write_line(&line);
    }
}

/// `sha256:0123456789ab` style abbreviation for console lines
fn short(digest: &str) -> &str {
    let end = digest
        .find(':')
        .map_or(12, |colon| colon + 13)
        .min(digest.len());
    digest.get(..end).unwrap_or(digest)
}

pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    #[allow(clippy::cast_precision_loss)]
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layerpull_events::FailureContext;

    #[test]
    fn short_digest_keeps_algorithm_and_twelve_hex() {
        assert_eq!(
            short("sha256:0123456789abcdef0123456789abcdef"),
            "sha256:0123456789ab"
        );
        assert_eq!(short("sha256:abc"), "sha256:abc");
    }

    #[test]
    fn sizes_use_binary_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MiB");
    }

    #[test]
    fn quiet_handler_accepts_every_event() {
        let mut handler = EventHandler::new(false, true, true);
        handler.handle_event(EventMessage::from_event(AppEvent::Download(
            DownloadEvent::Failed {
                digest: "sha256:ab".to_string(),
                failure: FailureContext::new(None::<String>, "boom", None::<String>, false),
            },
        )));
    }
}
