//! Command line interface definition

use clap::Parser;
use layerpull_types::ColorChoice;
use std::path::PathBuf;

/// layerpull - Resumable, verified image layer downloader
#[derive(Parser, Debug)]
#[command(name = "layerpull")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Download and verify every layer of a container image")]
#[command(long_about = None)]
pub struct Cli {
    /// Image reference: [registry/]repository[:tag|@digest]
    pub image: String,

    /// Registry host for references without one
    #[arg(short, long, value_name = "HOST")]
    pub registry: Option<String>,

    /// Concurrent blob downloads (clamped to 1..=20)
    #[arg(short = 't', long, value_name = "N")]
    pub threads: Option<usize>,

    /// Directory that receives `<repository>_layers/`
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Architecture to select from a manifest list
    #[arg(long)]
    pub arch: Option<String>,

    /// Operating system to select from a manifest list
    #[arg(long)]
    pub os: Option<String>,

    /// Platform variant, e.g. v8
    #[arg(long)]
    pub variant: Option<String>,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Flags that shape the run rather than the pull
#[derive(Parser, Debug)]
pub struct GlobalArgs {
    /// Use alternate config file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub insecure: bool,

    /// Write JSON debug logs to the output directory
    #[arg(long)]
    pub debug: bool,

    /// Print results as JSON and suppress progress output
    #[arg(long)]
    pub json: bool,

    /// Color output control
    #[arg(long, value_enum)]
    pub color: Option<ColorChoice>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_flag_set() {
        let cli = Cli::try_parse_from([
            "layerpull",
            "ghcr.io/org/app:1.2",
            "-r",
            "mirror.local:5000",
            "-t",
            "8",
            "-o",
            "/tmp/out",
            "--arch",
            "arm64",
            "--os",
            "linux",
            "--variant",
            "v8",
            "--insecure",
            "--json",
        ])
        .unwrap();

        assert_eq!(cli.image, "ghcr.io/org/app:1.2");
        assert_eq!(cli.registry.as_deref(), Some("mirror.local:5000"));
        assert_eq!(cli.threads, Some(8));
        assert_eq!(cli.output, Some(PathBuf::from("/tmp/out")));
        assert_eq!(cli.arch.as_deref(), Some("arm64"));
        assert_eq!(cli.variant.as_deref(), Some("v8"));
        assert!(cli.global.insecure);
        assert!(cli.global.json);
        assert!(!cli.global.debug);
    }

    #[test]
    fn image_is_required() {
        assert!(Cli::try_parse_from(["layerpull"]).is_err());
    }
}
