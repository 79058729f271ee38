//! appsvcs - apply post-processed declarations to a target device.

mod app;

use std::path::PathBuf;

use anyhow::Context as _;
use app::DeviceTarget;
use appsvcs_config_and_utils::{init_logging, Paths, Settings, SettingsStore};
use clap::{Parser, Subcommand};
use device_rpc::Credentials;

/// appsvcs command-line interface.
#[derive(Parser)]
#[command(name = "appsvcs")]
#[command(about = "Lock a device, post-process a declaration and apply its update script")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Defaults to the settings file value
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for settings and trace files. Defaults to ~/.appsvcs
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Verify the device's TLS certificate
    #[arg(long, global = true)]
    verify_tls: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy an RPM (or any file) to the device's downloads directory
    Upload {
        /// Device as host or host:port
        target: DeviceTarget,
        /// Credentials as user:pass
        #[arg(value_parser = parse_credentials)]
        credentials: Credentials,
        /// Local file to copy
        rpm: PathBuf,
    },
    /// Apply one or more bundles, one at a time
    Apply {
        /// Device as host or host:port
        target: DeviceTarget,
        /// Credentials as user:pass
        #[arg(value_parser = parse_credentials)]
        credentials: Credentials,
        /// Bundle files
        #[arg(required = true)]
        bundles: Vec<PathBuf>,
        /// Write each rendered update script to the trace directory
        #[arg(long)]
        trace: bool,
    },
}

fn parse_credentials(raw: &str) -> Result<Credentials, String> {
    Credentials::parse(raw).ok_or_else(|| "credentials must look like user:pass".to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let settings = Settings::load(&paths).context("failed to load settings")?;
    init_logging(cli.log_level.as_deref().unwrap_or(&settings.log_level));
    let settings = SettingsStore::new(settings);

    match cli.command {
        Commands::Upload {
            target,
            credentials,
            rpm,
        } => {
            let remote = app::run_upload(&target, credentials, &rpm, cli.verify_tls).await?;
            println!("{remote}");
        }
        Commands::Apply {
            target,
            credentials,
            bundles,
            trace,
        } => {
            let options = app::ApplyOptions {
                trace,
                verify_tls: cli.verify_tls,
            };
            let all_ok = app::run_apply(settings, &paths, &target, credentials, bundles, options).await?;
            if !all_ok {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
