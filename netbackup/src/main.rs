//! netbackup command-line interface.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::error;

use netbackup::{
    BackupContext, Config, DeviceTarget, FsConfigStore, SshTransport, backup_all, test_logins,
};

#[derive(Parser, Debug)]
#[command(
    name = "netbackup",
    version,
    about = "Back up network device running configurations over SSH"
)]
struct Cli {
    #[arg(
        short = 'c',
        long,
        default_value = "netbackup.toml",
        help = "Configuration file path"
    )]
    config: PathBuf,

    #[arg(short = 'v', long, help = "Enable debug logging")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Back up the running configuration of every device
    Backup {
        #[arg(long, value_name = "NAME", help = "Only back up these devices")]
        limit: Vec<String>,

        #[arg(
            long,
            value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..),
            help = "Override defaults.max_startups (at least 1)"
        )]
        max_startups: Option<usize>,
    },

    /// Check which credential each device accepts
    Login {
        #[arg(long, value_name = "NAME", help = "Only test these devices")]
        limit: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every device succeeded.
async fn run(cli: Cli) -> netbackup::Result<bool> {
    let config = Config::load(&cli.config).await?;
    let registry = config.app.profile_registry()?;
    let Config { app, devices } = config;

    let transport = SshTransport::new(app.ssh.clone());
    let store = FsConfigStore::new(&app.defaults.configs_dir);
    let ctx = BackupContext::new(app, transport, store);

    match cli.command {
        Commands::Backup {
            limit,
            max_startups,
        } => {
            if let Some(n) = max_startups {
                ctx.throttle().set_limit(n);
            }

            let devices = select(&devices, &limit);
            let mut all_ok = true;
            let results = backup_all(&ctx, &registry, devices.iter().copied()).await;
            for (target, result) in devices.iter().zip(results) {
                match result {
                    Ok(result) if result.is_success() => {
                        let path = result.save_file.unwrap_or_default();
                        println!("OK      {}  {}", target.name(), path.display());
                    }
                    Ok(result) => {
                        all_ok = false;
                        let reason = result
                            .failure
                            .map(|e| e.to_string())
                            .unwrap_or_else(|| result.state.to_string());
                        println!("FAILED  {}  {}", target.name(), reason);
                    }
                    Err(e) => {
                        all_ok = false;
                        println!("ERROR   {}  {}", target.name(), e);
                    }
                }
            }
            Ok(all_ok)
        }

        Commands::Login { limit } => {
            let devices = select(&devices, &limit);
            let mut all_ok = true;
            let results = test_logins(&ctx, &registry, devices.iter().copied()).await;
            for (target, result) in devices.iter().zip(results) {
                match result {
                    Ok(Some(user)) => println!("OK      {}  {}", target.name(), user),
                    Ok(None) => {
                        all_ok = false;
                        println!("DENIED  {}", target.name());
                    }
                    Err(e) => {
                        all_ok = false;
                        println!("FAILED  {}  {}", target.name(), e);
                    }
                }
            }
            Ok(all_ok)
        }
    }
}

/// Devices named in `limit`, or all of them when it is empty.
fn select<'a>(devices: &'a [DeviceTarget], limit: &[String]) -> Vec<&'a DeviceTarget> {
    devices
        .iter()
        .filter(|d| limit.is_empty() || limit.iter().any(|name| name == d.name()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_startups_must_be_positive() {
        let err = Cli::try_parse_from(["netbackup", "backup", "--max-startups", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let cli = Cli::try_parse_from(["netbackup", "backup", "--max-startups", "5"]).unwrap();
        match cli.command {
            Commands::Backup { max_startups, .. } => assert_eq!(max_startups, Some(5)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_limit_selects_named_devices() {
        let devices = vec![DeviceTarget::new("r1", "ios"), DeviceTarget::new("r2", "ios")];
        let picked = select(&devices, &["r2".to_string()]);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].name(), "r2");
        assert_eq!(select(&devices, &[]).len(), 2);
    }
}
