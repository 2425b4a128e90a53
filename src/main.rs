use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tree_backup::backup::backup_config::BackupConfig;
use tree_backup::backup::logging;
use tree_backup::backup::runner::BackupRunner;

/// Full backup of source folders into a timestamped compressed bundle
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Location of config file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Simulate the run: copies, archive writes and deletions are only logged
    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match BackupConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            if let Err(log_err) = logging::init(None) {
                eprintln!("{log_err}");
            }
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let log_file = (!args.dry_run).then(|| config.log_path());
    if let Err(e) = logging::init(log_file.as_deref()) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }
    info!("Loaded config from {:?}", args.config);

    match BackupRunner::new(config, args.dry_run).run() {
        Ok(report) => {
            info!("Backup succeeded: {:?}", report.outcome);
            ExitCode::SUCCESS
        }
        Err(_) => {
            error!("Backup did not complete successfully, see log above");
            ExitCode::FAILURE
        }
    }
}
