use std::process::ExitCode;

use clap::Parser;
use db_backup_lib::backends::PgDump;
use db_backup_lib::cli::Cli;
use db_backup_lib::config::{FileConfig, JobConfig};
use db_backup_lib::job::Job;
use db_backup_lib::remote::DriveStore;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // init logger
    let mut env_logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    env_logger.target(env_logger::Target::Stdout);
    if let Some(level) = cli.verbose {
        env_logger.filter_level(level);
    }
    env_logger.try_init().expect("env_logger should not fail");

    let file_config = match cli.config.as_deref() {
        Some(path) => match FileConfig::load_or_init(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                log::error!("Reading the config file failed: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => FileConfig::default(),
    };
    let config = JobConfig::new(cli, file_config);

    let dumper = PgDump::from_config(&config.dump);
    let store = DriveStore::connect(&config.credential_file);

    Job::new(config, dumper, store).run().status().exit_code()
}
