use cloudlift_core::{config, logging};

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    let args = cli::parse_args();

    let cfg = match config::load_or_init() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("cloudlift error: {:#}", err);
            std::process::exit(1);
        }
    };
    let state_dir = match cfg.resolve_state_dir() {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("cloudlift error: {:#}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = logging::init_logging(&state_dir) {
        logging::init_logging_stderr();
        tracing::warn!("file logging unavailable, using stderr: {:#}", err);
    }

    if let Err(err) = CliCommand::run(args.command, &cfg, &state_dir).await {
        eprintln!("cloudlift error: {:#}", err);
        std::process::exit(1);
    }
}
