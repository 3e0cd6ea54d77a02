// src/main.rs

use std::process::ExitCode;

use buildpipe::errors::BuildpipeError;
use buildpipe::{cli, logging};

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();

    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("buildpipe: failed to initialise logging: {err}");
        return ExitCode::FAILURE;
    }

    match buildpipe::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(BuildpipeError::TestsFailed(code)) => {
            tracing::error!("tests failed with exit code {code}");
            ExitCode::from(code.clamp(1, 255) as u8)
        }
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
