use std::process::ExitCode;

use engine::run_app;
use tracing::{error, info};

use super::bootstrap::AppWiring;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    if let Err(err) = run_app(app.config) {
        error!(error = %err, "run_failed");
        return ExitCode::FAILURE;
    }

    info!("exited_cleanly");
    ExitCode::SUCCESS
}
