mod application;
mod logging;
mod presentation {
    pub mod cli;
}

use std::process::ExitCode;

fn main() -> ExitCode {
    logging::init();
    match application::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("error: {}", e.user_message());
            ExitCode::FAILURE
        }
    }
}
