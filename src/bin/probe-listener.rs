use porttest::infra::logging;
use porttest::probe::cli::{build_listener_cli, run_listener};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    logging::init(0);
    let matches = build_listener_cli().get_matches();

    match run_listener(&matches).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // stdout is what the orchestrator captures as the failure detail.
            println!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
