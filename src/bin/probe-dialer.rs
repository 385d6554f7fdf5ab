use porttest::infra::logging;
use porttest::probe::cli::{build_dialer_cli, run_dialer};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    logging::init(0);
    let matches = build_dialer_cli().get_matches();

    match run_dialer(&matches).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
