use std::process::ExitCode;

use hospital_records::config::AppConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    hospital_records::init_tracing(&config);

    let result = match std::env::args().nth(1).as_deref() {
        None | Some("serve") => hospital_records::run(config).await,
        Some("seed") => hospital_records::seed_database(config).map(|_| ()),
        Some(other) => {
            eprintln!("unknown command: {other} (expected `serve` or `seed`)");
            return ExitCode::from(2);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
