use std::process::ExitCode;

use clap::Parser;
use leadbook::application::AppError;
use leadbook::cli::Cli;
use leadbook::logging::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Anything that is not an AppError failed while reading arguments.
            let status = err
                .downcast_ref::<AppError>()
                .map_or(400, AppError::status_code);
            let body = serde_json::json!({
                "status": status,
                "error": format!("{:#}", err),
            });
            eprintln!("{}", body);
            ExitCode::FAILURE
        }
    }
}
