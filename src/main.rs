use course_booking::config::{CONFIG_ENV, ServiceConfig};
use course_booking::{MemoryStore, server};
use log::error;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration (from ${CONFIG_ENV}): {e}");
            return ExitCode::FAILURE;
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_filter))
        .init();

    if let Err(e) = server::run_server(config, Arc::new(MemoryStore::new())).await {
        error!("server stopped: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
