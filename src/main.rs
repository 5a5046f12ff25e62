use std::io::Write;
use std::process::ExitCode;
use clap::Parser;
use log::{info, error};
use hookrelay::hookrelay::cli::Cli;
use hookrelay::hookrelay::init;

fn init_logger(level: &str) {
    env_logger::Builder::new()
        .parse_filters(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}:{}] {} - {}",
                buf.timestamp_millis(),
                record.module_path().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.level(),
                record.args()
            )
        })
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Cli::parse().into_config();

    // Initialize the logger with the configured level, RUST_LOG still wins
    init_logger(config.as_ref().map(|c| c.log_level.as_str()).unwrap_or("info"));

    let config = match config {
        Ok(config) => {
            info!("Configuration loaded successfully");
            config
        },
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("🚀 Starting hookrelay on {} with {} store", config.listen, config.store);
    match init(config).await {
        Ok(()) => {
            info!("hookrelay stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            match e.code() {
                Some(code) => error!("❌ Fatal {} error, {}: {}", code.category(), code.description(), e.message()),
                None => error!("❌ Fatal: {e}"),
            }
            ExitCode::FAILURE
        }
    }
}
