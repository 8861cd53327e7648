pub mod types;
pub mod config;
pub mod error;
pub mod events;
pub mod bracket;
pub mod auction;
pub mod bid;
pub mod client;
pub mod connection;
pub mod session;
pub mod scoreboard;
pub mod terminal;
pub mod cli;

use clap::Parser;
use cli::Command;
use config::*;
use std::fs;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub fn run() {
    load_env_file();

    let logs_dir = repo_root().join("logs");
    fs::create_dir_all(&logs_dir).ok();
    let file_appender = tracing_appender::rolling::daily(&logs_dir, "app.log");
    let (non_blocking, log_guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();
    info!("Bracket auction starting");

    let command = Command::parse();
    let exit_code = match load_config() {
        Ok(config) => {
            log_env_warnings(&config);
            match command.run(&config) {
                Ok(()) => 0,
                Err(e) => {
                    error!("{e}");
                    eprintln!("{e}");
                    1
                }
            }
        }
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            2
        }
    };

    drop(log_guard);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}
